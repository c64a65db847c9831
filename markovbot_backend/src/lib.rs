pub mod chain;
pub mod config;
pub mod corpus;
pub mod database;
pub mod gate;
pub mod rng;
pub mod runtime;
pub mod scheduler;
pub mod synth;
pub mod transport;
