//! Order-1 word chain.
//!
//! The model maps each token to every token observed right after it, keeping
//! duplicates so a uniform pick over the list is frequency weighted. Models
//! are rebuilt from the current corpus for every generation and then dropped.

pub mod generator;

use std::collections::HashMap;

pub use generator::{draw_length, generate, walk_from};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainModel {
    transitions: HashMap<String, Vec<String>>,
    /// Every token of the source text in order; start tokens are drawn from here.
    tokens: Vec<String>,
}

impl ChainModel {
    /// Tokenize `corpus_text` on whitespace and record each adjacent pair.
    ///
    /// The final token gets no entry of its own. Fewer than two tokens yields
    /// an empty model.
    pub fn build(corpus_text: &str) -> Self {
        let tokens: Vec<String> = corpus_text.split_whitespace().map(str::to_string).collect();

        let mut transitions: HashMap<String, Vec<String>> = HashMap::new();
        for pair in tokens.windows(2) {
            transitions
                .entry(pair[0].clone())
                .or_default()
                .push(pair[1].clone());
        }

        Self {
            transitions,
            tokens,
        }
    }

    /// Build from store lines, joined the way the corpus blob is assembled.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let blob = lines
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        Self::build(&blob)
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn successors(&self, token: &str) -> Option<&[String]> {
        self.transitions.get(token).map(Vec::as_slice)
    }

    pub fn transitions(&self) -> &HashMap<String, Vec<String>> {
        &self.transitions
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
