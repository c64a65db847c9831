use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // Identity
    #[serde(default = "default_nick", alias = "bot_name")]
    pub nick: String,

    // On-demand generation
    #[serde(default = "default_trigger_command")]
    pub trigger_command: String,

    // Eligibility gate
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,

    // Corpus storage
    #[serde(default = "default_database_path")]
    pub database_path: String,

    // Generation
    #[serde(default = "default_max_generation_length")]
    pub max_generation_length: usize,

    // Autonomous replies
    #[serde(default = "default_deferred_chance_percent")]
    pub deferred_chance_percent: u32,
    #[serde(default = "default_max_deferred_delay_mins")]
    pub max_deferred_delay_mins: u64,
    #[serde(default = "default_max_pending_replies")]
    pub max_pending_replies: usize,
    #[serde(default)]
    pub drain_pending_on_shutdown: bool,

    // Fixed seed for reproducible runs; entropy-seeded when absent
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_nick() -> String {
    "UncleJim".to_string()
}

fn default_trigger_command() -> String {
    "-mkv".to_string()
}

fn default_denylist() -> Vec<String> {
    vec!["buttbutt".to_string()]
}

fn default_ignored_prefixes() -> Vec<String> {
    vec![
        "-".to_string(),
        "!".to_string(),
        "~".to_string(),
        "Quit:".to_string(),
    ]
}

fn default_database_path() -> String {
    "markovbot.db".to_string()
}

fn default_max_generation_length() -> usize {
    50
}

fn default_deferred_chance_percent() -> u32 {
    6
}

fn default_max_deferred_delay_mins() -> u64 {
    180
}

fn default_max_pending_replies() -> usize {
    256
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            trigger_command: default_trigger_command(),
            denylist: default_denylist(),
            ignored_prefixes: default_ignored_prefixes(),
            database_path: default_database_path(),
            max_generation_length: default_max_generation_length(),
            deferred_chance_percent: default_deferred_chance_percent(),
            max_deferred_delay_mins: default_max_deferred_delay_mins(),
            max_pending_replies: default_max_pending_replies(),
            drain_pending_on_shutdown: false,
            rng_seed: None,
        }
    }
}

impl BotConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("markovbot_config.toml")
    }

    /// Load config from markovbot_config.toml (next to executable), falling back
    /// to defaults overlaid with environment variables.
    pub fn load() -> Self {
        let path = Self::config_path();

        if let Ok(contents) = fs::read_to_string(&path) {
            match Self::from_toml_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<BotConfig>(contents)
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(nick) = env::var("MARKOVBOT_NICK") {
            if !nick.trim().is_empty() {
                config.nick = nick.trim().to_string();
            }
        }

        if let Ok(trigger) = env::var("MARKOVBOT_TRIGGER") {
            if !trigger.trim().is_empty() {
                config.trigger_command = trigger.trim().to_string();
            }
        }

        if let Ok(path) = env::var("MARKOVBOT_DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = path;
            }
        }

        if let Ok(seed) = env::var("MARKOVBOT_SEED") {
            if let Ok(seed) = seed.trim().parse() {
                config.rng_seed = Some(seed);
            }
        }

        if let Ok(limit) = env::var("MARKOVBOT_MAX_PENDING_REPLIES") {
            if let Ok(limit) = limit.trim().parse() {
                config.max_pending_replies = limit;
            }
        }

        if let Ok(enabled) = env::var("MARKOVBOT_DRAIN_ON_SHUTDOWN") {
            config.drain_pending_on_shutdown = parse_flag(&enabled);
        }

        if let Ok(list) = env::var("MARKOVBOT_DENYLIST") {
            config.denylist = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }
}

fn parse_flag(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("1")
        || raw.eq_ignore_ascii_case("true")
        || raw.eq_ignore_ascii_case("yes")
}
