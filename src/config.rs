use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Modulation tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Client name registered with the MIDI backend.
    pub client_name: String,
    /// Pending batches the output thread will buffer before dropping.
    pub output_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_interval_ms: 50,
            client_name: "ccmod".to_string(),
            output_queue: 64,
        }
    }
}

pub fn load(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn init(config: Config) {
    CONFIG.set(config).ok();
}

fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(get().tick_interval_ms.max(1))
}

pub fn client_name() -> &'static str {
    &get().client_name
}

pub fn output_queue() -> usize {
    get().output_queue
}
