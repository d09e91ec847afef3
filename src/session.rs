use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::registry::{CcException, Slider};

/// Everything a session file stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub selected_device_name: String,
    #[serde(rename = "slider")]
    pub sliders: Vec<Slider>,
    #[serde(rename = "cc_exception")]
    pub cc_exceptions: Vec<CcException>,
}

pub fn load(path: impl AsRef<Path>) -> anyhow::Result<SessionState> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading session {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing session {}", path.display()))
}

pub fn save(path: impl AsRef<Path>, state: &SessionState) -> anyhow::Result<()> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(state)?;
    std::fs::write(path, content).with_context(|| format!("writing session {}", path.display()))
}
