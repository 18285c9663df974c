//! Settings and embedding configuration persisted as small JSON sidecars
//! (`settings.json`, `rag_config.json` — spec.md §3, §6).

use serde::{Deserialize, Serialize};

use crate::atomic::{read_json, write_json_atomic};
use crate::error::{Error, Result};
use crate::path_layout::PathLayout;

/// UI-facing settings. Not part of the retrieval core itself, but persisted
/// next to `rag_config.json` with the same atomic-write discipline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sidebar_width")]
    pub sidebar_width: u32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writing_style: Option<String>,
}

fn default_theme() -> String {
    "system".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_sidebar_width() -> u32 {
    260
}
fn default_font_size() -> u32 {
    16
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language: default_language(),
            sidebar_width: default_sidebar_width(),
            font_size: default_font_size(),
            writing_style: None,
        }
    }
}

/// Which embedding backend to talk to (spec.md §4.4, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderKind {
    Ollama,
    OpenAiCompatible,
}

/// Persisted embedding configuration, `rag_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_chunk_size: usize,
    pub overlap: usize,
}

impl EmbeddingConfig {
    /// Validate the chunking range spec.md §4.3 requires:
    /// `overlap < maxChunkSize`, both > 0.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 || self.overlap == 0 {
            return Err(Error::InvalidInput(
                "maxChunkSize and overlap must both be > 0".into(),
            ));
        }
        if self.overlap >= self.max_chunk_size {
            return Err(Error::InvalidInput(
                "overlap must be strictly less than maxChunkSize".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            max_chunk_size: 1000,
            overlap: 200,
        }
    }
}

pub fn load_settings(layout: &PathLayout) -> Result<Settings> {
    match read_json(&layout.settings_json()) {
        Ok(settings) => Ok(settings),
        Err(Error::NotFound(_)) => Ok(Settings::default()),
        Err(e) => Err(e),
    }
}

pub fn save_settings(layout: &PathLayout, settings: &Settings) -> Result<()> {
    write_json_atomic(&layout.settings_json(), settings)
}

pub fn load_embedding_config(layout: &PathLayout) -> Result<EmbeddingConfig> {
    match read_json(&layout.rag_config_json()) {
        Ok(config) => Ok(config),
        Err(Error::NotFound(_)) => Ok(EmbeddingConfig::default()),
        Err(e) => Err(e),
    }
}

pub fn save_embedding_config(layout: &PathLayout, config: &EmbeddingConfig) -> Result<()> {
    config.validate()?;
    write_json_atomic(&layout.rag_config_json(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_overlap_rejected() {
        let mut config = EmbeddingConfig::default();
        config.overlap = config.max_chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_load_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(dir.into_path());
        assert_eq!(load_settings(&layout).unwrap(), Settings::default());
        assert_eq!(
            load_embedding_config(&layout).unwrap().model,
            EmbeddingConfig::default().model
        );
    }
}
