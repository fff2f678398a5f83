use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where lesson content comes from: the embedded catalog, or the active
/// AI provider generating it on demand.
pub const SOURCE_BUILTIN: &str = "builtin";
pub const SOURCE_AI: &str = "ai";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub content_source: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some("ollama".to_string()),
            default_model: None,
            content_source: Some(SOURCE_BUILTIN.to_string()),
            gemini_api_key: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("lesson-cli").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.provider = Some("gemini".to_string());
        config.default_model = Some("gemini-2.5-flash".to_string());
        config.content_source = Some(SOURCE_AI.to_string());
        config.gemini_api_key = Some("test-key".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider.as_deref(), Some("gemini"));
        assert_eq!(loaded.default_model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(loaded.content_source.as_deref(), Some(SOURCE_AI));
        assert_eq!(loaded.gemini_api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.provider.as_deref(), Some("ollama"));
        assert_eq!(loaded.content_source.as_deref(), Some(SOURCE_BUILTIN));
        assert!(loaded.gemini_api_key.is_none());
    }
}
