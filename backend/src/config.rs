use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StartupError;
use crate::knowledge::BASE_LOCALE;
use crate::processing::ValidationBounds;

pub const DEFAULT_CONFIG_PATH: &str = "config/leafdoc.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: f32,
    pub model: ModelConfig,
    pub knowledge: KnowledgeConfig,
    pub validation: ValidationBounds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub class_labels: PathBuf,
    /// Cross-checked against the label file when set.
    pub num_classes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// External table; the built-in one is used when unset.
    pub path: Option<PathBuf>,
    pub supported_locales: Vec<String>,
    pub default_locale: String,
    pub fallback_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            model: ModelConfig::default(),
            knowledge: KnowledgeConfig::default(),
            validation: ValidationBounds::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model/best_model.pt"),
            class_labels: PathBuf::from("model/class_labels.json"),
            num_classes: None,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: None,
            supported_locales: vec!["en".to_string(), "hi".to_string()],
            default_locale: "en".to_string(),
            fallback_key: "Tomato_healthy".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `.env`, then the YAML file named by `LEAFDOC_CONFIG` (or the
    /// default path), then applies environment overrides.
    pub fn from_env() -> Result<Self, StartupError> {
        dotenv::dotenv().ok();
        let path = std::env::var("LEAFDOC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);

        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            log::warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML file. Relative paths inside it are taken relative to the
    /// file's own directory.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| StartupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AppConfig = if config_str.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&config_str)?
        };

        if let Some(base) = path.parent() {
            config.model.path = resolve(base, &config.model.path);
            config.model.class_labels = resolve(base, &config.model.class_labels);
            config.knowledge.path = config.knowledge.path.as_deref().map(|p| resolve(base, p));
        }
        config.validate()?;
        Ok(config)
    }

    /// Environment wins over the file. `lookup` is the variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), StartupError> {
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CLASS_LABELS_PATH") {
            self.model.class_labels = PathBuf::from(path);
        }
        if let Some(raw) = lookup("NUM_CLASSES") {
            let n = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| StartupError::Config(format!("NUM_CLASSES is not a number: '{}'", raw)))?;
            self.model.num_classes = Some(n);
        }
        if let Some(path) = lookup("KNOWLEDGE_PATH") {
            self.knowledge.path = Some(PathBuf::from(path));
        }
        if let Some(locale) = lookup("DEFAULT_LOCALE") {
            self.knowledge.default_locale = locale.trim().to_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        let knowledge = &self.knowledge;
        if !knowledge.supported_locales.iter().any(|l| l == BASE_LOCALE) {
            return Err(StartupError::Config(format!(
                "supported_locales must include '{}'",
                BASE_LOCALE
            )));
        }
        if !knowledge.supported_locales.contains(&knowledge.default_locale) {
            return Err(StartupError::Config(format!(
                "default_locale '{}' is not in supported_locales",
                knowledge.default_locale
            )));
        }

        let bounds = &self.validation;
        if bounds.min_dimension > bounds.max_dimension {
            return Err(StartupError::Config("min_dimension exceeds max_dimension".into()));
        }
        if bounds.min_brightness > bounds.max_brightness {
            return Err(StartupError::Config("min_brightness exceeds max_brightness".into()));
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leafdoc.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let (dir, path) = write_config("");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.validation.min_dimension, 100);
        assert_eq!(config.knowledge.default_locale, "en");
        assert_eq!(config.knowledge.fallback_key, "Tomato_healthy");
        assert_eq!(config.model.class_labels, dir.path().join("model/class_labels.json"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let (dir, path) = write_config(
            "model:\n  path: weights/leaf.pt\n  num_classes: 15\nvalidation:\n  max_brightness: 240.0\n",
        );
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.model.path, dir.path().join("weights/leaf.pt"));
        assert_eq!(config.model.num_classes, Some(15));
        assert_eq!(config.validation.max_brightness, 240.0);
        assert_eq!(config.validation.min_brightness, 20.0);
    }

    #[test]
    fn environment_overrides_file() {
        let (_dir, path) = write_config("knowledge:\n  default_locale: hi\n");
        let mut config = AppConfig::load(&path).unwrap();
        assert_eq!(config.knowledge.default_locale, "hi");

        let env: HashMap<&str, &str> = [
            ("MODEL_PATH", "/srv/model.pt"),
            ("NUM_CLASSES", "12"),
            ("DEFAULT_LOCALE", "EN"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.model.path, PathBuf::from("/srv/model.pt"));
        assert_eq!(config.model.num_classes, Some(12));
        assert_eq!(config.knowledge.default_locale, "en");
    }

    #[test]
    fn bad_num_classes_is_fatal() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|k| (k == "NUM_CLASSES").then(|| "fifteen".to_string()))
            .unwrap_err();
        assert!(matches!(err, StartupError::Config(_)));
    }

    #[test]
    fn locales_must_include_english() {
        let (_dir, path) = write_config("knowledge:\n  supported_locales: [hi]\n  default_locale: hi\n");
        assert!(matches!(AppConfig::load(&path), Err(StartupError::Config(_))));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let (_dir, path) = write_config("model: [unclosed\n");
        assert!(matches!(AppConfig::load(&path), Err(StartupError::Yaml(_))));
    }
}
