//! Kiln settings, read from TOML layers.
//!
//! Later layers override earlier ones field by field:
//! `~/.kiln/config.toml`, then `.kiln/config.toml` in the working
//! directory, then `KILN_<PROVIDER>_API_KEY` variables.

use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Providers that read a key from `KILN_<NAME>_API_KEY`
const ENV_KEYED_PROVIDERS: &[&str] = &["flux"];

const DEFAULT_PROVIDER: &str = "mock";

/// Resolved settings for one named provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub default_provider: String,
    /// Extra `[[style]]` profiles layered over the built-in table
    pub styles_file: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER.to_string(),
            styles_file: None,
        }
    }
}

/// Thresholds used by the quality validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub max_payload_bytes: usize,
    pub min_dimension: u32,
    pub require_alpha: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024,
            min_dimension: 16,
            require_alpha: true,
        }
    }
}

// One TOML file as written. Every field is optional so that a layer
// only replaces what it mentions.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Layer {
    #[serde(default)]
    providers: HashMap<String, ProviderLayer>,
    #[serde(default)]
    generation: GenerationLayer,
    #[serde(default)]
    validation: ValidationLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderLayer {
    api_key: Option<String>,
    api_url: Option<String>,
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerationLayer {
    default_provider: Option<String>,
    styles_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidationLayer {
    max_payload_bytes: Option<usize>,
    min_dimension: Option<u32>,
    require_alpha: Option<bool>,
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KilnConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
}

impl KilnConfig {
    /// Defaults, then the global file, then the project file, then env.
    /// Missing files are skipped; unreadable or malformed ones are errors.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        let global = dirs::home_dir().map(|home| home.join(".kiln").join("config.toml"));
        let project = Some(PathBuf::from(".kiln").join("config.toml"));

        for path in [global, project].into_iter().flatten() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "reading config layer");
                config.apply(read_layer(&path)?);
            }
        }
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus a single file plus env
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.apply(read_layer(path)?);
        config.apply_env();
        Ok(config)
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider)?.api_key.as_deref()
    }

    pub fn api_url(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider)?.api_url.as_deref()
    }

    /// Providers with no entry count as enabled
    pub fn is_enabled(&self, provider: &str) -> bool {
        self.providers.get(provider).map_or(true, |p| p.enabled)
    }

    pub fn default_provider(&self) -> &str {
        &self.generation.default_provider
    }

    pub fn styles_file(&self) -> Option<&Path> {
        self.generation.styles_file.as_deref()
    }

    fn apply(&mut self, layer: Layer) {
        for (name, p) in layer.providers {
            let entry = self.providers.entry(name).or_default();
            if p.api_key.is_some() {
                entry.api_key = p.api_key;
            }
            if p.api_url.is_some() {
                entry.api_url = p.api_url;
            }
            replace(&mut entry.enabled, p.enabled);
        }

        replace(&mut self.generation.default_provider, layer.generation.default_provider);
        if layer.generation.styles_file.is_some() {
            self.generation.styles_file = layer.generation.styles_file;
        }

        let v = layer.validation;
        replace(&mut self.validation.max_payload_bytes, v.max_payload_bytes);
        replace(&mut self.validation.min_dimension, v.min_dimension);
        replace(&mut self.validation.require_alpha, v.require_alpha);
    }

    fn apply_env(&mut self) {
        for name in ENV_KEYED_PROVIDERS {
            let var = format!("KILN_{}_API_KEY", name.to_ascii_uppercase());
            if let Ok(key) = std::env::var(&var) {
                if !key.is_empty() {
                    self.providers.entry(name.to_string()).or_default().api_key = Some(key);
                }
            }
        }
    }
}

fn read_layer(path: &Path) -> Result<Layer> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text)
        .map_err(|e| KilnError::Configuration(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_layer(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln_cfg_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn remove_layer(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    fn layer(body: &str) -> Layer {
        toml::from_str(body).unwrap()
    }

    #[test]
    fn test_file_values_resolve() {
        let path = write_layer(
            r#"
[providers.flux]
api_url = "http://localhost:9000/render"
enabled = false

[generation]
default_provider = "flux"
styles_file = "studio-styles.toml"

[validation]
min_dimension = 8
"#,
        );
        let config = KilnConfig::load_from_file(&path).unwrap();
        remove_layer(&path);

        assert!(!config.is_enabled("flux"));
        assert_eq!(config.api_url("flux"), Some("http://localhost:9000/render"));
        assert_eq!(config.default_provider(), "flux");
        assert_eq!(config.styles_file(), Some(Path::new("studio-styles.toml")));
        assert_eq!(config.validation.min_dimension, 8);
        // untouched thresholds keep their defaults
        assert_eq!(config.validation.max_payload_bytes, 1024 * 1024);
        assert!(config.validation.require_alpha);
    }

    #[test]
    fn test_flux_key_from_environment() {
        let path = write_layer("[providers.flux]\napi_key = \"from-file\"\n");
        std::env::set_var("KILN_FLUX_API_KEY", "from-env");
        let config = KilnConfig::load_from_file(&path);
        std::env::remove_var("KILN_FLUX_API_KEY");
        remove_layer(&path);

        assert_eq!(config.unwrap().api_key("flux"), Some("from-env"));
    }

    #[test]
    fn test_unconfigured_defaults() {
        let config = KilnConfig::default();
        assert_eq!(config.default_provider(), "mock");
        assert_eq!(config.validation, ValidationConfig::default());
        assert!(config.styles_file().is_none());
        assert!(config.api_key("flux").is_none());
        assert!(config.is_enabled("anything"));
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let path = write_layer("[validation\nmin_dimension = ");
        let err = KilnConfig::load_from_file(&path).unwrap_err();
        remove_layer(&path);

        match err {
            KilnError::Configuration(msg) => assert!(msg.contains("config.toml")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_section_rejected() {
        let path = write_layer("[render]\nthreads = 4\n");
        assert!(KilnConfig::load_from_file(&path).is_err());
        remove_layer(&path);
    }

    #[test]
    fn test_project_layer_overrides_field_by_field() {
        let mut config = KilnConfig::default();
        config.apply(layer(
            r#"
[providers.flux]
api_key = "global-key"
api_url = "https://render.example"

[generation]
default_provider = "flux"

[validation]
max_payload_bytes = 4096
"#,
        ));
        config.apply(layer(
            r#"
[providers.flux]
api_key = "project-key"

[generation]
default_provider = "mock"

[validation]
require_alpha = false
"#,
        ));

        assert_eq!(config.api_key("flux"), Some("project-key"));
        assert_eq!(config.api_url("flux"), Some("https://render.example"));
        assert!(config.is_enabled("flux"));
        assert_eq!(config.default_provider(), "mock");
        assert_eq!(config.validation.max_payload_bytes, 4096);
        assert!(!config.validation.require_alpha);
    }
}
