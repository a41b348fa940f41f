use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::profile::DEFAULT_MAX_SIZE_BYTES;
use crate::Result;

const APP_DIR: &str = "clipfetch";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size ceiling and workspace location
    pub pipeline: PipelineConfig,

    /// Remote resolver service (first strategy when configured)
    pub resolver: ResolverConfig,

    /// Local extractor binary (yt-dlp)
    pub extractor: ExtractorConfig,

    /// Credential cache and its backing store
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum artifact size in bytes
    pub max_size_bytes: u64,

    /// Parent directory for per-request workspaces (OS temp dir when unset)
    pub workspace_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub video_quality: String,

    /// Bound on the resolver call itself
    pub timeout_secs: u64,

    /// Bound on streaming the resolved media file
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub binary: String,
    pub socket_timeout_secs: u64,
    pub retries: u32,
    pub fragment_retries: u32,

    /// Wall-clock bound for one extractor invocation
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Key the cookie jar is stored under
    pub scope: String,
    pub ttl_secs: u64,

    /// Literal cookie jar text, used when no store is configured
    pub inline_cookies: Option<String>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub key_column: String,
    pub data_column: String,
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            workspace_root: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            video_quality: "720".to_string(),
            timeout_secs: 30,
            download_timeout_secs: 300,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            socket_timeout_secs: 30,
            retries: 10,
            fragment_retries: 10,
            timeout_secs: 300,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            scope: "Youtube/Instagram".to_string(),
            ttl_secs: 3600,
            inline_cookies: None,
            store: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: "cookies".to_string(),
            key_column: "name_media".to_string(),
            data_column: "cookies_data".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration from `path`, the usual locations, or defaults, then
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::existing_config_path() {
                Some(found) => Self::read(&found)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    fn existing_config_path() -> Option<PathBuf> {
        // Current directory first for easy testing
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }
        Self::config_path().ok().filter(|path| path.exists())
    }

    /// Overlay values from the environment; `lookup` is `std::env::var` outside tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup("CLIPFETCH_RESOLVER_URL") {
            self.resolver.endpoint = Some(url);
        }
        if let Some(key) = lookup("CLIPFETCH_RESOLVER_KEY") {
            self.resolver.api_key = Some(key);
        }
        if let Some(raw) = lookup("CLIPFETCH_MAX_SIZE_BYTES") {
            match raw.trim().parse() {
                Ok(bytes) => self.pipeline.max_size_bytes = bytes,
                Err(_) => tracing::warn!(value = %raw, "Ignoring unparsable CLIPFETCH_MAX_SIZE_BYTES"),
            }
        }

        let store_url = lookup("SUPABASE_URL");
        let store_key = lookup("SUPABASE_KEY");
        if store_url.is_some() || store_key.is_some() {
            let store = self.credentials.store.get_or_insert_with(StoreConfig::default);
            if let Some(url) = store_url {
                store.url = url;
            }
            if let Some(key) = store_key {
                store.api_key = key;
            }
        }

        if let Some(cookies) = lookup("COOKIES") {
            self.credentials.inline_cookies = Some(cookies);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_size_bytes == 0 {
            anyhow::bail!("pipeline.max_size_bytes must be greater than zero");
        }
        if self.credentials.ttl_secs == 0 {
            anyhow::bail!("credentials.ttl_secs must be greater than zero");
        }
        if self.extractor.binary.trim().is_empty() {
            anyhow::bail!("extractor.binary must be set");
        }
        if let Some(endpoint) = &self.resolver.endpoint {
            require_http_url("resolver.endpoint", endpoint)?;
        }
        if let Some(store) = &self.credentials.store {
            require_http_url("credentials.store.url", &store.url)?;
            if store.api_key.is_empty() {
                anyhow::bail!("credentials.store.api_key must be set when a store is configured");
            }
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Max Size: {}", crate::utils::format_file_size(self.pipeline.max_size_bytes));
        match &self.pipeline.workspace_root {
            Some(root) => println!("  Workspace Root: {}", root.display()),
            None => println!("  Workspace Root: {}", std::env::temp_dir().display()),
        }
        println!(
            "  Resolver: {}",
            self.resolver.endpoint.as_deref().unwrap_or("(disabled)")
        );
        println!("  Video Quality: {}", self.resolver.video_quality);
        println!("  Extractor: {}", self.extractor.binary);
        println!("  Credential Scope: {}", self.credentials.scope);
        println!("  Credential TTL: {}s", self.credentials.ttl_secs);
        let source = match (&self.credentials.store, &self.credentials.inline_cookies) {
            (Some(store), _) => format!("store {} (table {})", store.url, store.table),
            (None, Some(_)) => "inline cookies".to_string(),
            (None, None) => "none".to_string(),
        };
        println!("  Credential Source: {}", source);
    }
}

fn require_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", field, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must be an http(s) URL: {}", field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.max_size_bytes, 52_428_800);
        assert_eq!(config.resolver.video_quality, "720");
        assert_eq!(config.resolver.download_timeout_secs, 300);
        assert_eq!(config.extractor.binary, "yt-dlp");
        assert_eq!(config.extractor.timeout_secs, 300);
        assert_eq!(config.credentials.scope, "Youtube/Instagram");
        assert_eq!(config.credentials.ttl_secs, 3600);
        assert!(config.credentials.store.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "pipeline:\n  max_size_bytes: 1000\ncredentials:\n  store:\n    url: https://db.example.com\n    api_key: k\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.max_size_bytes, 1000);
        assert_eq!(config.extractor.retries, 10);
        let store = config.credentials.store.unwrap();
        assert_eq!(store.table, "cookies");
        assert_eq!(store.key_column, "name_media");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("CLIPFETCH_RESOLVER_URL", "https://resolver.example.com/"),
            ("CLIPFETCH_MAX_SIZE_BYTES", "2048"),
            ("SUPABASE_URL", "https://db.example.com"),
            ("SUPABASE_KEY", "secret"),
            ("COOKIES", "# Netscape HTTP Cookie File"),
        ]));

        assert_eq!(config.resolver.endpoint.as_deref(), Some("https://resolver.example.com/"));
        assert_eq!(config.pipeline.max_size_bytes, 2048);
        let store = config.credentials.store.as_ref().unwrap();
        assert_eq!(store.url, "https://db.example.com");
        assert_eq!(store.api_key, "secret");
        assert!(config.credentials.inline_cookies.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_ignore_blank_and_garbage() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("CLIPFETCH_MAX_SIZE_BYTES", "lots"), ("COOKIES", "  ")]));
        assert_eq!(config.pipeline.max_size_bytes, 52_428_800);
        assert!(config.credentials.inline_cookies.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.max_size_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resolver.endpoint = Some("ftp://resolver".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.credentials.store = Some(StoreConfig {
            url: "https://db.example.com".to_string(),
            ..StoreConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.pipeline.max_size_bytes = 4096;
        let written = config.save(Some(&path)).unwrap();
        assert_eq!(written, path);

        let loaded = Config::read(&path).unwrap();
        assert_eq!(loaded.pipeline.max_size_bytes, 4096);
    }
}
