//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Store tunables live under the `store` key and fall back to defaults.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::CoreError;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Builds a config from an inline TOML document, without env overrides.
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Validated store settings; a missing `store` table yields the defaults.
    pub fn settings(&self) -> anyhow::Result<StoreSettings> {
        let settings = if self.figment.contains("store") { self.get::<StoreSettings>("store")? } else { StoreSettings::default() };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub embedding_dim: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_percent: f32,
    /// Text queries with at least this many words skip the text→image branch.
    pub image_query_max_tokens: usize,
    pub fetch_timeout_secs: u64,
    pub auto_commit: bool,
    pub reconcile_on_connect: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            embedding_dim: 512,
            chunk_max_tokens: 500,
            chunk_overlap_percent: 0.2,
            image_query_max_tokens: 50,
            fetch_timeout_secs: 30,
            auto_commit: true,
            reconcile_on_connect: true,
        }
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.embedding_dim == 0 {
            return Err(CoreError::InvalidConfig("store.embedding_dim must be > 0".into()));
        }
        if self.chunk_max_tokens == 0 {
            return Err(CoreError::InvalidConfig("store.chunk_max_tokens must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.chunk_overlap_percent) {
            return Err(CoreError::InvalidConfig(format!(
                "store.chunk_overlap_percent must be in [0, 1), got {}",
                self.chunk_overlap_percent
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig("store.fetch_timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
