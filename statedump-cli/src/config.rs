//! Configuration file loading for statedump.
//!
//! Discovers and loads `statedump.toml` from the config directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use statedump_core::ImportSettings;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "statedump.toml";

/// Top-level configuration from statedump.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatedumpConfig {
    pub store: StoreConfig,
    pub templates: TemplatesConfig,
    pub limits: LimitsConfig,
    pub import: ImportConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root of the configuration store.
    pub root: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Directory holding one subdirectory per template.
    pub dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Cap on decompressed bytes per archive.
    pub max_total_bytes: Option<u64>,

    /// Where archive scratch directories are created.
    pub temp_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub merge_crypto_tokens: Option<bool>,
    pub lockdown_after_import: Option<bool>,

    /// Secret handed to every crypto token by `import --auto-resolve`.
    pub placeholder_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Principals allowed to import and lock down. Empty admits everyone.
    pub principals: Vec<String>,
}

/// Discover the statedump.toml config file.
///
/// Returns `None` if no config file is found.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a statedump.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<StatedumpConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<StatedumpConfig> {
    let config: StatedumpConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return default if not found.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<StatedumpConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(StatedumpConfig::default()),
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub store_root: Option<Utf8PathBuf>,
    pub templates_dir: Option<Utf8PathBuf>,
    pub max_total_bytes: Option<u64>,
    pub no_merge_crypto_tokens: bool,
    pub lockdown_after_import: bool,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub settings: ImportSettings,
    pub principals: Vec<String>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: StatedumpConfig,
    base_dir: Utf8PathBuf,
}

impl ConfigMerger {
    /// Relative paths in `config` are resolved against `base_dir`.
    pub fn new(config: StatedumpConfig, base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
        }
    }

    /// CLI values win. Boolean flags can only switch behaviour on
    /// (`--lockdown`) or off (`--no-merge-crypto-tokens`) relative to the
    /// config file.
    pub fn merge(self, cli: &CliOverrides) -> MergedConfig {
        let defaults = ImportSettings::default();
        let resolve = |p: Utf8PathBuf| {
            if p.is_absolute() {
                p
            } else {
                self.base_dir.join(p)
            }
        };

        let store_root = match &cli.store_root {
            Some(p) => p.clone(),
            None => resolve(self.config.store.root.clone().unwrap_or(defaults.store_root)),
        };
        let templates_dir = match &cli.templates_dir {
            Some(p) => Some(p.clone()),
            None => self.config.templates.dir.clone().map(resolve),
        };
        let temp_root = self.config.limits.temp_dir.clone().map(resolve);

        let merge_crypto_tokens = !cli.no_merge_crypto_tokens
            && self
                .config
                .import
                .merge_crypto_tokens
                .unwrap_or(defaults.merge_crypto_tokens);
        let lockdown_after_import = cli.lockdown_after_import
            || self
                .config
                .import
                .lockdown_after_import
                .unwrap_or(defaults.lockdown_after_import);

        let settings = ImportSettings {
            store_root,
            templates_dir,
            temp_root,
            max_total_bytes: cli
                .max_total_bytes
                .or(self.config.limits.max_total_bytes)
                .unwrap_or(defaults.max_total_bytes),
            merge_crypto_tokens,
            lockdown_after_import,
            placeholder_secret: self
                .config
                .import
                .placeholder_secret
                .clone()
                .unwrap_or(defaults.placeholder_secret),
        };

        MergedConfig {
            settings,
            principals: self.config.access.principals.clone(),
        }
    }
}
