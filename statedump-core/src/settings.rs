//! Clap-free settings for the orchestrator.

use camino::Utf8PathBuf;
use statedump_unpack::DEFAULT_MAX_TOTAL_BYTES;

/// Placeholder used for every required secret in unattended imports.
pub const DEFAULT_PLACEHOLDER_SECRET: &str = "foo123";

#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Root of the filesystem configuration store.
    pub store_root: Utf8PathBuf,
    /// Base directory holding one subdirectory per template.
    pub templates_dir: Option<Utf8PathBuf>,
    /// Where scratch directories for archives are created.
    pub temp_root: Option<Utf8PathBuf>,

    // Limits
    pub max_total_bytes: u64,

    // Import behaviour
    pub merge_crypto_tokens: bool,
    pub lockdown_after_import: bool,
    pub placeholder_secret: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            store_root: Utf8PathBuf::from("statedump-store"),
            templates_dir: None,
            temp_root: None,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            merge_crypto_tokens: true,
            lockdown_after_import: false,
            placeholder_secret: DEFAULT_PLACEHOLDER_SECRET.to_string(),
        }
    }
}

impl ImportSettings {
    /// Per-call options seeded from these settings.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            merge_crypto_tokens: self.merge_crypto_tokens,
            overrides_file: None,
            lockdown_after_import: self.lockdown_after_import,
        }
    }
}

/// Options for one dry run or commit.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub merge_crypto_tokens: bool,
    /// `None` means `overrides.properties` inside the staged directory.
    pub overrides_file: Option<Utf8PathBuf>,
    pub lockdown_after_import: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportSettings::default().import_options()
    }
}
