use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use swaparena::{ArenaOptions, PagingOptions};
use thiserror::Error;

/// Settings layered under command-line flags.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn paging_options(&self) -> PagingOptions {
        let raw = &self.data.paging;
        let mut opts = PagingOptions::default();
        if let Some(shift) = raw.page_shift {
            opts = opts.page_shift(shift);
        }
        if let Some(percent) = raw.memory_threshold_percent {
            opts = opts.memory_threshold_percent(percent);
        }
        if let Some(bytes) = raw.memory_ceiling_bytes {
            opts = opts.memory_ceiling_bytes(bytes);
        }
        if let Some(pages) = raw.resident_page_budget {
            opts = opts.resident_page_budget(pages);
        }
        if let Some(pages) = raw.batch_size {
            opts = opts.batch_size(pages);
        }
        if let Some(interval) = raw.check_interval {
            opts = opts.check_interval(interval);
        }
        if let Some(dir) = &raw.swap_dir {
            opts = opts.swap_dir(dir.clone());
        }
        opts
    }

    pub fn arena_options(&self) -> ArenaOptions {
        let raw = &self.data.arena;
        let mut opts = ArenaOptions::default();
        if let Some(dedup) = raw.dedup_strings {
            opts = opts.dedup_strings(dedup);
        }
        if let Some(buckets) = raw.string_buckets {
            opts = opts.string_buckets(buckets);
        }
        opts
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    paging: PagingSection,
    #[serde(default)]
    arena: ArenaSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PagingSection {
    page_shift: Option<u32>,
    memory_threshold_percent: Option<u8>,
    memory_ceiling_bytes: Option<u64>,
    resident_page_budget: Option<usize>,
    batch_size: Option<usize>,
    check_interval: Option<usize>,
    swap_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ArenaSection {
    dedup_strings: Option<bool>,
    string_buckets: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("swaparena").join("config.toml"))
}
