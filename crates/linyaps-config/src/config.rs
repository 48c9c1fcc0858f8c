// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::Result;

static CONFIG: OnceCell<RwLock<Arc<BuilderConfig>>> = OnceCell::new();

/// `config.yaml` (§6 Builder configuration). The `skip*`/`offline`
/// flags mirror `linyaps_builder::BuildConfig` one-for-one; this type
/// stays decoupled from it since it is what gets deserialized off disk.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderConfig {
    pub version: u32,
    pub repo: String,
    pub arch: Option<String>,
    #[serde(default)]
    pub skip_fetch_source: bool,
    #[serde(default)]
    pub skip_pull_depend: bool,
    #[serde(default)]
    pub skip_run_container: bool,
    #[serde(default)]
    pub skip_commit_output: bool,
    #[serde(default)]
    pub skip_check_output: bool,
    #[serde(default)]
    pub skip_strip_symbols: bool,
    #[serde(default)]
    pub offline: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            version: 1,
            repo: String::new(),
            arch: None,
            skip_fetch_source: false,
            skip_pull_depend: false,
            skip_run_container: false,
            skip_commit_output: false,
            skip_check_output: false,
            skip_strip_symbols: false,
            offline: false,
        }
    }
}

impl BuilderConfig {
    /// Get the current loaded config, loading it if needed.
    pub fn current() -> Result<Arc<Self>> {
        get_config()
    }

    /// Load the config from disk, even if it has already been loaded.
    pub fn load() -> Result<Self> {
        load_config(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Make this config the current global one.
    pub fn make_current(self) -> Result<Arc<Self>> {
        let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<BuilderConfig>>> {
            Ok(RwLock::new(Arc::new(self.clone())))
        })?;

        let mut lock = config
            .write()
            .map_err(|err| crate::Error::LockPoisonedWrite(err.to_string()))?;
        *Arc::make_mut(&mut lock) = self;
        Ok(Arc::clone(&lock))
    }
}

/// Get the current builder config, fetching it from disk if needed.
pub fn get_config() -> Result<Arc<BuilderConfig>> {
    let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<BuilderConfig>>> {
        let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Ok(RwLock::new(Arc::new(load_config(&start)?)))
    })?;
    let lock = config
        .read()
        .map_err(|err| crate::Error::LockPoisonedRead(err.to_string()))?;
    Ok(Arc::clone(&*lock))
}

/// Walk upward from `start` looking for `.ll-builder/config.yaml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(".ll-builder/config.yaml");
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

/// Load the builder configuration from disk, even if it has already
/// been loaded. Search order per §6: the nearest ancestor's
/// `.ll-builder/config.yaml`, then `$XDG_CONFIG_HOME/linglong/builder/config.yaml`,
/// then the system `/etc/linglong/builder/config.yaml`, then the
/// system datadir `/usr/share/linglong/builder/config.yaml`.
pub fn load_config(start: &Path) -> Result<BuilderConfig> {
    use config::{Config as RawConfig, File, FileFormat};

    let user_config = dirs::config_dir()
        .map(|dir| dir.join("linglong/builder/config.yaml"))
        .unwrap_or_else(|| PathBuf::from("/nonexistent"));

    let mut builder = RawConfig::builder()
        .add_source(File::new("/usr/share/linglong/builder/config.yaml", FileFormat::Yaml).required(false))
        .add_source(File::new("/etc/linglong/builder/config.yaml", FileFormat::Yaml).required(false))
        .add_source(File::from(user_config).format(FileFormat::Yaml).required(false));

    if let Some(project_config) = find_project_config(start) {
        builder = builder.add_source(File::from(project_config).format(FileFormat::Yaml).required(false));
    }

    for (var, value) in std::env::vars() {
        let Some(tail) = var.strip_prefix("LINGLONG_") else {
            continue;
        };
        let key = tail.to_lowercase();
        builder = builder.set_override(key, value)?;
    }

    let config = builder.build()?;
    Ok(BuilderConfig::deserialize(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_find_project_config_walks_up_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let config_dir = tmp.path().join(".ll-builder");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.yaml"), "version: 1\nrepo: main").unwrap();

        let found = find_project_config(&nested).unwrap();
        assert_eq!(found, config_dir.join("config.yaml"));
    }

    #[test]
    fn test_load_config_reads_project_yaml_and_defaults_skip_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join(".ll-builder");
        std::fs::create_dir_all(&config_dir).unwrap();
        let mut f = std::fs::File::create(config_dir.join("config.yaml")).unwrap();
        writeln!(f, "version: 1\nrepo: stable\noffline: true").unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.repo, "stable");
        assert!(config.offline);
        assert!(!config.skip_fetch_source);
    }
}
