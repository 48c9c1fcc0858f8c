// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Fetches one project `Source` into `linglong/sources/<name>/` (§4.3
//! stage 2).
//!
//! Retrieval itself is behind the [`Fetcher`] trait: this crate is
//! concerned with digest verification, extraction and layout, not with
//! the transport a production build host uses to reach a URL. A
//! production builder supplies a `Fetcher` backed by whatever HTTP/git
//! client it already depends on.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use linyaps_digest::Digest;
use linyaps_ident::Source;

use crate::error::{Error, Result};

/// Progress tuple emitted while a source is being fetched, per the
/// callback interface in §4.3 stage 2.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub name: String,
    pub kind: &'static str,
    pub url: String,
    pub status: String,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: FetchProgress);
}

pub struct NullProgress;
impl ProgressSink for NullProgress {
    fn report(&self, _progress: FetchProgress) {}
}

/// Retrieves a URL to a local cache file, and clones/checks out a git
/// repository. Implementations decide how `archive`/`file`/`dsc`
/// sources reach the local filesystem; `git` is handled by this trait
/// too since cloning is itself a network operation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
    async fn git_checkout(&self, url: &str, dest: &Path, commit: Option<&str>, version: Option<&str>) -> Result<()>;
}

fn kind_str(source: &Source) -> &'static str {
    match source {
        Source::Archive { .. } => "archive",
        Source::Git { .. } => "git",
        Source::File { .. } => "file",
        Source::Dsc { .. } => "dsc",
    }
}

fn verify_digest(name: &str, path: &Path, expected: &str) -> Result<()> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let actual = Digest::from_reader(buf.as_slice())?.to_string();
    if actual != expected {
        return Err(Error::DigestMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Extract a downloaded archive into `dest`, dispatching on its file
/// extension (tar, tar.gz/tgz, tar.bz2, tar.xz, zip).
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let name = archive.to_string_lossy();
    let file = std::fs::File::open(archive)?;

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let decoder = flate2::read::GzDecoder::new(file);
        tar::Archive::new(decoder).unpack(dest)?;
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        let decoder = bzip2::read::BzDecoder::new(file);
        tar::Archive::new(decoder).unpack(dest)?;
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        let decoder = xz2::read::XzDecoder::new(file);
        tar::Archive::new(decoder).unpack(dest)?;
    } else if name.ends_with(".tar") {
        tar::Archive::new(file).unpack(dest)?;
    } else if name.ends_with(".zip") {
        let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::UnsupportedArchive(e.to_string()))?;
        archive.extract(dest).map_err(|e| Error::UnsupportedArchive(e.to_string()))?;
    } else {
        return Err(Error::UnsupportedArchive(name.into_owned()));
    }
    Ok(())
}

/// Fetch one `Source` into `sources_dir/<name>/`, returning that path.
pub async fn fetch(
    fetcher: &dyn Fetcher,
    progress: &dyn ProgressSink,
    cache_dir: &Path,
    sources_dir: &Path,
    source: &Source,
) -> Result<PathBuf> {
    let name = source.name();
    let kind = kind_str(source);
    let dest = sources_dir.join(&name);
    std::fs::create_dir_all(sources_dir)?;

    progress.report(FetchProgress {
        name: name.clone(),
        kind,
        url: source_url(source).to_string(),
        status: "fetching".to_string(),
    });

    match source {
        Source::Archive { url, digest, .. } => {
            let digest = digest.as_ref().ok_or_else(|| Error::SourceMissingDigest { name: name.clone() })?;
            std::fs::create_dir_all(cache_dir)?;
            let cached = cache_dir.join(&name);
            fetcher.download(url, &cached).await?;
            verify_digest(&name, &cached, digest)?;
            extract_archive(&cached, &dest)?;
        }
        Source::Git { url, commit, version, .. } => {
            fetcher.git_checkout(url, &dest, commit.as_deref(), version.as_deref()).await?;
        }
        Source::File { url, digest, .. } => {
            let digest = digest.as_ref().ok_or_else(|| Error::SourceMissingDigest { name: name.clone() })?;
            fetcher.download(url, &dest).await?;
            verify_digest(&name, &dest, digest)?;
        }
        Source::Dsc { url, digest, .. } => {
            let digest = digest.as_ref().ok_or_else(|| Error::SourceMissingDigest { name: name.clone() })?;
            std::fs::create_dir_all(cache_dir)?;
            let cached = cache_dir.join(&name);
            fetcher.download(url, &cached).await?;
            verify_digest(&name, &cached, digest)?;
            extract_archive(&cached, &dest)?;
        }
    }

    progress.report(FetchProgress {
        name: name.clone(),
        kind,
        url: source_url(source).to_string(),
        status: "done".to_string(),
    });
    Ok(dest)
}

fn source_url(source: &Source) -> &str {
    match source {
        Source::Archive { url, .. } | Source::Git { url, .. } | Source::File { url, .. } | Source::Dsc { url, .. } => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeFetcher {
        contents: Vec<u8>,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn download(&self, _url: &str, dest: &Path) -> Result<()> {
            std::fs::write(dest, &self.contents)?;
            Ok(())
        }
        async fn git_checkout(&self, _url: &str, dest: &Path, _commit: Option<&str>, _version: Option<&str>) -> Result<()> {
            std::fs::create_dir_all(dest)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_file_source_rejects_digest_mismatch() {
        let fetcher = FakeFetcher { contents: b"hello".to_vec() };
        let tmp = tempfile::tempdir().unwrap();
        let source = Source::File {
            url: "https://example.com/hello".to_string(),
            digest: Some("deadbeef".to_string()),
            name: Some("hello".to_string()),
        };
        let err = fetch(&fetcher, &NullProgress, &tmp.path().join("cache"), &tmp.path().join("sources"), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
    }

    #[tokio::test]
    async fn test_file_source_accepts_matching_digest() {
        let contents = b"hello".to_vec();
        let digest = Digest::from_reader(contents.as_slice()).unwrap().to_string();
        let fetcher = FakeFetcher { contents };
        let tmp = tempfile::tempdir().unwrap();
        let source = Source::File {
            url: "https://example.com/hello".to_string(),
            digest: Some(digest),
            name: Some("hello".to_string()),
        };
        let dest = fetch(&fetcher, &NullProgress, &tmp.path().join("cache"), &tmp.path().join("sources"), &source)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_progress_reports_fetching_then_done() {
        struct Recording(Mutex<Vec<String>>);
        impl ProgressSink for Recording {
            fn report(&self, progress: FetchProgress) {
                self.0.lock().unwrap().push(progress.status);
            }
        }
        let sink = Recording(Mutex::new(Vec::new()));
        let fetcher = FakeFetcher { contents: b"data".to_vec() };
        let tmp = tempfile::tempdir().unwrap();
        let source = Source::Git {
            url: "https://example.com/repo.git".to_string(),
            commit: Some("abc123".to_string()),
            version: None,
            name: Some("repo".to_string()),
            patch: vec![],
        };
        fetch(&fetcher, &sink, &tmp.path().join("cache"), &tmp.path().join("sources"), &source)
            .await
            .unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec!["fetching".to_string(), "done".to_string()]);
    }
}
