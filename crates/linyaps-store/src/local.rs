// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! A filesystem-backed [`LayerStore`] used by tests and by tooling
//! that wants a store without a remote repository configured. This is
//! a reference implementation of the contract, not the production
//! store (§1: the store itself is an external collaborator).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use linyaps_ident::{Arch, FuzzyReference, Kind, PackageInfo, Reference};

use crate::{Error, LayerStore, Result, StoreConfig, Task};

/// A pluggable stand-in for the remote repository the production
/// store would talk to. Tests register layer directories here; `pull`
/// and `list_remote` consult it when nothing local satisfies a query.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, reference: &Reference) -> Result<PathBuf>;
    async fn list(&self, fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>>;
}

/// An empty remote, used when a test or CLI invocation runs fully
/// offline.
pub struct NoRemote;

#[async_trait]
impl RemoteSource for NoRemote {
    async fn fetch(&self, reference: &Reference) -> Result<PathBuf> {
        Err(Error::NotFoundRemote {
            reference: reference.to_string(),
        })
    }

    async fn list(&self, _fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>> {
        Ok(Vec::new())
    }
}

pub struct LocalStore {
    config: RwLock<StoreConfig>,
    remote: Arc<dyn RemoteSource>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_remote(root, Arc::new(NoRemote))
    }

    pub fn with_remote(root: impl Into<PathBuf>, remote: Arc<dyn RemoteSource>) -> Self {
        let config = StoreConfig {
            root: root.into(),
            ..Default::default()
        };
        Self {
            config: RwLock::new(config),
            remote,
        }
    }

    fn layer_path(&self, reference: &Reference) -> PathBuf {
        self.config
            .read()
            .expect("config lock poisoned")
            .repo_dir()
            .join(&reference.channel)
            .join(&reference.id)
            .join(reference.version.to_string())
            .join(reference.arch.to_string())
            .join(&reference.module)
    }

    fn info_path(&self, reference: &Reference) -> PathBuf {
        self.layer_path(reference).join("info.json")
    }

    async fn find_local(&self, fuzzy: &FuzzyReference) -> Result<Option<Reference>> {
        let all = self.list_local().await?;
        let module = fuzzy.module_or_default();
        let mut candidates: Vec<Reference> = all
            .into_iter()
            .filter(|info| {
                info.id == fuzzy.id
                    && info.module == module
                    && fuzzy.version.map(|v| v == info.version).unwrap_or(true)
                    && fuzzy.arch.map(|a| a == Arch::host().unwrap_or(a)).unwrap_or(true)
                    && fuzzy.channel.as_deref().map(|c| c == info.channel).unwrap_or(true)
            })
            .map(|info| Reference {
                channel: info.channel,
                id: info.id,
                version: info.version,
                arch: info.arch.first().copied().unwrap_or(Arch::host().unwrap_or(Arch::X86_64)),
                module: info.module,
            })
            .collect();
        candidates.sort();
        Ok(candidates.pop())
    }

    fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
        std::fs::create_dir_all(dst)?;
        for entry in walkdir_shallow(src)? {
            let rel = entry.strip_prefix(src).expect("entry under src");
            let target = dst.join(rel);
            if entry.is_dir() {
                std::fs::create_dir_all(&target)?;
            } else if entry.is_symlink() {
                let link = std::fs::read_link(&entry)?;
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let _ = std::fs::remove_file(&target);
                #[cfg(unix)]
                std::os::unix::fs::symlink(link, &target)?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&entry, &target)?;
            }
        }
        Ok(())
    }
}

/// A small recursive walk, local to this file since the fixture store
/// has no business depending on a general-purpose walker crate.
fn walkdir_shallow(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && !path.is_symlink() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    Ok(out)
}

#[async_trait]
impl LayerStore for LocalStore {
    async fn pull(&self, task: &Task, reference: &FuzzyReference, module: &str) -> Result<Reference> {
        if task.is_canceled() {
            return Err(Error::Canceled);
        }
        let mut fuzzy = reference.clone();
        fuzzy.module = Some(module.to_string());
        if let Some(found) = self.find_local(&fuzzy).await? {
            task.update_progress(1, Some(1));
            return Ok(found);
        }
        let remote_list = self.remote.list(&fuzzy).await?;
        let info = remote_list
            .into_iter()
            .max_by_key(|i| i.version)
            .ok_or_else(|| Error::NotFoundRemote {
                reference: fuzzy.to_string(),
            })?;
        let concrete = Reference {
            channel: info.channel,
            id: info.id,
            version: info.version,
            arch: info.arch.first().copied().unwrap_or(Arch::host()?),
            module: info.module,
        };
        if task.is_canceled() {
            return Err(Error::Canceled);
        }
        let dir = self.remote.fetch(&concrete).await?;
        task.update_progress(1, Some(1));
        self.import_layer_dir(&dir, None).await?;
        Ok(concrete)
    }

    async fn checkout(&self, reference: &Reference, dest_dir: &Path) -> Result<()> {
        let src = self.layer_path(reference);
        if !src.exists() {
            return Err(Error::NotFound {
                reference: reference.to_string(),
            });
        }
        Self::copy_tree(&src, dest_dir)
    }

    async fn import_layer_dir(&self, dir: &Path, sub_ref: Option<&str>) -> Result<Reference> {
        let info_text = std::fs::read_to_string(dir.join("info.json"))?;
        let info: PackageInfo = serde_json::from_str(&info_text)?;
        let mut reference = Reference {
            channel: info.channel.clone(),
            id: info.id.clone(),
            version: info.version,
            arch: info.arch.first().copied().unwrap_or(Arch::host()?),
            module: info.module.clone(),
        };
        if let Some(sub) = sub_ref {
            reference.module = format!("{}/{sub}", reference.module);
        }
        let dst = self.layer_path(&reference);
        if dst.exists() {
            std::fs::remove_dir_all(&dst)?;
        }
        Self::copy_tree(dir, &dst)?;
        Ok(reference)
    }

    async fn remove(&self, reference: &Reference, sub_ref: Option<&str>) -> Result<()> {
        let mut reference = reference.clone();
        if let Some(sub) = sub_ref {
            reference.module = format!("{}/{sub}", reference.module);
        }
        let path = self.layer_path(&reference);
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn prune(&self) -> Result<()> {
        Ok(())
    }

    async fn merge_modules(&self, reference: &Reference, modules: Option<&[String]>) -> Result<PathBuf> {
        let dest = self.get_merged_module_dir(reference, modules).await?;
        let modules: Vec<String> = match modules {
            Some(m) => m.to_vec(),
            None => self
                .list_local()
                .await?
                .into_iter()
                .filter(|i| i.id == reference.id && i.version == reference.version)
                .map(|i| i.module)
                .collect(),
        };
        for module in modules {
            let mut module_ref = reference.clone();
            module_ref.module = module;
            let src = self.layer_path(&module_ref).join("files");
            if src.exists() {
                Self::copy_tree(&src, &dest)?;
            }
        }
        Ok(dest)
    }

    async fn clear_reference(
        &self,
        fuzzy: &FuzzyReference,
        force_remote: bool,
        fallback_to_remote: bool,
    ) -> Result<Reference> {
        if !force_remote {
            if let Some(found) = self.find_local(fuzzy).await? {
                return Ok(found);
            }
        }
        if force_remote || fallback_to_remote {
            let remote_list = self.remote.list(fuzzy).await?;
            if let Some(info) = remote_list.into_iter().max_by_key(|i| i.version) {
                return Ok(Reference {
                    channel: info.channel,
                    id: info.id,
                    version: info.version,
                    arch: info.arch.first().copied().unwrap_or(Arch::host()?),
                    module: info.module,
                });
            }
        }
        Err(Error::NotFound {
            reference: fuzzy.to_string(),
        })
    }

    async fn list_local(&self) -> Result<Vec<PackageInfo>> {
        let repo_dir = self.config.read().expect("config lock poisoned").repo_dir();
        if !repo_dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for path in walkdir_shallow(&repo_dir)? {
            if path.file_name().map(|n| n == "info.json").unwrap_or(false) {
                let text = std::fs::read_to_string(&path)?;
                out.push(serde_json::from_str(&text)?);
            }
        }
        Ok(out)
    }

    async fn list_remote(&self, fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>> {
        self.remote.list(fuzzy).await
    }

    async fn export_reference(&self, reference: &Reference) -> Result<()> {
        let layers_dir = self.config.read().expect("config lock poisoned").layers_dir();
        let entries_src = self.layer_path(reference).join("entries");
        if entries_src.exists() {
            let dest = layers_dir.join(&reference.id).join("entries");
            Self::copy_tree(&entries_src, &dest)?;
        }
        Ok(())
    }

    async fn unexport_reference(&self, reference: &Reference) -> Result<()> {
        let layers_dir = self.config.read().expect("config lock poisoned").layers_dir();
        let dest = layers_dir.join(&reference.id);
        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        Ok(())
    }

    async fn get_merged_module_dir(&self, reference: &Reference, _modules: Option<&[String]>) -> Result<PathBuf> {
        let dir = self
            .config
            .read()
            .expect("config lock poisoned")
            .cache_dir()
            .join("merged")
            .join(&reference.id)
            .join(reference.version.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn get_config(&self) -> StoreConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    async fn set_config(&self, config: StoreConfig) -> Result<()> {
        *self.config.write().expect("config lock poisoned") = config;
        Ok(())
    }
}

#[cfg(test)]
mod local_store_test {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;
    use linyaps_ident::Version;

    fn write_layer(root: &Path, info: &PackageInfo) {
        let dir = root
            .join("repo")
            .join(&info.channel)
            .join(&info.id)
            .join(info.version.to_string())
            .join(info.arch.first().unwrap().to_string())
            .join(&info.module);
        std::fs::create_dir_all(dir.join("files")).unwrap();
        std::fs::write(dir.join("info.json"), serde_json::to_string(info).unwrap()).unwrap();
        std::fs::write(dir.join("files/marker"), "hi").unwrap();
    }

    fn sample_info(module: &str) -> PackageInfo {
        PackageInfo {
            id: "org.test.hello".into(),
            name: "hello".into(),
            kind: Kind::App,
            version: Version::new(1, 0, 0, 1),
            arch: vec![Arch::host().unwrap()],
            channel: "main".into(),
            module: module.into(),
            base: None,
            runtime: None,
            command: vec!["hello".into()],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: "1.0".into(),
            uuid: None,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_import_then_checkout_round_trips_files() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let layer_dir = tmp.path().join("staged");
        std::fs::create_dir_all(layer_dir.join("files")).unwrap();
        std::fs::write(layer_dir.join("files/marker"), "hi").unwrap();
        std::fs::write(
            layer_dir.join("info.json"),
            serde_json::to_string(&sample_info("binary")).unwrap(),
        )
        .unwrap();

        let reference = store.import_layer_dir(&layer_dir, None).await.unwrap();
        assert_eq!(reference.module, "binary");

        let checkout_dir = tmp.path().join("checkout");
        store.checkout(&reference, &checkout_dir).await.unwrap();
        assert_eq!(std::fs::read_to_string(checkout_dir.join("files/marker")).unwrap(), "hi");
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_local_finds_imported_layers() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        write_layer(tmp.path(), &sample_info("binary"));
        write_layer(tmp.path(), &sample_info("develop"));
        let infos = store.list_local().await.unwrap();
        assert_eq!(infos.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_pull_without_remote_fails_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let fuzzy: FuzzyReference = "org.test.hello".parse().unwrap();
        let task = Task::default();
        let result = store.pull(&task, &fuzzy, "binary").await;
        assert!(result.is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        write_layer(tmp.path(), &sample_info("binary"));
        let reference: Reference = "main:org.test.hello/1.0.0.1/x86_64/binary".parse().unwrap();
        let reference = Reference {
            arch: Arch::host().unwrap(),
            ..reference
        };
        store.remove(&reference, None).await.unwrap();
        store.remove(&reference, None).await.unwrap();
    }
}
