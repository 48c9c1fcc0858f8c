// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! The package manager (C5, §4.4): install/uninstall/update/search
//! orchestration over a [`LayerStore`], with per-target concurrency and
//! transactional rollback.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use linyaps_ident::{FuzzyReference, PackageInfo, Reference};
use linyaps_store::LayerStore;
use uuid::Uuid;

use crate::concurrency::ActiveTargets;
use crate::error::{Error, Result};
use crate::install_file::{self, FileType};
use crate::task::{NullObserver, TaskHandle, TaskObserver, TaskState};
use crate::transaction::Transaction;

/// The component consuming [`LayerStore`] to implement the public
/// install/uninstall/update/search surface (§4.4).
pub struct PackageManager<S: LayerStore> {
    store: Arc<S>,
    active: ActiveTargets,
    tasks: Mutex<HashMap<Uuid, TaskHandleRef>>,
}

/// What [`PackageManager::cancel_task`] needs: just the cancellation
/// token, kept alive independently of the task's own future.
type TaskHandleRef = linyaps_store::CancelToken;

impl<S: LayerStore> PackageManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            active: ActiveTargets::new(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, handle: &TaskHandle) {
        self.tasks.lock().unwrap().insert(handle.id, handle.cancel.clone());
    }

    fn unregister(&self, task_id: Uuid) {
        self.tasks.lock().unwrap().remove(&task_id);
    }

    /// Cooperative cancellation (§4.4, §5). Not an error if the task
    /// already finished; cancellation is advisory and racy by design.
    pub fn cancel_task(&self, task_id: Uuid) -> Result<()> {
        let tasks = self.tasks.lock().unwrap();
        match tasks.get(&task_id) {
            Some(cancel) => {
                cancel.cancel();
                Ok(())
            }
            None => Err(Error::TaskNotFound(task_id.to_string())),
        }
    }

    /// `Install(package)`: fails if `fuzzy` already resolves to an
    /// installed reference. Returns the task id immediately paired with
    /// the eventual result, since this binding runs the operation
    /// in-line rather than handing work to a background executor.
    pub async fn install(
        &self,
        fuzzy: FuzzyReference,
        observer: Arc<dyn TaskObserver>,
    ) -> (Uuid, Result<Reference>) {
        let module = fuzzy.module_or_default().to_string();
        let handle = TaskHandle::new(observer);
        let task_id = handle.id;
        self.register(&handle);

        let guard = match self.active.acquire(&fuzzy.id, &module) {
            Ok(guard) => guard,
            Err(err) => {
                self.unregister(task_id);
                return (task_id, Err(err));
            }
        };

        let result = self.run_install(&handle, &fuzzy, &module).await;
        drop(guard);
        self.unregister(task_id);
        (task_id, result)
    }

    async fn run_install(&self, handle: &TaskHandle, fuzzy: &FuzzyReference, module: &str) -> Result<Reference> {
        let mut tx = Transaction::new();

        handle.emit(TaskState::PreInstall, format!("resolving {fuzzy}"));
        handle.check_canceled()?;
        let resolved = self.store.clear_reference(fuzzy, false, true).await?;
        if self.is_installed(&resolved).await? {
            return Err(Error::AlreadyInstalled {
                reference: resolved.to_string(),
            });
        }

        let info = self.find_remote_info(fuzzy).await?;

        handle.emit(TaskState::InstallRuntime, "pulling runtime".to_string());
        handle.check_canceled()?;
        if let Some(runtime) = &info.runtime {
            self.pull_and_track(handle, &mut tx, runtime).await?;
        }

        handle.emit(TaskState::InstallBase, "pulling base".to_string());
        handle.check_canceled()?;
        if let Some(base) = &info.base {
            self.pull_and_track(handle, &mut tx, base).await?;
        }

        handle.emit(TaskState::InstallApp, "pulling application".to_string());
        handle.check_canceled()?;
        self.pull_and_track(handle, &mut tx, &resolved).await?;

        self.store.export_reference(&resolved).await?;
        let resolved_for_rollback = resolved.clone();
        let store = self.store.clone();
        tx.on_rollback(async move {
            let _ = store.unexport_reference(&resolved_for_rollback).await;
        });

        tx.commit();
        handle.emit(TaskState::Success, format!("installed {resolved}"));
        Ok(resolved)
    }

    async fn pull_and_track(&self, handle: &TaskHandle, tx: &mut Transaction, reference: &Reference) -> Result<()> {
        let fuzzy = FuzzyReference {
            channel: Some(reference.channel.clone()),
            id: reference.id.clone(),
            version: Some(reference.version),
            arch: Some(reference.arch),
            module: Some(reference.module.clone()),
        };
        let store_task = handle.store_task();
        let pulled = self
            .store
            .pull(&store_task, &fuzzy, &reference.module)
            .await?;
        let store = self.store.clone();
        let pulled_for_rollback = pulled.clone();
        tx.on_rollback(async move {
            let _ = store.remove(&pulled_for_rollback, None).await;
        });
        Ok(())
    }

    async fn is_installed(&self, reference: &Reference) -> Result<bool> {
        let local = self.store.list_local().await?;
        Ok(local.iter().any(|info| {
            info.id == reference.id && info.version == reference.version && info.module == reference.module
        }))
    }

    async fn find_remote_info(&self, fuzzy: &FuzzyReference) -> Result<PackageInfo> {
        let candidates = self.store.list_remote(fuzzy).await?;
        candidates
            .into_iter()
            .find(|info| info.module == fuzzy.module_or_default())
            .ok_or_else(|| Error::NotInstalled {
                reference: fuzzy.to_string(),
            })
    }

    /// `InstallFromFile(fd, fileType)`: install a locally supplied
    /// `.layer` or UAB file rather than pulling from a remote.
    pub async fn install_from_file(
        &self,
        path: &Path,
        file_type: FileType,
        observer: Arc<dyn TaskObserver>,
    ) -> (Uuid, Result<Reference>) {
        let handle = TaskHandle::new(observer);
        let task_id = handle.id;
        self.register(&handle);
        let result = install_file::install_from_file(self.store.as_ref(), &handle, path, file_type).await;
        self.unregister(task_id);
        (task_id, result)
    }

    /// `Uninstall(package)`: unexport then remove every module of `reference`.
    pub async fn uninstall(&self, reference: Reference) -> Result<()> {
        let _guard = self.active.acquire(&reference.id, &reference.module)?;
        if !self.is_installed(&reference).await? {
            return Err(Error::NotInstalled {
                reference: reference.to_string(),
            });
        }
        self.store.unexport_reference(&reference).await?;
        self.store.remove(&reference, None).await?;
        Ok(())
    }

    /// `Update(package)`: install the newer remote version, swap the
    /// export over to it, then best-effort remove the old one.
    /// Any failure before the swap rolls the new install back and
    /// leaves the old export untouched.
    pub async fn update(
        &self,
        fuzzy: FuzzyReference,
        observer: Arc<dyn TaskObserver>,
    ) -> (Uuid, Result<Reference>) {
        let module = fuzzy.module_or_default().to_string();
        let handle = TaskHandle::new(observer);
        let task_id = handle.id;
        self.register(&handle);

        let guard = match self.active.acquire(&fuzzy.id, &module) {
            Ok(guard) => guard,
            Err(err) => {
                self.unregister(task_id);
                return (task_id, Err(err));
            }
        };

        let result = self.run_update(&handle, &fuzzy).await;
        drop(guard);
        self.unregister(task_id);
        (task_id, result)
    }

    async fn run_update(&self, handle: &TaskHandle, fuzzy: &FuzzyReference) -> Result<Reference> {
        let installed = self.store.clear_reference(fuzzy, false, false).await?;
        let latest = self.store.clear_reference(fuzzy, true, true).await?;
        if latest.version <= installed.version {
            return Err(Error::AlreadyUpToDate {
                reference: installed.to_string(),
            });
        }

        let mut tx = Transaction::new();
        let info = self.find_remote_info(fuzzy).await?;

        handle.emit(TaskState::InstallRuntime, "pulling runtime".to_string());
        if let Some(runtime) = &info.runtime {
            self.pull_and_track(handle, &mut tx, runtime).await?;
        }
        handle.emit(TaskState::InstallBase, "pulling base".to_string());
        if let Some(base) = &info.base {
            self.pull_and_track(handle, &mut tx, base).await?;
        }
        handle.emit(TaskState::InstallApp, "pulling application".to_string());
        self.pull_and_track(handle, &mut tx, &latest).await?;

        self.store.export_reference(&latest).await?;
        let old_for_rollback = installed.clone();
        let new_for_rollback = latest.clone();
        let store = self.store.clone();
        tx.on_rollback(async move {
            let _ = store.unexport_reference(&new_for_rollback).await;
            let _ = store.export_reference(&old_for_rollback).await;
        });

        tx.commit();
        let _ = self.store.remove(&installed, None).await;

        handle.emit(TaskState::Success, format!("updated to {latest}"));
        Ok(latest)
    }

    /// `Search(id)`.
    pub async fn search(&self, fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>> {
        Ok(self.store.list_remote(fuzzy).await?)
    }

    pub fn null_observer() -> Arc<dyn TaskObserver> {
        Arc::new(NullObserver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linyaps_ident::{Arch, Kind, Version};
    use linyaps_store::local::{LocalStore, RemoteSource};
    use tempfile::TempDir;

    struct FakeRemote {
        packages: Vec<PackageInfo>,
        source_dir: std::path::PathBuf,
    }

    #[async_trait::async_trait]
    impl RemoteSource for FakeRemote {
        async fn fetch(&self, reference: &Reference) -> linyaps_store::Result<std::path::PathBuf> {
            let dir = self.source_dir.join(&reference.id).join(reference.version.to_string());
            Ok(dir)
        }

        async fn list(&self, fuzzy: &FuzzyReference) -> linyaps_store::Result<Vec<PackageInfo>> {
            Ok(self
                .packages
                .iter()
                .filter(|info| info.id == fuzzy.id)
                .cloned()
                .collect())
        }
    }

    fn stage_package(source_dir: &Path, info: &PackageInfo) {
        let dir = source_dir.join(&info.id).join(info.version.to_string());
        std::fs::create_dir_all(dir.join("files")).unwrap();
        std::fs::write(dir.join("files/marker"), "hi").unwrap();
        std::fs::write(dir.join("info.json"), serde_json::to_string(info).unwrap()).unwrap();
    }

    fn app_info() -> PackageInfo {
        PackageInfo {
            id: "org.test.hello".into(),
            name: "hello".into(),
            kind: Kind::App,
            version: Version::new(1, 0, 0, 1),
            arch: vec![Arch::host().unwrap()],
            channel: "main".into(),
            module: "binary".into(),
            base: None,
            runtime: None,
            command: vec!["hello".into()],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: linyaps_ident::SCHEMA_VERSION.to_string(),
            uuid: None,
        }
    }

    fn build_manager(tmp: &TempDir) -> PackageManager<LocalStore> {
        let info = app_info();
        let source_dir = tmp.path().join("source");
        stage_package(&source_dir, &info);
        let remote = FakeRemote {
            packages: vec![info],
            source_dir,
        };
        let store = Arc::new(LocalStore::with_remote(tmp.path().join("store"), Arc::new(remote)));
        PackageManager::new(store)
    }

    #[tokio::test]
    async fn test_install_pulls_and_exports_a_fresh_reference() {
        let tmp = TempDir::new().unwrap();
        let manager = build_manager(&tmp);
        let fuzzy: FuzzyReference = "org.test.hello".parse().unwrap();
        let (_task_id, result) = manager.install(fuzzy, PackageManager::<LocalStore>::null_observer()).await;
        let reference = result.unwrap();
        assert_eq!(reference.id, "org.test.hello");
    }

    #[tokio::test]
    async fn test_install_twice_fails_already_installed() {
        let tmp = TempDir::new().unwrap();
        let manager = build_manager(&tmp);
        let fuzzy: FuzzyReference = "org.test.hello".parse().unwrap();
        let (_, first) = manager.install(fuzzy.clone(), PackageManager::<LocalStore>::null_observer()).await;
        first.unwrap();
        let (_, second) = manager.install(fuzzy, PackageManager::<LocalStore>::null_observer()).await;
        assert!(matches!(second, Err(Error::AlreadyInstalled { .. })));
    }

    #[tokio::test]
    async fn test_uninstall_then_reinstall_succeeds() {
        let tmp = TempDir::new().unwrap();
        let manager = build_manager(&tmp);
        let fuzzy: FuzzyReference = "org.test.hello".parse().unwrap();
        let (_, first) = manager.install(fuzzy.clone(), PackageManager::<LocalStore>::null_observer()).await;
        let reference = first.unwrap();
        manager.uninstall(reference).await.unwrap();
        let (_, second) = manager.install(fuzzy, PackageManager::<LocalStore>::null_observer()).await;
        assert!(second.is_ok());
    }

    #[test]
    fn test_cancel_unknown_task_fails() {
        let tmp = TempDir::new().unwrap();
        let manager = build_manager(&tmp);
        assert!(matches!(manager.cancel_task(Uuid::new_v4()), Err(Error::TaskNotFound(_))));
    }
}
