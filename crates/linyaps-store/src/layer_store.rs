// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use linyaps_ident::{FuzzyReference, PackageInfo, Reference};

use crate::{Result, StoreConfig, Task};

/// The content-addressed layer store, consumed by the container
/// config builder, the UAB packager, the build pipeline and the
/// package manager.
///
/// This is the one component specified as an interface only (§1): a
/// production store backs this with its own on-disk object database,
/// its own locking, and a remote repository client; everything above
/// this trait is a pure function of what it returns.
#[async_trait]
pub trait LayerStore: Send + Sync {
    /// Fetch one module of `reference`, blocking until complete or
    /// canceled. Progress is reported through `task`; `task.is_canceled()`
    /// is checked between chunks so a cancellation can abort an
    /// in-flight transfer promptly.
    async fn pull(&self, task: &Task, reference: &FuzzyReference, module: &str) -> Result<Reference>;

    /// Materialize a layer already present locally into `dest_dir`.
    /// Fails with [`crate::Error::NotFound`] if absent.
    async fn checkout(&self, reference: &Reference, dest_dir: &Path) -> Result<()>;

    /// Copy a prepared layer directory (§3, Layer directory) into the
    /// store, optionally under a sub-reference such as
    /// `minified/<uab-uuid>` rather than the layer's primary slot.
    async fn import_layer_dir(&self, dir: &Path, sub_ref: Option<&str>) -> Result<Reference>;

    async fn remove(&self, reference: &Reference, sub_ref: Option<&str>) -> Result<()>;

    /// Remove any store-internal state left behind by incomplete or
    /// superseded operations.
    async fn prune(&self) -> Result<()>;

    /// Merge the named modules (or all present modules, if `None`) of
    /// one package version into a single view, as used to compose a
    /// build container's `/` and `/runtime` overlays.
    async fn merge_modules(&self, reference: &Reference, modules: Option<&[String]>) -> Result<PathBuf>;

    /// Resolve a fuzzy reference to exactly one concrete [`Reference`].
    /// `force_remote` bypasses any local match; `fallback_to_remote`
    /// allows a remote lookup when nothing local satisfies it.
    async fn clear_reference(
        &self,
        fuzzy: &FuzzyReference,
        force_remote: bool,
        fallback_to_remote: bool,
    ) -> Result<Reference>;

    async fn list_local(&self) -> Result<Vec<PackageInfo>>;

    async fn list_remote(&self, fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>>;

    /// Create host-visible desktop entries, icons and D-Bus service
    /// files for an installed application.
    async fn export_reference(&self, reference: &Reference) -> Result<()>;

    async fn unexport_reference(&self, reference: &Reference) -> Result<()>;

    /// The directory holding the merged view produced by
    /// [`LayerStore::merge_modules`], creating it on first use.
    async fn get_merged_module_dir(&self, reference: &Reference, modules: Option<&[String]>) -> Result<PathBuf>;

    fn get_config(&self) -> StoreConfig;

    async fn set_config(&self, config: StoreConfig) -> Result<()>;

    /// True when this store instance has on-disk state from a schema
    /// predating the current one and needs [`LayerStore::migrate`] run.
    fn needs_migrate(&self) -> bool {
        false
    }

    async fn migrate(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: LayerStore + ?Sized> LayerStore for std::sync::Arc<T> {
    async fn pull(&self, task: &Task, reference: &FuzzyReference, module: &str) -> Result<Reference> {
        T::pull(self, task, reference, module).await
    }

    async fn checkout(&self, reference: &Reference, dest_dir: &Path) -> Result<()> {
        T::checkout(self, reference, dest_dir).await
    }

    async fn import_layer_dir(&self, dir: &Path, sub_ref: Option<&str>) -> Result<Reference> {
        T::import_layer_dir(self, dir, sub_ref).await
    }

    async fn remove(&self, reference: &Reference, sub_ref: Option<&str>) -> Result<()> {
        T::remove(self, reference, sub_ref).await
    }

    async fn prune(&self) -> Result<()> {
        T::prune(self).await
    }

    async fn merge_modules(&self, reference: &Reference, modules: Option<&[String]>) -> Result<PathBuf> {
        T::merge_modules(self, reference, modules).await
    }

    async fn clear_reference(
        &self,
        fuzzy: &FuzzyReference,
        force_remote: bool,
        fallback_to_remote: bool,
    ) -> Result<Reference> {
        T::clear_reference(self, fuzzy, force_remote, fallback_to_remote).await
    }

    async fn list_local(&self) -> Result<Vec<PackageInfo>> {
        T::list_local(self).await
    }

    async fn list_remote(&self, fuzzy: &FuzzyReference) -> Result<Vec<PackageInfo>> {
        T::list_remote(self, fuzzy).await
    }

    async fn export_reference(&self, reference: &Reference) -> Result<()> {
        T::export_reference(self, reference).await
    }

    async fn unexport_reference(&self, reference: &Reference) -> Result<()> {
        T::unexport_reference(self, reference).await
    }

    async fn get_merged_module_dir(&self, reference: &Reference, modules: Option<&[String]>) -> Result<PathBuf> {
        T::get_merged_module_dir(self, reference, modules).await
    }

    fn get_config(&self) -> StoreConfig {
        T::get_config(self)
    }

    async fn set_config(&self, config: StoreConfig) -> Result<()> {
        T::set_config(self, config).await
    }

    fn needs_migrate(&self) -> bool {
        T::needs_migrate(self)
    }

    async fn migrate(&self) -> Result<()> {
        T::migrate(self).await
    }
}
