// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Commit: writes `info.json` for each module, imports it into the
//! layer store, merges the modules, and copies `linglong.yaml`
//! alongside each for reproducibility (§4.3 stage 8).

use std::path::{Path, PathBuf};

use linyaps_ident::{Arch, FuzzyReference, PackageInfo, Reference, Version};
use linyaps_store::LayerStore;

use crate::error::Result;

fn directory_size(dir: &Path) -> u64 {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// One module directory ready to be written and committed.
pub struct ModuleCommit {
    pub module: String,
    pub dir: PathBuf,
}

/// Remove any existing store entries for `reference`'s id/version
/// across all modules, so a rebuild of the same version starts clean.
pub async fn clear_previous<S: LayerStore>(store: &S, id: &str, version: &Version, arch: Arch) -> Result<()> {
    for module in ["binary", "develop"] {
        let reference = Reference::new(id, version.clone(), arch, module);
        let _ = store.remove(&reference, None).await;
    }
    Ok(())
}

/// Write `info.json` and `linglong.yaml` into each module directory,
/// then import every module and merge them in the store.
pub async fn commit<S: LayerStore>(
    store: &S,
    base: &PackageInfo,
    manifest_yaml: &str,
    modules: &[ModuleCommit],
) -> Result<Reference> {
    let mut last = None;
    for entry in modules {
        let mut info = base.clone();
        info.module = entry.module.clone();
        info.size = directory_size(&entry.dir);

        std::fs::write(entry.dir.join("info.json"), serde_json::to_vec_pretty(&info)?)?;
        std::fs::write(entry.dir.join("linglong.yaml"), manifest_yaml)?;

        let reference = store.import_layer_dir(&entry.dir, None).await?;
        last = Some(reference);
    }

    let reference = last.expect("commit is called with at least one module");
    store.merge_modules(&reference, None).await?;
    Ok(reference)
}

/// Resolve the just-committed reference back out of the store so the
/// caller can export it, without needing to thread it through.
pub async fn resolve_committed<S: LayerStore>(store: &S, id: &str, version: &Version, arch: Arch) -> Result<Reference> {
    let fuzzy = FuzzyReference {
        channel: None,
        id: id.to_string(),
        version: Some(version.clone()),
        arch: Some(arch),
        module: Some("binary".to_string()),
    };
    Ok(store.clear_reference(&fuzzy, false, false).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linyaps_ident::Kind;
    use linyaps_store::local::LocalStore;

    fn base_info() -> PackageInfo {
        PackageInfo {
            id: "org.test.hello".to_string(),
            name: "hello".to_string(),
            kind: Kind::App,
            version: Version { major: 1, minor: 0, patch: 0, tweak: 0 },
            arch: vec![Arch::host().unwrap()],
            channel: "main".to_string(),
            module: "binary".to_string(),
            base: Some("main:org.test.base/1.0.0.0/x86_64/binary".parse().unwrap()),
            runtime: None,
            command: vec!["hello".to_string()],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: "1.0".to_string(),
            uuid: None,
        }
    }

    #[tokio::test]
    async fn test_commit_writes_info_and_imports_each_module() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().to_path_buf());

        let binary_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(binary_dir.path().join("files")).unwrap();
        std::fs::write(binary_dir.path().join("files/hello"), b"bin").unwrap();

        let modules = vec![ModuleCommit {
            module: "binary".to_string(),
            dir: binary_dir.path().to_path_buf(),
        }];

        let reference = commit(&store, &base_info(), "package: {}\n", &modules).await.unwrap();
        assert_eq!(reference.module, "binary");
        assert!(binary_dir.path().join("info.json").exists());
        assert!(binary_dir.path().join("linglong.yaml").exists());
    }
}
