// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Pulls the project's `base` and optional `runtime` dependencies
//! through the layer store (§4.3 stage 3).

use std::path::PathBuf;

use linyaps_ident::{FuzzyReference, Reference};
use linyaps_store::{LayerStore, Task};

use crate::error::{Error, Result};

/// The resolved, merged dependency tree for one build: a `files/`
/// view for `base`, and optionally one for `runtime`.
pub struct ResolvedDepends {
    pub base: Reference,
    pub base_dir: PathBuf,
    pub runtime: Option<Reference>,
    pub runtime_dir: Option<PathBuf>,
}

const MODULES: &[&str] = &["binary", "develop"];

async fn pull_one<S: LayerStore>(store: &S, task: &Task, fuzzy: &FuzzyReference, offline: bool) -> Result<(Reference, PathBuf)> {
    let reference = store
        .clear_reference(fuzzy, false, !offline)
        .await
        .map_err(|_| Error::DependencyMissing(fuzzy.to_string()))?;

    for module in MODULES {
        let mut module_fuzzy = FuzzyReference::from(reference.clone());
        module_fuzzy.module = Some(module.to_string());
        if offline {
            if store.clear_reference(&module_fuzzy, false, false).await.is_err() {
                continue;
            }
        } else {
            store.pull(task, &module_fuzzy, module).await.ok();
        }
    }

    let dir = store.merge_modules(&reference, None).await?;
    Ok((reference, dir))
}

/// Resolve and pull `base` (and `runtime`, if declared), merging each
/// into a single directory ready to seed a build container's overlay.
pub async fn resolve<S: LayerStore>(
    store: &S,
    task: &Task,
    base: &FuzzyReference,
    runtime: Option<&FuzzyReference>,
    offline: bool,
) -> Result<ResolvedDepends> {
    let (base_ref, base_dir) = pull_one(store, task, base, offline).await?;

    let (runtime, runtime_dir) = match runtime {
        Some(fuzzy) => {
            let (reference, dir) = pull_one(store, task, fuzzy, offline).await?;
            (Some(reference), Some(dir))
        }
        None => (None, None),
    };

    Ok(ResolvedDepends {
        base: base_ref,
        base_dir,
        runtime,
        runtime_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linyaps_ident::{Arch, Kind, PackageInfo, Version};
    use linyaps_store::local::LocalStore;

    fn sample_info(id: &str, module: &str) -> PackageInfo {
        PackageInfo {
            id: id.to_string(),
            name: id.to_string(),
            kind: Kind::Runtime,
            version: Version { major: 1, minor: 0, patch: 0, tweak: 0 },
            arch: vec![Arch::host().unwrap()],
            channel: "main".to_string(),
            module: module.to_string(),
            base: None,
            runtime: None,
            command: vec![],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: "1.0".to_string(),
            uuid: None,
        }
    }

    fn stage_layer(root: &std::path::Path, id: &str, module: &str) {
        let dir = root.join(format!("{id}-{module}"));
        std::fs::create_dir_all(dir.join("files")).unwrap();
        std::fs::write(dir.join("info.json"), serde_json::to_vec(&sample_info(id, module)).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_offline_resolve_fails_when_base_missing_locally() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().to_path_buf());
        let task = Task::default();
        let fuzzy: FuzzyReference = "org.test.base".parse().unwrap();

        let err = resolve(&store, &task, &fuzzy, None, true).await.unwrap_err();
        assert!(matches!(err, Error::DependencyMissing(_)));
    }

    #[tokio::test]
    async fn test_offline_resolve_succeeds_when_base_present_locally() {
        let root = tempfile::tempdir().unwrap();
        let stage = tempfile::tempdir().unwrap();
        stage_layer(stage.path(), "org.test.base", "binary");

        let store = LocalStore::new(root.path().to_path_buf());
        store
            .import_layer_dir(&stage.path().join("org.test.base-binary"), None)
            .await
            .unwrap();

        let task = Task::default();
        let fuzzy: FuzzyReference = "org.test.base".parse().unwrap();
        let resolved = resolve(&store, &task, &fuzzy, None, true).await.unwrap();
        assert_eq!(resolved.base.id, "org.test.base");
        assert!(resolved.runtime.is_none());
    }
}
