// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Project lifecycle: `create` instantiates a template manifest;
//! `migrate` runs the store's data migration hook when needed (§4.3.3).

use std::path::Path;

use linyaps_store::LayerStore;

use crate::error::Result;

const TEMPLATE: &str = r#"package:
  id: @ID@
  kind: app
  version: 1.0.0.0
  name: @ID@
  description: ""

base: org.deepin.base/1.0.0.0

command:
  - @ID@

build:
  script: |
    ./configure --prefix=${PREFIX}
    make -j${JOBS}
    make install
"#;

/// Instantiate a template `linglong.yaml` for a new project named
/// `id`, substituting `@ID@` throughout.
pub fn create(workdir: &Path, id: &str) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(workdir)?;
    let manifest_path = workdir.join("linglong.yaml");
    let rendered = TEMPLATE.replace("@ID@", id);
    std::fs::write(&manifest_path, rendered)?;
    Ok(manifest_path)
}

/// Run the store's migration hook if its on-disk state predates the
/// current schema.
pub async fn migrate<S: LayerStore>(store: &S) -> Result<bool> {
    if !store.needs_migrate() {
        return Ok(false);
    }
    store.migrate().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_substitutes_id_everywhere() {
        let workdir = tempfile::tempdir().unwrap();
        let manifest_path = create(workdir.path(), "org.test.hello").unwrap();
        let contents = std::fs::read_to_string(manifest_path).unwrap();
        assert!(contents.contains("id: org.test.hello"));
        assert!(contents.contains("name: org.test.hello"));
        assert!(!contents.contains("@ID@"));
    }
}
