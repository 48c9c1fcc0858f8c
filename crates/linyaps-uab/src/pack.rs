// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Assembles a set of layer directories and a pre-built loader binary
//! into a single-file UAB executable (§4.2, §6).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use linyaps_digest::Digest;
use linyaps_ident::{Kind, PackageInfo};
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::filter::{self, FilterResult};
use crate::meta::{UabLayerMeta, UabMetaInfo, UabSections, META_VERSION};
use crate::section;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// One layer directory to fold into the bundle, with the same
/// include/exclude rules `linglong.yaml`'s `package.uab` table exposes.
pub struct LayerInput {
    pub info: PackageInfo,
    pub dir: PathBuf,
    pub include: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
}

pub struct PackOptions {
    pub loader_path: PathBuf,
    pub layers: Vec<LayerInput>,
    pub icon: Option<PathBuf>,
    pub only_app: Option<bool>,
    pub output: PathBuf,
}

async fn run_checked(mut command: Command) -> Result<()> {
    let program = format!("{:?}", command.as_std().get_program());
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let child = command.spawn().map_err(Error::Io)?;
    let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| Error::CommandTimeout(program.clone()))?
        .map_err(Error::Io)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let tail: String = stderr.chars().rev().take(2000).collect::<String>().chars().rev().collect();
        return Err(Error::CommandFailed {
            command: program,
            code: output.status.code(),
            stderr_tail: tail,
        });
    }
    Ok(())
}

fn kind_str(kind: Kind) -> &'static str {
    match kind {
        Kind::App => "app",
        Kind::Runtime => "runtime",
        Kind::Base => "base",
    }
}

fn layer_slot(info: &PackageInfo) -> String {
    format!("{}-{}-{}-{}", kind_str(info.kind), info.id, info.version, info.module)
}

/// Pack `options.layers` plus `options.loader_path` into `options.output`.
/// Returns the metadata that was embedded.
pub async fn pack(options: &PackOptions) -> Result<UabMetaInfo> {
    let has_app = options
        .layers
        .iter()
        .any(|layer| layer.info.kind == Kind::App && layer.info.module == "binary");
    if !has_app {
        return Err(Error::AppLayerMissing);
    }

    let workdir = tempfile::tempdir().map_err(Error::Io)?;
    let bundle_dir = workdir.path().join("bundle");
    std::fs::create_dir_all(&bundle_dir).map_err(Error::Io)?;

    let mut layer_metas = Vec::with_capacity(options.layers.len());
    for layer in &options.layers {
        let slot = layer_slot(&layer.info);
        let dest_dir = bundle_dir.join("layers").join(&slot);
        let files_dir = layer.dir.join("files");
        std::fs::create_dir_all(dest_dir.join("files")).map_err(Error::Io)?;

        let minified = if files_dir.is_dir() {
            let all_files = filter::list_files(&files_dir)?;
            let FilterResult { kept, minified } =
                filter::filter_files(&all_files, &layer.include, &layer.exclude);
            filter::apply(&files_dir, &kept, &dest_dir.join("files"))?;
            minified
        } else {
            false
        };

        let info_json = serde_json::to_vec_pretty(&layer.info)?;
        std::fs::write(dest_dir.join("info.json"), info_json).map_err(Error::Io)?;

        layer_metas.push(UabLayerMeta {
            info: layer.info.clone(),
            minified,
        });
    }

    let erofs_path = workdir.path().join("linglong.bundle");
    let mut mkfs = Command::new("mkfs.erofs");
    mkfs.arg("-zlz4hc").arg(&erofs_path).arg(&bundle_dir);
    tracing::debug!(layers = options.layers.len(), "building erofs image");
    run_checked(mkfs).await?;

    let digest = Digest::from_reader(std::fs::File::open(&erofs_path).map_err(Error::Io)?)?.to_string();
    tracing::info!(output = %options.output.display(), %digest, "packed uab");

    if let Some(parent) = options.output.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    std::fs::copy(&options.loader_path, &options.output).map_err(Error::Io)?;

    let icon_section = if let Some(icon) = &options.icon {
        section::add(&options.output, "linglong.icon", icon).await?;
        Some("linglong.icon".to_string())
    } else {
        None
    };

    let meta = UabMetaInfo {
        version: META_VERSION.to_string(),
        uuid: Uuid::new_v4().to_string(),
        digest,
        only_app: options.only_app,
        sections: UabSections {
            bundle: "linglong.bundle".to_string(),
            icon: icon_section,
        },
        layers: layer_metas,
    };

    let meta_path = workdir.path().join("linglong.meta");
    std::fs::write(&meta_path, serde_json::to_vec(&meta)?).map_err(Error::Io)?;

    section::add(&options.output, "linglong.meta", &meta_path).await?;
    section::add(&options.output, &meta.sections.bundle, &erofs_path).await?;

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info(kind: Kind) -> PackageInfo {
        PackageInfo {
            id: "org.foo.bar".into(),
            name: "bar".into(),
            kind,
            version: linyaps_ident::Version::new(1, 0, 0, 0),
            arch: vec![linyaps_ident::Arch::X86_64],
            channel: "main".into(),
            module: "binary".into(),
            base: None,
            runtime: None,
            command: vec!["bar".into()],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: linyaps_ident::SCHEMA_VERSION.to_string(),
            uuid: None,
        }
    }

    #[test]
    fn test_layer_slot_is_stable_for_same_reference_and_module() {
        let info = test_info(Kind::App);
        assert_eq!(layer_slot(&info), layer_slot(&info));
        assert_eq!(layer_slot(&info), "app-org.foo.bar-1.0.0.0-binary");
    }
}
