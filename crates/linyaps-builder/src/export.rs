// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Export: packages a committed reference's modules as standalone
//! `.layer` files, or the full app/runtime/base chain as a UAB (§4.3.2,
//! §6 Layer file format).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use linyaps_ident::PackageInfo;
use linyaps_store::LayerStore;
use linyaps_uab::{LayerInput, PackOptions};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

const MAGIC: &[u8] = b"linglong-layer";
const LAYER_FORMAT_VERSION: u32 = 1;
const MKFS_TIMEOUT: Duration = Duration::from_secs(600);

/// Write `checkout_dir` (a store checkout of one module) as a
/// single-file `.layer`: a 40-byte header, the meta JSON, then an
/// EROFS image of the directory.
pub async fn export_layer(info: &PackageInfo, checkout_dir: &Path, dest_file: &Path) -> Result<()> {
    let arch = info.arch.first().copied().unwrap_or(linyaps_ident::Arch::X86_64);
    let image = checkout_dir.with_extension("erofs");
    build_erofs(checkout_dir, &image).await?;

    let meta_json = serde_json::to_vec(info)?;
    let mut header = Vec::with_capacity(40);
    header.extend_from_slice(MAGIC);
    header.resize(32, 0);
    header.extend_from_slice(&LAYER_FORMAT_VERSION.to_le_bytes());
    header.extend_from_slice(&(meta_json.len() as u32).to_le_bytes());
    debug_assert_eq!(header.len(), 40);

    let mut out = header;
    out.extend_from_slice(&meta_json);
    out.extend_from_slice(&std::fs::read(&image)?);

    let name = format!("{}_{}_{}_{}.layer", info.id, info.version, arch, info.module);
    std::fs::write(dest_file.join(name), out)?;
    let _ = std::fs::remove_file(&image);
    Ok(())
}

async fn build_erofs(src: &Path, image: &Path) -> Result<()> {
    let mut command = Command::new("mkfs.erofs");
    command.arg("-zlz4hc").arg(image).arg(src);
    command.stdout(Stdio::null()).stderr(Stdio::piped());
    let output = timeout(MKFS_TIMEOUT, command.output())
        .await
        .map_err(|_| Error::CommandTimeout("mkfs.erofs".to_string()))??;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: "mkfs.erofs".to_string(),
            code: output.status.code(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// One resolved layer of the chain (base/runtime/app), with the ABI
/// trim decision already applied: `exclude` names paths outside the
/// needed-set when trimming, empty when `--full` was requested.
pub struct ChainLayer {
    pub info: PackageInfo,
    pub checkout_dir: PathBuf,
    pub exclude: Vec<PathBuf>,
}

/// Compute the exclude set for a non-app layer when trimming: the ABI
/// blacklist (host-provided libraries never shipped) union the files
/// outside the ELF-derived needed-set.
pub fn trim_excludes(all_files: &[PathBuf], needed: &[PathBuf], blacklist: &[PathBuf]) -> Vec<PathBuf> {
    let needed: std::collections::BTreeSet<_> = needed.iter().collect();
    all_files
        .iter()
        .filter(|f| blacklist.contains(f) || !needed.contains(f))
        .cloned()
        .collect()
}

/// Build the UAB for `chain`. `full` disables ABI trimming: every
/// layer is packed with its complete file list.
pub async fn export_uab(loader_path: &Path, chain: Vec<ChainLayer>, icon: Option<PathBuf>, output: &Path, full: bool) -> Result<()> {
    let layers = chain
        .into_iter()
        .map(|layer| LayerInput {
            info: layer.info,
            dir: layer.checkout_dir,
            include: Vec::new(),
            exclude: if full { Vec::new() } else { layer.exclude },
        })
        .collect();

    let options = PackOptions {
        loader_path: loader_path.to_path_buf(),
        layers,
        icon,
        only_app: None,
        output: output.to_path_buf(),
    };
    linyaps_uab::pack(&options).await?;
    Ok(())
}

/// Materialize the checkouts for an export and delegate to
/// `export_layer` for each requested module.
pub async fn export_layers<S: LayerStore>(store: &S, reference: &linyaps_ident::Reference, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    let checkout = tempfile::tempdir()?;
    store.checkout(reference, checkout.path()).await?;

    let info_bytes = std::fs::read(checkout.path().join("info.json"))?;
    let info: PackageInfo = serde_json::from_slice(&info_bytes)?;
    export_layer(&info, checkout.path(), dest_dir).await
}

/// Read a `.layer` file's 40-byte header and meta JSON, without
/// touching the EROFS image that follows.
pub fn read_layer_meta(layer_file: &Path) -> Result<PackageInfo> {
    let bytes = std::fs::read(layer_file)?;
    if bytes.len() < 40 || &bytes[0..MAGIC.len()] != MAGIC {
        return Err(Error::UnsupportedArchive(format!("{}: not a linglong-layer file", layer_file.display())));
    }
    let meta_len = u32::from_le_bytes(bytes[36..40].try_into().expect("4 bytes")) as usize;
    let meta_json = &bytes[40..40 + meta_len];
    Ok(serde_json::from_slice(meta_json)?)
}

/// Unpack a `.layer` file's EROFS image into `dest_dir` (the inverse of
/// [`export_layer`]), via `fsck.erofs --extract` rather than mounting.
pub async fn extract_layer(layer_file: &Path, dest_dir: &Path) -> Result<PackageInfo> {
    let bytes = std::fs::read(layer_file)?;
    if bytes.len() < 40 || &bytes[0..MAGIC.len()] != MAGIC {
        return Err(Error::UnsupportedArchive(format!("{}: not a linglong-layer file", layer_file.display())));
    }
    let meta_len = u32::from_le_bytes(bytes[36..40].try_into().expect("4 bytes")) as usize;
    let meta_json = &bytes[40..40 + meta_len];
    let info: PackageInfo = serde_json::from_slice(meta_json)?;

    let image_bytes = &bytes[40 + meta_len..];
    let image_file = tempfile::NamedTempFile::new()?;
    std::fs::write(image_file.path(), image_bytes)?;

    std::fs::create_dir_all(dest_dir)?;
    let mut command = Command::new("fsck.erofs");
    command.arg(format!("--extract={}", dest_dir.display())).arg(image_file.path());
    command.stdout(Stdio::null()).stderr(Stdio::piped());
    let output = timeout(MKFS_TIMEOUT, command.output())
        .await
        .map_err(|_| Error::CommandTimeout("fsck.erofs".to_string()))??;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: "fsck.erofs".to_string(),
            code: output.status.code(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(info)
}

/// `ll-builder import <layer-or-dir>`: a prepared layer directory is
/// imported directly, a `.layer` file is extracted to a scratch
/// directory first.
pub async fn import_path<S: LayerStore>(store: &S, path: &Path) -> Result<linyaps_ident::Reference> {
    if path.is_dir() {
        return Ok(store.import_layer_dir(path, None).await?);
    }
    let scratch = tempfile::tempdir()?;
    extract_layer(path, scratch.path()).await?;
    Ok(store.import_layer_dir(scratch.path(), None).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_excludes_keeps_needed_files_and_drops_the_rest() {
        let all = vec![PathBuf::from("lib/libfoo.so"), PathBuf::from("lib/libbar.so"), PathBuf::from("lib/libbaz.so")];
        let needed = vec![PathBuf::from("lib/libfoo.so")];
        let blacklist = vec![PathBuf::from("lib/libbaz.so")];

        let mut excluded = trim_excludes(&all, &needed, &blacklist);
        excluded.sort();
        assert_eq!(excluded, vec![PathBuf::from("lib/libbar.so"), PathBuf::from("lib/libbaz.so")]);
    }

    #[test]
    fn test_trim_excludes_empty_when_everything_needed() {
        let all = vec![PathBuf::from("lib/libfoo.so")];
        let needed = vec![PathBuf::from("lib/libfoo.so")];
        assert!(trim_excludes(&all, &needed, &[]).is_empty());
    }
}
