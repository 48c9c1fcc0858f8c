// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Per-layer file filtering for `pack()` (§4.2.1).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    /// Paths, relative to `files/`, that survive filtering
    pub kept: BTreeSet<PathBuf>,
    /// Set when at least one file was dropped by an exclude rule
    pub minified: bool,
}

fn expand(paths: &[PathBuf], all_files: &[PathBuf]) -> BTreeSet<PathBuf> {
    let mut expanded = BTreeSet::new();
    for requested in paths {
        for file in all_files {
            if file == requested || file.starts_with(requested) {
                expanded.insert(file.clone());
            }
        }
    }
    expanded
}

/// `all_files` is the recursive listing of `files/`, as relative paths.
/// `include`/`exclude` are relative paths inside `files/`, which may name a
/// directory (recursively expanded against `all_files`).
pub fn filter_files(
    all_files: &[PathBuf],
    include: &[PathBuf],
    exclude: &[PathBuf],
) -> FilterResult {
    let expanded_excludes = expand(exclude, all_files);
    let expanded_includes = expand(include, all_files);
    let final_excludes: BTreeSet<PathBuf> = expanded_excludes
        .difference(&expanded_includes)
        .cloned()
        .collect();
    let all: BTreeSet<PathBuf> = all_files.iter().cloned().collect();
    let kept: BTreeSet<PathBuf> = all.difference(&final_excludes).cloned().collect();
    FilterResult {
        minified: !final_excludes.is_empty(),
        kept,
    }
}

/// Recursively list every regular file and symlink under `files_dir`, as
/// paths relative to it.
pub fn list_files(files_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(files_dir).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(files_dir) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(out)
}

/// Materialize the kept set into `dest_files_dir`: hard-link regular files,
/// recreate symlinks, and create any directories needed along the way.
pub fn apply(files_dir: &Path, kept: &BTreeSet<PathBuf>, dest_files_dir: &Path) -> Result<()> {
    for rel in kept {
        let source = files_dir.join(rel);
        let dest = dest_files_dir.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let meta = std::fs::symlink_metadata(&source)?;
        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&source)?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(target, &dest)?;
            #[cfg(not(unix))]
            std::fs::copy(&source, &dest)?;
        } else {
            std::fs::hard_link(&source, &dest).or_else(|_| std::fs::copy(&source, &dest).map(|_| ()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_empty_rules_keeps_everything() {
        let all = paths(&["bin/hello", "lib/libfoo.so", "share/doc/readme"]);
        let result = filter_files(&all, &[], &[]);
        assert!(!result.minified);
        assert_eq!(result.kept.len(), 3);
    }

    #[test]
    fn test_exclude_directory_drops_its_contents() {
        let all = paths(&["bin/hello", "share/locale/en/a.mo", "share/locale/fr/b.mo"]);
        let result = filter_files(&all, &[], &paths(&["share/locale"]));
        assert!(result.minified);
        assert_eq!(result.kept, paths(&["bin/hello"]).into_iter().collect());
    }

    #[test]
    fn test_include_overrides_overlapping_exclude() {
        let all = paths(&["share/locale/en/a.mo", "share/locale/fr/b.mo"]);
        let result = filter_files(
            &all,
            &paths(&["share/locale/en"]),
            &paths(&["share/locale"]),
        );
        assert!(result.minified);
        assert_eq!(
            result.kept,
            paths(&["share/locale/en/a.mo"]).into_iter().collect()
        );
    }
}
