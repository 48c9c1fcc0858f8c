// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Install-Module: splits a build output tree into module directories
//! by applying an ordered rule list (§4.3.1).

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One rule applied and what it moved, recorded so `<id>.install` can
/// be written back out next to the committed module.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    pub rule: String,
    pub moved: Vec<PathBuf>,
}

/// Every path under `root` (files, directories and symlinks), relative
/// to `root`, in deterministic order.
fn list_paths(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    paths.sort();
    paths
}

fn move_path(build_output: &Path, dest: &Path, relative: &Path) -> Result<()> {
    let source = build_output.join(relative);
    let target = dest.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if source.is_dir() && !source.is_symlink() {
        std::fs::create_dir_all(&target).map_err(|source| Error::DirectoryCreate {
            path: target.clone(),
            source,
        })?;
    } else {
        std::fs::rename(&source, &target)?;
    }
    Ok(())
}

/// Apply one module's rule list against `build_output`, moving
/// selected entries into `dest`. Entries already moved by an earlier
/// rule (tracked in `claimed`) are skipped so later rules cannot
/// reclaim them.
pub fn apply_rules(
    build_output: &Path,
    dest: &Path,
    rules: &[String],
    claimed: &mut std::collections::BTreeSet<PathBuf>,
) -> Result<Vec<AppliedRule>> {
    let mut applied = Vec::new();

    for rule in rules {
        let trimmed = rule.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let moved = if let Some(pattern) = trimmed.strip_prefix('^') {
            let re = Regex::new(pattern).map_err(|e| Error::InvalidRule(e.to_string()))?;
            let mut matched = Vec::new();
            for relative in list_paths(build_output) {
                if claimed.contains(&relative) {
                    continue;
                }
                let absolute = Path::new("/").join(&relative);
                if re.is_match(&absolute.to_string_lossy()) {
                    matched.push(relative);
                }
            }
            matched
        } else {
            let relative = PathBuf::from(trimmed.trim_start_matches('/'));
            if claimed.contains(&relative) {
                Vec::new()
            } else if build_output.join(&relative).symlink_metadata().is_ok() {
                vec![relative]
            } else {
                tracing::warn!(rule = trimmed, "install rule matched no file in the build output");
                Vec::new()
            }
        };

        for relative in &moved {
            move_path(build_output, dest, relative)?;
            claimed.insert(relative.clone());
        }
        applied.push(AppliedRule {
            rule: trimmed.to_string(),
            moved,
        });
    }

    Ok(applied)
}

/// The synthesised `binary` module: everything under `build_output`
/// not already claimed by another module's rules.
pub fn apply_remainder(
    build_output: &Path,
    dest: &Path,
    claimed: &std::collections::BTreeSet<PathBuf>,
) -> Result<Vec<PathBuf>> {
    let mut moved = Vec::new();
    for relative in list_paths(build_output) {
        if claimed.contains(&relative) {
            continue;
        }
        // A directory whose contents were all already claimed will no
        // longer exist by the time we reach it; `symlink_metadata`
        // tells us whether there's still something here to move.
        if build_output.join(&relative).symlink_metadata().is_err() {
            continue;
        }
        move_path(build_output, dest, &relative)?;
        moved.push(relative);
    }
    Ok(moved)
}

/// Render the applied rule list in the `<id>.install` format: one rule
/// per line, in the order it was applied.
pub fn render_install_file(applied: &[AppliedRule]) -> String {
    applied
        .iter()
        .map(|a| a.rule.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_plain_path_rule_moves_a_single_file() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        touch(src.path(), "bin/hello");
        touch(src.path(), "lib/libhello.so");

        let mut claimed = BTreeSet::new();
        let applied = apply_rules(src.path(), dest.path(), &["bin/hello".to_string()], &mut claimed).unwrap();

        assert_eq!(applied[0].moved, vec![PathBuf::from("bin/hello")]);
        assert!(dest.path().join("bin/hello").exists());
        assert!(!src.path().join("bin/hello").exists());
        assert!(src.path().join("lib/libhello.so").exists());
    }

    #[test]
    fn test_regex_rule_moves_all_matches_and_preserves_structure() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        touch(src.path(), "include/foo.h");
        touch(src.path(), "include/sub/bar.h");
        touch(src.path(), "bin/hello");

        let mut claimed = BTreeSet::new();
        let rules = vec![r"^/include/.+".to_string()];
        let applied = apply_rules(src.path(), dest.path(), &rules, &mut claimed).unwrap();

        let mut moved = applied[0].moved.clone();
        moved.sort();
        assert_eq!(
            moved,
            vec![PathBuf::from("include/foo.h"), PathBuf::from("include/sub/bar.h")]
        );
        assert!(dest.path().join("include/sub/bar.h").exists());
        assert!(src.path().join("bin/hello").exists());
    }

    #[test]
    fn test_later_rule_cannot_reclaim_an_already_moved_file() {
        let src = tempfile::tempdir().unwrap();
        let dest_a = tempfile::tempdir().unwrap();
        let dest_b = tempfile::tempdir().unwrap();
        touch(src.path(), "lib/libhello.a");

        let mut claimed = BTreeSet::new();
        apply_rules(src.path(), dest_a.path(), &[r"^/lib/.+\.a$".to_string()], &mut claimed).unwrap();
        let applied_b = apply_rules(src.path(), dest_b.path(), &[r"^/lib/.+\.a$".to_string()], &mut claimed).unwrap();

        assert!(applied_b[0].moved.is_empty());
        assert!(dest_a.path().join("lib/libhello.a").exists());
        assert!(!dest_b.path().join("lib/libhello.a").exists());
    }

    #[test]
    fn test_remainder_captures_everything_unclaimed() {
        let src = tempfile::tempdir().unwrap();
        let binary_dest = tempfile::tempdir().unwrap();
        touch(src.path(), "bin/hello");
        touch(src.path(), "include/foo.h");

        let mut claimed = BTreeSet::new();
        let develop_dest = tempfile::tempdir().unwrap();
        apply_rules(src.path(), develop_dest.path(), &[r"^/include/.+".to_string()], &mut claimed).unwrap();

        let moved = apply_remainder(src.path(), binary_dest.path(), &claimed).unwrap();
        assert_eq!(moved, vec![PathBuf::from("bin/hello")]);
        assert!(binary_dest.path().join("bin/hello").exists());
    }

    #[test]
    fn test_render_install_file_lists_rules_in_order() {
        let applied = vec![
            AppliedRule { rule: "bin/hello".to_string(), moved: vec![] },
            AppliedRule { rule: r"^/include/.+".to_string(), moved: vec![] },
        ];
        assert_eq!(render_install_file(&applied), "bin/hello\n^/include/.+\n");
    }
}
