// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Generate entries: copies host-visible desktop integration files out
//! of the build output into a sibling `entries/` tree (§4.3 stage 6).

use std::path::Path;

use crate::error::Result;

/// Subdirectories of `files/` copied verbatim into `entries/`, paired
/// with the destination they land at (most map to themselves; the
/// deprecated `share/appdata` name is additionally mirrored into
/// `share/metainfo` rather than losing the original directory).
const ENTRY_DIRS: &[(&str, &str)] = &[
    ("share/applications", "share/applications"),
    ("share/mime", "share/mime"),
    ("share/icons", "share/icons"),
    ("share/dbus-1", "share/dbus-1"),
    ("share/gnome-shell", "share/gnome-shell"),
    ("share/appdata", "share/appdata"),
    ("share/appdata", "share/metainfo"),
    ("share/metainfo", "share/metainfo"),
    ("share/plugins", "share/plugins"),
    ("share/systemd", "share/systemd"),
    ("share/deepin-manual", "share/deepin-manual"),
];

/// Recursively copy `src` into `dest`, recreating directories and
/// symlinks rather than following them.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).expect("walkdir yields descendants of src");
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.path_is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(link, &target)?;
            #[cfg(not(unix))]
            std::fs::copy(&link, &target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy the entry directories out of `files_dir` into `entries_dir`,
/// then relocate `lib/systemd/user` into `entries/share/systemd/user`.
pub fn generate(files_dir: &Path, entries_dir: &Path) -> Result<()> {
    for (src_name, dest_name) in ENTRY_DIRS {
        let src = files_dir.join(src_name);
        if !src.exists() {
            continue;
        }
        copy_tree(&src, &entries_dir.join(dest_name))?;
    }

    let systemd_user = files_dir.join("lib/systemd/user");
    if systemd_user.exists() {
        copy_tree(&systemd_user, &entries_dir.join("share/systemd/user"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_generate_copies_applications_and_icons() {
        let files = tempfile::tempdir().unwrap();
        let entries = tempfile::tempdir().unwrap();
        touch(files.path(), "share/applications/hello.desktop");
        touch(files.path(), "share/icons/hicolor/hello.png");

        generate(files.path(), entries.path()).unwrap();

        assert!(entries.path().join("share/applications/hello.desktop").exists());
        assert!(entries.path().join("share/icons/hicolor/hello.png").exists());
    }

    #[test]
    fn test_generate_mirrors_appdata_into_metainfo() {
        let files = tempfile::tempdir().unwrap();
        let entries = tempfile::tempdir().unwrap();
        touch(files.path(), "share/appdata/hello.appdata.xml");

        generate(files.path(), entries.path()).unwrap();

        assert!(entries.path().join("share/metainfo/hello.appdata.xml").exists());
        assert!(entries.path().join("share/appdata/hello.appdata.xml").exists());
    }

    #[test]
    fn test_generate_relocates_systemd_user_units() {
        let files = tempfile::tempdir().unwrap();
        let entries = tempfile::tempdir().unwrap();
        touch(files.path(), "lib/systemd/user/hello.service");

        generate(files.path(), entries.path()).unwrap();

        assert!(entries.path().join("share/systemd/user/hello.service").exists());
    }
}
