// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Host IPC discovery for step (9) of the assembly order: X11, D-Bus,
//! pulseaudio, gvfs, dconf, Wayland and XAUTHORITY.

use std::path::{Path, PathBuf};

/// Extract the `path=` component of a `unix:path=/run/...,guid=...` style
/// D-Bus address, as found in `DBUS_SYSTEM_BUS_ADDRESS` /
/// `DBUS_SESSION_BUS_ADDRESS`.
pub fn parse_unix_bus_path(address: &str) -> Option<PathBuf> {
    let rest = address.strip_prefix("unix:")?;
    for part in rest.split(',') {
        if let Some(path) = part.strip_prefix("path=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Whether `dir` is mode 0700 and owned by the current user, the
/// precondition before binding the rest of the runtime-dir IPC sockets.
#[cfg(unix)]
pub fn is_private_runtime_dir(dir: &Path) -> bool {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    let Ok(meta) = std::fs::metadata(dir) else {
        return false;
    };
    if !meta.is_dir() {
        return false;
    }
    let mode = meta.permissions().mode() & 0o777;
    mode == 0o700 && meta.uid() == nix::unistd::Uid::current().as_raw()
}

#[cfg(not(unix))]
pub fn is_private_runtime_dir(_dir: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_bus_path() {
        assert_eq!(
            parse_unix_bus_path("unix:path=/run/dbus/system_bus_socket,guid=abc123"),
            Some(PathBuf::from("/run/dbus/system_bus_socket"))
        );
    }

    #[test]
    fn test_parse_unix_bus_path_without_path_component() {
        assert_eq!(parse_unix_bus_path("unix:abstract=/tmp/dbus-xyz"), None);
    }

    #[test]
    fn test_parse_unix_bus_path_rejects_non_unix() {
        assert_eq!(parse_unix_bus_path("tcp:host=127.0.0.1,port=1234"), None);
    }
}
