// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! The self-adjusting mount algorithm (§4.1.1).
//!
//! The base/runtime rootfs is read-only. A requested mount destination may
//! not exist as a directory in that rootfs, in which case the nearest
//! existing ancestor is turned into a writable `tmpfs`, and every entry
//! that ancestor already held is individually re-bound into it so nothing
//! is lost. Requested mounts are then layered on top.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

/// One requested or synthesised mount in the final configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMount {
    pub destination: String,
    pub kind: MountKind,
    /// Set once a later mount collides with and overrides a fix-generated one
    pub masked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountKind {
    Bind {
        source: PathBuf,
        options: Vec<String>,
    },
    Tmpfs {
        options: Vec<String>,
    },
    Proc,
    Sysfs,
    Devtmpfs,
    Devpts,
    Mqueue,
    Cgroup,
}

impl MountKind {
    /// A bind is "readonly-backed" unless it lands under `/home` or `/tmp`,
    /// which are always expected to be writable already.
    fn is_readonly_backed(&self, destination: &str) -> bool {
        match self {
            MountKind::Bind { .. } => {
                !(destination.starts_with("/home") || destination.starts_with("/tmp"))
            }
            _ => false,
        }
    }
}

struct Node {
    /// host directory backing this node, if this node corresponds to a mount
    /// (or the tree root, which is backed by the rootfs itself)
    source: Option<PathBuf>,
    mount_index: Option<usize>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn leaf(source: Option<PathBuf>, mount_index: Option<usize>) -> Self {
        Node {
            source,
            mount_index,
            children: BTreeMap::new(),
        }
    }
}

/// Builds the final, self-adjusted mount list for a container rootfs
pub struct MountTree {
    root: Node,
    mounts: Vec<PendingMount>,
    self_adjust: bool,
}

fn split(destination: &str) -> Vec<String> {
    destination
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .collect()
}

impl MountTree {
    /// `rootfs_source` is the host directory the base/runtime layer was
    /// checked out to; it backs `/` for the purpose of existence checks.
    pub fn new(rootfs_source: PathBuf, self_adjust: bool) -> Self {
        MountTree {
            root: Node::leaf(Some(rootfs_source), None),
            mounts: Vec::new(),
            self_adjust,
        }
    }

    /// Insert one mount request, in the fixed assembly order from §4.1 step 12.
    pub fn insert(&mut self, destination: impl Into<String>, kind: MountKind) {
        let destination = destination.into();
        let readonly_backed = kind.is_readonly_backed(&destination);
        let source = match &kind {
            MountKind::Bind { source, .. } => Some(source.clone()),
            _ => None,
        };

        let index = self.mounts.len();
        self.mounts.push(PendingMount {
            destination: destination.clone(),
            kind,
            masked: false,
        });

        let segments = split(&destination);
        // Walk down, remembering the nearest ancestor with a known host source.
        let mut node = &mut self.root;
        let mut ancestor_source = node.source.clone();
        let mut ancestor_depth = 0usize;
        for (depth, segment) in segments.iter().enumerate() {
            node = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| Node::leaf(None, None));
            if node.source.is_some() {
                ancestor_source = node.source.clone();
                ancestor_depth = depth + 1;
            }
        }
        node.mount_index = Some(index);
        node.source = source.clone();

        if !readonly_backed || !self.self_adjust {
            return;
        }
        let Some(ancestor_source) = ancestor_source else {
            return;
        };
        let relative: PathBuf = segments[ancestor_depth..].iter().collect();
        let candidate = ancestor_source.join(&relative);
        if candidate.exists() {
            return;
        }
        self.fix_missing_ancestor(&segments, ancestor_depth);
    }

    /// Walk upward from the mount's own path until a directory that exists
    /// on the host is found, then synthesise a tmpfs there plus individual
    /// binds for its current children.
    fn fix_missing_ancestor(&mut self, segments: &[String], ancestor_depth: usize) {
        let root_source = match &self.root.source {
            Some(s) => s.clone(),
            None => return,
        };

        let mut depth = segments.len();
        while depth > ancestor_depth {
            depth -= 1;
            let candidate_rel: PathBuf = segments[..depth].iter().collect();
            let candidate_host = root_source.join(&candidate_rel);
            if candidate_host.is_dir() {
                tracing::debug!(path = %candidate_host.display(), "synthesizing tmpfs for missing mount ancestor");
                self.synthesize_tmpfs_at(&segments[..depth], &candidate_host);
                return;
            }
        }
        // Nothing above it exists either; fall back to synthesising at the
        // rootfs root itself, which always exists.
        self.synthesize_tmpfs_at(&[], &root_source);
    }

    fn synthesize_tmpfs_at(&mut self, segments: &[String], host_dir: &Path) {
        let destination = if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segments.join("/"))
        };

        // Mask any fix-generated mount already sitting at this destination;
        // a later request always overrides it.
        for mount in &mut self.mounts {
            if mount.destination == destination && !matches!(mount.kind, MountKind::Bind { .. }) {
                mount.masked = true;
            }
        }

        let tmpfs_index = self.mounts.len();
        self.mounts.push(PendingMount {
            destination: destination.clone(),
            kind: MountKind::Tmpfs {
                options: vec!["mode=0755".to_string()],
            },
            masked: false,
        });

        let node = self.node_at(segments);
        node.source = Some(host_dir.to_path_buf());
        node.mount_index = Some(tmpfs_index);

        let Ok(entries) = std::fs::read_dir(host_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_dest = format!("{destination}/{name}").replace("//", "/");
            let child_source = entry.path();
            let mut options = vec!["bind".to_string(), "ro".to_string()];
            if child_source
                .symlink_metadata()
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
            {
                options.push("copy-symlink".to_string());
            }
            let child_index = self.mounts.len();
            self.mounts.push(PendingMount {
                destination: child_dest.clone(),
                kind: MountKind::Bind {
                    source: child_source.clone(),
                    options,
                },
                masked: false,
            });
            let mut child_segments = segments.to_vec();
            child_segments.push(name);
            let child_node = self.node_at(&child_segments);
            child_node.source = Some(child_source);
            child_node.mount_index = Some(child_index);
        }
    }

    fn node_at(&mut self, segments: &[String]) -> &mut Node {
        let mut node = &mut self.root;
        for segment in segments {
            node = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| Node::leaf(None, None));
        }
        node
    }

    /// Emit the final mount list in breadth-first order over the destination
    /// tree, dropping masked (fix-generated, later overridden) entries.
    pub fn finish(self) -> Vec<PendingMount> {
        let mut ordered = Vec::new();
        let mut queue: VecDeque<&Node> = VecDeque::new();
        queue.push_back(&self.root);
        while let Some(node) = queue.pop_front() {
            if let Some(index) = node.mount_index {
                if let Some(mount) = self.mounts.get(index) {
                    if !mount.masked {
                        ordered.push(mount.clone());
                    }
                }
            }
            for child in node.children.values() {
                queue.push_back(child);
            }
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_destination_is_not_adjusted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/lib/present")).unwrap();
        let mut tree = MountTree::new(dir.path().to_path_buf(), true);
        tree.insert(
            "/usr/lib/present",
            MountKind::Bind {
                source: PathBuf::from("/host/present"),
                options: vec!["bind".to_string(), "ro".to_string()],
            },
        );
        let mounts = tree.finish();
        assert!(mounts
            .iter()
            .any(|m| m.destination == "/usr/lib/present" && !m.masked));
        assert!(!mounts.iter().any(|m| m.destination == "/usr/lib"));
    }

    #[test]
    fn test_missing_destination_synthesizes_tmpfs_and_rebinds_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/lib")).unwrap();
        std::fs::write(dir.path().join("usr/lib/libc.so"), b"").unwrap();

        let mut tree = MountTree::new(dir.path().to_path_buf(), true);
        tree.insert(
            "/usr/lib/foo",
            MountKind::Bind {
                source: PathBuf::from("/host/foo"),
                options: vec!["bind".to_string()],
            },
        );
        let mounts = tree.finish();

        let tmpfs = mounts
            .iter()
            .find(|m| m.destination == "/usr/lib" && matches!(m.kind, MountKind::Tmpfs { .. }));
        assert!(tmpfs.is_some(), "expected synthesized tmpfs at /usr/lib");

        assert!(mounts
            .iter()
            .any(|m| m.destination == "/usr/lib/libc.so" && matches!(m.kind, MountKind::Bind { .. })));
        assert!(mounts
            .iter()
            .any(|m| m.destination == "/usr/lib/foo" && !m.masked));
    }

    #[test]
    fn test_home_and_tmp_destinations_skip_the_fix() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = MountTree::new(dir.path().to_path_buf(), true);
        tree.insert(
            "/home/user/.config/app",
            MountKind::Bind {
                source: PathBuf::from("/host/config"),
                options: vec!["bind".to_string()],
            },
        );
        let mounts = tree.finish();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].destination, "/home/user/.config/app");
    }
}
