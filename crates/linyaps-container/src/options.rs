// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A host uid/gid range mapped into the container's user namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMapping {
    pub host_id: u32,
    pub container_id: u32,
    pub size: u32,
}

/// A mapping of a host directory into the application's private data dir
///
/// e.g. `~/.config/foo` bound at `<id>/private/config/foo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMapping {
    pub host_path: PathBuf,
    pub dest: String,
    pub create_if_missing: bool,
}

/// A caller-supplied mount not otherwise covered by the feature toggles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraMount {
    pub destination: String,
    pub source: PathBuf,
    pub readonly: bool,
}

/// A command run via `hooks.startContainer` before the process starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartContainerHook {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<String>,
}

/// The feature toggles from the container-config contract (§4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountFeatures {
    pub bind_sys: bool,
    pub bind_proc: bool,
    pub bind_dev: bool,
    pub bind_cgroup: bool,
    pub bind_run: bool,
    pub bind_tmp: bool,
    pub bind_user_group_files: bool,
    pub bind_media: bool,
    pub bind_host_root: bool,
    pub bind_host_statics: bool,
    pub bind_home: bool,
    pub enable_private_dir: bool,
    pub map_private: bool,
    pub bind_ipc: bool,
    pub enable_ld_cache: bool,
    pub enable_self_adjusting_mount: bool,
    pub isolate_network: bool,
}

impl Default for MountFeatures {
    /// Defaults mirror a normal `ll-cli run`: everything bound, network shared.
    fn default() -> Self {
        MountFeatures {
            bind_sys: true,
            bind_proc: true,
            bind_dev: true,
            bind_cgroup: true,
            bind_run: true,
            bind_tmp: true,
            bind_user_group_files: true,
            bind_media: true,
            bind_host_root: false,
            bind_host_statics: true,
            bind_home: true,
            enable_private_dir: true,
            map_private: false,
            bind_ipc: true,
            enable_ld_cache: true,
            enable_self_adjusting_mount: true,
            isolate_network: false,
        }
    }
}

/// Everything needed to assemble one container's OCI configuration (§4.1 contract)
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    pub app_id: String,
    pub runtime_layer: Option<PathBuf>,
    pub base_layer: PathBuf,
    pub app_layer: Option<PathBuf>,
    pub bundle_dir: PathBuf,
    pub app_cache_dir: Option<PathBuf>,
    pub uid_mappings: Vec<IdMapping>,
    pub gid_mappings: Vec<IdMapping>,
    pub features: MountFeatures,
    pub forwarded_env: Vec<String>,
    pub appended_env: BTreeMap<String, String>,
    pub extra_mounts: Vec<ExtraMount>,
    pub private_mappings: Vec<PrivateMapping>,
    pub start_container_hooks: Vec<StartContainerHook>,
    pub masked_paths: Vec<String>,
    pub annotations: Option<BTreeMap<String, String>>,
}

impl ContainerOptions {
    /// A minimal set of options sufficient to run a single static binary
    pub fn new(app_id: impl Into<String>, base_layer: PathBuf, bundle_dir: PathBuf) -> Self {
        ContainerOptions {
            app_id: app_id.into(),
            runtime_layer: None,
            base_layer,
            app_layer: None,
            bundle_dir,
            app_cache_dir: None,
            uid_mappings: Vec::new(),
            gid_mappings: Vec::new(),
            features: MountFeatures::default(),
            forwarded_env: Vec::new(),
            appended_env: BTreeMap::new(),
            extra_mounts: Vec::new(),
            private_mappings: Vec::new(),
            start_container_hooks: Vec::new(),
            masked_paths: vec!["~/.bashrc".to_string()],
            annotations: None,
        }
    }
}
