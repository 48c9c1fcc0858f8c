// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Compiles a [`ContainerOptions`] value into a complete OCI runtime
//! configuration, following the assembly order from §4.1.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use oci_spec::runtime::{
    HookBuilder, HooksBuilder, LinuxBuilder, LinuxIdMapping, LinuxIdMappingBuilder,
    LinuxNamespace, LinuxNamespaceBuilder, LinuxNamespaceType, MountBuilder, ProcessBuilder,
    RootBuilder, Spec, SpecBuilder, UserBuilder,
};

use crate::env_file;
use crate::error::{Error, Result};
use crate::ipc;
use crate::mount_tree::{MountKind, MountTree, PendingMount};
use crate::options::{ContainerOptions, IdMapping, StartContainerHook};

fn oci_err(context: &'static str) -> impl FnOnce(String) -> Error {
    move |e| Error::OciBuilder(format!("{context}: {e}"))
}

fn id_mapping(mapping: &IdMapping) -> std::result::Result<LinuxIdMapping, String> {
    LinuxIdMappingBuilder::default()
        .host_id(mapping.host_id)
        .container_id(mapping.container_id)
        .size(mapping.size)
        .build()
        .map_err(|e| e.to_string())
}

fn namespace(typ: LinuxNamespaceType) -> std::result::Result<LinuxNamespace, String> {
    LinuxNamespaceBuilder::default()
        .typ(typ)
        .build()
        .map_err(|e| e.to_string())
}

/// Assembles one container's OCI configuration from a [`ContainerOptions`].
///
/// A builder is single-use: [`build`](Self::build) consumes it.
pub struct ContainerConfigBuilder {
    options: ContainerOptions,
}

impl ContainerConfigBuilder {
    pub fn new(options: ContainerOptions) -> Self {
        ContainerConfigBuilder { options }
    }

    pub fn build(self) -> Result<Spec> {
        let opts = &self.options;
        validate(opts)?;
        tracing::debug!(app_id = %opts.app_id, bundle = %opts.bundle_dir.display(), "assembling container config");

        let rootfs_source = opts.base_layer.clone();
        let mut tree = MountTree::new(rootfs_source, opts.features.enable_self_adjusting_mount);

        // (4) runtime and app
        if let Some(runtime) = &opts.runtime_layer {
            tree.insert(
                "/runtime",
                MountKind::Bind {
                    source: runtime.clone(),
                    options: vec!["bind".to_string(), "ro".to_string()],
                },
            );
        }
        if let Some(app) = &opts.app_layer {
            tree.insert("/opt", MountKind::Tmpfs { options: vec![] });
            tree.insert(
                format!("/opt/apps/{}/files", opts.app_id),
                MountKind::Bind {
                    source: app.clone(),
                    options: vec!["bind".to_string(), "ro".to_string()],
                },
            );
        }

        // (5) home
        let mut env = BTreeMap::new();
        if opts.features.bind_home {
            assemble_home(opts, &mut tree)?;
        }

        // (6) unique tmp dir
        let tmp_source = opts.bundle_dir.join("tmp");
        std::fs::create_dir_all(&tmp_source).map_err(|source| Error::PrivateDirCreate {
            path: tmp_source.display().to_string(),
            source,
        })?;
        tree.insert(
            "/tmp",
            MountKind::Bind {
                source: tmp_source,
                options: vec!["bind".to_string(), "rw".to_string()],
            },
        );

        // (7)(8) private dir + mappings
        if opts.features.enable_private_dir {
            assemble_private(opts, &mut tree)?;
        }

        // (9) ipc
        if opts.features.bind_ipc {
            assemble_ipc(opts, &mut tree)?;
        }

        // (10) cache & ld.so.cache
        if let Some(cache) = &opts.app_cache_dir {
            if !cache.is_dir() {
                return Err(Error::CacheMissing(cache.display().to_string()));
            }
            tree.insert(
                "/run/linglong/cache",
                MountKind::Bind {
                    source: cache.clone(),
                    options: vec!["bind".to_string(), "rw".to_string()],
                },
            );
        }
        if opts.features.enable_ld_cache {
            let ld_cache = opts.bundle_dir.join("ld.so.cache");
            let _ = std::fs::File::create(&ld_cache);
            tree.insert(
                "/etc/ld.so.cache",
                MountKind::Bind {
                    source: ld_cache,
                    options: vec!["bind".to_string(), "rw".to_string()],
                },
            );
        }

        // (11) env
        for key in &opts.forwarded_env {
            if let Ok(value) = std::env::var(key) {
                env.insert(key.clone(), value);
            }
        }
        for (key, value) in &opts.appended_env {
            env.insert(key.clone(), value.clone());
        }
        env.insert("LINGLONG_APPID".to_string(), opts.app_id.clone());
        env_file::write(&opts.bundle_dir, &env)?;
        tree.insert(
            "/etc/profile.d/00env.sh",
            MountKind::Bind {
                source: opts.bundle_dir.join("00env.sh"),
                options: vec!["bind".to_string(), "ro".to_string()],
            },
        );

        // (12) fixed-order system mounts
        assemble_system_mounts(opts, &mut tree);
        for extra in &opts.extra_mounts {
            tree.insert(
                extra.destination.clone(),
                MountKind::Bind {
                    source: extra.source.clone(),
                    options: if extra.readonly {
                        vec!["bind".to_string(), "ro".to_string()]
                    } else {
                        vec!["bind".to_string(), "rw".to_string()]
                    },
                },
            );
        }

        // (13) self-adjust already ran as part of every insert() above.
        let mounts = tree.finish();
        let oci_mounts = mounts
            .iter()
            .map(to_oci_mount)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(oci_err("mount"))?;

        let rootfs_path = opts.bundle_dir.join("rootfs");
        let root = RootBuilder::default()
            .path(rootfs_path)
            .readonly(true)
            .build()
            .map_err(|e| oci_err("root")(e.to_string()))?;

        let namespaces = build_namespaces(opts).map_err(oci_err("namespaces"))?;
        let uid_mappings = opts
            .uid_mappings
            .iter()
            .map(id_mapping)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(oci_err("uid_mappings"))?;
        let gid_mappings = opts
            .gid_mappings
            .iter()
            .map(id_mapping)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(oci_err("gid_mappings"))?;

        let user = whoami::username();
        let masked_paths: Vec<String> = opts
            .masked_paths
            .iter()
            .map(|path| {
                path.strip_prefix('~')
                    .map(|rest| format!("/home/{user}{rest}"))
                    .unwrap_or_else(|| path.clone())
            })
            .collect();
        let mut linux_builder = LinuxBuilder::default()
            .namespaces(namespaces)
            .masked_paths(masked_paths);
        if !uid_mappings.is_empty() {
            linux_builder = linux_builder.uid_mappings(uid_mappings);
        }
        if !gid_mappings.is_empty() {
            linux_builder = linux_builder.gid_mappings(gid_mappings);
        }
        let linux = linux_builder
            .build()
            .map_err(|e| oci_err("linux")(e.to_string()))?;

        let process = ProcessBuilder::default()
            .terminal(false)
            .user(
                UserBuilder::default()
                    .uid(0u32)
                    .gid(0u32)
                    .build()
                    .map_err(|e| oci_err("user")(e.to_string()))?,
            )
            .args(vec!["/bin/sh".to_string()])
            .env(env_list(&env))
            .cwd(PathBuf::from("/"))
            .build()
            .map_err(|e| oci_err("process")(e.to_string()))?;

        let mut spec_builder = SpecBuilder::default()
            .version("1.0.1".to_string())
            .root(root)
            .mounts(oci_mounts)
            .process(process)
            .linux(linux);

        if !opts.start_container_hooks.is_empty() {
            let hooks = build_hooks(&opts.start_container_hooks).map_err(oci_err("hooks"))?;
            spec_builder = spec_builder.hooks(hooks);
        }
        if let Some(annotations) = &opts.annotations {
            spec_builder = spec_builder.annotations(annotations.clone());
        }

        spec_builder
            .build()
            .map_err(|e| oci_err("spec")(e.to_string()))
    }
}

fn env_list(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

fn validate(opts: &ContainerOptions) -> Result<()> {
    if opts.app_id.trim().is_empty() {
        return Err(Error::ParamInvalid("app_id must not be empty".to_string()));
    }
    if !opts.base_layer.is_dir() {
        return Err(Error::ParamInvalid(format!(
            "base layer path {} is not a directory",
            opts.base_layer.display()
        )));
    }
    Ok(())
}

fn build_namespaces(opts: &ContainerOptions) -> std::result::Result<Vec<LinuxNamespace>, String> {
    let mut namespaces = vec![
        namespace(LinuxNamespaceType::Pid)?,
        namespace(LinuxNamespaceType::Mount)?,
        namespace(LinuxNamespaceType::Uts)?,
        namespace(LinuxNamespaceType::User)?,
    ];
    if opts.features.isolate_network {
        namespaces.push(namespace(LinuxNamespaceType::Network)?);
    }
    Ok(namespaces)
}

fn build_hooks(
    hooks: &[StartContainerHook],
) -> std::result::Result<oci_spec::runtime::Hooks, String> {
    let start_container = hooks
        .iter()
        .map(|hook| {
            HookBuilder::default()
                .path(hook.path.clone())
                .args(hook.args.clone())
                .env(hook.env.clone())
                .build()
                .map_err(|e| e.to_string())
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    HooksBuilder::default()
        .start_container(start_container)
        .build()
        .map_err(|e| e.to_string())
}

fn to_oci_mount(mount: &PendingMount) -> std::result::Result<oci_spec::runtime::Mount, String> {
    let mut builder = MountBuilder::default().destination(PathBuf::from(&mount.destination));
    builder = match &mount.kind {
        MountKind::Bind { source, options } => builder
            .typ("bind")
            .source(source.clone())
            .options(options.clone()),
        MountKind::Tmpfs { options } => {
            let mut options = options.clone();
            if options.is_empty() {
                options.push("mode=0755".to_string());
            }
            builder.typ("tmpfs").source(PathBuf::from("tmpfs")).options(options)
        }
        MountKind::Proc => builder.typ("proc").source(PathBuf::from("proc")),
        MountKind::Sysfs => builder.typ("sysfs").source(PathBuf::from("sysfs")).options(vec![
            "nosuid".to_string(),
            "noexec".to_string(),
            "nodev".to_string(),
            "ro".to_string(),
        ]),
        MountKind::Devtmpfs => builder
            .typ("tmpfs")
            .source(PathBuf::from("tmpfs"))
            .options(vec!["nosuid".to_string(), "strictatime".to_string(), "mode=755".to_string()]),
        MountKind::Devpts => builder.typ("devpts").source(PathBuf::from("devpts")),
        MountKind::Mqueue => builder.typ("mqueue").source(PathBuf::from("mqueue")),
        MountKind::Cgroup => builder
            .typ("cgroup")
            .source(PathBuf::from("cgroup"))
            .options(vec!["ro".to_string(), "nosuid".to_string(), "noexec".to_string(), "nodev".to_string()]),
    };
    builder.build().map_err(|e| e.to_string())
}

fn assemble_system_mounts(opts: &ContainerOptions, tree: &mut MountTree) {
    let features = &opts.features;
    if features.bind_sys {
        tree.insert("/sys", MountKind::Sysfs);
    }
    if features.bind_proc {
        tree.insert("/proc", MountKind::Proc);
    }
    if features.bind_dev {
        tree.insert("/dev", MountKind::Devtmpfs);
        tree.insert("/dev/pts", MountKind::Devpts);
        tree.insert("/dev/mqueue", MountKind::Mqueue);
    }
    if features.bind_cgroup {
        tree.insert("/sys/fs/cgroup", MountKind::Cgroup);
    }
    if features.bind_run {
        bind_if_exists(tree, "/run/udev", "/run/udev", true);
    }
    if features.bind_user_group_files {
        bind_if_exists(tree, "/etc/passwd", "/etc/passwd", true);
        bind_if_exists(tree, "/etc/group", "/etc/group", true);
    }
    if features.bind_media {
        bind_if_exists(tree, "/media", "/media", false);
    }
    if features.bind_host_root {
        bind_if_exists(tree, "/run/host/rootfs", "/", true);
    }
    if features.bind_host_statics {
        for path in ["/etc/resolv.conf", "/etc/localtime", "/etc/machine-id"] {
            bind_if_exists(tree, path, path, true);
        }
    }
}

fn bind_if_exists(tree: &mut MountTree, host_path: &str, dest: &str, readonly: bool) {
    let path = Path::new(host_path);
    if !path.exists() {
        return;
    }
    let mut options = vec!["bind".to_string()];
    options.push(if readonly { "ro" } else { "rw" }.to_string());
    tree.insert(
        dest,
        MountKind::Bind {
            source: path.to_path_buf(),
            options,
        },
    );
}

fn assemble_home(opts: &ContainerOptions, tree: &mut MountTree) -> Result<()> {
    let host_home = dirs::home_dir().ok_or(Error::HomeMissing)?;
    let user = whoami::username();
    tree.insert("/home", MountKind::Tmpfs { options: vec![] });
    tree.insert(
        format!("/home/{user}"),
        MountKind::Bind {
            source: host_home.clone(),
            options: vec!["bind".to_string(), "rw".to_string()],
        },
    );

    let xdg_dirs: &[(Option<PathBuf>, &str)] = &[
        (dirs::data_dir(), ".local/share"),
        (dirs::config_dir(), ".config"),
        (dirs::cache_dir(), ".cache"),
        (dirs::state_dir(), ".local/state"),
    ];
    for (xdg, rel) in xdg_dirs {
        if let Some(dir) = xdg {
            if dir.is_dir() {
                bind_subdir(tree, dir, &format!("/home/{user}/{rel}"));
            }
        }
    }

    for (rel, dest_rel) in [
        (".local/share/systemd/user", ".local/share/systemd/user"),
        (".config/dconf", ".config/dconf"),
        (".cache/icon-theme.cache", ".cache/icon-theme.cache"),
        (".config/user-dirs.dirs", ".config/user-dirs.dirs"),
        (".config/user-dirs.locale", ".config/user-dirs.locale"),
    ] {
        let source = host_home.join(rel);
        if source.exists() {
            tree.insert(
                format!("/home/{user}/{dest_rel}"),
                MountKind::Bind {
                    source,
                    options: vec!["bind".to_string(), "rw".to_string()],
                },
            );
        }
    }

    tree.insert(
        format!("/home/{user}/.bashrc"),
        MountKind::Bind {
            source: PathBuf::from("/etc/skel/.bashrc"),
            options: vec!["bind".to_string(), "ro".to_string()],
        },
    );
    Ok(())
}

fn bind_subdir(tree: &mut MountTree, source: &Path, dest: &str) {
    tree.insert(
        dest,
        MountKind::Bind {
            source: source.to_path_buf(),
            options: vec!["bind".to_string(), "rw".to_string()],
        },
    );
}

fn assemble_private(opts: &ContainerOptions, tree: &mut MountTree) -> Result<()> {
    let host_home = dirs::home_dir().ok_or(Error::HomeMissing)?;
    let private_root = host_home.join(".linglong").join(&opts.app_id);
    std::fs::create_dir_all(&private_root).map_err(|source| Error::PrivateDirCreate {
        path: private_root.display().to_string(),
        source,
    })?;

    let user = whoami::username();
    tree.insert(
        format!("/home/{user}/.linglong"),
        MountKind::Tmpfs { options: vec![] },
    );

    for mapping in &opts.private_mappings {
        if mapping.create_if_missing && !mapping.host_path.is_dir() {
            std::fs::create_dir_all(&mapping.host_path).map_err(|source| {
                Error::PrivateDirCreate {
                    path: mapping.host_path.display().to_string(),
                    source,
                }
            })?;
        }
        if mapping.dest.is_empty() || mapping.dest.contains("..") {
            return Err(Error::PrivateMapInvalid(mapping.dest.clone()));
        }
        tree.insert(
            format!("/home/{user}/.linglong/{}/private/{}", opts.app_id, mapping.dest),
            MountKind::Bind {
                source: mapping.host_path.clone(),
                options: vec!["bind".to_string(), "rw".to_string()],
            },
        );
    }
    Ok(())
}

fn assemble_ipc(opts: &ContainerOptions, tree: &mut MountTree) -> Result<()> {
    tracing::debug!(app_id = %opts.app_id, "assembling IPC binds");
    bind_if_exists(tree, "/tmp/.X11-unix", "/tmp/.X11-unix", false);

    if let Ok(address) = std::env::var("DBUS_SYSTEM_BUS_ADDRESS") {
        if let Some(path) = ipc::parse_unix_bus_path(&address) {
            if path.exists() {
                tree.insert(
                    "/run/dbus/system_bus_socket",
                    MountKind::Bind {
                        source: path,
                        options: vec!["bind".to_string(), "rw".to_string()],
                    },
                );
            }
        } else {
            return Err(Error::IPCBindFailure {
                what: "system bus".to_string(),
                reason: format!("could not parse address '{address}'"),
            });
        }
    }

    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        let runtime_dir = PathBuf::from(runtime_dir);
        if ipc::is_private_runtime_dir(&runtime_dir) {
            for name in ["pulse", "gvfs", "dconf"] {
                bind_subdir_if_exists(tree, &runtime_dir, name);
            }
            for entry_name in list_matching(&runtime_dir, "wayland-") {
                bind_subdir_if_exists(tree, &runtime_dir, &entry_name);
            }
            if let Ok(address) = std::env::var("DBUS_SESSION_BUS_ADDRESS") {
                if let Some(path) = ipc::parse_unix_bus_path(&address) {
                    if path.exists() {
                        let rel = path.strip_prefix(&runtime_dir).unwrap_or(&path);
                        tree.insert(
                            format!("/run/user/{{uid}}/{}", rel.display()).replace(
                                "{uid}",
                                &nix::unistd::Uid::current().to_string(),
                            ),
                            MountKind::Bind {
                                source: path,
                                options: vec!["bind".to_string(), "rw".to_string()],
                            },
                        );
                    }
                }
            }
        }
    }

    if let Ok(xauthority) = std::env::var("XAUTHORITY") {
        let path = PathBuf::from(xauthority);
        if path.is_file() {
            tree.insert(
                "/home/.Xauthority",
                MountKind::Bind {
                    source: path,
                    options: vec!["bind".to_string(), "ro".to_string()],
                },
            );
        }
    }
    Ok(())
}

fn bind_subdir_if_exists(tree: &mut MountTree, runtime_dir: &Path, name: &str) {
    let source = runtime_dir.join(name);
    if !source.exists() {
        return;
    }
    tree.insert(
        format!("/run/user/{{uid}}/{name}").replace("{uid}", &nix::unistd::Uid::current().to_string()),
        MountKind::Bind {
            source,
            options: vec!["bind".to_string(), "rw".to_string()],
        },
    );
}

fn list_matching(dir: &Path, prefix: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with(prefix).then_some(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExtraMount;

    fn minimal_options(base_layer: PathBuf, bundle_dir: PathBuf) -> ContainerOptions {
        let mut options = ContainerOptions::new("org.test.hello", base_layer, bundle_dir);
        options.features.bind_home = false;
        options.features.enable_private_dir = false;
        options.features.bind_ipc = false;
        options.features.bind_host_statics = false;
        options
    }

    #[test]
    fn test_build_minimal_config_has_required_namespaces_and_root() {
        let base = tempfile::tempdir().unwrap();
        let bundle = tempfile::tempdir().unwrap();
        let options = minimal_options(base.path().to_path_buf(), bundle.path().to_path_buf());

        let spec = ContainerConfigBuilder::new(options).build().unwrap();
        assert_eq!(spec.root().as_ref().unwrap().readonly(), &Some(true));

        let namespace_types: Vec<_> = spec
            .linux()
            .as_ref()
            .unwrap()
            .namespaces()
            .as_ref()
            .unwrap()
            .iter()
            .map(|ns| ns.typ())
            .collect();
        assert!(namespace_types.contains(&LinuxNamespaceType::Pid));
        assert!(namespace_types.contains(&LinuxNamespaceType::Mount));
        assert!(namespace_types.contains(&LinuxNamespaceType::User));
        assert!(!namespace_types.contains(&LinuxNamespaceType::Network));
    }

    #[test]
    fn test_build_rejects_missing_base_layer() {
        let bundle = tempfile::tempdir().unwrap();
        let options = minimal_options(
            PathBuf::from("/no/such/base/layer"),
            bundle.path().to_path_buf(),
        );
        let result = ContainerConfigBuilder::new(options).build();
        assert!(matches!(result, Err(Error::ParamInvalid(_))));
    }

    #[test]
    fn test_isolate_network_adds_network_namespace() {
        let base = tempfile::tempdir().unwrap();
        let bundle = tempfile::tempdir().unwrap();
        let mut options = minimal_options(base.path().to_path_buf(), bundle.path().to_path_buf());
        options.features.isolate_network = true;

        let spec = ContainerConfigBuilder::new(options).build().unwrap();
        let namespace_types: Vec<_> = spec
            .linux()
            .as_ref()
            .unwrap()
            .namespaces()
            .as_ref()
            .unwrap()
            .iter()
            .map(|ns| ns.typ())
            .collect();
        assert!(namespace_types.contains(&LinuxNamespaceType::Network));
    }

    #[test]
    fn test_self_adjusting_example_synthesizes_tmpfs_over_usr_lib() {
        // Base layer has read-only /usr/lib but lacks /usr/lib/foo (spec §8 scenario 5).
        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(base.path().join("usr/lib")).unwrap();
        std::fs::write(base.path().join("usr/lib/libc.so"), b"").unwrap();
        let bundle = tempfile::tempdir().unwrap();
        let requested_source = tempfile::tempdir().unwrap();

        let mut options = minimal_options(base.path().to_path_buf(), bundle.path().to_path_buf());
        options.extra_mounts.push(ExtraMount {
            destination: "/usr/lib/foo".to_string(),
            source: requested_source.path().to_path_buf(),
            readonly: true,
        });

        let spec = ContainerConfigBuilder::new(options).build().unwrap();
        let mounts = spec.mounts().clone().unwrap();
        let destinations: Vec<_> = mounts.iter().map(|m| m.destination().display().to_string()).collect();
        assert!(destinations.contains(&"/usr/lib".to_string()));
        assert!(destinations.contains(&"/usr/lib/libc.so".to_string()));
        assert!(destinations.contains(&"/usr/lib/foo".to_string()));

        let root = spec.root().as_ref().unwrap();
        assert_eq!(root.path(), &bundle.path().join("rootfs"));
        assert_eq!(root.readonly(), &Some(true));
    }
}
