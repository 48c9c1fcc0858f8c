// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Runs the build container: `base`/`runtime` bound read-only, the
//! project mounted at `/project`, build output writable at the
//! install prefix, then `bash -e /project/linglong/entry.sh` (§4.3
//! stage 4), or an apt-only container with no hooks (§4.3 stage 5).

use std::path::{Path, PathBuf};

use linyaps_container::{ContainerConfigBuilder, ContainerOptions, ExtraMount, StartContainerHook};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Which install prefix the build output is bound at inside the
/// container, determined by the module's `kind`.
pub fn install_prefix(app_id: &str, is_app: bool) -> String {
    if is_app {
        format!("/opt/apps/{app_id}/files")
    } else {
        "/runtime".to_string()
    }
}

pub struct BuildContainerSpec {
    pub app_id: String,
    pub base_dir: PathBuf,
    pub runtime_dir: Option<PathBuf>,
    pub bundle_dir: PathBuf,
    pub project_dir: PathBuf,
    pub build_output_dir: PathBuf,
    pub install_prefix: String,
    pub helper_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub apt_build_depends: Vec<String>,
}

fn options_for(spec: &BuildContainerSpec) -> ContainerOptions {
    let mut options = ContainerOptions::new(spec.app_id.clone(), spec.base_dir.clone(), spec.bundle_dir.clone());
    options.runtime_layer = spec.runtime_dir.clone();
    options.app_cache_dir = Some(spec.cache_dir.clone());
    options.extra_mounts = vec![
        ExtraMount {
            destination: spec.install_prefix.clone(),
            source: spec.build_output_dir.clone(),
            readonly: false,
        },
        ExtraMount {
            destination: "/project".to_string(),
            source: spec.project_dir.clone(),
            readonly: false,
        },
        ExtraMount {
            destination: "/opt/linglong-builder".to_string(),
            source: spec.helper_dir.clone(),
            readonly: true,
        },
    ];

    let mut hooks = vec![StartContainerHook {
        path: PathBuf::from("/sbin/ldconfig"),
        args: vec![],
        env: vec![],
    }];
    if !spec.apt_build_depends.is_empty() {
        hooks.push(StartContainerHook {
            path: PathBuf::from("/bin/bash"),
            args: vec![
                "-c".to_string(),
                format!("apt update && apt -y install {}", spec.apt_build_depends.join(" ")),
            ],
            env: vec![],
        });
    }
    options.start_container_hooks = hooks;
    options
}

/// Synthesise `/project/linglong/entry.sh` from the project's `build`
/// script, with the env the build stage injects.
pub fn render_entry_script(script: &str, prefix: &str, triplet: &str, skip_strip_symbols: bool) -> String {
    let mut cflags = "CFLAGS=\"$CFLAGS\"".to_string();
    if !skip_strip_symbols {
        cflags = "CFLAGS=\"$CFLAGS -g\"".to_string();
    }
    format!(
        "export PREFIX={prefix}\nexport TRIPLET={triplet}\nexport LINGLONG_LD_SO_CACHE=/etc/ld.so.cache\nexport {cflags}\nset -e\n{script}\n"
    )
}

/// Run the build container to completion: `bash -e /project/linglong/entry.sh`.
pub async fn run_build(spec: &BuildContainerSpec) -> Result<()> {
    let options = options_for(spec);
    let config = ContainerConfigBuilder::new(options).build()?;
    std::fs::create_dir_all(&spec.bundle_dir).map_err(|source| Error::DirectoryCreate {
        path: spec.bundle_dir.clone(),
        source,
    })?;
    std::fs::write(spec.bundle_dir.join("config.json"), serde_json::to_vec(&config)?)?;

    run_ll_box(&spec.bundle_dir, &["bash".to_string(), "-e".to_string(), "/project/linglong/entry.sh".to_string()]).await
}

/// Run the apt-depends-only container (§4.3 stage 5): no start hooks,
/// the caller is responsible for merging `usr/` back afterward.
pub async fn run_prepare_depends(spec: &BuildContainerSpec, depends: &[String]) -> Result<()> {
    let mut options = options_for(spec);
    options.start_container_hooks.clear();
    let config = ContainerConfigBuilder::new(options).build()?;
    std::fs::create_dir_all(&spec.bundle_dir).map_err(|source| Error::DirectoryCreate {
        path: spec.bundle_dir.clone(),
        source,
    })?;
    std::fs::write(spec.bundle_dir.join("config.json"), serde_json::to_vec(&config)?)?;

    let command = format!("apt -y install {}", depends.join(" "));
    run_ll_box(&spec.bundle_dir, &["bash".to_string(), "-c".to_string(), command]).await
}

/// Run an already-built app/runtime directly, for `ll-builder run` and
/// `ll-cli run`: no build-output mount, no apt hooks, just the merged
/// module(s) as the rootfs and `argv` as the entrypoint.
pub async fn run_app(app_id: &str, base_dir: &Path, runtime_dir: Option<&Path>, bundle_dir: &Path, argv: &[String]) -> Result<()> {
    let mut options = ContainerOptions::new(app_id.to_string(), base_dir.to_path_buf(), bundle_dir.to_path_buf());
    options.runtime_layer = runtime_dir.map(|p| p.to_path_buf());
    let config = ContainerConfigBuilder::new(options).build()?;
    std::fs::create_dir_all(bundle_dir).map_err(|source| Error::DirectoryCreate {
        path: bundle_dir.to_path_buf(),
        source,
    })?;
    std::fs::write(bundle_dir.join("config.json"), serde_json::to_vec(&config)?)?;
    run_ll_box(bundle_dir, argv).await
}

async fn run_ll_box(bundle_dir: &Path, args: &[String]) -> Result<()> {
    let mut command = Command::new("ll-box");
    command.arg("run").arg("--bundle").arg(bundle_dir);
    if !args.is_empty() {
        command.arg("--").args(args);
    }
    let output = command.output().await?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: "ll-box".to_string(),
            code: output.status.code(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_prefix_for_app_vs_runtime() {
        assert_eq!(install_prefix("org.test.hello", true), "/opt/apps/org.test.hello/files");
        assert_eq!(install_prefix("org.test.hello", false), "/runtime");
    }

    #[test]
    fn test_entry_script_injects_strip_flag_by_default() {
        let script = render_entry_script("make install", "/runtime", "x86_64-linux-gnu", false);
        assert!(script.contains("CFLAGS=\"$CFLAGS -g\""));
        assert!(script.contains("export PREFIX=/runtime"));
    }

    #[test]
    fn test_entry_script_omits_strip_flag_when_skipped() {
        let script = render_entry_script("make install", "/runtime", "x86_64-linux-gnu", true);
        assert!(!script.contains("-g"));
    }
}
