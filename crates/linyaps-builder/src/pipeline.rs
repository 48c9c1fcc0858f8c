// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Orchestrates the nine build stages of §4.3 against a parsed
//! [`Project`], each individually skippable through [`BuildConfig`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use linyaps_ident::{Arch, Kind, PackageInfo, Project, Version};
use linyaps_store::{LayerStore, Task};

use crate::commit::{self, ModuleCommit};
use crate::container::{self, BuildContainerSpec};
use crate::depends;
use crate::entries;
use crate::error::{Error, Result};
use crate::install_module;
use crate::namespace;
use crate::overlay::Overlay;
use crate::source::{self, Fetcher, NullProgress, ProgressSink};

/// Matches `config.yaml`'s skip/offline flags (§6 Builder configuration).
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub skip_fetch_source: bool,
    pub skip_pull_depend: bool,
    pub skip_run_container: bool,
    pub skip_commit_output: bool,
    pub skip_check_output: bool,
    pub skip_strip_symbols: bool,
    pub offline: bool,
    pub full_develop_module: bool,
    pub arch: Option<Arch>,
}

/// Scratch directories the pipeline creates under the project's
/// `linglong/` working tree.
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(project_dir: &Path) -> Self {
        Workspace { root: project_dir.join("linglong") }
    }
    pub fn cache_dir(&self) -> PathBuf { self.root.join("cache") }
    pub fn sources_dir(&self) -> PathBuf { self.root.join("sources") }
    pub fn overlay_dir(&self, name: &str) -> PathBuf { self.root.join("overlay").join(name) }
    pub fn build_output_dir(&self) -> PathBuf { self.root.join("output") }
    pub fn entries_dir(&self) -> PathBuf { self.root.join("entries") }
    pub fn modules_dir(&self) -> PathBuf { self.root.join("modules") }
    pub fn helper_dir(&self) -> PathBuf { self.root.join("helper") }
}

fn kind_for(kind: Kind) -> PackageInfo {
    PackageInfo {
        id: String::new(),
        name: String::new(),
        kind,
        version: Version::default(),
        arch: vec![],
        channel: "main".to_string(),
        module: "binary".to_string(),
        base: None,
        runtime: None,
        command: vec![],
        description: String::new(),
        size: 0,
        permissions: None,
        schema_version: "1.0".to_string(),
        uuid: None,
    }
}

/// Run all nine stages for `project`, returning the committed
/// reference. `project_dir` holds `linglong.yaml` and its sources;
/// `manifest_yaml` is the raw text committed for reproducibility.
pub async fn run<S: LayerStore>(
    store: &S,
    project: &Project,
    manifest_yaml: &str,
    project_dir: &Path,
    config: &BuildConfig,
    fetcher: &dyn Fetcher,
    progress: &dyn ProgressSink,
) -> Result<linyaps_ident::Reference> {
    let arch = config.arch.unwrap_or(Arch::host().map_err(|e| Error::InvalidRule(e.to_string()))?);
    let workspace = Workspace::new(project_dir);
    let version: Version = project.package.version.parse()?;

    // Stage 1: prepare namespace.
    if !config.skip_run_container {
        namespace::prepare()?;
    }

    // Stage 2: fetch sources.
    if !config.skip_fetch_source {
        for source in &project.sources {
            source::fetch(fetcher, progress, &workspace.cache_dir(), &workspace.sources_dir(), source).await?;
        }
    }

    // Stage 3: pull dependencies.
    let task = Task::default();
    let resolved = if config.skip_pull_depend {
        None
    } else {
        Some(depends::resolve(store, &task, &project.base, project.runtime.as_ref(), config.offline).await?)
    };

    let build_output = workspace.build_output_dir();
    std::fs::create_dir_all(&build_output)?;

    // Stages 4-5: run the build container, then the apt-depends container.
    if !config.skip_run_container {
        if let Some(resolved) = &resolved {
            let is_app = project.package.kind == Kind::App;
            let prefix = container::install_prefix(&project.package.id, is_app);
            let entry_script = container::render_entry_script(
                &project.build.script,
                &prefix,
                arch.triplet(),
                config.skip_strip_symbols || project.build.skip_strip_symbols,
            );
            std::fs::create_dir_all(project_dir.join("linglong"))?;
            std::fs::write(project_dir.join("linglong/entry.sh"), &entry_script)?;

            let base_overlay = Overlay::mount(&workspace.overlay_dir("base"), &resolved.base_dir).await?;
            let runtime_overlay = match &resolved.runtime_dir {
                Some(dir) => Some(Overlay::mount(&workspace.overlay_dir("runtime"), dir).await?),
                None => None,
            };

            let spec = BuildContainerSpec {
                app_id: project.package.id.clone(),
                base_dir: base_overlay.merged_dir().to_path_buf(),
                runtime_dir: runtime_overlay.as_ref().map(|o| o.merged_dir().to_path_buf()),
                bundle_dir: workspace.overlay_dir("bundle"),
                project_dir: project_dir.to_path_buf(),
                build_output_dir: build_output.clone(),
                install_prefix: prefix,
                helper_dir: workspace.helper_dir(),
                cache_dir: workspace.cache_dir(),
                apt_build_depends: project.buildext.apt.build_depends.clone(),
            };
            container::run_build(&spec).await?;

            if !project.buildext.apt.depends.is_empty() {
                container::run_prepare_depends(&spec, &project.buildext.apt.depends).await?;
                merge_depends_tree(&base_overlay.upper_dir().join("usr"), &build_output)?;
                if let Some(runtime_overlay) = &runtime_overlay {
                    if is_app {
                        merge_depends_tree(&runtime_overlay.upper_dir().join("usr"), &build_output)?;
                    }
                }
            }
        }
    }

    // Stage 6: generate entries.
    entries::generate(&build_output, &workspace.entries_dir())?;

    // Stage 7: split modules.
    let mut claimed = BTreeSet::new();
    let mut module_commits = Vec::new();
    let modules_root = workspace.modules_dir();

    for module in &project.modules {
        if module.name == "develop" {
            continue;
        }
        let dest = modules_root.join(&module.name);
        install_module::apply_rules(&build_output, &dest, &module.files, &mut claimed)?;
        module_commits.push(ModuleCommit { module: module.name.clone(), dir: dest });
    }

    let develop_dest = modules_root.join("develop");
    if config.full_develop_module {
        entries::copy_tree(&build_output, &develop_dest)?;
    } else {
        install_module::apply_rules(&build_output, &develop_dest, &project.develop_module_rules(), &mut claimed)?;
    }
    module_commits.push(ModuleCommit { module: "develop".to_string(), dir: develop_dest });

    let binary_dest = modules_root.join("binary");
    install_module::apply_remainder(&build_output, &binary_dest, &claimed)?;
    module_commits.push(ModuleCommit { module: "binary".to_string(), dir: binary_dest });

    // Stage 8: commit.
    if config.skip_commit_output {
        return commit::resolve_committed(store, &project.package.id, &version, arch).await;
    }

    commit::clear_previous(store, &project.package.id, &version, arch).await?;

    let mut base = kind_for(project.package.kind);
    base.id = project.package.id.clone();
    base.name = project.package.name.clone();
    base.version = version;
    base.arch = vec![arch];
    base.description = project.package.description.clone();
    base.command = project.command.clone();
    base.base = Some(resolve_fuzzy_for_info(&project.base));
    base.runtime = project.runtime.as_ref().map(resolve_fuzzy_for_info);

    let reference = commit::commit(store, &base, manifest_yaml, &module_commits).await?;

    // Stage 9: runtime check.
    if !config.skip_check_output {
        run_check(store, &reference).await?;
    }

    Ok(reference)
}

fn resolve_fuzzy_for_info(fuzzy: &linyaps_ident::FuzzyReference) -> linyaps_ident::Reference {
    linyaps_ident::Reference::new(
        fuzzy.id.clone(),
        fuzzy.version.unwrap_or_default(),
        fuzzy.arch.unwrap_or(Arch::X86_64),
        fuzzy.module_or_default().to_string(),
    )
}

/// Merge `usr/{bin,lib}` from the apt-depends container's upper layer
/// into the build output, hard-linking files and replicating symlinks.
fn merge_depends_tree(usr_src: &Path, build_output: &Path) -> Result<()> {
    for sub in ["bin", "lib"] {
        let src = usr_src.join(sub);
        if !src.exists() {
            continue;
        }
        let dest = build_output.join(sub);
        for entry in walkdir::WalkDir::new(&src).min_depth(1) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(&src).expect("descendant of src");
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
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::hard_link(entry.path(), &target).or_else(|_| std::fs::copy(entry.path(), &target).map(|_| ()))?;
            }
        }
    }
    Ok(())
}

async fn run_check<S: LayerStore>(store: &S, reference: &linyaps_ident::Reference) -> Result<()> {
    let checkout = tempfile::tempdir()?;
    store.checkout(reference, checkout.path()).await?;
    let check_script = checkout.path().join("files/main-check.sh");
    if !check_script.exists() {
        return Ok(());
    }
    let status = tokio::process::Command::new("bash").arg(&check_script).status().await?;
    if !status.success() {
        return Err(Error::RuntimeCheckFailed);
    }
    Ok(())
}

pub use crate::source::NullProgress as DefaultProgress;
