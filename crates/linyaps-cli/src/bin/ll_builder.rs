// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! `ll-builder`: the builder pipeline's command line surface (§6).

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use linyaps_builder::pipeline::BuildConfig;
use linyaps_builder::{container, export, pipeline, project};
use linyaps_cli::{ConsoleProgress, ProcessFetcher};
use linyaps_cli_common::{print_error, Result};
use linyaps_ident::{Arch, PackageInfo, Project, Reference, Version};
use linyaps_store::LayerStore;

#[derive(Parser)]
#[command(name = "ll-builder", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold a new project directory.
    Create { id: String },
    /// Run the full build pipeline.
    Build(BuildArgs),
    /// Run the already-built app or runtime in a container.
    Run(RunArgs),
    /// Export a built reference as layer files or a UAB.
    Export(ExportArgs),
    /// Unpack a `.layer` file.
    Extract { layer_file: PathBuf, destination: PathBuf },
    /// Import a `.layer` file or a prepared layer directory.
    Import { path: PathBuf },
    /// Push a built reference to a remote repository.
    Push(PushArgs),
    /// Manage configured repositories.
    Repo(RepoArgs),
    /// Migrate the local store to the current on-disk schema.
    Migrate,
}

#[derive(Args)]
struct BuildArgs {
    #[arg(short = 'f', long, default_value = "linglong.yaml")]
    file: PathBuf,
    #[arg(long)]
    arch: Option<Arch>,
    #[arg(long)]
    offline: bool,
    #[arg(long)]
    skip_fetch_source: bool,
    #[arg(long)]
    skip_pull_depend: bool,
    #[arg(long)]
    skip_run_container: bool,
    #[arg(long)]
    skip_commit_output: bool,
    #[arg(long)]
    skip_output_check: bool,
    #[arg(long)]
    skip_strip_symbols: bool,
    #[arg(long)]
    full_develop_module: bool,
}

#[derive(Args)]
struct RunArgs {
    #[arg(short = 'f', long, default_value = "linglong.yaml")]
    file: PathBuf,
    #[arg(long, value_delimiter = ',')]
    modules: Vec<String>,
    #[arg(long)]
    debug: bool,
    #[arg(long)]
    exec: Option<String>,
    #[arg(long)]
    offline: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(short = 'f', long, default_value = "linglong.yaml")]
    file: PathBuf,
    #[arg(short = 'i', long)]
    icon: Option<PathBuf>,
    #[arg(short = 'l', long)]
    layer: bool,
}

#[derive(Args)]
struct PushArgs {
    #[arg(short = 'f', long, default_value = "linglong.yaml")]
    file: PathBuf,
    #[arg(long = "repo-url")]
    repo_url: String,
    #[arg(long = "repo-name")]
    repo_name: String,
    #[arg(long, default_value = "main")]
    channel: String,
    #[arg(long)]
    module: Option<String>,
}

#[derive(Args)]
struct RepoArgs {
    #[command(subcommand)]
    action: RepoAction,
}

#[derive(Subcommand)]
enum RepoAction {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
    },
    Remove {
        #[arg(long)]
        name: String,
    },
    Update {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: Option<String>,
    },
    SetDefault {
        #[arg(long)]
        name: String,
    },
    Show,
}

fn load_project(file: &Path) -> Result<(Project, String)> {
    let text = std::fs::read_to_string(file)?;
    let project = Project::from_yaml_str(&text)?;
    Ok((project, text))
}

/// The committed `binary` module reference for a project, assuming the
/// host's own architecture.
fn binary_reference(project: &Project) -> Result<Reference> {
    let version: Version = project.package.version.parse()?;
    let arch = Arch::host()?;
    Ok(Reference::new(project.package.id.clone(), version, arch, "binary"))
}

#[tokio::main]
async fn main() {
    linyaps_cli::init_logging();
    let cli = Cli::parse();
    if let Err(err) = run(cli.command).await {
        print_error(&err);
        std::process::exit(err.exit_code());
    }
}

async fn run(command: Command) -> Result<()> {
    let store = linyaps_cli::open_store();

    match command {
        Command::Create { id } => {
            let workdir = std::env::current_dir()?;
            let path = project::create(&workdir, &id)?;
            println!("created {}", path.display());
        }
        Command::Build(args) => {
            let project_dir = args.file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let (project, text) = load_project(&args.file)?;
            let file_config = linyaps_config::load_config(&project_dir)?;
            let config = BuildConfig {
                skip_fetch_source: args.skip_fetch_source || file_config.skip_fetch_source,
                skip_pull_depend: args.skip_pull_depend || file_config.skip_pull_depend,
                skip_run_container: args.skip_run_container || file_config.skip_run_container,
                skip_commit_output: args.skip_commit_output || file_config.skip_commit_output,
                skip_check_output: args.skip_output_check || file_config.skip_check_output,
                skip_strip_symbols: args.skip_strip_symbols || file_config.skip_strip_symbols,
                offline: args.offline || file_config.offline,
                full_develop_module: args.full_develop_module,
                arch: args.arch.or_else(|| file_config.arch.as_deref().and_then(|a| a.parse().ok())),
            };
            let reference =
                pipeline::run(&store, &project, &text, &project_dir, &config, &ProcessFetcher, &ConsoleProgress).await?;
            println!("built {reference}");
        }
        Command::Run(args) => {
            if args.debug {
                std::env::set_var("LINGLONG_DEBUG", "1");
            }
            let (project, _text) = load_project(&args.file)?;
            let reference = binary_reference(&project)?;
            let modules: Option<Vec<String>> = if args.modules.is_empty() { None } else { Some(args.modules.clone()) };
            let merged = store.get_merged_module_dir(&reference, modules.as_deref()).await?;

            let argv: Vec<String> = if let Some(exec) = &args.exec {
                shell_words::split(exec).unwrap_or_else(|_| vec![exec.clone()])
            } else {
                project.command.clone()
            };

            let bundle_dir = linyaps_cli::builder_cache_dir().join("run").join(&project.package.id);
            container::run_app(&project.package.id, &merged, None, &bundle_dir, &argv).await?;
        }
        Command::Export(args) => {
            let (project, _text) = load_project(&args.file)?;
            let reference = binary_reference(&project)?;
            let dest_dir = args.file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

            if args.layer {
                export::export_layers(&store, &reference, &dest_dir).await?;
            } else {
                let loader_path = std::env::var_os("LINGLONG_UAB_LOADER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/usr/libexec/linglong/loader"));
                let output = dest_dir.join(format!("{}_{}.uab", project.package.id, project.package.version));
                let checkout = tempfile::tempdir()?;
                store.checkout(&reference, checkout.path()).await?;
                let info_bytes = std::fs::read(checkout.path().join("info.json"))?;
                let info: PackageInfo = serde_json::from_slice(&info_bytes)?;
                let chain = vec![export::ChainLayer { info, checkout_dir: checkout.path().to_path_buf(), exclude: Vec::new() }];
                export::export_uab(&loader_path, chain, args.icon.clone(), &output, true).await?;
            }
        }
        Command::Extract { layer_file, destination } => {
            export::extract_layer(&layer_file, &destination).await?;
        }
        Command::Import { path } => {
            let reference = export::import_path(&store, &path).await?;
            println!("imported {reference}");
        }
        Command::Push(_args) => {
            return Err(linyaps_cli_common::Error::Usage(
                "push requires a remote repository client, which is externalized".to_string(),
            ));
        }
        Command::Repo(args) => {
            let mut config = store.get_config();
            match args.action {
                RepoAction::Add { name, url } | RepoAction::Update { name, url: Some(url) } => {
                    config.default_repo_name = Some(name);
                    config.default_repo_url = Some(url);
                    store.set_config(config).await?;
                }
                RepoAction::Update { name, url: None } => {
                    config.default_repo_name = Some(name);
                    store.set_config(config).await?;
                }
                RepoAction::Remove { name } => {
                    if config.default_repo_name.as_deref() == Some(name.as_str()) {
                        config.default_repo_name = None;
                        config.default_repo_url = None;
                        store.set_config(config).await?;
                    }
                }
                RepoAction::SetDefault { name } => {
                    config.default_repo_name = Some(name);
                    store.set_config(config).await?;
                }
                RepoAction::Show => {
                    println!("{}: {}", config.default_repo_name.unwrap_or_default(), config.default_repo_url.unwrap_or_default());
                }
            }
        }
        Command::Migrate => {
            let migrated = project::migrate(&store).await?;
            println!("{}", if migrated { "migrated" } else { "already up to date" });
        }
    }
    Ok(())
}
