// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! `ll-cli`: the runtime and package management command line surface (§6).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use linyaps_builder::container;
use linyaps_cli::open_store;
use linyaps_cli_common::{print_error, Error, Result};
use linyaps_ident::{FuzzyReference, PackageInfo};
use linyaps_pm::{FileType, PackageManager, TaskEvent, TaskObserver};
use linyaps_store::LayerStore;

#[derive(Parser)]
#[command(name = "ll-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an installed application.
    Run(RunArgs),
    /// Execute a command inside an installed application's container.
    Exec(RunArgs),
    /// Enter a running instance's namespace (requires an external supervisor).
    Enter { instance: String },
    /// List running instances (requires an external supervisor).
    Ps,
    /// Stop a running instance (requires an external supervisor).
    Kill { instance: String },
    /// Install a package, from a remote repository or a local file.
    Install(InstallArgs),
    /// Update an installed package to its latest remote version.
    Upgrade { package: String },
    /// Search a remote repository.
    Search { package: String },
    /// Remove an installed package.
    Uninstall { package: String },
    /// List installed packages.
    List,
    /// Show or change the configured default repository.
    Repo(RepoArgs),
    /// Show metadata for an installed or remote package.
    Info { package: String },
    /// List the files of an installed package's module.
    Content { package: String },
}

#[derive(Args)]
struct RunArgs {
    package: String,
    #[arg(long, value_delimiter = ',')]
    modules: Vec<String>,
    #[arg(long)]
    exec: Option<String>,
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Args)]
struct InstallArgs {
    /// A package id/reference, or a path to a `.layer`/`.uab` file.
    target: String,
}

#[derive(Args)]
struct RepoArgs {
    #[command(subcommand)]
    action: RepoAction,
}

#[derive(Subcommand)]
enum RepoAction {
    SetDefault { name: String, url: String },
    Show,
}

struct ConsoleObserver;

impl TaskObserver for ConsoleObserver {
    fn on_task_changed(&self, event: TaskEvent) {
        println!("[{}%] {} ({})", event.percentage, event.message, event.state);
    }
}

fn parse_fuzzy(package: &str) -> Result<FuzzyReference> {
    Ok(package.parse::<FuzzyReference>()?)
}

async fn resolve<S: LayerStore>(store: &S, package: &str) -> Result<linyaps_ident::Reference> {
    let fuzzy = parse_fuzzy(package)?;
    Ok(store.clear_reference(&fuzzy, false, false).await?)
}

fn file_type_for(path: &std::path::Path) -> Option<FileType> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("layer") => Some(FileType::Layer),
        Some("uab") => Some(FileType::Uab),
        _ => None,
    }
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
    let store = Arc::new(open_store());
    let manager = PackageManager::new(store.clone());

    match command {
        Command::Run(args) | Command::Exec(args) => {
            let reference = resolve(store.as_ref(), &args.package).await?;
            let modules: Option<Vec<String>> = if args.modules.is_empty() { None } else { Some(args.modules) };
            let merged = store.get_merged_module_dir(&reference, modules.as_deref()).await?;

            let argv: Vec<String> = if let Some(exec) = &args.exec {
                shell_words::split(exec).unwrap_or_else(|_| vec![exec.clone()])
            } else if !args.args.is_empty() {
                args.args
            } else {
                Vec::new()
            };

            let bundle_dir = linyaps_cli::builder_cache_dir().join("run").join(&reference.id);
            container::run_app(&reference.id, &merged, None, &bundle_dir, &argv).await?;
        }
        Command::Enter { .. } | Command::Ps | Command::Kill { .. } => {
            return Err(Error::Usage(
                "running-instance supervision requires an external process supervisor".to_string(),
            ));
        }
        Command::Install(args) => {
            let path = PathBuf::from(&args.target);
            let (task_id, result) = if path.exists() {
                let file_type = file_type_for(&path).ok_or_else(|| {
                    Error::Usage(format!("{}: unrecognized file type, expected .layer or .uab", path.display()))
                })?;
                manager.install_from_file(&path, file_type, Arc::new(ConsoleObserver)).await
            } else {
                let fuzzy = parse_fuzzy(&args.target)?;
                manager.install(fuzzy, Arc::new(ConsoleObserver)).await
            };
            let reference = result?;
            println!("installed {reference} (task {task_id})");
        }
        Command::Upgrade { package } => {
            let fuzzy = parse_fuzzy(&package)?;
            let (task_id, result) = manager.update(fuzzy, Arc::new(ConsoleObserver)).await;
            let reference = result?;
            println!("updated to {reference} (task {task_id})");
        }
        Command::Search { package } => {
            let fuzzy = parse_fuzzy(&package)?;
            let results = manager.search(&fuzzy).await?;
            print_package_table(&results);
        }
        Command::Uninstall { package } => {
            let reference = resolve(store.as_ref(), &package).await?;
            manager.uninstall(reference.clone()).await?;
            println!("uninstalled {reference}");
        }
        Command::List => {
            let results = store.list_local().await?;
            print_package_table(&results);
        }
        Command::Repo(args) => {
            let mut config = store.get_config();
            match args.action {
                RepoAction::SetDefault { name, url } => {
                    config.default_repo_name = Some(name);
                    config.default_repo_url = Some(url);
                    store.set_config(config).await?;
                }
                RepoAction::Show => {
                    println!("{}: {}", config.default_repo_name.unwrap_or_default(), config.default_repo_url.unwrap_or_default());
                }
            }
        }
        Command::Info { package } => {
            let reference = resolve(store.as_ref(), &package).await?;
            let checkout = tempfile::tempdir()?;
            store.checkout(&reference, checkout.path()).await?;
            let info_bytes = std::fs::read(checkout.path().join("info.json"))?;
            let info: PackageInfo = serde_json::from_slice(&info_bytes)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Content { package } => {
            let reference = resolve(store.as_ref(), &package).await?;
            let dir = store.get_merged_module_dir(&reference, None).await?;
            for entry in walkdir::WalkDir::new(&dir).min_depth(1) {
                let entry = entry.map_err(std::io::Error::from)?;
                let relative = entry.path().strip_prefix(&dir).expect("descendant of dir");
                println!("{}", relative.display());
            }
        }
    }
    Ok(())
}

fn print_package_table(packages: &[PackageInfo]) {
    for info in packages {
        println!("{}\t{}\t{}", info.id, info.version, info.description);
    }
}
