mod backend;
mod cli;
mod commands;
mod deploy;
mod exit;
mod keyword;
mod paths;
mod rewrite;
mod runner;
mod secrets;
mod topology;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, ContainerCommand, NamespaceCommand};
use ruledb::Catalog;
use std::io;

/// Global context for the application
pub struct Context {
    pub namespace: String,
    pub provider: String,
    pub memory: Option<String>,
    pub cpus: Option<String>,
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    notify_on_stale_catalog();

    let ctx = Context {
        namespace: cli.namespace,
        provider: cli.provider,
        memory: cli.memory,
        cpus: cli.cpus,
        verbose: cli.verbose > 0,
    };

    match cli.command {
        Commands::Deploy(args) => commands::deploy::run(&ctx, &args),
        Commands::Destroy => commands::namespace::destroy(&ctx.namespace),
        Commands::Namespace(cmd) => match cmd {
            NamespaceCommand::Create(args) => commands::namespace::create(&ctx, &args),
            NamespaceCommand::List => commands::namespace::list(),
            NamespaceCommand::Delete { name } => commands::namespace::destroy(&name),
        },
        Commands::Container(cmd) => match cmd {
            ContainerCommand::List => commands::container::list(&ctx),
            ContainerCommand::Create(args) => commands::container::create(&ctx, &args),
        },
        Commands::Exec(args) => commands::exec::run(&ctx, &args.args),
        Commands::Playbook => commands::playbook::run(&ctx),
        Commands::Update(args) => commands::update::run(args.file.as_deref()),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dbstand", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print a notice when the rule catalog doesn't match this build
///
/// Best-effort: an unreadable catalog is handled where it matters, not here.
fn notify_on_stale_catalog() {
    let Ok(db_path) = paths::database_path() else {
        return;
    };
    let Ok(catalog) = Catalog::open(&db_path) else {
        return;
    };
    if let Ok(Some(version)) = catalog.schema_version("dbstand")
        && version != env!("CARGO_PKG_VERSION")
    {
        log::warn!(
            "rule catalog {} was published for version {version}; run `dbstand update` to refresh",
            db_path.display()
        );
    }
}
