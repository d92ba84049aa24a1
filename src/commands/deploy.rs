//! The `deploy` command: help surface, implicit destroy, orchestration

use anyhow::Result;
use ruledb::Catalog;

use crate::cli::DeployArgs;
use crate::commands::namespace;
use crate::deploy;
use crate::exit;
use crate::paths;
use crate::topology::PlanDefaults;
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, args: &DeployArgs) -> Result<()> {
    let catalog = Catalog::open(&paths::database_path()?)?;

    if args.directives.first().is_some_and(|d| d == "help") {
        return print_help(&catalog, &args.directives[1..]);
    }

    // A fresh deploy replaces whatever the namespace currently runs
    if !args.keep {
        namespace::destroy(&ctx.namespace)?;
    }

    let defaults = PlanDefaults {
        provider: ctx.provider.clone(),
        memory: ctx.memory.clone(),
        cpus: ctx.cpus.clone(),
    };
    if let Err(err) = deploy::run(
        &catalog,
        &ctx.namespace,
        &args.directives,
        &defaults,
        ctx.verbose,
    ) {
        ui::error(&format!("deployment failed: {err:#}"));
        std::process::exit(exit::BACKEND_PROBLEM);
    }
    Ok(())
}

fn print_help(catalog: &Catalog, args: &[String]) -> Result<()> {
    ui::header("Deployment directives");
    println!("dbstand deploy help            # all examples");
    println!("dbstand deploy help [keyword]  # examples for one keyword");
    println!("dbstand deploy help keywords   # list of keywords");
    println!();

    let Some(first) = args.first() else {
        for example in catalog.deploy_examples(None)? {
            println!("{}", example.deploy);
        }
        return Ok(());
    };

    if first == "keywords" {
        for keyword in catalog.keywords()? {
            println!("{keyword}");
        }
        return Ok(());
    }

    let keyword = catalog.keyword_alias(first)?;

    ui::section(&format!("Aliases for {keyword}"));
    for alias in catalog.aliases_for(&keyword)? {
        println!("{alias}");
    }

    ui::section(&format!("Sub-arguments for {keyword}"));
    for subcmd in catalog.subcommands_for(&keyword)? {
        if !subcmd.is_empty() {
            println!("{subcmd}");
        }
    }

    ui::section("Examples");
    for example in catalog.deploy_examples(Some(&keyword))? {
        println!("{}", example.deploy);
    }
    Ok(())
}
