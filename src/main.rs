use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use ctxmenu::cli::{BackupAction, Cli, Commands};
use ctxmenu::output::{self, Verbosity};
use ctxmenu::{MenuContext, commands};
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "CTXMENU_LOG";

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    output::set_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose));

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = MenuContext::new()?;

    match cli.command {
        Commands::List { scenario, changed } => commands::list::execute(&ctx, scenario, changed)?,
        Commands::Disable { id, target } => commands::toggle::execute(&ctx, &id, &target, false)?,
        Commands::Enable { id, target } => commands::toggle::execute(&ctx, &id, &target, true)?,
        Commands::Backup { action } => match action {
            BackupAction::Create { message } => commands::backup::create(&ctx, &message)?,
            BackupAction::List => commands::backup::list(&ctx)?,
            BackupAction::Restore { backup, yes } => {
                commands::backup::restore(&ctx, &backup, yes)?;
            }
            BackupAction::Cleanup { keep } => commands::backup::cleanup(&ctx, keep)?,
        },
        Commands::Reset { yes } => commands::reset::execute(&ctx, yes)?,
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => commands::config::execute(&mut ctx, key.as_deref(), value, unset, list)?,
        Commands::Completion { .. } => {}
    }

    Ok(())
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
