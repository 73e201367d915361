//! Build automation for ctxmenu: man pages and shell completion scripts.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const BIN_NAME: &str = "ctxm";

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for ctxmenu")]
enum Task {
    /// Generate man pages from the clap definitions
    GenerateManPages {
        /// Output directory for man pages
        #[arg(short, long, default_value = "man")]
        output: PathBuf,
    },
    /// Generate completion scripts for every supported shell
    GenerateCompletions {
        /// Output directory for completion scripts
        #[arg(short, long, default_value = "completions")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    match Task::parse() {
        Task::GenerateManPages { output } => generate_man_pages(&output),
        Task::GenerateCompletions { output } => generate_completions(&output),
    }
}

fn render_page(cmd: clap::Command, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create man page: {}", path.display()))?;
    clap_mangen::Man::new(cmd).render(&mut BufWriter::new(file))?;
    println!("✓ Generated: {}", path.display());
    Ok(())
}

fn generate_man_pages(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let cmd = ctxmenu::cli::Cli::command();
    render_page(cmd.clone(), &output_dir.join(format!("{BIN_NAME}.1")))?;

    // One page per subcommand, named the way man(1) looks them up
    for sub in cmd.get_subcommands().filter(|sub| sub.get_name() != "help") {
        let name = format!("{BIN_NAME}-{}", sub.get_name());
        render_page(sub.clone().name(name.clone()), &output_dir.join(format!("{name}.1")))?;
    }

    println!("\nMan pages generated in: {}", output_dir.display());
    println!("View with: man {}/{BIN_NAME}.1", output_dir.display());
    Ok(())
}

fn generate_completions(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let mut cmd = ctxmenu::cli::Cli::command();
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell, Shell::Elvish] {
        let path = clap_complete::generate_to(shell, &mut cmd, BIN_NAME, output_dir)
            .with_context(|| format!("Failed to generate {shell} completions"))?;
        println!("✓ Generated: {}", path.display());
    }
    Ok(())
}
