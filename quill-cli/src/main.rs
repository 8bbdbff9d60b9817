use anyhow::Result;
use clap::{Parser, Subcommand};
use quill_cli::{DialectArgs, ast_cmd, diff_cmd, render_cmd};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill", version, about = "Quill template compiler & reconciler")]
struct Cli {
    #[command(flatten)]
    dialect: DialectArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template with JSON data and print the HTML
    Render {
        input: PathBuf,
        /// JSON object holding the template data
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Print the compiled template tree
    Ast { input: PathBuf },
    /// Print the patches that turn one render into another
    Diff {
        input: PathBuf,
        /// Data of the first render
        #[arg(long)]
        data: PathBuf,
        /// Data of the second render
        #[arg(long)]
        data2: PathBuf,
        /// Apply the patches and print the resulting HTML instead
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = match cli.command {
        Commands::Render { input, data } => render_cmd(&input, data.as_deref(), &cli.dialect)?,
        Commands::Ast { input } => ast_cmd(&input, &cli.dialect)?,
        Commands::Diff {
            input,
            data,
            data2,
            apply,
        } => diff_cmd(&input, &data, &data2, apply, &cli.dialect)?,
    };
    print!("{out}");
    if !out.ends_with('\n') {
        println!();
    }
    Ok(())
}
