//! lcsc-br (Backlog Review) - Read-only backlog inspection tool
//!
//! Opens a backlog file in read-only mode and reports per-classifier
//! progress, the recorded training set, and recent error diagnostics.
//! Never writes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lcsc_common::{config, db};

mod report;

#[derive(Parser, Debug)]
#[command(name = "lcsc-br", version, about = "Review progress of a classification backlog")]
struct Args {
    /// Backlog file (or directory containing todo.sqlite); falls back to
    /// LCSC_TODO_FILE and the config file when omitted
    todo_file: Option<PathBuf>,

    /// Emit the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Maximum number of recent errors to include
    #[arg(long, default_value_t = 10)]
    errors: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let todo_file = config::resolve_todo_file(args.todo_file.as_deref())?;
    info!("Backlog path: {}", todo_file.display());

    let pool = db::connect_readonly(&todo_file).await?;
    let report = report::build_report(&pool, args.errors).await?;
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_text(&report));
    }
    Ok(())
}
