//! autograde CLI: grading assistant for Java lab submissions.
//!
//! Builds a student's archive inside the lab template, runs every question
//! against the instructor's fixtures, and writes a Markdown report for
//! manual grading.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
