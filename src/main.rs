mod app;
mod cli;

use anyhow::Result;
use bayes_spam::{
    config,
    infrastructure::{directories, logging},
};
use clap::Parser;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, config.storage.backend)?;
    logging::init_tracing(&config.logging, &paths)?;
    tracing::debug!(target: "cli", command = ?cli.command, "starting");

    app::BayesApp::initialize(config, paths).run(cli.command)
}
