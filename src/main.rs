mod bookkeeper;
mod config;
mod export;
mod models;
mod repository;
mod run;
mod util;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::bookkeeper::Bookkeeper;
use crate::config::Config;
use crate::repository::{RepositoryFactory, Storage};

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args)?;
    if let Storage::File(path) = &config.storage {
        tracing::debug!(path = %path.display(), "using database file");
    }

    let factory = RepositoryFactory::new(config.storage.clone());
    let mut bk = Bookkeeper::new(&factory).context("Failed to open the bookkeeper")?;
    run::as_cli(&config.command, &mut bk)
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
