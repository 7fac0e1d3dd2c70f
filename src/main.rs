// src/main.rs — Kindred entry point

use clap::Parser;
use tokio_util::sync::CancellationToken;

use kindred::cli::{generate, providers, Cli, Commands};
use kindred::generation::GenerationFacade;
use kindred::infra::config::Config;
use kindred::infra::logger;
use kindred::provider::resolver::ProviderRegistry;

#[tokio::main]
async fn main() {
    // Initialize logging (respects KINDRED_LOG / RUST_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let registry = ProviderRegistry::from_config(&config).await;

    if let Commands::Providers = cli.command {
        providers::show_providers(&config, &registry);
        return Ok(());
    }

    let facade = GenerationFacade::new(&config, registry)?;
    let preferred = cli.provider.as_deref();

    // Ctrl-C cancels the in-flight request instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Reply { transcript, system } => {
            generate::run_reply(&facade, &transcript, &system, preferred, &cancel).await
        }
        Commands::Suggest { transcript, system } => {
            generate::run_suggest(&facade, &transcript, &system, preferred, &cancel).await
        }
        Commands::Scenario { personality, theme } => {
            generate::run_scenario(&facade, &personality, theme.as_deref(), preferred, &cancel)
                .await
        }
        Commands::Image {
            prompt,
            reference,
            out,
        } => generate::run_image(&facade, &prompt, reference.as_deref(), &out, &cancel).await,
        Commands::Teaser {
            personality,
            watch,
            interval_secs,
        } => generate::run_teaser(&facade, &personality, watch, interval_secs, &cancel).await,
        Commands::Providers => Ok(()),
    }
}
