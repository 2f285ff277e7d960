//! exoclass - Main entry point

use clap::Parser;
use exoclass::cli::{cmd_models, cmd_predict, cmd_train, cmd_versions, Cli, Commands};
use exoclass::config::Settings;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exoclass=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Train { data, model } => {
            cmd_train(&settings, data.as_ref(), &model)?;
        }
        Commands::Predict {
            model,
            version,
            input,
            proba,
            strict,
        } => {
            cmd_predict(&settings, &model, &version, &input, proba, strict)?;
        }
        Commands::Models => {
            cmd_models(&settings)?;
        }
        Commands::Versions { model } => {
            cmd_versions(&settings, &model)?;
        }
    }

    Ok(())
}
