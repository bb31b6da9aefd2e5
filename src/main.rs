//! Transfusion - Main Entry Point

use clap::Parser;
use transfusion_automl::cli::{cmd_info, cmd_run, cmd_split, show_help, Cli, Commands, Overrides};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transfusion_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            data,
            config,
            seed,
            generations,
            population,
            space,
            artifact,
            payload,
        }) => {
            cmd_run(Overrides {
                data,
                config,
                seed,
                generations,
                population,
                space,
                artifact,
                payload,
            })?;
        }
        Some(Commands::Info { data, config }) => {
            cmd_info(Overrides {
                data,
                config,
                ..Default::default()
            })?;
        }
        Some(Commands::Split { data, config, seed }) => {
            cmd_split(Overrides {
                data,
                config,
                seed,
                ..Default::default()
            })?;
        }
        None => show_help(),
    }

    Ok(())
}
