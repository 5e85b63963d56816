use clap::Parser;
use e2e_pages::cli::commands::{cmd_generate, cmd_inspect, cmd_routes};
use e2e_pages::cli::config::{Cli, Commands, apply_cli_overrides};
use e2e_pages::config::load_config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // CLI > env > file > defaults
    let config = apply_cli_overrides(load_config(cli.config.as_deref()), &cli.command);

    match cli.command {
        Commands::Generate { .. } => {
            let all_generated = cmd_generate(&config)?;
            if !all_generated {
                std::process::exit(1);
            }
        }
        Commands::Routes { format, .. } => cmd_routes(&config, format)?,
        Commands::Inspect { component, format } => cmd_inspect(&config, &component, format)?,
    }

    Ok(())
}
