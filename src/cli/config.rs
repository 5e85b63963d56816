use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "e2e-pages",
    version,
    about = "Generate page objects for end-to-end tests from component templates"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: e2e-pages.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate raw and editable page objects for every routed page
    Generate {
        /// Project root (overrides project.root)
        #[arg(long)]
        root: Option<String>,

        /// Routing declaration file, relative to the root
        #[arg(long)]
        routes: Option<String>,

        /// Output directory, relative to the root
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the route table
    Routes {
        /// Routing declaration file, relative to the root
        #[arg(long)]
        routes: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print the classified template tree of one component
    Inspect {
        /// Component identifier, e.g. UsersPageComponent
        #[arg(long)]
        component: String,

        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
}

/// Apply command-line overrides on top of the loaded (file + environment)
/// configuration. Only flags that were given replace anything.
pub fn apply_cli_overrides(mut config: Config, command: &Commands) -> Config {
    match command {
        Commands::Generate {
            root,
            routes,
            output,
        } => {
            if let Some(root) = root {
                config.project.root = root.into();
            }
            if let Some(routes) = routes {
                config.project.routes_file = routes.into();
            }
            if let Some(output) = output {
                config.project.output_dir = output.into();
            }
        }
        Commands::Routes { routes, .. } => {
            if let Some(routes) = routes {
                config.project.routes_file = routes.into();
            }
        }
        Commands::Inspect { .. } => {}
    }
    config
}
