use tracing::info;

use crate::cli::config::Format;
use crate::config::Config;
use crate::generator::run::run_generation;
use crate::report::console::format_console_report;
use crate::routes::route_table::{RouteTable, extract_routes};
use crate::template::builder::ModelBuilder;
use crate::template::components::ComponentIndex;

// ============================================================================
// generate subcommand
// ============================================================================

/// Run a generation and print its report. Returns whether every page
/// was generated.
pub fn cmd_generate(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    info!(
        "generating from {} into {}",
        config.project.routes_path().display(),
        config.project.output_path().display()
    );
    let report = run_generation(config)?;
    print!(
        "{}",
        format_console_report(&report, &config.project.output_path())
    );
    Ok(report.is_success())
}

// ============================================================================
// routes subcommand
// ============================================================================

pub fn cmd_routes(config: &Config, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let table = extract_routes(&config.project.routes_path())?;
    print!("{}", format_routes(&table, format)?);
    Ok(())
}

pub fn format_routes(table: &RouteTable, format: Format) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(&table.to_map())? + "\n",
        Format::Yaml => serde_yaml::to_string(&table.to_map())?,
        Format::Text => {
            let width = table.iter().map(|r| r.url_path.len()).max().unwrap_or(0);
            let mut out = String::new();
            for route in table.iter() {
                let shown = if route.url_path.is_empty() { "/" } else { &route.url_path };
                out.push_str(&format!(
                    "{:<width$}  {}\n",
                    shown,
                    route.component_id,
                    width = width.max(1)
                ));
            }
            out
        }
    })
}

// ============================================================================
// inspect subcommand
// ============================================================================

pub fn cmd_inspect(
    config: &Config,
    component: &str,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let project = &config.project;
    let routes = extract_routes(&project.routes_path())?;
    let components = ComponentIndex::discover(&project.root, &project.template_suffix);
    let model = ModelBuilder::new(project, &config.parser, &components).build_one(component, &routes)?;

    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(&model)? + "\n",
        Format::Yaml | Format::Text => serde_yaml::to_string(&model)?,
    };
    print!("{}", rendered);
    Ok(())
}
