use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::GenerateError;
use crate::generator::emit::{self, EmitOptions};
use crate::generator::writer::{self, WriteOutcome};
use crate::routes::route_table::extract_routes;
use crate::template::builder::ModelBuilder;
use crate::template::components::ComponentIndex;
use crate::template::model::PageModel;

/// A page or component that produced no output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFailure {
    pub target: String,
    pub message: String,
}

/// Everything a generation run did, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub preserved: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
}

impl GenerationReport {
    fn record(&mut self, path: PathBuf, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written.push(path),
            WriteOutcome::Unchanged => self.unchanged.push(path),
            WriteOutcome::Preserved => self.preserved.push(path),
        }
    }

    fn fail(&mut self, target: &str, message: String) {
        error!("{}: {}", target, message);
        self.failures.push(PageFailure {
            target: target.to_string(),
            message,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Rendered {
    module: String,
    raw: String,
    editable: Option<String>,
}

/// Run a full generation: routes → models → raw and editable sources.
///
/// A broken routing file or an import cycle aborts the run before any file
/// is written. Per-page problems are collected in the report and the other
/// pages are still generated.
pub fn run_generation(config: &Config) -> Result<GenerationReport, GenerateError> {
    let project = &config.project;
    let routes = extract_routes(&project.routes_path())?;
    let components = ComponentIndex::discover(&project.root, &project.template_suffix);
    let outcome = ModelBuilder::new(project, &config.parser, &components).build_all(&routes)?;

    let mut report = GenerationReport::default();
    let mut failed: BTreeSet<String> = BTreeSet::new();
    for failure in outcome.failures {
        failed.insert(failure.target.clone());
        report.fail(&failure.target, failure.error.to_string());
    }
    for (target, dependency) in dependents_of_failures(&outcome.models, &failed) {
        failed.insert(target.clone());
        report.fail(&target, format!("depends on component '{}' which failed", dependency));
    }

    // Render everything before touching the output tree.
    let options = EmitOptions {
        runtime_crate: project.runtime_crate.clone(),
    };
    let mut rendered = Vec::new();
    for (id, model) in &outcome.models {
        if failed.contains(id) {
            continue;
        }
        match render_model(model, &project.root, &options) {
            Ok(r) => rendered.push(r),
            Err(e) if e.is_fatal_for_run() => return Err(e),
            Err(e) => report.fail(id, e.to_string()),
        }
    }

    let out = project.output_path();
    let raw_dir = out.join("raw");
    let pages_dir = out.join("pages");

    let mut raw_modules = BTreeSet::new();
    let mut page_modules = Vec::new();
    for r in &rendered {
        let path = raw_dir.join(format!("{}.rs", r.module));
        let outcome = writer::write_generated(&path, &r.raw)?;
        report.record(path, outcome);
        raw_modules.insert(r.module.clone());

        if let Some(editable) = &r.editable {
            let path = pages_dir.join(format!("{}.rs", r.module));
            let outcome = writer::write_if_absent(&path, editable)?;
            report.record(path, outcome);
            page_modules.push(r.module.clone());
        }
    }

    if !raw_modules.is_empty() {
        let path = raw_dir.join("mod.rs");
        let outcome = writer::write_generated(&path, &emit::render_raw_mod(&raw_modules)?)?;
        report.record(path, outcome);
    }
    if !page_modules.is_empty() {
        let path = pages_dir.join("mod.rs");
        let outcome = writer::merge_mod_file(&path, &page_modules)?;
        report.record(path, outcome);
    }
    if !rendered.is_empty() {
        let path = out.join("mod.rs");
        let outcome = writer::write_if_absent(&path, &emit::render_root_mod())?;
        report.record(path, outcome);
    }

    info!(
        "generation finished: {} written, {} unchanged, {} preserved, {} failed",
        report.written.len(),
        report.unchanged.len(),
        report.preserved.len(),
        report.failures.len()
    );
    Ok(report)
}

fn render_model(model: &PageModel, root: &Path, options: &EmitOptions) -> Result<Rendered, GenerateError> {
    let label = model
        .template_path
        .strip_prefix(root)
        .unwrap_or(&model.template_path)
        .to_string_lossy()
        .replace('\\', "/");
    let raw = emit::render_raw(model, &label, options)?;
    let editable = if model.is_page() {
        Some(emit::render_editable(model, options)?)
    } else {
        None
    };
    Ok(Rendered {
        module: emit::module_name(&model.page_id),
        raw,
        editable,
    })
}

/// Models importing (directly or transitively) a component that failed,
/// paired with the failed dependency.
fn dependents_of_failures(
    models: &BTreeMap<String, PageModel>,
    failed: &BTreeSet<String>,
) -> Vec<(String, String)> {
    let mut broken: BTreeMap<String, String> = BTreeMap::new();
    loop {
        let mut changed = false;
        for (id, model) in models {
            if failed.contains(id) || broken.contains_key(id) {
                continue;
            }
            let cause = model.imports.iter().find_map(|import| {
                if failed.contains(import) {
                    Some(import.clone())
                } else {
                    broken.get(import).cloned()
                }
            });
            if let Some(cause) = cause {
                warn!("{} skipped: imports failed component {}", id, cause);
                broken.insert(id.clone(), cause);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    broken.into_iter().collect()
}
