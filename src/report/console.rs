use std::path::{Path, PathBuf};

use crate::generator::run::GenerationReport;

// ============================================================================
// Console reporter
// ============================================================================

/// Format a generation run for the terminal.
///
/// Produces output like:
/// ```text
/// === e2e-pages: e2e/pages_gen ===
///
/// ✓ WROTE      raw/users_page_component.rs
/// · UNCHANGED  raw/mod.rs
/// · KEPT       pages/users_page_component.rs
/// ✗ FAIL       OrdersComponent: src/app/orders/orders.component.html:4: unclosed start tag
///
/// === Results: 1 written, 1 unchanged, 1 kept, 1 failed ===
/// ```
pub fn format_console_report(report: &GenerationReport, output_dir: &Path) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== e2e-pages: {} ===\n\n", output_dir.display()));

    push_paths(&mut out, "\u{2713} WROTE    ", &report.written, output_dir);
    push_paths(&mut out, "\u{b7} UNCHANGED", &report.unchanged, output_dir);
    push_paths(&mut out, "\u{b7} KEPT     ", &report.preserved, output_dir);

    for failure in &report.failures {
        out.push_str(&format!(
            "\u{2717} FAIL       {}: {}\n",
            failure.target, failure.message
        ));
    }

    out.push_str(&format!(
        "\n=== Results: {} written, {} unchanged, {} kept, {} failed ===\n",
        report.written.len(),
        report.unchanged.len(),
        report.preserved.len(),
        report.failures.len()
    ));

    out
}

fn push_paths(out: &mut String, marker: &str, paths: &[PathBuf], output_dir: &Path) {
    for path in paths {
        let shown = path.strip_prefix(output_dir).unwrap_or(path);
        out.push_str(&format!(
            "{}  {}\n",
            marker,
            shown.to_string_lossy().replace('\\', "/")
        ));
    }
}
