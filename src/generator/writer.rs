use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::GenerateError;
use crate::generator::emit;

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Written,
    /// Identical content already on disk; not rewritten.
    Unchanged,
    /// User-owned file left as it was.
    Preserved,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> GenerateError + '_ {
    move |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_beside(path: &Path, contents: &str) -> Result<NamedTempFile, GenerateError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent).map_err(io_error(&parent))?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(io_error(&parent))?;
    temp.write_all(contents.as_bytes()).map_err(io_error(path))?;
    temp.flush().map_err(io_error(path))?;
    Ok(temp)
}

/// Write through a temporary file in the target directory, then rename
/// it over `path`. Readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), GenerateError> {
    let temp = temp_beside(path, contents)?;
    temp.persist(path).map_err(|e| GenerateError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Write a regenerable file. Identical content is left alone; a file whose
/// body no longer matches its checksum is reported as hand-edited before
/// it is replaced.
pub fn write_generated(path: &Path, contents: &str) -> Result<WriteOutcome, GenerateError> {
    match std::fs::read_to_string(path) {
        Ok(existing) if existing == contents => {
            debug!("unchanged {}", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
        Ok(existing) if emit::is_hand_edited(&existing) => {
            warn!("{} was edited by hand; regenerating it discards those edits", path.display());
        }
        _ => {}
    }
    write_atomic(path, contents)?;
    info!("wrote {}", path.display());
    Ok(WriteOutcome::Written)
}

/// Create a user-owned file only if nothing exists at `path` yet.
pub fn write_if_absent(path: &Path, contents: &str) -> Result<WriteOutcome, GenerateError> {
    if path.exists() {
        debug!("preserving {}", path.display());
        return Ok(WriteOutcome::Preserved);
    }
    let temp = temp_beside(path, contents)?;
    match temp.persist_noclobber(path) {
        Ok(_) => {
            info!("created {}", path.display());
            Ok(WriteOutcome::Written)
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(WriteOutcome::Preserved),
        Err(e) => Err(GenerateError::Io {
            path: path.to_path_buf(),
            source: e.error,
        }),
    }
}

/// Make sure a user-owned module file declares every module in `modules`.
/// Missing declarations are appended; existing content is kept verbatim.
pub fn merge_mod_file(path: &Path, modules: &[String]) -> Result<WriteOutcome, GenerateError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut contents = String::new();
            for module in modules {
                contents.push_str(&emit::mod_line(module));
                contents.push('\n');
            }
            return write_if_absent(path, &contents);
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    let declared = |module: &str| {
        existing.lines().any(|line| {
            let line = line.trim();
            line == emit::mod_line(module) || line == format!("mod {};", module)
        })
    };
    let missing: Vec<&String> = modules.iter().filter(|m| !declared(m.as_str())).collect();
    if missing.is_empty() {
        return Ok(WriteOutcome::Unchanged);
    }

    let mut merged = existing.clone();
    if !merged.is_empty() && !merged.ends_with('\n') {
        merged.push('\n');
    }
    for module in &missing {
        merged.push_str(&emit::mod_line(module));
        merged.push('\n');
    }
    write_atomic(path, &merged)?;
    info!("added {} module declarations to {}", missing.len(), path.display());
    Ok(WriteOutcome::Written)
}
