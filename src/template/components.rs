use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::naming;

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "target", ".angular"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
}

/// A component template found under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEntry {
    /// Class-style identifier: `user-card.component.html` → `UserCardComponent`.
    pub component_id: String,
    pub template: PathBuf,
}

/// Component templates of a project, keyed by file name without the
/// template suffix (`user-card`), which is also the custom-element name
/// after the selector prefix (`<app-user-card>`).
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    by_name: BTreeMap<String, ComponentEntry>,
}

impl ComponentIndex {
    /// Walk `root` once and index every file ending in `template_suffix`.
    /// Vendor and build directories are not entered.
    pub fn discover(root: &Path, template_suffix: &str) -> Self {
        let mut index = ComponentIndex::default();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("cannot list {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if let Some(name) = file_name.strip_suffix(template_suffix) {
                if !name.is_empty() {
                    index.insert(name, entry.path().to_path_buf());
                }
            }
        }

        debug!("discovered {} component templates under {}", index.len(), root.display());
        index
    }

    pub fn insert(&mut self, name: &str, template: PathBuf) {
        let entry = ComponentEntry {
            component_id: naming::class_name_from_file(&template),
            template,
        };
        if let Some(previous) = self.by_name.get(name) {
            // Keep the first path in sorted order so discovery is deterministic.
            if previous.template <= entry.template {
                return;
            }
        }
        self.by_name.insert(name.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve a custom element tag (`app-user-card`) to its component.
    pub fn by_selector(&self, tag: &str, selector_prefix: &str) -> Option<&ComponentEntry> {
        let name = tag.strip_prefix(selector_prefix)?;
        self.by_name.get(name)
    }

    pub fn by_id(&self, component_id: &str) -> Option<&ComponentEntry> {
        self.by_name.values().find(|e| e.component_id == component_id)
    }
}
