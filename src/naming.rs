use std::path::Path;

// ============================================================================
// Identifier derivation shared by the template builder and the generator
// ============================================================================

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Split a free-form string into lowercase alphanumeric words.
///
/// `"Aside-Nav.component"` → `["aside", "nav", "component"]`. CamelCase
/// boundaries also split: `"userName"` → `["user", "name"]`.
pub fn words(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in raw.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.extend(c.to_lowercase());
        } else {
            prev_lower = false;
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Convert a name hint to a valid Rust field/module identifier.
///
/// Returns `None` when the hint carries no usable characters at all.
pub fn snake_ident(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c == '#') {
        return Some("id_".to_string());
    }

    let parts = words(trimmed);
    if parts.is_empty() {
        return None;
    }

    let mut name = parts.join("_");
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'n');
    }
    if RUST_KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    Some(name)
}

/// Convert a name to UpperCamelCase for type names.
pub fn camel_ident(raw: &str) -> String {
    let mut name: String = words(raw)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'P');
    }
    name
}

/// Class name for a component template file.
///
/// `aside-nav.component.html` → `AsideNavComponent`.
pub fn class_name_from_file(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    camel_ident(&stem)
}

/// Module name for a component identifier: `AsideNavComponent` → `aside_nav_component`.
pub fn module_name(component_id: &str) -> String {
    snake_ident(component_id).unwrap_or_else(|| "page".to_string())
}
