use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ParseError;

/// `import { UsersComponent, UserCardComponent } from './users/users.component';`
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s*\{(?P<names>[^}]*)\}\s*from\s*["'](?P<path>[^"']+)["']"#)
        .expect("static regex")
});

/// `path: 'users/:id'` (quotes around the key optional).
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?\bpath["']?\s*:\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")"#)
        .expect("static regex")
});

/// `component: UsersComponent`
static COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?\bcomponent["']?\s*:\s*(?P<ident>[A-Za-z_$][\w$]*)"#)
        .expect("static regex")
});

// ============================================================================
// Route table model
// ============================================================================

/// One declared route. `import_path` is the module specifier the routing
/// file imports the component from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub url_path: String,
    pub component_id: String,
    pub import_path: String,
}

/// Mapping from URL path to route, ordered by URL path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    /// The routing file the table was extracted from.
    pub source: PathBuf,
    pub routes: BTreeMap<String, Route>,
}

impl RouteTable {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, url_path: &str) -> Option<&Route> {
        self.routes.get(url_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Plain `url_path → component_id` pairs.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.routes
            .iter()
            .map(|(path, r)| (path.clone(), r.component_id.clone()))
            .collect()
    }

    /// First declared route of a component, if it is routed at all.
    pub fn route_for(&self, component_id: &str) -> Option<&Route> {
        self.routes.values().find(|r| r.component_id == component_id)
    }

    /// Expected template location of a routed component: the import path,
    /// resolved against the routing file's directory, with the file name's
    /// suffix convention applied.
    ///
    /// `./users/users-list.component` + `.component.html` →
    /// `<routes dir>/users/users-list.component.html`.
    ///
    /// `None` for non-relative specifiers (path aliases, packages), which
    /// the caller resolves through component discovery instead.
    pub fn template_path(&self, route: &Route, template_suffix: &str) -> Option<PathBuf> {
        if !route.import_path.starts_with('.') {
            return None;
        }
        let base_dir = self.source.parent().unwrap_or(Path::new(""));
        let module = normalize_path(&base_dir.join(&route.import_path));
        let file_name = module.file_name()?.to_string_lossy().into_owned();

        let marker = template_suffix
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(template_suffix);
        let base = if marker.is_empty() {
            file_name.as_str()
        } else {
            file_name.strip_suffix(marker).unwrap_or(&file_name)
        };
        Some(module.with_file_name(format!("{}{}", base, template_suffix)))
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Read a routing declaration file and extract its route table.
pub fn extract_routes(path: &Path) -> Result<RouteTable, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_routes(path, &content)?;
    info!("extracted {} routes from {}", table.len(), path.display());
    Ok(table)
}

/// Extract routes from routing-file source text. `path` is used for error
/// reporting and for resolving relative imports later.
pub fn parse_routes(path: &Path, content: &str) -> Result<RouteTable, ParseError> {
    let malformed = |reason: String| ParseError::MalformedRoutes {
        path: path.to_path_buf(),
        reason,
    };

    let code = strip_comments(content);
    let objects = object_spans(&code).map_err(malformed)?;

    let imports = collect_imports(&code);
    debug!("{} component imports in {}", imports.len(), path.display());

    // Route objects: brace spans carrying their own `path:` key.
    let mut route_objects: Vec<RouteObject> = Vec::new();
    for caps in PATH_RE.captures_iter(&code) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(span) = innermost(&objects, whole.start()) else {
            continue;
        };
        if route_objects.iter().any(|r| r.span == span) {
            continue;
        }
        let value = caps
            .name("sq")
            .or_else(|| caps.name("dq"))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let component = COMPONENT_RE
            .captures_iter(&code[span.0..span.1])
            .filter_map(|c| c.name("ident"))
            .find(|m| innermost(&objects, span.0 + m.start()) == Some(span))
            .map(|m| m.as_str().to_string());

        route_objects.push(RouteObject {
            span,
            segment: value,
            component,
        });
    }

    if imports.is_empty() && route_objects.is_empty() {
        return Err(malformed("no imports or route declarations found".into()));
    }

    let mut routes = BTreeMap::new();
    for (idx, object) in route_objects.iter().enumerate() {
        let Some(component_id) = &object.component else {
            continue;
        };
        let url_path = full_path(&route_objects, idx);
        let import_path = imports
            .get(component_id)
            .ok_or_else(|| ParseError::UnresolvedImport {
                path: path.to_path_buf(),
                component: component_id.clone(),
            })?
            .clone();

        if routes.contains_key(&url_path) {
            return Err(ParseError::DuplicateRoute {
                path: path.to_path_buf(),
                url_path,
            });
        }
        debug!("route '{}' -> {}", url_path, component_id);
        routes.insert(
            url_path.clone(),
            Route {
                url_path,
                component_id: component_id.clone(),
                import_path,
            },
        );
    }

    if routes.is_empty() {
        return Err(malformed("no route with a component found".into()));
    }

    Ok(RouteTable {
        source: path.to_path_buf(),
        routes,
    })
}

struct RouteObject {
    span: (usize, usize),
    segment: String,
    component: Option<String>,
}

/// URL path of a route object, prefixed by the paths of enclosing route
/// objects (`children` arrays).
fn full_path(objects: &[RouteObject], idx: usize) -> String {
    let own = &objects[idx];
    let parent = objects
        .iter()
        .enumerate()
        .filter(|(i, o)| *i != idx && o.span.0 < own.span.0 && own.span.1 < o.span.1)
        .max_by_key(|(_, o)| o.span.0)
        .map(|(i, _)| i);

    let own_segment = own.segment.trim_matches('/');
    match parent {
        Some(p) => {
            let prefix = full_path(objects, p);
            match (prefix.is_empty(), own_segment.is_empty()) {
                (true, _) => own_segment.to_string(),
                (false, true) => prefix,
                (false, false) => format!("{}/{}", prefix, own_segment),
            }
        }
        None => own_segment.to_string(),
    }
}

fn collect_imports(code: &str) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    for caps in IMPORT_RE.captures_iter(code) {
        let (Some(names), Some(spec)) = (caps.name("names"), caps.name("path")) else {
            continue;
        };
        let specifier = spec.as_str();
        for name in names.as_str().split(',') {
            // `Foo as Bar` binds `Bar`.
            let local = name.split(" as ").last().unwrap_or(name).trim();
            if !local.is_empty() {
                imports.insert(local.to_string(), specifier.to_string());
            }
        }
    }
    imports
}

/// Blank out comments, keeping byte offsets and string literals intact.
fn strip_comments(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
                if i + 1 < bytes.len() {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                }
                i += 2;
            }
            quote @ (b'\'' | b'"' | b'`') => i = skip_literal(bytes, i, quote),
            _ => i += 1,
        }
    }

    // Comment bytes (including whole multi-byte sequences) became ASCII
    // spaces, so the buffer stays valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Index just past the string literal opened at `start`.
fn skip_literal(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() && bytes[i] != quote {
        if bytes[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    i + 1
}

/// Matched `{ }` pairs outside string literals, checking `[ ]` and `( )`
/// balance on the way.
fn object_spans(code: &str) -> Result<Vec<(usize, usize)>, String> {
    let bytes = code.as_bytes();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut spans = Vec::new();
    let line_of = |pos: usize| code[..pos].matches('\n').count() + 1;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                i = skip_literal(bytes, i, b);
                continue;
            }
            b'{' | b'[' | b'(' => stack.push((b, i)),
            b'}' | b']' | b')' => {
                let expected = match b {
                    b'}' => b'{',
                    b']' => b'[',
                    _ => b'(',
                };
                match stack.pop() {
                    Some((open, start)) if open == expected => {
                        if open == b'{' {
                            spans.push((start, i));
                        }
                    }
                    _ => return Err(format!("unbalanced '{}' on line {}", b as char, line_of(i))),
                }
            }
            _ => {}
        }
        i += 1;
    }

    if let Some((open, start)) = stack.pop() {
        return Err(format!("unclosed '{}' opened on line {}", open as char, line_of(start)));
    }
    Ok(spans)
}

fn innermost(spans: &[(usize, usize)], pos: usize) -> Option<(usize, usize)> {
    spans
        .iter()
        .filter(|(start, end)| *start < pos && pos < *end)
        .max_by_key(|(start, _)| *start)
        .copied()
}

/// Lexically resolve `.` and `..` components.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
