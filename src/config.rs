use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "e2e-pages.yaml";

/// Prefix of environment variables overriding config leaves:
/// `E2E_PAGES__apps__shop__base_url=http://localhost:4200/`.
pub const ENV_PREFIX: &str = "E2E_PAGES";

// ============================================================================
// Config File Model
// ============================================================================

/// Optional YAML config file: `e2e-pages.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    /// Per-application wait/ready settings, keyed by application name.
    #[serde(default)]
    pub apps: BTreeMap<String, AppSettings>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Where the front-end project lives and where generated code goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Routing declarations, relative to `root`.
    #[serde(default = "default_routes_file")]
    pub routes_file: PathBuf,

    #[serde(default = "default_template_suffix")]
    pub template_suffix: String,

    /// Custom-element prefix of nested components (`app-user-card`).
    #[serde(default = "default_selector_prefix")]
    pub selector_prefix: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Crate path generated code uses to reach the runtime.
    #[serde(default = "default_runtime_crate")]
    pub runtime_crate: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            routes_file: default_routes_file(),
            template_suffix: default_template_suffix(),
            selector_prefix: default_selector_prefix(),
            output_dir: default_output_dir(),
            runtime_crate: default_runtime_crate(),
        }
    }
}

impl ProjectConfig {
    pub fn routes_path(&self) -> PathBuf {
        self.root.join(&self.routes_file)
    }

    /// Generated tree location; relative paths are taken from `root`.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }
}

/// Template conventions driving the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_e2e_attribute")]
    pub e2e_attribute: String,

    #[serde(default = "default_table_attribute")]
    pub table_attribute: String,

    #[serde(default = "default_table_tags")]
    pub table_tags: Vec<String>,

    /// Transient spinners excluded from the model.
    #[serde(default = "default_loader_classes")]
    pub loader_classes: Vec<String>,

    #[serde(default = "default_nav_classes")]
    pub nav_classes: Vec<String>,

    #[serde(default = "default_nav_tags")]
    pub nav_tags: Vec<String>,

    #[serde(default = "default_router_link_attributes")]
    pub router_link_attributes: Vec<String>,

    #[serde(default = "default_repeat_directives")]
    pub repeat_directives: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            e2e_attribute: default_e2e_attribute(),
            table_attribute: default_table_attribute(),
            table_tags: default_table_tags(),
            loader_classes: default_loader_classes(),
            nav_classes: default_nav_classes(),
            nav_tags: default_nav_tags(),
            router_link_attributes: default_router_link_attributes(),
            repeat_directives: default_repeat_directives(),
        }
    }
}

/// Wait/ready heuristics of one target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub base_url: String,

    #[serde(default)]
    pub page_loader_css_class: Option<String>,

    #[serde(default)]
    pub table_loader_css_class: Option<String>,

    /// Classes that together mark an open modal.
    #[serde(default)]
    pub modal_visible_css_class: Vec<String>,

    /// Whether the front end sets a global "page ready" flag.
    #[serde(default)]
    pub has_page_ready_script: bool,

    /// Whether `click_and_wait` waits for loaders at all.
    #[serde(default = "default_true")]
    pub wait_after_click: bool,

    /// Attribute `PageContext::find_by_e2e` looks elements up by.
    #[serde(default = "default_e2e_attribute")]
    pub e2e_attribute: String,
}

impl AppSettings {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            page_loader_css_class: None,
            table_loader_css_class: None,
            modal_visible_css_class: Vec::new(),
            has_page_ready_script: false,
            wait_after_click: true,
            e2e_attribute: default_e2e_attribute(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// Serde default helpers
fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_routes_file() -> PathBuf { PathBuf::from("src/app/app-routing.module.ts") }
fn default_template_suffix() -> String { ".component.html".to_string() }
fn default_selector_prefix() -> String { "app-".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from("e2e/pages_gen") }
fn default_runtime_crate() -> String { "e2e_pages".to_string() }
fn default_e2e_attribute() -> String { "data-e2e".to_string() }
fn default_table_attribute() -> String { "data-e2e-table".to_string() }
fn default_table_tags() -> Vec<String> { vec!["table".into(), "p-table".into()] }
fn default_loader_classes() -> Vec<String> { vec!["page-loader".into(), "table-loader".into()] }
fn default_nav_classes() -> Vec<String> {
    vec!["nav".into(), "navbar".into(), "menu".into(), "sidebar".into()]
}
fn default_nav_tags() -> Vec<String> { vec!["nav".into()] }
fn default_router_link_attributes() -> Vec<String> {
    vec!["routerLink".into(), "[routerLink]".into()]
}
fn default_repeat_directives() -> Vec<String> { vec!["*ngFor".into()] }
fn default_true() -> bool { true }
fn default_wait_timeout_ms() -> u64 { 60_000 }
fn default_poll_interval_ms() -> u64 { 250 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file, then apply `E2E_PAGES__…` environment
/// overrides. Returns defaults if the file is missing or malformed.
pub fn load_config(path: Option<&str>) -> Config {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    let config = match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str::<Config>(&content) {
            Ok(c) => c,
            Err(e) => {
                warn!("ignoring malformed config {}: {}", config_path, e);
                Config::default()
            }
        },
        Err(_) => {
            debug!("no config file at {}, using defaults", config_path);
            Config::default()
        }
    };
    apply_env_overrides(config, std::env::vars())
}

/// Override scalar leaves of `config` from `(key, value)` pairs whose key
/// starts with `E2E_PAGES__`. Nested keys are separated by `__`. Values are
/// converted to the type of the leaf they replace; entries that do not
/// name an existing leaf are skipped with a warning.
pub fn apply_env_overrides<I>(config: Config, vars: I) -> Config
where
    I: IntoIterator<Item = (String, String)>,
{
    let prefix = format!("{}__", ENV_PREFIX);
    let mut tree = match serde_yaml::to_value(&config) {
        Ok(v) => v,
        Err(e) => {
            warn!("cannot apply environment overrides: {}", e);
            return config;
        }
    };

    let mut used = Vec::new();
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(&prefix) else {
            continue;
        };
        let segments: Vec<&str> = path.split("__").collect();
        match override_leaf(&mut tree, &segments, &value) {
            Ok(()) => used.push(key),
            Err(reason) => warn!("skipping config override {}: {}", key, reason),
        }
    }

    if used.is_empty() {
        return config;
    }
    info!("config overrides from environment: {:?}", used);
    match serde_yaml::from_value(tree) {
        Ok(c) => c,
        Err(e) => {
            warn!("environment overrides produced an invalid config: {}", e);
            config
        }
    }
}

fn override_leaf(tree: &mut Value, segments: &[&str], raw: &str) -> Result<(), String> {
    let Some((first, rest)) = segments.split_first() else {
        return Err("empty key".into());
    };
    let Value::Mapping(map) = tree else {
        return Err(format!("'{}' is not a section", first));
    };

    let key = map
        .keys()
        .find(|k| k.as_str().is_some_and(|s| s == *first))
        .or_else(|| {
            map.keys()
                .find(|k| k.as_str().is_some_and(|s| s.eq_ignore_ascii_case(first)))
        })
        .cloned()
        .ok_or_else(|| format!("unknown key '{}'", first))?;

    let Some(slot) = map.get_mut(&key) else {
        return Err(format!("unknown key '{}'", first));
    };

    if !rest.is_empty() {
        return override_leaf(slot, rest, raw);
    }

    *slot = match slot {
        Value::Mapping(_) => return Err("cannot replace a section with a scalar".into()),
        Value::Bool(_) => Value::Bool(parse_bool(raw).ok_or_else(|| format!("'{}' is not a bool", raw))?),
        Value::Number(n) if n.is_f64() => {
            let f: f64 = raw.parse().map_err(|_| format!("'{}' is not a number", raw))?;
            Value::from(f)
        }
        Value::Number(_) => {
            let i: u64 = raw.parse().map_err(|_| format!("'{}' is not an integer", raw))?;
            Value::from(i)
        }
        Value::Sequence(_) => Value::Sequence(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        _ => Value::String(raw.to_string()),
    };
    Ok(())
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "1" | "yes" => Some(true),
        "false" | "False" | "0" | "no" => Some(false),
        _ => None,
    }
}
