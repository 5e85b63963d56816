mod common;

use std::fs;

use e2e_pages::error::GenerateError;
use e2e_pages::generator::emit::{self, EmitOptions, is_hand_edited, render_raw};
use e2e_pages::generator::run::run_generation;
use e2e_pages::generator::writer::{self, WriteOutcome};
use e2e_pages::template::model::{LocatorSpec, NodeKind, PageModel, TemplateNode};
use pretty_assertions::assert_eq;

fn node(kind: NodeKind, hint: &str, locator: LocatorSpec) -> TemplateNode {
    TemplateNode {
        kind,
        locator,
        name_hint: hint.to_string(),
        line: 1,
        children: Vec::new(),
    }
}

fn model(children: Vec<TemplateNode>) -> PageModel {
    PageModel {
        page_id: "ProfileComponent".to_string(),
        route: None,
        template_path: "src/app/profile/profile.component.html".into(),
        root: TemplateNode {
            children,
            ..node(NodeKind::Container, "profile", LocatorSpec::tags(&["app-profile"]))
        },
        imports: Default::default(),
    }
}

// ============================================================================
// Whole runs
// ============================================================================

#[test]
fn first_run_writes_raw_editable_and_module_files() {
    let project = common::sample_project();
    let report = run_generation(&project.config).unwrap();

    assert!(report.is_success());
    assert_eq!(
        common::relative_names(&report.written, &project.output()),
        vec![
            "mod.rs",
            "pages/dashboard_component.rs",
            "pages/mod.rs",
            "pages/users_page_component.rs",
            "raw/dashboard_component.rs",
            "raw/mod.rs",
            "raw/user_card_component.rs",
            "raw/users_page_component.rs",
        ]
    );

    let pages_mod = project.read_output("pages/mod.rs");
    assert_eq!(
        pages_mod,
        "pub mod dashboard_component;\npub mod users_page_component;\n"
    );
    assert_eq!(project.read_output("mod.rs"), "pub mod pages;\npub mod raw;\n");
}

#[test]
fn generation_is_idempotent() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();
    let first = project.read_output("raw/users_page_component.rs");

    let report = run_generation(&project.config).unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.unchanged.len(), 5);
    assert_eq!(report.preserved.len(), 3);
    assert_eq!(project.read_output("raw/users_page_component.rs"), first);
}

#[test]
fn editable_files_survive_regeneration() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();

    let editable = project.output().join("pages/users_page_component.rs");
    let mut edited = fs::read_to_string(&editable).unwrap();
    edited.push_str("\n// custom helpers\n");
    fs::write(&editable, &edited).unwrap();

    project.write("src/app/users/users-page.component.html", "<h1 data-e2e=\"title\">Users</h1>\n");
    let report = run_generation(&project.config).unwrap();

    assert_eq!(fs::read_to_string(&editable).unwrap(), edited);
    assert!(report.preserved.contains(&editable));
    assert!(!project.read_output("raw/users_page_component.rs").contains("UserCardComponentRaw"));
}

#[test]
fn user_module_declarations_are_kept_when_pages_are_added() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();

    let pages_mod = project.output().join("pages/mod.rs");
    fs::write(&pages_mod, "pub mod dashboard_component;\npub mod helpers;\n").unwrap();
    run_generation(&project.config).unwrap();

    assert_eq!(
        fs::read_to_string(&pages_mod).unwrap(),
        "pub mod dashboard_component;\npub mod helpers;\npub mod users_page_component;\n"
    );
}

#[test]
fn cyclic_imports_abort_before_any_file_is_written() {
    let project = common::empty_project();
    project.write(
        "src/app/app-routing.module.ts",
        "import { AComponent } from './a/a.component';\nconst routes = [{ path: 'a', component: AComponent }];\n",
    );
    project.write("src/app/a/a.component.html", "<app-b></app-b>\n");
    project.write("src/app/b/b.component.html", "<app-a></app-a>\n");

    let result = run_generation(&project.config);
    assert!(matches!(result, Err(GenerateError::CyclicImport { .. })));
    assert!(!project.output().exists());
}

#[test]
fn broken_page_is_reported_and_others_still_generate() {
    let project = common::sample_project();
    project.write("src/app/dashboard/dashboard.component.html", "<div class=\"x>\n");

    let report = run_generation(&project.config).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].target, "DashboardComponent");
    assert!(project.output().join("raw/users_page_component.rs").exists());
    assert!(!project.output().join("raw/dashboard_component.rs").exists());
}

#[test]
fn pages_importing_a_broken_component_fail_too() {
    let project = common::sample_project();
    project.write("src/app/users/user-card.component.html", "<span class=\"x>\n");

    let report = run_generation(&project.config).unwrap();
    let targets: Vec<&str> = report.failures.iter().map(|f| f.target.as_str()).collect();
    assert_eq!(targets, vec!["UserCardComponent", "UsersPageComponent"]);
    assert!(project.output().join("raw/dashboard_component.rs").exists());
}

#[test]
fn missing_routing_file_is_fatal() {
    let project = common::empty_project();
    assert!(matches!(
        run_generation(&project.config),
        Err(GenerateError::Parse(_))
    ));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn raw_source_declares_every_field() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();
    let raw = project.read_output("raw/users_page_component.rs");

    assert!(raw.starts_with(emit::GENERATED_MARKER));
    assert!(raw.contains("// @generated by e2e-pages from src/app/users/users-page.component.html\n"));
    assert!(raw.contains("pub struct UsersPageComponentRaw {"));
    assert!(raw.contains("pub const PAGE_URL: &'static str = \"users\";"));
    assert!(raw.contains("pub sidebar: UsersPageComponentSidebarNav,"));
    assert!(raw.contains("pub title: Element,"));
    assert!(raw.contains("pub users: UsersPageComponentUsersTable,"));
    assert!(raw.contains("reg.list(\"item_row\", \"data-e2e\", &[\"item_row_\"], None)?"));
    assert!(raw.contains("pub save_button: Element,"));
    assert!(raw.contains("pub user_card: UserCardComponentRaw,"));
    assert!(raw.contains(
        "user_card: reg.component(\"user_card\", LocatorSpec::path(None, vec![PathStep::tag(\"app-user-card\")]), UserCardComponentRaw::declare)?,"
    ));
    assert!(raw.contains("sidebar: reg.nested(\"sidebar\", UsersPageComponentSidebarNav::declare)?,"));
    assert!(raw.contains("use super::user_card_component::UserCardComponentRaw;"));
    assert!(raw.contains("id_: table.column(\"#\"),"));
    assert!(raw.contains("name: table.column(\"Name\"),"));
    assert!(!is_hand_edited(&raw));
}

#[test]
fn component_raw_has_no_page_url() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();
    let raw = project.read_output("raw/user_card_component.rs");
    assert!(raw.contains("pub struct UserCardComponentRaw {"));
    assert!(!raw.contains("PAGE_URL"));
    assert!(!project.output().join("pages/user_card_component.rs").exists());
}

#[test]
fn editable_wrapper_binds_and_derefs_to_raw() {
    let project = common::sample_project();
    run_generation(&project.config).unwrap();
    let page = project.read_output("pages/users_page_component.rs");
    assert!(page.contains("use super::super::raw::users_page_component::UsersPageComponentRaw;"));
    assert!(page.contains("let raw = UsersPageComponentRaw::declare(&mut reg)?;"));
    assert!(page.contains("reg.bind(&ctx)?;"));
    assert!(page.contains("impl Deref for UsersPageComponent {"));
    assert!(page.contains("Self::open_with(driver, app, wait, &[], &[])"));
    assert!(page.contains("ctx.open_with(params, query)?;"));
}

#[test]
fn indexed_tables_become_table_lists() {
    let m = model(vec![node(
        NodeKind::Table {
            columns: vec!["Total".to_string()],
        },
        "order",
        LocatorSpec::indexed("data-e2e-table", &["order_"], None),
    )]);
    let raw = render_raw(&m, "profile.component.html", &EmitOptions::default()).unwrap();

    assert!(raw.contains("pub order: TableList<ProfileComponentOrderTable>,"));
    assert!(raw.contains(
        "order: reg.tables(\"order\", LocatorSpec::indexed(\"data-e2e-table\", &[\"order_\"], None), ProfileComponentOrderTable::from_table)?,"
    ));
    assert!(raw.contains("pub fn from_table(table: Table) -> Self {"));
    assert!(raw.contains("TableList"));
}

#[test]
fn colliding_field_names_fail_with_duplicate_field() {
    let m = model(vec![
        node(NodeKind::Button, "Save button", LocatorSpec::attribute("id", "a")),
        node(NodeKind::Button, "save-button", LocatorSpec::attribute("id", "b")),
    ]);
    match render_raw(&m, "profile.component.html", &EmitOptions::default()) {
        Err(GenerateError::DuplicateField { page, field }) => {
            assert_eq!(page, "ProfileComponent");
            assert_eq!(field, "save_button");
        }
        other => panic!("expected DuplicateField, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn raw_rendering_is_deterministic() {
    let m = model(vec![
        node(NodeKind::Input, "email", LocatorSpec::attribute("formcontrolname", "email")),
        node(NodeKind::Link, "Home link", LocatorSpec::attribute("href", "/")),
    ]);
    let options = EmitOptions::default();
    let a = render_raw(&m, "profile.component.html", &options).unwrap();
    let b = render_raw(&m, "profile.component.html", &options).unwrap();
    assert_eq!(a, b);
    let email = a.find("pub email").unwrap();
    let home = a.find("pub home_link").unwrap();
    assert!(email < home);
}

// ============================================================================
// Writer
// ============================================================================

#[test]
fn hand_edited_raw_file_is_detected() {
    let m = model(vec![node(NodeKind::Button, "ok", LocatorSpec::attribute("id", "ok"))]);
    let raw = render_raw(&m, "profile.component.html", &EmitOptions::default()).unwrap();
    assert!(!is_hand_edited(&raw));
    assert!(is_hand_edited(&raw.replace("pub ok", "pub okay")));
    assert!(is_hand_edited("pub struct Foo;\n"));
}

#[test]
fn write_if_absent_never_overwrites() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested/page.rs");
    assert_eq!(writer::write_if_absent(&path, "first").unwrap(), WriteOutcome::Written);
    assert_eq!(writer::write_if_absent(&path, "second").unwrap(), WriteOutcome::Preserved);
    assert_eq!(fs::read_to_string(&path).unwrap(), "first");
}

#[test]
fn write_generated_skips_identical_content() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("raw.rs");
    assert_eq!(writer::write_generated(&path, "x").unwrap(), WriteOutcome::Written);
    assert_eq!(writer::write_generated(&path, "x").unwrap(), WriteOutcome::Unchanged);
    assert_eq!(writer::write_generated(&path, "y").unwrap(), WriteOutcome::Written);
    assert_eq!(fs::read_to_string(&path).unwrap(), "y");
}
