use std::ops::Deref;
use std::rc::Rc;
use std::time::{Duration, Instant};

use e2e_pages::runtime::{
    AppSettings, BrowserDriver, Column, DescriptorRegistry, DescriptorState, Element, LocatorSpec,
    MemoryDriver, PageContext, RuntimeError, Table, TableList, WaitOptions,
};
use pretty_assertions::assert_eq;

const USERS_HTML: &str = r#"
<app-users-page>
  <h1 data-e2e="title">Users</h1>
  <table data-e2e-table="users">
    <thead><tr><th>#</th><th>Name</th></tr></thead>
    <tbody>
      <tr><td>1</td><td>alice</td></tr>
      <tr><td>2</td><td>bob</td></tr>
    </tbody>
  </table>
  <ul>
    <li data-e2e="item_row_1">one</li>
    <li data-e2e="item_row_2">two</li>
    <li data-e2e="item_row_3">three</li>
  </ul>
  <button id="refresh">Refresh</button>
</app-users-page>
"#;

fn fast_wait() -> WaitOptions {
    WaitOptions::default()
        .with_timeout(Duration::from_millis(150))
        .with_poll_interval(Duration::from_millis(5))
}

fn app() -> AppSettings {
    AppSettings::new("http://localhost:4200/")
}

fn driver(html: &str) -> Rc<MemoryDriver> {
    Rc::new(MemoryDriver::new(html).unwrap())
}

fn context(driver: &Rc<MemoryDriver>, app: AppSettings) -> Rc<PageContext> {
    let session: Rc<dyn BrowserDriver> = driver.clone();
    Rc::new(PageContext::new(session, app, fast_wait()))
}

// ============================================================================
// Page object shaped like generated output
// ============================================================================

struct UsersTable {
    id_: Column,
    name: Column,
    table: Table,
}

impl UsersTable {
    fn declare(reg: &mut DescriptorRegistry, name: &str, locator: LocatorSpec) -> Result<Self, RuntimeError> {
        let table = reg.table(name, locator)?;
        Ok(Self {
            id_: table.column("#"),
            name: table.column("Name"),
            table,
        })
    }
}

impl Deref for UsersTable {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.table
    }
}

struct UsersPage {
    title: Element,
    users: UsersTable,
    item_row: e2e_pages::runtime::ElementList,
    refresh: Element,
}

impl UsersPage {
    fn new(ctx: &Rc<PageContext>) -> Result<Self, RuntimeError> {
        let mut reg = DescriptorRegistry::new("UsersPageComponent");
        let page = Self {
            title: reg.element("title", LocatorSpec::attribute("data-e2e", "title"))?,
            users: UsersTable::declare(&mut reg, "users", LocatorSpec::attribute("data-e2e-table", "users"))?,
            item_row: reg.list("item_row", "data-e2e", &["item_row_"], None)?,
            refresh: reg.element("refresh", LocatorSpec::attribute("id", "refresh"))?,
        };
        reg.bind(ctx)?;
        Ok(page)
    }
}

// ============================================================================
// Tables
// ============================================================================

#[test]
fn column_cell_selects_one_based_row() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    let cell = page.users.id_.cell(1).unwrap();
    assert_eq!(cell.text().unwrap(), "1");
    assert_eq!(cell.field(), "users.#[1]");
    assert_eq!(page.users.name.cell(2).unwrap().text().unwrap(), "bob");
}

#[test]
fn column_values_yield_every_row() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    let names: Vec<String> = page.users.name.values().collect::<Result<_, _>>().unwrap();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[test]
fn column_values_restart_against_the_live_document() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();
    assert_eq!(page.users.name.values().count(), 2);

    d.set_html(&USERS_HTML.replace(
        "<tr><td>2</td><td>bob</td></tr>",
        "<tr><td>2</td><td>bob</td></tr><tr><td>3</td><td>carol</td></tr>",
    ))
    .unwrap();
    let names: Vec<String> = page.users.name.values().collect::<Result<_, _>>().unwrap();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

#[test]
fn table_helpers_read_headers_and_rows() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    assert_eq!(page.users.header_values().unwrap(), vec!["#", "Name"]);
    assert_eq!(page.users.row_count().unwrap(), 2);
    assert_eq!(page.users.name.index().unwrap(), 2);
    assert_eq!(page.users.name.index_of("bob").unwrap(), Some(2));
    assert_eq!(
        page.users.name.row_of("alice").unwrap(),
        Some(vec!["1".to_string(), "alice".to_string()])
    );
    assert_eq!(page.users.name.index_of("zed").unwrap(), None);
    assert_eq!(page.users.declared_columns(), vec!["#", "Name"]);
}

#[test]
fn unknown_column_and_row_are_errors() {
    let d = driver(USERS_HTML);
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let table = reg.table("users", LocatorSpec::attribute("data-e2e-table", "users")).unwrap();
    let email = table.column("Email");
    reg.bind(&ctx).unwrap();

    assert!(matches!(email.cell(1), Err(RuntimeError::ColumnNotFound { .. })));
    assert!(matches!(
        table.row_values(3),
        Err(RuntimeError::IndexOutOfRange { index: 3, len: 2, .. })
    ));
}

#[test]
fn body_row_headers_are_not_columns() {
    let d = driver(
        r#"<table data-e2e-table="scores">
             <tr><th>#</th><th>Name</th></tr>
             <tr><th>1</th><td>alice</td></tr>
             <tr><th>2</th><td>bob</td></tr>
           </table>"#,
    );
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let table = reg.table("scores", LocatorSpec::attribute("data-e2e-table", "scores")).unwrap();
    reg.bind(&ctx).unwrap();

    assert_eq!(table.header_values().unwrap(), vec!["#", "Name"]);
    assert_eq!(table.row_count().unwrap(), 2);
    assert_eq!(table.column("#").cell(2).unwrap().text().unwrap(), "2");
    let names: Vec<String> = table.column("Name").values().collect::<Result<_, _>>().unwrap();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[test]
fn nested_tables_do_not_leak_into_the_outer_one() {
    let d = driver(
        r#"<table data-e2e-table="orders">
             <thead><tr><th>Id</th><th>Items</th></tr></thead>
             <tbody>
               <tr><td>7</td><td><table><tr><th>Sku</th></tr><tr><td>a-1</td></tr></table></td></tr>
             </tbody>
           </table>"#,
    );
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let table = reg.table("orders", LocatorSpec::attribute("data-e2e-table", "orders")).unwrap();
    reg.bind(&ctx).unwrap();

    assert_eq!(table.header_values().unwrap(), vec!["Id", "Items"]);
    assert_eq!(table.row_count().unwrap(), 1);
    assert_eq!(table.column("Id").cell(1).unwrap().text().unwrap(), "7");
}

#[test]
fn columns_can_be_found_by_header_attribute() {
    let d = driver(
        r#"<table data-e2e-table="users">
             <thead><tr><th>#</th><th data-col="login"><span>Login</span> <i>sort</i></th></tr></thead>
             <tbody><tr><td>1</td><td>alice</td></tr></tbody>
           </table>"#,
    );
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let table = reg.table("users", LocatorSpec::attribute("data-e2e-table", "users")).unwrap();
    let login = table.column_by_attribute("login", "data-col", "login");
    let missing = table.column_by_attribute("email", "data-col", "email");
    reg.bind(&ctx).unwrap();

    assert_eq!(login.index().unwrap(), 2);
    assert_eq!(login.cell(1).unwrap().text().unwrap(), "alice");
    assert!(matches!(missing.index(), Err(RuntimeError::ColumnNotFound { .. })));
}

#[test]
fn header_click_sorts_and_search_finds_cells() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    page.users.name.click().unwrap();
    assert_eq!(d.clicks(), vec!["th:Name"]);

    let hits = page.users.name.search("o").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text().unwrap(), "bob");
    assert!(page.users.name.search("zed").unwrap().is_empty());
}

struct OrderTable {
    total: Column,
    table: Table,
}

impl OrderTable {
    fn from_table(table: Table) -> Self {
        Self {
            total: table.column("Total"),
            table,
        }
    }
}

#[test]
fn table_lists_address_tables_by_index() {
    let d = driver(
        r#"<table data-e2e-table="order_1"><thead><tr><th>Total</th></tr></thead><tbody><tr><td>10</td></tr></tbody></table>
           <table data-e2e-table="order_2"><thead><tr><th>Total</th></tr></thead><tbody><tr><td>25</td></tr></tbody></table>"#,
    );
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let orders: TableList<OrderTable> = reg
        .tables("orders", LocatorSpec::indexed("data-e2e-table", &["order_"], None), OrderTable::from_table)
        .unwrap();
    reg.bind(&ctx).unwrap();

    assert_eq!(orders.len().unwrap(), 2);
    let second = orders.get(&[2]).unwrap();
    assert_eq!(second.total.cell(1).unwrap().text().unwrap(), "25");
    assert_eq!(second.table.name(), "orders[2]");
    assert!(matches!(orders.get(&[1, 2]), Err(RuntimeError::InvalidListArgs { .. })));
}

#[test]
fn positional_table_lists_check_the_range() {
    let d = driver(
        r#"<table class="grid"><tr><th>A</th></tr><tr><td>x</td></tr></table>
           <table class="grid"><tr><th>A</th></tr><tr><td>y</td></tr></table>"#,
    );
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let grids = reg.tables("grids", LocatorSpec::css_class("grid"), std::convert::identity).unwrap();
    reg.bind(&ctx).unwrap();

    assert_eq!(grids.get(&[2]).unwrap().row_values(1).unwrap(), vec!["y"]);
    assert!(matches!(
        grids.get(&[3]),
        Err(RuntimeError::IndexOutOfRange { index: 3, len: 2, .. })
    ));
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn indexed_list_addresses_items_by_position_and_name() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    assert_eq!(page.item_row.len().unwrap(), 3);
    assert_eq!(page.item_row.at(1).unwrap().text().unwrap(), "one");
    assert_eq!(page.item_row.get(&[3]).unwrap().text().unwrap(), "three");
    assert_eq!(page.item_row.texts().unwrap(), vec!["one", "two", "three"]);
    assert_eq!(page.item_row.all().unwrap().len(), 3);
}

#[test]
fn list_rejects_out_of_range_and_wrong_arity() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();

    assert!(matches!(
        page.item_row.at(0),
        Err(RuntimeError::IndexOutOfRange { index: 0, len: 3, .. })
    ));
    assert!(matches!(
        page.item_row.at(4),
        Err(RuntimeError::IndexOutOfRange { index: 4, .. })
    ));
    assert!(matches!(
        page.item_row.get(&[1, 2]),
        Err(RuntimeError::InvalidListArgs { expected: 1, got: 2, .. })
    ));
}

// ============================================================================
// Binding and resolution
// ============================================================================

#[test]
fn element_moves_through_unbound_bound_resolved() {
    let d = driver(USERS_HTML);
    let ctx = context(&d, app());
    let title = Element::new("title", LocatorSpec::attribute("data-e2e", "title"));
    assert_eq!(title.state(), DescriptorState::Unbound);
    assert!(matches!(title.text(), Err(RuntimeError::Unbound { .. })));

    title.bind(&ctx).unwrap();
    assert_eq!(title.state(), DescriptorState::Bound);
    assert_eq!(title.text().unwrap(), "Users");
    assert_eq!(title.state(), DescriptorState::Resolved);

    ctx.invalidate();
    assert_eq!(title.state(), DescriptorState::Bound);
}

#[test]
fn stale_handle_is_re_resolved_once() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();
    assert_eq!(page.title.text().unwrap(), "Users");

    d.set_html(&USERS_HTML.replace(">Users</h1>", ">People</h1>")).unwrap();
    assert_eq!(page.title.text().unwrap(), "People");
}

#[test]
fn vanished_element_is_not_found() {
    let d = driver(USERS_HTML);
    let page = UsersPage::new(&context(&d, app())).unwrap();
    assert!(page.title.exists().unwrap());

    d.set_html("<p>empty</p>").unwrap();
    assert!(!page.title.exists().unwrap());
    assert!(matches!(
        page.title.text(),
        Err(RuntimeError::ElementNotFound { .. })
    ));
}

#[test]
fn binding_to_a_second_page_is_rejected() {
    let d = driver(USERS_HTML);
    let first = context(&d, app());
    let second = context(&d, app());
    let title = Element::new("title", LocatorSpec::attribute("data-e2e", "title"));

    title.bind(&first).unwrap();
    title.bind(&first).unwrap();
    assert!(matches!(
        title.bind(&second),
        Err(RuntimeError::AlreadyBound { .. })
    ));
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut reg = DescriptorRegistry::new("UsersPageComponent");
    reg.element("save", LocatorSpec::attribute("id", "save")).unwrap();
    match reg.element("save", LocatorSpec::attribute("id", "other")) {
        Err(RuntimeError::DuplicateField { owner, field }) => {
            assert_eq!(owner, "UsersPageComponent");
            assert_eq!(field, "save");
        }
        other => panic!("expected DuplicateField, got {:?}", other),
    }
}

#[test]
fn nested_groups_scope_field_names() {
    let mut reg = DescriptorRegistry::new("Page");
    reg.element("home", LocatorSpec::attribute("href", "/")).unwrap();
    let nested = reg
        .nested("sidebar", |r| r.element("home", LocatorSpec::attribute("href", "/home")))
        .unwrap();
    assert_eq!(nested.field(), "sidebar.home");
    assert_eq!(reg.field_names(), vec!["home", "sidebar.home"]);
    assert_eq!(reg.len(), 2);
}

#[test]
fn components_only_see_their_own_host() {
    let d = driver(
        r#"<span data-e2e="name">page</span>
           <app-card class="left"><span data-e2e="name">Left</span></app-card>
           <app-card class="right"><span data-e2e="name">Right</span></app-card>"#,
    );
    let ctx = context(&d, app());
    let name = || LocatorSpec::attribute("data-e2e", "name");
    let mut reg = DescriptorRegistry::new("Page");
    let left = reg
        .component("left", LocatorSpec::css_class("left"), |r| r.element("name", name()))
        .unwrap();
    let right = reg
        .component("right", LocatorSpec::css_class("right"), |r| r.element("name", name()))
        .unwrap();
    assert_eq!(reg.field_names(), vec!["left.name", "right.name"]);
    reg.bind(&ctx).unwrap();

    assert_eq!(left.text().unwrap(), "Left");
    assert_eq!(right.text().unwrap(), "Right");
}

#[test]
fn missing_component_host_means_missing_fields() {
    let d = driver(r#"<span data-e2e="name">page</span>"#);
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let inner = reg
        .component("card", LocatorSpec::tags(&["app-card"]), |r| {
            r.element("name", LocatorSpec::attribute("data-e2e", "name"))
        })
        .unwrap();
    reg.bind(&ctx).unwrap();

    assert!(!inner.exists().unwrap());
    assert!(matches!(inner.resolve(), Err(RuntimeError::ElementNotFound { .. })));
}

// ============================================================================
// Waiting
// ============================================================================

#[test]
fn click_and_wait_times_out_when_loader_never_disappears() {
    let d = driver(&USERS_HTML.replace(
        "<button",
        "<div class=\"page-loader\">Loading</div><button",
    ));
    let mut settings = app();
    settings.page_loader_css_class = Some("page-loader".to_string());
    let page = UsersPage::new(&context(&d, settings)).unwrap();

    let started = Instant::now();
    let result = page.refresh.click_and_wait();
    let elapsed = started.elapsed();

    match result {
        Err(RuntimeError::WaitTimeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 150),
        other => panic!("expected WaitTimeout, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(d.clicks(), vec!["button:Refresh"]);
}

#[test]
fn click_and_wait_returns_once_loader_is_gone() {
    let with_loader = USERS_HTML.replace("<button", "<div class=\"page-loader\">Loading</div><button");
    let d = driver(USERS_HTML);
    d.on_click(LocatorSpec::attribute("id", "refresh"), USERS_HTML);
    let mut settings = app();
    settings.page_loader_css_class = Some("page-loader".to_string());
    let page = UsersPage::new(&context(&d, settings)).unwrap();

    d.set_html(&with_loader).unwrap();
    page.refresh.click_and_wait().unwrap();
    assert_eq!(page.title.text().unwrap(), "Users");
}

#[test]
fn waiting_after_click_can_be_disabled() {
    let d = driver(&USERS_HTML.replace("<button", "<div class=\"page-loader\">Loading</div><button"));
    let mut settings = app();
    settings.page_loader_css_class = Some("page-loader".to_string());
    settings.wait_after_click = false;
    let page = UsersPage::new(&context(&d, settings)).unwrap();

    page.refresh.click_and_wait().unwrap();
}

#[test]
fn hidden_loader_does_not_block() {
    let d = driver(&USERS_HTML.replace(
        "<button",
        "<div class=\"page-loader\" style=\"display: none\">Loading</div><button",
    ));
    let mut settings = app();
    settings.page_loader_css_class = Some("page-loader".to_string());
    let ctx = context(&d, settings);
    ctx.wait_ready().unwrap();
}

#[test]
fn wait_hidden_and_visible() {
    let d = driver("<div id=\"toast\" hidden>Saved</div><p id=\"note\">hi</p>");
    let ctx = context(&d, app());
    let mut reg = DescriptorRegistry::new("Page");
    let toast = reg.element("toast", LocatorSpec::attribute("id", "toast")).unwrap();
    let note = reg.element("note", LocatorSpec::attribute("id", "note")).unwrap();
    reg.bind(&ctx).unwrap();

    toast.wait_hidden().unwrap();
    note.wait_visible().unwrap();
    assert!(matches!(toast.wait_visible(), Err(RuntimeError::WaitTimeout { .. })));
}

#[test]
fn dialog_wait_looks_for_a_visible_dialog_role() {
    let d = driver(r#"<div role="dialog" hidden>Confirm</div>"#);
    assert!(matches!(
        context(&d, app()).wait_dialog_visible(),
        Err(RuntimeError::WaitTimeout { .. })
    ));

    d.set_html(r#"<div role="dialog">Confirm</div>"#).unwrap();
    context(&d, app()).wait_dialog_visible().unwrap();
}

#[test]
fn modal_wait_needs_every_configured_class() {
    let d = driver("<div class=\"modal show\">Confirm</div>");
    let mut settings = app();
    settings.modal_visible_css_class = vec!["modal".to_string(), "show".to_string()];
    context(&d, settings.clone()).wait_modal_visible().unwrap();

    d.set_html("<div class=\"modal\">Confirm</div>").unwrap();
    assert!(matches!(
        context(&d, settings).wait_modal_visible(),
        Err(RuntimeError::WaitTimeout { .. })
    ));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn open_navigates_and_checks_the_route() {
    let d = driver("<p>blank</p>");
    d.add_page("http://localhost:4200/users", USERS_HTML);
    let session: Rc<dyn BrowserDriver> = d.clone();
    let ctx = Rc::new(PageContext::new(session, app(), fast_wait()).with_page_url("users"));

    ctx.open().unwrap();
    assert!(ctx.is_opened().unwrap());
    ctx.check_opened().unwrap();

    let page = UsersPage::new(&ctx).unwrap();
    assert_eq!(page.title.text().unwrap(), "Users");

    d.set_url("http://localhost:4200/settings");
    assert!(matches!(
        ctx.check_opened(),
        Err(RuntimeError::PageNotOpened { .. })
    ));
}

#[test]
fn page_ready_signal_is_awaited() {
    let d = driver(USERS_HTML);
    d.set_page_ready(false);
    let mut settings = app();
    settings.has_page_ready_script = true;
    let ctx = context(&d, settings);
    assert!(matches!(ctx.wait_ready(), Err(RuntimeError::WaitTimeout { .. })));

    d.set_page_ready(true);
    ctx.wait_ready().unwrap();
}

#[test]
fn open_with_fills_route_parameters_and_query() {
    let d = driver("<p>blank</p>");
    d.add_page("http://localhost:4200/users/7/edit?tab=roles&q=a%20b", USERS_HTML);
    let session: Rc<dyn BrowserDriver> = d.clone();
    let ctx = Rc::new(PageContext::new(session, app(), fast_wait()).with_page_url("users/:id/edit"));

    ctx.open_with(&[("id", "7")], &[("tab", "roles"), ("q", "a b")]).unwrap();
    assert!(ctx.is_opened().unwrap());
    assert_eq!(ctx.url_param("id").unwrap().as_deref(), Some("7"));
    assert_eq!(ctx.url_param("edit").unwrap(), None);
    assert_eq!(ctx.query_param("tab").unwrap().as_deref(), Some("roles"));
    assert_eq!(ctx.query_param("q").unwrap().as_deref(), Some("a b"));
    assert_eq!(ctx.query_param("page").unwrap(), None);
    assert_eq!(
        UsersPage::new(&ctx).unwrap().title.text().unwrap(),
        "Users"
    );
}

#[test]
fn route_parameters_must_match_the_route() {
    let d = driver("<p>blank</p>");
    let session: Rc<dyn BrowserDriver> = d.clone();
    let ctx = Rc::new(PageContext::new(session, app(), fast_wait()).with_page_url("users/:id"));

    assert!(matches!(
        ctx.open(),
        Err(RuntimeError::MissingUrlParam { ref param, .. }) if param == "id"
    ));
    assert!(matches!(
        ctx.url_with(&[("id", "1"), ("tab", "x")], &[]),
        Err(RuntimeError::UnknownUrlParam { ref param, .. }) if param == "tab"
    ));
    assert_eq!(
        ctx.url_with(&[("id", "a/b")], &[]).unwrap(),
        "http://localhost:4200/users/a%2Fb"
    );

    d.set_url("http://localhost:4200/settings");
    assert!(matches!(ctx.url_param("id"), Err(RuntimeError::PageNotOpened { .. })));
}

#[test]
fn elements_can_be_looked_up_by_e2e_value() {
    let d = driver(USERS_HTML);
    let ctx = context(&d, app());

    let title = ctx.find_by_e2e("title").unwrap();
    assert_eq!(title.text().unwrap(), "Users");
    assert_eq!(title.field(), "data-e2e=title");
    assert!(matches!(
        ctx.find_by_e2e("missing"),
        Err(RuntimeError::ElementNotFound { .. })
    ));
}
