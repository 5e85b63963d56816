pub mod dashboard_component;
pub mod users_page_component;
