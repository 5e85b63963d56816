// @generated by e2e-pages from the project route table
// Regenerated on every run; put additions in the editable page module.
// checksum: a4b41ff49c1d31818cb809c35835b199a2489e2a

pub mod dashboard_component;
pub mod user_card_component;
pub mod users_page_component;
