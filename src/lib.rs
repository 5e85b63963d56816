//! Page-object generation for end-to-end tests of component-based web
//! applications.
//!
//! The generator side reads a routing declaration and component templates,
//! classifies their markup into a `PageModel` tree and emits deterministic
//! raw page-object sources plus editable wrappers. The runtime side is what
//! those sources link against: lazily bound element, list and table
//! descriptors over a narrow `BrowserDriver` contract.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod naming;
pub mod report;
pub mod routes;
pub mod runtime;
pub mod template;
