pub mod builder;
pub mod classifier;
pub mod components;
pub mod markup;
pub mod model;
