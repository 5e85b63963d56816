pub mod pages;
pub mod raw;
