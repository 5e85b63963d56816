pub mod emit;
pub mod run;
pub mod writer;
