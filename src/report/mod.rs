//! Text and JSON renderings of the collection and of single analyses.

pub mod generator;

pub use generator::*;
