//! Report generation modules.

pub mod generator;

pub use generator::{render_table, write_report};
