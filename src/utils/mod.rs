//! Shared helpers: command descriptions, template variables, paths.

pub mod exec;
pub mod path;
pub mod vars;
