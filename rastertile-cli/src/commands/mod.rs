//! CLI subcommands.

pub mod algebra;
pub mod common;
pub mod info;
pub mod tiles;
pub mod value_count;
