//! Configuration sources, in the order the loader layers them.

pub mod env;
pub mod explicit_file;
pub mod global_file;
