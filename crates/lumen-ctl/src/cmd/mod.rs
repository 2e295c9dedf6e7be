//! CLI command modules.

pub mod inspect;
pub mod receive;
pub mod send;
