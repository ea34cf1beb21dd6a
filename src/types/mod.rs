//! Domain types produced by the streaming core.

mod common;
mod response;
mod tools;
mod usage;

pub use common::*;
pub use response::*;
pub use tools::*;
pub use usage::*;
