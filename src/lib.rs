#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![allow(clippy::too_many_lines)]
// Needed for certain macros
#![recursion_limit = "256"]

pub mod cli;
mod core;
pub mod http;
pub mod identity;
pub mod log;
pub mod metrics;
pub mod policy;
pub mod routing;
pub mod settings;
pub mod tasks;

pub use core::main;
pub use routing::setup_router;
