#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod planner;
pub mod signal;
pub mod state;
pub mod tuning;

pub use cli::{Cli, Commands};
pub use config::KernelPolicy;
pub use state::StateStore;
