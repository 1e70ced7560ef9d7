//! intake-core: registry, signals, council routing and argument synthesis
//!
//! Everything here is pure or bounded-IO. Process execution lives in
//! intake-exec; the poll loop lives in the intake binary crate.

pub mod args;
pub mod config;
pub mod council;
pub mod error;
pub mod registry;
pub mod secrets;
pub mod signal;
pub mod types;

pub use args::{create_default_table, ArgContext, ArgTable};
pub use config::IntakeConfig;
pub use council::{Council, Verdict};
pub use error::{Error, Result};
pub use registry::Registry;
pub use secrets::SecretsMap;
pub use signal::SignalBuilder;
pub use types::{FileEvent, HandlerNode, NodeOrigin};
