//! The polling dispatcher: scan the watch directory, route each new file
//! through the council, run the chosen wrappers, record the file.

pub mod context;
pub mod poll;
pub mod scan;
pub mod startup;
pub mod types;

pub use context::DispatchContext;
pub use poll::{dispatch_file, Dispatcher};
pub use startup::{ensure_infrastructure, report_issues, start_observer, validate, SetupIssue};
pub use types::*;
