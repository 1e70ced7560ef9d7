//! intake-exec: wrapper resolution and bounded handler execution
//!
//! A wrapper is any `Call_<Name>.<ext>` file in the wrapper directory. Its
//! contents are opaque: it is executed with positional arguments and the
//! merged environment, and judged only by what it prints and returns.

pub mod invoker;
pub mod wrapper;

pub use invoker::{spawn_daemon, Daemon, ExecError, HandlerOutput, Invoker, ProcessInvoker};
pub use wrapper::{title_case, Wrapper, WrapperKind, WrapperResolver};
