pub mod dispatch;
pub mod logging;

pub use dispatch::{DispatchContext, DispatchOptions, Dispatcher};
