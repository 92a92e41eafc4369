#![doc = include_str!("../README.md")]

mod error;
mod machine;
mod menu;
mod pool;
mod stage;

pub use crate::error::*;
pub use crate::machine::*;
pub use crate::menu::*;
pub use crate::pool::*;
pub use crate::stage::*;
// Re-exported so callers can build cancellation tokens without depending on
// `tokio-util` themselves.
pub use tokio_util::sync::CancellationToken;
