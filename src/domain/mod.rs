//! Domain types for the host agent
//!
//! Sessions, chat histories, attachments, agent descriptors and dispatch
//! results. Nothing here performs I/O.

mod agent;
mod attachment;
mod dispatch;
mod message;

pub use agent::*;
pub use attachment::*;
pub use dispatch::*;
pub use message::*;
