// netdispatch: concurrent operations against many network devices
// Exposes the dispatcher, operations and Junos session provider as a library

pub mod cli;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod hosts;
pub mod junos;
pub mod operation;
pub mod resolver;
pub mod router;
pub mod session;
pub mod validation;
pub mod xpath;
