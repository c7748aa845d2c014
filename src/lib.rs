#[macro_use]
extern crate log;

pub mod command;
pub mod ipc;
pub mod layout;
pub mod service;
pub mod target;
pub mod tiler;
pub mod window;
pub mod xconnection;

#[cfg(test)]
mod mock;

pub use service::{Config, TileService};
pub use tiler::{Outcome, Tiler};
pub use xconnection::{XConn, XcbConnection};
