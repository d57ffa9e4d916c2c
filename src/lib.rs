//! RFC 1413 identd service for IRC clients.
//!
//! The server only needs to listen while the client has outbound connection
//! attempts in flight. [`gate::ConnectionGate`] counts those attempts and
//! drives [`server::IdentServer`]; [`plugin::IdentdPlugin`] wires both to the
//! host application's connection events.

pub mod cli;
pub mod config;
pub mod connections;
pub mod context;
pub mod daemon;
pub mod gate;
pub mod ident;
pub mod logging;
pub mod plugin;
pub mod server;
pub mod system;
pub mod utils;
