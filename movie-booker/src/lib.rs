//! Line-protocol TCP service for browsing a movie catalog and booking seats.
//!
//! - [`inventory`] holds the catalog and per-showing seat maps behind the
//!   [`inventory::MovieBooker`] trait.
//! - [`session`] tracks one connection's selected movie and theater.
//! - [`protocol`] parses command lines and defines the response texts.
//! - [`connection`] answers commands for a single client.
//! - [`server`] accepts connections and can be stopped and restarted.
//! - [`catalog`] loads the initial catalog from JSON.
//! - [`client`] is a small interactive terminal client.
//! - [`cli`] parses the command-line interface for server and client modes.

pub mod catalog;
pub mod cli;
pub mod client;
pub mod connection;
pub mod inventory;
pub mod protocol;
pub mod server;
pub mod session;
