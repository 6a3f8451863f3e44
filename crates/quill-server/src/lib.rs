pub mod connection;
pub mod protocol;
pub mod rest;
pub mod server;

pub use connection::{ConnectError, ConnectionManager};
pub use server::{start, ServerConfig, ServerHandle};
