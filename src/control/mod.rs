pub mod client;
pub mod protocol;
pub mod server;

pub use client::send_command;
pub use protocol::{Command, Response};
pub use server::ControlServer;

/// Namespaced socket name shared by the daemon and the control client.
pub const SOCKET_NAME: &str = "holdtotalk.sock";
