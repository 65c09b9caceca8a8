//! Storage infrastructure.
//!
//! - **`config`** – Reads and writes the service's TOML configuration.
//! - **`port_file`** – Publishes the rendezvous endpoint name in a file that
//!   clients started on the same file system can read.

pub mod config;
pub mod port_file;
