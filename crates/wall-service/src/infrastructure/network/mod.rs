//! Network infrastructure for the wall service.
//!
//! - **`info_server`** – Answers every TCP connection with the service's
//!   [`wall_core::ServiceInfo`], so a client that only knows a host and port
//!   can learn the rendezvous endpoint and the wall size.

pub mod info_server;
