//! Infrastructure layer for the wall service.
//!
//! Contains the adapters that touch the outside world: the TOML
//! configuration, the port-name file and the service info TCP responder.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `wall_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
