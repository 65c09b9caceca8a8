/// TCP query of a running service's info responder.
pub mod network;

/// Reading the endpoint name the service publishes on disk.
pub mod storage;
