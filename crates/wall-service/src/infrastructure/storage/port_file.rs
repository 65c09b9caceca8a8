//! Publishes the rendezvous endpoint name through a file.
//!
//! The outward-facing root writes the name it is listening on; clients that
//! share the file system read it back instead of being told the name.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::application::bring_up::EndpointPublisher;

/// The well-known file holding the current endpoint name.
#[derive(Debug, Clone)]
pub struct PortFile {
    path: PathBuf,
}

impl PortFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointPublisher for PortFile {
    fn publish(&self, endpoint: &str) -> std::io::Result<()> {
        std::fs::write(&self.path, endpoint)?;
        info!(path = %self.path.display(), "endpoint name written");
        Ok(())
    }
}
