//! Reads the endpoint name the service's root writes to disk.

use std::fs;
use std::io;
use std::path::Path;

/// Returns the first line of the port file, without surrounding whitespace.
///
/// # Errors
///
/// The I/O error if the file cannot be read, or [`io::ErrorKind::InvalidData`]
/// if it holds no name.
pub fn read_port_name(path: &Path) -> io::Result<String> {
    let contents = fs::read_to_string(path)?;
    let name = contents.lines().next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no endpoint name in {}", path.display()),
        ));
    }
    Ok(name.to_string())
}
