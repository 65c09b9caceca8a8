//! Domain entities for the display wall.
//!
//! Pure arithmetic over the wall's pixel space: how displays are laid out,
//! which rank drives which display, and which displays a rectangle touches.
//! Nothing here does I/O, so all of it can be tested in isolation.

/// Wall geometry, the core domain concept.
///
/// See [`geometry::WallGeometry`] for the main type.
pub mod geometry;
