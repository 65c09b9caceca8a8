/// Rendering a moving colour ramp to exercise the whole pipeline.
pub mod render_test_pattern;

/// Connecting to the service and routing tiles to displays.
pub mod stream_tiles;
