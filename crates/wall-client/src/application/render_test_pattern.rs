//! A renderer that draws a moving colour ramp across the whole wall.
//!
//! The wall is cut into a grid of square tiles numbered row by row. Rank `r`
//! of `n` client ranks renders every tile whose number is `r` modulo `n`, so
//! together the ranks cover each pixel exactly once per frame. Tiles at the
//! right and bottom edge are sent full size; their pixels past the wall are
//! zero and the displays ignore them.

use tracing::{debug, info};
use wall_core::{Box2i, Eye, PixelTile, Vec2i, WallError};

use super::stream_tiles::Client;

/// How much to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestRender {
    pub frames: u64,
    /// Edge length of the square tiles, in pixels.
    pub tile_size: i32,
}

/// RGBA value of the pattern at wall pixel `(x, y)` in `frame`.
pub fn test_pattern_pixel(frame: u64, x: i32, y: i32) -> u32 {
    let (x, y) = (x.max(0) as u64, y.max(0) as u64);
    let r = (frame + x) % 255;
    let g = (frame + y) % 255;
    let b = (frame + x + y) % 255;
    ((b << 16) | (g << 8) | r) as u32
}

/// Renders and sends this rank's share of one frame, then ends the frame.
///
/// Returns the number of tiles this rank rendered.
///
/// # Errors
///
/// Any error from [`Client::write_tile`] or [`Client::end_frame`].
pub fn render_test_frame(client: &Client, frame: u64, tile_size: i32) -> Result<usize, WallError> {
    let tile_size = tile_size.max(1);
    let total = client.geometry().total_pixels();
    let eyes: &[Eye] = if client.geometry().stereo() {
        &[Eye::Left, Eye::Right]
    } else {
        &[Eye::Left]
    };
    let tiles = Vec2i::new(
        (total.x + tile_size - 1) / tile_size,
        (total.y + tile_size - 1) / tile_size,
    );

    let mut rendered = 0;
    let mut tile_id = 0usize;
    for ty in 0..tiles.y {
        for tx in 0..tiles.x {
            let mine = tile_id % client.size() == client.rank();
            tile_id += 1;
            if !mine {
                continue;
            }
            let lower = Vec2i::new(tx * tile_size, ty * tile_size);
            let region = Box2i::from_origin_size(lower, Vec2i::new(tile_size, tile_size));
            let pixels: Vec<u32> = region
                .cells()
                .map(|p| {
                    if p.x < total.x && p.y < total.y {
                        test_pattern_pixel(frame, p.x, p.y)
                    } else {
                        0
                    }
                })
                .collect();
            for &eye in eyes {
                let tile = PixelTile::borrowed(region, tile_size as usize, eye, &pixels)?;
                client.write_tile(&tile)?;
            }
            rendered += 1;
        }
    }

    client.end_frame()?;
    debug!(rank = client.rank(), frame, tiles = rendered, "frame sent");
    Ok(rendered)
}

/// Renders `plan.frames` frames.
///
/// # Errors
///
/// The first error [`render_test_frame`] returns.
pub fn run_test_render(client: &Client, plan: &TestRender) -> Result<(), WallError> {
    for frame in 0..plan.frames {
        render_test_frame(client, frame, plan.tile_size)?;
    }
    if client.rank() == 0 {
        info!(frames = plan.frames, "test render finished");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
