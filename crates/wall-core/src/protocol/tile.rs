//! Pixel tiles: the unit of transfer between renderers and displays.

use std::borrow::Cow;

use crate::domain::geometry::{Box2i, Vec2i};
use crate::protocol::codec::CodecError;

/// Which eye's image a tile belongs to. Mono walls only use [`Eye::Left`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Eye {
    #[default]
    Left = 0,
    Right = 1,
}

impl Eye {
    /// Index into per-eye buffer arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Eye {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Eye::Left),
            1 => Ok(Eye::Right),
            other => Err(CodecError::ProtocolMismatch(format!(
                "eye index {other} is neither left (0) nor right (1)"
            ))),
        }
    }
}

/// A rectangle of 32-bit RGBA pixels positioned in wall pixel space.
///
/// Rows are `pitch` pixels apart in `pixels`, which may be wider than the
/// region. The buffer is either borrowed from the caller (send side) or owned
/// (after decoding).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTile<'a> {
    pub region: Box2i,
    pub pitch: usize,
    pub eye: Eye,
    pub pixels: Cow<'a, [u32]>,
}

impl<'a> PixelTile<'a> {
    /// Wraps a caller-owned buffer without copying it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptTile`] if the region is inverted, the
    /// pitch is narrower than the region, or the buffer is too short to hold
    /// every row.
    pub fn borrowed(
        region: Box2i,
        pitch: usize,
        eye: Eye,
        pixels: &'a [u32],
    ) -> Result<Self, CodecError> {
        let tile = Self {
            region,
            pitch,
            eye,
            pixels: Cow::Borrowed(pixels),
        };
        tile.validate()?;
        Ok(tile)
    }

    /// Creates a tile that owns a tightly packed buffer (`pitch == width`).
    ///
    /// # Errors
    ///
    /// Same conditions as [`PixelTile::borrowed`].
    pub fn packed(region: Box2i, eye: Eye, pixels: Vec<u32>) -> Result<PixelTile<'static>, CodecError> {
        let tile = PixelTile {
            region,
            pitch: region.width().max(0) as usize,
            eye,
            pixels: Cow::Owned(pixels),
        };
        tile.validate()?;
        Ok(tile)
    }

    pub fn width(&self) -> usize {
        self.region.width().max(0) as usize
    }

    pub fn height(&self) -> usize {
        self.region.height().max(0) as usize
    }

    /// The `width()` visible pixels of row `y` (tile-local).
    pub fn row(&self, y: usize) -> &[u32] {
        let start = y * self.pitch;
        &self.pixels[start..start + self.width()]
    }

    /// Pixel at tile-local `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.pitch + x]
    }

    /// Copies the pixel data so the tile outlives the borrowed buffer.
    pub fn into_owned(self) -> PixelTile<'static> {
        PixelTile {
            region: self.region,
            pitch: self.pitch,
            eye: self.eye,
            pixels: Cow::Owned(self.pixels.into_owned()),
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        let size = self.region.size();
        if size.x < 0 || size.y < 0 {
            return Err(CodecError::CorruptTile(format!(
                "inverted tile region {}",
                self.region
            )));
        }
        if self.pitch < self.width() {
            return Err(CodecError::CorruptTile(format!(
                "pitch {} is narrower than tile width {}",
                self.pitch,
                self.width()
            )));
        }
        let needed = required_len(self.width(), self.height(), self.pitch);
        if self.pixels.len() < needed {
            return Err(CodecError::CorruptTile(format!(
                "pixel buffer holds {} pixels, region {} with pitch {} needs {needed}",
                self.pixels.len(),
                self.region,
                self.pitch
            )));
        }
        Ok(())
    }
}

/// Minimum buffer length for `height` rows of `width` pixels, `pitch` apart.
fn required_len(width: usize, height: usize, pitch: usize) -> usize {
    if width == 0 || height == 0 {
        0
    } else {
        pitch * (height - 1) + width
    }
}

// ── Stereo split ──────────────────────────────────────────────────────────────

/// Splits a tile rendered into a side-by-side stereo image.
///
/// The renderer draws both eyes into one image of width
/// `2 * true_screen_width`: the left eye in `[0, true_screen_width)` and the
/// right eye beyond. A tile fully on the left keeps its region and becomes
/// [`Eye::Left`]; a tile fully on the right is shifted left by
/// `true_screen_width` and becomes [`Eye::Right`]. A tile straddling the
/// boundary yields two tiles, each clipped to its half; the right one reads
/// its pixels from the same buffer starting `overlap` columns in.
///
/// No pixels are copied: the returned tiles borrow `tile`'s buffer.
pub fn split_side_by_side<'a>(tile: &'a PixelTile<'_>, true_screen_width: i32) -> Vec<PixelTile<'a>> {
    let region = tile.region;
    let borrowed = |region: Box2i, eye: Eye, offset: usize| PixelTile {
        region,
        pitch: tile.pitch,
        eye,
        pixels: Cow::Borrowed(tile.pixels.get(offset..).unwrap_or_default()),
    };
    let shift = Vec2i::new(true_screen_width, 0);

    if region.upper.x <= true_screen_width {
        return vec![borrowed(region, Eye::Left, 0)];
    }
    if region.lower.x >= true_screen_width {
        let right = Box2i::new(region.lower - shift, region.upper - shift);
        return vec![borrowed(right, Eye::Right, 0)];
    }

    let overlap = (true_screen_width - region.lower.x) as usize;
    let left = Box2i::new(region.lower, Vec2i::new(true_screen_width, region.upper.y));
    let right = Box2i::new(
        Vec2i::new(0, region.lower.y),
        Vec2i::new(region.upper.x - true_screen_width, region.upper.y),
    );
    vec![
        borrowed(left, Eye::Left, 0),
        borrowed(right, Eye::Right, overlap),
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x0: i32, y0: i32, x1: i32, y1: i32) -> Box2i {
        Box2i::new(Vec2i::new(x0, y0), Vec2i::new(x1, y1))
    }

    /// Pixel value encodes its tile-local column so shifts are visible.
    fn column_pattern(width: usize, height: usize) -> Vec<u32> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (y as u32) << 16 | x as u32))
            .collect()
    }

    #[test]
    fn test_borrowed_rejects_short_buffer() {
        let pixels = vec![0u32; 10];
        let result = PixelTile::borrowed(region(0, 0, 4, 4), 4, Eye::Left, &pixels);
        assert!(matches!(result, Err(CodecError::CorruptTile(_))));
    }

    #[test]
    fn test_borrowed_rejects_pitch_narrower_than_width() {
        let pixels = vec![0u32; 64];
        let result = PixelTile::borrowed(region(0, 0, 8, 2), 4, Eye::Left, &pixels);
        assert!(matches!(result, Err(CodecError::CorruptTile(_))));
    }

    #[test]
    fn test_borrowed_accepts_last_row_without_padding() {
        // pitch 6, width 4, height 3 → 6*2 + 4 = 16 pixels suffice
        let pixels = vec![0u32; 16];
        assert!(PixelTile::borrowed(region(0, 0, 4, 3), 6, Eye::Left, &pixels).is_ok());
    }

    #[test]
    fn test_row_skips_pitch_padding() {
        let pixels: Vec<u32> = (0..12).collect();
        let tile = PixelTile::borrowed(region(10, 10, 13, 12), 6, Eye::Left, &pixels)
            .expect("valid tile");
        assert_eq!(tile.row(0), &[0, 1, 2]);
        assert_eq!(tile.row(1), &[6, 7, 8]);
        assert_eq!(tile.pixel(2, 1), 8);
    }

    #[test]
    fn test_eye_from_invalid_byte_is_protocol_mismatch() {
        assert!(matches!(Eye::try_from(2), Err(CodecError::ProtocolMismatch(_))));
        assert_eq!(Eye::try_from(1).ok(), Some(Eye::Right));
    }

    // ── Stereo split ──────────────────────────────────────────────────────────

    #[test]
    fn test_split_tile_fully_left_is_unchanged() {
        let pixels = column_pattern(32, 32);
        let tile = PixelTile::borrowed(region(100, 0, 132, 32), 32, Eye::Left, &pixels)
            .expect("valid tile");

        let parts = split_side_by_side(&tile, 1000);

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], tile);
    }

    #[test]
    fn test_split_tile_fully_right_is_shifted_and_tagged() {
        let pixels = column_pattern(32, 32);
        let tile = PixelTile::borrowed(region(1200, 64, 1232, 96), 32, Eye::Left, &pixels)
            .expect("valid tile");

        let parts = split_side_by_side(&tile, 1000);

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].region, region(200, 64, 232, 96));
        assert_eq!(parts[0].eye, Eye::Right);
        assert_eq!(parts[0].row(0), tile.row(0));
    }

    #[test]
    fn test_split_tile_touching_boundary_from_left_stays_left() {
        let pixels = column_pattern(50, 8);
        let tile = PixelTile::borrowed(region(950, 0, 1000, 8), 50, Eye::Left, &pixels)
            .expect("valid tile");
        let parts = split_side_by_side(&tile, 1000);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].eye, Eye::Left);
    }

    #[test]
    fn test_split_straddling_tile_into_two_halves() {
        // Arrange
        let pixels = column_pattern(100, 32);
        let tile = PixelTile::borrowed(region(950, 0, 1050, 32), 100, Eye::Left, &pixels)
            .expect("valid tile");

        // Act
        let parts = split_side_by_side(&tile, 1000);

        // Assert
        assert_eq!(parts.len(), 2);
        let (left, right) = (&parts[0], &parts[1]);
        assert_eq!(left.region, region(950, 0, 1000, 32));
        assert_eq!(left.eye, Eye::Left);
        assert_eq!(right.region, region(0, 0, 50, 32));
        assert_eq!(right.eye, Eye::Right);
        assert_eq!(right.pitch, 100);
        for y in 0..32 {
            assert_eq!(left.pixel(0, y), (y as u32) << 16);
            assert_eq!(left.pixel(49, y), (y as u32) << 16 | 49);
            // right half reads 50 columns further into the source
            assert_eq!(right.pixel(0, y), (y as u32) << 16 | 50);
            assert_eq!(right.pixel(49, y), (y as u32) << 16 | 99);
        }
    }

    #[test]
    fn test_into_owned_keeps_content() {
        let pixels = column_pattern(4, 4);
        let tile = PixelTile::borrowed(region(0, 0, 4, 4), 4, Eye::Right, &pixels)
            .expect("valid tile");
        let owned = tile.clone().into_owned();
        assert_eq!(owned, tile);
    }
}
