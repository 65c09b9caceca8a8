//! Display wall geometry.
//!
//! A wall is a grid of `num_displays.x × num_displays.y` identical displays.
//! Every display shows `pixels_per_display` pixels; between neighbouring
//! displays sits a physical bezel that is counted in the wall's pixel extent
//! but never rendered, so images keep their aspect ratio across the gaps.
//!
//! ```text
//!   wall pixel space (2×2 displays, bezel b)
//!
//!   (0,0)
//!     ┌────────┐ b ┌────────┐
//!     │ (0,0)  │   │ (1,0)  │
//!     └────────┘   └────────┘
//!          b
//!     ┌────────┐   ┌────────┐
//!     │ (0,1)  │   │ (1,1)  │
//!     └────────┘   └────────┘
//! ```
//!
//! The mapping between a process rank and the display it drives is set by the
//! [`Arrangement`]: which axis is enumerated first and in which direction.

use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing a [`WallGeometry`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// The arrangement code is not one of the eight enumerated layouts.
    #[error("invalid display arrangement code: {0}")]
    InvalidArrangement(i32),

    /// The arrangement name is not one of `xy xY Xy XY yx yX Yx YX`.
    #[error("unknown display arrangement name: {0:?}")]
    UnknownArrangementName(String),

    /// The display grid must contain at least one display on each axis.
    #[error("invalid display count {0}: both axes must be at least 1")]
    InvalidDisplayCount(Vec2i),

    /// Each display must show at least one pixel on each axis.
    #[error("invalid pixels per display {0}: both axes must be at least 1")]
    InvalidPixelsPerDisplay(Vec2i),

    /// Relative bezel widths must lie in `[0, 1)`.
    #[error("invalid relative bezel width ({x}, {y}): components must lie in [0, 1)")]
    InvalidBezel { x: f32, y: f32 },
}

// ── Vector and box types ──────────────────────────────────────────────────────

/// A 2-D integer vector (pixel or display coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    pub const ZERO: Vec2i = Vec2i { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns `x * y` widened so large walls cannot overflow.
    pub fn product(self) -> usize {
        (self.x.max(0) as usize) * (self.y.max(0) as usize)
    }
}

impl Add for Vec2i {
    type Output = Vec2i;
    fn add(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2i {
    type Output = Vec2i;
    fn sub(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Component-wise product.
impl Mul for Vec2i {
    type Output = Vec2i;
    fn mul(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl fmt::Display for Vec2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// A 2-D float vector, used for relative bezel widths.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2f {
    pub x: f32,
    pub y: f32,
}

impl Vec2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A half-open integer rectangle `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Box2i {
    pub lower: Vec2i,
    pub upper: Vec2i,
}

impl Box2i {
    pub const fn new(lower: Vec2i, upper: Vec2i) -> Self {
        Self { lower, upper }
    }

    /// Builds a box from an origin and a size.
    pub fn from_origin_size(origin: Vec2i, size: Vec2i) -> Self {
        Self::new(origin, origin + size)
    }

    pub fn size(&self) -> Vec2i {
        self.upper - self.lower
    }

    pub fn width(&self) -> i32 {
        self.upper.x - self.lower.x
    }

    pub fn height(&self) -> i32 {
        self.upper.y - self.lower.y
    }

    /// Returns `true` if the box covers no cell.
    pub fn is_empty(&self) -> bool {
        self.upper.x <= self.lower.x || self.upper.y <= self.lower.y
    }

    /// Number of cells covered; zero for empty boxes.
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.size().product()
        }
    }

    /// Returns the overlap of `self` and `other`, which may be empty.
    pub fn intersection(&self, other: &Box2i) -> Box2i {
        Box2i::new(
            Vec2i::new(self.lower.x.max(other.lower.x), self.lower.y.max(other.lower.y)),
            Vec2i::new(self.upper.x.min(other.upper.x), self.upper.y.min(other.upper.y)),
        )
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    pub fn contains_box(&self, other: &Box2i) -> bool {
        other.lower.x >= self.lower.x
            && other.lower.y >= self.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    /// Iterates every cell of the box in row-major order (x fastest).
    pub fn cells(&self) -> impl Iterator<Item = Vec2i> {
        let Box2i { lower, upper } = *self;
        let xs = lower.x..upper.x.max(lower.x);
        (lower.y..upper.y.max(lower.y))
            .flat_map(move |y| xs.clone().map(move |x| Vec2i::new(x, y)))
    }
}

impl fmt::Display for Box2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({},{})-({},{}))",
            self.lower.x, self.lower.y, self.upper.x, self.upper.y
        )
    }
}

// ── Arrangement ───────────────────────────────────────────────────────────────

/// One of the two wall axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Direction in which rank order walks along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Rank order follows increasing coordinates.
    Increasing,
    /// Rank order starts at the far end of the axis.
    Decreasing,
}

impl AxisOrder {
    /// Maps an enumeration index along an axis of length `n` to a coordinate.
    /// The mapping is its own inverse.
    fn orient(self, index: i32, n: i32) -> i32 {
        match self {
            AxisOrder::Increasing => index,
            AxisOrder::Decreasing => n - 1 - index,
        }
    }
}

/// How linear ranks map onto the 2-D display grid.
///
/// The name is two letters. The first letter is the axis enumerated first
/// (the minor axis, consecutive ranks are neighbours along it); the second is
/// the major axis. Lowercase walks the axis by increasing coordinate,
/// uppercase by decreasing coordinate. With `xy` on a 5×3 wall rank 0 is
/// display (0,0), rank 1 is (1,0) and rank 5 is (0,1).
///
/// Discriminants are the on-wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Arrangement {
    /// `xy`
    #[default]
    XIncYInc = 0,
    /// `xY`
    XIncYDec = 1,
    /// `Xy`
    XDecYInc = 2,
    /// `XY`
    XDecYDec = 3,
    /// `yx`
    YIncXInc = 4,
    /// `yX`
    YIncXDec = 5,
    /// `Yx`
    YDecXInc = 6,
    /// `YX`
    YDecXDec = 7,
}

impl Arrangement {
    pub const ALL: [Arrangement; 8] = [
        Arrangement::XIncYInc,
        Arrangement::XIncYDec,
        Arrangement::XDecYInc,
        Arrangement::XDecYDec,
        Arrangement::YIncXInc,
        Arrangement::YIncXDec,
        Arrangement::YDecXInc,
        Arrangement::YDecXDec,
    ];

    /// The axis along which consecutive ranks are neighbours.
    pub fn minor_axis(self) -> Axis {
        match self {
            Arrangement::XIncYInc
            | Arrangement::XIncYDec
            | Arrangement::XDecYInc
            | Arrangement::XDecYDec => Axis::X,
            Arrangement::YIncXInc
            | Arrangement::YIncXDec
            | Arrangement::YDecXInc
            | Arrangement::YDecXDec => Axis::Y,
        }
    }

    /// Rank order along the x axis.
    pub fn x_order(self) -> AxisOrder {
        match self {
            Arrangement::XIncYInc
            | Arrangement::XIncYDec
            | Arrangement::YIncXInc
            | Arrangement::YDecXInc => AxisOrder::Increasing,
            Arrangement::XDecYInc
            | Arrangement::XDecYDec
            | Arrangement::YIncXDec
            | Arrangement::YDecXDec => AxisOrder::Decreasing,
        }
    }

    /// Rank order along the y axis.
    pub fn y_order(self) -> AxisOrder {
        match self {
            Arrangement::XIncYInc
            | Arrangement::XDecYInc
            | Arrangement::YIncXInc
            | Arrangement::YIncXDec => AxisOrder::Increasing,
            Arrangement::XIncYDec
            | Arrangement::XDecYDec
            | Arrangement::YDecXInc
            | Arrangement::YDecXDec => AxisOrder::Decreasing,
        }
    }

    /// Wire code of this arrangement.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Two-letter configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Arrangement::XIncYInc => "xy",
            Arrangement::XIncYDec => "xY",
            Arrangement::XDecYInc => "Xy",
            Arrangement::XDecYDec => "XY",
            Arrangement::YIncXInc => "yx",
            Arrangement::YIncXDec => "yX",
            Arrangement::YDecXInc => "Yx",
            Arrangement::YDecXDec => "YX",
        }
    }
}

impl TryFrom<i32> for Arrangement {
    type Error = GeometryError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Arrangement::ALL.get(i).copied())
            .ok_or(GeometryError::InvalidArrangement(code))
    }
}

impl FromStr for Arrangement {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arrangement::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| GeometryError::UnknownArrangementName(s.to_string()))
    }
}

impl fmt::Display for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Arrangement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Arrangement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

// ── WallGeometry ──────────────────────────────────────────────────────────────

/// Immutable description of a display wall.
///
/// All derived quantities are computed on demand; nothing besides the five
/// construction parameters is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallGeometry {
    num_displays: Vec2i,
    pixels_per_display: Vec2i,
    relative_bezel: Vec2f,
    arrangement: Arrangement,
    stereo: bool,
}

impl WallGeometry {
    /// Creates a validated geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] when the display grid or the per-display
    /// resolution is degenerate, or a bezel width lies outside `[0, 1)`.
    pub fn new(
        num_displays: Vec2i,
        pixels_per_display: Vec2i,
        relative_bezel: Vec2f,
        arrangement: Arrangement,
        stereo: bool,
    ) -> Result<Self, GeometryError> {
        if num_displays.x < 1 || num_displays.y < 1 {
            return Err(GeometryError::InvalidDisplayCount(num_displays));
        }
        if pixels_per_display.x < 1 || pixels_per_display.y < 1 {
            return Err(GeometryError::InvalidPixelsPerDisplay(pixels_per_display));
        }
        let bezel_ok = |b: f32| (0.0..1.0).contains(&b);
        if !bezel_ok(relative_bezel.x) || !bezel_ok(relative_bezel.y) {
            return Err(GeometryError::InvalidBezel {
                x: relative_bezel.x,
                y: relative_bezel.y,
            });
        }
        Ok(Self {
            num_displays,
            pixels_per_display,
            relative_bezel,
            arrangement,
            stereo,
        })
    }

    /// Creates a geometry from a raw arrangement code, as received on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidArrangement`] for codes outside `0..8`,
    /// plus every error [`WallGeometry::new`] can return.
    pub fn from_raw(
        num_displays: Vec2i,
        pixels_per_display: Vec2i,
        relative_bezel: Vec2f,
        arrangement_code: i32,
        stereo: bool,
    ) -> Result<Self, GeometryError> {
        let arrangement = Arrangement::try_from(arrangement_code)?;
        Self::new(
            num_displays,
            pixels_per_display,
            relative_bezel,
            arrangement,
            stereo,
        )
    }

    /// The geometry a lone outward-facing rank announces to clients: one
    /// display covering the whole wall, no bezel. Internal tiling stays hidden.
    pub fn faked_single_display(&self) -> WallGeometry {
        WallGeometry {
            num_displays: Vec2i::new(1, 1),
            pixels_per_display: self.total_pixels(),
            relative_bezel: Vec2f::default(),
            arrangement: Arrangement::XIncYInc,
            stereo: self.stereo,
        }
    }

    pub fn num_displays(&self) -> Vec2i {
        self.num_displays
    }

    pub fn pixels_per_display(&self) -> Vec2i {
        self.pixels_per_display
    }

    pub fn relative_bezel(&self) -> Vec2f {
        self.relative_bezel
    }

    pub fn arrangement(&self) -> Arrangement {
        self.arrangement
    }

    pub fn stereo(&self) -> bool {
        self.stereo
    }

    /// Bezel width in pixels hidden between two neighbouring displays.
    pub fn bezel_pixels(&self) -> Vec2i {
        Vec2i::new(
            (self.relative_bezel.x * self.pixels_per_display.x as f32) as i32,
            (self.relative_bezel.y * self.pixels_per_display.y as f32) as i32,
        )
    }

    /// Pixel extent of the whole wall, bezel gaps included.
    pub fn total_pixels(&self) -> Vec2i {
        let gaps = self.num_displays - Vec2i::new(1, 1);
        self.num_displays * self.pixels_per_display + gaps * self.bezel_pixels()
    }

    /// The whole wall as a pixel rectangle anchored at the origin.
    pub fn wall_region(&self) -> Box2i {
        Box2i::new(Vec2i::ZERO, self.total_pixels())
    }

    pub fn display_count(&self) -> usize {
        self.num_displays.product()
    }

    /// Pixels of one eye's image of the whole wall.
    pub fn pixel_count_per_eye(&self) -> usize {
        self.total_pixels().product()
    }

    /// Pixels per wall frame, both eyes counted on stereo walls.
    pub fn total_pixel_count(&self) -> usize {
        self.eye_count() * self.pixel_count_per_eye()
    }

    /// Pixels per display frame, both eyes counted on stereo walls.
    pub fn display_pixel_count(&self) -> usize {
        self.eye_count() * self.pixels_per_display.product()
    }

    pub fn eye_count(&self) -> usize {
        if self.stereo {
            2
        } else {
            1
        }
    }

    /// Rank driving the display at grid position `coord`.
    ///
    /// `coord` must lie within `[0, num_displays)` on both axes.
    pub fn rank_of_display(&self, coord: Vec2i) -> usize {
        debug_assert!(
            Box2i::new(Vec2i::ZERO, self.num_displays).contains_box(&Box2i::from_origin_size(
                coord,
                Vec2i::new(1, 1)
            )),
            "display coordinate {coord:?} outside the grid"
        );
        let a = self.arrangement;
        let x = a.x_order().orient(coord.x, self.num_displays.x);
        let y = a.y_order().orient(coord.y, self.num_displays.y);
        let rank = match a.minor_axis() {
            Axis::X => x + self.num_displays.x * y,
            Axis::Y => y + self.num_displays.y * x,
        };
        rank as usize
    }

    /// Grid position of the display driven by `rank`; inverse of
    /// [`WallGeometry::rank_of_display`].
    pub fn display_coord_of_rank(&self, rank: usize) -> Vec2i {
        let a = self.arrangement;
        let rank = rank as i32;
        let (x, y) = match a.minor_axis() {
            Axis::X => (rank % self.num_displays.x, rank / self.num_displays.x),
            Axis::Y => (rank / self.num_displays.y, rank % self.num_displays.y),
        };
        Vec2i::new(
            a.x_order().orient(x, self.num_displays.x),
            a.y_order().orient(y, self.num_displays.y),
        )
    }

    /// Wall pixels shown by the display at `coord`.
    pub fn region_of_display(&self, coord: Vec2i) -> Box2i {
        let lower = coord * (self.pixels_per_display + self.bezel_pixels());
        Box2i::from_origin_size(lower, self.pixels_per_display)
    }

    /// Wall pixels shown by the display that `rank` drives.
    pub fn region_of_rank(&self, rank: usize) -> Box2i {
        self.region_of_display(self.display_coord_of_rank(rank))
    }

    /// Half-open range of display coordinates whose regions overlap `rect`.
    ///
    /// Each axis is scanned independently so bezel gaps are honoured. The
    /// range is clamped to the grid; a rectangle that is empty, lies fully
    /// outside the wall or falls entirely inside a bezel gap yields an empty
    /// range.
    pub fn affected_displays(&self, rect: &Box2i) -> Box2i {
        if rect.is_empty() {
            return Box2i::default();
        }
        let stride = self.pixels_per_display + self.bezel_pixels();
        let (x0, x1) = affected_span(
            rect.lower.x,
            rect.upper.x,
            self.num_displays.x,
            self.pixels_per_display.x,
            stride.x,
        );
        let (y0, y1) = affected_span(
            rect.lower.y,
            rect.upper.y,
            self.num_displays.y,
            self.pixels_per_display.y,
            stride.y,
        );
        if x0 >= x1 || y0 >= y1 {
            return Box2i::default();
        }
        Box2i::new(Vec2i::new(x0, y0), Vec2i::new(x1, y1))
    }
}

/// Scans one axis for the displays overlapping `[lo, hi)`.
///
/// `begin` is the first display whose upper bound exceeds `lo`; `end` is one
/// past the last display whose lower bound is below `hi`.
fn affected_span(lo: i32, hi: i32, count: i32, extent: i32, stride: i32) -> (i32, i32) {
    let mut begin = 0;
    while begin < count && begin * stride + extent <= lo {
        begin += 1;
    }
    let mut end = count;
    while end > begin && (end - 1) * stride >= hi {
        end -= 1;
    }
    (begin, end)
}

impl fmt::Display for WallGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} displays ({} total) of {} px, bezel {:.3}x{:.3} ({} px), arrangement {}, \
             wall {} px ({} px per frame), {}",
            self.num_displays,
            self.display_count(),
            self.pixels_per_display,
            self.relative_bezel.x,
            self.relative_bezel.y,
            self.bezel_pixels(),
            self.arrangement,
            self.total_pixels(),
            self.total_pixel_count(),
            if self.stereo { "stereo" } else { "mono" }
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
