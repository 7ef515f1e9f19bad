use crate::coords::Vec2;

use super::Color;

/// Gradient spread behavior outside [0, 1] range.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum SpreadMode {
    /// Clamp to edge stops.
    #[default]
    Pad,
    /// Repeat the gradient pattern.
    Repeat,
    /// Mirror-repeat the gradient pattern.
    Reflect,
}

/// A single gradient stop.
///
/// `position` is expected in [0, 1]; ramps clamp sampling positions but do not
/// reorder stops.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: Color,
}

impl GradientStop {
    #[inline]
    pub const fn new(position: f32, color: Color) -> Self {
        Self { position, color }
    }

    /// Bit patterns of color and position; the identity used for caching.
    #[inline]
    pub(crate) fn to_bits(self) -> ([u32; 4], u32) {
        (self.color.to_bits(), self.position.to_bits())
    }
}

/// Ordered stop sequence. Equality compares the full sequence, order included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientStops(Vec<GradientStop>);

impl GradientStops {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Two-stop ramp from `from` at 0 to `to` at 1.
    pub fn two(from: Color, to: Color) -> Self {
        Self(vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)])
    }

    #[inline]
    pub fn push(&mut self, stop: GradientStop) {
        self.0.push(stop);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[GradientStop] {
        &self.0
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, GradientStop> {
        self.0.iter()
    }

    /// Bit-for-bit equality: NaN matches itself, `-0.0` differs from `0.0`.
    pub(crate) fn same_bits(&self, other: &GradientStops) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// Interpolated color at `t`.
    ///
    /// Before the first stop the first color is used, after the last stop the
    /// last color. Stops sharing a position produce a hard step. An empty
    /// sequence is transparent.
    pub fn color_at(&self, t: f32) -> Color {
        let (Some(first), Some(last)) = (self.0.first(), self.0.last()) else {
            return Color::transparent();
        };

        if t <= first.position {
            return first.color;
        }
        if t >= last.position {
            return last.color;
        }

        for pair in self.0.windows(2) {
            let (s0, s1) = (pair[0], pair[1]);
            if t >= s0.position && t < s1.position {
                let span = s1.position - s0.position;
                if span <= f32::EPSILON {
                    return s1.color;
                }
                return s0.color.lerp(s1.color, (t - s0.position) / span);
            }
        }

        last.color
    }
}

impl From<Vec<GradientStop>> for GradientStops {
    fn from(stops: Vec<GradientStop>) -> Self {
        Self(stops)
    }
}

impl FromIterator<GradientStop> for GradientStops {
    fn from_iter<I: IntoIterator<Item = GradientStop>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GradientStops {
    type Item = &'a GradientStop;
    type IntoIter = core::slice::Iter<'a, GradientStop>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Gradient geometry family.
///
/// `Stops` describes a bare color sequence without geometry. It is a valid
/// descriptor but has no material or shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum GradientKind {
    Stops,
    Linear,
    Radial,
    Conic,
}

impl GradientKind {
    /// Base name of the shader program pair for this kind.
    pub fn shader_name(self) -> Option<&'static str> {
        match self {
            GradientKind::Stops => None,
            GradientKind::Linear => Some("gradientlinear"),
            GradientKind::Radial => Some("gradientradial"),
            GradientKind::Conic => Some("gradientconic"),
        }
    }
}

/// Raw kind id received from a host styling layer (`0` stops, `1` linear,
/// `2` radial, `3` conic).
impl TryFrom<u8> for GradientKind {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(GradientKind::Stops),
            1 => Ok(GradientKind::Linear),
            2 => Ok(GradientKind::Radial),
            3 => Ok(GradientKind::Conic),
            other => Err(other),
        }
    }
}

/// Linear direction in bounding-rect fractions.
///
/// `delta` is relative to `start`; its sign selects the direction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearDirection {
    pub start: Vec2,
    pub delta: Vec2,
}

impl LinearDirection {
    #[inline]
    pub const fn new(start: Vec2, delta: Vec2) -> Self {
        Self { start, delta }
    }

    /// Top to bottom across the full rect.
    pub const fn vertical() -> Self {
        Self::new(Vec2::zero(), Vec2::new(0.0, 1.0))
    }

    /// Left to right across the full rect.
    pub const fn horizontal() -> Self {
        Self::new(Vec2::zero(), Vec2::new(1.0, 0.0))
    }
}

/// Radial direction in bounding-rect fractions.
///
/// `radius` is scaled independently by width and height, so a non-square
/// rect yields an elliptical gradient.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RadialDirection {
    pub center: Vec2,
    pub radius: f32,
}

impl RadialDirection {
    #[inline]
    pub const fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl Default for RadialDirection {
    fn default() -> Self {
        Self::new(Vec2::splat(0.5), 0.5)
    }
}

/// Conic direction: center in bounding-rect fractions, angles in degrees.
///
/// A negative `span_angle` sweeps the other way.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConicDirection {
    pub center: Vec2,
    pub start_angle: f32,
    pub span_angle: f32,
}

impl ConicDirection {
    #[inline]
    pub const fn new(center: Vec2, start_angle: f32, span_angle: f32) -> Self {
        Self { center, start_angle, span_angle }
    }
}

impl Default for ConicDirection {
    fn default() -> Self {
        Self::new(Vec2::splat(0.5), 0.0, 360.0)
    }
}

/// Kind-specific geometry of a [`Gradient`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GradientDirection {
    Stops,
    Linear(LinearDirection),
    Radial(RadialDirection),
    Conic(ConicDirection),
}

/// Gradient descriptor as supplied by the styling layer on every draw request.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub direction: GradientDirection,
    pub stops: GradientStops,
    pub spread: SpreadMode,
}

impl Gradient {
    pub fn stops_only(stops: GradientStops) -> Self {
        Self { direction: GradientDirection::Stops, stops, spread: SpreadMode::Pad }
    }

    pub fn linear(direction: LinearDirection, stops: GradientStops) -> Self {
        Self { direction: GradientDirection::Linear(direction), stops, spread: SpreadMode::Pad }
    }

    pub fn radial(direction: RadialDirection, stops: GradientStops) -> Self {
        Self { direction: GradientDirection::Radial(direction), stops, spread: SpreadMode::Pad }
    }

    pub fn conic(direction: ConicDirection, stops: GradientStops) -> Self {
        Self { direction: GradientDirection::Conic(direction), stops, spread: SpreadMode::Pad }
    }

    #[inline]
    pub fn with_spread(mut self, spread: SpreadMode) -> Self {
        self.spread = spread;
        self
    }

    pub fn kind(&self) -> GradientKind {
        match self.direction {
            GradientDirection::Stops => GradientKind::Stops,
            GradientDirection::Linear(_) => GradientKind::Linear,
            GradientDirection::Radial(_) => GradientKind::Radial,
            GradientDirection::Conic(_) => GradientKind::Conic,
        }
    }

    /// Returns true when the descriptor can be drawn by a gradient material.
    pub fn is_valid(&self) -> bool {
        let geometry_ok = match self.direction {
            GradientDirection::Stops => false,
            GradientDirection::Linear(d) => d.start.is_finite() && d.delta.is_finite(),
            GradientDirection::Radial(d) => d.center.is_finite() && d.radius.is_finite(),
            GradientDirection::Conic(d) => {
                d.center.is_finite() && d.start_angle.is_finite() && d.span_angle.is_finite()
            }
        };

        geometry_ok
            && !self.stops.is_empty()
            && self.stops.iter().all(|s| s.position.is_finite() && s.color.is_finite())
    }
}
