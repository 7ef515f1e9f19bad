//! Gradient materials: per-drawable GPU parameters resolved from a
//! [`Gradient`] descriptor and its bounding rectangle.
//!
//! `update_gradient` reports whether anything observable changed, which is
//! what lets shaders skip re-uploading uniforms for static gradients.

use core::cmp::Ordering;

use crate::coords::{Rect, Vec2};
use crate::paint::{
    ConicDirection, Gradient, GradientDirection, GradientKind, GradientStops, LinearDirection,
    RadialDirection, SpreadMode,
};

use super::uniform::{KindPayload, PayloadField, UniformValue, PAYLOAD_OFFSET};

/// Legacy program uniform names of each kind's payload, in block order.
pub fn payload_names(kind: GradientKind) -> &'static [&'static str] {
    match kind {
        GradientKind::Stops => &[],
        GradientKind::Linear => &["vector"],
        GradientKind::Radial => &["centerCoord", "radius"],
        GradientKind::Conic => &["centerCoord", "start", "span"],
    }
}

fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn cmp_floats(a: &[f32], b: &[f32]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Relative float equality with a 1e-5 tolerance.
fn fuzzy_eq(a: f32, b: f32) -> bool {
    a == b || (a - b).abs() * 100_000.0 <= a.abs().min(b.abs())
}

/// Stops and spread shared by every kind.
#[derive(Debug, Clone, Default, PartialEq)]
struct GradientState {
    stops: GradientStops,
    spread: SpreadMode,
}

impl GradientState {
    fn update(&mut self, gradient: &Gradient) -> bool {
        let mut changed = false;

        if !gradient.stops.same_bits(&self.stops) {
            self.stops = gradient.stops.clone();
            changed = true;
        }

        if gradient.spread != self.spread {
            self.spread = gradient.spread;
            changed = true;
        }

        changed
    }

    fn compare(&self, other: &GradientState) -> Ordering {
        if self.spread == other.spread && self.stops.same_bits(&other.stops) {
            return Ordering::Equal;
        }
        self.fallback_order(other)
    }

    /// Total order used when two states differ.
    fn fallback_order(&self, other: &GradientState) -> Ordering {
        self.spread.cmp(&other.spread).then_with(|| {
            let key = |s: &GradientStops| -> Vec<f32> {
                s.iter()
                    .flat_map(|s| [s.position, s.color.r, s.color.g, s.color.b, s.color.a])
                    .collect()
            };
            cmp_floats(&key(&self.stops), &key(&other.stops))
        })
    }
}

/// Linear gradient material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearMaterial {
    state: GradientState,
    /// xy: absolute start, zw: delta relative to start (sign matters).
    vector: [f32; 4],
}

impl LinearMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vector(&self) -> [f32; 4] {
        self.vector
    }

    fn set_gradient(&mut self, rect: Rect, dir: &LinearDirection, gradient: &Gradient) -> bool {
        let mut changed = self.state.update(gradient);

        let start = rect.map_fraction(dir.start);
        let delta = dir.delta.scale(rect.size);
        let vector = [start.x, start.y, delta.x, delta.y];

        if !same_bits(&vector, &self.vector) {
            self.vector = vector;
            changed = true;
        }

        changed
    }

    fn compare(&self, other: &LinearMaterial) -> Ordering {
        if same_bits(&self.vector, &other.vector) {
            self.state.compare(&other.state)
        } else {
            cmp_floats(&self.vector, &other.vector)
        }
    }

    fn payload(&self) -> KindPayload {
        KindPayload::new(&[PayloadField::new(
            "vector",
            PAYLOAD_OFFSET,
            UniformValue::Vec4(self.vector),
        )])
    }
}

/// Radial gradient material; `radius` is per axis, so ellipses are supported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialMaterial {
    state: GradientState,
    center: Vec2,
    radius: Vec2,
}

impl RadialMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> Vec2 {
        self.radius
    }

    fn geometry(&self) -> [f32; 4] {
        [self.center.x, self.center.y, self.radius.x, self.radius.y]
    }

    fn set_gradient(&mut self, rect: Rect, dir: &RadialDirection, gradient: &Gradient) -> bool {
        let mut changed = self.state.update(gradient);

        let center = rect.map_fraction(dir.center);
        let radius = Vec2::splat(dir.radius).scale(rect.size);

        let next = [center.x, center.y, radius.x, radius.y];
        if !same_bits(&next, &self.geometry()) {
            self.center = center;
            self.radius = radius;
            changed = true;
        }

        changed
    }

    fn compare(&self, other: &RadialMaterial) -> Ordering {
        if same_bits(&self.geometry(), &other.geometry()) {
            self.state.compare(&other.state)
        } else {
            cmp_floats(&self.geometry(), &other.geometry())
        }
    }

    fn payload(&self) -> KindPayload {
        KindPayload::new(&[
            PayloadField::new("centerCoord", PAYLOAD_OFFSET, UniformValue::Vec2(self.center.to_array())),
            PayloadField::new("radius", PAYLOAD_OFFSET + 8, UniformValue::Vec2(self.radius.to_array())),
        ])
    }
}

/// Conic gradient material.
///
/// Angles are stored as fractions of a full turn: `start` in [0, 1), `span`
/// in [-1, 1] with its sign giving the sweep direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConicMaterial {
    state: GradientState,
    center: Vec2,
    start: f32,
    span: f32,
}

impl Default for ConicMaterial {
    fn default() -> Self {
        Self { state: GradientState::default(), center: Vec2::zero(), start: 0.0, span: 1.0 }
    }
}

impl ConicMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn start(&self) -> f32 {
        self.start
    }

    #[inline]
    pub fn span(&self) -> f32 {
        self.span
    }

    /// Start angle in degrees to a turn fraction in [0, 1).
    pub fn normalize_start(degrees: f32) -> f32 {
        let start = (degrees % 360.0) / 360.0;
        if start < 0.0 { start + 1.0 } else { start }
    }

    /// Span angle in degrees to a signed turn fraction in [-1, 1].
    ///
    /// The span wraps modulo 360 and keeps its sign. Non-zero exact multiples
    /// of 360 are full sweeps and pack as +/-1 instead of 0.
    pub fn normalize_span(degrees: f32) -> f32 {
        let span = degrees % 360.0;
        if span == 0.0 && degrees != 0.0 && degrees.is_finite() {
            return degrees.signum();
        }
        span / 360.0
    }

    fn set_gradient(&mut self, rect: Rect, dir: &ConicDirection, gradient: &Gradient) -> bool {
        let mut changed = self.state.update(gradient);

        let center = rect.map_fraction(dir.center);
        let start = Self::normalize_start(dir.start_angle);
        let span = Self::normalize_span(dir.span_angle);

        if !same_bits(&center.to_array(), &self.center.to_array()) {
            self.center = center;
            changed = true;
        }

        if !same_bits(&[start, span], &[self.start, self.span]) {
            self.start = start;
            self.span = span;
            changed = true;
        }

        changed
    }

    fn geometry(&self) -> [f32; 4] {
        [self.center.x, self.center.y, self.start, self.span]
    }

    fn compare(&self, other: &ConicMaterial) -> Ordering {
        let same_geometry = same_bits(&self.center.to_array(), &other.center.to_array())
            && fuzzy_eq(self.start, other.start)
            && fuzzy_eq(self.span, other.span);

        if same_geometry {
            self.state.compare(&other.state)
        } else {
            cmp_floats(&self.geometry(), &other.geometry())
        }
    }

    fn payload(&self) -> KindPayload {
        KindPayload::new(&[
            PayloadField::new("centerCoord", PAYLOAD_OFFSET, UniformValue::Vec2(self.center.to_array())),
            PayloadField::new("start", PAYLOAD_OFFSET + 8, UniformValue::Float(self.start)),
            PayloadField::new("span", PAYLOAD_OFFSET + 12, UniformValue::Float(self.span)),
        ])
    }
}

/// A gradient material of one fixed kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GradientMaterial {
    Linear(LinearMaterial),
    Radial(RadialMaterial),
    Conic(ConicMaterial),
}

impl GradientMaterial {
    /// Fresh material for `kind`; `None` for kinds without geometry.
    pub fn for_kind(kind: GradientKind) -> Option<Self> {
        match kind {
            GradientKind::Linear => Some(GradientMaterial::Linear(LinearMaterial::new())),
            GradientKind::Radial => Some(GradientMaterial::Radial(RadialMaterial::new())),
            GradientKind::Conic => Some(GradientMaterial::Conic(ConicMaterial::new())),
            GradientKind::Stops => None,
        }
    }

    pub fn kind(&self) -> GradientKind {
        match self {
            GradientMaterial::Linear(_) => GradientKind::Linear,
            GradientMaterial::Radial(_) => GradientKind::Radial,
            GradientMaterial::Conic(_) => GradientKind::Conic,
        }
    }

    fn state(&self) -> &GradientState {
        match self {
            GradientMaterial::Linear(m) => &m.state,
            GradientMaterial::Radial(m) => &m.state,
            GradientMaterial::Conic(m) => &m.state,
        }
    }

    #[inline]
    pub fn stops(&self) -> &GradientStops {
        &self.state().stops
    }

    #[inline]
    pub fn spread(&self) -> SpreadMode {
        self.state().spread
    }

    /// Gradient materials are always alpha blended.
    #[inline]
    pub const fn requires_blending(&self) -> bool {
        true
    }

    /// Shaders need the full combined matrix, not only a translation.
    #[inline]
    pub const fn requires_full_matrix(&self) -> bool {
        true
    }

    /// Resolves `gradient` against `rect`; returns true if any stored field changed.
    ///
    /// The gradient kind must match the material kind. A mismatch asserts in
    /// debug builds and is reported as "unchanged" otherwise.
    pub fn update_gradient(&mut self, rect: Rect, gradient: &Gradient) -> bool {
        debug_assert_eq!(gradient.kind(), self.kind(), "gradient kind does not match material");

        match (self, &gradient.direction) {
            (GradientMaterial::Linear(m), GradientDirection::Linear(d)) => {
                m.set_gradient(rect, d, gradient)
            }
            (GradientMaterial::Radial(m), GradientDirection::Radial(d)) => {
                m.set_gradient(rect, d, gradient)
            }
            (GradientMaterial::Conic(m), GradientDirection::Conic(d)) => {
                m.set_gradient(rect, d, gradient)
            }
            (material, _) => {
                log::warn!(
                    "ignoring {:?} gradient for {:?} material",
                    gradient.kind(),
                    material.kind()
                );
                false
            }
        }
    }

    /// Batching order: `Equal` means both materials can share GPU state.
    ///
    /// Same kind compares geometry first and then stops and spread; any
    /// difference yields a deterministic non-equal ordering.
    pub fn compare(&self, other: &GradientMaterial) -> Ordering {
        match (self, other) {
            (GradientMaterial::Linear(a), GradientMaterial::Linear(b)) => a.compare(b),
            (GradientMaterial::Radial(a), GradientMaterial::Radial(b)) => a.compare(b),
            (GradientMaterial::Conic(a), GradientMaterial::Conic(b)) => a.compare(b),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }

    /// Kind-specific uniform fields for packing.
    pub fn payload(&self) -> KindPayload {
        match self {
            GradientMaterial::Linear(m) => m.payload(),
            GradientMaterial::Radial(m) => m.payload(),
            GradientMaterial::Conic(m) => m.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;

    fn stops() -> GradientStops {
        GradientStops::two(
            Color::from_premul(1.0, 0.0, 0.0, 1.0),
            Color::from_premul(0.0, 0.0, 1.0, 1.0),
        )
    }

    fn linear(start: Vec2, delta: Vec2) -> Gradient {
        Gradient::linear(LinearDirection::new(start, delta), stops())
    }

    fn material(kind: GradientKind) -> GradientMaterial {
        GradientMaterial::for_kind(kind).unwrap()
    }

    // ── change detection ──────────────────────────────────────────────────

    #[test]
    fn second_identical_update_reports_unchanged() {
        let mut m = material(GradientKind::Linear);
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let g = linear(Vec2::zero(), Vec2::new(1.0, 0.0));

        assert!(m.update_gradient(rect, &g));
        assert!(!m.update_gradient(rect, &g));
    }

    #[test]
    fn spread_or_stops_change_is_detected() {
        let mut m = material(GradientKind::Radial);
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let g = Gradient::radial(RadialDirection::default(), stops());
        m.update_gradient(rect, &g);

        assert!(m.update_gradient(rect, &g.clone().with_spread(SpreadMode::Reflect)));
        assert_eq!(m.spread(), SpreadMode::Reflect);

        let mut reversed = g.clone().with_spread(SpreadMode::Reflect);
        reversed.stops = reversed.stops.iter().rev().copied().collect();
        assert!(m.update_gradient(rect, &reversed));
        assert!(!m.update_gradient(rect, &reversed));
    }

    #[test]
    fn stop_identity_matches_the_ramp_cache() {
        use crate::paint::GradientStop;
        use crate::render::{ColorRampCache, ContextId};

        let white = Color::from_premul(1.0, 1.0, 1.0, 1.0);
        let at = |p: f32| -> GradientStops {
            vec![GradientStop::new(p, white), GradientStop::new(1.0, white)].into()
        };
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let dir = LinearDirection::new(Vec2::zero(), Vec2::new(1.0, 0.0));

        let mut m = material(GradientKind::Linear);
        let nan = Gradient::linear(dir, at(f32::NAN));
        assert!(m.update_gradient(rect, &nan));
        assert!(!m.update_gradient(rect, &nan));

        let cache = ColorRampCache::new();
        let pos = cache.color_ramp(ContextId::NONE, &at(0.0), SpreadMode::Pad);
        let neg = cache.color_ramp(ContextId::NONE, &at(-0.0), SpreadMode::Pad);
        assert!(!std::sync::Arc::ptr_eq(&pos, &neg));

        m.update_gradient(rect, &Gradient::linear(dir, at(0.0)));
        assert!(m.update_gradient(rect, &Gradient::linear(dir, at(-0.0))));
    }

    #[test]
    fn rect_move_changes_geometry() {
        let mut m = material(GradientKind::Conic);
        let g = Gradient::conic(ConicDirection::default(), stops());
        m.update_gradient(Rect::new(0.0, 0.0, 10.0, 10.0), &g);
        assert!(m.update_gradient(Rect::new(1.0, 0.0, 10.0, 10.0), &g));
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn linear_vector_scales_start_and_delta() {
        let mut m = LinearMaterial::new();
        let g = linear(Vec2::zero(), Vec2::new(1.0, 0.0));
        let GradientDirection::Linear(d) = g.direction else { unreachable!() };
        m.set_gradient(Rect::new(0.0, 0.0, 100.0, 50.0), &d, &g);
        assert_eq!(m.vector(), [0.0, 0.0, 100.0, 0.0]);
    }

    #[test]
    fn linear_start_is_offset_but_delta_is_not() {
        let mut m = material(GradientKind::Linear);
        let g = linear(Vec2::new(0.5, 0.5), Vec2::new(0.0, -0.5));
        m.update_gradient(Rect::new(10.0, 20.0, 100.0, 40.0), &g);
        let GradientMaterial::Linear(m) = m else { unreachable!() };
        assert_eq!(m.vector(), [60.0, 40.0, 0.0, -20.0]);
    }

    #[test]
    fn radial_radius_scales_per_axis() {
        let mut m = material(GradientKind::Radial);
        let g = Gradient::radial(RadialDirection::new(Vec2::new(0.5, 0.25), 0.5), stops());
        m.update_gradient(Rect::new(10.0, 10.0, 200.0, 100.0), &g);
        let GradientMaterial::Radial(m) = m else { unreachable!() };
        assert_eq!(m.center(), Vec2::new(110.0, 35.0));
        assert_eq!(m.radius(), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn conic_angles_become_turn_fractions() {
        assert_eq!(ConicMaterial::normalize_start(-90.0), 0.75);
        assert_eq!(ConicMaterial::normalize_start(450.0), 0.25);
        assert_eq!(ConicMaterial::normalize_span(-180.0), -0.5);
        assert_eq!(ConicMaterial::normalize_span(360.0), 1.0);
        assert_eq!(ConicMaterial::normalize_span(-720.0), -1.0);
        assert_eq!(ConicMaterial::normalize_span(0.0), 0.0);
    }

    #[test]
    fn conic_span_wraps_past_a_full_turn() {
        assert_eq!(ConicMaterial::normalize_span(450.0), 0.25);
        assert_eq!(ConicMaterial::normalize_span(-540.0), -0.5);

        let mut m = material(GradientKind::Conic);
        let g = Gradient::conic(ConicDirection::new(Vec2::splat(0.5), 0.0, 450.0), stops());
        m.update_gradient(Rect::new(0.0, 0.0, 10.0, 10.0), &g);
        let GradientMaterial::Conic(c) = m else { unreachable!() };
        assert_eq!(c.span(), 0.25);
    }

    #[test]
    fn zero_size_rect_is_stable() {
        let mut m = material(GradientKind::Radial);
        let g = Gradient::radial(RadialDirection::default(), stops());
        let rect = Rect::new(5.0, 5.0, 0.0, 0.0);
        m.update_gradient(rect, &g);
        assert!(!m.update_gradient(rect, &g));
        let GradientMaterial::Radial(r) = m else { unreachable!() };
        assert_eq!(r.radius(), Vec2::zero());
    }

    // ── kind mismatch ─────────────────────────────────────────────────────

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "gradient kind does not match material")]
    fn kind_mismatch_asserts_in_debug() {
        let mut m = material(GradientKind::Linear);
        let g = Gradient::radial(RadialDirection::default(), stops());
        m.update_gradient(Rect::new(0.0, 0.0, 1.0, 1.0), &g);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn kind_mismatch_is_unchanged_in_release() {
        let mut m = material(GradientKind::Linear);
        let g = Gradient::radial(RadialDirection::default(), stops());
        assert!(!m.update_gradient(Rect::new(0.0, 0.0, 1.0, 1.0), &g));
    }

    // ── batching ──────────────────────────────────────────────────────────

    #[test]
    fn equal_materials_compare_equal() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let g = Gradient::conic(ConicDirection::new(Vec2::splat(0.5), 30.0, 90.0), stops());
        let mut a = material(GradientKind::Conic);
        let mut b = material(GradientKind::Conic);
        a.update_gradient(rect, &g);
        b.update_gradient(rect, &g);
        assert_eq!(a.compare(&b), Ordering::Equal);
    }

    #[test]
    fn differing_geometry_or_stops_compare_unequal() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let mut a = material(GradientKind::Conic);
        let mut b = material(GradientKind::Conic);
        let at = |start| Gradient::conic(ConicDirection::new(Vec2::splat(0.5), start, 90.0), stops());
        a.update_gradient(rect, &at(0.0));
        b.update_gradient(rect, &at(45.0));
        assert_ne!(a.compare(&b), Ordering::Equal);
        assert_eq!(a.compare(&b), b.compare(&a).reverse());

        let g = linear(Vec2::zero(), Vec2::new(1.0, 0.0));
        let mut c = material(GradientKind::Linear);
        let mut d = material(GradientKind::Linear);
        c.update_gradient(rect, &g);
        d.update_gradient(rect, &g.with_spread(SpreadMode::Repeat));
        assert_ne!(c.compare(&d), Ordering::Equal);
    }

    #[test]
    fn different_kinds_order_by_kind() {
        let a = material(GradientKind::Linear);
        let b = material(GradientKind::Conic);
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    // ── payload ───────────────────────────────────────────────────────────

    #[test]
    fn payload_names_match_fields() {
        for kind in [GradientKind::Linear, GradientKind::Radial, GradientKind::Conic] {
            let names: Vec<_> = material(kind).payload().fields().iter().map(|f| f.name).collect();
            assert_eq!(names, payload_names(kind));
        }
    }
}
