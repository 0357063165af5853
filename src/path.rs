use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of samples used to build the cumulative arc-length table.
pub const ARC_LENGTH_DIVISIONS: usize = 200;

const MIN_KNOT_SPACING: f32 = 1e-4;

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("a curve needs at least 2 control points, got {0}")]
    TooFewPoints(usize),
    #[error("control point {0} is not finite")]
    NonFinitePoint(usize),
}

/// Knot parametrisation of the Catmull-Rom spline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CurveKind {
    /// Alpha 0.5: no cusps or self-intersections on uneven spacing.
    Centripetal,
    /// Alpha 1.0.
    Chordal,
    /// Uniform knots with the given tangent tension.
    Uniform { tension: f32 },
}

/// Cubic segment `c0 + c1 w + c2 w^2 + c3 w^3` for `w` in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
struct Cubic {
    c0: Vec3,
    c1: Vec3,
    c2: Vec3,
    c3: Vec3,
}

impl Cubic {
    fn hermite(x0: Vec3, x1: Vec3, t0: Vec3, t1: Vec3) -> Self {
        Self {
            c0: x0,
            c1: t0,
            c2: -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1,
            c3: 2.0 * x0 - 2.0 * x1 + t0 + t1,
        }
    }

    fn uniform(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, tension: f32) -> Self {
        Self::hermite(p1, p2, tension * (p2 - p0), tension * (p3 - p1))
    }

    fn non_uniform(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, dt0: f32, dt1: f32, dt2: f32) -> Self {
        let t1 = (p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1;
        let t2 = (p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2;
        Self::hermite(p1, p2, t1 * dt1, t2 * dt1)
    }

    fn eval(&self, w: f32) -> Vec3 {
        let w2 = w * w;
        self.c0 + self.c1 * w + self.c2 * w2 + self.c3 * w2 * w
    }

    fn derivative(&self, w: f32) -> Vec3 {
        self.c1 + 2.0 * self.c2 * w + 3.0 * self.c3 * w * w
    }
}

/// Open Catmull-Rom spline through a fixed list of control points.
///
/// `point`/`tangent` take the raw spline parameter; the `*_at` variants take
/// a normalised arc-length fraction, so equal steps of `u` cover equal
/// distances along the curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CatmullRomCurve {
    points: Vec<Vec3>,
    kind: CurveKind,
    lengths: Vec<f32>,
}

impl CatmullRomCurve {
    pub fn new(points: Vec<Vec3>, kind: CurveKind) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(CurveError::NonFinitePoint(index));
        }
        let mut curve = Self {
            points,
            kind,
            lengths: Vec::new(),
        };
        curve.lengths = curve.cumulative_lengths(ARC_LENGTH_DIVISIONS);
        Ok(curve)
    }

    pub fn centripetal(points: Vec<Vec3>) -> Result<Self, CurveError> {
        Self::new(points, CurveKind::Centripetal)
    }

    pub fn control_points(&self) -> &[Vec3] {
        &self.points
    }

    /// Total arc length, as approximated by the length table.
    pub fn length(&self) -> f32 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Position at raw spline parameter `t`, clamped to `[0, 1]`.
    pub fn point(&self, t: f32) -> Vec3 {
        let (index, weight) = self.locate(t);
        if weight >= 1.0 {
            return self.points[index + 1];
        }
        if weight <= 0.0 {
            return self.points[index];
        }
        self.segment(index).eval(weight)
    }

    /// Unit tangent at raw spline parameter `t`.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let (index, weight) = self.locate(t);
        let derivative = self.segment(index).derivative(weight);
        if let Some(direction) = derivative.try_normalize() {
            return direction;
        }
        (self.points[index + 1] - self.points[index])
            .try_normalize()
            .unwrap_or(Vec3::X)
    }

    /// Position at arc-length fraction `u`, clamped to `[0, 1]`.
    pub fn point_at(&self, u: f32) -> Vec3 {
        self.point(self.u_to_t(u))
    }

    /// Unit tangent at arc-length fraction `u`.
    pub fn tangent_at(&self, u: f32) -> Vec3 {
        self.tangent(self.u_to_t(u))
    }

    /// Shortest-arc rotation taking `axis` onto the tangent at `u`.
    ///
    /// Roll about the tangent is whatever the minimal arc produces.
    pub fn orientation_at(&self, u: f32, axis: Vec3) -> Quat {
        let axis = axis.try_normalize().unwrap_or(Vec3::X);
        Quat::from_rotation_arc(axis, self.tangent_at(u))
    }

    /// Maps an arc-length fraction to the raw spline parameter.
    pub fn u_to_t(&self, u: f32) -> f32 {
        let u = sanitize_unit(u);
        let total = self.length();
        let last = self.lengths.len() - 1;
        if total <= f32::EPSILON {
            return u;
        }
        let target = u * total;
        if target >= total {
            return 1.0;
        }
        // First sample at or past the target; the target lies in the division ending there.
        let index = self.lengths.partition_point(|&length| length < target).min(last);
        if self.lengths[index] == target {
            return index as f32 / last as f32;
        }
        let index = index.saturating_sub(1);
        let before = self.lengths[index];
        let span = self.lengths[index + 1] - before;
        let fraction = if span > 0.0 {
            (target - before) / span
        } else {
            0.0
        };
        ((index as f32 + fraction) / last as f32).clamp(0.0, 1.0)
    }

    fn locate(&self, t: f32) -> (usize, f32) {
        let spans = self.points.len() - 1;
        let scaled = sanitize_unit(t) * spans as f32;
        let mut index = scaled.floor() as usize;
        let mut weight = scaled - index as f32;
        if index >= spans {
            index = spans - 1;
            weight = 1.0;
        }
        (index, weight)
    }

    fn segment(&self, index: usize) -> Cubic {
        let points = &self.points;
        let last = points.len() - 1;
        let p1 = points[index];
        let p2 = points[index + 1];
        // Open ends are extended by reflecting the neighbouring point.
        let p0 = if index > 0 {
            points[index - 1]
        } else {
            2.0 * points[0] - points[1]
        };
        let p3 = if index + 2 <= last {
            points[index + 2]
        } else {
            2.0 * points[last] - points[last - 1]
        };

        let exponent = match self.kind {
            CurveKind::Uniform { tension } => return Cubic::uniform(p0, p1, p2, p3, tension),
            CurveKind::Centripetal => 0.25,
            CurveKind::Chordal => 0.5,
        };
        let mut dt0 = p0.distance_squared(p1).powf(exponent);
        let mut dt1 = p1.distance_squared(p2).powf(exponent);
        let mut dt2 = p2.distance_squared(p3).powf(exponent);
        if dt1 < MIN_KNOT_SPACING {
            dt1 = 1.0;
        }
        if dt0 < MIN_KNOT_SPACING {
            dt0 = dt1;
        }
        if dt2 < MIN_KNOT_SPACING {
            dt2 = dt1;
        }
        Cubic::non_uniform(p0, p1, p2, p3, dt0, dt1, dt2)
    }

    fn cumulative_lengths(&self, divisions: usize) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(divisions + 1);
        let mut previous = self.point(0.0);
        let mut sum = 0.0;
        lengths.push(sum);
        for step in 1..=divisions {
            let current = self.point(step as f32 / divisions as f32);
            sum += current.distance(previous);
            lengths.push(sum);
            previous = current;
        }
        lengths
    }
}

fn sanitize_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Vec<Vec3> {
        vec![
            Vec3::new(-3.3, 0.09, 0.5),
            Vec3::new(-2.0, 0.09, 0.15),
            Vec3::new(-0.8, 0.09, -0.1),
            Vec3::new(0.8, 0.09, -0.15),
            Vec3::new(2.2, 0.09, 0.0),
            Vec3::new(3.3, 0.09, 0.35),
        ]
    }

    #[test]
    fn rejects_single_point() {
        let err = CatmullRomCurve::centripetal(vec![Vec3::ZERO]).unwrap_err();
        assert_eq!(err, CurveError::TooFewPoints(1));
    }

    #[test]
    fn rejects_nan_point() {
        let err =
            CatmullRomCurve::centripetal(vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)])
                .unwrap_err();
        assert_eq!(err, CurveError::NonFinitePoint(1));
    }

    #[test]
    fn endpoints_are_exact() {
        for kind in [
            CurveKind::Centripetal,
            CurveKind::Chordal,
            CurveKind::Uniform { tension: 0.5 },
        ] {
            let curve = CatmullRomCurve::new(route(), kind).unwrap();
            assert_eq!(curve.point_at(0.0), route()[0]);
            assert_eq!(curve.point_at(1.0), route()[5]);
        }
    }

    #[test]
    fn passes_through_interior_points() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        for (index, expected) in route().iter().enumerate() {
            let t = index as f32 / 5.0;
            assert!(curve.point(t).distance(*expected) < 1e-5, "knot {index}");
        }
    }

    #[test]
    fn out_of_range_parameters_clamp() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        assert_eq!(curve.point_at(-3.0), curve.point_at(0.0));
        assert_eq!(curve.point_at(4.0), curve.point_at(1.0));
        assert_eq!(curve.point_at(f32::NAN), curve.point_at(0.0));
    }

    #[test]
    fn two_point_curve_is_a_straight_line() {
        let curve = CatmullRomCurve::centripetal(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)])
            .unwrap();
        let mid = curve.point_at(0.5);
        assert!(mid.distance(Vec3::new(1.0, 0.0, 0.0)) < 1e-4);
        assert!((curve.length() - 2.0).abs() < 1e-4);
        assert!(curve.tangent_at(0.3).distance(Vec3::X) < 1e-5);
    }

    #[test]
    fn arc_length_mapping_is_monotonic() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        let mut previous = -1.0;
        for step in 0..=100 {
            let t = curve.u_to_t(step as f32 / 100.0);
            assert!(t >= previous);
            previous = t;
        }
        assert_eq!(curve.u_to_t(0.0), 0.0);
        assert_eq!(curve.u_to_t(1.0), 1.0);
    }

    #[test]
    fn equal_u_steps_cover_equal_distance() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        let step = curve.length() / 20.0;
        for i in 0..20 {
            let a = curve.point_at(i as f32 / 20.0);
            let b = curve.point_at((i + 1) as f32 / 20.0);
            let chord = a.distance(b);
            assert!((chord - step).abs() < step * 0.05, "segment {i}: {chord} vs {step}");
        }
    }

    #[test]
    fn last_division_still_interpolates() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        let frames = 480;
        let step = curve.length() / frames as f32;
        for frame in 470..frames {
            let u = frame as f32 / frames as f32;
            let next = (frame + 1) as f32 / frames as f32;
            if u > 0.995 {
                assert!(curve.u_to_t(u) < 1.0, "u={u} reached the end early");
            }
            let chord = curve.point_at(u).distance(curve.point_at(next));
            assert!((chord - step).abs() < step * 0.1, "frame {frame}: {chord} vs {step}");
        }
        assert_eq!(curve.u_to_t(1.0), 1.0);
    }

    #[test]
    fn centripetal_stays_near_hull_on_uneven_spacing() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 1.0),
            Vec3::new(4.1, 0.0, 1.0),
        ];
        let curve = CatmullRomCurve::centripetal(points).unwrap();
        for step in 0..=50 {
            let p = curve.point(step as f32 / 50.0);
            assert!(p.x > -0.1 && p.x < 4.2, "x overshoot at {step}: {p}");
            assert!(p.z > -0.1 && p.z < 1.1, "z overshoot at {step}: {p}");
        }
    }

    #[test]
    fn tangents_are_unit_length() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        for step in 0..=32 {
            let tangent = curve.tangent_at(step as f32 / 32.0);
            assert!((tangent.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn orientation_aligns_reference_axis() {
        let curve = CatmullRomCurve::centripetal(route()).unwrap();
        for u in [0.0, 0.37, 1.0] {
            let rotated = curve.orientation_at(u, Vec3::X) * Vec3::X;
            assert!(rotated.angle_between(curve.tangent_at(u)) < 1e-3);
        }
    }

    #[test]
    fn coincident_points_do_not_produce_nan() {
        let curve = CatmullRomCurve::centripetal(vec![Vec3::ONE, Vec3::ONE, Vec3::ONE]).unwrap();
        assert_eq!(curve.length(), 0.0);
        assert!(curve.point_at(0.5).is_finite());
        assert!(curve.tangent_at(0.5).is_finite());
    }
}
