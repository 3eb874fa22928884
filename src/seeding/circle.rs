//! Three-point circle through transverse hit positions

use crate::common::constants::DEGENERATE_CIRCLE_EPSILON;
use nalgebra::{Matrix3, Point2, Vector2};
use thiserror::Error;

/// The three points do not define a circle.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("degenerate circle: points are collinear or coincide (determinant {determinant:e})")]
pub struct DegenerateCircle {
    /// Coefficient determinant that failed the threshold
    pub determinant: f64,
}

/// Circle in the transverse plane with an orientation of travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point2<f64>,
    pub radius: f64,
    /// `+1` if the points are traversed counter-clockwise, `-1` otherwise
    pub orientation: f64,
}

impl Circle {
    /// Signed curvature, positive for counter-clockwise travel.
    #[inline]
    pub fn curvature(&self) -> f64 {
        self.orientation / self.radius
    }

    /// Distance of closest approach to the origin.
    pub fn dca(&self) -> f64 {
        (self.center.coords.norm() - self.radius).abs()
    }

    /// Point of the circle nearest the origin.
    ///
    /// Any point is nearest when the circle is centred on the origin; the
    /// one on the +x axis is returned.
    pub fn closest_approach(&self) -> Point2<f64> {
        let outward = self
            .center
            .coords
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector2::x);
        self.center - outward * self.radius
    }

    /// Unit tangent at `point` in the direction of travel.
    pub fn tangent_at(&self, point: &Point2<f64>) -> Vector2<f64> {
        let u = (point - self.center) / self.radius;
        Vector2::new(-u.y, u.x) * self.orientation
    }

    /// Arc length along the direction of travel from `from` to `to`,
    /// taking the short way round.
    pub fn arc_length(&self, from: &Point2<f64>, to: &Point2<f64>) -> f64 {
        let chord = (to - from).norm();
        let half = (chord / (2.0 * self.radius)).min(1.0);
        2.0 * self.radius * half.asin()
    }
}

/// Fit a circle through three points in travel order.
///
/// The points are translated so that `p1` sits at the origin, then the
/// centre follows from Cramer's rule on
///
/// ```text
/// | x  y  1 |
/// | x2 y2 1 |  with  s = x² + y²
/// | x3 y3 1 |
/// ```
///
/// The fit fails when `|det| <= ε·|p2 - p1|·|p3 - p1|`, i.e. when the
/// points are collinear to within a relative tolerance or two coincide.
pub fn fit_circle(p1: &Point2<f64>, p2: &Point2<f64>, p3: &Point2<f64>) -> Result<Circle, DegenerateCircle> {
    let a = p2 - p1;
    let b = p3 - p1;
    let sa = a.norm_squared();
    let sb = b.norm_squared();

    #[rustfmt::skip]
    let m = Matrix3::new(
        0.0, 0.0, 1.0,
        a.x, a.y, 1.0,
        b.x, b.y, 1.0,
    );
    let det = m.determinant();
    let scale = sa.sqrt() * sb.sqrt();
    if !det.is_finite() || scale == 0.0 || det.abs() <= DEGENERATE_CIRCLE_EPSILON * scale {
        return Err(DegenerateCircle { determinant: det });
    }

    #[rustfmt::skip]
    let mx = Matrix3::new(
        0.0, 0.0, 1.0,
        sa,  a.y, 1.0,
        sb,  b.y, 1.0,
    );
    #[rustfmt::skip]
    let my = Matrix3::new(
        0.0, 0.0, 1.0,
        a.x, sa,  1.0,
        b.x, sb,  1.0,
    );
    let offset = Vector2::new(mx.determinant(), my.determinant()) / (2.0 * det);
    let center = p1 + offset;

    // Travel direction p1 → p2 → p3
    let turn = (p2 - p1).perp(&(p3 - p2));
    Ok(Circle {
        center,
        radius: offset.norm(),
        orientation: if turn >= 0.0 { 1.0 } else { -1.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn on_circle(cx: f64, cy: f64, r: f64, angle: f64) -> Point2<f64> {
        Point2::new(cx + r * angle.cos(), cy + r * angle.sin())
    }

    #[test]
    fn test_recovers_known_circle() {
        let (cx, cy, r) = (120.0, -340.0, 512.5);
        let p1 = on_circle(cx, cy, r, 0.3);
        let p2 = on_circle(cx, cy, r, 1.1);
        let p3 = on_circle(cx, cy, r, 2.4);

        let c = fit_circle(&p1, &p2, &p3).unwrap();
        assert!((c.center.x - cx).abs() < 1e-9);
        assert!((c.center.y - cy).abs() < 1e-9);
        assert!((c.radius - r).abs() < 1e-9);
        assert_eq!(c.orientation, 1.0);
    }

    #[test]
    fn test_clockwise_orientation() {
        let p1 = on_circle(0.0, 0.0, 10.0, PI / 2.0);
        let p2 = on_circle(0.0, 0.0, 10.0, 0.0);
        let p3 = on_circle(0.0, 0.0, 10.0, -PI / 2.0);
        let c = fit_circle(&p1, &p2, &p3).unwrap();
        assert_eq!(c.orientation, -1.0);
        assert!(c.curvature() < 0.0);
        // tangent at the top points along +x when moving clockwise
        let t = c.tangent_at(&p1);
        assert!((t.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let p1 = Point2::new(0.0, 0.0);
        let p2 = Point2::new(1.0, 2.0);
        let p3 = Point2::new(3.0, 6.0);
        assert!(fit_circle(&p1, &p2, &p3).is_err());

        // collinear up to rounding
        let q1 = Point2::new(30.0 * 0.2f64.cos(), 30.0 * 0.2f64.sin());
        let q2 = Point2::new(60.0 * 0.2f64.cos(), 60.0 * 0.2f64.sin());
        let q3 = Point2::new(90.0 * 0.2f64.cos(), 90.0 * 0.2f64.sin());
        assert!(fit_circle(&q1, &q2, &q3).is_err());
    }

    #[test]
    fn test_coincident_points_are_degenerate() {
        let p = Point2::new(5.0, 5.0);
        assert!(fit_circle(&p, &p, &Point2::new(1.0, 0.0)).is_err());
    }

    #[test]
    fn test_dca_and_arc_length() {
        // circle through the origin
        let c = fit_circle(&Point2::origin(), &Point2::new(10.0, 10.0), &Point2::new(20.0, 0.0)).unwrap();
        assert!(c.dca() < 1e-12);
        assert!((c.radius - 10.0).abs() < 1e-12);
        let quarter = c.arc_length(&Point2::origin(), &Point2::new(10.0, 10.0));
        assert!((quarter - 10.0 * PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_closest_approach() {
        let outside = Circle {
            center: Point2::new(0.0, 50.0),
            radius: 40.0,
            orientation: 1.0,
        };
        let p = outside.closest_approach();
        assert!((p - Point2::new(0.0, 10.0)).norm() < 1e-12);
        assert!((p.coords.norm() - outside.dca()).abs() < 1e-12);

        // origin inside the circle
        let around = Circle {
            center: Point2::new(10.0, 0.0),
            radius: 40.0,
            orientation: -1.0,
        };
        let p = around.closest_approach();
        assert!((p - Point2::new(-30.0, 0.0)).norm() < 1e-12);
        assert!(((p - around.center).norm() - around.radius).abs() < 1e-12);
        assert!((p.coords.norm() - around.dca()).abs() < 1e-12);
    }
}
