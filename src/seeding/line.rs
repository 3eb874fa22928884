//! Weighted slope-intercept fit of z against transverse arc length

/// Result of a straight-line fit `z(s) = intercept + slope·s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_variance: f64,
    pub slope_variance: f64,
    pub covariance: f64,
    pub chisq: f64,
}

impl LineFit {
    /// Fitted z at arc length `s`.
    #[inline]
    pub fn z_at(&self, s: f64) -> f64 {
        self.intercept + self.slope * s
    }

    /// Variance of the fitted z at arc length `s`.
    pub fn z_variance_at(&self, s: f64) -> f64 {
        self.intercept_variance + s * s * self.slope_variance + 2.0 * s * self.covariance
    }

    /// Covariance between the fitted z at `s` and the slope.
    pub fn z_slope_covariance_at(&self, s: f64) -> f64 {
        self.covariance + s * self.slope_variance
    }
}

/// Least-squares line through `(s, z, σz²)` points.
///
/// Returns `None` for fewer than two points, a non-positive variance, or
/// when all points share the same `s`.
pub fn fit_line(points: &[(f64, f64, f64)]) -> Option<LineFit> {
    if points.len() < 2 {
        return None;
    }
    let (mut sw, mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(s, z, var) in points {
        if !(var > 0.0) {
            return None;
        }
        let w = 1.0 / var;
        sw += w;
        sx += w * s;
        sy += w * z;
        sxx += w * s * s;
        sxy += w * s * z;
    }
    let det = sw * sxx - sx * sx;
    if !(det.abs() > f64::EPSILON * sw * sxx) {
        return None;
    }

    let intercept = (sxx * sy - sx * sxy) / det;
    let slope = (sw * sxy - sx * sy) / det;
    let chisq = points
        .iter()
        .map(|&(s, z, var)| (z - intercept - slope * s).powi(2) / var)
        .sum();

    Some(LineFit {
        intercept,
        slope,
        intercept_variance: sxx / det,
        slope_variance: sw / det,
        covariance: -sx / det,
        chisq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line() {
        let points = [(0.0, 1.0, 0.01), (30.0, 4.0, 0.01), (60.0, 7.0, 0.01)];
        let fit = fit_line(&points).unwrap();
        assert!((fit.slope - 0.1).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!(fit.chisq < 1e-18);
        assert!((fit.z_at(90.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_two_points_variances() {
        // z = a + b s through s = 0 and s = 10 with unit variance
        let fit = fit_line(&[(0.0, 0.0, 1.0), (10.0, 5.0, 1.0)]).unwrap();
        assert!((fit.slope - 0.5).abs() < 1e-12);
        assert!((fit.intercept_variance - 1.0).abs() < 1e-12);
        assert!((fit.slope_variance - 0.02).abs() < 1e-12);
        assert!((fit.covariance + 0.1).abs() < 1e-12);
        // at the second point the variance is just that point's
        assert!((fit.z_variance_at(10.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_pull_towards_precise_points() {
        let fit = fit_line(&[(0.0, 0.0, 1e-4), (10.0, 1.0, 1e-4), (20.0, 5.0, 100.0)]).unwrap();
        assert!((fit.slope - 0.1).abs() < 1e-3);
        assert!(fit.chisq > 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(fit_line(&[(1.0, 1.0, 1.0)]).is_none());
        assert!(fit_line(&[(5.0, 1.0, 1.0), (5.0, 2.0, 1.0)]).is_none());
        assert!(fit_line(&[(0.0, 1.0, 0.0), (5.0, 2.0, 1.0)]).is_none());
    }
}
