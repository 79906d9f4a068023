//! Ellipticity from second-moment shape matrices.
//!
//! Both measured source shapes and evaluated PSF model shapes are described
//! by the adaptive second moments (Ixx, Iyy, Ixy). The distortion-style
//! ellipticity components derived here feed the PSF residual correlation
//! measurement.

/// Second-moment shape matrix of a source or PSF evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondMoments {
    /// Second central moment along x.
    pub ixx: f64,
    /// Second central moment along y.
    pub iyy: f64,
    /// Cross moment.
    pub ixy: f64,
}

impl SecondMoments {
    /// Create a shape matrix from its three independent components.
    pub fn new(ixx: f64, iyy: f64, ixy: f64) -> Self {
        Self { ixx, iyy, ixy }
    }

    /// Ellipticity components of this shape.
    pub fn ellipticity(&self) -> EllipticityComponents {
        ellipticity_from_moments(self.ixx, self.iyy, self.ixy)
    }
}

/// Distortion-style ellipticity of a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipticityComponents {
    /// Ellipticity magnitude sqrt(e1^2 + e2^2).
    pub e: f64,
    /// First component, (Ixx - Iyy) / (Ixx + Iyy).
    pub e1: f64,
    /// Second component, 2 Ixy / (Ixx + Iyy).
    pub e2: f64,
}

/// Compute distortion ellipticity from second moments.
///
/// e1 = (Ixx - Iyy) / (Ixx + Iyy), e2 = 2 Ixy / (Ixx + Iyy),
/// e = sqrt(e1^2 + e2^2).
///
/// A degenerate shape (non-positive or non-finite trace) yields NaN
/// components. Downstream quality filters treat NaN as "not computable" and
/// drop the record, so no panic or error type is needed here.
pub fn ellipticity_from_moments(ixx: f64, iyy: f64, ixy: f64) -> EllipticityComponents {
    let trace = ixx + iyy;
    if !(trace > 0.0) || !trace.is_finite() {
        return EllipticityComponents {
            e: f64::NAN,
            e1: f64::NAN,
            e2: f64::NAN,
        };
    }
    let e1 = (ixx - iyy) / trace;
    let e2 = 2.0 * ixy / trace;
    EllipticityComponents {
        e: (e1 * e1 + e2 * e2).sqrt(),
        e1,
        e2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circular_source_has_zero_ellipticity() {
        let e = ellipticity_from_moments(1.5, 1.5, 0.0);
        assert_eq!(e.e1, 0.0);
        assert_eq!(e.e2, 0.0);
        assert_eq!(e.e, 0.0);
    }

    #[test]
    fn test_known_elongation() {
        // Ixx=2, Iyy=1, Ixy=0 gives e1 = 1/3, e2 = 0.
        let e = ellipticity_from_moments(2.0, 1.0, 0.0);
        assert_relative_eq!(e.e1, 1.0 / 3.0, max_relative = 1e-15);
        assert_eq!(e.e2, 0.0);
        assert_relative_eq!(e.e, 1.0 / 3.0, max_relative = 1e-15);
    }

    #[test]
    fn test_cross_term_only() {
        let e = ellipticity_from_moments(1.0, 1.0, 0.5);
        assert_eq!(e.e1, 0.0);
        assert_relative_eq!(e.e2, 0.5, max_relative = 1e-15);
    }

    #[test]
    fn test_magnitude_combines_components() {
        let e = ellipticity_from_moments(2.0, 1.0, 0.75);
        assert_relative_eq!(e.e, (e.e1 * e.e1 + e.e2 * e.e2).sqrt(), max_relative = 1e-15);
    }

    #[test]
    fn test_degenerate_trace_is_nan() {
        assert!(ellipticity_from_moments(0.0, 0.0, 0.0).e1.is_nan());
        assert!(ellipticity_from_moments(-1.0, 0.5, 0.0).e2.is_nan());
        assert!(ellipticity_from_moments(f64::NAN, 1.0, 0.0).e.is_nan());
    }

    #[test]
    fn test_second_moments_helper() {
        let shape = SecondMoments::new(2.0, 1.0, 0.0);
        let e = shape.ellipticity();
        assert_relative_eq!(e.e1, 1.0 / 3.0, max_relative = 1e-15);
    }
}
