//! Celestial coordinates and spherical geometry.
//!
//! Positions are equatorial (RA, Dec) and all internal math runs on 3D unit
//! vectors, which keeps angular separations accurate at the
//! sub-milliarcsecond scales relevant for repeatability statistics and avoids
//! small-angle cancellation in the naive haversine form.

use nalgebra::Vector3;

/// A position on the celestial sphere in equatorial coordinates.
///
/// Angles are stored in radians. RA increases eastward; Dec is positive
/// north of the celestial equator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    /// Right ascension in radians.
    pub ra_rad: f64,
    /// Declination in radians.
    pub dec_rad: f64,
}

impl Equatorial {
    /// Create a position from radians.
    pub fn new(ra_rad: f64, dec_rad: f64) -> Self {
        Self { ra_rad, dec_rad }
    }

    /// Create a position from degrees.
    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra_rad: ra_deg.to_radians(),
            dec_rad: dec_deg.to_radians(),
        }
    }

    /// Unit vector on the celestial sphere for this position.
    pub fn unit_vector(&self) -> Vector3<f64> {
        let cos_dec = self.dec_rad.cos();
        Vector3::new(
            cos_dec * self.ra_rad.cos(),
            cos_dec * self.ra_rad.sin(),
            self.dec_rad.sin(),
        )
    }

    /// Angular separation to another position, in radians.
    ///
    /// Computed as atan2(|a x b|, a . b), which stays accurate for both
    /// very small and near-antipodal separations.
    pub fn separation(&self, other: &Equatorial) -> f64 {
        let a = self.unit_vector();
        let b = other.unit_vector();
        a.cross(&b).norm().atan2(a.dot(&b))
    }

    /// Position angle of the great circle from this position to `other`,
    /// measured east of north, in radians.
    ///
    /// Used to rotate shear components into the frame of the connecting
    /// geodesic. Undefined (returns 0) for coincident points.
    pub fn bearing(&self, other: &Equatorial) -> f64 {
        let d_ra = other.ra_rad - self.ra_rad;
        let y = d_ra.sin() * other.dec_rad.cos();
        let x = self.dec_rad.cos() * other.dec_rad.sin()
            - self.dec_rad.sin() * other.dec_rad.cos() * d_ra.cos();
        if y == 0.0 && x == 0.0 {
            return 0.0;
        }
        y.atan2(x)
    }
}

/// Mean direction of a set of positions.
///
/// Averages the unit vectors and converts back to (RA, Dec). This is the
/// spherical mean, well-behaved near the poles and across the RA wrap,
/// unlike a naive average of the angles.
///
/// Returns `None` for an empty slice or a degenerate (zero-norm) vector sum.
pub fn mean_position(positions: &[Equatorial]) -> Option<Equatorial> {
    if positions.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = positions.iter().map(|p| p.unit_vector()).sum();
    let norm = sum.norm();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    let v = sum / norm;
    Some(Equatorial::new(v.y.atan2(v.x), v.z.asin()))
}

/// RMS angular scatter of positions about their mean direction, in radians.
///
/// A single position (or an empty slice) has zero scatter by definition,
/// matching the repeatability convention that an unrepeated star contributes
/// no positional variance.
pub fn position_rms(positions: &[Equatorial]) -> f64 {
    let Some(center) = mean_position(positions) else {
        return 0.0;
    };
    if positions.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = positions
        .iter()
        .map(|p| {
            let sep = center.separation(p);
            sep * sep
        })
        .sum();
    (sum_sq / positions.len() as f64).sqrt()
}
