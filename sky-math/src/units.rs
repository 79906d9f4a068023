//! Angular unit conversions.
//!
//! The pipeline mixes three natural scales: match radii in arcseconds,
//! correlation separations in arcminutes, and positional scatter reported in
//! milliarcseconds. All internal math is in radians; these helpers keep the
//! conversions in one place.

/// Radians per arcsecond.
pub const RAD_PER_ARCSEC: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Radians per arcminute.
pub const RAD_PER_ARCMIN: f64 = std::f64::consts::PI / (180.0 * 60.0);

/// Convert arcseconds to radians.
pub fn arcsec_to_rad(arcsec: f64) -> f64 {
    arcsec * RAD_PER_ARCSEC
}

/// Convert arcminutes to radians.
pub fn arcmin_to_rad(arcmin: f64) -> f64 {
    arcmin * RAD_PER_ARCMIN
}

/// Convert radians to arcminutes.
pub fn rad_to_arcmin(rad: f64) -> f64 {
    rad / RAD_PER_ARCMIN
}

/// Convert radians to milliarcseconds.
pub fn rad_to_mas(rad: f64) -> f64 {
    rad / RAD_PER_ARCSEC * 1e3
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_arcsec_round_trip() {
        assert_relative_eq!(rad_to_mas(arcsec_to_rad(1.0)), 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_arcmin_round_trip() {
        assert_relative_eq!(rad_to_arcmin(arcmin_to_rad(5.0)), 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_degree_consistency() {
        assert_relative_eq!(
            arcmin_to_rad(60.0),
            1.0_f64.to_radians(),
            max_relative = 1e-14
        );
    }
}
