//! sky-math - Mathematical foundations for multi-visit catalog analysis
//!
//! This crate provides the numeric building blocks used by the matched-visit
//! repeatability pipeline:
//!
//! - **Statistics** - NaN-aware robust statistics (median, mean, standard
//!   deviation) that fail explicitly instead of returning silent NaN
//! - **Sphere** - celestial coordinates, angular separations, bearings, and
//!   positional scatter on the unit sphere
//! - **Ellipticity** - source and PSF ellipticity from second-moment shape
//!   matrices
//!
//! # Example
//!
//! ```
//! use sky_math::{Equatorial, ellipticity_from_moments};
//!
//! let a = Equatorial::from_degrees(150.0, 2.0);
//! let b = Equatorial::from_degrees(150.0, 2.001);
//! let sep_mas = a.separation(&b).to_degrees() * 3600e3;
//! assert!((sep_mas - 3600.0).abs() < 1.0);
//!
//! // A circular source has zero ellipticity.
//! let e = ellipticity_from_moments(1.5, 1.5, 0.0);
//! assert_eq!(e.e1, 0.0);
//! assert_eq!(e.e2, 0.0);
//! ```

pub mod ellipticity;
pub mod sphere;
pub mod stats;
pub mod units;

pub use ellipticity::{ellipticity_from_moments, EllipticityComponents, SecondMoments};
pub use sphere::{mean_position, position_rms, Equatorial};
pub use stats::{mean, median, std_dev, StatsError};
