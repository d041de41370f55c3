//! Radial lens-distortion model and its inversion.
//!
//! Data flow, leaf first:
//! - [`DistortionConfig`]: validated coefficients; `scale`/`chroma_scale`
//!   evaluate the model
//! - [`CoordinateMapper`]: texture / screen / rift space conversions per eye
//! - [`RadiusInverter`]: bisection inverse used to pre-displace mesh vertices
//!
//! [`HmdProfile`] derives a config from physical device data.
//!
//! Everything here is double precision and free of side effects apart from a
//! debug-build diagnostic when bisection fails to converge.

mod config;
mod error;
mod eye;
mod inverter;
mod mapper;
mod model;
mod profile;

pub use config::{Channel, ChromaK, ChromaMode, DistortionConfig};
pub use error::DistortionError;
pub use eye::Eye;
pub use inverter::{InverterSettings, Inversion, RadiusInverter};
pub use mapper::CoordinateMapper;
pub use profile::{HmdProfile, ProfileFit};
