//! Resona Core - spatialization and smoothing primitives
//!
//! This crate provides the math underneath the Resona audio graph:
//!
//! - [`Vec3`] 3-vector used for listener and source geometry
//! - [`SmoothedValue`] exponential parameter smoothing (de-zippering)
//! - [`DistanceEffect`] distance attenuation (linear/inverse/exponential)
//! - [`ConeEffect`] directional cone attenuation
//! - [`SpatialPanner`] trait with [`EqualPowerPanner`] and [`HrtfPanner`]
//! - [`azimuth_elevation`] / [`doppler_rate`] listener-frame source math
//! - [`ClipShape`] threshold and tanh waveshaping
//!
//! Everything here is allocation-free per sample and safe to call from a
//! real-time audio thread once constructed.
//!
//! ## no_std Support
//!
//! This crate is `no_std` compatible. Use `default-features = false` in your
//! `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! resona-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod clip;
pub mod cone;
pub mod distance;
pub mod equal_power;
pub mod hrtf;
pub mod math;
pub mod panner;
pub mod param;
pub mod spatial;
pub mod vector;

pub use clip::{ClipMode, ClipShape};
pub use cone::ConeEffect;
pub use distance::{DistanceEffect, DistanceModel};
pub use equal_power::EqualPowerPanner;
pub use hrtf::HrtfPanner;
pub use math::{db_to_linear, finite_or, linear_to_db};
pub use panner::{PanInput, SpatialPanner};
pub use param::SmoothedValue;
pub use spatial::{azimuth_elevation, doppler_rate, DOPPLER_RATE_MAX, DOPPLER_RATE_MIN};
pub use vector::Vec3;
