//! Human detection backends.
//!
//! Three interchangeable backends sit behind the [`Detector`] trait:
//! a gradient-descriptor scan ([`hog`]), a cascade classifier
//! ([`cascade`]) and a region-proposal network ([`rcnn`], feature
//! `backend-tract`). A backend is selected once, at construction, from
//! configuration; callers treat all of them identically.

pub mod cascade;
mod detector;
pub mod hog;
mod scan;
#[cfg(feature = "backend-tract")]
pub mod rcnn;

pub use cascade::CascadeDetector;
pub use detector::{build_detector, BackendKind, Detector, DetectorConfig, ScanParams};
pub use hog::HogDetector;
#[cfg(feature = "backend-tract")]
pub use rcnn::RcnnDetector;
