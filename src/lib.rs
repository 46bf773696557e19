//! Human detection pipeline.
//!
//! Locates humans in still images and video frames by running one of
//! several interchangeable detection backends over each frame, filtering
//! weak detections by confidence inside the backend, and merging
//! overlapping boxes from the same object before annotation.
//!
//! # Module structure
//!
//! - [`geometry`]: shared value types ([`BoundingBox`], [`Detection`])
//! - [`frame`]: the RGB raster type and its conversions
//! - [`detect`]: the [`Detector`] contract and its three backends
//! - [`suppress`]: confidence-agnostic overlap merging
//! - [`pipeline`]: per-frame orchestration ([`FrameProcessor`])
//! - [`stream`]: video runs over a bounded frame range
//! - [`video`]: frame sources and sinks
//! - [`config`]: JSON run configuration with defaults
//!
//! A detector is built once per run from configuration, reused for every
//! frame, and released after the last one; the region-proposal backend
//! holds a native inference session that this release frees.

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod stream;
pub mod suppress;
pub mod video;

pub use annotate::BoxStyle;
pub use config::RunConfig;
pub use detect::{build_detector, BackendKind, Detector, DetectorConfig, ScanParams};
pub use error::DetectError;
pub use frame::Frame;
pub use geometry::{BoundingBox, Detection};
pub use pipeline::FrameProcessor;
pub use stream::{FrameRange, StreamController, StreamSummary};
