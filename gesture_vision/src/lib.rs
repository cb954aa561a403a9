// THEORY:
// This file is the main entry point for the `gesture_vision` library crate.
// It exposes the `GesturePipeline` and its configuration and report types as
// the high-level interface of the engine. A capture loop hands it one frame at
// a time and renders the returned `FrameReport`; it never needs to touch the
// background model, segmenter or hand tracker directly.
//
// The `core_modules` stay public so tools and tests can drive individual
// stages (segmenting a synthetic mask, counting fingers on a hand-made
// silhouette) without going through the whole pipeline.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::{ConfigError, HeuristicConfig, PipelineConfig, Region};
pub use core_modules::gesture::{Gesture, GestureLabel};
pub use core_modules::hand_state::{Extremities, HandState};
pub use core_modules::segmenter::{Segmentation, Silhouette};
pub use error::PipelineError;
pub use pipeline::{FrameReport, GesturePipeline, Phase};
