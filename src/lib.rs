//! nimbus3d: temporal reprojection and accumulation for sparse volumetric
//! rendering.
//!
//! Rebuilds a full-resolution render from quarter-resolution per-frame
//! samples. The producer renders one pixel of every 2x2 output block each
//! frame (cycling through a 4-entry Bayer offset table); the engine
//! reprojects the previous frame's accumulated result into the current
//! view and merges it with the fresh samples, damping history under fast
//! camera motion and rejecting it across disocclusions.
//!
//! The engine is an explicit instance owned by the render pipeline's
//! composition root; it is constructed alongside the GPU context and torn
//! down with it.

pub mod camera;
pub mod core;
pub mod error;
pub mod settings;

pub use camera::Camera;
pub use crate::core::temporal::{
    apply_subpixel_offset, bayer_jitter, bayer_offset, sparse_extent, AccumulationTarget,
    CameraMotionTracker, CycleState, EngineState, HistoryViews, SparseFrameTarget,
    TemporalBufferSet, TemporalEngine, TemporalFrameParams, TemporalParams, BAYER_OFFSETS,
    CYCLE_LENGTH,
};
pub use error::{RenderError, RenderResult};
pub use settings::{EnabledListener, SettingsSource, StaticSettings, SubscriptionId};
