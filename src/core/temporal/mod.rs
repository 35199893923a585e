//! Temporal reprojection and accumulation engine.
//!
//! Reconstructs a full-resolution volumetric render from sparse
//! quarter-resolution per-frame samples. Each frame the producer renders
//! one pixel of every 2x2 output block, stepping through a fixed 4-entry
//! Bayer cycle; this engine reprojects last frame's accumulated result
//! into the new view and merges the two, so full pixel coverage converges
//! over 4 consecutive frames.
//!
//! Per frame: `begin_frame` (camera capture) -> producer renders into the
//! sparse target -> `resolve` (reprojection, then reconstruction) ->
//! `end_frame` (buffer swap + cycle step).

pub mod buffers;
pub mod cycle;
pub mod motion;
pub mod params;
pub mod reconstruct;
pub mod reproject;

pub use buffers::{
    sparse_extent, AccumulationTarget, ReprojectionScratch, SparseFrameTarget, TemporalBufferSet,
};
pub use cycle::{
    apply_subpixel_offset, bayer_jitter, bayer_offset, CycleState, BAYER_OFFSETS, CYCLE_LENGTH,
};
pub use motion::CameraMotionTracker;
pub use params::{TemporalFrameParams, TemporalParams};
pub use reconstruct::ReconstructionPass;
pub use reproject::ReprojectionPass;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Mat4;
use wgpu::{CommandEncoder, Device, Queue, TextureView};

use crate::camera::Camera;
use crate::error::RenderResult;
use crate::settings::{SettingsSource, SubscriptionId};

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, no buffers allocated yet.
    Uninitialized,
    /// Buffers live, history not yet valid (fresh initialize or invalidate).
    Accumulating,
    /// A full Bayer cycle has completed; history is valid.
    Valid,
    /// Disposed; every method is a no-op from here on.
    Disposed,
}

/// Previous-frame color and position views for consumers that sample
/// history. Only obtainable while history is valid.
pub struct HistoryViews<'a> {
    pub color: &'a TextureView,
    pub position: &'a TextureView,
}

/// Per-frame camera matrices, mutated in place every frame.
#[derive(Debug, Clone, Copy)]
struct CameraFrameState {
    current_view_proj: Mat4,
    prev_view_proj: Mat4,
}

impl CameraFrameState {
    fn new() -> Self {
        Self {
            current_view_proj: Mat4::IDENTITY,
            prev_view_proj: Mat4::IDENTITY,
        }
    }
}

/// Stateful orchestrator for the temporal reprojection pipeline.
///
/// Owned by the render-pipeline composition root and passed by reference
/// to the stages that need it; there is no ambient global instance.
pub struct TemporalEngine {
    settings: Arc<dyn SettingsSource>,
    params: TemporalParams,
    state: EngineState,
    cycle: CycleState,
    buffers: Option<TemporalBufferSet>,
    reproject: Option<ReprojectionPass>,
    reconstruct: Option<ReconstructionPass>,
    motion: CameraMotionTracker,
    camera_state: CameraFrameState,
    /// Cached enabled flag, pushed by the settings subscription so the
    /// per-frame path never polls the provider.
    enabled: Arc<AtomicBool>,
    was_enabled: bool,
    subscription: Option<SubscriptionId>,
}

impl TemporalEngine {
    pub fn new(settings: Arc<dyn SettingsSource>, params: TemporalParams) -> Self {
        let enabled = Arc::new(AtomicBool::new(settings.temporal_enabled()));
        let was_enabled = enabled.load(Ordering::SeqCst);
        Self {
            settings,
            motion: CameraMotionTracker::new(params.rotation_damping, params.position_damping),
            params,
            state: EngineState::Uninitialized,
            cycle: CycleState::new(),
            buffers: None,
            reproject: None,
            reconstruct: None,
            camera_state: CameraFrameState::new(),
            enabled,
            was_enabled,
            subscription: None,
        }
    }

    /// Allocate (or reallocate) all buffers for the given output resolution.
    ///
    /// Idempotent when the size is unchanged: buffer identities and the
    /// cycle state are untouched. A size change disposes and reallocates
    /// everything and restarts the accumulation cycle.
    pub fn initialize(
        &mut self,
        device: &Device,
        queue: &Queue,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if self.state == EngineState::Disposed {
            return Ok(());
        }

        if self.subscription.is_none() {
            let flag = Arc::clone(&self.enabled);
            flag.store(self.settings.temporal_enabled(), Ordering::SeqCst);
            self.was_enabled = flag.load(Ordering::SeqCst);
            self.subscription = Some(self.settings.subscribe(Box::new(move |value| {
                flag.store(value, Ordering::SeqCst);
            })));
        }

        if self.reproject.is_none() {
            self.reproject = Some(ReprojectionPass::new(device)?);
        }
        if self.reconstruct.is_none() {
            self.reconstruct = Some(ReconstructionPass::new(device)?);
        }

        if let Some(buffers) = &self.buffers {
            if buffers.matches(width, height) {
                return Ok(());
            }
            log::info!(
                "temporal resize {}x{} -> {}x{}, restarting accumulation",
                buffers.width(),
                buffers.height(),
                width,
                height
            );
        }

        self.buffers = Some(TemporalBufferSet::new(device, queue, width, height)?);
        self.cycle = CycleState::new();
        self.motion.reset();
        self.camera_state = CameraFrameState::new();
        self.state = EngineState::Accumulating;
        Ok(())
    }

    /// Capture this frame's camera state. Pure staging: no buffer mutation.
    ///
    /// Also the point where a disabled -> enabled settings transition is
    /// observed; stale history from before the disable is dropped then.
    pub fn begin_frame(&mut self, camera: &Camera) {
        if self.state == EngineState::Disposed || self.state == EngineState::Uninitialized {
            return;
        }

        let enabled = self.enabled.load(Ordering::SeqCst);
        if enabled && !self.was_enabled {
            log::debug!("temporal re-enabled, dropping history");
            self.invalidate();
        }
        self.was_enabled = enabled;
        if !enabled {
            return;
        }

        self.camera_state.current_view_proj = camera.view_proj();
        self.motion.update(camera.world_transform(), camera.position);
    }

    /// Record this frame's reprojection and reconstruction dispatches.
    ///
    /// Reprojection runs first and reconstruction second, by direct
    /// sequential invocation; reconstruction reads reprojection's output.
    /// When history is invalid the reprojection stage is skipped entirely
    /// and reconstruction falls back to spatial interpolation.
    pub fn resolve(&mut self, device: &Device, queue: &Queue, encoder: &mut CommandEncoder) {
        if self.state == EngineState::Disposed || self.state == EngineState::Uninitialized {
            return;
        }
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let (Some(buffers), Some(reproject), Some(reconstruct)) = (
            self.buffers.as_ref(),
            self.reproject.as_mut(),
            self.reconstruct.as_mut(),
        ) else {
            return;
        };

        let has_valid_history = self.cycle.is_valid;
        let full_resolution = (buffers.width(), buffers.height());
        let read_target = buffers.read_target(self.cycle.buffer_index);

        if has_valid_history {
            reproject.execute(
                device,
                queue,
                encoder,
                &read_target.color_view,
                &read_target.position_view,
                &buffers.sparse().position_view,
                buffers.scratch(),
                self.camera_state.prev_view_proj,
                full_resolution,
                buffers.sparse_resolution(),
                self.cycle.offset(),
                self.cycle.frame_index,
                self.params.disocclusion_threshold,
            );
        } else {
            log::debug!("temporal history invalid, skipping reprojection");
        }

        reconstruct.execute(
            device,
            queue,
            encoder,
            buffers.sparse(),
            buffers.scratch(),
            &read_target.position_view,
            buffers.write_target(self.cycle.buffer_index),
            full_resolution,
            self.cycle.offset(),
            self.cycle.frame_index,
            has_valid_history,
            self.motion.effective_history_weight(self.params.base_history_weight),
            self.params.validity_threshold,
        );
    }

    /// Finish the frame: swap accumulation buffers and step the Bayer cycle.
    pub fn end_frame(&mut self) {
        if self.state == EngineState::Disposed || self.state == EngineState::Uninitialized {
            return;
        }
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }

        self.camera_state.prev_view_proj = self.camera_state.current_view_proj;
        self.cycle.advance();
        if self.cycle.is_valid {
            self.state = EngineState::Valid;
        }
    }

    /// Drop history validity and restart the Bayer cycle.
    ///
    /// Buffer contents are not cleared; stale data stays physically present
    /// but is never read as history. Callers must invoke this on camera
    /// teleport, field-of-view change, or any other discontinuous view
    /// change; the engine does not detect discontinuity on its own.
    pub fn invalidate(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        log::debug!("temporal history invalidated");
        self.cycle.invalidate();
        self.motion.reset();
        if self.state == EngineState::Valid {
            self.state = EngineState::Accumulating;
        }
    }

    /// Release all GPU resources and unregister the settings listener.
    /// Safe to call multiple times; every other method becomes a no-op.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        if let Some(id) = self.subscription.take() {
            self.settings.unsubscribe(id);
        }
        self.buffers = None;
        self.reproject = None;
        self.reconstruct = None;
        self.state = EngineState::Disposed;
        log::info!("temporal engine disposed");
    }

    // ---------- consumer surface ----------

    /// Sparse-resolution target the volumetric producer must render into
    /// this frame. None before initialize and after dispose.
    pub fn cloud_render_target(&self) -> Option<&SparseFrameTarget> {
        self.buffers.as_ref().map(|buffers| buffers.sparse())
    }

    /// Parameter bundle for the producer and the lighting pass.
    pub fn frame_params(&self) -> Option<TemporalFrameParams> {
        let buffers = self.buffers.as_ref()?;
        Some(TemporalFrameParams {
            enabled: self.enabled.load(Ordering::SeqCst),
            frame_index: self.cycle.frame_index,
            bayer_offset: self.cycle.offset(),
            full_resolution: (buffers.width(), buffers.height()),
            sparse_resolution: buffers.sparse_resolution(),
            has_valid_history: self.cycle.is_valid,
        })
    }

    /// Previous-frame color and position views, None until a full cycle
    /// has completed. Consumers must not sample history while this is None.
    pub fn history(&self) -> Option<HistoryViews<'_>> {
        if !self.cycle.is_valid {
            return None;
        }
        let buffers = self.buffers.as_ref()?;
        let read_target = buffers.read_target(self.cycle.buffer_index);
        Some(HistoryViews {
            color: &read_target.color_view,
            position: &read_target.position_view,
        })
    }

    /// Accumulation buffer written this frame.
    pub fn write_target(&self) -> Option<&AccumulationTarget> {
        self.buffers
            .as_ref()
            .map(|buffers| buffers.write_target(self.cycle.buffer_index))
    }

    /// Accumulation buffer holding last frame's result.
    pub fn read_target(&self) -> Option<&AccumulationTarget> {
        self.buffers
            .as_ref()
            .map(|buffers| buffers.read_target(self.cycle.buffer_index))
    }

    // ---------- state accessors / tuning ----------

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_valid(&self) -> bool {
        self.cycle.is_valid
    }

    pub fn frame_index(&self) -> u32 {
        self.cycle.frame_index
    }

    pub fn buffer_index(&self) -> usize {
        self.cycle.buffer_index
    }

    pub fn params(&self) -> &TemporalParams {
        &self.params
    }

    /// Set the base history blend factor, clamped to [0, 0.99].
    pub fn set_base_history_weight(&mut self, weight: f32) {
        self.params.base_history_weight = weight.clamp(0.0, 0.99);
    }

    /// Most recent camera motion factor (1 = still camera).
    pub fn motion_factor(&self) -> f32 {
        self.motion.motion_factor()
    }
}
