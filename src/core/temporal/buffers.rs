//! Image buffer ownership for the temporal engine.
//!
//! Pure resource lifecycle: allocation, size matching, and ping-pong
//! accessors. No algorithmic logic lives here.

use wgpu::{
    Color, CommandEncoder, Device, Extent3d, LoadOp, Operations, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Texture, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::error::{RenderError, RenderResult};

/// HDR color format for accumulation history (matches the resolve output).
pub const ACCUM_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// World position + weight; full float precision so positions survive
/// repeated reprojection without drifting.
pub const ACCUM_POSITION_FORMAT: TextureFormat = TextureFormat::Rgba32Float;
/// Sparse frame color/normal channels.
pub const SPARSE_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const SPARSE_NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const SPARSE_POSITION_FORMAT: TextureFormat = TextureFormat::Rgba32Float;
/// Per-pixel reprojection validity scalar (storage-writable).
pub const VALIDITY_FORMAT: TextureFormat = TextureFormat::R32Float;

/// Sparse render resolution for a full-resolution output: one sparse pixel
/// per 2x2 output block, minimum 1 on each axis.
#[inline]
pub fn sparse_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

fn create_texture(
    device: &Device,
    label: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsages,
) -> (Texture, TextureView) {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&TextureViewDescriptor::default());
    (texture, view)
}

/// One accumulation target: HDR color plus world position + weight.
/// The engine owns exactly two of these and ping-pongs between them.
pub struct AccumulationTarget {
    pub color: Texture,
    pub color_view: TextureView,
    pub position: Texture,
    pub position_view: TextureView,
}

impl AccumulationTarget {
    fn new(device: &Device, width: u32, height: u32, index: usize) -> Self {
        let usage = TextureUsages::TEXTURE_BINDING
            | TextureUsages::STORAGE_BINDING
            | TextureUsages::RENDER_ATTACHMENT;
        let (color, color_view) = create_texture(
            device,
            &format!("temporal.accum.color.{}", index),
            width,
            height,
            ACCUM_COLOR_FORMAT,
            usage,
        );
        let (position, position_view) = create_texture(
            device,
            &format!("temporal.accum.position.{}", index),
            width,
            height,
            ACCUM_POSITION_FORMAT,
            usage,
        );
        Self {
            color,
            color_view,
            position,
            position_view,
        }
    }
}

/// Quarter-resolution target the volumetric producer renders into each
/// frame: color, normal, and world position for the frame's pixel subset.
pub struct SparseFrameTarget {
    pub color: Texture,
    pub color_view: TextureView,
    pub normal: Texture,
    pub normal_view: TextureView,
    pub position: Texture,
    pub position_view: TextureView,
    width: u32,
    height: u32,
}

impl SparseFrameTarget {
    fn new(device: &Device, width: u32, height: u32) -> Self {
        let usage = TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING;
        let (color, color_view) = create_texture(
            device,
            "temporal.sparse.color",
            width,
            height,
            SPARSE_COLOR_FORMAT,
            usage,
        );
        let (normal, normal_view) = create_texture(
            device,
            "temporal.sparse.normal",
            width,
            height,
            SPARSE_NORMAL_FORMAT,
            usage,
        );
        let (position, position_view) = create_texture(
            device,
            "temporal.sparse.position",
            width,
            height,
            SPARSE_POSITION_FORMAT,
            usage,
        );
        Self {
            color,
            color_view,
            normal,
            normal_view,
            position,
            position_view,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Full-resolution scratch written by reprojection and read by
/// reconstruction within the same frame. Never persisted across frames.
pub struct ReprojectionScratch {
    pub color: Texture,
    pub color_view: TextureView,
    pub validity: Texture,
    pub validity_view: TextureView,
}

impl ReprojectionScratch {
    fn new(device: &Device, width: u32, height: u32) -> Self {
        let usage = TextureUsages::TEXTURE_BINDING
            | TextureUsages::STORAGE_BINDING
            | TextureUsages::RENDER_ATTACHMENT;
        let (color, color_view) = create_texture(
            device,
            "temporal.scratch.color",
            width,
            height,
            ACCUM_COLOR_FORMAT,
            usage,
        );
        let (validity, validity_view) = create_texture(
            device,
            "temporal.scratch.validity",
            width,
            height,
            VALIDITY_FORMAT,
            usage,
        );
        Self {
            color,
            color_view,
            validity,
            validity_view,
        }
    }
}

/// Owns every image buffer the temporal engine uses.
pub struct TemporalBufferSet {
    accumulation: [AccumulationTarget; 2],
    sparse: SparseFrameTarget,
    scratch: ReprojectionScratch,
    width: u32,
    height: u32,
}

impl TemporalBufferSet {
    /// Allocate all buffers for the given output resolution and clear them
    /// to transparent zero. Submits one small command buffer for the clear.
    pub fn new(device: &Device, queue: &Queue, width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::render(format!(
                "Invalid temporal target size {}x{}",
                width, height
            )));
        }

        let (sparse_width, sparse_height) = sparse_extent(width, height);
        let set = Self {
            accumulation: [
                AccumulationTarget::new(device, width, height, 0),
                AccumulationTarget::new(device, width, height, 1),
            ],
            sparse: SparseFrameTarget::new(device, sparse_width, sparse_height),
            scratch: ReprojectionScratch::new(device, width, height),
            width,
            height,
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("temporal.buffers.clear"),
        });
        set.clear(&mut encoder);
        queue.submit(Some(encoder.finish()));

        log::info!(
            "temporal buffers allocated: {}x{} full, {}x{} sparse",
            width,
            height,
            sparse_width,
            sparse_height
        );
        Ok(set)
    }

    /// Whether the allocated buffers already match the requested resolution.
    #[inline]
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sparse_resolution(&self) -> (u32, u32) {
        (self.sparse.width, self.sparse.height)
    }

    /// Accumulation buffer written this frame.
    #[inline]
    pub fn write_target(&self, buffer_index: usize) -> &AccumulationTarget {
        &self.accumulation[buffer_index]
    }

    /// Accumulation buffer holding last frame's result.
    #[inline]
    pub fn read_target(&self, buffer_index: usize) -> &AccumulationTarget {
        &self.accumulation[1 - buffer_index]
    }

    pub fn sparse(&self) -> &SparseFrameTarget {
        &self.sparse
    }

    pub fn scratch(&self) -> &ReprojectionScratch {
        &self.scratch
    }

    /// Record clears for every owned texture.
    fn clear(&self, encoder: &mut CommandEncoder) {
        for target in &self.accumulation {
            clear_pass(
                encoder,
                "temporal.clear.accum",
                &[&target.color_view, &target.position_view],
            );
        }
        clear_pass(
            encoder,
            "temporal.clear.sparse",
            &[
                &self.sparse.color_view,
                &self.sparse.normal_view,
                &self.sparse.position_view,
            ],
        );
        clear_pass(
            encoder,
            "temporal.clear.scratch",
            &[&self.scratch.color_view, &self.scratch.validity_view],
        );
    }
}

fn clear_pass(encoder: &mut CommandEncoder, label: &str, views: &[&TextureView]) {
    let attachments: Vec<Option<RenderPassColorAttachment>> = views
        .iter()
        .map(|view| {
            Some(RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::TRANSPARENT),
                    store: StoreOp::Store,
                },
            })
        })
        .collect();
    encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(label),
        color_attachments: &attachments,
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}
