//! Reprojection stage
//!
//! Estimates, for every output pixel, what the previous frame's accumulated
//! color was at the same world location, and writes a validity mask marking
//! pixels whose history cannot be trusted (disocclusion, off-screen).

use std::mem::size_of;
use wgpu::util::DeviceExt;
use wgpu::*;

use super::buffers::{ReprojectionScratch, ACCUM_COLOR_FORMAT, VALIDITY_FORMAT};
use crate::error::RenderResult;

const REPROJECT_SHADER_SRC: &str = include_str!("../../shaders/temporal_reproject.wgsl");

/// Reprojection uniforms (must match WGSL layout exactly)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ReprojectUniforms {
    /// Previous frame's view-projection matrix
    pub prev_view_proj: [[f32; 4]; 4],
    /// Full resolution (xy), sparse resolution (zw)
    pub resolution: [f32; 4],
    /// Bayer offset (xy), frame index (z), pad
    pub frame: [u32; 4],
    /// Disocclusion threshold (x), pad
    pub params: [f32; 4],
}

impl Default for ReprojectUniforms {
    fn default() -> Self {
        Self {
            prev_view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            resolution: [0.0; 4],
            frame: [0; 4],
            params: [0.15, 0.0, 0.0, 0.0],
        }
    }
}

/// Compute pass remapping last frame's accumulation into the current frame.
pub struct ReprojectionPass {
    /// Uniform staging struct, mutated in place every frame
    uniforms: ReprojectUniforms,
    uniform_buffer: Buffer,
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
}

impl ReprojectionPass {
    pub fn new(device: &Device) -> RenderResult<Self> {
        let uniforms = ReprojectUniforms::default();
        let uniform_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("temporal.reproject.uniforms"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("temporal.reproject.sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("temporal.reproject.shader"),
            source: ShaderSource::Wgsl(REPROJECT_SHADER_SRC.into()),
        });

        // 0: previous accumulated color (sampled, filtered)
        // 1: previous accumulated position (loaded, unfiltered)
        // 2: sparse world position (loaded, unfiltered)
        // 3: sampler
        // 4: uniforms
        // 5: reprojected color (storage out)
        // 6: validity mask (storage out)
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("temporal.reproject.bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 3,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 4,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(
                            std::num::NonZeroU64::new(size_of::<ReprojectUniforms>() as u64)
                                .unwrap(),
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 5,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: ACCUM_COLOR_FORMAT,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 6,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: VALIDITY_FORMAT,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("temporal.reproject.pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("temporal.reproject.pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "reproject",
        });

        Ok(Self {
            uniforms,
            uniform_buffer,
            pipeline,
            bind_group_layout,
            sampler,
        })
    }

    /// Record the reprojection dispatch.
    ///
    /// The caller has already verified the stage's preconditions (engine
    /// enabled, history valid); all inputs here are concrete.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        prev_color: &TextureView,
        prev_position: &TextureView,
        sparse_position: &TextureView,
        scratch: &ReprojectionScratch,
        prev_view_proj: glam::Mat4,
        full_resolution: (u32, u32),
        sparse_resolution: (u32, u32),
        bayer_offset: [u32; 2],
        frame_index: u32,
        disocclusion_threshold: f32,
    ) {
        self.uniforms.prev_view_proj = prev_view_proj.to_cols_array_2d();
        self.uniforms.resolution = [
            full_resolution.0 as f32,
            full_resolution.1 as f32,
            sparse_resolution.0 as f32,
            sparse_resolution.1 as f32,
        ];
        self.uniforms.frame = [bayer_offset[0], bayer_offset[1], frame_index, 0];
        self.uniforms.params[0] = disocclusion_threshold;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("temporal.reproject.bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(prev_color),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(prev_position),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::TextureView(sparse_position),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::Sampler(&self.sampler),
                },
                BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 5,
                    resource: BindingResource::TextureView(&scratch.color_view),
                },
                BindGroupEntry {
                    binding: 6,
                    resource: BindingResource::TextureView(&scratch.validity_view),
                },
            ],
        });

        let workgroups_x = (full_resolution.0 + 7) / 8;
        let workgroups_y = (full_resolution.1 + 7) / 8;
        let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("temporal.reproject"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &bind_group, &[]);
        cpass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }
}
