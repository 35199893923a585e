//! Reconstruction stage
//!
//! Merges the current frame's sparse render with the reprojected history
//! into the accumulation write target. Pixels rendered this frame blend
//! with history; unrendered pixels carry history forward, or fall back to
//! spatial interpolation from the sparse buffer when no history exists.

use std::mem::size_of;
use wgpu::util::DeviceExt;
use wgpu::*;

use super::buffers::{
    AccumulationTarget, ReprojectionScratch, SparseFrameTarget, ACCUM_COLOR_FORMAT,
    ACCUM_POSITION_FORMAT,
};
use crate::error::RenderResult;

const RECONSTRUCT_SHADER_SRC: &str = include_str!("../../shaders/temporal_reconstruct.wgsl");

/// Reconstruction uniforms (must match WGSL layout exactly)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ReconstructUniforms {
    /// Full resolution (xy), sparse resolution (zw)
    pub resolution: [f32; 4],
    /// Bayer offset (xy), frame index (z), has_valid_history (w)
    pub frame: [u32; 4],
    /// Effective history weight (x), validity threshold (y), pad
    pub blend: [f32; 4],
}

impl Default for ReconstructUniforms {
    fn default() -> Self {
        Self {
            resolution: [0.0; 4],
            frame: [0; 4],
            blend: [0.85, 0.5, 0.0, 0.0],
        }
    }
}

/// Compute pass producing the new accumulated color + position buffers.
pub struct ReconstructionPass {
    /// Uniform staging struct, mutated in place every frame
    uniforms: ReconstructUniforms,
    uniform_buffer: Buffer,
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
}

impl ReconstructionPass {
    pub fn new(device: &Device) -> RenderResult<Self> {
        let uniforms = ReconstructUniforms::default();
        let uniform_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("temporal.reconstruct.uniforms"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        // Linear sampler for the spatial-fill path over the sparse buffer
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("temporal.reconstruct.sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("temporal.reconstruct.shader"),
            source: ShaderSource::Wgsl(RECONSTRUCT_SHADER_SRC.into()),
        });

        // 0: sparse color (sampled, filtered)
        // 1: sparse world position (loaded, unfiltered)
        // 2: reprojected color (loaded, unfiltered)
        // 3: reprojection validity (loaded, unfiltered)
        // 4: previous accumulated position (loaded, unfiltered)
        // 5: sampler
        // 6: uniforms
        // 7: accumulated color (storage out)
        // 8: accumulated position (storage out)
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("temporal.reconstruct.bgl"),
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
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 4,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 5,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 6,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(
                            std::num::NonZeroU64::new(size_of::<ReconstructUniforms>() as u64)
                                .unwrap(),
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 7,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: ACCUM_COLOR_FORMAT,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 8,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: ACCUM_POSITION_FORMAT,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("temporal.reconstruct.pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("temporal.reconstruct.pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "reconstruct",
        });

        Ok(Self {
            uniforms,
            uniform_buffer,
            pipeline,
            bind_group_layout,
            sampler,
        })
    }

    /// Record the reconstruction dispatch into the write target.
    ///
    /// Must run after the reprojection dispatch for the same frame; the
    /// engine enforces that by direct sequential invocation.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        sparse: &SparseFrameTarget,
        scratch: &ReprojectionScratch,
        prev_position: &TextureView,
        write_target: &AccumulationTarget,
        full_resolution: (u32, u32),
        bayer_offset: [u32; 2],
        frame_index: u32,
        has_valid_history: bool,
        effective_history_weight: f32,
        validity_threshold: f32,
    ) {
        self.uniforms.resolution = [
            full_resolution.0 as f32,
            full_resolution.1 as f32,
            sparse.width() as f32,
            sparse.height() as f32,
        ];
        self.uniforms.frame = [
            bayer_offset[0],
            bayer_offset[1],
            frame_index,
            has_valid_history as u32,
        ];
        self.uniforms.blend[0] = effective_history_weight;
        self.uniforms.blend[1] = validity_threshold;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("temporal.reconstruct.bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&sparse.color_view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(&sparse.position_view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::TextureView(&scratch.color_view),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::TextureView(&scratch.validity_view),
                },
                BindGroupEntry {
                    binding: 4,
                    resource: BindingResource::TextureView(prev_position),
                },
                BindGroupEntry {
                    binding: 5,
                    resource: BindingResource::Sampler(&self.sampler),
                },
                BindGroupEntry {
                    binding: 6,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 7,
                    resource: BindingResource::TextureView(&write_target.color_view),
                },
                BindGroupEntry {
                    binding: 8,
                    resource: BindingResource::TextureView(&write_target.position_view),
                },
            ],
        });

        let workgroups_x = (full_resolution.0 + 7) / 8;
        let workgroups_y = (full_resolution.1 + 7) / 8;
        let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("temporal.reconstruct"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &bind_group, &[]);
        cpass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_are_uniform_buffer_friendly() {
        assert_eq!(size_of::<ReconstructUniforms>(), 16 * 3);
        assert_eq!(size_of::<ReconstructUniforms>() % 16, 0);
    }
}
