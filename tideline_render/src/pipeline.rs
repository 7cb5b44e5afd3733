// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render pipeline for the particle shader.
//!
//! Vertex buffer slots:
//!
//! | slot | step     | contents                          |
//! |------|----------|-----------------------------------|
//! | 0    | vertex   | quad corner, `vec2<f32>`          |
//! | 1    | instance | position in the current shape     |
//! | 2    | instance | position in the next shape        |
//! | 3    | instance | per-particle seed, `f32`          |
//!
//! Slots 1 and 2 are bound to two of the three shape buffers each frame, so
//! advancing the cycle never re-uploads geometry.

use tideline_core::morph::MorphUniforms;

/// WGSL source of the particle shader.
pub const SHADER: &str = include_str!("particles.wgsl");

/// Two triangles covering `[-1, 1]²`.
pub(crate) const QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

const POSITION_STRIDE: u64 = size_of::<[f32; 3]>() as u64;

/// Additive blending of premultiplied colour.
#[must_use]
pub fn additive_blend() -> wgpu::BlendState {
    let add = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: add,
        alpha: add,
    }
}

fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 4] {
    const CORNER: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    const SHAPE_A: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
    const SHAPE_B: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];
    const SEED: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Float32];
    [
        wgpu::VertexBufferLayout {
            array_stride: size_of::<[f32; 2]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &CORNER,
        },
        wgpu::VertexBufferLayout {
            array_stride: POSITION_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &SHAPE_A,
        },
        wgpu::VertexBufferLayout {
            array_stride: POSITION_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &SHAPE_B,
        },
        wgpu::VertexBufferLayout {
            array_stride: size_of::<f32>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &SEED,
        },
    ]
}

/// Pipeline objects shared by every frame.
#[derive(Debug)]
pub(crate) struct ParticlePipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) bind_group: wgpu::BindGroup,
    pub(crate) uniforms: wgpu::Buffer,
    pub(crate) quad: wgpu::Buffer,
}

impl ParticlePipeline {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tideline particles"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(MorphUniforms::SIZE as u64),
                },
                count: None,
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tideline particles"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tideline particles"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let buffers = vertex_layouts();
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tideline particles"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(additive_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tideline uniforms"),
            size: MorphUniforms::SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let quad = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tideline quad"),
            size: size_of_val(&QUAD) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&quad, 0, bytemuck::cast_slice(&QUAD));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tideline uniforms"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            bind_group,
            uniforms,
            quad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Field names of the WGSL `Uniforms` struct, in declaration order.
    fn wgsl_uniform_fields() -> Vec<&'static str> {
        let start = SHADER.find("struct Uniforms {").expect("Uniforms struct");
        let body = &SHADER[start..];
        let end = body.find("};").expect("end of Uniforms struct");
        body[..end]
            .lines()
            .skip(1)
            .filter_map(|line| line.trim().split_once(':').map(|(name, _)| name))
            .collect()
    }

    #[test]
    fn shader_block_matches_uniform_layout() {
        assert_eq!(
            wgsl_uniform_fields(),
            [
                "time",
                "morph_progress",
                "scroll_progress",
                "pixel_ratio",
                "pointer",
                "resolution",
                "drift_amplitude",
                "spread",
                "repulsion_radius",
                "repulsion_strength",
                "point_size",
                "pad0",
                "pad1",
                "pad2",
            ]
        );
        assert_eq!(MorphUniforms::SIZE, 64, "12 scalars, 2 vec2s, 3 pads");
    }

    #[test]
    fn shader_declares_entry_points_and_instance_inputs() {
        assert!(SHADER.contains("fn vs_main("), "vertex entry point");
        assert!(SHADER.contains("fn fs_main("), "fragment entry point");
        let layouts = vertex_layouts();
        let locations: Vec<u32> = layouts
            .iter()
            .flat_map(|l| l.attributes.iter().map(|a| a.shader_location))
            .collect();
        assert_eq!(locations, [0, 1, 2, 3]);
        for loc in locations {
            assert!(SHADER.contains(&format!("@location({loc})")), "location {loc}");
        }
        assert_eq!(layouts[0].step_mode, wgpu::VertexStepMode::Vertex);
        assert!(
            layouts[1..]
                .iter()
                .all(|l| l.step_mode == wgpu::VertexStepMode::Instance),
            "particle attributes are per instance"
        );
    }

    #[test]
    fn blending_is_additive() {
        let blend = additive_blend();
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::One, "dst kept");
        assert_eq!(blend.color.operation, wgpu::BlendOperation::Add, "summed");
    }

    #[test]
    fn quad_spans_unit_square() {
        assert!(
            QUAD.iter().all(|[x, y]| x.abs() == 1.0 && y.abs() == 1.0),
            "corners at ±1"
        );
    }
}
