// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`ParticleBackend`] on top of wgpu.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tideline_core::error::GpuError;
use tideline_core::morph::{MorphShapes, MorphUniforms, ParticleBackend, SHAPE_ORDER, ShapeKind};

use crate::pipeline::{ParticlePipeline, QUAD};

/// Per-mount particle buffers.
#[derive(Debug)]
struct ParticleBuffers {
    count: usize,
    instances: u32,
    /// Indexed by [`ShapeKind::order_index`].
    shapes: [wgpu::Buffer; 3],
    seeds: wgpu::Buffer,
    uploaded: bool,
}

impl ParticleBuffers {
    fn destroy(&self) {
        for buffer in &self.shapes {
            buffer.destroy();
        }
        self.seeds.destroy();
    }
}

/// What to do after the surface refused to hand out a frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FrameAcquire {
    /// Reconfigure the surface and skip this frame.
    Reconfigure,
    /// Skip this frame and try again next tick.
    Skip,
    /// Give up on the GPU path.
    Fail(GpuError),
}

pub(crate) fn classify_surface_error(err: &wgpu::SurfaceError) -> FrameAcquire {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => FrameAcquire::Reconfigure,
        wgpu::SurfaceError::Timeout => FrameAcquire::Skip,
        wgpu::SurfaceError::OutOfMemory => FrameAcquire::Fail(GpuError::ContextLost),
        #[allow(unreachable_patterns, reason = "wgpu adds variants between releases")]
        other => FrameAcquire::Fail(GpuError::Submit(other.to_string())),
    }
}

/// Clamps a requested surface size to what the device accepts.
pub(crate) fn surface_extent(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max = max_dimension.max(1);
    (width.clamp(1, max), height.clamp(1, max))
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), GpuError> {
    if expected == actual {
        Ok(())
    } else {
        Err(GpuError::BufferMismatch { expected, actual })
    }
}

/// Draws the particle hero into a wgpu surface.
///
/// Holds three shape buffers for the whole mount; each frame binds the
/// current and next shape to the two interpolated vertex slots.
pub struct WgpuParticleBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pipeline: ParticlePipeline,
    particles: Option<ParticleBuffers>,
    lost: Arc<AtomicBool>,
}

impl std::fmt::Debug for WgpuParticleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuParticleBackend")
            .field("width", &self.config.width)
            .field("height", &self.config.height)
            .field("format", &self.config.format)
            .field("particles", &self.particles.as_ref().map(|p| p.count))
            .field("lost", &self.lost.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl WgpuParticleBackend {
    /// Requests an adapter and device for `surface` and builds the pipeline.
    ///
    /// `width` and `height` are the initial surface size in physical pixels.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .ok_or_else(|| GpuError::ContextUnavailable("no suitable adapter".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tideline"),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| GpuError::ContextUnavailable(e.to_string()))?;

        let (width, height) = surface_extent(width, height, device.limits().max_texture_dimension_2d);
        let config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| GpuError::ContextUnavailable("surface not supported by adapter".into()))?;
        surface.configure(&device, &config);

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::warn!(?reason, %message, "GPU device lost");
            flag.store(true, Ordering::Relaxed);
        });

        let pipeline = ParticlePipeline::new(&device, &queue, config.format);
        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            format = ?config.format,
            width,
            height,
            "particle backend ready"
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
            pipeline,
            particles: None,
            lost,
        })
    }

    fn ensure_alive(&self) -> Result<(), GpuError> {
        if self.lost.load(Ordering::Relaxed) {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn vertex_buffer(&self, label: &str, bytes: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            // Zero-sized vertex buffers cannot be bound.
            size: bytes.max(4),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Current surface size in physical pixels.
    #[must_use]
    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

impl ParticleBackend for WgpuParticleBackend {
    fn prepare(&mut self, particle_count: usize) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if let Some(old) = self.particles.take() {
            old.destroy();
        }
        let instances = u32::try_from(particle_count)
            .map_err(|_| GpuError::Submit(format!("{particle_count} particles exceed u32")))?;
        let position_bytes = (particle_count * 3 * size_of::<f32>()) as u64;
        let shapes = SHAPE_ORDER.map(|kind| {
            let label = match kind {
                ShapeKind::Sphere => "tideline sphere",
                ShapeKind::Torus => "tideline torus",
                ShapeKind::DoubleHelix => "tideline helix",
            };
            self.vertex_buffer(label, position_bytes)
        });
        let seeds = self.vertex_buffer("tideline seeds", (particle_count * size_of::<f32>()) as u64);
        tracing::debug!(particle_count, "allocated particle buffers");
        self.particles = Some(ParticleBuffers {
            count: particle_count,
            instances,
            shapes,
            seeds,
            uploaded: false,
        });
        Ok(())
    }

    fn upload_shapes(&mut self, shapes: &MorphShapes) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let Some(particles) = self.particles.as_mut() else {
            return Err(GpuError::BufferMismatch {
                expected: 0,
                actual: shapes.count() * 3,
            });
        };
        let expected = particles.count * 3;
        for kind in SHAPE_ORDER {
            check_len(expected, shapes.shape(kind).len())?;
        }
        check_len(particles.count, shapes.random_seeds().len())?;

        for kind in SHAPE_ORDER {
            self.queue.write_buffer(
                &particles.shapes[kind.order_index()],
                0,
                bytemuck::cast_slice(&shapes.shape(kind)[..]),
            );
        }
        self.queue
            .write_buffer(&particles.seeds, 0, bytemuck::cast_slice(&shapes.random_seeds()[..]));
        particles.uploaded = true;
        Ok(())
    }

    fn draw(&mut self, uniforms: &MorphUniforms, pair: (ShapeKind, ShapeKind)) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let particles = match &self.particles {
            Some(p) if p.uploaded => p,
            _ => return Err(GpuError::Submit("draw before upload".into())),
        };

        self.queue
            .write_buffer(&self.pipeline.uniforms, 0, uniforms.as_bytes());

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                return match classify_surface_error(&err) {
                    FrameAcquire::Reconfigure => {
                        tracing::debug!(%err, "reconfiguring surface");
                        self.surface.configure(&self.device, &self.config);
                        Ok(())
                    }
                    FrameAcquire::Skip => Ok(()),
                    FrameAcquire::Fail(e) => Err(e),
                };
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tideline particles"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tideline particles"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &self.pipeline.bind_group, &[]);
            pass.set_vertex_buffer(0, self.pipeline.quad.slice(..));
            pass.set_vertex_buffer(1, particles.shapes[pair.0.order_index()].slice(..));
            pass.set_vertex_buffer(2, particles.shapes[pair.1.order_index()].slice(..));
            pass.set_vertex_buffer(3, particles.seeds.slice(..));
            if particles.instances > 0 {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "the quad has six vertices"
                )]
                pass.draw(0..QUAD.len() as u32, 0..particles.instances);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = surface_extent(width, height, self.device.limits().max_texture_dimension_2d);
        if (width, height) == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if !self.lost.load(Ordering::Relaxed) {
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn release(&mut self) {
        if let Some(particles) = self.particles.take() {
            particles.destroy();
            tracing::debug!(count = particles.count, "released particle buffers");
        }
    }
}

impl Drop for WgpuParticleBackend {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_and_outdated_surfaces_are_reconfigured() {
        assert_eq!(
            classify_surface_error(&wgpu::SurfaceError::Lost),
            FrameAcquire::Reconfigure
        );
        assert_eq!(
            classify_surface_error(&wgpu::SurfaceError::Outdated),
            FrameAcquire::Reconfigure
        );
        assert_eq!(
            classify_surface_error(&wgpu::SurfaceError::Timeout),
            FrameAcquire::Skip
        );
    }

    #[test]
    fn out_of_memory_abandons_the_gpu_path() {
        assert_eq!(
            classify_surface_error(&wgpu::SurfaceError::OutOfMemory),
            FrameAcquire::Fail(GpuError::ContextLost)
        );
    }

    #[test]
    fn extent_is_clamped_to_device_limits() {
        assert_eq!(surface_extent(0, 0, 2048), (1, 1), "never zero");
        assert_eq!(surface_extent(2880, 1800, 2048), (2048, 1800));
        assert_eq!(surface_extent(640, 480, 0), (1, 1), "degenerate limit");
    }

    #[test]
    fn upload_lengths_are_checked() {
        assert_eq!(check_len(540, 540), Ok(()));
        assert_eq!(
            check_len(540, 537),
            Err(GpuError::BufferMismatch {
                expected: 540,
                actual: 537
            })
        );
    }
}
