// Copyright 2026 the Tideline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous creation of the wgpu particle backend on a canvas.

use tideline_core::backend::{BackendDelivery, BackendFactory};
use tideline_core::error::GpuError;
use tideline_render::WgpuParticleBackend;
use web_sys::HtmlCanvasElement;

/// [`BackendFactory`] that builds a [`WgpuParticleBackend`] on a canvas.
///
/// Surface creation is synchronous; adapter and device requests run on the
/// browser's task queue through `spawn_local`. The default instance uses
/// WebGPU when the browser has it and WebGL2 otherwise.
#[derive(Debug)]
pub struct WgpuFactory {
    canvas: HtmlCanvasElement,
}

impl WgpuFactory {
    /// Draws into `canvas`.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }
}

impl BackendFactory<WgpuParticleBackend> for WgpuFactory {
    #[cfg(target_arch = "wasm32")]
    fn create(&mut self, particle_count: usize, deliver: BackendDelivery<WgpuParticleBackend>) {
        let instance = wgpu::Instance::default();
        let surface = match instance.create_surface(wgpu::SurfaceTarget::Canvas(self.canvas.clone())) {
            Ok(surface) => surface,
            Err(err) => {
                deliver(Err(GpuError::ContextUnavailable(err.to_string())));
                return;
            }
        };
        let (width, height) = (self.canvas.width(), self.canvas.height());
        tracing::debug!(particle_count, width, height, "requesting GPU backend");
        wasm_bindgen_futures::spawn_local(async move {
            let backend = WgpuParticleBackend::new(&instance, surface, width, height).await;
            deliver(backend);
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn create(&mut self, particle_count: usize, deliver: BackendDelivery<WgpuParticleBackend>) {
        let _ = (&self.canvas, particle_count);
        deliver(Err(GpuError::ContextUnavailable(
            "canvas surfaces are only available on wasm32".into(),
        )));
    }
}
