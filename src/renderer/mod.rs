pub mod binding;
pub mod config;
pub mod device;
pub mod drawable;
pub mod error;
pub mod pipeline;
pub mod resources;

mod internals;

#[cfg(test)]
pub(crate) mod testing;

pub use internals::memory::find_memory_type;

use crate::renderer::config::{FactoryConfig, RenderTarget};
use crate::renderer::device::DeviceContext;
use crate::renderer::drawable::{DrawContext, Renderable};
use crate::renderer::error::GpuError;
use crate::renderer::pipeline::PipelineCache;
use crate::renderer::resources::ResourceFactory;

/// Owns the renderables together with the pipelines and resources they draw with.
pub struct Renderer {
    renderables: Vec<Box<dyn Renderable>>,
    pipelines: PipelineCache,
    resources: ResourceFactory,
}

impl Renderer {
    pub fn new(context: DeviceContext, target: RenderTarget, factory_config: FactoryConfig) -> Self {
        Self {
            renderables: Vec::new(),
            pipelines: PipelineCache::new(context.device.clone(), target),
            resources: ResourceFactory::new(context, factory_config),
        }
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn resources(&self) -> &ResourceFactory {
        &self.resources
    }

    pub fn renderables(&self) -> impl Iterator<Item = &dyn Renderable> {
        self.renderables.iter().map(|r| r.as_ref())
    }

    /// Creates the renderable's resources and pipeline. On failure whatever it created is
    /// released again and it is not added.
    pub fn add_renderable(&mut self, mut renderable: Box<dyn Renderable>) -> Result<(), GpuError> {
        let result = renderable
            .init_resources(&mut self.resources)
            .and_then(|_| renderable.init_pipeline(&mut self.pipelines));
        if let Err(e) = result {
            log::error!("Can't add renderable '{}': {e}", renderable.id());
            renderable.release_pipeline();
            renderable.release_resources(&mut self.resources);
            return Err(e);
        }
        log::info!("Added renderable '{}' {}", renderable.id(), renderable.description());
        self.renderables.push(renderable);
        Ok(())
    }

    pub fn remove_renderable(&mut self, id: &str) -> bool {
        let Some(index) = self.renderables.iter().position(|r| r.id() == id) else {
            return false;
        };
        let mut renderable = self.renderables.remove(index);
        renderable.release_pipeline();
        renderable.release_resources(&mut self.resources);
        true
    }

    /// Rebuilds every pipeline against a new render target, e.g. after a swapchain resize.
    ///
    /// Every renderable is attempted; the first failure is returned.
    pub fn reconfigure(&mut self, target: RenderTarget) -> Result<(), GpuError> {
        log::info!("Reconfiguring for {}x{}", target.extent.width, target.extent.height);
        for renderable in &mut self.renderables {
            renderable.release_pipeline();
        }
        self.pipelines.reconfigure(target);

        let mut first_error = None;
        for renderable in &mut self.renderables {
            if let Err(e) = renderable.init_pipeline(&mut self.pipelines) {
                log::error!("Renderable '{}' has no pipeline after reconfigure: {e}", renderable.id());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Updates then records every renderable. A failed update skips only that renderable.
    pub fn draw(&mut self, ctx: &DrawContext) {
        for renderable in &mut self.renderables {
            if let Err(e) = renderable.update(ctx, &mut self.resources) {
                log::warn!("Update of '{}' failed: {e}", renderable.id());
                continue;
            }
            renderable.draw(ctx, &self.pipelines, &self.resources);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for renderable in &mut self.renderables {
            renderable.release_pipeline();
            renderable.release_resources(&mut self.resources);
        }
        self.renderables.clear();
        self.pipelines.release_shaders();
        self.resources.release_all();
    }
}
