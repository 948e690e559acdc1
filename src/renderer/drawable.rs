use ash::vk;
use glam::Mat4;
use smallvec::SmallVec;
use crate::renderer::binding::UniformMapping;
use crate::renderer::config::PipelineParameters;
use crate::renderer::error::GpuError;
use crate::renderer::pipeline::{PipelineCache, PipelineHandle, ShaderSet};
use crate::renderer::resources::{BufferKey, ResourceFactory};

/// Per-frame state shared by every renderable while recording.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext {
    pub command_buffer: vk::CommandBuffer,
    pub view: Mat4,
    pub projection: Mat4,
}

impl DrawContext {
    pub fn new(command_buffer: vk::CommandBuffer) -> Self {
        Self {
            command_buffer,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Something the renderer draws every frame.
///
/// Resources outlive pipelines: on reconfiguration only `release_pipeline` and
/// `init_pipeline` run again.
pub trait Renderable {
    fn id(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn init_resources(&mut self, resources: &mut ResourceFactory) -> Result<(), GpuError>;

    /// Resolves the pipeline and points its descriptors at this renderable's resources.
    fn init_pipeline(&mut self, pipelines: &mut PipelineCache) -> Result<(), GpuError>;

    fn update(&mut self, ctx: &DrawContext, resources: &mut ResourceFactory) -> Result<(), GpuError>;

    fn draw(&self, ctx: &DrawContext, pipelines: &PipelineCache, resources: &ResourceFactory);

    fn release_pipeline(&mut self);

    fn release_resources(&mut self, resources: &mut ResourceFactory);
}

/// The buffers, descriptor payloads and pipeline reference behind one indexed draw.
///
/// `pipeline` does not keep the pipeline alive. It goes stale when the cache is
/// reconfigured and must be resolved again.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub shaders: ShaderSet,
    pub params: PipelineParameters,

    /// Index in this list is the vertex binding the buffer is bound to.
    pub vertex_buffers: Vec<BufferKey>,
    pub index_buffer: Option<BufferKey>,
    pub index_type: vk::IndexType,
    pub index_count: u32,
    pub uniform_buffer: Option<BufferKey>,
    pub uniform_mapping: UniformMapping,

    pub pipeline: Option<PipelineHandle>,
    pub model: Mat4,
}

impl Drawable {
    pub fn new(shaders: ShaderSet, params: PipelineParameters) -> Self {
        Self {
            shaders,
            params,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            index_type: vk::IndexType::UINT32,
            index_count: 0,
            uniform_buffer: None,
            uniform_mapping: Vec::new(),
            pipeline: None,
            model: Mat4::IDENTITY,
        }
    }

    /// Uploads one vertex buffer per stream plus a `u32` index buffer.
    pub fn upload_geometry(
        &mut self,
        resources: &mut ResourceFactory,
        streams: &[&[u8]],
        indices: &[u32],
    ) -> Result<(), GpuError> {
        for stream in streams {
            let key = resources.create_buffer(stream, vk::BufferUsageFlags::VERTEX_BUFFER)?;
            self.vertex_buffers.push(key);
        }
        let key = resources.create_buffer(bytemuck::cast_slice(indices), vk::BufferUsageFlags::INDEX_BUFFER)?;
        self.index_buffer = Some(key);
        self.index_type = vk::IndexType::UINT32;
        self.index_count = indices.len() as u32;
        Ok(())
    }

    pub fn write_uniform<T: bytemuck::Pod>(&self, resources: &mut ResourceFactory, value: &T) -> Result<(), GpuError> {
        let buffer = self
            .uniform_buffer
            .and_then(|key| resources.buffer_mut(key))
            .ok_or_else(|| GpuError::InvalidData {
                object: "drawable",
                reason: "no uniform buffer".into(),
            })?;
        buffer.write_pod(0, value)
    }

    /// Builds or looks up the pipeline, then writes `uniform_mapping` into its descriptor sets.
    pub fn connect(&mut self, pipelines: &mut PipelineCache) -> Result<usize, GpuError> {
        let handle = pipelines.get_pipeline(&self.shaders, &self.params)?;
        self.pipeline = Some(handle);
        pipelines.connect_resources_to_bindings(handle, &self.uniform_mapping)
    }

    /// Records pipeline, descriptor set, vertex and index buffer binds and one indexed draw.
    ///
    /// Returns `false` without recording anything if a piece is missing.
    pub fn record_draw(&self, ctx: &DrawContext, pipelines: &PipelineCache, resources: &ResourceFactory) -> bool {
        if ctx.command_buffer == vk::CommandBuffer::null() {
            log::warn!("Skipping draw: no command buffer");
            return false;
        }
        let Some(pipeline) = self.pipeline.and_then(|handle| pipelines.pipeline(handle)) else {
            log::warn!("Skipping draw: pipeline for {:?} is not built", self.shaders);
            return false;
        };
        let vertex_buffers: Option<SmallVec<[vk::Buffer; 4]>> = self
            .vertex_buffers
            .iter()
            .map(|key| resources.buffer(*key).map(|b| b.handle()))
            .collect();
        let Some(vertex_buffers) = vertex_buffers else {
            log::warn!("Skipping draw: a vertex buffer was released");
            return false;
        };
        let Some(index_buffer) = self.index_buffer.and_then(|key| resources.buffer(key)) else {
            log::warn!("Skipping draw: no index buffer");
            return false;
        };

        let device = pipelines.device();
        let cmd = ctx.command_buffer;
        device.cmd_bind_pipeline(cmd, pipeline.pipeline);
        let sets = pipeline.descriptor_sets();
        if !sets.is_empty() {
            device.cmd_bind_descriptor_sets(cmd, pipeline.layout, &sets);
        }
        if !vertex_buffers.is_empty() {
            let offsets: SmallVec<[vk::DeviceSize; 4]> = smallvec::smallvec![0; vertex_buffers.len()];
            device.cmd_bind_vertex_buffers(cmd, 0, &vertex_buffers, &offsets);
        }
        device.cmd_bind_index_buffer(cmd, index_buffer.handle(), self.index_type);
        device.cmd_draw_indexed(cmd, self.index_count, 1);
        true
    }

    pub fn release_pipeline(&mut self) {
        self.pipeline = None;
    }

    /// Releases every buffer this drawable created and forgets its descriptor payloads.
    pub fn release_resources(&mut self, resources: &mut ResourceFactory) {
        for key in self.vertex_buffers.drain(..) {
            resources.release_buffer(key);
        }
        if let Some(key) = self.index_buffer.take() {
            resources.release_buffer(key);
        }
        if let Some(key) = self.uniform_buffer.take() {
            resources.release_buffer(key);
        }
        self.uniform_mapping.clear();
        self.index_count = 0;
        self.pipeline = None;
    }
}
