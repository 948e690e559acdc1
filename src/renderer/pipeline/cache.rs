use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use ash::vk;
use smallvec::SmallVec;
use crate::renderer::binding::{self, UniformMapping};
use crate::renderer::config::{PipelineParameters, RenderTarget};
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::pipeline::builder::GraphicsPipelineBuilder;
use crate::renderer::pipeline::descriptor_layout::{merge_descriptor_sets, DescriptorResources, DescriptorSetInfo};
use crate::renderer::pipeline::reflection::VertexInputLayout;
use crate::renderer::pipeline::shader::ShaderLibrary;

/// Control points per patch when tessellation stages are present.
const PATCH_CONTROL_POINTS: u32 = 3;

/// Shader paths for each stage of a pipeline; an empty path means the stage is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderSet {
    pub vertex: String,
    pub tessellation_control: String,
    pub tessellation_evaluation: String,
    pub geometry: String,
    pub fragment: String,
}

impl ShaderSet {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            ..Default::default()
        }
    }

    pub fn with_tessellation(mut self, control: impl Into<String>, evaluation: impl Into<String>) -> Self {
        self.tessellation_control = control.into();
        self.tessellation_evaluation = evaluation.into();
        self
    }

    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = geometry.into();
        self
    }

    /// Every stage slot in pipeline order, absent ones included.
    fn slots(&self) -> [(&str, vk::ShaderStageFlags); 5] {
        [
            (self.vertex.as_str(), vk::ShaderStageFlags::VERTEX),
            (self.tessellation_control.as_str(), vk::ShaderStageFlags::TESSELLATION_CONTROL),
            (self.tessellation_evaluation.as_str(), vk::ShaderStageFlags::TESSELLATION_EVALUATION),
            (self.geometry.as_str(), vk::ShaderStageFlags::GEOMETRY),
            (self.fragment.as_str(), vk::ShaderStageFlags::FRAGMENT),
        ]
    }

    pub fn present_stages(&self) -> SmallVec<[(&Path, vk::ShaderStageFlags); 5]> {
        self.slots()
            .into_iter()
            .filter(|(path, _)| !path.is_empty())
            .map(|(path, stage)| (Path::new(path), stage))
            .collect()
    }
}

/// Refers to a cached pipeline. Goes stale when the cache is reconfigured or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
pub struct PipelineInfo {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptors: DescriptorResources,
    pub vertex_input: VertexInputLayout,
    pub stages: vk::ShaderStageFlags,
}

impl PipelineInfo {
    pub fn descriptor_sets(&self) -> Vec<vk::DescriptorSet> {
        self.descriptors.descriptor_sets()
    }

    pub fn set_infos(&self) -> &[DescriptorSetInfo] {
        &self.descriptors.sets
    }

    fn destroy(&mut self, device: &dyn RawDevice) {
        if self.pipeline != vk::Pipeline::null() {
            device.destroy_pipeline(self.pipeline);
            self.pipeline = vk::Pipeline::null();
        }
        if self.layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.layout);
            self.layout = vk::PipelineLayout::null();
        }
        self.descriptors.destroy(device);
    }
}

/// Builds graphics pipelines from shader files and keeps them until reconfiguration.
pub struct PipelineCache {
    device: Arc<dyn RawDevice>,
    target: RenderTarget,
    shaders: ShaderLibrary,
    pipelines: Vec<PipelineInfo>,
    keys: HashMap<ShaderSet, usize>,
    generation: u64,
}

impl PipelineCache {
    pub fn new(device: Arc<dyn RawDevice>, target: RenderTarget) -> Self {
        Self {
            shaders: ShaderLibrary::new(device.clone()),
            device,
            target,
            pipelines: Vec::new(),
            keys: HashMap::new(),
            generation: 0,
        }
    }

    pub fn device(&self) -> &Arc<dyn RawDevice> {
        &self.device
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Returns the cached pipeline for `shaders`, building it on first request.
    ///
    /// `params` only matter the first time a pipeline (or shader file) is built; they are not
    /// part of the cache key.
    pub fn get_pipeline(
        &mut self,
        shaders: &ShaderSet,
        params: &PipelineParameters,
    ) -> Result<PipelineHandle, GpuError> {
        if let Some(&index) = self.keys.get(shaders) {
            return Ok(self.handle(index));
        }
        if shaders.vertex.is_empty() {
            return Err(GpuError::InvalidData {
                object: "pipeline",
                reason: "a vertex stage is required".into(),
            });
        }

        let stages = shaders.present_stages();
        self.shaders.load_stages(&stages, params)?;

        let mut reflections = SmallVec::<[_; 5]>::new();
        let mut modules = SmallVec::<[(vk::ShaderStageFlags, vk::ShaderModule); 5]>::new();
        for (path, stage) in &stages {
            let shader = self.shaders.get(path);
            reflections.push(shader.map(|s| &s.reflection));
            if let Some(shader) = shader {
                modules.push((*stage, shader.module));
            }
        }
        let specs = merge_descriptor_sets(&reflections)?;
        let vertex_input = self
            .shaders
            .get(&shaders.vertex)
            .map(|s| s.reflection.vertex_input.clone())
            .unwrap_or_default();
        let stage_flags = stages
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |flags, (_, stage)| flags | *stage);

        let device = self.device.as_ref();
        let mut descriptors = DescriptorResources::build(device, specs)?;

        let set_layouts = descriptors.layouts();
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = match device.create_pipeline_layout(&layout_info) {
            Ok(layout) => layout,
            Err(result) => {
                log::error!("Pipeline layout for {shaders:?} failed: {result}");
                descriptors.destroy(device);
                return Err(GpuError::Vulkan {
                    call: VkCall::CreatePipelineLayout,
                    result,
                });
            }
        };

        let mut builder = modules
            .iter()
            .fold(GraphicsPipelineBuilder::new(), |builder, (stage, module)| {
                builder.with_stage(*stage, *module)
            })
            .with_vertex_input(vertex_input.clone())
            .with_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .with_polygon_mode(vk::PolygonMode::FILL)
            .with_cull_mode(vk::CullModeFlags::FRONT, vk::FrontFace::COUNTER_CLOCKWISE)
            .with_multisampling(self.target.samples)
            .with_depth_test(true, Some(vk::CompareOp::LESS_OR_EQUAL))
            .with_blending_disabled()
            .with_extent(self.target.extent)
            .with_render_pass(self.target.render_pass)
            .with_pipeline_layout(layout);
        if stage_flags.intersects(
            vk::ShaderStageFlags::TESSELLATION_CONTROL | vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ) {
            builder = builder.with_tessellation(PATCH_CONTROL_POINTS);
        }

        let pipeline = match builder.build(device) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::error!("Graphics pipeline for {shaders:?} failed: {e}");
                device.destroy_pipeline_layout(layout);
                descriptors.destroy(device);
                return Err(e);
            }
        };

        log::info!(
            "Built pipeline for {:?}: {} descriptor sets, {} vertex attributes",
            stage_flags,
            descriptors.sets.len(),
            vertex_input.attributes.len(),
        );
        let index = self.pipelines.len();
        self.pipelines.push(PipelineInfo {
            pipeline,
            layout,
            descriptors,
            vertex_input,
            stages: stage_flags,
        });
        self.keys.insert(shaders.clone(), index);
        Ok(self.handle(index))
    }

    fn handle(&self, index: usize) -> PipelineHandle {
        PipelineHandle {
            index,
            generation: self.generation,
        }
    }

    /// The pipeline behind `handle`, or `None` once the handle has gone stale.
    pub fn pipeline(&self, handle: PipelineHandle) -> Option<&PipelineInfo> {
        if handle.generation != self.generation {
            return None;
        }
        self.pipelines.get(handle.index)
    }

    /// Writes a drawable's descriptors into the sets of the pipeline behind `handle`.
    pub fn connect_resources_to_bindings(
        &self,
        handle: PipelineHandle,
        mapping: &UniformMapping,
    ) -> Result<usize, GpuError> {
        let pipeline = self.pipeline(handle).ok_or_else(|| GpuError::InvalidData {
            object: "pipeline handle",
            reason: "stale or unknown".into(),
        })?;
        binding::connect_resources_to_bindings(self.device.as_ref(), mapping, pipeline)
    }

    /// Destroys every cached pipeline, newest first. Shader modules are kept.
    pub fn release_pipelines(&mut self) {
        if !self.pipelines.is_empty() {
            log::info!("Releasing {} pipelines", self.pipelines.len());
        }
        for mut info in self.pipelines.drain(..).rev() {
            info.destroy(self.device.as_ref());
        }
        self.keys.clear();
        self.generation += 1;
    }

    /// Drops all pipelines and bakes future ones against `target`.
    pub fn reconfigure(&mut self, target: RenderTarget) {
        self.release_pipelines();
        self.target = target;
    }

    /// Destroys pipelines and then every shader module.
    pub fn release_shaders(&mut self) {
        self.release_pipelines();
        self.shaders.clear();
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        self.release_pipelines();
    }
}
