use ash::vk;
use smallvec::SmallVec;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::pipeline::reflection::VertexInputLayout;

pub struct GraphicsPipelineBuilder {
    stages: SmallVec<[(vk::ShaderStageFlags, vk::ShaderModule); 5]>,
    vertex_input: VertexInputLayout,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    tessellation: Option<vk::PipelineTessellationStateCreateInfo<'static>>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    pipeline_layout: Option<vk::PipelineLayout>,
}

impl GraphicsPipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: SmallVec::new(),
            vertex_input: VertexInputLayout::default(),
            input_assembly: Self::default_input_assembly_info(),
            tessellation: None,
            rasterization: Self::default_rasterization_info(),
            color_blend_attachment: Self::default_color_blend_state(),
            multisample: Self::default_multisample_info(),
            depth_stencil: Self::default_depth_stencil_info(),
            extent: vk::Extent2D::default(),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: None,
        }
    }

    pub fn with_stage(mut self, stage: vk::ShaderStageFlags, module: vk::ShaderModule) -> Self {
        self.stages.push((stage, module));
        self
    }

    pub fn with_pipeline_layout(mut self, layout: vk::PipelineLayout) -> Self {
        let _ = self.pipeline_layout.replace(layout);
        self
    }

    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    /// Fixed viewport and scissor covering the whole frame.
    pub fn with_extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_vertex_input(mut self, layout: VertexInputLayout) -> Self {
        self.vertex_input = layout;
        self
    }

    pub fn with_input_topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::FALSE;
        self
    }

    /// Switches to patch lists of `control_points` for tessellated pipelines.
    pub fn with_tessellation(mut self, control_points: u32) -> Self {
        self.input_assembly.topology = vk::PrimitiveTopology::PATCH_LIST;
        self.tessellation = Some(
            vk::PipelineTessellationStateCreateInfo::default().patch_control_points(control_points),
        );
        self
    }

    pub fn with_polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.rasterization.polygon_mode = mode;
        self.rasterization.line_width = 1.0;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.rasterization.cull_mode = cull_mode;
        self.rasterization.front_face = front_face;
        self
    }

    pub fn with_multisampling(mut self, samples: vk::SampleCountFlags) -> Self {
        self.multisample.sample_shading_enable = vk::FALSE;
        self.multisample.rasterization_samples = samples;
        self.multisample.min_sample_shading = 1.0;
        self
    }

    pub fn with_blending_disabled(mut self) -> Self {
        // Default RGBA write mask
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        // Source replaces destination
        self.color_blend_attachment.blend_enable = vk::FALSE;
        self.color_blend_attachment.src_color_blend_factor = vk::BlendFactor::ONE;
        self.color_blend_attachment.dst_color_blend_factor = vk::BlendFactor::ZERO;
        self.color_blend_attachment.src_alpha_blend_factor = vk::BlendFactor::ONE;
        self.color_blend_attachment.dst_alpha_blend_factor = vk::BlendFactor::ZERO;
        self
    }

    pub fn with_depth_test(mut self, enable: bool, compare: Option<vk::CompareOp>) -> Self {
        self.depth_stencil.depth_test_enable = if enable { vk::TRUE } else { vk::FALSE };
        self.depth_stencil.depth_write_enable = if enable { vk::TRUE } else { vk::FALSE };
        self.depth_stencil.depth_compare_op = if enable {
            compare.unwrap_or(vk::CompareOp::LESS_OR_EQUAL)
        } else {
            vk::CompareOp::ALWAYS
        };
        self
    }

    pub fn build(self, device: &dyn RawDevice) -> Result<vk::Pipeline, GpuError> {
        let pipeline_layout = self.pipeline_layout.ok_or_else(|| GpuError::InvalidData {
            object: "graphics pipeline",
            reason: "no pipeline layout provided".into(),
        })?;
        if !self.stages.iter().any(|(stage, _)| *stage == vk::ShaderStageFlags::VERTEX) {
            return Err(GpuError::InvalidData {
                object: "graphics pipeline",
                reason: "no vertex stage provided".into(),
            });
        }

        let shader_stages: SmallVec<[vk::PipelineShaderStageCreateInfo<'_>; 5]> = self
            .stages
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(*module)
                    .name(c"main")
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .vertex_attribute_descriptions(&self.vertex_input.attributes);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let attachments = [self.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&attachments);

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .layout(pipeline_layout)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterization)
            .multisample_state(&self.multisample)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&self.depth_stencil)
            .render_pass(self.render_pass)
            .subpass(0)
            .base_pipeline_index(-1);
        if let Some(tessellation) = self.tessellation.as_ref() {
            pipeline_info = pipeline_info.tessellation_state(tessellation);
        }

        device
            .create_graphics_pipeline(&pipeline_info)
            .map_err(GpuError::vulkan(VkCall::CreateGraphicsPipelines))
    }

    fn default_input_assembly_info() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
    }

    fn default_rasterization_info() -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            // Discards all primitives before rasterization stage if true
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::FRONT)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            // No depth bias
            .depth_bias_enable(false)
            .depth_bias_constant_factor(0.0)
            .depth_bias_clamp(0.0)
            .depth_bias_slope_factor(0.0)
    }

    fn default_color_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
    }

    fn default_multisample_info() -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
    }

    fn default_depth_stencil_info() -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
    }
}

impl Default for GraphicsPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
