use ash::vk;

/// Options that change how shaders are reflected into a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineParameters {
    /// One vertex buffer binding per input instead of a single interleaved binding 0.
    pub separated_attributes: bool,
}

/// The render pass and frame size pipelines are baked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub render_pass: vk::RenderPass,
    pub samples: vk::SampleCountFlags,
    pub extent: vk::Extent2D,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            samples: vk::SampleCountFlags::TYPE_1,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
        }
    }
}

/// Contains the memory requirements applied to every buffer and image the factory creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryConfig {
    pub required_memory_flags: vk::MemoryPropertyFlags,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            required_memory_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }
}
