use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::pipeline::reflection::BindingInfo;

pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl DescriptorSetLayoutBuilder<'_> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(descriptor_count)
            .stage_flags(stages);

        self.bindings.push(binding);
        self
    }

    pub fn add_binding_for_info(self, info: &BindingInfo) -> Self {
        self.add_binding(
            info.binding,
            info.kind.descriptor_type(),
            info.count,
            info.stages,
        )
    }

    pub fn build(self, device: &dyn RawDevice) -> Result<vk::DescriptorSetLayout, GpuError> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings);

        device
            .create_descriptor_set_layout(&layout_info)
            .map_err(GpuError::vulkan(VkCall::CreateDescriptorSetLayout))
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}
