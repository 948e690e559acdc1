use std::ffi::c_void;
use std::sync::Arc;
use ash::vk;

/// The slice of the Vulkan device API this crate drives.
///
/// Every resource, pipeline and descriptor object is created and destroyed through this trait,
/// so the whole binding layer can run against a recording device in tests. Implementations
/// must treat the handles they hand out as owned by the caller until the matching
/// `destroy_*`/`free_*` call.
pub trait RawDevice: Send + Sync {
    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> Result<vk::Buffer, vk::Result>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> Result<(), vk::Result>;

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image, vk::Result>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<(), vk::Result>;
    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout;

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> Result<vk::DeviceMemory, vk::Result>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<*mut c_void, vk::Result>;
    fn unmap_memory(&self, memory: vk::DeviceMemory);

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule, vk::Result>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout, vk::Result>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> Result<vk::Pipeline, vk::Result>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    );
    fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );
    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, index_type: vk::IndexType);
    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32);
}

impl RawDevice for ash::Device {
    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> Result<vk::Buffer, vk::Result> {
        unsafe { ash::Device::create_buffer(self, info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { ash::Device::destroy_buffer(self, buffer, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> Result<(), vk::Result> {
        unsafe { ash::Device::bind_buffer_memory(self, buffer, memory, 0) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image, vk::Result> {
        unsafe { ash::Device::create_image(self, info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { ash::Device::destroy_image(self, image, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<(), vk::Result> {
        unsafe { ash::Device::bind_image_memory(self, image, memory, 0) }
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        unsafe { self.get_image_subresource_layout(image, subresource) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> Result<vk::DeviceMemory, vk::Result> {
        unsafe { ash::Device::allocate_memory(self, info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { ash::Device::free_memory(self, memory, None) }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<*mut c_void, vk::Result> {
        unsafe { ash::Device::map_memory(self, memory, offset, size, vk::MemoryMapFlags::empty()) }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { ash::Device::unmap_memory(self, memory) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result> {
        unsafe { ash::Device::create_image_view(self, info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { ash::Device::destroy_image_view(self, view, None) }
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result> {
        unsafe { ash::Device::create_sampler(self, info, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { ash::Device::destroy_sampler(self, sampler, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule, vk::Result> {
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { ash::Device::create_shader_module(self, &info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { ash::Device::destroy_shader_module(self, module, None) }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result> {
        unsafe { ash::Device::create_descriptor_set_layout(self, info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { ash::Device::destroy_descriptor_set_layout(self, layout, None) }
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result> {
        unsafe { ash::Device::create_descriptor_pool(self, info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { ash::Device::destroy_descriptor_pool(self, pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        unsafe { ash::Device::allocate_descriptor_sets(self, info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { ash::Device::update_descriptor_sets(self, writes, &[]) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout, vk::Result> {
        unsafe { ash::Device::create_pipeline_layout(self, info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { ash::Device::destroy_pipeline_layout(self, layout, None) }
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> Result<vk::Pipeline, vk::Result> {
        let pipelines = unsafe {
            ash::Device::create_graphics_pipelines(
                self,
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        }
        .map_err(|(_, result)| result)?;
        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { ash::Device::destroy_pipeline(self, pipeline, None) }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe { ash::Device::cmd_bind_pipeline(self, cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            ash::Device::cmd_bind_descriptor_sets(
                self,
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            )
        }
    }

    fn cmd_bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe { ash::Device::cmd_bind_vertex_buffers(self, cmd, first_binding, buffers, offsets) }
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe { ash::Device::cmd_bind_index_buffer(self, cmd, buffer, 0, index_type) }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32) {
        unsafe { ash::Device::cmd_draw_indexed(self, cmd, index_count, instance_count, 0, 0, 0) }
    }
}

/// A logical device together with the memory-type table of the physical device it was made from.
#[derive(Clone)]
pub struct DeviceContext {
    pub device: Arc<dyn RawDevice>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl DeviceContext {
    pub fn new(device: Arc<dyn RawDevice>, memory_properties: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self {
            device,
            memory_properties,
        }
    }

    pub fn from_ash(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
    ) -> Self {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        log::debug!(
            "Device exposes {} memory types over {} heaps",
            memory_properties.memory_type_count,
            memory_properties.memory_heap_count,
        );
        Self::new(Arc::new(device), memory_properties)
    }
}
