//! Test doubles: a recording [`RawDevice`] and a small SPIR-V assembler.

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};
use ash::vk;
use ash::vk::Handle;
use crate::renderer::device::{DeviceContext, RawDevice};
use crate::renderer::resources::image::texel_size;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: types.len() as u32,
        memory_heap_count: 1,
        ..Default::default()
    };
    for (slot, flags) in props.memory_types.iter_mut().zip(types) {
        *slot = vk::MemoryType {
            property_flags: *flags,
            heap_index: 0,
        };
    }
    props.memory_heaps[0] = vk::MemoryHeap {
        size: 256 << 20,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };
    props
}

/// One memory type that satisfies the factory's default requirements.
pub fn full_memory_properties() -> vk::PhysicalDeviceMemoryProperties {
    memory_properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT
            | vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateBuffer,
    CreateImage,
    AllocateMemory,
    MapMemory,
    CreateShaderModule,
    CreateDescriptorSetLayout,
    CreateDescriptorPool,
    AllocateDescriptorSets,
    CreatePipelineLayout,
    CreatePipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Buffer,
    Image,
    Memory,
    ImageView,
    Sampler,
    ShaderModule,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    PipelineLayout,
    Pipeline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub set: vk::DescriptorSet,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub buffer_range: Option<vk::DeviceSize>,
    pub image_view: Option<vk::ImageView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug, Clone)]
pub struct RecordedPipeline {
    pub handle: vk::Pipeline,
    pub stages: Vec<vk::ShaderStageFlags>,
    pub entry_points: Vec<String>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub patch_control_points: Option<u32>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub stencil_test: bool,
    pub blend_enable: bool,
    pub viewport: (f32, f32),
    pub dynamic_state: bool,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    live: HashMap<u64, ObjectType>,
    created: HashMap<ObjectType, usize>,
    buffer_sizes: HashMap<u64, vk::DeviceSize>,
    images: HashMap<u64, (vk::Extent3D, vk::Format)>,
    memory: HashMap<u64, Box<[u8]>>,
    mapped: HashSet<u64>,
    bound: HashMap<u64, u64>,
    failures: HashSet<FailPoint>,
    invalid_destroys: usize,
    layouts: Vec<(vk::DescriptorSetLayout, Vec<RecordedLayoutBinding>)>,
    pools: Vec<(u32, Vec<vk::DescriptorPoolSize>)>,
    writes: Vec<RecordedWrite>,
    update_calls: usize,
    pipelines: Vec<RecordedPipeline>,
    commands: Vec<String>,
}

impl MockState {
    fn create(&mut self, kind: ObjectType) -> u64 {
        self.next_handle += 1;
        let raw = 0x1000 + self.next_handle;
        if kind != ObjectType::DescriptorSet {
            self.live.insert(raw, kind);
        }
        *self.created.entry(kind).or_default() += 1;
        raw
    }

    fn destroy(&mut self, raw: u64, kind: ObjectType) {
        if raw == 0 {
            return;
        }
        match self.live.remove(&raw) {
            Some(found) if found == kind => {}
            _ => self.invalid_destroys += 1,
        }
    }

    fn check(&self, point: FailPoint) -> Result<(), vk::Result> {
        if self.failures.contains(&point) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        } else {
            Ok(())
        }
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

/// A device that hands out fake handles, backs memory with host allocations and records what
/// was asked of it.
pub struct MockDevice {
    state: Mutex<MockState>,
    memory_type_bits: u32,
    row_alignment: u64,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            memory_type_bits: u32::MAX,
            row_alignment: 64,
        }
    }

    pub fn with_memory_type_bits(mut self, bits: u32) -> Self {
        self.memory_type_bits = bits;
        self
    }

    /// A mock and a context over it with [`full_memory_properties`].
    pub fn context() -> (Arc<MockDevice>, DeviceContext) {
        Self::new().into_context(full_memory_properties())
    }

    pub fn into_context(self, props: vk::PhysicalDeviceMemoryProperties) -> (Arc<MockDevice>, DeviceContext) {
        let mock = Arc::new(self);
        let device: Arc<dyn RawDevice> = mock.clone();
        (mock, DeviceContext::new(device, props))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail(&self, point: FailPoint) {
        self.state().failures.insert(point);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn live_of(&self, kind: ObjectType) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    pub fn created(&self, kind: ObjectType) -> usize {
        self.state().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn invalid_destroys(&self) -> usize {
        self.state().invalid_destroys
    }

    pub fn memory_bytes(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state()
            .memory
            .get(&memory.as_raw())
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default()
    }

    pub fn is_mapped(&self, memory: vk::DeviceMemory) -> bool {
        self.state().mapped.contains(&memory.as_raw())
    }

    pub fn bound_memory(&self, object: u64) -> Option<u64> {
        self.state().bound.get(&object).copied()
    }

    pub fn layouts(&self) -> Vec<Vec<RecordedLayoutBinding>> {
        self.state().layouts.iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn pools(&self) -> Vec<(u32, Vec<vk::DescriptorPoolSize>)> {
        self.state().pools.clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    pub fn update_calls(&self) -> usize {
        self.state().update_calls
    }

    pub fn pipelines(&self) -> Vec<RecordedPipeline> {
        self.state().pipelines.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    fn row_pitch(&self, extent: vk::Extent3D, format: vk::Format) -> u64 {
        let tight = u64::from(extent.width) * texel_size(format).unwrap_or(4);
        tight.div_ceil(self.row_alignment) * self.row_alignment
    }
}

impl RawDevice for MockDevice {
    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> Result<vk::Buffer, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreateBuffer)?;
        let raw = state.create(ObjectType::Buffer);
        state.buffer_sizes.insert(raw, info.size);
        Ok(vk::Buffer::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.state().destroy(buffer.as_raw(), ObjectType::Buffer);
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self
            .state()
            .buffer_sizes
            .get(&buffer.as_raw())
            .copied()
            .unwrap_or(0);
        vk::MemoryRequirements {
            size: size.div_ceil(16) * 16,
            alignment: 16,
            memory_type_bits: self.memory_type_bits,
        }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> Result<(), vk::Result> {
        self.state().bound.insert(buffer.as_raw(), memory.as_raw());
        Ok(())
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreateImage)?;
        let raw = state.create(ObjectType::Image);
        state.images.insert(raw, (info.extent, info.format));
        Ok(vk::Image::from_raw(raw))
    }

    fn destroy_image(&self, image: vk::Image) {
        self.state().destroy(image.as_raw(), ObjectType::Image);
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let (extent, format) = self
            .state()
            .images
            .get(&image.as_raw())
            .copied()
            .unwrap_or_default();
        let size = self.row_pitch(extent, format) * u64::from(extent.height) * u64::from(extent.depth);
        vk::MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits: self.memory_type_bits,
        }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<(), vk::Result> {
        self.state().bound.insert(image.as_raw(), memory.as_raw());
        Ok(())
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        _subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        let (extent, format) = self
            .state()
            .images
            .get(&image.as_raw())
            .copied()
            .unwrap_or_default();
        let row_pitch = self.row_pitch(extent, format);
        vk::SubresourceLayout {
            offset: 0,
            size: row_pitch * u64::from(extent.height) * u64::from(extent.depth),
            row_pitch,
            array_pitch: 0,
            depth_pitch: row_pitch * u64::from(extent.height),
        }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> Result<vk::DeviceMemory, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::AllocateMemory)?;
        let raw = state.create(ObjectType::Memory);
        state
            .memory
            .insert(raw, vec![0u8; info.allocation_size as usize].into_boxed_slice());
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state();
        state.destroy(memory.as_raw(), ObjectType::Memory);
        state.memory.remove(&memory.as_raw());
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<*mut c_void, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::MapMemory)?;
        let raw = memory.as_raw();
        let len = state
            .memory
            .get(&raw)
            .map(|block| block.len() as u64)
            .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        if offset.saturating_add(size) > len || !state.mapped.insert(raw) {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let block = state
            .memory
            .get_mut(&raw)
            .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        Ok(unsafe { block.as_mut_ptr().add(offset as usize) }.cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.state().mapped.remove(&memory.as_raw());
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result> {
        Ok(vk::ImageView::from_raw(self.state().create(ObjectType::ImageView)))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state().destroy(view.as_raw(), ObjectType::ImageView);
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result> {
        Ok(vk::Sampler::from_raw(self.state().create(ObjectType::Sampler)))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.state().destroy(sampler.as_raw(), ObjectType::Sampler);
    }

    fn create_shader_module(&self, _code: &[u32]) -> Result<vk::ShaderModule, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreateShaderModule)?;
        Ok(vk::ShaderModule::from_raw(state.create(ObjectType::ShaderModule)))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state().destroy(module.as_raw(), ObjectType::ShaderModule);
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreateDescriptorSetLayout)?;
        let bindings = unsafe { raw_slice(info.p_bindings, info.binding_count) }
            .iter()
            .map(|b| RecordedLayoutBinding {
                binding: b.binding,
                descriptor_type: b.descriptor_type,
                count: b.descriptor_count,
                stages: b.stage_flags,
            })
            .collect();
        let layout = vk::DescriptorSetLayout::from_raw(state.create(ObjectType::DescriptorSetLayout));
        state.layouts.push((layout, bindings));
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state().destroy(layout.as_raw(), ObjectType::DescriptorSetLayout);
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreateDescriptorPool)?;
        let sizes = unsafe { raw_slice(info.p_pool_sizes, info.pool_size_count) }.to_vec();
        state.pools.push((info.max_sets, sizes));
        Ok(vk::DescriptorPool::from_raw(state.create(ObjectType::DescriptorPool)))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state().destroy(pool.as_raw(), ObjectType::DescriptorPool);
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::AllocateDescriptorSets)?;
        if !state.live.contains_key(&info.descriptor_pool.as_raw()) {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        Ok((0..info.descriptor_set_count)
            .map(|_| vk::DescriptorSet::from_raw(state.create(ObjectType::DescriptorSet)))
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        let mut state = self.state();
        state.update_calls += 1;
        for write in writes {
            let buffer = unsafe { raw_slice(write.p_buffer_info, write.descriptor_count) }.first();
            let image = unsafe { raw_slice(write.p_image_info, write.descriptor_count) }.first();
            state.writes.push(RecordedWrite {
                set: write.dst_set,
                binding: write.dst_binding,
                descriptor_type: write.descriptor_type,
                count: write.descriptor_count,
                buffer_range: buffer.map(|b| b.range),
                image_view: image.map(|i| i.image_view),
            });
        }
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreatePipelineLayout)?;
        Ok(vk::PipelineLayout::from_raw(state.create(ObjectType::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state().destroy(layout.as_raw(), ObjectType::PipelineLayout);
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> Result<vk::Pipeline, vk::Result> {
        let mut state = self.state();
        state.check(FailPoint::CreatePipeline)?;
        let handle = vk::Pipeline::from_raw(state.create(ObjectType::Pipeline));

        // SAFETY: every pointer in a create info stays valid for the duration of the call.
        let recorded = unsafe {
            let stages = raw_slice(info.p_stages, info.stage_count);
            let vertex_input = &*info.p_vertex_input_state;
            let assembly = &*info.p_input_assembly_state;
            let raster = &*info.p_rasterization_state;
            let multisample = &*info.p_multisample_state;
            let depth = &*info.p_depth_stencil_state;
            let blend = &*info.p_color_blend_state;
            let viewport_state = &*info.p_viewport_state;
            let viewport = raw_slice(viewport_state.p_viewports, viewport_state.viewport_count)
                .first()
                .map(|v| (v.width, v.height))
                .unwrap_or_default();
            RecordedPipeline {
                handle,
                stages: stages.iter().map(|s| s.stage).collect(),
                entry_points: stages
                    .iter()
                    .map(|s| {
                        if s.p_name.is_null() {
                            String::new()
                        } else {
                            std::ffi::CStr::from_ptr(s.p_name).to_string_lossy().into_owned()
                        }
                    })
                    .collect(),
                vertex_bindings: raw_slice(
                    vertex_input.p_vertex_binding_descriptions,
                    vertex_input.vertex_binding_description_count,
                )
                .to_vec(),
                vertex_attributes: raw_slice(
                    vertex_input.p_vertex_attribute_descriptions,
                    vertex_input.vertex_attribute_description_count,
                )
                .to_vec(),
                topology: assembly.topology,
                patch_control_points: info
                    .p_tessellation_state
                    .as_ref()
                    .map(|t| t.patch_control_points),
                polygon_mode: raster.polygon_mode,
                cull_mode: raster.cull_mode,
                front_face: raster.front_face,
                samples: multisample.rasterization_samples,
                depth_test: depth.depth_test_enable == vk::TRUE,
                depth_write: depth.depth_write_enable == vk::TRUE,
                depth_compare: depth.depth_compare_op,
                stencil_test: depth.stencil_test_enable == vk::TRUE,
                blend_enable: raw_slice(blend.p_attachments, blend.attachment_count)
                    .iter()
                    .any(|a| a.blend_enable == vk::TRUE),
                viewport,
                dynamic_state: !info.p_dynamic_state.is_null(),
                layout: info.layout,
                render_pass: info.render_pass,
                subpass: info.subpass,
            }
        };
        state.pipelines.push(recorded);
        Ok(handle)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state().destroy(pipeline.as_raw(), ObjectType::Pipeline);
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.state().commands.push("bind_pipeline".into());
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    ) {
        self.state()
            .commands
            .push(format!("bind_descriptor_sets:{}", sets.len()));
    }

    fn cmd_bind_vertex_buffers(
        &self,
        _cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        _offsets: &[vk::DeviceSize],
    ) {
        self.state()
            .commands
            .push(format!("bind_vertex_buffers:{first_binding}:{}", buffers.len()));
    }

    fn cmd_bind_index_buffer(&self, _cmd: vk::CommandBuffer, _buffer: vk::Buffer, index_type: vk::IndexType) {
        self.state()
            .commands
            .push(format!("bind_index_buffer:{index_type:?}"));
    }

    fn cmd_draw_indexed(&self, _cmd: vk::CommandBuffer, index_count: u32, instance_count: u32) {
        self.state()
            .commands
            .push(format!("draw_indexed:{index_count}:{instance_count}"));
    }
}

/// Assembles just enough of a SPIR-V module for interface reflection.
pub struct SpirvBuilder {
    model: u32,
    next_id: u32,
    function: u32,
    interface: Vec<u32>,
    annotations: Vec<u32>,
    declarations: Vec<u32>,
    uint: Option<u32>,
}

pub mod storage {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const UNIFORM: u32 = 2;
    pub const OUTPUT: u32 = 3;
    pub const PUSH_CONSTANT: u32 = 9;
    pub const STORAGE_BUFFER: u32 = 12;
}

fn instruction(out: &mut Vec<u32>, opcode: u32, operands: &[u32]) {
    out.push(((operands.len() as u32 + 1) << 16) | opcode);
    out.extend_from_slice(operands);
}

fn string_words(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl SpirvBuilder {
    /// `model` is the SPIR-V execution model: 0 vertex, 1/2 tessellation, 3 geometry, 4 fragment.
    pub fn new(model: u32) -> Self {
        Self {
            model,
            next_id: 2,
            function: 1,
            interface: Vec::new(),
            annotations: Vec::new(),
            declarations: Vec::new(),
            uint: None,
        }
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn declare(&mut self, opcode: u32, operands: &[u32]) -> u32 {
        let id = self.id();
        let mut words = vec![id];
        words.extend_from_slice(operands);
        instruction(&mut self.declarations, opcode, &words);
        id
    }

    pub fn decorate(&mut self, target: u32, decoration: u32, literals: &[u32]) {
        let mut words = vec![target, decoration];
        words.extend_from_slice(literals);
        instruction(&mut self.annotations, 71, &words);
    }

    pub fn member_decorate(&mut self, target: u32, member: u32, decoration: u32, literals: &[u32]) {
        let mut words = vec![target, member, decoration];
        words.extend_from_slice(literals);
        instruction(&mut self.annotations, 72, &words);
    }

    pub fn name(&mut self, target: u32, name: &str) {
        let mut words = vec![target];
        words.extend(string_words(name));
        instruction(&mut self.annotations, 5, &words);
    }

    pub fn bool(&mut self) -> u32 {
        self.declare(20, &[])
    }

    pub fn int(&mut self, width: u32, signed: bool) -> u32 {
        self.declare(21, &[width, u32::from(signed)])
    }

    pub fn float(&mut self, width: u32) -> u32 {
        self.declare(22, &[width])
    }

    pub fn vector(&mut self, component: u32, count: u32) -> u32 {
        self.declare(23, &[component, count])
    }

    pub fn matrix(&mut self, column: u32, columns: u32) -> u32 {
        self.declare(24, &[column, columns])
    }

    pub fn sampled_image_type(&mut self) -> u32 {
        let float = self.float(32);
        // 2D, no depth, not arrayed, single-sampled, sampled, unknown format
        let image = self.declare(25, &[float, 1, 0, 0, 0, 1, 0]);
        self.declare(27, &[image])
    }

    pub fn sampler_type(&mut self) -> u32 {
        self.declare(26, &[])
    }

    pub fn constant_u32(&mut self, value: u32) -> u32 {
        let uint = match self.uint {
            Some(uint) => uint,
            None => {
                let uint = self.int(32, false);
                self.uint = Some(uint);
                uint
            }
        };
        let id = self.id();
        instruction(&mut self.declarations, 43, &[uint, id, value]);
        id
    }

    pub fn constant_u64(&mut self, value: u64) -> u32 {
        let ulong = self.int(64, false);
        let id = self.id();
        instruction(&mut self.declarations, 43, &[ulong, id, value as u32, (value >> 32) as u32]);
        id
    }

    pub fn array(&mut self, element: u32, length_id: u32, stride: Option<u32>) -> u32 {
        let id = self.declare(28, &[element, length_id]);
        if let Some(stride) = stride {
            self.decorate(id, 6, &[stride]);
        }
        id
    }

    pub fn runtime_array(&mut self, element: u32) -> u32 {
        self.declare(29, &[element])
    }

    /// A struct with explicit member offsets.
    pub fn structure(&mut self, members: &[u32], offsets: &[u32]) -> u32 {
        let id = self.declare(30, members);
        for (member, offset) in offsets.iter().enumerate() {
            self.member_decorate(id, member as u32, 35, &[*offset]);
        }
        id
    }

    pub fn member_matrix_stride(&mut self, target: u32, member: u32, stride: u32) {
        self.member_decorate(target, member, 5, &[]);
        self.member_decorate(target, member, 7, &[stride]);
    }

    pub fn member_row_major(&mut self, target: u32, member: u32) {
        self.member_decorate(target, member, 4, &[]);
    }

    pub fn pointer(&mut self, storage: u32, pointee: u32) -> u32 {
        self.declare(32, &[storage, pointee])
    }

    pub fn variable(&mut self, storage: u32, pointee: u32) -> u32 {
        let pointer = self.pointer(storage, pointee);
        let id = self.id();
        instruction(&mut self.declarations, 59, &[pointer, id, storage]);
        if storage == storage::INPUT || storage == storage::OUTPUT {
            self.interface.push(id);
        }
        id
    }

    pub fn input(&mut self, ty: u32, location: u32) -> u32 {
        let id = self.variable(storage::INPUT, ty);
        self.decorate(id, 30, &[location]);
        id
    }

    pub fn builtin_input(&mut self, ty: u32, built_in: u32) -> u32 {
        let id = self.variable(storage::INPUT, ty);
        self.decorate(id, 11, &[built_in]);
        id
    }

    /// `ty` is a struct (decorated Block here) or an array of one.
    pub fn uniform_block(&mut self, set: u32, binding: u32, block: u32, ty: u32) -> u32 {
        self.decorate(block, 2, &[]);
        let id = self.variable(storage::UNIFORM, ty);
        self.decorate(id, 34, &[set]);
        self.decorate(id, 33, &[binding]);
        id
    }

    pub fn uniform_constant(&mut self, set: u32, binding: u32, ty: u32) -> u32 {
        let id = self.variable(storage::UNIFORM_CONSTANT, ty);
        self.decorate(id, 34, &[set]);
        self.decorate(id, 33, &[binding]);
        id
    }

    /// The id the next declaration will get, for modules that refer to themselves.
    pub fn peek_id(&self) -> u32 {
        self.next_id
    }

    pub fn finish(&self) -> Vec<u32> {
        let (void, fn_type, label) = (self.next_id, self.next_id + 1, self.next_id + 2);
        let mut words = vec![0x0723_0203, 0x0001_0000, 0, label + 1, 0];
        // Capability Shader, MemoryModel Logical GLSL450
        instruction(&mut words, 17, &[1]);
        instruction(&mut words, 14, &[0, 1]);
        let mut entry = vec![self.model, self.function];
        entry.extend(string_words("main"));
        entry.extend_from_slice(&self.interface);
        instruction(&mut words, 15, &entry);
        words.extend_from_slice(&self.annotations);
        words.extend_from_slice(&self.declarations);
        // void main() { return; }
        instruction(&mut words, 19, &[void]);
        instruction(&mut words, 33, &[fn_type, void]);
        instruction(&mut words, 54, &[void, self.function, 0, fn_type]);
        instruction(&mut words, 248, &[label]);
        instruction(&mut words, 253, &[]);
        instruction(&mut words, 56, &[]);
        words
    }

    pub fn finish_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.finish()).to_vec()
    }
}

/// Compiles GLSL to SPIR-V words through naga.
pub fn compile_glsl(source: &str, stage: naga::ShaderStage) -> Vec<u32> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(stage), source)
        .expect("GLSL should parse");
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .expect("module should validate");
    naga::back::spv::write_vec(&module, &info, &naga::back::spv::Options::default(), None)
        .expect("SPIR-V output")
}
