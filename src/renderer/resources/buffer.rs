use std::sync::Arc;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::internals::memory::{self, MappedMemory};
use crate::renderer::internals::owned::{GpuObjectKind, OwnedGpuObject};

pub struct BufferKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct BufferMeta {
    pub size: vk::DeviceSize,
    pub allocation_size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl GpuObjectKind for BufferKind {
    type Handle = vk::Buffer;
    type Meta = BufferMeta;

    const NAME: &'static str = "Buffer";

    fn destroy(device: &dyn RawDevice, handle: vk::Buffer) {
        device.destroy_buffer(handle);
    }
}

pub type Buffer = OwnedGpuObject<BufferKind>;

impl OwnedGpuObject<BufferKind> {
    /// Creates a buffer sized to `data`, backs it with host-visible memory and fills it.
    pub fn new(
        data: &[u8],
        usage: vk::BufferUsageFlags,
        required: vk::MemoryPropertyFlags,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        device: Arc<dyn RawDevice>,
    ) -> Result<Self, GpuError> {
        if data.is_empty() {
            return Err(GpuError::InvalidData {
                object: "buffer",
                reason: "no data to upload".into(),
            });
        }

        let buffer = {
            let info = vk::BufferCreateInfo::default()
                .size(data.len() as vk::DeviceSize)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            device
                .create_buffer(&info)
                .map_err(GpuError::vulkan(VkCall::CreateBuffer))?
        };
        let meta = BufferMeta {
            size: data.len() as vk::DeviceSize,
            allocation_size: 0,
            usage,
        };
        let mut buffer = Self::from_raw(device.clone(), buffer, meta);

        let requirements = device.buffer_memory_requirements(buffer.handle());
        let memory = memory::allocate(
            device.as_ref(),
            memory_properties,
            requirements,
            required,
            "buffer",
        )?;
        buffer.attach_memory(memory);
        buffer.meta_mut().allocation_size = requirements.size;

        MappedMemory::map(device.as_ref(), memory, requirements.size)?.write(0, data)?;

        device
            .bind_buffer_memory(buffer.handle(), memory)
            .map_err(GpuError::vulkan(VkCall::BindBufferMemory))?;

        log::debug!("Created {usage:?} buffer of {} bytes", data.len());
        Ok(buffer)
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.meta().size
    }

    /// Overwrites part of the buffer contents through a fresh mapping.
    pub fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<(), GpuError> {
        self.check_range(offset, data.len() as vk::DeviceSize)?;
        MappedMemory::map(self.device().as_ref(), self.memory(), self.meta().allocation_size)?
            .write(offset as usize, data)
    }

    pub fn write_pod<T: bytemuck::Pod>(&mut self, offset: vk::DeviceSize, value: &T) -> Result<(), GpuError> {
        self.write(offset, bytemuck::bytes_of(value))
    }

    pub fn read(&self, offset: vk::DeviceSize, len: usize) -> Result<Vec<u8>, GpuError> {
        self.check_range(offset, len as vk::DeviceSize)?;
        MappedMemory::map(self.device().as_ref(), self.memory(), self.meta().allocation_size)?
            .read(offset as usize, len)
    }

    /// Describes `range` bytes from `offset` for a uniform-buffer descriptor write.
    pub fn descriptor(&self, offset: vk::DeviceSize, range: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle(),
            offset,
            range,
        }
    }

    fn check_range(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<(), GpuError> {
        if self.is_released() {
            return Err(GpuError::InvalidData {
                object: "buffer",
                reason: "already released".into(),
            });
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(GpuError::InvalidData {
                object: "buffer",
                reason: format!("{len} bytes at {offset} exceed size {}", self.size()),
            }),
        }
    }
}
