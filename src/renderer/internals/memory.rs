use std::ffi::c_void;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};

/// Returns the lowest memory-type index allowed by `type_bits` whose property flags contain
/// every flag in `required`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count).find(|&index| {
        type_bits & (1 << index) != 0
            && properties.memory_types[index as usize]
                .property_flags
                .contains(required)
    })
}

/// Allocates memory matching `requirements` from the first suitable type.
pub(crate) fn allocate(
    device: &dyn RawDevice,
    properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    required: vk::MemoryPropertyFlags,
    object: &'static str,
) -> Result<vk::DeviceMemory, GpuError> {
    let memory_type_index = find_memory_type(properties, requirements.memory_type_bits, required)
        .ok_or_else(|| {
            log::warn!(
                "No memory type with {required:?} among bits {:#b} for {object}",
                requirements.memory_type_bits,
            );
            GpuError::NoSuitableMemoryType {
                object,
                size: requirements.size,
                required,
                type_bits: requirements.memory_type_bits,
            }
        })?;

    let info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    device
        .allocate_memory(&info)
        .map_err(GpuError::vulkan(VkCall::AllocateMemory))
}

/// A host mapping of a whole allocation, unmapped on drop.
pub(crate) struct MappedMemory<'a> {
    device: &'a dyn RawDevice,
    memory: vk::DeviceMemory,
    ptr: *mut c_void,
    size: usize,
}

impl<'a> MappedMemory<'a> {
    pub fn map(
        device: &'a dyn RawDevice,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
    ) -> Result<Self, GpuError> {
        let len = usize::try_from(size).map_err(|_| GpuError::InvalidData {
            object: "mapping",
            reason: format!("{size} bytes don't fit the host address space"),
        })?;
        let ptr = device
            .map_memory(memory, 0, size)
            .map_err(GpuError::vulkan(VkCall::MapMemory))?;
        if ptr.is_null() {
            device.unmap_memory(memory);
            return Err(GpuError::Copy("mapping returned a null pointer".into()));
        }
        Ok(Self {
            device,
            memory,
            ptr,
            size: len,
        })
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), GpuError> {
        presser::copy_from_slice_to_offset(data, self, offset)
            .map(|_| ())
            .map_err(|e| GpuError::Copy(format!("{e:?}")))
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, GpuError> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.size)
            .ok_or_else(|| {
                GpuError::Copy(format!("read of {len} bytes at {offset} exceeds {} bytes", self.size))
            })?;
        let bytes =
            unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>().add(offset), end - offset) };
        Ok(bytes.to_vec())
    }
}

// SAFETY: the mapping covers `size` bytes and stays valid until `self` is dropped.
unsafe impl presser::Slab for MappedMemory<'_> {
    fn base_ptr(&self) -> *const u8 {
        self.ptr.cast::<u8>()
    }

    fn base_ptr_mut(&mut self) -> *mut u8 {
        self.ptr.cast::<u8>()
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MappedMemory<'_> {
    fn drop(&mut self) {
        self.device.unmap_memory(self.memory);
    }
}
