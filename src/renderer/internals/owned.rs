use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use ash::vk;
use crate::renderer::device::RawDevice;

/// What kind of API object an [`OwnedGpuObject`] wraps and how it is destroyed.
pub trait GpuObjectKind {
    type Handle: vk::Handle + Copy + Default + PartialEq + fmt::Debug;
    type Meta: fmt::Debug + Default;

    const NAME: &'static str;

    fn destroy(device: &dyn RawDevice, handle: Self::Handle);
}

/// A device object plus the memory bound to it, destroyed exactly once.
///
/// `release` may be called any number of times; the handle and memory fields are reset
/// to null after the first call. Dropping the wrapper releases it.
pub struct OwnedGpuObject<K: GpuObjectKind> {
    handle: K::Handle,
    memory: vk::DeviceMemory,
    meta: K::Meta,
    device: Arc<dyn RawDevice>,
    _kind: PhantomData<K>,
}

impl<K: GpuObjectKind> OwnedGpuObject<K> {
    pub(crate) fn from_raw(device: Arc<dyn RawDevice>, handle: K::Handle, meta: K::Meta) -> Self {
        Self {
            handle,
            memory: vk::DeviceMemory::null(),
            meta,
            device,
            _kind: PhantomData,
        }
    }

    pub(crate) fn attach_memory(&mut self, memory: vk::DeviceMemory) {
        debug_assert_eq!(self.memory, vk::DeviceMemory::null());
        self.memory = memory;
    }

    pub fn handle(&self) -> K::Handle {
        self.handle
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn meta(&self) -> &K::Meta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut K::Meta {
        &mut self.meta
    }

    pub fn device(&self) -> &Arc<dyn RawDevice> {
        &self.device
    }

    pub fn is_released(&self) -> bool {
        self.handle == K::Handle::default() && self.memory == vk::DeviceMemory::null()
    }

    pub fn release(&mut self) {
        if self.handle != K::Handle::default() {
            K::destroy(self.device.as_ref(), self.handle);
            self.handle = K::Handle::default();
        }
        if self.memory != vk::DeviceMemory::null() {
            self.device.free_memory(self.memory);
            self.memory = vk::DeviceMemory::null();
        }
    }
}

impl<K: GpuObjectKind> Drop for OwnedGpuObject<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: GpuObjectKind> fmt::Debug for OwnedGpuObject<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME)
            .field("handle", &self.handle)
            .field("memory", &self.memory)
            .field("meta", &self.meta)
            .finish()
    }
}
