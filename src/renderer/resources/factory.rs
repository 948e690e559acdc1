use std::sync::Arc;
use ash::vk;
use slotmap::{new_key_type, SlotMap};
use crate::renderer::config::FactoryConfig;
use crate::renderer::device::{DeviceContext, RawDevice};
use crate::renderer::error::GpuError;
use crate::renderer::resources::buffer::Buffer;
use crate::renderer::resources::image::{Image, ImageDesc};
use crate::renderer::resources::image_view::ImageView;
use crate::renderer::resources::sampler::Sampler;

new_key_type! {
    pub struct BufferKey;
    pub struct ImageKey;
    pub struct ImageViewKey;
    pub struct SamplerKey;
}

/// Creates buffers, images, views and samplers for one device and owns them until released.
///
/// Every allocation is placed in the lowest memory type that carries all of
/// [`FactoryConfig::required_memory_flags`].
pub struct ResourceFactory {
    context: DeviceContext,
    config: FactoryConfig,

    buffers: SlotMap<BufferKey, Buffer>,
    images: SlotMap<ImageKey, Image>,
    image_views: SlotMap<ImageViewKey, ImageView>,
    samplers: SlotMap<SamplerKey, Sampler>,
}

impl ResourceFactory {
    pub fn new(context: DeviceContext, config: FactoryConfig) -> Self {
        Self {
            context,
            config,
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            image_views: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
        }
    }

    pub fn device(&self) -> &Arc<dyn RawDevice> {
        &self.context.device
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.context.memory_properties
    }

    pub fn create_buffer(&mut self, data: &[u8], usage: vk::BufferUsageFlags) -> Result<BufferKey, GpuError> {
        let buffer = Buffer::new(
            data,
            usage,
            self.config.required_memory_flags,
            &self.context.memory_properties,
            self.context.device.clone(),
        )
        .inspect_err(|e| log::warn!("Buffer creation failed: {e}"))?;
        Ok(self.buffers.insert(buffer))
    }

    pub fn create_image(&mut self, desc: &ImageDesc, data: &[u8]) -> Result<ImageKey, GpuError> {
        let image = Image::new(
            desc,
            data,
            self.config.required_memory_flags,
            &self.context.memory_properties,
            self.context.device.clone(),
        )
        .inspect_err(|e| log::warn!("Image creation failed: {e}"))?;
        Ok(self.images.insert(image))
    }

    pub fn create_image_view(&mut self, info: &vk::ImageViewCreateInfo<'_>) -> Result<ImageViewKey, GpuError> {
        let view = ImageView::new(info, self.context.device.clone())?;
        Ok(self.image_views.insert(view))
    }

    /// A view covering every mip level of a factory-owned image.
    pub fn create_view_for_image(&mut self, image: ImageKey) -> Result<ImageViewKey, GpuError> {
        let image = self.images.get(image).ok_or_else(|| GpuError::InvalidData {
            object: "image view",
            reason: "unknown image".into(),
        })?;
        let view = ImageView::for_image(image)?;
        Ok(self.image_views.insert(view))
    }

    pub fn create_sampler(&mut self, info: &vk::SamplerCreateInfo<'_>) -> Result<SamplerKey, GpuError> {
        let sampler = Sampler::new(info, self.context.device.clone())?;
        Ok(self.samplers.insert(sampler))
    }

    pub fn buffer(&self, key: BufferKey) -> Option<&Buffer> {
        self.buffers.get(key)
    }

    pub fn buffer_mut(&mut self, key: BufferKey) -> Option<&mut Buffer> {
        self.buffers.get_mut(key)
    }

    pub fn image(&self, key: ImageKey) -> Option<&Image> {
        self.images.get(key)
    }

    pub fn image_view(&self, key: ImageViewKey) -> Option<&ImageView> {
        self.image_views.get(key)
    }

    pub fn sampler(&self, key: SamplerKey) -> Option<&Sampler> {
        self.samplers.get(key)
    }

    /// Hands ownership of a buffer to the caller.
    pub fn take_buffer(&mut self, key: BufferKey) -> Option<Buffer> {
        self.buffers.remove(key)
    }

    pub fn take_image(&mut self, key: ImageKey) -> Option<Image> {
        self.images.remove(key)
    }

    pub fn release_buffer(&mut self, key: BufferKey) -> bool {
        self.buffers.remove(key).is_some()
    }

    pub fn release_image(&mut self, key: ImageKey) -> bool {
        self.images.remove(key).is_some()
    }

    pub fn release_image_view(&mut self, key: ImageViewKey) -> bool {
        self.image_views.remove(key).is_some()
    }

    pub fn release_sampler(&mut self, key: SamplerKey) -> bool {
        self.samplers.remove(key).is_some()
    }

    pub fn live_objects(&self) -> usize {
        self.buffers.len() + self.images.len() + self.image_views.len() + self.samplers.len()
    }

    /// Destroys everything still owned; views go before the images they reference.
    pub fn release_all(&mut self) {
        self.image_views.clear();
        self.samplers.clear();
        self.images.clear();
        self.buffers.clear();
    }
}

impl Drop for ResourceFactory {
    fn drop(&mut self) {
        self.release_all();
    }
}
