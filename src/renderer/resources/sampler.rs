use std::sync::Arc;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::internals::owned::{GpuObjectKind, OwnedGpuObject};

pub struct SamplerKind;

impl GpuObjectKind for SamplerKind {
    type Handle = vk::Sampler;
    type Meta = ();

    const NAME: &'static str = "Sampler";

    fn destroy(device: &dyn RawDevice, handle: vk::Sampler) {
        device.destroy_sampler(handle);
    }
}

pub type Sampler = OwnedGpuObject<SamplerKind>;

impl OwnedGpuObject<SamplerKind> {
    pub fn new(info: &vk::SamplerCreateInfo<'_>, device: Arc<dyn RawDevice>) -> Result<Self, GpuError> {
        let sampler = device
            .create_sampler(info)
            .map_err(GpuError::vulkan(VkCall::CreateSampler))?;
        Ok(Self::from_raw(device, sampler, ()))
    }
}

/// Linear filtering with repeat addressing over all mip levels.
pub fn default_sampler_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
}
