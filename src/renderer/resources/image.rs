use std::sync::Arc;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::internals::memory::{self, MappedMemory};
use crate::renderer::internals::owned::{GpuObjectKind, OwnedGpuObject};

pub struct ImageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub generate_mips: bool,
    pub usage: vk::ImageUsageFlags,
}

impl ImageDesc {
    pub fn new_2d(format: vk::Format, width: u32, height: u32, usage: vk::ImageUsageFlags) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            mip_levels: 1,
            generate_mips: false,
            usage,
        }
    }

    pub fn image_type(&self) -> vk::ImageType {
        if self.extent.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMeta {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub image_type: vk::ImageType,
    pub mip_levels: u32,
    pub usage: vk::ImageUsageFlags,
}

impl GpuObjectKind for ImageKind {
    type Handle = vk::Image;
    type Meta = ImageMeta;

    const NAME: &'static str = "Image";

    fn destroy(device: &dyn RawDevice, handle: vk::Image) {
        device.destroy_image(handle);
    }
}

pub type Image = OwnedGpuObject<ImageKind>;

/// Bytes per texel for the uncompressed formats images can be filled from.
pub(crate) fn texel_size(format: vk::Format) -> Option<u64> {
    let size = match format {
        vk::Format::R8_UNORM | vk::Format::R8_SNORM | vk::Format::R8_UINT | vk::Format::R8_SINT
        | vk::Format::R8_SRGB => 1,
        vk::Format::R8G8_UNORM | vk::Format::R8G8_UINT | vk::Format::R8G8_SRGB
        | vk::Format::R16_SFLOAT | vk::Format::R16_UNORM | vk::Format::R16_UINT
        | vk::Format::D16_UNORM => 2,
        vk::Format::R8G8B8_UNORM | vk::Format::R8G8B8_SRGB | vk::Format::B8G8R8_UNORM => 3,
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SNORM | vk::Format::R8G8B8A8_UINT
        | vk::Format::R8G8B8A8_SINT | vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB | vk::Format::R16G16_SFLOAT | vk::Format::R32_SFLOAT
        | vk::Format::R32_UINT | vk::Format::R32_SINT | vk::Format::D32_SFLOAT => 4,
        vk::Format::R16G16B16A16_SFLOAT | vk::Format::R16G16B16A16_UNORM
        | vk::Format::R32G32_SFLOAT | vk::Format::R32G32_UINT => 8,
        vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_SFLOAT | vk::Format::R32G32B32A32_UINT => 16,
        _ => return None,
    };
    Some(size)
}

impl OwnedGpuObject<ImageKind> {
    /// Creates a linearly tiled image and copies `data` into mip level 0 row by row, honouring
    /// the row pitch the device reports.
    pub fn new(
        desc: &ImageDesc,
        data: &[u8],
        required: vk::MemoryPropertyFlags,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        device: Arc<dyn RawDevice>,
    ) -> Result<Self, GpuError> {
        if desc.generate_mips {
            log::error!("Mip-map generation requested for {:?} image; not supported", desc.format);
            return Err(GpuError::MipGenerationUnsupported);
        }
        let texel = texel_size(desc.format).ok_or(GpuError::UnsupportedFormat(desc.format))?;
        let extent = desc.extent;
        let too_large = || GpuError::InvalidData {
            object: "image",
            reason: format!("{extent:?} of {:?} overflows its byte size", desc.format),
        };
        let row_bytes = u64::from(extent.width).checked_mul(texel).ok_or_else(too_large)?;
        let expected = row_bytes
            .checked_mul(u64::from(extent.height))
            .and_then(|n| n.checked_mul(u64::from(extent.depth)))
            .ok_or_else(too_large)?;
        if expected == 0 || (data.len() as u64) < expected {
            return Err(GpuError::InvalidData {
                object: "image",
                reason: format!("{} bytes supplied, {expected} needed for {extent:?}", data.len()),
            });
        }

        let image = {
            let info = vk::ImageCreateInfo::default()
                .image_type(desc.image_type())
                .format(desc.format)
                .extent(extent)
                .mip_levels(desc.mip_levels.max(1))
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::LINEAR)
                .usage(desc.usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::PREINITIALIZED);
            device
                .create_image(&info)
                .map_err(GpuError::vulkan(VkCall::CreateImage))?
        };
        let meta = ImageMeta {
            format: desc.format,
            extent,
            image_type: desc.image_type(),
            mip_levels: desc.mip_levels.max(1),
            usage: desc.usage,
        };
        let mut image = Self::from_raw(device.clone(), image, meta);

        let requirements = device.image_memory_requirements(image.handle());
        let memory = memory::allocate(
            device.as_ref(),
            memory_properties,
            requirements,
            required,
            "image",
        )?;
        image.attach_memory(memory);

        let layout = device.image_subresource_layout(
            image.handle(),
            vk::ImageSubresource {
                aspect_mask: aspect_for(desc.format),
                mip_level: 0,
                array_layer: 0,
            },
        );
        if layout.row_pitch < row_bytes {
            return Err(GpuError::InvalidData {
                object: "image",
                reason: format!("row pitch {} is below {row_bytes} bytes", layout.row_pitch),
            });
        }

        {
            let mut mapped = MappedMemory::map(device.as_ref(), memory, requirements.size)?;
            // `expected` fits in `data`, so every source offset fits a usize
            let row_len = row_bytes as usize;
            for z in 0..u64::from(extent.depth) {
                for y in 0..u64::from(extent.height) {
                    let src = ((z * u64::from(extent.height) + y) * row_bytes) as usize;
                    let dst = z
                        .checked_mul(layout.depth_pitch)
                        .zip(y.checked_mul(layout.row_pitch))
                        .and_then(|(slice, row)| layout.offset.checked_add(slice)?.checked_add(row))
                        .and_then(|dst| usize::try_from(dst).ok())
                        .ok_or_else(|| GpuError::InvalidData {
                            object: "image",
                            reason: format!("row {y} of slice {z} lies outside the mapping"),
                        })?;
                    mapped.write(dst, &data[src..src + row_len])?;
                }
            }
        }
        if desc.mip_levels > 1 {
            log::info!("Only mip level 0 of {} was filled", desc.mip_levels);
        }

        device
            .bind_image_memory(image.handle(), memory)
            .map_err(GpuError::vulkan(VkCall::BindImageMemory))?;

        log::debug!("Created {:?} image {}x{}x{}", desc.format, extent.width, extent.height, extent.depth);
        Ok(image)
    }
}

pub fn aspect_for(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}
