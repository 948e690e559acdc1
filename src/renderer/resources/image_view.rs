use std::sync::Arc;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::internals::owned::{GpuObjectKind, OwnedGpuObject};
use crate::renderer::resources::image::{aspect_for, Image};

pub struct ImageViewKind;

impl GpuObjectKind for ImageViewKind {
    type Handle = vk::ImageView;
    type Meta = ();

    const NAME: &'static str = "ImageView";

    fn destroy(device: &dyn RawDevice, handle: vk::ImageView) {
        device.destroy_image_view(handle);
    }
}

pub type ImageView = OwnedGpuObject<ImageViewKind>;

/// The view type matching an image's dimensionality.
pub fn view_type_for(image_type: vk::ImageType) -> Result<vk::ImageViewType, GpuError> {
    match image_type {
        vk::ImageType::TYPE_1D => Ok(vk::ImageViewType::TYPE_1D),
        vk::ImageType::TYPE_2D => Ok(vk::ImageViewType::TYPE_2D),
        vk::ImageType::TYPE_3D => Ok(vk::ImageViewType::TYPE_3D),
        other => Err(GpuError::InvalidData {
            object: "image view",
            reason: format!("no view type for {other:?}"),
        }),
    }
}

impl OwnedGpuObject<ImageViewKind> {
    pub fn new(info: &vk::ImageViewCreateInfo<'_>, device: Arc<dyn RawDevice>) -> Result<Self, GpuError> {
        let view = device
            .create_image_view(info)
            .map_err(GpuError::vulkan(VkCall::CreateImageView))?;
        Ok(Self::from_raw(device, view, ()))
    }

    /// A view over every mip level of `image`.
    pub fn for_image(image: &Image) -> Result<Self, GpuError> {
        let meta = image.meta();
        let info = vk::ImageViewCreateInfo::default()
            .image(image.handle())
            .view_type(view_type_for(meta.image_type)?)
            .format(meta.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_for(meta.format),
                base_mip_level: 0,
                level_count: meta.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });
        Self::new(&info, image.device().clone())
    }
}
