use std::collections::BTreeMap;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::GpuError;
use crate::renderer::pipeline::reflection::DescriptorKind;
use crate::renderer::pipeline::PipelineInfo;
use crate::renderer::resources::buffer::Buffer;
use crate::renderer::resources::image_view::ImageView;
use crate::renderer::resources::sampler::Sampler;

/// What a single descriptor binding should point at.
#[derive(Debug, Clone, Copy)]
pub enum DescriptorPayload {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

impl DescriptorPayload {
    pub fn uniform(buffer: &Buffer, offset: vk::DeviceSize, range: vk::DeviceSize) -> Self {
        Self::Buffer(buffer.descriptor(offset, range))
    }

    /// A combined image sampler read by shaders in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn texture(view: &ImageView, sampler: &Sampler) -> Self {
        Self::Image(
            vk::DescriptorImageInfo::default()
                .image_view(view.handle())
                .sampler(sampler.handle())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        )
    }

    fn kind(&self) -> DescriptorKind {
        match self {
            Self::Buffer(_) => DescriptorKind::UniformBuffer,
            Self::Image(_) => DescriptorKind::SampledImage,
        }
    }
}

/// One map per descriptor set, binding number to payload.
pub type UniformMapping = Vec<BTreeMap<u32, DescriptorPayload>>;

fn mismatch(reason: String) -> GpuError {
    log::warn!("Not binding resources: {reason}");
    GpuError::LayoutMismatch(reason)
}

/// Points every descriptor of `pipeline` at the matching payload in `mapping`.
///
/// The mapping must cover exactly the sets and bindings the pipeline declares. Otherwise
/// nothing is written and `LayoutMismatch` is returned. Returns the number of writes issued.
pub fn connect_resources_to_bindings(
    device: &dyn RawDevice,
    mapping: &UniformMapping,
    pipeline: &PipelineInfo,
) -> Result<usize, GpuError> {
    let sets = pipeline.set_infos();
    if mapping.len() != sets.len() {
        return Err(mismatch(format!(
            "pipeline has {} descriptor sets, mapping has {}",
            sets.len(),
            mapping.len()
        )));
    }

    for (set, (info, bindings)) in sets.iter().zip(mapping).enumerate() {
        if bindings.len() != info.spec.bindings.len() {
            return Err(mismatch(format!(
                "set {set} declares {} bindings, mapping has {}",
                info.spec.bindings.len(),
                bindings.len()
            )));
        }
        for declared in &info.spec.bindings {
            let Some(payload) = bindings.get(&declared.binding) else {
                return Err(mismatch(format!("set {set} binding {} has no payload", declared.binding)));
            };
            if payload.kind() != declared.kind {
                return Err(mismatch(format!(
                    "set {set} binding {} is {:?}, payload is {:?}",
                    declared.binding,
                    declared.kind,
                    payload.kind()
                )));
            }
        }
    }

    let mut writes = Vec::new();
    for (set, (info, bindings)) in sets.iter().zip(mapping).enumerate() {
        for declared in &info.spec.bindings {
            let Some(payload) = bindings.get(&declared.binding) else {
                continue;
            };
            let write = vk::WriteDescriptorSet::default()
                .dst_set(info.set)
                .dst_binding(declared.binding)
                .dst_array_element(0)
                .descriptor_type(declared.kind.descriptor_type());
            let write = match payload {
                DescriptorPayload::Buffer(buffer) => {
                    if buffer.range != declared.byte_size {
                        log::warn!(
                            "Set {set} binding {}: shader declares {} bytes, buffer range is {}",
                            declared.binding,
                            declared.byte_size,
                            buffer.range
                        );
                    }
                    write.buffer_info(std::slice::from_ref(buffer))
                }
                DescriptorPayload::Image(image) => write.image_info(std::slice::from_ref(image)),
            };
            writes.push(write);
        }
    }

    if !writes.is_empty() {
        device.update_descriptor_sets(&writes);
    }
    log::debug!("Wrote {} descriptors across {} sets", writes.len(), sets.len());
    Ok(writes.len())
}
