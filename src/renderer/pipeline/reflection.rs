use ash::vk;
use spirq::spirv::{self, ExecutionModel};
use spirq::ty::{DescriptorType, ScalarType, Type};
use spirq::var::Variable;
use spirq::ReflectConfig;
use crate::renderer::config::PipelineParameters;

/// Which descriptor a binding slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    SampledImage,
}

impl DescriptorKind {
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::SampledImage => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// One shader-declared binding slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub count: u32,
    /// Declared struct size for uniform buffers, 0 for images.
    pub byte_size: u64,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug, Clone, Default)]
pub struct VertexInputLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputLayout {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Everything reflection recovers from one stage.
#[derive(Debug, Clone)]
pub struct ShaderReflection {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: String,
    pub vertex_input: VertexInputLayout,
    /// Indexed by descriptor set; each set lists its bindings in ascending order.
    pub descriptor_sets: Vec<Vec<BindingInfo>>,
}

impl ShaderReflection {
    pub fn binding(&self, set: u32, binding: u32) -> Option<&BindingInfo> {
        self.descriptor_sets
            .get(set as usize)?
            .iter()
            .find(|b| b.binding == binding)
    }

    pub fn binding_count(&self) -> usize {
        self.descriptor_sets.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Sint,
    Uint,
    Float,
}

/// Attribute format for a `components`-wide vector of `width_bits` scalars, or `UNDEFINED`.
pub fn vertex_format(scalar: ScalarKind, width_bits: u32, components: u32) -> vk::Format {
    use vk::Format as F;
    let formats: [F; 4] = match (scalar, width_bits) {
        (ScalarKind::Float, 16) => [F::R16_SFLOAT, F::R16G16_SFLOAT, F::R16G16B16_SFLOAT, F::R16G16B16A16_SFLOAT],
        (ScalarKind::Float, 32) => [F::R32_SFLOAT, F::R32G32_SFLOAT, F::R32G32B32_SFLOAT, F::R32G32B32A32_SFLOAT],
        (ScalarKind::Float, 64) => [F::R64_SFLOAT, F::R64G64_SFLOAT, F::R64G64B64_SFLOAT, F::R64G64B64A64_SFLOAT],
        (ScalarKind::Sint, 16) => [F::R16_SINT, F::R16G16_SINT, F::R16G16B16_SINT, F::R16G16B16A16_SINT],
        (ScalarKind::Sint, 32) => [F::R32_SINT, F::R32G32_SINT, F::R32G32B32_SINT, F::R32G32B32A32_SINT],
        (ScalarKind::Sint, 64) => [F::R64_SINT, F::R64G64_SINT, F::R64G64B64_SINT, F::R64G64B64A64_SINT],
        (ScalarKind::Uint, 16) => [F::R16_UINT, F::R16G16_UINT, F::R16G16B16_UINT, F::R16G16B16A16_UINT],
        (ScalarKind::Uint, 32) => [F::R32_UINT, F::R32G32_UINT, F::R32G32B32_UINT, F::R32G32B32A32_UINT],
        (ScalarKind::Uint, 64) => [F::R64_UINT, F::R64G64_UINT, F::R64G64B64_UINT, F::R64G64B64A64_UINT],
        _ => return F::UNDEFINED,
    };
    match components {
        1..=4 => formats[components as usize - 1],
        _ => F::UNDEFINED,
    }
}

const HEADER_WORDS: usize = 5;

pub fn stage_for_model(model: ExecutionModel) -> Option<vk::ShaderStageFlags> {
    match model {
        ExecutionModel::Vertex => Some(vk::ShaderStageFlags::VERTEX),
        ExecutionModel::TessellationControl => Some(vk::ShaderStageFlags::TESSELLATION_CONTROL),
        ExecutionModel::TessellationEvaluation => Some(vk::ShaderStageFlags::TESSELLATION_EVALUATION),
        ExecutionModel::Geometry => Some(vk::ShaderStageFlags::GEOMETRY),
        ExecutionModel::Fragment => Some(vk::ShaderStageFlags::FRAGMENT),
        ExecutionModel::GLCompute => Some(vk::ShaderStageFlags::COMPUTE),
        _ => None,
    }
}

fn check_header(words: &[u32]) -> Result<(), String> {
    if words.len() < HEADER_WORDS || words[0] != spirv::MAGIC_NUMBER {
        return Err("not a SPIR-V module".into());
    }
    Ok(())
}

fn reflection_failed(e: impl std::fmt::Debug) -> String {
    format!("SPIR-V reflection failed: {e:?}")
}

/// The stage of the module's first entry point.
pub fn detect_stage(words: &[u32]) -> Result<vk::ShaderStageFlags, String> {
    check_header(words)?;
    let entries = ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(reflection_failed)?;
    let entry = entries
        .first()
        .ok_or_else(|| "module has no entry point".to_string())?;
    stage_for_model(entry.exec_model)
        .ok_or_else(|| format!("unsupported execution model {:?}", entry.exec_model))
}

/// A stage input as found in the module, before it is placed in a vertex binding.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub format: vk::Format,
    pub size: u32,
    pub name: Option<String>,
}

/// Places inputs into vertex bindings. Interleaved puts every input in binding 0 at
/// accumulated offsets; separated gives each input a binding of its own at offset 0.
///
/// Fails if the interleaved stride does not fit a `u32`.
pub fn vertex_layout(inputs: &[VertexInput], params: &PipelineParameters) -> Result<VertexInputLayout, String> {
    let mut layout = VertexInputLayout::default();
    if inputs.is_empty() {
        return Ok(layout);
    }

    if params.separated_attributes {
        for (binding, input) in (0u32..).zip(inputs) {
            layout.bindings.push(vk::VertexInputBindingDescription {
                binding,
                stride: input.size,
                input_rate: vk::VertexInputRate::VERTEX,
            });
            layout.attributes.push(vk::VertexInputAttributeDescription {
                location: input.location,
                binding,
                format: input.format,
                offset: 0,
            });
        }
    } else {
        let mut offset: u32 = 0;
        for input in inputs {
            layout.attributes.push(vk::VertexInputAttributeDescription {
                location: input.location,
                binding: 0,
                format: input.format,
                offset,
            });
            offset = offset
                .checked_add(input.size)
                .ok_or_else(|| format!("vertex stride overflows at location {}", input.location))?;
        }
        layout.bindings.push(vk::VertexInputBindingDescription {
            binding: 0,
            stride: offset,
            input_rate: vk::VertexInputRate::VERTEX,
        });
    }
    Ok(layout)
}

fn label(name: &Option<String>) -> &str {
    match name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => "<unnamed>",
    }
}

fn scalar_kind(scalar: &ScalarType) -> Option<(ScalarKind, u32)> {
    match scalar {
        ScalarType::Float { bits, .. } => Some((ScalarKind::Float, *bits)),
        ScalarType::Integer { bits, is_signed: true, .. } => Some((ScalarKind::Sint, *bits)),
        ScalarType::Integer { bits, is_signed: false, .. } => Some((ScalarKind::Uint, *bits)),
        _ => None,
    }
}

/// Format and byte width of an input of type `ty`. Matrices take one slot per column but
/// are described by their column format.
fn vertex_input(location: u32, name: &Option<String>, ty: &Type) -> Option<VertexInput> {
    let (scalar, components, columns) = match ty {
        Type::Scalar(scalar) => (scalar, 1, 1),
        Type::Vector(vector) => (&vector.scalar_ty, vector.nscalar, 1),
        Type::Matrix(matrix) => (&matrix.vector_ty.scalar_ty, matrix.vector_ty.nscalar, matrix.nvector),
        _ => return None,
    };
    let (kind, width) = scalar_kind(scalar)?;
    let format = vertex_format(kind, width, components);
    if format == vk::Format::UNDEFINED {
        return None;
    }
    let size = (width / 8).checked_mul(components)?.checked_mul(columns)?;
    Some(VertexInput {
        location,
        format,
        size,
        name: name.clone(),
    })
}

/// Strips every array level off `ty`, multiplying their lengths into `count`.
fn unwrap_arrays<'a>(mut ty: &'a Type, mut count: u32) -> Result<(&'a Type, u32), &'static str> {
    while let Type::Array(array) = ty {
        let len = array.nelement.ok_or("runtime-sized array")?;
        if len == 0 {
            return Err("zero-length array");
        }
        count = count.checked_mul(len).ok_or("array count overflows")?;
        ty = &*array.element_ty;
    }
    Ok((ty, count))
}

/// Maps one reflected descriptor onto a binding slot, or explains why it is not bound.
fn descriptor(
    desc_ty: &DescriptorType,
    ty: &Type,
    nbind: u32,
    binding: u32,
    stage: vk::ShaderStageFlags,
) -> Result<BindingInfo, String> {
    let kind = match desc_ty {
        DescriptorType::UniformBuffer() => DescriptorKind::UniformBuffer,
        DescriptorType::CombinedImageSampler() => DescriptorKind::SampledImage,
        other => {
            return Err(format!(
                "{other:?} is not bound; only uniform blocks and combined image samplers are"
            ));
        }
    };
    if nbind == 0 {
        return Err("runtime-sized array".into());
    }
    let (element, count) = unwrap_arrays(ty, nbind)?;
    let byte_size = match kind {
        DescriptorKind::UniformBuffer => element
            .nbyte()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or("uniform block has no declared size")?,
        DescriptorKind::SampledImage => 0,
    };
    Ok(BindingInfo {
        binding,
        kind,
        count,
        byte_size,
        stages: stage,
    })
}

/// Recovers the vertex-input layout and descriptor bindings of one stage.
///
/// Modules the reflector rejects fail; resources that can't be bound are logged and skipped.
pub fn reflect(
    words: &[u32],
    stage: vk::ShaderStageFlags,
    params: &PipelineParameters,
) -> Result<ShaderReflection, String> {
    check_header(words)?;
    let entries = ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(reflection_failed)?;
    let position = entries
        .iter()
        .position(|e| stage_for_model(e.exec_model) == Some(stage))
        .unwrap_or(0);
    let Some(entry) = entries.into_iter().nth(position) else {
        return Err("module has no entry point".into());
    };
    if stage_for_model(entry.exec_model) != Some(stage) {
        log::warn!("Requested {stage:?} but module's entry point is {:?}", entry.exec_model);
    }

    let mut inputs = Vec::new();
    let mut descriptor_sets: Vec<Vec<BindingInfo>> = Vec::new();
    for var in &entry.vars {
        match var {
            Variable::Input { name, location, ty, .. } => match vertex_input(location.loc(), name, ty) {
                Some(input) => inputs.push(input),
                None => log::warn!("Unsupported input type for {} in {stage:?}; skipped", label(name)),
            },
            Variable::Descriptor {
                name,
                desc_bind,
                desc_ty,
                ty,
                nbind,
                ..
            } => match descriptor(desc_ty, ty, *nbind, desc_bind.bind(), stage) {
                Ok(info) => {
                    let set = desc_bind.set() as usize;
                    if descriptor_sets.len() <= set {
                        descriptor_sets.resize_with(set + 1, Vec::new);
                    }
                    descriptor_sets[set].push(info);
                }
                Err(reason) => log::warn!("Skipping {} in {stage:?}: {reason}", label(name)),
            },
            Variable::PushConstant { name, .. } => {
                log::debug!("Ignoring push constant block {}", label(name));
            }
            _ => {}
        }
    }

    inputs.sort_by_key(|input| input.location);
    for input in &inputs {
        log::trace!(
            "{stage:?} input {} location {} {:?} ({} bytes)",
            label(&input.name),
            input.location,
            input.format,
            input.size,
        );
    }
    for set in &mut descriptor_sets {
        set.sort_by_key(|b| b.binding);
    }

    let vertex_input = if stage == vk::ShaderStageFlags::VERTEX {
        vertex_layout(&inputs, params)?
    } else {
        VertexInputLayout::default()
    };

    let reflection = ShaderReflection {
        stage,
        entry_point: entry.name,
        vertex_input,
        descriptor_sets,
    };
    log::debug!(
        "Reflected {stage:?}: {} vertex attributes, {} bindings over {} sets",
        reflection.vertex_input.attributes.len(),
        reflection.binding_count(),
        reflection.descriptor_sets.len(),
    );
    Ok(reflection)
}
