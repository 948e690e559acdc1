use std::fmt;
use std::path::PathBuf;
use ash::vk;
use thiserror::Error;

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The pipeline (or object) under construction cannot be completed.
    Fatal,
    /// The call failed; the caller decides whether to abort the frame.
    Recoverable,
    /// Logged and skipped; nothing was created or written.
    Tolerated,
}

/// The Vulkan entry point behind a [`GpuError::Vulkan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VkCall {
    CreateBuffer,
    BindBufferMemory,
    CreateImage,
    BindImageMemory,
    CreateImageView,
    CreateSampler,
    AllocateMemory,
    MapMemory,
    CreateShaderModule,
    CreateDescriptorSetLayout,
    CreateDescriptorPool,
    AllocateDescriptorSets,
    CreatePipelineLayout,
    CreateGraphicsPipelines,
}

impl VkCall {
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateBuffer => "vkCreateBuffer",
            Self::BindBufferMemory => "vkBindBufferMemory",
            Self::CreateImage => "vkCreateImage",
            Self::BindImageMemory => "vkBindImageMemory",
            Self::CreateImageView => "vkCreateImageView",
            Self::CreateSampler => "vkCreateSampler",
            Self::AllocateMemory => "vkAllocateMemory",
            Self::MapMemory => "vkMapMemory",
            Self::CreateShaderModule => "vkCreateShaderModule",
            Self::CreateDescriptorSetLayout => "vkCreateDescriptorSetLayout",
            Self::CreateDescriptorPool => "vkCreateDescriptorPool",
            Self::AllocateDescriptorSets => "vkAllocateDescriptorSets",
            Self::CreatePipelineLayout => "vkCreatePipelineLayout",
            Self::CreateGraphicsPipelines => "vkCreateGraphicsPipelines",
        }
    }

    /// Failures that leave a pipeline unbuildable are fatal.
    pub fn severity(self) -> Severity {
        match self {
            Self::CreateShaderModule
            | Self::CreateDescriptorSetLayout
            | Self::CreatePipelineLayout
            | Self::CreateGraphicsPipelines => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }
}

impl fmt::Display for VkCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no memory type satisfies {required:?} for {object} of {size} bytes (type bits {type_bits:#x})")]
    NoSuitableMemoryType {
        object: &'static str,
        size: vk::DeviceSize,
        required: vk::MemoryPropertyFlags,
        type_bits: u32,
    },

    #[error("can't read shader {path:?}: {source}")]
    ShaderNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed shader {path:?}: {reason}")]
    MalformedShader { path: PathBuf, reason: String },

    #[error("descriptor set {set} binding {binding}: {reason}")]
    BindingMismatch { set: u32, binding: u32, reason: String },

    #[error("resources don't match pipeline bindings: {0}")]
    LayoutMismatch(String),

    #[error("mip-map generation is not supported")]
    MipGenerationUnsupported,

    #[error("unsupported format {0:?}")]
    UnsupportedFormat(vk::Format),

    #[error("invalid {object}: {reason}")]
    InvalidData { object: &'static str, reason: String },

    #[error("{call} failed: {result}")]
    Vulkan { call: VkCall, result: vk::Result },

    #[error("copy into mapped memory failed: {0}")]
    Copy(String),
}

impl GpuError {
    pub(crate) fn vulkan(call: VkCall) -> impl FnOnce(vk::Result) -> GpuError {
        move |result| GpuError::Vulkan { call, result }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Vulkan { call, .. } => call.severity(),
            Self::BindingMismatch { .. } => Severity::Fatal,
            Self::LayoutMismatch(_) => Severity::Tolerated,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
