//! Shader reflection and the graphics pipelines built from it.

pub mod builder;
pub mod cache;
pub mod descriptor_layout;
pub mod reflection;
pub mod shader;

pub use cache::{PipelineCache, PipelineHandle, PipelineInfo, ShaderSet};
