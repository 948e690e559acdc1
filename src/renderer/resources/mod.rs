/// "Resources" refers to the device objects a drawable owns: vertex, index and uniform buffers,
/// textures and the views and samplers used to read them.

pub mod buffer;
pub mod factory;
pub mod image;
pub mod image_view;
pub mod sampler;

pub use factory::{BufferKey, ImageKey, ImageViewKey, ResourceFactory, SamplerKey};
