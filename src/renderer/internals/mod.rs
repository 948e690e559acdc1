/// "Internals" refers to low-level objects that are used to implement the "Resources" and "Pipeline" objects.

pub mod descriptor_set_layout_builder;
pub mod memory;
pub mod owned;
