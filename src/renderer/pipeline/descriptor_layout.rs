use std::collections::BTreeMap;
use ash::vk;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayoutBuilder;
use crate::renderer::pipeline::reflection::{BindingInfo, DescriptorKind, ShaderReflection};

/// The merged bindings of one descriptor set, ascending by binding index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorSetSpec {
    pub bindings: Vec<BindingInfo>,
}

impl DescriptorSetSpec {
    pub fn binding(&self, binding: u32) -> Option<&BindingInfo> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}

/// Merges the bindings of every present stage into one [`DescriptorSetSpec`] per descriptor set.
///
/// A `(set, binding)` declared by several stages must agree on kind and element count; the
/// stage flags are unioned.
pub fn merge_descriptor_sets(stages: &[Option<&ShaderReflection>]) -> Result<Vec<DescriptorSetSpec>, GpuError> {
    let set_count = stages
        .iter()
        .flatten()
        .map(|s| s.descriptor_sets.len())
        .max()
        .unwrap_or(0);

    let mut merged: Vec<Vec<Option<BindingInfo>>> = (0..set_count)
        .map(|set| {
            let slots = stages
                .iter()
                .flatten()
                .filter_map(|s| s.descriptor_sets.get(set))
                .flat_map(|bindings| bindings.iter().map(|b| b.binding as usize + 1))
                .max()
                .unwrap_or(0);
            vec![None; slots]
        })
        .collect();

    for stage in stages.iter().flatten() {
        for (set, bindings) in stage.descriptor_sets.iter().enumerate() {
            for info in bindings {
                let slot = &mut merged[set][info.binding as usize];
                match slot.as_mut() {
                    None => *slot = Some(info.clone()),
                    Some(existing) => {
                        if existing.kind != info.kind || existing.count != info.count {
                            log::error!(
                                "Set {set} binding {}: {:?}[{}] in {:?} vs {:?}[{}] in {:?}",
                                info.binding,
                                existing.kind,
                                existing.count,
                                existing.stages,
                                info.kind,
                                info.count,
                                info.stages,
                            );
                            return Err(GpuError::BindingMismatch {
                                set: set as u32,
                                binding: info.binding,
                                reason: format!(
                                    "{:?}[{}] conflicts with {:?}[{}]",
                                    existing.kind, existing.count, info.kind, info.count
                                ),
                            });
                        }
                        if existing.kind == DescriptorKind::UniformBuffer
                            && existing.byte_size != info.byte_size
                        {
                            log::warn!(
                                "Set {set} binding {}: block is {} bytes in {:?} but {} in {:?}",
                                info.binding,
                                existing.byte_size,
                                existing.stages,
                                info.byte_size,
                                info.stages,
                            );
                            existing.byte_size = existing.byte_size.max(info.byte_size);
                        }
                        existing.stages |= info.stages;
                    }
                }
            }
        }
    }

    Ok(merged
        .into_iter()
        .map(|slots| DescriptorSetSpec {
            bindings: slots.into_iter().flatten().collect(),
        })
        .collect())
}

/// Descriptor counts per type across all sets.
pub fn pool_sizes(specs: &[DescriptorSetSpec]) -> Vec<vk::DescriptorPoolSize> {
    let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
    for info in specs.iter().flat_map(|s| &s.bindings) {
        *counts.entry(info.kind.descriptor_type().as_raw()).or_default() += info.count;
    }
    counts
        .into_iter()
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize {
            ty: vk::DescriptorType::from_raw(ty),
            descriptor_count,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DescriptorSetInfo {
    pub layout: vk::DescriptorSetLayout,
    pub set: vk::DescriptorSet,
    pub spec: DescriptorSetSpec,
}

/// Layouts, pool and sets built for one pipeline. The pool is null when no set has
/// any binding.
#[derive(Debug, Default)]
pub struct DescriptorResources {
    pub pool: vk::DescriptorPool,
    pub sets: Vec<DescriptorSetInfo>,
}

impl DescriptorResources {
    /// Creates one layout per spec, a pool sized for every descriptor and one set per layout.
    /// Whatever was created before a failing call is destroyed before the error is returned.
    pub fn build(device: &dyn RawDevice, specs: Vec<DescriptorSetSpec>) -> Result<Self, GpuError> {
        let mut resources = Self::default();

        for spec in specs {
            let layout = spec
                .bindings
                .iter()
                .fold(DescriptorSetLayoutBuilder::new(), |builder, info| builder.add_binding_for_info(info))
                .build(device);
            match layout {
                Ok(layout) => resources.sets.push(DescriptorSetInfo {
                    layout,
                    set: vk::DescriptorSet::null(),
                    spec,
                }),
                Err(e) => {
                    log::error!("Descriptor set layout {} failed: {e}", resources.sets.len());
                    resources.destroy(device);
                    return Err(e);
                }
            }
        }

        let specs: Vec<DescriptorSetSpec> = resources.sets.iter().map(|s| s.spec.clone()).collect();
        let sizes = pool_sizes(&specs);
        if sizes.is_empty() {
            return Ok(resources);
        }

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(resources.sets.len() as u32)
            .pool_sizes(&sizes);
        resources.pool = match device.create_descriptor_pool(&pool_info) {
            Ok(pool) => pool,
            Err(result) => {
                log::error!("Descriptor pool for {} sets failed: {result}", resources.sets.len());
                resources.destroy(device);
                return Err(GpuError::Vulkan {
                    call: VkCall::CreateDescriptorPool,
                    result,
                });
            }
        };

        let layouts = resources.layouts();
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(resources.pool)
            .set_layouts(&layouts);
        match device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => {
                for (info, set) in resources.sets.iter_mut().zip(sets) {
                    info.set = set;
                }
            }
            Err(result) => {
                log::error!("Allocating {} descriptor sets failed: {result}", layouts.len());
                resources.destroy(device);
                return Err(GpuError::Vulkan {
                    call: VkCall::AllocateDescriptorSets,
                    result,
                });
            }
        }
        Ok(resources)
    }

    pub fn layouts(&self) -> Vec<vk::DescriptorSetLayout> {
        self.sets.iter().map(|s| s.layout).collect()
    }

    pub fn descriptor_sets(&self) -> Vec<vk::DescriptorSet> {
        self.sets.iter().map(|s| s.set).collect()
    }

    /// Destroys the pool (freeing its sets) and then the layouts.
    pub fn destroy(&mut self, device: &dyn RawDevice) {
        if self.pool != vk::DescriptorPool::null() {
            device.destroy_descriptor_pool(self.pool);
            self.pool = vk::DescriptorPool::null();
        }
        for info in self.sets.drain(..).rev() {
            device.destroy_descriptor_set_layout(info.layout);
        }
    }
}
