use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ash::vk;
use crate::renderer::config::PipelineParameters;
use crate::renderer::device::RawDevice;
use crate::renderer::error::{GpuError, VkCall};
use crate::renderer::pipeline::reflection::{self, ShaderReflection};

/// A loaded shader module and what reflection found in it.
#[derive(Debug)]
pub struct ShaderInfo {
    pub module: vk::ShaderModule,
    pub reflection: ShaderReflection,
}

/// Reads a SPIR-V binary into words.
pub fn read_binary(path: &Path) -> Result<Vec<u32>, GpuError> {
    let bytes = std::fs::read(path).map_err(|source| {
        log::error!("Can't open shader file {path:?}: {source}");
        GpuError::ShaderNotFound {
            path: path.to_path_buf(),
            source,
        }
    })?;
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        log::error!("Shader {path:?} is {} bytes, not a whole number of words", bytes.len());
        return Err(GpuError::MalformedShader {
            path: path.to_path_buf(),
            reason: format!("length {} is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Reads and reflects a shader without creating a device object.
pub fn reflect_file(
    path: &Path,
    stage: vk::ShaderStageFlags,
    params: &PipelineParameters,
) -> Result<(Vec<u32>, ShaderReflection), GpuError> {
    let words = read_binary(path)?;
    let reflection = reflection::reflect(&words, stage, params).map_err(|reason| {
        log::error!("Can't reflect {path:?}: {reason}");
        GpuError::MalformedShader {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    Ok((words, reflection))
}

/// Shader modules keyed by file path. The first load of a path wins: later requests for the
/// same path return the cached entry whatever stage or parameters they ask for.
pub struct ShaderLibrary {
    device: Arc<dyn RawDevice>,
    shaders: HashMap<PathBuf, ShaderInfo>,
}

impl ShaderLibrary {
    pub fn new(device: Arc<dyn RawDevice>) -> Self {
        Self {
            device,
            shaders: HashMap::new(),
        }
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&ShaderInfo> {
        self.shaders.get(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn load(
        &mut self,
        path: &Path,
        stage: vk::ShaderStageFlags,
        params: &PipelineParameters,
    ) -> Result<&ShaderInfo, GpuError> {
        self.load_stages(&[(path, stage)], params)?;
        self.shaders.get(path).ok_or_else(|| GpuError::InvalidData {
            object: "shader",
            reason: format!("{path:?} missing after load"),
        })
    }

    /// Loads every uncached stage. All files are read and reflected before any module is
    /// created, so an unreadable or malformed file leaves no device objects behind.
    pub fn load_stages(
        &mut self,
        stages: &[(&Path, vk::ShaderStageFlags)],
        params: &PipelineParameters,
    ) -> Result<(), GpuError> {
        let mut pending: Vec<(PathBuf, Vec<u32>, ShaderReflection)> = Vec::new();
        for (path, stage) in stages {
            if self.shaders.contains_key(*path) || pending.iter().any(|(p, _, _)| p == path) {
                continue;
            }
            let (words, reflection) = reflect_file(path, *stage, params)?;
            pending.push((path.to_path_buf(), words, reflection));
        }

        for (path, words, reflection) in pending {
            let module = self.device.create_shader_module(&words).map_err(|result| {
                log::error!("Driver rejected shader module {path:?}: {result}");
                GpuError::Vulkan {
                    call: VkCall::CreateShaderModule,
                    result,
                }
            })?;
            log::info!("Loaded {:?} shader {path:?}", reflection.stage);
            self.shaders.insert(path, ShaderInfo { module, reflection });
        }
        Ok(())
    }

    /// Destroys every module. Pipelines built from them must already be gone.
    pub fn clear(&mut self) {
        for (path, shader) in self.shaders.drain() {
            log::debug!("Destroying shader module for {path:?}");
            self.device.destroy_shader_module(shader.module);
        }
    }
}

impl Drop for ShaderLibrary {
    fn drop(&mut self) {
        self.clear();
    }
}
