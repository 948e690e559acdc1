use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use vkbind::renderer::config::PipelineParameters;
use vkbind::renderer::pipeline::descriptor_layout::{merge_descriptor_sets, DescriptorSetSpec};
use vkbind::renderer::pipeline::reflection::{self, BindingInfo, ShaderReflection};
use vkbind::renderer::pipeline::shader;

/// Inspects compiled SPIR-V shaders without a GPU.
#[derive(Parser)]
#[command(name = "vkbind", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the vertex inputs and descriptor bindings of each shader
    Reflect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Give every vertex input its own binding
        #[arg(long)]
        separated: bool,
    },
    /// Merge the descriptor bindings of several stages as one pipeline would
    Merge {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn reflect_path(path: &Path, params: &PipelineParameters) -> Result<ShaderReflection> {
    let words = shader::read_binary(path)?;
    let stage = reflection::detect_stage(&words).map_err(|e| eyre!("{}: {e}", path.display()))?;
    reflection::reflect(&words, stage, params).map_err(|e| eyre!("{}: {e}", path.display()))
}

fn print_binding(set: usize, info: &BindingInfo) {
    println!(
        "  set {set} binding {}: {:?} x{} ({} bytes) {:?}",
        info.binding, info.kind, info.count, info.byte_size, info.stages
    );
}

fn print_reflection(path: &Path, reflection: &ShaderReflection) {
    println!("{} [{:?}] entry '{}'", path.display(), reflection.stage, reflection.entry_point);
    for binding in &reflection.vertex_input.bindings {
        println!("  vertex binding {}: stride {}", binding.binding, binding.stride);
    }
    for attribute in &reflection.vertex_input.attributes {
        println!(
            "  location {} -> binding {} offset {} {:?}",
            attribute.location, attribute.binding, attribute.offset, attribute.format
        );
    }
    for (set, bindings) in reflection.descriptor_sets.iter().enumerate() {
        for info in bindings {
            print_binding(set, info);
        }
    }
}

fn print_merged(specs: &[DescriptorSetSpec]) {
    println!("{} descriptor sets", specs.len());
    for (set, spec) in specs.iter().enumerate() {
        for info in &spec.bindings {
            print_binding(set, info);
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    match Cli::parse().command {
        Command::Reflect { paths, separated } => {
            let params = PipelineParameters {
                separated_attributes: separated,
            };
            for path in &paths {
                let reflection = reflect_path(path, &params)?;
                print_reflection(path, &reflection);
            }
        }
        Command::Merge { paths } => {
            let reflections = paths
                .iter()
                .map(|path| reflect_path(path, &PipelineParameters::default()))
                .collect::<Result<Vec<_>>>()?;
            let stages: Vec<_> = reflections.iter().map(Some).collect();
            print_merged(&merge_descriptor_sets(&stages)?);
        }
    }

    Ok(())
}
