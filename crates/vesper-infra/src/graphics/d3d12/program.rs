// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shader programs and HLSL compilation.

use super::native::NativeDevice;
use std::fmt::Write;
use std::sync::Arc;
use vesper_core::renderer::{
    ProgramDescriptor, ProgramReflection, ResourceError, ShaderError, ShaderStage, SamplerIndex,
};

/// A linked program: bytecode of both stages and the reflection the root
/// signature is derived from.
#[derive(Debug, Clone)]
pub struct D3d12Program {
    /// Debug label.
    pub label: String,
    /// Vertex shader bytecode.
    pub vertex: Arc<[u8]>,
    /// Pixel shader bytecode.
    pub pixel: Arc<[u8]>,
    /// Interface of both stages.
    pub reflection: Arc<ProgramReflection>,
}

impl D3d12Program {
    /// Wraps the bytecode of `descriptor`.
    ///
    /// ## Errors
    /// * `ResourceError::Shader` - If either stage is empty.
    pub fn new(descriptor: &ProgramDescriptor) -> Result<Self, ResourceError> {
        if descriptor.vertex_bytecode.is_empty() {
            return Err(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Vertex,
            }
            .into());
        }
        if descriptor.fragment_bytecode.is_empty() {
            return Err(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Fragment,
            }
            .into());
        }
        Ok(Self {
            label: descriptor
                .label
                .as_deref()
                .unwrap_or("unnamed program")
                .to_string(),
            vertex: Arc::from(descriptor.vertex_bytecode.as_ref()),
            pixel: Arc::from(descriptor.fragment_bytecode.as_ref()),
            reflection: Arc::new(descriptor.reflection.clone()),
        })
    }
}

/// Declarations of the builtin samplers at their registry registers.
pub fn sampler_prelude() -> String {
    let mut prelude = String::new();
    for (register, sampler) in SamplerIndex::ALL.iter().enumerate() {
        let kind = if sampler.desc().is_comparison() {
            "SamplerComparisonState"
        } else {
            "SamplerState"
        };
        let _ = writeln!(prelude, "{kind} {} : register(s{register});", sampler.name());
    }
    prelude
}

/// Target profile of `stage`.
pub fn shader_profile(stage: ShaderStage, use_dxc: bool) -> &'static str {
    match (stage, use_dxc) {
        (ShaderStage::Vertex, false) => "vs_5_1",
        (ShaderStage::Fragment, false) => "ps_5_1",
        (ShaderStage::Compute, false) => "cs_5_1",
        (ShaderStage::Vertex, true) => "vs_6_0",
        (ShaderStage::Fragment, true) => "ps_6_0",
        (ShaderStage::Compute, true) => "cs_6_0",
    }
}

/// Compiles HLSL with entry point `main`. Fragment shaders see the builtin
/// samplers without declaring them.
///
/// ## Errors
/// * `ShaderError::MissingEntryPoint` - If the compiler cannot find `main`.
/// * `ShaderError::CompilationError` - For any other diagnostic.
pub fn compile_shader(
    native: &dyn NativeDevice,
    stage: ShaderStage,
    source: &str,
    use_dxc: bool,
) -> Result<Vec<u8>, ShaderError> {
    let full_source = if stage == ShaderStage::Fragment {
        let mut full = sampler_prelude();
        full.push_str(source);
        full
    } else {
        source.to_string()
    };
    let profile = shader_profile(stage, use_dxc);
    native
        .compile_shader(&full_source, profile, &[])
        .map_err(|err| {
            let details = err.to_string();
            log::error!("Failed to compile {stage:?} shader ({profile}): {details}");
            if details.contains("entrypoint not found") {
                ShaderError::MissingEntryPoint { stage }
            } else {
                ShaderError::CompilationError { stage, details }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use std::borrow::Cow;

    #[test]
    fn prelude_declares_every_builtin_in_order() {
        let prelude = sampler_prelude();
        let lines: Vec<&str> = prelude.lines().collect();
        assert_eq!(lines.len(), SamplerIndex::COUNT);
        assert_eq!(lines[0], "SamplerState LinearClamp : register(s0);");
        assert_eq!(
            lines[SamplerIndex::ShadowCmpClamp as usize],
            "SamplerComparisonState ShadowCmpClamp : register(s16);"
        );
    }

    #[test]
    fn fragment_sources_are_compiled_with_the_prelude() {
        // --- 1. ARRANGE ---
        let device = HeadlessDevice::new();
        let source = "float4 main() : SV_Target { return LinearClamp ? 1 : 0; }";

        // --- 2. ACT ---
        let pixel = compile_shader(&device, ShaderStage::Fragment, source, false).unwrap();
        let vertex = compile_shader(&device, ShaderStage::Vertex, source, true).unwrap();

        // --- 3. ASSERT ---
        let pixel = String::from_utf8_lossy(&pixel);
        assert!(pixel.contains("ps_5_1"));
        assert!(pixel.contains("register(s21)"));
        let vertex = String::from_utf8_lossy(&vertex);
        assert!(vertex.contains("vs_6_0"));
        assert!(!vertex.contains("register(s0)"));
    }

    #[test]
    fn compiler_diagnostics_become_shader_errors() {
        let device = HeadlessDevice::new();
        assert!(matches!(
            compile_shader(&device, ShaderStage::Vertex, "float4 vs() {}", false),
            Err(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Vertex
            })
        ));
        assert!(matches!(
            compile_shader(&device, ShaderStage::Fragment, "#error bad\nvoid main() {}", false),
            Err(ShaderError::CompilationError { .. })
        ));
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let descriptor = ProgramDescriptor {
            label: None,
            vertex_bytecode: Cow::Borrowed(b"DXBC"),
            fragment_bytecode: Cow::Borrowed(&[]),
            reflection: ProgramReflection::default(),
        };
        assert!(matches!(
            D3d12Program::new(&descriptor),
            Err(ResourceError::Shader(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Fragment
            }))
        ));
    }
}
