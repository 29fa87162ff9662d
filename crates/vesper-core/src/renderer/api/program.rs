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

//! Shader programs, their reflection data and per-draw program state.
//!
//! Shader cross-compilation is outside the RHI, so reflection is supplied by
//! the caller next to the bytecode. The backend derives its binding layout
//! (root signature, descriptor tables) purely from that reflection:
//!
//! - every uniform block becomes a constant buffer bound at `binding`,
//! - every texture occupies `count` shader-resource slots starting at `binding`
//!   and samples through the sampler registered at `sampler_slot`.
//!
//! A [`ProgramState`] carries the CPU copy of all uniform blocks (laid out back
//! to back in declaration order) together with the textures bound for a draw.

use super::texture::TextureId;
use super::pipeline::VertexFormat;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment (pixel) shader.
    Fragment,
    /// Compute shader.
    Compute,
}

/// A member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    /// Member name.
    pub name: String,
    /// Byte offset inside the block.
    pub offset: u32,
    /// Byte size.
    pub size: u32,
}

/// A uniform (constant) block consumed by one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockInfo {
    /// Block name.
    pub name: String,
    /// Constant-buffer register.
    pub binding: u32,
    /// Byte size of the block.
    pub size: u32,
    /// The stage reading the block.
    pub stage: ShaderStage,
    /// Members, used to resolve uniform names.
    pub members: Vec<UniformMember>,
}

/// A texture (or texture array) sampled by the fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBindingInfo {
    /// Texture variable name.
    pub name: String,
    /// First shader-resource register.
    pub binding: u32,
    /// Number of consecutive registers (array length).
    pub count: u32,
    /// Sampler register used with this texture.
    pub sampler_slot: u32,
}

/// A vertex shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInputInfo {
    /// Semantic name.
    pub semantic: String,
    /// Input location.
    pub location: u32,
    /// Expected element format.
    pub format: VertexFormat,
}

/// Everything the backend needs to know about a program's interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    /// Uniform blocks in declaration order.
    pub uniform_blocks: Vec<UniformBlockInfo>,
    /// Sampled textures.
    pub textures: Vec<TextureBindingInfo>,
    /// Vertex inputs.
    pub vertex_inputs: Vec<VertexInputInfo>,
}

/// Where a uniform lives inside a [`ProgramState`]'s CPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    /// Index of the owning block in [`ProgramReflection::uniform_blocks`].
    pub block: usize,
    /// Absolute byte offset in the CPU buffer.
    pub offset: u32,
    /// Byte size.
    pub size: u32,
}

impl ProgramReflection {
    /// Offset of block `index` inside the CPU uniform buffer.
    pub fn block_cpu_offset(&self, index: usize) -> u32 {
        self.uniform_blocks.iter().take(index).map(|b| b.size).sum()
    }

    /// Total size of the CPU uniform buffer.
    pub fn uniform_buffer_size(&self) -> usize {
        self.uniform_blocks.iter().map(|b| b.size as usize).sum()
    }

    /// Resolves `"member"` or `"block.member"` to a location.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let (block_name, member_name) = match name.split_once('.') {
            Some((block, member)) => (Some(block), member),
            None => (None, name),
        };
        self.uniform_blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| block_name.map_or(true, |n| n == b.name))
            .find_map(|(index, block)| {
                block
                    .members
                    .iter()
                    .find(|m| m.name == member_name)
                    .map(|m| UniformLocation {
                        block: index,
                        offset: self.block_cpu_offset(index) + m.offset,
                        size: m.size,
                    })
            })
    }

    /// Looks up a texture by name.
    pub fn texture(&self, name: &str) -> Option<&TextureBindingInfo> {
        self.textures.iter().find(|t| t.name == name)
    }

    /// The highest sampler register in use, `None` without textures.
    pub fn max_sampler_slot(&self) -> Option<u32> {
        self.textures.iter().map(|t| t.sampler_slot).max()
    }
}

/// A descriptor used to create a [`ProgramId`].
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Compiled vertex shader bytecode.
    pub vertex_bytecode: Cow<'a, [u8]>,
    /// Compiled fragment shader bytecode.
    pub fragment_bytecode: Cow<'a, [u8]>,
    /// Interface description of both stages.
    pub reflection: ProgramReflection,
}

/// Computes a uniform value at draw time from the draw's uniform slice.
pub type UniformCallback = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// Uniform values and texture bindings for one program.
#[derive(Clone)]
pub struct ProgramState {
    program: ProgramId,
    reflection: Arc<ProgramReflection>,
    uniforms: Vec<u8>,
    textures: BTreeMap<u32, Vec<TextureId>>,
    callbacks: Vec<(UniformLocation, UniformCallback)>,
}

impl ProgramState {
    /// Creates a state with a zeroed uniform buffer sized from `reflection`.
    pub fn new(program: ProgramId, reflection: Arc<ProgramReflection>) -> Self {
        let uniforms = vec![0; reflection.uniform_buffer_size()];
        Self {
            program,
            reflection,
            uniforms,
            textures: BTreeMap::new(),
            callbacks: Vec::new(),
        }
    }

    /// The program this state feeds.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The program's reflection.
    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }

    /// Writes a uniform value. Bytes beyond the uniform's size are ignored.
    ///
    /// Returns `false` if the location does not fit the buffer.
    pub fn set_uniform(&mut self, location: UniformLocation, bytes: &[u8]) -> bool {
        let start = location.offset as usize;
        let len = bytes.len().min(location.size as usize);
        match self.uniforms.get_mut(start..start + len) {
            Some(dst) => {
                dst.copy_from_slice(&bytes[..len]);
                true
            }
            None => false,
        }
    }

    /// Writes a uniform by name. Returns `false` for unknown names.
    pub fn set_uniform_by_name(&mut self, name: &str, bytes: &[u8]) -> bool {
        match self.reflection.uniform_location(name) {
            Some(location) => self.set_uniform(location, bytes),
            None => {
                log::warn!("Unknown uniform '{name}' for {:?}", self.program);
                false
            }
        }
    }

    /// Registers a callback that fills a uniform right before each draw.
    /// States with callbacks never take part in triangle batching.
    pub fn set_callback_uniform(&mut self, location: UniformLocation, callback: UniformCallback) {
        self.callbacks.retain(|(l, _)| *l != location);
        self.callbacks.push((location, callback));
    }

    /// Returns `true` if any callback uniform is registered.
    pub fn has_callback_uniforms(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Binds a single texture at `binding`.
    pub fn set_texture(&mut self, binding: u32, texture: TextureId) {
        self.textures.insert(binding, vec![texture]);
    }

    /// Binds consecutive textures starting at `binding`.
    pub fn set_texture_array(&mut self, binding: u32, textures: Vec<TextureId>) {
        self.textures.insert(binding, textures);
    }

    /// Bound textures, grouped by first binding, in ascending binding order.
    pub fn textures(&self) -> impl Iterator<Item = (u32, &[TextureId])> {
        self.textures.iter().map(|(b, t)| (*b, t.as_slice()))
    }

    /// The raw uniform buffer, without callback values.
    pub fn uniform_bytes(&self) -> &[u8] {
        &self.uniforms
    }

    /// The uniform buffer as the GPU should see it for the next draw.
    ///
    /// Callbacks run on a copy, so the stored values stay untouched.
    pub fn resolved_uniforms(&self) -> Cow<'_, [u8]> {
        if self.callbacks.is_empty() {
            return Cow::Borrowed(&self.uniforms);
        }
        let mut copy = self.uniforms.clone();
        for (location, callback) in &self.callbacks {
            let start = location.offset as usize;
            if let Some(slice) = copy.get_mut(start..start + location.size as usize) {
                callback(slice);
            }
        }
        Cow::Owned(copy)
    }
}

impl fmt::Debug for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramState")
            .field("program", &self.program)
            .field("uniform_bytes", &self.uniforms.len())
            .field("textures", &self.textures)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflection() -> Arc<ProgramReflection> {
        Arc::new(ProgramReflection {
            uniform_blocks: vec![
                UniformBlockInfo {
                    name: "vs_ub".into(),
                    binding: 0,
                    size: 64,
                    stage: ShaderStage::Vertex,
                    members: vec![UniformMember {
                        name: "u_MVPMatrix".into(),
                        offset: 0,
                        size: 64,
                    }],
                },
                UniformBlockInfo {
                    name: "fs_ub".into(),
                    binding: 1,
                    size: 16,
                    stage: ShaderStage::Fragment,
                    members: vec![UniformMember {
                        name: "u_color".into(),
                        offset: 0,
                        size: 16,
                    }],
                },
            ],
            textures: vec![TextureBindingInfo {
                name: "u_tex0".into(),
                binding: 0,
                count: 1,
                sampler_slot: 3,
            }],
            vertex_inputs: Vec::new(),
        })
    }

    #[test]
    fn uniform_locations_are_offset_by_preceding_blocks() {
        let r = reflection();
        let color = r.uniform_location("u_color").unwrap();
        assert_eq!(color.offset, 64);
        assert_eq!(color.block, 1);
        assert_eq!(r.uniform_location("fs_ub.u_color"), Some(color));
        assert!(r.uniform_location("vs_ub.u_color").is_none());
        assert_eq!(r.uniform_buffer_size(), 80);
        assert_eq!(r.max_sampler_slot(), Some(3));
    }

    #[test]
    fn set_uniform_truncates_and_rejects_out_of_range() {
        let mut state = ProgramState::new(ProgramId(1), reflection());
        assert!(state.set_uniform_by_name("u_color", &[7u8; 32]));
        assert_eq!(&state.uniform_bytes()[64..80], &[7u8; 16]);
        let bogus = UniformLocation {
            block: 0,
            offset: 79,
            size: 4,
        };
        assert!(!state.set_uniform(bogus, &[1, 2, 3, 4]));
        assert!(!state.set_uniform_by_name("missing", &[0]));
    }

    #[test]
    fn callbacks_run_on_a_copy() {
        // --- 1. ARRANGE ---
        let r = reflection();
        let mut state = ProgramState::new(ProgramId(1), r.clone());
        let location = r.uniform_location("u_color").unwrap();
        state.set_callback_uniform(location, Arc::new(|slice: &mut [u8]| slice.fill(9)));

        // --- 2. ACT ---
        let resolved = state.resolved_uniforms();

        // --- 3. ASSERT ---
        assert!(matches!(resolved, Cow::Owned(_)));
        assert_eq!(&resolved[64..80], &[9u8; 16]);
        assert_eq!(&state.uniform_bytes()[64..80], &[0u8; 16]);
        assert!(state.has_callback_uniforms());
    }
}
