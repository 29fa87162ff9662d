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

//! The commands scene objects submit to the [`Renderer`](super::Renderer).
//!
//! A [`RenderCommand`] couples the ordering keys every command shares (global
//! Z order, view depth, 3D and transparency flags) with a [`CommandKind`]
//! payload. Triangle, mesh and custom payloads are owned by the emitting scene
//! object and shared through an `Arc`: the renderer only borrows them for the
//! frame and drops its references when the queues are cleared. Group commands
//! are engine-owned and recycled through the renderer's pool.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;
use vesper_core::math::{Color4B, Mat4, Vec2, Vec3};
use vesper_core::renderer::{BufferId, DrawType, IndexFormat, PipelineDesc, PrimitiveType};

use super::error::RendererError;
use super::Renderer;

/// Material id of commands that must never be merged with a neighbor.
pub const MATERIAL_ID_DO_NOT_BATCH: u32 = 0;

/// Fixed seeds, so material ids are stable across runs and threads.
const MATERIAL_HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// The vertex format of batched triangles: position, color, texture coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct V3fC4bT2f {
    /// Position in model space.
    pub position: Vec3,
    /// Vertex color.
    pub color: Color4B,
    /// Texture coordinates.
    pub tex_coords: Vec2,
}

impl V3fC4bT2f {
    /// Size of one vertex in bytes.
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    /// Creates a vertex.
    #[inline]
    pub const fn new(position: Vec3, color: Color4B, tex_coords: Vec2) -> Self {
        Self {
            position,
            color,
            tex_coords,
        }
    }
}

/// Vertices and 16-bit indices of a triangle list, in model space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangles {
    /// The vertices.
    pub vertices: Vec<V3fC4bT2f>,
    /// Indices into `vertices`, three per triangle.
    pub indices: Vec<u16>,
}

impl Triangles {
    /// A textured quad of `width` by `height` with its origin at the bottom-left.
    pub fn quad(width: f32, height: f32, color: Color4B) -> Self {
        let corner = |x: f32, y: f32, u: f32, v: f32| {
            V3fC4bT2f::new(Vec3::new(x, y, 0.0), color, Vec2::new(u, v))
        };
        Self {
            vertices: vec![
                corner(0.0, height, 0.0, 0.0),
                corner(0.0, 0.0, 0.0, 1.0),
                corner(width, height, 1.0, 0.0),
                corner(width, 0.0, 1.0, 1.0),
            ],
            indices: vec![0, 1, 2, 3, 2, 1],
        }
    }
}

/// A triangle list the renderer may merge with neighbors of the same material.
#[derive(Debug, Clone)]
pub struct TrianglesCommand {
    triangles: Triangles,
    model_view: Mat4,
    pipeline: PipelineDesc,
    material_id: u32,
}

impl TrianglesCommand {
    /// Creates the command and derives its material id from `pipeline`.
    pub fn new(triangles: Triangles, model_view: Mat4, pipeline: PipelineDesc) -> Self {
        let material_id = material_id(&pipeline);
        Self {
            triangles,
            model_view,
            pipeline,
            material_id,
        }
    }

    /// Model-space vertices.
    pub fn vertices(&self) -> &[V3fC4bT2f] {
        &self.triangles.vertices
    }

    /// Indices relative to this command's first vertex.
    pub fn indices(&self) -> &[u16] {
        &self.triangles.indices
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.triangles.vertices.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.triangles.indices.len()
    }

    /// The transform applied to every vertex when the command is batched.
    pub fn model_view(&self) -> &Mat4 {
        &self.model_view
    }

    /// Program state, vertex layout and blend of the draw.
    pub fn pipeline(&self) -> &PipelineDesc {
        &self.pipeline
    }

    /// The batching key. [`MATERIAL_ID_DO_NOT_BATCH`] when the program uses
    /// callback uniforms.
    pub fn material_id(&self) -> u32 {
        self.material_id
    }
}

/// Hashes everything that makes two triangle draws interchangeable.
///
/// The result is never zero unless the program state must not be batched.
pub fn material_id(pipeline: &PipelineDesc) -> u32 {
    let state = &pipeline.program_state;
    if state.has_callback_uniforms() {
        return MATERIAL_ID_DO_NOT_BATCH;
    }

    let [k0, k1, k2, k3] = MATERIAL_HASH_SEEDS;
    let mut hasher = RandomState::with_seeds(k0, k1, k2, k3).build_hasher();
    state.program().hash(&mut hasher);
    for (binding, textures) in state.textures() {
        binding.hash(&mut hasher);
        textures.hash(&mut hasher);
    }
    pipeline.blend.hash(&mut hasher);
    state.uniform_bytes().hash(&mut hasher);

    let hash = hasher.finish();
    match (hash ^ (hash >> 32)) as u32 {
        MATERIAL_ID_DO_NOT_BATCH => 1,
        id => id,
    }
}

/// A hook run around a custom draw.
pub type DrawHook = Arc<dyn Fn() + Send + Sync>;

/// A draw from caller-owned buffers. Never batched.
///
/// Mesh commands use the same payload; they differ only in when they flush
/// pending triangles.
#[derive(Clone)]
pub struct CustomCommand {
    pipeline: PipelineDesc,
    primitive: PrimitiveType,
    draw_type: DrawType,
    vertex_buffer: BufferId,
    index_buffer: Option<BufferId>,
    instance_buffer: Option<BufferId>,
    index_format: IndexFormat,
    vertex_start: u32,
    vertex_count: u32,
    index_offset: u64,
    index_count: u32,
    instance_count: u32,
    before: Option<DrawHook>,
    after: Option<DrawHook>,
}

/// Mesh draws share the custom command payload.
pub type MeshCommand = CustomCommand;

impl CustomCommand {
    /// A non-indexed triangle-list draw of `vertex_count` vertices from `vertex_buffer`.
    pub fn new(pipeline: PipelineDesc, vertex_buffer: BufferId, vertex_count: u32) -> Self {
        Self {
            pipeline,
            primitive: PrimitiveType::Triangle,
            draw_type: DrawType::Array,
            vertex_buffer,
            index_buffer: None,
            instance_buffer: None,
            index_format: IndexFormat::U16,
            vertex_start: 0,
            vertex_count,
            index_offset: 0,
            index_count: 0,
            instance_count: 1,
            before: None,
            after: None,
        }
    }

    /// Sets the primitive topology.
    #[must_use]
    pub fn with_primitive(mut self, primitive: PrimitiveType) -> Self {
        self.primitive = primitive;
        self
    }

    /// Draws `count` vertices starting at `start`.
    #[must_use]
    pub fn with_vertex_range(mut self, start: u32, count: u32) -> Self {
        self.vertex_start = start;
        self.vertex_count = count;
        self
    }

    /// Switches to an indexed draw of `count` indices at byte `offset`.
    #[must_use]
    pub fn with_indices(
        mut self,
        buffer: BufferId,
        format: IndexFormat,
        offset: u64,
        count: u32,
    ) -> Self {
        self.index_buffer = Some(buffer);
        self.index_format = format;
        self.index_offset = offset;
        self.index_count = count;
        self.draw_type = match self.draw_type {
            DrawType::Array | DrawType::Element => DrawType::Element,
            DrawType::ArrayInstanced | DrawType::ElementInstanced => DrawType::ElementInstanced,
        };
        self
    }

    /// Switches to an instanced draw reading per-instance data from `buffer`.
    #[must_use]
    pub fn with_instances(mut self, buffer: BufferId, count: u32) -> Self {
        self.instance_buffer = Some(buffer);
        self.instance_count = count;
        self.draw_type = match self.draw_type {
            DrawType::Array | DrawType::ArrayInstanced => DrawType::ArrayInstanced,
            DrawType::Element | DrawType::ElementInstanced => DrawType::ElementInstanced,
        };
        self
    }

    /// Runs `hook` right before the draw is recorded.
    #[must_use]
    pub fn with_before(mut self, hook: DrawHook) -> Self {
        self.before = Some(hook);
        self
    }

    /// Runs `hook` right after the draw is recorded.
    #[must_use]
    pub fn with_after(mut self, hook: DrawHook) -> Self {
        self.after = Some(hook);
        self
    }

    /// Program state, vertex layout and blend of the draw.
    pub fn pipeline(&self) -> &PipelineDesc {
        &self.pipeline
    }

    /// The primitive topology.
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    /// How the buffers are consumed.
    pub fn draw_type(&self) -> DrawType {
        self.draw_type
    }

    /// The vertex buffer.
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    /// The index buffer of indexed draws.
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.index_buffer
    }

    /// The per-instance buffer of instanced draws.
    pub fn instance_buffer(&self) -> Option<BufferId> {
        self.instance_buffer
    }

    /// Width of the indices.
    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    /// First vertex and vertex count of non-indexed draws.
    pub fn vertex_range(&self) -> (u32, u32) {
        (self.vertex_start, self.vertex_count)
    }

    /// Byte offset and index count of indexed draws.
    pub fn index_range(&self) -> (u64, u32) {
        (self.index_offset, self.index_count)
    }

    /// Number of instances.
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub(crate) fn run_before(&self) {
        if let Some(hook) = &self.before {
            hook();
        }
    }

    pub(crate) fn run_after(&self) {
        if let Some(hook) = &self.after {
            hook();
        }
    }
}

impl fmt::Debug for CustomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCommand")
            .field("pipeline", &self.pipeline)
            .field("primitive", &self.primitive)
            .field("draw_type", &self.draw_type)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("index_buffer", &self.index_buffer)
            .field("instance_buffer", &self.instance_buffer)
            .field("instance_count", &self.instance_count)
            .finish_non_exhaustive()
    }
}

/// Redirects rendering into another queue at this command's position.
///
/// Obtained from [`Renderer::get_next_group_command`], which hands out a
/// recycled command (and its queue) when one is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCommand {
    queue_id: usize,
}

impl GroupCommand {
    pub(crate) fn new(queue_id: usize) -> Self {
        Self { queue_id }
    }

    /// The queue drawn when this command is reached.
    pub fn queue_id(&self) -> usize {
        self.queue_id
    }
}

/// Work run on the render thread at a command's position in the frame.
pub type RenderCallback = Box<dyn FnOnce(&mut Renderer) -> Result<(), RendererError> + Send>;

/// The discriminant of a [`RenderCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderCommandType {
    /// Batchable triangles.
    Triangles,
    /// A mesh draw.
    Mesh,
    /// A custom draw.
    Custom,
    /// A nested queue.
    Group,
    /// A callback.
    Callback,
}

/// The payload of a [`RenderCommand`].
pub enum CommandKind {
    /// Batchable triangles.
    Triangles(Arc<TrianglesCommand>),
    /// A mesh draw. Flushes pending triangles first.
    Mesh(Arc<MeshCommand>),
    /// A custom draw. Flushes pending triangles first.
    Custom(Arc<CustomCommand>),
    /// Draws another queue in place.
    Group(GroupCommand),
    /// Runs a closure with the renderer.
    Callback(RenderCallback),
}

impl fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Triangles(cmd) => f.debug_tuple("Triangles").field(cmd).finish(),
            CommandKind::Mesh(cmd) => f.debug_tuple("Mesh").field(cmd).finish(),
            CommandKind::Custom(cmd) => f.debug_tuple("Custom").field(cmd).finish(),
            CommandKind::Group(cmd) => f.debug_tuple("Group").field(cmd).finish(),
            CommandKind::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// A unit of work for one frame, with the keys used to order it.
///
/// Commands are immutable once submitted. A command with a negative global
/// order is drawn before everything else, one with a positive order after;
/// zero-order commands are split between 3D opaque, 3D transparent and 2D.
#[derive(Debug)]
pub struct RenderCommand {
    global_order: f32,
    depth: f32,
    is_3d: bool,
    transparent: bool,
    skip_batching: bool,
    kind: CommandKind,
}

impl RenderCommand {
    fn with_kind(kind: CommandKind, global_order: f32) -> Self {
        Self {
            global_order,
            depth: 0.0,
            is_3d: false,
            transparent: false,
            skip_batching: false,
            kind,
        }
    }

    /// Submits a triangle list.
    pub fn triangles(command: Arc<TrianglesCommand>, global_order: f32) -> Self {
        Self::with_kind(CommandKind::Triangles(command), global_order)
    }

    /// Submits a mesh draw.
    pub fn mesh(command: Arc<MeshCommand>, global_order: f32) -> Self {
        Self::with_kind(CommandKind::Mesh(command), global_order)
    }

    /// Submits a custom draw.
    pub fn custom(command: Arc<CustomCommand>, global_order: f32) -> Self {
        Self::with_kind(CommandKind::Custom(command), global_order)
    }

    /// Submits a nested queue.
    pub fn group(command: GroupCommand, global_order: f32) -> Self {
        Self::with_kind(CommandKind::Group(command), global_order)
    }

    /// Submits a callback.
    pub fn callback(callback: RenderCallback, global_order: f32) -> Self {
        Self::with_kind(CommandKind::Callback(callback), global_order)
    }

    /// Marks the command as 3D, at `depth` along the view direction.
    #[must_use]
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.is_3d = true;
        self.depth = depth;
        self
    }

    /// Marks the command as transparent.
    #[must_use]
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Keeps the command out of any batch, even next to an equal material.
    #[must_use]
    pub fn with_skip_batching(mut self, skip: bool) -> Self {
        self.skip_batching = skip;
        self
    }

    /// The global Z order.
    pub fn global_order(&self) -> f32 {
        self.global_order
    }

    /// Distance along the view direction; `0` for 2D commands.
    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Returns `true` for 3D commands.
    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// Returns `true` for transparent commands.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Returns `true` if the command must start its own batch.
    pub fn is_skip_batching(&self) -> bool {
        self.skip_batching
    }

    /// The batching key, [`MATERIAL_ID_DO_NOT_BATCH`] for anything that
    /// cannot be merged.
    pub fn material_id(&self) -> u32 {
        match &self.kind {
            CommandKind::Triangles(cmd) if !self.skip_batching => cmd.material_id(),
            _ => MATERIAL_ID_DO_NOT_BATCH,
        }
    }

    /// The command's discriminant.
    pub fn command_type(&self) -> RenderCommandType {
        match self.kind {
            CommandKind::Triangles(_) => RenderCommandType::Triangles,
            CommandKind::Mesh(_) => RenderCommandType::Mesh,
            CommandKind::Custom(_) => RenderCommandType::Custom,
            CommandKind::Group(_) => RenderCommandType::Group,
            CommandKind::Callback(_) => RenderCommandType::Callback,
        }
    }

    /// The payload.
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub(crate) fn into_kind(self) -> CommandKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::renderer::{
        BlendDesc, ProgramId, ProgramReflection, ProgramState, ShaderStage, TextureId,
        UniformBlockInfo, UniformLocation, UniformMember, VertexLayoutId,
    };

    fn reflection() -> Arc<ProgramReflection> {
        Arc::new(ProgramReflection {
            uniform_blocks: vec![UniformBlockInfo {
                name: "vs_ub".into(),
                binding: 0,
                size: 16,
                stage: ShaderStage::Vertex,
                members: vec![UniformMember {
                    name: "u_color".into(),
                    offset: 0,
                    size: 16,
                }],
            }],
            ..Default::default()
        })
    }

    fn pipeline(program: usize, texture: usize) -> PipelineDesc {
        let mut state = ProgramState::new(ProgramId(program), reflection());
        state.set_texture(0, TextureId(texture));
        PipelineDesc::new(Arc::new(state), VertexLayoutId(1), BlendDesc::alpha_premultiplied())
    }

    #[test]
    fn vertex_is_24_bytes() {
        assert_eq!(V3fC4bT2f::STRIDE, 24);
    }

    #[test]
    fn material_id_is_stable_and_non_zero() {
        let a = material_id(&pipeline(1, 7));
        let b = material_id(&pipeline(1, 7));
        assert_eq!(a, b);
        assert_ne!(a, MATERIAL_ID_DO_NOT_BATCH);
    }

    #[test]
    fn material_id_tracks_program_texture_blend_and_uniforms() {
        let base = material_id(&pipeline(1, 7));
        assert_ne!(base, material_id(&pipeline(2, 7)));
        assert_ne!(base, material_id(&pipeline(1, 8)));

        let mut opaque = pipeline(1, 7);
        opaque.blend = BlendDesc::default();
        assert_ne!(base, material_id(&opaque));

        let mut state = ProgramState::new(ProgramId(1), reflection());
        state.set_texture(0, TextureId(7));
        assert!(state.set_uniform_by_name("u_color", &[1; 16]));
        let tinted = PipelineDesc::new(
            Arc::new(state),
            VertexLayoutId(1),
            BlendDesc::alpha_premultiplied(),
        );
        assert_ne!(base, material_id(&tinted));
    }

    #[test]
    fn callback_uniforms_disable_batching() {
        let mut state = ProgramState::new(ProgramId(1), reflection());
        let location = UniformLocation {
            block: 0,
            offset: 0,
            size: 16,
        };
        state.set_callback_uniform(location, Arc::new(|_: &mut [u8]| {}));
        let desc = PipelineDesc::new(Arc::new(state), VertexLayoutId(1), BlendDesc::default());
        assert_eq!(material_id(&desc), MATERIAL_ID_DO_NOT_BATCH);
    }

    #[test]
    fn skip_batching_resets_the_material_id() {
        // --- 1. ARRANGE ---
        let cmd = Arc::new(TrianglesCommand::new(
            Triangles::quad(1.0, 1.0, Color4B::WHITE),
            Mat4::IDENTITY,
            pipeline(1, 7),
        ));

        // --- 2. ACT ---
        let batched = RenderCommand::triangles(cmd.clone(), 0.0);
        let isolated = RenderCommand::triangles(cmd, 0.0).with_skip_batching(true);

        // --- 3. ASSERT ---
        assert_ne!(batched.material_id(), MATERIAL_ID_DO_NOT_BATCH);
        assert_eq!(isolated.material_id(), MATERIAL_ID_DO_NOT_BATCH);
        assert_eq!(isolated.command_type(), RenderCommandType::Triangles);
    }

    #[test]
    fn custom_command_switches_draw_type() {
        let cmd = CustomCommand::new(pipeline(1, 7), BufferId(3), 6);
        assert_eq!(cmd.draw_type(), DrawType::Array);
        let indexed = cmd.clone().with_indices(BufferId(4), IndexFormat::U32, 16, 12);
        assert_eq!(indexed.draw_type(), DrawType::Element);
        assert_eq!(indexed.index_range(), (16, 12));
        let instanced = indexed.with_instances(BufferId(5), 10);
        assert_eq!(instanced.draw_type(), DrawType::ElementInstanced);
        assert_eq!(
            cmd.with_instances(BufferId(5), 2).draw_type(),
            DrawType::ArrayInstanced
        );
    }

    #[test]
    fn depth_marks_the_command_3d() {
        let cmd = RenderCommand::group(GroupCommand::new(1), 0.0).with_depth(4.0);
        assert!(cmd.is_3d());
        assert_eq!(cmd.depth(), 4.0);
        assert_eq!(cmd.material_id(), MATERIAL_ID_DO_NOT_BATCH);
    }
}
