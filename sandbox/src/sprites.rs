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

//! Sprite materials shared by every quad the sandbox draws.

use anyhow::Result;
use std::borrow::Cow;
use std::sync::Arc;
use vesper_core::math::Mat4;
use vesper_core::renderer::{
    BlendDesc, PipelineDesc, ProgramDescriptor, ProgramReflection, ProgramState, RenderDevice,
    ShaderStage, TextureBindingInfo, TextureDescriptor, UniformBlockInfo, UniformMember,
    VertexFormat, VertexLayoutDesc,
};
use vesper_lanes::V3fC4bT2f;

const SPRITE_VS: &str = r#"
cbuffer vs_ub : register(b0) { float4x4 u_MVPMatrix; };
struct VsOut { float4 pos : SV_Position; float4 color : COLOR; float2 uv : TEXCOORD; };
VsOut main(float3 pos : POSITION, float4 color : COLOR, float2 uv : TEXCOORD) {
    VsOut o;
    o.pos = mul(u_MVPMatrix, float4(pos, 1));
    o.color = color;
    o.uv = uv;
    return o;
}
"#;

const SPRITE_PS: &str = r#"
Texture2D u_tex0 : register(t0);
SamplerState u_tex0_sampler : register(s0);
float4 main(float4 pos : SV_Position, float4 color : COLOR, float2 uv : TEXCOORD) : SV_Target {
    return u_tex0.Sample(u_tex0_sampler, uv) * color;
}
"#;

fn sprite_reflection() -> ProgramReflection {
    ProgramReflection {
        uniform_blocks: vec![UniformBlockInfo {
            name: "vs_ub".into(),
            binding: 0,
            size: 64,
            stage: ShaderStage::Vertex,
            members: vec![UniformMember {
                name: "u_MVPMatrix".into(),
                offset: 0,
                size: 64,
            }],
        }],
        textures: vec![TextureBindingInfo {
            name: "u_tex0".into(),
            binding: 0,
            count: 1,
            sampler_slot: 0,
        }],
        vertex_inputs: Vec::new(),
    }
}

/// One pipeline per texture. Quads sharing a sheet batch together.
pub struct SpriteSheets {
    pub pipelines: Vec<PipelineDesc>,
}

impl SpriteSheets {
    /// Compiles the sprite program and creates `count` small textures.
    pub fn new(device: &dyn RenderDevice, count: usize, width: u32, height: u32) -> Result<Self> {
        let vertex = device.compile_shader(ShaderStage::Vertex, SPRITE_VS)?;
        let fragment = device.compile_shader(ShaderStage::Fragment, SPRITE_PS)?;
        let reflection = Arc::new(sprite_reflection());
        let program = device.create_program(&ProgramDescriptor {
            label: Some(Cow::Borrowed("sprite")),
            vertex_bytecode: Cow::Owned(vertex),
            fragment_bytecode: Cow::Owned(fragment),
            reflection: (*reflection).clone(),
        })?;

        let layout = device.create_vertex_layout(
            &VertexLayoutDesc::new()
                .attribute("POSITION", 0, VertexFormat::Float3, 0, false)
                .attribute("COLOR", 0, VertexFormat::UByte4, 12, true)
                .attribute("TEXCOORD", 0, VertexFormat::Float2, 16, false)
                .end_layout(Some(V3fC4bT2f::STRIDE)),
        )?;

        let projection =
            Mat4::orthographic_rh_zo(0.0, width as f32, 0.0, height as f32, -1024.0, 1024.0);

        let mut pipelines = Vec::with_capacity(count);
        for sheet in 0..count {
            let texture = device.create_texture(&TextureDescriptor::default())?;
            let shade = (sheet * 60 % 256) as u8;
            let texels: Vec<u8> = [shade, 255 - shade, 128, 255].repeat(16);
            device.update_texture_data(texture, &texels, 4, 4, 0)?;

            let mut state = ProgramState::new(program, reflection.clone());
            state.set_uniform_by_name("u_MVPMatrix", bytemuck::bytes_of(&projection));
            state.set_texture(0, texture);
            pipelines.push(PipelineDesc::new(
                Arc::new(state),
                layout,
                BlendDesc::alpha_premultiplied(),
            ));
        }

        Ok(Self { pipelines })
    }
}
