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

mod common;

use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use common::{material, quad, quad_command, Call, CallLog, MockContext, MockDevice};
use vesper_core::math::{Color4F, Mat4, Vec3};
use vesper_core::renderer::*;
use vesper_core::RendererConfig;
use vesper_lanes::{CustomCommand, RenderCommand, Renderer, RendererError};

fn setup_with(config: RendererConfig) -> (Arc<MockDevice>, Renderer, CallLog) {
    let device = MockDevice::new();
    let (context, log) = MockContext::new(800, 600);
    let renderer = Renderer::new(device.clone(), context, &config).unwrap();
    (device, renderer, log)
}

fn setup() -> (Arc<MockDevice>, Renderer, CallLog) {
    setup_with(RendererConfig::default())
}

fn draw_frame(renderer: &mut Renderer) {
    assert!(renderer.begin_frame().unwrap());
    renderer.render().unwrap();
    renderer.end_frame().unwrap();
}

fn element_draw(count: u32, offset: u64) -> Call {
    Call::DrawElements {
        primitive: PrimitiveType::Triangle,
        format: IndexFormat::U16,
        count,
        offset,
        instances: 1,
    }
}

#[test]
fn new_renderer_allocates_one_dynamic_buffer_pair() {
    let (device, renderer, _log) = setup();

    let state = device.state();
    assert_eq!(state.buffers.len(), 2);
    assert_eq!(state.buffers[0].buffer_type, BufferType::Vertex);
    assert_eq!(state.buffers[0].data.len(), 65536 * 24);
    assert_eq!(state.buffers[1].buffer_type, BufferType::Index);
    assert_eq!(state.buffers[1].data.len(), 98304 * 2);
    assert!(state
        .buffers
        .iter()
        .all(|buffer| buffer.usage == BufferUsage::Dynamic));
    drop(state);

    assert_eq!(
        renderer.viewport(),
        Viewport {
            x: 0,
            y: 0,
            width: 800,
            height: 600
        }
    );
}

#[test]
fn renderer_creation_fails_without_buffers() {
    let device = MockDevice::new();
    device.state().fail_buffer_creation = true;
    let (context, _log) = MockContext::new(800, 600);

    let result = Renderer::new(device, context, &RendererConfig::default());

    assert!(matches!(result, Err(RendererError::Resource(_))));
}

#[test]
fn single_quad_is_uploaded_transformed_and_drawn_once() {
    // --- 1. ARRANGE ---
    let (device, mut renderer, log) = setup();
    let model_view = Mat4::from_translation(Vec3::new(10.0, 20.0, 0.0));
    renderer
        .add_command(RenderCommand::triangles(quad(model_view, material(1, 1)), 0.0))
        .unwrap();

    // --- 2. ACT ---
    draw_frame(&mut renderer);

    // --- 3. ASSERT ---
    assert_eq!(log.draws(), vec![element_draw(6, 0)]);

    let vertices = device.vertices(BufferId(0), 0, 4);
    let expected = [(10.0, 22.0), (10.0, 20.0), (12.0, 22.0), (12.0, 20.0)];
    for (vertex, (x, y)) in vertices.iter().zip(expected) {
        assert_relative_eq!(vertex.position.x, x);
        assert_relative_eq!(vertex.position.y, y);
    }
    assert_eq!(device.indices(BufferId(1), 0, 6), vec![0, 1, 2, 3, 2, 1]);

    let calls = log.calls();
    assert!(calls.contains(&Call::VertexBuffer(BufferId(0))));
    assert!(calls.contains(&Call::IndexBuffer(BufferId(1))));
}

#[test]
fn interleaved_materials_draw_in_submission_order() {
    let (device, mut renderer, log) = setup();
    renderer.add_command(quad_command(material(1, 1))).unwrap();
    renderer.add_command(quad_command(material(2, 1))).unwrap();

    draw_frame(&mut renderer);

    assert_eq!(log.draws(), vec![element_draw(6, 0), element_draw(6, 12)]);
    let programs: Vec<ProgramId> = log
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Pipeline { program, .. } => Some(program),
            _ => None,
        })
        .collect();
    assert_eq!(programs, vec![ProgramId(1), ProgramId(2)]);
    // The second quad's indices are rebased after the first quad's vertices.
    assert_eq!(device.indices(BufferId(1), 6, 6), vec![4, 5, 6, 7, 6, 5]);
}

#[test]
fn consecutive_quads_with_one_material_share_a_draw() {
    let (_device, mut renderer, log) = setup();
    for _ in 0..10 {
        renderer.add_command(quad_command(material(3, 7))).unwrap();
    }

    draw_frame(&mut renderer);

    assert_eq!(log.draws(), vec![element_draw(60, 0)]);
    let stats = renderer.stats();
    assert_eq!(stats.drawn_batches, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.drawn_vertices, 60);
}

#[test]
fn skip_batching_isolates_a_command() {
    let (_device, mut renderer, log) = setup();
    renderer.add_command(quad_command(material(1, 1))).unwrap();
    renderer
        .add_command(quad_command(material(1, 1)).with_skip_batching(true))
        .unwrap();
    renderer.add_command(quad_command(material(1, 1))).unwrap();

    draw_frame(&mut renderer);

    assert_eq!(
        log.draws(),
        vec![element_draw(6, 0), element_draw(6, 12), element_draw(6, 24)]
    );
}

#[test]
fn full_buffers_move_to_the_next_pair_and_rewind_next_frame() {
    // --- 1. ARRANGE ---
    // Room for exactly two quads per buffer pair.
    let config = RendererConfig {
        vbo_size: 8,
        index_vbo_size: 12,
        ..RendererConfig::default()
    };
    let (device, mut renderer, log) = setup_with(config);
    for _ in 0..3 {
        renderer.add_command(quad_command(material(1, 1))).unwrap();
    }

    // --- 2. ACT ---
    draw_frame(&mut renderer);

    // --- 3. ASSERT ---
    assert_eq!(device.state().buffers.len(), 4);
    assert_eq!(log.draws(), vec![element_draw(12, 0), element_draw(6, 0)]);
    let vertex_buffers: Vec<Call> = log
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::VertexBuffer(_)))
        .collect();
    assert_eq!(
        vertex_buffers,
        vec![Call::VertexBuffer(BufferId(0)), Call::VertexBuffer(BufferId(2))]
    );

    // The next frame starts again from the first pair without allocating.
    log.clear();
    renderer.add_command(quad_command(material(1, 1))).unwrap();
    draw_frame(&mut renderer);
    assert_eq!(device.state().buffers.len(), 4);
    assert!(log.calls().contains(&Call::VertexBuffer(BufferId(0))));
    assert_eq!(log.draws(), vec![element_draw(6, 0)]);
}

#[test]
fn later_flushes_append_after_earlier_ones() {
    let (device, mut renderer, log) = setup();
    renderer.add_command(quad_command(material(1, 1))).unwrap();
    // A callback forces a flush between the two quads.
    renderer
        .add_callback_command(Box::new(|_| Ok(())), 0.0)
        .unwrap();
    renderer.add_command(quad_command(material(1, 1))).unwrap();

    draw_frame(&mut renderer);

    assert_eq!(log.draws(), vec![element_draw(6, 0), element_draw(6, 12)]);
    assert_eq!(device.indices(BufferId(1), 6, 6), vec![4, 5, 6, 7, 6, 5]);
}

#[test]
fn rejected_pipeline_skips_the_draw() {
    let device = MockDevice::new();
    let (context, log) = MockContext::new(800, 600);
    let mut renderer = Renderer::new(
        device,
        context.rejecting_pipelines(),
        &RendererConfig::default(),
    )
    .unwrap();
    renderer.add_command(quad_command(material(1, 1))).unwrap();

    draw_frame(&mut renderer);

    assert!(log.draws().is_empty());
    assert_eq!(renderer.stats().draw_calls, 0);
}

#[test]
fn custom_command_flushes_pending_triangles_and_runs_hooks() {
    // --- 1. ARRANGE ---
    let (_device, mut renderer, log) = setup();
    let hooks = Arc::new(Mutex::new(Vec::new()));
    let before = hooks.clone();
    let after = hooks.clone();
    let custom = CustomCommand::new(material(9, 0), BufferId(40), 4)
        .with_indices(BufferId(41), IndexFormat::U32, 16, 36)
        .with_instances(BufferId(42), 5)
        .with_before(Arc::new(move || before.lock().unwrap().push("before")))
        .with_after(Arc::new(move || after.lock().unwrap().push("after")));

    renderer.add_command(quad_command(material(1, 1))).unwrap();
    renderer
        .add_command(RenderCommand::custom(Arc::new(custom), 0.0))
        .unwrap();

    // --- 2. ACT ---
    draw_frame(&mut renderer);

    // --- 3. ASSERT ---
    assert_eq!(
        log.draws(),
        vec![
            element_draw(6, 0),
            Call::DrawElements {
                primitive: PrimitiveType::Triangle,
                format: IndexFormat::U32,
                count: 36,
                offset: 16,
                instances: 5,
            },
        ]
    );
    let calls = log.calls();
    assert!(calls.contains(&Call::VertexBuffer(BufferId(40))));
    assert!(calls.contains(&Call::IndexBuffer(BufferId(41))));
    assert!(calls.contains(&Call::InstanceBuffer(BufferId(42))));
    assert_eq!(*hooks.lock().unwrap(), vec!["before", "after"]);
    assert_eq!(renderer.stats().drawn_vertices, 6 + 36 * 5);
    assert_eq!(renderer.stats().draw_calls, 2);
}

#[test]
fn mesh_command_draws_a_vertex_range() {
    let (_device, mut renderer, log) = setup();
    let mesh = CustomCommand::new(material(2, 0), BufferId(7), 0)
        .with_primitive(PrimitiveType::Line)
        .with_vertex_range(2, 8);
    renderer
        .add_command(RenderCommand::mesh(Arc::new(mesh), 0.0))
        .unwrap();

    draw_frame(&mut renderer);

    assert_eq!(
        log.draws(),
        vec![Call::DrawArrays {
            primitive: PrimitiveType::Line,
            start: 2,
            count: 8,
            instances: 1,
        }]
    );
}

#[test]
fn clear_opens_a_pass_that_discards_unnamed_planes() {
    // --- 1. ARRANGE ---
    let (_device, mut renderer, log) = setup();
    let red = Color4F::new(1.0, 0.0, 0.0, 1.0);
    renderer
        .clear(
            TargetBufferFlags::COLOR0 | TargetBufferFlags::DEPTH,
            red,
            0.5,
            3,
            -10.0,
        )
        .unwrap();

    // --- 2. ACT ---
    draw_frame(&mut renderer);

    // --- 3. ASSERT ---
    let desc = log
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::BeginPass { desc, .. } => Some(desc),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        desc.flags.clear,
        TargetBufferFlags::COLOR0 | TargetBufferFlags::DEPTH
    );
    assert_eq!(desc.flags.discard_start, TargetBufferFlags::STENCIL);
    assert_eq!(desc.clear_color, [1.0, 0.0, 0.0, 1.0]);
    assert_relative_eq!(desc.clear_depth, 0.5);
    assert_eq!(renderer.clear_color(), red);
    assert_eq!(
        renderer.clear_flags(),
        TargetBufferFlags::COLOR0 | TargetBufferFlags::DEPTH
    );
}

#[test]
fn offscreen_target_without_depth_disables_depth_and_stencil() {
    // --- 1. ARRANGE ---
    let (device, mut renderer, log) = setup();
    let target = RenderTargetId(5);
    device.add_render_target(
        target,
        RenderTargetDescriptor {
            color: [Some(TextureId(1)), None, None, None],
            depth_stencil: None,
        },
    );
    renderer.set_render_target(target);
    renderer.set_stencil_test(true);
    renderer
        .add_command(quad_command(material(1, 1)).with_depth(0.5))
        .unwrap();

    // --- 2. ACT ---
    draw_frame(&mut renderer);

    // --- 3. ASSERT ---
    let states: Vec<DepthStencilDesc> = log
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::DepthStencil(desc) => Some(desc),
            _ => None,
        })
        .collect();
    assert!(!states.is_empty());
    assert!(states.iter().all(|desc| desc.flags.is_empty()));
    assert!(log.calls().contains(&Call::BeginPass {
        target,
        desc: RenderPassDesc::default()
    }));
}

#[test]
fn stats_reset_each_frame_and_frame_number_advances() {
    let (_device, mut renderer, _log) = setup();
    renderer.add_command(quad_command(material(1, 1))).unwrap();
    draw_frame(&mut renderer);
    assert_eq!(renderer.stats().frame_number, 1);
    assert_eq!(renderer.stats().draw_calls, 1);

    renderer.begin_frame().unwrap();
    assert_eq!(renderer.stats().draw_calls, 0);
    assert_eq!(renderer.stats().drawn_vertices, 0);
    renderer.render().unwrap();
    renderer.end_frame().unwrap();
    assert_eq!(renderer.stats().frame_number, 2);
}

#[test]
fn surface_resize_resets_the_viewport() {
    let (_device, mut renderer, _log) = setup();
    renderer.set_viewport(10, 10, 100, 100);

    assert!(!renderer.update_surface(800, 600));
    assert_eq!(renderer.viewport().width, 100);

    assert!(renderer.update_surface(1024, 768));
    assert_eq!(renderer.surface_size(), (1024, 768));
    assert_eq!(
        renderer.viewport(),
        Viewport {
            x: 0,
            y: 0,
            width: 1024,
            height: 768
        }
    );
}

#[test]
fn read_pixels_reaches_the_context() {
    let (_device, mut renderer, log) = setup();
    let received = Arc::new(Mutex::new(false));
    let flag = received.clone();

    renderer.read_pixels(
        RenderTargetId::DEFAULT,
        false,
        Box::new(move |_pixels| *flag.lock().unwrap() = true),
    );

    assert!(*received.lock().unwrap());
    assert_eq!(log.calls(), vec![Call::ReadPixels(RenderTargetId::DEFAULT)]);
    assert_eq!(renderer.completed_fence_value(), 7);
}

#[test]
fn dropping_the_renderer_releases_its_buffers() {
    let (device, renderer, _log) = setup();

    drop(renderer);

    let destroyed = device.state().destroyed.clone();
    assert_eq!(destroyed.len(), 2);
    assert!(destroyed.contains(&BufferId(0)));
    assert!(destroyed.contains(&BufferId(1)));
}
