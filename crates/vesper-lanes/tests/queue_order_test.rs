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

use common::{material, quad_command, Call, CallLog, MockContext, MockDevice};
use vesper_core::renderer::{CullMode, DepthStencilFlags};
use vesper_core::RendererConfig;
use vesper_lanes::{RenderCommand, Renderer, RendererError};

type Trace = Arc<Mutex<Vec<String>>>;

fn setup() -> Renderer {
    let (context, _log) = MockContext::new(640, 480);
    Renderer::new(MockDevice::new(), context, &RendererConfig::default()).unwrap()
}

/// A callback that records `label` and the depth/cull state it ran with.
fn record_state(trace: &Trace, label: &str, global_order: f32) -> RenderCommand {
    let trace = trace.clone();
    let label = label.to_owned();
    RenderCommand::callback(
        Box::new(move |renderer: &mut Renderer| {
            let state = format!(
                "{label}:{}{}{:?}",
                u8::from(renderer.depth_test()),
                u8::from(renderer.depth_write()),
                renderer.cull_mode()
            );
            trace.lock().unwrap().push(state);
            Ok(())
        }),
        global_order,
    )
}

fn labels(trace: &Trace) -> Vec<String> {
    trace
        .lock()
        .unwrap()
        .iter()
        .map(|entry| entry.split(':').next().unwrap_or_default().to_owned())
        .collect()
}

#[test]
fn sections_run_in_fixed_order_with_their_depth_state() {
    // --- 1. ARRANGE ---
    let mut renderer = setup();
    let trace = Trace::default();
    let commands = [
        record_state(&trace, "pos2", 2.0),
        record_state(&trace, "zero_a", 0.0),
        record_state(&trace, "transparent_near", 0.0)
            .with_depth(1.0)
            .with_transparent(true),
        record_state(&trace, "neg1", -1.0),
        record_state(&trace, "opaque_a", 0.0).with_depth(4.0),
        record_state(&trace, "pos1", 1.0),
        record_state(&trace, "transparent_far", 0.0)
            .with_depth(9.0)
            .with_transparent(true),
        record_state(&trace, "neg5", -5.0),
        record_state(&trace, "opaque_b", 0.0).with_depth(2.0),
        record_state(&trace, "zero_b", 0.0),
    ];
    for command in commands {
        renderer.add_command(command).unwrap();
    }

    // --- 2. ACT ---
    renderer.begin_frame().unwrap();
    renderer.render().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        labels(&trace),
        vec![
            "neg5",
            "neg1",
            "opaque_a",
            "opaque_b",
            "transparent_far",
            "transparent_near",
            "zero_a",
            "zero_b",
            "pos1",
            "pos2",
        ]
    );
    let entries = trace.lock().unwrap().clone();
    assert_eq!(entries[0], "neg5:00None");
    assert_eq!(entries[2], "opaque_a:11Back");
    assert_eq!(entries[4], "transparent_far:10Back");
    assert_eq!(entries[6], "zero_a:00None");
    assert_eq!(entries[9], "pos2:00None");
}

fn depth_flags_recorded(log: &CallLog) -> Vec<DepthStencilFlags> {
    log.calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::DepthStencil(desc) => Some(desc.flags),
            _ => None,
        })
        .collect()
}

#[test]
fn zero_z_bucket_uses_depth_only_when_configured() {
    let depth = DepthStencilFlags::DEPTH_TEST | DepthStencilFlags::DEPTH_WRITE;
    for enabled in [false, true] {
        // --- 1. ARRANGE ---
        let (context, log) = MockContext::new(640, 480);
        let config = RendererConfig {
            depth_test_for_2d: enabled,
            ..RendererConfig::default()
        };
        let mut renderer = Renderer::new(MockDevice::new(), context, &config).unwrap();
        let trace = Trace::default();
        renderer.add_command(record_state(&trace, "neg", -1.0)).unwrap();
        renderer.add_command(record_state(&trace, "zero", 0.0)).unwrap();
        renderer.add_command(quad_command(material(1, 1))).unwrap();
        renderer.add_command(record_state(&trace, "pos", 1.0)).unwrap();

        // --- 2. ACT ---
        renderer.begin_frame().unwrap();
        renderer.render().unwrap();

        // --- 3. ASSERT ---
        let flag = u8::from(enabled);
        assert_eq!(
            *trace.lock().unwrap(),
            vec![
                "neg:00None".to_owned(),
                format!("zero:{flag}{flag}None"),
                "pos:00None".to_owned(),
            ]
        );
        let recorded = depth_flags_recorded(&log);
        assert!(!recorded.is_empty());
        assert_eq!(recorded.iter().any(|flags| flags.contains(depth)), enabled);
        assert!(!renderer.depth_test());
    }
}

#[test]
fn render_restores_the_callers_state() {
    let mut renderer = setup();
    renderer.set_depth_test(true);
    renderer.set_depth_write(true);
    renderer.set_cull_mode(CullMode::Front);
    renderer
        .add_command(quad_command(material(1, 1)).with_depth(3.0))
        .unwrap();

    renderer.begin_frame().unwrap();
    renderer.render().unwrap();

    assert!(renderer.depth_test());
    assert!(renderer.depth_write());
    assert_eq!(renderer.cull_mode(), CullMode::Front);
}

#[test]
fn adding_commands_while_rendering_is_rejected() {
    // --- 1. ARRANGE ---
    let mut renderer = setup();
    let outcome = Arc::new(Mutex::new(None));
    let seen = outcome.clone();
    renderer
        .add_callback_command(
            Box::new(move |renderer: &mut Renderer| {
                let added = renderer.add_command(quad_command(material(1, 1)));
                let pushed = renderer.push_group(0);
                *seen.lock().unwrap() = Some((added, pushed));
                Ok(())
            }),
            0.0,
        )
        .unwrap();

    // --- 2. ACT ---
    renderer.begin_frame().unwrap();
    renderer.render().unwrap();

    // --- 3. ASSERT ---
    let (added, pushed) = outcome.lock().unwrap().take().unwrap();
    assert!(matches!(added, Err(RendererError::AddWhileRendering)));
    assert!(matches!(pushed, Err(RendererError::AddWhileRendering)));
    assert_eq!(renderer.queued_command_count(0), Some(0));

    // Submission works again once the frame has been walked.
    renderer.add_command(quad_command(material(1, 1))).unwrap();
}

#[test]
fn group_is_drawn_at_its_position_in_the_parent_queue() {
    // --- 1. ARRANGE ---
    let mut renderer = setup();
    let trace = Trace::default();
    let group = renderer.get_next_group_command();

    renderer.add_command(record_state(&trace, "before", -1.0)).unwrap();
    renderer
        .add_command(RenderCommand::group(group, 0.0))
        .unwrap();
    renderer.add_command(record_state(&trace, "after", 1.0)).unwrap();

    renderer.push_group(group.queue_id()).unwrap();
    assert_eq!(renderer.current_queue(), group.queue_id());
    renderer.add_command(record_state(&trace, "inner_late", 5.0)).unwrap();
    renderer.add_command(record_state(&trace, "inner_early", -5.0)).unwrap();
    renderer.pop_group().unwrap();
    assert_eq!(renderer.current_queue(), 0);

    // --- 2. ACT ---
    renderer.begin_frame().unwrap();
    renderer.render().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(
        labels(&trace),
        vec!["before", "inner_early", "inner_late", "after"]
    );
    assert_eq!(renderer.queued_command_count(group.queue_id()), Some(0));
}

#[test]
fn group_state_is_isolated_from_the_parent() {
    let mut renderer = setup();
    let trace = Trace::default();
    let group = renderer.get_next_group_command();
    renderer
        .add_command(RenderCommand::group(group, 0.0).with_depth(1.0))
        .unwrap();
    renderer.add_command(record_state(&trace, "opaque", 0.0).with_depth(2.0)).unwrap();
    renderer.push_group(group.queue_id()).unwrap();
    renderer.add_command(record_state(&trace, "inner", 0.0)).unwrap();
    renderer.pop_group().unwrap();

    renderer.begin_frame().unwrap();
    renderer.render().unwrap();

    let entries = trace.lock().unwrap().clone();
    // The group resets depth state for its own 2D commands, then the
    // parent's opaque section continues with its own.
    assert_eq!(entries, vec!["inner:00None", "opaque:11Back"]);
}

#[test]
fn visited_groups_are_recycled() {
    let mut renderer = setup();
    let group = renderer.get_next_group_command();
    renderer
        .add_command(RenderCommand::group(group, 0.0))
        .unwrap();

    renderer.begin_frame().unwrap();
    renderer.render().unwrap();
    renderer.end_frame().unwrap();

    assert_eq!(renderer.get_next_group_command(), group);
    assert_ne!(renderer.get_next_group_command(), group);
}

#[test]
fn group_stack_errors() {
    let mut renderer = setup();

    assert!(matches!(
        renderer.pop_group(),
        Err(RendererError::GroupStackUnderflow)
    ));
    assert!(matches!(
        renderer.push_group(42),
        Err(RendererError::QueueNotFound(42))
    ));
    assert!(matches!(
        renderer.add_command_to(quad_command(material(1, 1)), 3),
        Err(RendererError::QueueNotFound(3))
    ));

    let queue = renderer.create_render_queue();
    renderer
        .add_command_to(quad_command(material(1, 1)), queue)
        .unwrap();
    assert_eq!(renderer.queued_command_count(queue), Some(1));
}
