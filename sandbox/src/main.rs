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

//! Headless sandbox: draws a grid of batched sprites through the Direct3D 12
//! backend running on the in-memory device and reports frame statistics.

mod sprites;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vesper_core::math::{Color4B, Color4F, Mat4, Vec3};
use vesper_core::renderer::{RenderDevice, SurfaceDescriptor, TargetBufferFlags};
use vesper_core::RendererConfig;
use vesper_infra::D3d12Driver;
use vesper_lanes::{RenderCommand, Renderer, Triangles, TrianglesCommand};
use vesper_telemetry::{logging, ScopedTimer, TelemetryService};

use crate::sprites::SpriteSheets;

const DEFAULT_CONFIG_PATH: &str = "sandbox/config/sandbox.ron";
const SPRITE_SIZE: f32 = 32.0;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SandboxSettings {
    frames: u32,
    columns: u32,
    rows: u32,
    surface: (u32, u32),
    renderer: RendererConfig,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            frames: 4,
            columns: 16,
            rows: 8,
            surface: (1280, 720),
            renderer: RendererConfig::default(),
        }
    }
}

fn load_settings(path: &Path) -> Result<SandboxSettings> {
    if !path.exists() {
        log::info!("No settings at {}, using defaults", path.display());
        return Ok(SandboxSettings::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let settings =
        ron::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(settings)
}

/// Queues one frame: a clear, the sprite grid, and an overlay group on top.
fn submit_frame(
    renderer: &mut Renderer,
    sheets: &SpriteSheets,
    settings: &SandboxSettings,
    frame: u32,
) -> Result<()> {
    renderer.clear(
        TargetBufferFlags::ALL,
        Color4F::new(0.1, 0.1, 0.12, 1.0),
        1.0,
        0,
        f32::MIN,
    )?;

    // Rows alternate sheets, so each row becomes one batch.
    for row in 0..settings.rows {
        let pipeline = &sheets.pipelines[row as usize % sheets.pipelines.len()];
        for column in 0..settings.columns {
            let offset = (frame + column) as f32 * 0.5;
            let model_view = Mat4::from_translation(Vec3::new(
                column as f32 * SPRITE_SIZE + offset,
                row as f32 * SPRITE_SIZE,
                0.0,
            ));
            let quad = Triangles::quad(SPRITE_SIZE, SPRITE_SIZE, Color4B::WHITE);
            let command = TrianglesCommand::new(quad, model_view, pipeline.clone());
            renderer.add_command(RenderCommand::triangles(Arc::new(command), 0.0))?;
        }
    }

    let overlay = renderer.get_next_group_command();
    renderer.add_command(RenderCommand::group(overlay, 1.0))?;
    renderer.push_group(overlay.queue_id())?;
    let banner = TrianglesCommand::new(
        Triangles::quad(settings.surface.0 as f32, SPRITE_SIZE, Color4B::new(0, 0, 0, 160)),
        Mat4::IDENTITY,
        sheets.pipelines[0].clone(),
    );
    renderer.add_command(RenderCommand::triangles(Arc::new(banner), 0.0))?;
    renderer.pop_group()?;
    Ok(())
}

fn main() -> Result<()> {
    logging::init_logging("info");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_settings(Path::new(&config_path))?;
    let config = settings.renderer.clone().validated();

    let driver = Arc::new(D3d12Driver::headless(config.clone())?);
    let info = driver.device_info();
    log::info!("Device: {} ({}), {}", info.renderer, info.vendor, info.version);

    let (width, height) = settings.surface;
    let context = driver.create_render_context(&SurfaceDescriptor::offscreen(width, height))?;
    let sheets = SpriteSheets::new(driver.as_ref(), 3, width, height)?;
    let mut renderer = Renderer::new(driver.clone(), context, &config)?;
    let mut telemetry = TelemetryService::new(settings.frames as usize, Duration::ZERO);

    for frame in 0..settings.frames {
        let mut cpu_time = Duration::ZERO;
        {
            let _timer = ScopedTimer::new("frame", &mut cpu_time);
            if !renderer.begin_frame()? {
                log::warn!("Frame {frame} skipped");
                continue;
            }
            submit_frame(&mut renderer, &sheets, &settings, frame)?;
            renderer.render()?;
            renderer.end_frame()?;
        }
        telemetry.tick(renderer.stats(), cpu_time);
    }

    println!("{}", telemetry.history().to_json()?);
    Ok(())
}
