// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion Editor headless demo.
//!
//! Builds a small scene on a headless canvas, animates it, masks one shape
//! by another, plays simulated frames and walks the undo history, logging
//! each step. Pass a RON engine config path as the first argument to
//! override the defaults.

use motion_editor_app::{ConfigError, EditorState, EngineConfig};
use motion_editor_sequencer::{
    into_handle, Drawable, HeadlessCanvas, HeadlessDrawable, KeyframeSpec, ManualScheduler,
    Property,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Simulated frame interval, seconds
const FRAME_INTERVAL: f64 = 1.0 / 30.0;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("motion_editor_app=debug,motion_editor_sequencer=debug,motion_editor=debug")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Motion Editor v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(std::env::args().nth(1).as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    run_demo(config);
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => EngineConfig::load(Path::new(path)),
        None => Ok(EngineConfig::default()),
    }
}

fn run_demo(config: EngineConfig) {
    let canvas = Arc::new(Mutex::new(HeadlessCanvas::new()));
    let mut editor = EditorState::new(
        config,
        Box::new(canvas.clone()),
        Box::new(ManualScheduler::new()),
    );

    let photo_drawable = into_handle(HeadlessDrawable::at(40.0, 40.0));
    let photo = editor.add_entity("Photo", photo_drawable);
    let circle_drawable = into_handle(HeadlessDrawable::at(0.0, 0.0));
    let circle = editor.add_entity("Circle", circle_drawable.clone());

    let end = editor.clock().duration() / 2.0;
    editor.add_keyframe(circle, KeyframeSpec::new(Property::Left, end, 200.0));
    editor.add_keyframe(circle, KeyframeSpec::new(Property::Angle, end, 180.0));
    editor.set_mask(photo, Some(circle));

    editor.play(0.0);
    let mut now = 0.0;
    for frame in 0..=(end / FRAME_INTERVAL).ceil() as u64 {
        now += FRAME_INTERVAL;
        if let Some(time) = editor.on_frame(now) {
            if frame % 15 == 0 {
                let left = circle_drawable.lock().get(Property::Left);
                tracing::info!(time, left, "Frame {}", editor.clock().current_frame());
            }
        }
    }
    editor.pause();

    if let Some(binding) = editor.masks.binding(photo) {
        let proxy_left = binding.proxy().lock().get(Property::Left);
        tracing::info!(proxy_left, "Mask proxy follows circle");
    }

    while editor.undo() {
        tracing::info!(
            entities = editor.entities().count(),
            redo = editor.history.redo_depth(),
            "Undone"
        );
    }
    while editor.redo() {}

    let stats = editor.history.stats();
    tracing::info!(
        entities = editor.entities().count(),
        masks = editor.masks.len(),
        undo = stats.undo_count,
        keyframes_held = stats.keyframes_held,
        renders = canvas.lock().render_requests(),
        "Demo finished"
    );

    editor.dispose();
}
