//! Headless host for the map viewer sketch.

use anyhow::{Context, Result};
use clap::Parser;
use map_viewer::{
    app::SketchContext,
    config::ViewerConfig,
    loader::ObjLoader,
    renderer::HeadlessRenderer,
    script::InputScript,
};
use std::{sync::Arc, time::Duration};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::parse();
    let options = config.sketch_options()?;
    let script = match &config.script {
        Some(path) => InputScript::load(path)?,
        None => InputScript::default(),
    };

    let mut sketch = SketchContext::new(options).context("failed to build the scene")?;
    let mut renderer = HeadlessRenderer::new(sketch.settings);

    match config.resolve_model_path() {
        Ok(path) => {
            sketch.load_in_background(Arc::new(ObjLoader), path);
            // A real display would keep drawing; headless runs want the model in frame 0.
            if !sketch.wait_for_load(Duration::from_secs(30)) {
                log::warn!("Continuing without a model");
            }
        }
        Err(err) => log::error!("{err:#}"),
    }

    let dt = config.frame_dt();
    for frame in 0..u64::from(config.frames) {
        script.apply(frame, &mut sketch, &mut renderer);
        sketch.frame(dt, &mut renderer);
    }

    let report = sketch.report();
    let released = sketch.teardown(&mut renderer);
    log::info!(
        "Rendered {} frames, {} draw calls, released {} meshes",
        renderer.frames,
        renderer.draw_calls,
        released
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
