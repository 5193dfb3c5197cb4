//! Depth demo: builds the depth pre-pass -> linearize graph and runs frames
//!
//! Run with:
//!   cargo run --example depth
//!   cargo run --example depth -- --width 320 --height 180 --frames 120 --reachable-only
//!
//! Set `RUST_LOG=debug` to see graph construction and compilation, `trace` for
//! per-pass execution.

use clap::{Parser, ValueEnum};
use redlilium_render_graph::pipeline::{build_depth_graph, DepthBuffer, DepthPass, DepthQuad};
use redlilium_render_graph::{
    init, CallbackPass, Camera, CompilationMode, FrameContext, GraphResult, RenderGraphConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum CliCompilationMode {
    /// Schedule every pass
    #[default]
    Full,
    /// Schedule only passes contributing to the graph output
    ReachableOnly,
}

impl From<CliCompilationMode> for CompilationMode {
    fn from(mode: CliCompilationMode) -> Self {
        match mode {
            CliCompilationMode::Full => CompilationMode::Full,
            CliCompilationMode::ReachableOnly => CompilationMode::ReachableOnly,
        }
    }
}

/// Depth render graph demo.
#[derive(Parser, Debug)]
#[command(name = "depth", about = "Depth pre-pass and linearization through a render graph")]
struct Args {
    /// Target width in pixels.
    #[arg(long, default_value = "160")]
    width: u32,

    /// Target height in pixels.
    #[arg(long, default_value = "90")]
    height: u32,

    /// Camera near plane.
    #[arg(long, default_value = "0.1")]
    near: f32,

    /// Camera far plane.
    #[arg(long, default_value = "100.0")]
    far: f32,

    /// Number of frames to run.
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Which passes to schedule.
    #[arg(long, default_value = "full", value_enum)]
    mode: CliCompilationMode,

    /// Add a debug pass nothing consumes (pruned in reachable-only mode).
    #[arg(long)]
    debug_overlay: bool,
}

fn scene(width: u32, height: u32, time: f32) -> Vec<DepthQuad> {
    let sway = (time.sin() * 0.25 * width as f32) as i64;
    let center_x = (width / 2) as i64 + sway;
    let left = (center_x - (width / 6) as i64).clamp(0, width as i64) as u32;
    let right = (center_x + (width / 6) as i64).clamp(0, width as i64) as u32;

    vec![
        // Back wall
        DepthQuad::new([0, 0], [width, height], 40.0),
        // Floor strip
        DepthQuad::new([0, height * 3 / 4], [width, height], 12.0),
        // Moving box
        DepthQuad::new([left, height / 4], [right, height * 3 / 4], 6.0 + time.cos() * 2.0),
    ]
}

fn main() -> GraphResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    init();

    let args = Args::parse();

    let config = RenderGraphConfig {
        label: "depth_demo".to_string(),
        compilation_mode: args.mode.into(),
        ..Default::default()
    };
    let (mut graph, resources) = build_depth_graph(scene(args.width, args.height, 0.0), config)?;

    if args.debug_overlay {
        let overlay = graph.create_pass(
            CallbackPass::new("debug_overlay")
                .with_input("depth")
                .with_output("histogram")
                .on_execute(|ctx| {
                    let depth = ctx.input::<DepthBuffer>("depth")?;
                    let mut histogram = [0u32; 8];
                    for &texel in depth.data() {
                        let bucket = ((texel.clamp(0.0, 1.0) * 7.0).round()) as usize;
                        histogram[bucket] += 1;
                    }
                    ctx.write_output("histogram", histogram)
                }),
        )?;
        graph.set_input(overlay, "depth", resources.depth)?;
    }

    let compiled = graph.compile()?;
    log::info!(
        "Compiled {} passes ({} pruned)",
        compiled.pass_count(),
        compiled.pruned_passes().len()
    );
    for &pass in graph.compiled().map(|c| c.pass_order()).unwrap_or_default() {
        log::info!("  {}", graph.pass_name(pass).unwrap_or("<unknown>"));
    }

    let aspect = args.width as f32 / args.height.max(1) as f32;
    let camera = Camera::perspective(60f32.to_radians(), aspect, args.near, args.far);
    let mut frame = FrameContext::new(args.width, args.height, camera);
    let delta_time = 1.0 / 60.0;

    for _ in 0..args.frames {
        let time = frame.frame_index as f32 * delta_time;
        if let Some(depth_pass) = graph.pass_mut::<DepthPass>(resources.depth_pass) {
            depth_pass.set_quads(scene(args.width, args.height, time));
        }

        graph.execute(&frame)?;

        if let Some(linear) = graph.output_resource::<DepthBuffer>() {
            let center = linear
                .get(args.width / 2, args.height / 2)
                .unwrap_or(args.far);
            log::debug!("Frame {}: center distance {:.3}", frame.frame_index, center);
        }

        frame.advance(delta_time);
    }

    if let Some(linear) = graph.output_resource::<DepthBuffer>() {
        let (min, max) = linear
            .data()
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &d| (lo.min(d), hi.max(d)));
        log::info!(
            "Ran {} frames; last frame linear depth range {:.2}..{:.2} ({} bytes)",
            graph.frame_count(),
            min,
            max,
            linear.as_bytes().len()
        );
    }

    Ok(())
}
