use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use waymark_common::{EntityId, EntityKind};
use waymark_draw::{DebugTextBackend, RecordingBackend};
use waymark_host::{HostEvent, SimCamera, SimHost, SimWorld};
use waymark_overlay::{OverlayOrchestrator, OverlaySettings};

/// Frames between simulated lifecycle changes.
const SPAWN_EVERY: u64 = 30;
const DESPAWN_EVERY: u64 = 45;
/// Entities killed this way never produce a despawn event.
const SILENT_KILL_EVERY: u64 = 70;

#[derive(Parser)]
#[command(name = "waymark-cli", about = "Drive the waymark overlay against a simulated host")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Run the overlay against a seeded simulated world
    Simulate {
        /// Number of entities scattered at start
        #[arg(short, long, default_value = "200")]
        entities: usize,
        /// Number of frames to render
        #[arg(short, long, default_value = "600")]
        frames: u64,
        /// RNG seed for the simulated world
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Simulated frames per second
        #[arg(long, default_value = "60")]
        fps: f32,
        /// Half-size of the square entities are scattered over
        #[arg(long, default_value = "150")]
        extent: f32,
        /// Settings file (.yaml, .yml or .json)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Print the debug render of this frame
        #[arg(long)]
        dump_frame: Option<u64>,
    },
    /// Print validated settings as YAML
    Settings {
        /// Settings file to load instead of the defaults
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("waymark-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", waymark_common::crate_info());
            println!("host: {}", waymark_host::crate_info());
            println!("spatial: {}", waymark_spatial::crate_info());
            println!("cache: {}", waymark_cache::crate_info());
            println!("visibility: {}", waymark_visibility::crate_info());
            println!("draw: {}", waymark_draw::crate_info());
            println!("overlay: {}", waymark_overlay::crate_info());
        }
        Commands::Simulate {
            entities,
            frames,
            seed,
            fps,
            extent,
            settings,
            dump_frame,
        } => {
            let settings = load_settings(settings.as_deref())?;
            simulate(Simulation {
                entities,
                frames,
                seed,
                fps,
                extent,
                settings,
                dump_frame,
            })?;
        }
        Commands::Settings { path } => {
            let settings = load_settings(path.as_deref())?;
            print!("{}", settings.to_yaml_string()?);
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<OverlaySettings> {
    match path {
        Some(path) => OverlaySettings::from_path(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => {
            let settings = OverlaySettings::default();
            settings.validate()?;
            Ok(settings)
        }
    }
}

struct Simulation {
    entities: usize,
    frames: u64,
    seed: u64,
    fps: f32,
    extent: f32,
    settings: OverlaySettings,
    dump_frame: Option<u64>,
}

fn simulate(sim: Simulation) -> anyhow::Result<()> {
    anyhow::ensure!(
        sim.fps.is_finite() && sim.fps > 0.0,
        "--fps must be positive, got {}",
        sim.fps
    );
    anyhow::ensure!(
        sim.extent.is_finite() && sim.extent > 0.0,
        "--extent must be positive, got {}",
        sim.extent
    );
    println!(
        "Simulating overlay: seed={}, entities={}, frames={}, fps={}",
        sim.seed, sim.entities, sim.frames, sim.fps
    );

    let mut world = SimWorld::with_seed(sim.seed);
    world.scatter(sim.entities, sim.extent);
    let mut host = SimHost::new(world, SimCamera::default());
    let mut overlay = OverlayOrchestrator::new(sim.settings)?;
    let mut recorder = RecordingBackend::new();

    let dt = Duration::try_from_secs_f32(1.0 / sim.fps).context("--fps out of range")?;
    let t0 = Instant::now();
    let mut visible_total = 0usize;
    let mut visible_peak = 0usize;
    let mut blind_frames = 0u64;

    for frame in 0..sim.frames {
        let now = t0 + dt * u32::try_from(frame).unwrap_or(u32::MAX);
        churn(&mut host.world, frame, sim.extent);
        host.world.step(dt.as_secs_f32());
        // Slow sweep so entities enter and leave the view.
        host.camera.rotate(2.0, 0.0);
        host.camera.move_forward(dt.as_secs_f32());
        forward_events(&mut overlay, &mut host, now);

        let report = if sim.dump_frame == Some(frame) {
            let mut debug = DebugTextBackend::new();
            debug.begin_frame(frame);
            let report = overlay.frame(&host, &mut debug, now);
            print!("{}", debug.take_output());
            println!("{report:?}");
            report
        } else {
            recorder.clear();
            overlay.frame(&host, &mut recorder, now)
        };

        visible_total += report.visible;
        visible_peak = visible_peak.max(report.visible);
        if report.camera_unavailable {
            blind_frames += 1;
        }
    }

    let average = if sim.frames == 0 {
        0.0
    } else {
        visible_total as f64 / sim.frames as f64
    };
    println!(
        "Visible per frame: avg={average:.1} peak={visible_peak}, frames without camera: {blind_frames}"
    );
    println!("{}", overlay.telemetry());
    Ok(())
}

/// Deterministic lifecycle churn: periodic spawns, despawns and silent kills.
fn churn(world: &mut SimWorld, frame: u64, extent: f32) {
    if frame > 0 && frame % SPAWN_EVERY == 0 {
        let kind = EntityKind::ALL[(frame / SPAWN_EVERY) as usize % EntityKind::COUNT];
        let angle = frame as f32 * 0.37;
        let radius = extent * 0.5;
        world.spawn(kind, Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius));
    }
    if frame > 0 && frame % DESPAWN_EVERY == 0
        && let Some(id) = first_alive(world)
    {
        world.despawn(id);
    }
    if frame > 0 && frame % SILENT_KILL_EVERY == 0
        && let Some(id) = first_alive(world)
    {
        world.kill(id);
    }
}

fn first_alive(world: &SimWorld) -> Option<EntityId> {
    world
        .entities()
        .iter()
        .find(|(_, e)| e.alive)
        .map(|(id, _)| *id)
}

/// Deliver the world's lifecycle events through the overlay hooks.
fn forward_events(overlay: &mut OverlayOrchestrator, host: &mut SimHost, now: Instant) {
    let events = host.world.drain_events();
    let host: &SimHost = host;
    for event in events {
        match event {
            HostEvent::Spawned { id, kind } => {
                let outcome = overlay.on_entity_spawned(host, id, now);
                tracing::debug!(%id, %kind, ?outcome, "spawn hook");
            }
            HostEvent::Despawned { id } => {
                overlay.on_entity_despawned(id);
                tracing::debug!(%id, "despawn hook");
            }
        }
    }
}
