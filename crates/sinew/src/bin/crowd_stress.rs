//! # Crowd Stress Test
//!
//! Evaluates a crowd of procedurally animated characters for a number of
//! frames and reports throughput.
//!
//! ```text
//! crowd_stress [ENTITIES] [FRAMES] [WORKERS] [CONFIG.toml]
//! ```
//!
//! Set `RUST_LOG=sinew_core=debug` for arena and evaluation logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use sinew::core::procedural::{breathe_clip, chain_skeleton, jog_clip, walk_clip};
use sinew::core::{AimIk, ConsumerKind, TwoBoneIk};
use sinew::{
    ArenaPool, CrowdEvaluator, Evaluator, IkDescriptor, Instance, LayerDescriptor, PlaybackMode,
    PoseConfig, PoseResult,
};

const JOINTS: usize = 64;
const FRAME_DT: f32 = 1.0 / 60.0;

fn arg_or(index: usize, default: usize) -> usize {
    std::env::args()
        .nth(index)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(default)
}

fn main() -> PoseResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let entities = arg_or(1, 1_000).max(1);
    let frames = arg_or(2, 120);
    let default_workers = std::thread::available_parallelism().map_or(4, usize::from);
    let workers = arg_or(3, default_workers).max(1);
    let config = match std::env::args().nth(4) {
        Some(path) => PoseConfig::from_toml_file(path)?,
        None => PoseConfig::default(),
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║           SINEW CROWD STRESS TEST                                ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  {entities:>6} entities  x  {JOINTS} joints  on  {workers:>2} workers                   ");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let skeleton = Arc::new(chain_skeleton(JOINTS, 0.1)?);
    let walk = Arc::new(walk_clip(&skeleton)?);
    let jog = Arc::new(jog_clip(&skeleton)?);
    let breathe = Arc::new(breathe_clip(JOINTS, 3.0, 0.05)?);

    let mut pool = ArenaPool::for_consumer(ConsumerKind::Instance, &skeleton, entities)?;
    while pool.lease().is_some() {}
    let mut instances = pool
        .iter_mut()
        .map(|(_, bytes)| Instance::init(bytes.as_bytes_mut(), Arc::clone(&skeleton)))
        .collect::<PoseResult<Vec<_>>>()?;

    // Every fourth entity reaches for something.
    for (index, instance) in instances.iter_mut().enumerate() {
        if index % 4 == 0 {
            instance.set_ik(&[
                IkDescriptor::TwoBone(TwoBoneIk {
                    start: 20,
                    mid: 21,
                    end: 22,
                    target: Vec3::new(0.3, 2.3, 0.1),
                    pole: Vec3::X,
                    weight: 1.0,
                }),
                IkDescriptor::Aim(AimIk {
                    joint: 40,
                    target: Vec3::new(2.0, 6.0, 0.0),
                    forward: Vec3::Y,
                    up: Vec3::Z,
                    weight: 0.5,
                }),
            ]);
        }
    }

    let mut crowd = CrowdEvaluator::new(Evaluator::new(config)?, Arc::clone(&skeleton), workers)?;
    let checksum = AtomicU64::new(0);
    let mut failures = 0;

    println!("Running {frames} frames...");
    let start = Instant::now();
    for frame in 0..frames {
        #[allow(clippy::cast_precision_loss)]
        let time = frame as f32 * FRAME_DT;
        for (index, instance) in instances.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let offset = index as f32 * 0.037;
            let blend = 0.5 + 0.5 * (time + offset).sin();
            instance.set_layers(&[
                LayerDescriptor::normal(Arc::clone(&walk), time + offset, PlaybackMode::Wrap, 1.0 - blend),
                LayerDescriptor::normal(Arc::clone(&jog), time + offset, PlaybackMode::Wrap, blend),
                LayerDescriptor::additive(Arc::clone(&breathe), time, PlaybackMode::Wrap, 1.0),
            ]);
        }

        let report = crowd.evaluate(&mut instances, |_, palette| {
            // Translation x of the last joint, as raw bits.
            let bits = palette[palette.len() - 3].to_bits();
            checksum.fetch_add(u64::from(bits), Ordering::Relaxed);
        })?;
        failures += report.errors.len();
        for (index, err) in report.errors.iter().take(3) {
            tracing::error!(frame, entity = index, code = ?err.code(), error = %err, "entity failed");
        }
    }
    let elapsed = start.elapsed();

    let evaluations = entities * frames;
    #[allow(clippy::cast_precision_loss)]
    let per_second = evaluations as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    #[allow(clippy::cast_precision_loss)]
    let micros_each = elapsed.as_secs_f64() * 1e6 / evaluations.max(1) as f64;

    println!();
    println!("┌─ THROUGHPUT ───────────────────────────────────────────────────┐");
    println!("│ Duration:           {:.3}s", elapsed.as_secs_f64());
    println!("│ Evaluations:        {evaluations}");
    println!("│ Evaluations/sec:    {per_second:.0}");
    println!("│ Wall time / eval:   {micros_each:.2}us");
    println!("│ Failures:           {failures}");
    println!("│ Checksum:           {:#018x}", checksum.load(Ordering::Relaxed));
    println!("└────────────────────────────────────────────────────────────────┘");

    Ok(())
}
