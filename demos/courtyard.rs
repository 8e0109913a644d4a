//! Road noise around a U-shaped block.
//!
//! A line source runs along the open side of a courtyard; receivers sit on a
//! lattice covering the yard and the street.

use noisepath::compute::{GridComputationManager, MemorySink, ProgressTracker, SphericalSpreading};
use noisepath::math::{Point2, Point3};
use noisepath::propagation::{PropagationConfig, TimePeriod};
use noisepath::scene::{Emission, Receiver, ReceiverId, Scene, Source, SourceId};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> noisepath::Result<()> {
    // Default: WARN for everything, INFO for noisepath.
    let env_filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::WARN.into())
        .add_directive("noisepath=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let scene = Scene::builder()
        .add_building(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(60.0, 0.0),
                Point2::new(60.0, 40.0),
                Point2::new(50.0, 40.0),
                Point2::new(50.0, 10.0),
                Point2::new(10.0, 10.0),
                Point2::new(10.0, 40.0),
                Point2::new(0.0, 40.0),
            ],
            15.0,
        )
        .add_wall(Point2::new(-20.0, 70.0), Point2::new(80.0, 70.0), 3.0)
        .add_terrain_points([
            Point3::new(-50.0, -50.0, 0.0),
            Point3::new(120.0, -50.0, 0.0),
            Point3::new(120.0, 120.0, 2.0),
            Point3::new(-50.0, 120.0, 2.0),
        ])
        .build();

    let road = Source::line(
        SourceId(1),
        vec![scene.lift(&Point2::new(-40.0, 55.0), 0.5), scene.lift(&Point2::new(100.0, 55.0), 0.5)],
        Emission::new()
            .with_period(TimePeriod::Day, vec![72.0, 75.0, 78.0, 80.0, 79.0, 76.0, 70.0, 62.0])
            .with_period(TimePeriod::Evening, vec![69.0, 72.0, 75.0, 77.0, 76.0, 73.0, 67.0, 59.0])
            .with_period(TimePeriod::Night, vec![64.0, 67.0, 70.0, 72.0, 71.0, 68.0, 62.0, 54.0]),
    );
    let sources = vec![road];

    let mut receivers = Vec::new();
    for i in 0..8u32 {
        for j in 0..8u32 {
            let xy = Point2::new(f64::from(i) * 10.0 - 5.0, f64::from(j) * 10.0 + 15.0);
            if scene.building_containing(&xy).is_some() {
                continue;
            }
            receivers.push(Receiver::new(ReceiverId(u64::from(i * 8 + j)), scene.lift(&xy, 4.0)));
        }
    }

    let config = PropagationConfig {
        maximum_reflection_order: 2,
        ..PropagationConfig::default()
    };
    let sink = MemorySink::new();
    let progress = ProgressTracker::new(1);
    let mut manager = GridComputationManager::new(&scene, &config, &sources, &receivers)?;
    let report = manager.run(&SphericalSpreading::default(), &sink, &progress)?;

    println!(
        "{:?}: {} receivers computed, {} skipped, {} failed",
        report.state, report.processed, report.skipped, report.failed
    );
    let mut results = sink.receivers();
    results.sort_by_key(|r| r.receiver);
    for r in results {
        println!(
            "{:>3} ({:>5.1}, {:>5.1})  Lday {:>5.1}  Levening {:>5.1}  Lnight {:>5.1}",
            r.receiver.0,
            r.position.x,
            r.position.y,
            r.total(TimePeriod::Day),
            r.total(TimePeriod::Evening),
            r.total(TimePeriod::Night),
        );
    }
    Ok(())
}
