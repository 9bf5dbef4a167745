//! Scenario runner - drives scan cycles through a detection engine.

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use sentinel_core::{
    DetectionEngine, DetectionMetrics, EngineConfig, Modality, ScanFrame, SensorAvailability,
    Target, ThreatStats,
};

use crate::error::SimError;
use crate::generator::{Scene, Signature};
use crate::scenarios::ScenarioId;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether every cycle met the scenario's expectations
    pub passed: bool,

    /// Scan cycles executed
    pub cycles: u32,

    /// Final scene time in seconds
    pub final_time_secs: f64,

    /// Tracks stored after the last cycle
    pub final_track_count: usize,

    /// Engine-wide extraction count
    pub total_detections: u64,

    pub mean_tracks_per_cycle: f64,

    /// Mean distance from each true object to its nearest track
    pub mean_position_error: f64,

    /// Threat breakdown of the final track list
    pub stats: ThreatStats,

    /// Metrics of the last scan
    pub metrics: DetectionMetrics,

    /// First failed expectation, if any
    pub failure_reason: Option<String>,
}

/// Per-cycle expectations gathered while a scenario runs.
#[derive(Default)]
struct CycleLog {
    cycles: u32,
    tracks: usize,
    error_sum: f64,
    error_samples: usize,
    failure: Option<String>,
}

impl CycleLog {
    fn fail(&mut self, cycle: u32, reason: String) {
        if self.failure.is_none() {
            warn!(cycle, "{}", reason);
            self.failure = Some(format!("cycle {cycle}: {reason}"));
        }
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    seed: u64,
    cycles: u32,
    dt: f64,
    config: EngineConfig,
}

impl ScenarioRunner {
    /// Creates a runner with 20 cycles at 10 Hz and the default engine config.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            cycles: 20,
            dt: 0.1,
            config: EngineConfig::default(),
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario against a fresh engine.
    pub fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, SimError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("{}", scenario.description());

        let engine = DetectionEngine::new(self.config.clone())?;
        // Scene noise and clutter draw from separate streams
        let mut scene = Scene::new(self.seed.wrapping_mul(0x9e3779b97f4a7c15));
        let mut clutter_rng = ChaCha8Rng::seed_from_u64(self.seed);

        let log = match scenario {
            ScenarioId::Crossing => self.run_crossing(&engine, &mut scene),
            ScenarioId::SensorOutage => self.run_sensor_outage(&engine, &mut scene),
            ScenarioId::Swarm => self.run_swarm(&engine, &mut scene, &mut clutter_rng),
        };

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: log.failure.is_none(),
            cycles: log.cycles,
            final_time_secs: scene.time(),
            final_track_count: engine.target_count(),
            total_detections: engine.total_detections(),
            mean_tracks_per_cycle: if log.cycles > 0 {
                log.tracks as f64 / log.cycles as f64
            } else {
                0.0
            },
            mean_position_error: if log.error_samples > 0 {
                log.error_sum / log.error_samples as f64
            } else {
                0.0
            },
            stats: engine.threat_stats(),
            metrics: engine.metrics(),
            failure_reason: log.failure,
        };

        info!(
            "Finished {}: {} tracks, {} detections, mean error {:.3}",
            scenario.name(),
            result.final_track_count,
            result.total_detections,
            result.mean_position_error
        );
        Ok(result)
    }

    /// Observe, scan, check, step. `prepare` runs before each observation
    /// and `augment` may add readings to the frame.
    fn drive(
        &self,
        engine: &DetectionEngine,
        scene: &mut Scene,
        mut prepare: impl FnMut(u32, &DetectionEngine),
        mut augment: impl FnMut(&mut ScanFrame),
        mut check: impl FnMut(u32, &DetectionEngine, &mut CycleLog),
    ) -> CycleLog {
        let mut log = CycleLog::default();

        for cycle in 0..self.cycles {
            prepare(cycle, engine);

            let mut frame = scene.observe();
            augment(&mut frame);
            let tracks = engine.scan(&frame, self.dt);

            let expected = scene.active_count();
            if tracks.len() != expected {
                log.fail(cycle, format!("expected {expected} tracks, got {}", tracks.len()));
            }
            check_provenance(engine, &tracks, cycle, &mut log);
            check(cycle, engine, &mut log);

            for object in scene.active_objects() {
                if let Some(error) = nearest_distance(&object.position, &tracks) {
                    log.error_sum += error;
                    log.error_samples += 1;
                }
            }

            debug!(
                cycle,
                tracks = tracks.len(),
                high_priority = tracks.iter().filter(|t| t.threat_level.is_high_priority()).count(),
                "cycle complete"
            );

            log.tracks += tracks.len();
            log.cycles += 1;
            scene.step(self.dt);
        }

        log
    }

    /// Ground tracks cross at the origin, 20 units apart in altitude.
    fn run_crossing(&self, engine: &DetectionEngine, scene: &mut Scene) -> CycleLog {
        let signature = Signature::default();
        scene.spawn(Vector3::new(-40.0, 0.0, 0.0), Vector3::new(20.0, 0.0, 0.0), signature);
        scene.spawn(Vector3::new(0.0, -40.0, 20.0), Vector3::new(0.0, 20.0, 0.0), signature);

        self.drive(engine, scene, |_, _| {}, |_| {}, |_, _, _| {})
    }

    /// Three objects; thermal drops out for the middle third of the run and
    /// optical for the final third.
    fn run_sensor_outage(&self, engine: &DetectionEngine, scene: &mut Scene) -> CycleLog {
        for i in 0..3 {
            let offset = i as f64 * 30.0;
            scene.spawn(
                Vector3::new(offset, 60.0, 10.0),
                Vector3::new(0.0, -5.0, 0.0),
                Signature::default(),
            );
        }

        let third = self.cycles / 3;
        let prepare = |cycle: u32, engine: &DetectionEngine| {
            let (thermal, optical) = if cycle < third {
                (SensorAvailability::Active, SensorAvailability::Active)
            } else if cycle < 2 * third {
                (SensorAvailability::Maintenance, SensorAvailability::Active)
            } else {
                (SensorAvailability::Active, SensorAvailability::Error)
            };
            if engine.sensor_availability(Modality::Thermal) != thermal {
                info!("cycle {}: thermal -> {:?}", cycle, thermal);
                engine.set_sensor_availability(Modality::Thermal, thermal);
            }
            if engine.sensor_availability(Modality::Optical) != optical {
                info!("cycle {}: optical -> {:?}", cycle, optical);
                engine.set_sensor_availability(Modality::Optical, optical);
            }
        };

        self.drive(engine, scene, prepare, |_| {}, |_, _, _| {})
    }

    /// 5x5 formation with clutter below every activation gate and three
    /// truncated radar rows per cycle.
    fn run_swarm(
        &self,
        engine: &DetectionEngine,
        scene: &mut Scene,
        rng: &mut ChaCha8Rng,
    ) -> CycleLog {
        for row in 0..5 {
            for col in 0..5 {
                scene.spawn(
                    Vector3::new(col as f64 * 20.0, row as f64 * 20.0, 50.0),
                    Vector3::new(5.0, 2.0, 0.0),
                    Signature::default(),
                );
            }
        }

        const CLUTTER: usize = 10;
        const TRUNCATED: usize = 3;

        let augment = |frame: &mut ScanFrame| {
            for _ in 0..CLUTTER {
                let (x, y) = (rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0));
                frame.radar.push(vec![x, y, 0.0, 0.1]);
                frame.thermal.push(vec![x, y, 0.0, 22.0]);
                frame.optical.push(vec![x, y, 0.0, 0.3, 0.3]);
            }
            for _ in 0..TRUNCATED {
                frame.radar.push(vec![rng.gen_range(-100.0..100.0), 0.0, 0.0]);
            }
        };

        let check = |cycle: u32, engine: &DetectionEngine, log: &mut CycleLog| {
            let metrics = engine.metrics();
            if metrics.missed_targets != TRUNCATED {
                let missed = metrics.missed_targets;
                log.fail(cycle, format!("expected {TRUNCATED} missed targets, got {missed}"));
            }
            if metrics.false_positives != 0 {
                let false_positives = metrics.false_positives;
                log.fail(cycle, format!("clutter produced {false_positives} false positives"));
            }
        };

        self.drive(engine, scene, |_, _| {}, augment, check)
    }
}

/// Tracks must not carry tags of sensors that are currently down.
fn check_provenance(engine: &DetectionEngine, tracks: &[Target], cycle: u32, log: &mut CycleLog) {
    for modality in Modality::SENSORS {
        if engine.sensor_availability(modality).is_active() {
            continue;
        }
        if let Some(track) = tracks.iter().find(|t| t.description.contains(modality.tag())) {
            log.fail(cycle, format!("track {} uses inactive {} sensor", track.id, modality));
        }
    }
}

fn nearest_distance(position: &Vector3<f64>, tracks: &[Target]) -> Option<f64> {
    tracks
        .iter()
        .map(|t| (t.position - position).norm())
        .min_by(|a, b| a.total_cmp(b))
}
