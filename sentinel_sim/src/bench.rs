//! Wall-clock benchmark mode for the CLI.
//!
//! Mirrors the criterion bench in `sentinel_core` but runs as a plain
//! command so timings can be collected without a bench harness.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

use sentinel_core::{DetectionEngine, EngineConfig};

use crate::error::SimError;
use crate::generator::ReadingGenerator;

/// Readings per modality for the stage timings.
pub const WORKLOADS: [usize; 3] = [50, 100, 500];

/// Readings per modality for the full-scan sweep.
pub const SCALABILITY: [usize; 5] = [10, 50, 100, 500, 1000];

/// Timed repetitions per measurement.
const ITERATIONS: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub readings: usize,
    pub radar_us: f64,
    pub thermal_us: f64,
    pub optical_us: f64,
    pub fusion_us: f64,
    pub fused_tracks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanTiming {
    pub readings: usize,
    pub scan_us: f64,
    pub throughput_per_sec: f64,
    pub tracks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub seed: u64,
    pub workers: usize,
    pub stages: Vec<StageTiming>,
    pub scalability: Vec<ScanTiming>,
}

fn mean_micros<T>(mut f: impl FnMut() -> T) -> (f64, T) {
    let mut total = Duration::ZERO;
    let mut last = f();
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        last = f();
        total += start.elapsed();
    }
    (total.as_secs_f64() * 1e6 / ITERATIONS as f64, last)
}

/// Time extraction and fusion per workload, then full scans per sweep size.
pub fn run_benchmark(seed: u64, config: EngineConfig) -> Result<BenchReport, SimError> {
    let engine = DetectionEngine::new(config)?;
    let mut generator = ReadingGenerator::new(seed);

    let mut stages = Vec::with_capacity(WORKLOADS.len());
    for n in WORKLOADS {
        let frame = generator.frame(n);
        let (radar_us, radar) = mean_micros(|| engine.detect_radar(&frame.radar));
        let (thermal_us, thermal) = mean_micros(|| engine.detect_thermal(&frame.thermal));
        let (optical_us, optical) = mean_micros(|| engine.detect_optical(&frame.optical));
        let (fusion_us, fused) = mean_micros(|| engine.fuse(&radar, &thermal, &optical));

        info!(
            "workload {:>4}: radar {:.1}us, thermal {:.1}us, optical {:.1}us, \
             fusion {:.1}us -> {} tracks",
            n,
            radar_us,
            thermal_us,
            optical_us,
            fusion_us,
            fused.len()
        );
        stages.push(StageTiming {
            readings: n,
            radar_us,
            thermal_us,
            optical_us,
            fusion_us,
            fused_tracks: fused.len(),
        });
    }

    let mut scalability = Vec::with_capacity(SCALABILITY.len());
    for n in SCALABILITY {
        let frame = generator.frame(n);
        let (scan_us, tracks) = mean_micros(|| engine.scan(&frame, 0.1));
        let throughput_per_sec = if scan_us > 0.0 {
            frame.len() as f64 / (scan_us / 1e6)
        } else {
            0.0
        };

        info!(
            "scan {:>4}/modality: {:.1}us ({:.0} readings/s) -> {} tracks",
            n,
            scan_us,
            throughput_per_sec,
            tracks.len()
        );
        scalability.push(ScanTiming {
            readings: n,
            scan_us,
            throughput_per_sec,
            tracks: tracks.len(),
        });
    }

    Ok(BenchReport {
        seed,
        workers: engine.worker_threads(),
        stages,
        scalability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_report_shape() {
        let report = run_benchmark(
            42,
            EngineConfig {
                worker_threads: 2,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.stages.len(), WORKLOADS.len());
        assert_eq!(report.scalability.len(), SCALABILITY.len());
        assert_eq!(report.workers, 2);
        for stage in &report.stages {
            assert!(stage.fused_tracks > 0);
        }
    }
}
