//! Sentinel Simulator - seeded scenarios and benchmarks for `sentinel_core`
//!
//! Every source of randomness derives from a single 64-bit seed, so a
//! scenario run is reproducible end to end:
//! - **Scene**: ground-truth objects observed by radar, thermal and optical
//!   with Gaussian position noise
//! - **Runner**: drives scan cycles through a `DetectionEngine` and checks
//!   per-cycle expectations
//! - **Bench**: uniform-reading workloads timed per pipeline stage
//!
//! # Usage
//!
//! ```ignore
//! use sentinel_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_cycles(50).run(ScenarioId::Swarm)?;
//! assert!(result.passed);
//! ```

pub mod bench;
mod error;
mod generator;
mod runner;
pub mod scenarios;

pub use bench::{run_benchmark, BenchReport};
pub use error::SimError;
pub use generator::{ReadingGenerator, Scene, SceneObject, Signature};
pub use runner::{ScenarioResult, ScenarioRunner};
