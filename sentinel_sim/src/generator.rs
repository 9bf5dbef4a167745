//! Seeded reading generators.
//!
//! Two sources feed the engine:
//! - [`ReadingGenerator`]: uniform random readings for benchmarks
//! - [`Scene`]: ground-truth objects moving at constant velocity, observed by
//!   all three modalities with Gaussian position noise

use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{StandardNormal, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sentinel_core::ScanFrame;

// ============================================================================
// UNIFORM READINGS
// ============================================================================

/// Uniform benchmark readings: positions in [-100, 100) with z scaled by 0.1,
/// signal values in [0, 1).
pub struct ReadingGenerator {
    rng: ChaCha8Rng,
    position: Uniform<f64>,
    unit: Uniform<f64>,
}

impl ReadingGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            position: Uniform::new(-100.0, 100.0),
            unit: Uniform::new(0.0, 1.0),
        }
    }

    fn xyz(&mut self) -> [f64; 3] {
        [
            self.rng.sample(self.position),
            self.rng.sample(self.position),
            self.rng.sample(self.position) * 0.1,
        ]
    }

    /// `[x, y, z, signal_strength]`
    pub fn radar(&mut self, count: usize) -> Vec<Vec<f64>> {
        (0..count)
            .map(|_| {
                let [x, y, z] = self.xyz();
                vec![x, y, z, self.rng.sample(self.unit)]
            })
            .collect()
    }

    /// `[x, y, z, temperature]`, temperature in [20, 50)
    pub fn thermal(&mut self, count: usize) -> Vec<Vec<f64>> {
        (0..count)
            .map(|_| {
                let [x, y, z] = self.xyz();
                vec![x, y, z, 20.0 + self.rng.sample(self.unit) * 30.0]
            })
            .collect()
    }

    /// `[x, y, z, brightness, contrast]`
    pub fn optical(&mut self, count: usize) -> Vec<Vec<f64>> {
        (0..count)
            .map(|_| {
                let [x, y, z] = self.xyz();
                vec![x, y, z, self.rng.sample(self.unit), self.rng.sample(self.unit)]
            })
            .collect()
    }

    /// `count` readings for every modality.
    pub fn frame(&mut self, count: usize) -> ScanFrame {
        ScanFrame {
            radar: self.radar(count),
            thermal: self.thermal(count),
            optical: self.optical(count),
        }
    }
}

// ============================================================================
// GROUND-TRUTH SCENE
// ============================================================================

/// How an object looks to each modality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signal_strength: f64,
    pub temperature: f64,
    pub brightness: f64,
    pub contrast: f64,
}

impl Default for Signature {
    /// Comfortably above every activation and validity gate.
    fn default() -> Self {
        Self {
            signal_strength: 0.8,
            temperature: 35.0,
            brightness: 0.8,
            contrast: 0.7,
        }
    }
}

/// A ground-truth object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: u64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub signature: Signature,
    pub active: bool,
}

/// Ground truth plus noisy observation.
pub struct Scene {
    rng: ChaCha8Rng,
    objects: BTreeMap<u64, SceneObject>,
    next_id: u64,
    time: f64,
    position_noise_std: f64,
}

impl Scene {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            objects: BTreeMap::new(),
            next_id: 0,
            time: 0.0,
            position_noise_std: 0.5,
        }
    }

    /// Negative or non-finite values disable noise.
    pub fn set_position_noise(&mut self, std_dev: f64) {
        self.position_noise_std = if std_dev.is_finite() { std_dev.max(0.0) } else { 0.0 };
    }

    pub fn spawn(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        signature: Signature,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            SceneObject {
                id,
                position,
                velocity,
                signature,
                active: true,
            },
        );
        id
    }

    pub fn remove(&mut self, id: u64) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.active = false;
        }
    }

    /// Constant-velocity step.
    pub fn step(&mut self, dt: f64) {
        self.time += dt;
        for object in self.objects.values_mut().filter(|o| o.active) {
            object.position += object.velocity * dt;
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn active_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|o| o.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_objects().count()
    }

    fn noisy(&mut self, position: &Vector3<f64>) -> Vector3<f64> {
        let std = self.position_noise_std;
        let mut axis = || {
            let n: f64 = self.rng.sample(StandardNormal);
            n * std
        };
        let noise = Vector3::new(axis(), axis(), axis());
        position + noise
    }

    /// One observation of every active object by every modality.
    ///
    /// Radar rows carry a trailing speed column, as a real radar would.
    pub fn observe(&mut self) -> ScanFrame {
        let truth: Vec<(Vector3<f64>, Vector3<f64>, Signature)> = self
            .active_objects()
            .map(|o| (o.position, o.velocity, o.signature))
            .collect();

        let mut frame = ScanFrame::default();
        for (position, velocity, sig) in truth {
            let p = self.noisy(&position);
            frame.radar.push(vec![p.x, p.y, p.z, sig.signal_strength, velocity.norm()]);

            let p = self.noisy(&position);
            frame.thermal.push(vec![p.x, p.y, p.z, sig.temperature]);

            let p = self.noisy(&position);
            frame.optical.push(vec![p.x, p.y, p.z, sig.brightness, sig.contrast]);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generator_is_deterministic() {
        let a = ReadingGenerator::new(42).frame(20);
        let b = ReadingGenerator::new(42).frame(20);
        let c = ReadingGenerator::new(43).frame(20);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reading_layouts() {
        let frame = ReadingGenerator::new(1).frame(5);
        assert!(frame.radar.iter().all(|r| r.len() == 4));
        assert!(frame.thermal.iter().all(|r| r.len() == 4));
        assert!(frame.optical.iter().all(|r| r.len() == 5));
        assert_eq!(frame.len(), 15);
    }

    #[test]
    fn test_scene_step_and_remove() {
        let mut scene = Scene::new(7);
        let a = scene.spawn(Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0), Signature::default());
        scene.spawn(Vector3::new(0.0, 50.0, 0.0), Vector3::zeros(), Signature::default());

        scene.step(0.5);
        let first = scene.active_objects().next().unwrap();
        assert_eq!(first.position.x, 5.0);

        scene.remove(a);
        assert_eq!(scene.active_count(), 1);
        assert_eq!(scene.observe().radar.len(), 1);
    }

    #[test]
    fn test_noiseless_observation_is_exact() {
        let mut scene = Scene::new(7);
        scene.set_position_noise(0.0);
        scene.spawn(Vector3::new(1.0, 2.0, 3.0), Vector3::new(3.0, 4.0, 0.0), Signature::default());

        let frame = scene.observe();
        assert_eq!(frame.radar[0], vec![1.0, 2.0, 3.0, 0.8, 5.0]);
        assert_eq!(frame.optical[0], vec![1.0, 2.0, 3.0, 0.8, 0.7]);
    }

    proptest! {
        #[test]
        fn prop_uniform_ranges(seed in any::<u64>()) {
            let frame = ReadingGenerator::new(seed).frame(10);
            for r in &frame.radar {
                prop_assert!(r[0] >= -100.0 && r[0] < 100.0);
                prop_assert!(r[2] >= -10.0 && r[2] < 10.0);
                prop_assert!(r[3] >= 0.0 && r[3] < 1.0);
            }
            for t in &frame.thermal {
                prop_assert!(t[3] >= 20.0 && t[3] < 50.0);
            }
        }
    }
}
