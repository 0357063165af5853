use glam::Vec3;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DustConfig {
    pub count: usize,
    /// Seconds between respawns around the origin.
    pub respawn_interval: f32,
    pub spawn_radius: f32,
    pub spawn_height: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Rise per step is `speed * rise_scale`.
    pub rise_scale: f32,
    /// Horizontal jitter per step is uniform in `[-jitter, jitter]`.
    pub jitter: f32,
}

impl Default for DustConfig {
    fn default() -> Self {
        Self {
            count: 80,
            respawn_interval: 0.16,
            spawn_radius: 0.2,
            spawn_height: 0.06,
            min_speed: 0.2,
            max_speed: 0.8,
            rise_scale: 0.008,
            jitter: 0.001,
        }
    }
}

/// Dust kicked up behind the lead character.
///
/// This is the only random per-frame effect; it never feeds back into poses.
#[derive(Debug)]
pub struct DustField {
    config: DustConfig,
    positions: Vec<Vec3>,
    speeds: Vec<f32>,
    since_respawn: f32,
    rng: StdRng,
}

impl DustField {
    pub fn new(config: DustConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let speeds = (0..config.count)
            .map(|_| rng.random_range(config.min_speed..=config.max_speed))
            .collect();
        Self {
            positions: vec![Vec3::ZERO; config.count],
            speeds,
            since_respawn: 0.0,
            config,
            rng,
        }
    }

    pub fn config(&self) -> &DustConfig {
        &self.config
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    /// Scatters every particle on a disc around `origin`.
    pub fn respawn(&mut self, origin: Vec3) {
        let config = self.config;
        for position in &mut self.positions {
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let radius = self.rng.random_range(0.0..=config.spawn_radius.max(0.0));
            *position = Vec3::new(
                origin.x + angle.cos() * radius,
                origin.y + config.spawn_height,
                origin.z + angle.sin() * radius,
            );
        }
    }

    /// Moves every particle one step upwards with a little jitter.
    pub fn drift(&mut self) {
        let config = self.config;
        for (position, speed) in self.positions.iter_mut().zip(&self.speeds) {
            position.y += speed * config.rise_scale;
            if config.jitter > 0.0 {
                position.x += self.rng.random_range(-config.jitter..=config.jitter);
                position.z += self.rng.random_range(-config.jitter..=config.jitter);
            }
        }
    }

    /// Advances the field by one frame of `delta` seconds.
    ///
    /// The first update always respawns so particles start at the origin.
    pub fn update(&mut self, delta: f32, origin: Vec3, first_frame: bool) {
        self.since_respawn += delta.max(0.0);
        if first_frame || self.since_respawn >= self.config.respawn_interval {
            self.since_respawn = 0.0;
            self.respawn(origin);
        }
        self.drift();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speeds_are_within_range() {
        let field = DustField::new(DustConfig::default(), 3);
        assert_eq!(field.speeds().len(), 80);
        assert!(field.speeds().iter().all(|s| (0.2..=0.8).contains(s)));
    }

    #[test]
    fn respawn_places_particles_near_origin() {
        let mut field = DustField::new(DustConfig::default(), 11);
        let origin = Vec3::new(1.0, 0.09, -0.5);
        field.respawn(origin);
        for position in field.positions() {
            let flat = Vec3::new(position.x - origin.x, 0.0, position.z - origin.z);
            assert!(flat.length() <= 0.2 + 1e-6);
            assert!((position.y - 0.15).abs() < 1e-6);
        }
    }

    #[test]
    fn drift_rises() {
        let mut field = DustField::new(DustConfig::default(), 5);
        field.respawn(Vec3::ZERO);
        let before: Vec<f32> = field.positions().iter().map(|p| p.y).collect();
        field.drift();
        for ((after, before), speed) in field.positions().iter().zip(before).zip(field.speeds()) {
            assert!((after.y - before - speed * 0.008).abs() < 1e-6);
        }
    }

    #[test]
    fn update_respawns_on_interval() {
        let mut field = DustField::new(DustConfig::default(), 9);
        let origin = Vec3::new(2.0, 0.0, 0.0);
        field.update(0.0, origin, true);
        for _ in 0..8 {
            field.update(1.0 / 60.0, origin, false);
        }
        let highest = field.positions().iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert!(highest > 0.06);
        field.update(0.2, Vec3::new(-2.0, 0.0, 0.0), false);
        assert!(field.positions().iter().all(|p| p.x < -1.7));
    }

    #[test]
    fn same_seed_same_field() {
        let mut a = DustField::new(DustConfig::default(), 42);
        let mut b = DustField::new(DustConfig::default(), 42);
        a.update(0.0, Vec3::ONE, true);
        b.update(0.0, Vec3::ONE, true);
        assert_eq!(a.positions(), b.positions());
    }
}
