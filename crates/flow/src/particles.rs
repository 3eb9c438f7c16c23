use foundation::{LngLat, LngLatBounds};
use rand::Rng;
use rand::rngs::SmallRng;

/// A screen-space tracer advected by the flow field.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Particle {
    pub lon: f64,
    pub lat: f64,
    pub age: u32,
}

impl Particle {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.lon, self.lat)
    }
}

/// Fixed-size particle pool. A particle whose age exceeds `max_age` is
/// respawned at a uniformly random spot inside the bounds current at that time.
#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    max_age: u32,
    rng: SmallRng,
}

impl ParticleField {
    pub fn new(count: usize, max_age: u32, bounds: LngLatBounds, mut rng: SmallRng) -> Self {
        let particles = (0..count).map(|_| spawn(&mut rng, bounds)).collect();
        Self {
            particles,
            max_age,
            rng,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    /// Moves every particle `step_deg` along `heading_rad` and ages it.
    /// Returns how many particles were respawned.
    pub fn advance(&mut self, heading_rad: f64, step_deg: f64, bounds: LngLatBounds) -> usize {
        let mut respawned = 0;
        for p in &mut self.particles {
            let next = p.position().advanced(heading_rad, step_deg);
            p.lon = next.lon;
            p.lat = next.lat;
            p.age += 1;
            if p.age > self.max_age {
                *p = spawn(&mut self.rng, bounds);
                respawned += 1;
            }
        }
        respawned
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

fn spawn(rng: &mut SmallRng, bounds: LngLatBounds) -> Particle {
    let p = bounds.lerp(rng.r#gen::<f64>(), rng.r#gen::<f64>());
    Particle {
        lon: p.lon,
        lat: p.lat,
        age: 0,
    }
}
