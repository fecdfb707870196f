use crate::workflow::config::ScenarioConfig;
use potholecore::records::{GeoPosition, LiveDetector, PointRecord};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

/// Outcome of one survey tick.
#[derive(Debug, Clone)]
pub struct SurveyStep {
    pub detector: LiveDetector,
    pub pothole: Option<PointRecord>,
}

/// Seeded synthetic survey: a detector wandering around the scenario center
/// and occasionally reporting a pothole where it stands.
pub struct Survey {
    rng: StdRng,
    center: GeoPosition,
    spread_deg: f64,
    speed_deg: f64,
    pothole_probability: f64,
    initial_potholes: usize,
    heading: f64,
    detector: LiveDetector,
}

impl Survey {
    pub fn new(config: &ScenarioConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let heading = rng.gen_range(0.0..(2.0 * PI));
        let id = object_id(&mut rng);
        let mut detector = LiveDetector::new(id, config.center);
        detector.name = config.detector_name.clone();
        Self {
            rng,
            center: config.center,
            spread_deg: config.spread_deg.abs().max(0.01),
            speed_deg: config.detector_speed_deg.abs(),
            pothole_probability: config.pothole_probability.clamp(0.0, 1.0),
            initial_potholes: config.initial_potholes,
            heading,
            detector,
        }
    }

    pub fn detector(&self) -> &LiveDetector {
        &self.detector
    }

    /// Potholes already known when the feed starts.
    pub fn initial_potholes(&mut self) -> Vec<PointRecord> {
        (0..self.initial_potholes)
            .map(|_| {
                let latitude = self.center.latitude
                    + self.rng.gen_range(-self.spread_deg..self.spread_deg);
                let longitude = self.center.longitude
                    + self.rng.gen_range(-self.spread_deg..self.spread_deg);
                let id = object_id(&mut self.rng);
                PointRecord::new(id, clamp_latitude(latitude), wrap_longitude(longitude))
            })
            .collect()
    }

    pub fn step(&mut self) -> SurveyStep {
        self.heading += self.rng.gen_range(-0.35..0.35);
        let current = self.detector.current_position;
        let mut next = GeoPosition::new(
            current.latitude + self.speed_deg * self.heading.sin(),
            current.longitude + self.speed_deg * self.heading.cos(),
        );

        let off_lat = (next.latitude - self.center.latitude).abs() > self.spread_deg;
        let off_lon = (next.longitude - self.center.longitude).abs() > self.spread_deg;
        if off_lat || off_lon {
            self.heading += PI;
            next = current;
        }
        next.latitude = clamp_latitude(next.latitude);
        next.longitude = wrap_longitude(next.longitude);
        self.detector.current_position = next;

        let pothole = if self.rng.gen_bool(self.pothole_probability) {
            let id = object_id(&mut self.rng);
            Some(PointRecord::new(id, next.latitude, next.longitude))
        } else {
            None
        };

        SurveyStep {
            detector: self.detector.clone(),
            pothole,
        }
    }
}

/// 24 hex characters, the shape of the ids the endpoint serves.
fn object_id(rng: &mut StdRng) -> String {
    format!("{:08x}{:016x}", rng.gen::<u32>(), rng.gen::<u64>())
}

fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(-85.0, 85.0)
}

fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> ScenarioConfig {
        ScenarioConfig {
            seed,
            initial_potholes: 5,
            pothole_probability: 0.5,
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn initial_potholes_are_valid_and_unique() {
        let mut survey = Survey::new(&config(7));
        let potholes = survey.initial_potholes();
        assert_eq!(potholes.len(), 5);
        for pothole in &potholes {
            pothole.position().validate().unwrap();
            assert_eq!(pothole.id.len(), 24);
        }
        let mut ids: Vec<_> = potholes.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn same_seed_replays_the_same_track() {
        let mut a = Survey::new(&config(42));
        let mut b = Survey::new(&config(42));
        for _ in 0..20 {
            let (sa, sb) = (a.step(), b.step());
            assert_eq!(sa.detector, sb.detector);
            assert_eq!(sa.pothole, sb.pothole);
        }
    }

    #[test]
    fn detector_stays_within_spread() {
        let cfg = ScenarioConfig {
            spread_deg: 1.0,
            detector_speed_deg: 0.4,
            ..config(3)
        };
        let mut survey = Survey::new(&cfg);
        for _ in 0..200 {
            let step = survey.step();
            let pos = step.detector.current_position;
            assert!((pos.latitude - cfg.center.latitude).abs() <= 1.0 + 1e-9);
            assert!((pos.longitude - cfg.center.longitude).abs() <= 1.0 + 1e-9);
            if let Some(pothole) = step.pothole {
                assert_eq!(pothole.position(), pos);
            }
        }
    }

    #[test]
    fn longitude_wraps_across_antimeridian() {
        assert!((wrap_longitude(181.0) + 179.0).abs() < 1e-9);
        assert!((wrap_longitude(-181.0) - 179.0).abs() < 1e-9);
    }
}
