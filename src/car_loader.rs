use crate::data::{CarId, CarStats};
use crate::error::{Result, SimError};
use serde::Deserialize;
use std::path::Path;

/// Highest value of the 1-10 stat scale
const STAT_SCALE_MAX: f32 = 10.0;

#[derive(Debug, Deserialize)]
struct CarToml {
    id: CarId,
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stats: Option<StatsToml>,
}

#[derive(Debug, Deserialize, Default)]
struct StatsToml {
    /// km/h
    #[serde(default)]
    max_speed: Option<f32>,
    #[serde(default)]
    acceleration: Option<f32>,
    #[serde(default)]
    handling: Option<f32>,
    #[serde(default)]
    durability: Option<f32>,
}

pub struct CarLoader;

impl CarLoader {
    pub fn load_from_file(path: &Path) -> Result<CarStats> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_string(&content)
    }

    pub fn load_from_string(content: &str) -> Result<CarStats> {
        let car: CarToml = toml::from_str(content)
            .map_err(|e| SimError::Parse(format!("TOML parse error: {}", e)))?;

        if car.name.trim().is_empty() {
            return Err(SimError::InvalidCar(format!("car {} has no name", car.id)));
        }

        let defaults = CarStats::default();
        let stats = car.stats.unwrap_or_default();

        let max_speed = stats.max_speed.unwrap_or(defaults.max_speed);
        if !max_speed.is_finite() || max_speed <= 0.0 {
            return Err(SimError::InvalidCar(format!(
                "car {} max_speed must be positive, got {}",
                car.id, max_speed
            )));
        }

        Ok(CarStats {
            id: car.id,
            name: car.name,
            model_path: car.model,
            max_speed,
            acceleration: Self::scale_stat(car.id, "acceleration", stats.acceleration, defaults.acceleration)?,
            handling: Self::scale_stat(car.id, "handling", stats.handling, defaults.handling)?,
            durability: Self::scale_stat(car.id, "durability", stats.durability, defaults.durability)?,
        })
    }

    fn scale_stat(id: CarId, name: &str, value: Option<f32>, default: f32) -> Result<f32> {
        let value = value.unwrap_or(default);
        if !(0.0..=STAT_SCALE_MAX).contains(&value) {
            return Err(SimError::InvalidCar(format!(
                "car {} {} must be within 0-{}, got {}",
                id, name, STAT_SCALE_MAX, value
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_car() {
        let toml = r#"
id = 12
name = "GT3 RS"
model = "/models/porsche_gt3_rs.glb"

[stats]
max_speed = 296.0
acceleration = 8.0
handling = 9.0
durability = 4.0
"#;
        let car = CarLoader::load_from_string(toml).unwrap();
        assert_eq!(car.id, 12);
        assert_eq!(car.model_path.as_deref(), Some("/models/porsche_gt3_rs.glb"));
        assert_eq!(car.max_speed, 296.0);
        assert_eq!(car.handling, 9.0);
    }

    #[test]
    fn test_missing_stats_use_defaults() {
        let car = CarLoader::load_from_string("id = 1\nname = \"Hatch\"\n").unwrap();
        let defaults = CarStats::default();
        assert_eq!(car.max_speed, defaults.max_speed);
        assert_eq!(car.acceleration, defaults.acceleration);
        assert!(car.model_path.is_none());
    }

    #[test]
    fn test_out_of_range_stat() {
        let toml = "id = 1\nname = \"Rocket\"\n[stats]\nacceleration = 14.0\n";
        assert!(matches!(CarLoader::load_from_string(toml), Err(SimError::InvalidCar(_))));

        let toml = "id = 1\nname = \"Rocket\"\n[stats]\nmax_speed = -5.0\n";
        assert!(matches!(CarLoader::load_from_string(toml), Err(SimError::InvalidCar(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(CarLoader::load_from_string("id = 1\nname = \"  \"\n").is_err());
    }
}
