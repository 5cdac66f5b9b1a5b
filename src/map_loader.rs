use crate::data::{MapRecord, TrackMap};
use crate::error::{Result, SimError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct MapLoader;

impl MapLoader {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<TrackMap> {
        let content = fs::read_to_string(path)?;
        Self::load_from_string(&content)
    }

    /// Parse a map record (JSON or YAML) and validate it
    pub fn load_from_string(content: &str) -> Result<TrackMap> {
        let record = Self::parse_record(content)?;
        TrackMap::try_from(record)
    }

    pub fn parse_record(content: &str) -> Result<MapRecord> {
        if content.trim_start().starts_with('{') {
            serde_json::from_str(content)
                .map_err(|e| SimError::Parse(format!("JSON parse error: {}", e)))
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| SimError::Parse(format!("YAML parse error: {}", e)))
        }
    }

    /// Map files (`.json`, `.yaml`, `.yml`) in a directory, sorted by name
    pub fn list_maps<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut maps = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_map = matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("json") | Some("yaml") | Some("yml")
            );
            if is_map {
                maps.push(path);
            }
        }
        maps.sort();
        Ok(maps)
    }
}
