//! Viewer settings, read from an optional JSON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::density::KernelKind;
use crate::error::PlotError;
use crate::plot::loader::LoadOptions;
use crate::plot::procedural::{Distribution, ProceduralParams};

pub const DEFAULT_CONFIG_PATH: &str = "flythrough.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    /// Directory enumerated for `*.csv` datasets.
    pub data_dir: PathBuf,
    pub neighbour_radius: f32,
    pub density_kernel: KernelKind,
    /// Added to the z coordinate of every loaded or generated particle.
    pub z_offset: f32,
    /// Show a generated distribution instead of the data directory.
    pub distribution: Option<Distribution>,
    pub num_bodies: usize,
    pub spacing_scale: f32,
    pub default_mass: f32,
    pub seed: u64,
    pub point_size: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for PlotterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            neighbour_radius: 10.0,
            density_kernel: KernelKind::Gpu,
            z_offset: -50.0,
            distribution: None,
            num_bodies: 98_304,
            spacing_scale: 100.0,
            default_mass: 1.0,
            seed: 0,
            point_size: 0.15,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl PlotterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlotError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| PlotError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| PlotError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, PlotError> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(PlotError::Config {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PlotError> {
        let path = path.as_ref();
        let config_error = |reason: String| PlotError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| config_error(e.to_string()))?;
        fs::write(path, json).map_err(|e| config_error(e.to_string()))
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            z_offset: self.z_offset,
        }
    }

    pub fn procedural_params(&self) -> ProceduralParams {
        ProceduralParams {
            spacing_scale: self.spacing_scale,
            z_offset: self.z_offset,
            default_mass: self.default_mass,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flythrough.json");
        fs::write(
            &path,
            r#"{ "neighbour_radius": 2.5, "distribution": "two_cubes", "density_kernel": "cpu" }"#,
        )
        .unwrap();

        let config = PlotterConfig::load(&path).unwrap();
        assert_eq!(config.neighbour_radius, 2.5);
        assert_eq!(config.distribution, Some(Distribution::TwoCubes));
        assert_eq!(config.density_kernel, KernelKind::Cpu);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.z_offset, -50.0);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlotterConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PlotterConfig::default());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ neighbour_radius: ").unwrap();

        assert!(matches!(
            PlotterConfig::load_or_default(&path),
            Err(PlotError::Config { .. })
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");
        let config = PlotterConfig {
            seed: 7,
            distribution: Some(Distribution::SquareSpiral),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PlotterConfig::load(&path).unwrap(), config);
    }
}
