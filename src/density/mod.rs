//! Neighbour-density pass: for every particle, the number of other particles
//! within the current radius, plus the range of those counts for colouring.

pub mod cpu;
pub mod gpu;

use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PlotError;
use crate::plot::types::{ParticleRecord, TILE_WIDTH};
use crate::presentation::PresentationSurface;

pub use cpu::CpuDensityKernel;
pub use gpu::GpuDensityKernel;

pub const MIN_RADIUS: f32 = 0.01;
pub const MAX_RADIUS: f32 = 100.0;

/// Which parallel unit runs the neighbour count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    #[default]
    Gpu,
    Cpu,
}

/// A parallel unit that counts neighbours.
///
/// Implementations read every record of `read` and write `write[i]` as a copy
/// of `read[i]` whose density is the number of *other* particles at Euclidean
/// distance `<= radius`. Both slices have the same length, a positive multiple
/// of [`TILE_WIDTH`].
pub trait DensityKernel {
    fn count_neighbours(
        &mut self,
        read: &[ParticleRecord],
        write: &mut [ParticleRecord],
        radius: f32,
    ) -> Result<(), PlotError>;
}

impl<K: DensityKernel + ?Sized> DensityKernel for Box<K> {
    fn count_neighbours(
        &mut self,
        read: &[ParticleRecord],
        write: &mut [ParticleRecord],
        radius: f32,
    ) -> Result<(), PlotError> {
        (**self).count_neighbours(read, write, radius)
    }
}

/// Lowest and highest density of one computed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DensityRange {
    pub min: f32,
    pub max: f32,
}

impl DensityRange {
    /// Single reduction over every record's density.
    pub fn from_records(records: &[ParticleRecord]) -> Self {
        let (min, max) = records
            .par_iter()
            .map(|record| (record.density(), record.density()))
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        if records.is_empty() {
            return Self::default();
        }

        // A minimum equal to the particle count would leave no width to scale by
        let min = if min == records.len() as f32 { min - 1.0 } else { min };
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Maps a density onto `[0, 1]`; a zero-width range maps everything to 0.
    pub fn normalize(&self, density: f32) -> f32 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        ((density - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Owns the neighbour radius and runs density passes through a kernel.
pub struct DensityEngine<K> {
    kernel: K,
    radius: f32,
}

impl<K: DensityKernel> DensityEngine<K> {
    pub fn new(kernel: K, radius: f32) -> Self {
        Self {
            kernel,
            radius: radius.clamp(MIN_RADIUS, MAX_RADIUS),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Doubles the radius up to [`MAX_RADIUS`]. Returns whether it changed.
    pub fn double_radius(&mut self) -> bool {
        if self.radius < MAX_RADIUS {
            self.radius = (self.radius * 2.0).min(MAX_RADIUS);
            true
        } else {
            false
        }
    }

    /// Halves the radius down to [`MIN_RADIUS`]. Returns whether it changed.
    pub fn halve_radius(&mut self) -> bool {
        if self.radius > MIN_RADIUS {
            self.radius = (self.radius / 2.0).max(MIN_RADIUS);
            true
        } else {
            false
        }
    }

    /// Writes densities for `read` into `write` and returns their range.
    pub fn compute_density(
        &mut self,
        read: &[ParticleRecord],
        write: &mut [ParticleRecord],
    ) -> Result<DensityRange, PlotError> {
        if read.is_empty() || read.len() % TILE_WIDTH != 0 {
            return Err(PlotError::Misaligned { len: read.len() });
        }
        if write.len() != read.len() {
            return Err(PlotError::Misaligned { len: write.len() });
        }

        let started = Instant::now();
        self.kernel.count_neighbours(read, write, self.radius)?;
        let range = DensityRange::from_records(write);
        debug!(
            "Density pass over {} particles took {:?}",
            read.len(),
            started.elapsed()
        );

        Ok(range)
    }

    /// Computes from the surface's current slot into its next slot, then swaps.
    pub fn refresh(&mut self, surface: &mut PresentationSurface) -> Result<DensityRange, PlotError> {
        let radius = self.radius;
        let range =
            surface.publish_with(|current, next| self.compute_density(current.records, next))?;
        info!(
            "Radius {radius}: neighbours range between {} and {}",
            range.min, range.max
        );
        Ok(range)
    }
}
