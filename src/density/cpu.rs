use rayon::prelude::*;

use crate::density::DensityKernel;
use crate::error::PlotError;
use crate::plot::types::{ParticleRecord, TILE_WIDTH};

/// Brute-force all-pairs neighbour count, one rayon task per tile.
///
/// Each task owns a disjoint tile of the output and only reads the shared
/// input, so no synchronization is needed inside the pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuDensityKernel;

impl DensityKernel for CpuDensityKernel {
    fn count_neighbours(
        &mut self,
        read: &[ParticleRecord],
        write: &mut [ParticleRecord],
        radius: f32,
    ) -> Result<(), PlotError> {
        if read.len() != write.len() || read.len() % TILE_WIDTH != 0 {
            return Err(PlotError::Misaligned { len: write.len() });
        }
        let radius_sq = radius * radius;

        write
            .par_chunks_mut(TILE_WIDTH)
            .enumerate()
            .for_each(|(tile, out)| {
                for (offset, record) in out.iter_mut().enumerate() {
                    let index = tile * TILE_WIDTH + offset;
                    let me = &read[index];
                    let neighbours = read
                        .iter()
                        .enumerate()
                        .filter(|&(other, particle)| {
                            other != index && me.distance_squared(particle) <= radius_sq
                        })
                        .count();
                    *record = me.with_density(neighbours as f32);
                }
            });

        Ok(())
    }
}
