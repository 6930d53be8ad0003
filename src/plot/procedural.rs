use bytemuck::Zeroable;
use glam::Vec3;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::PlotError;
use crate::plot::loader::DatasetSource;
use crate::plot::types::{DatasetId, ParticleRecord, RecordBuffer, padded_len};

/// Debug distributions that do not come from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    Cube,
    TwoCubes,
    Square,
    SquareSpiral,
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Cube => "cube",
            Distribution::TwoCubes => "two-cubes",
            Distribution::Square => "square",
            Distribution::SquareSpiral => "square-spiral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProceduralParams {
    pub spacing_scale: f32, // lattice spacing in units of 0.001
    pub z_offset: f32,
    pub default_mass: f32,
    pub seed: u64,
}

impl Default for ProceduralParams {
    fn default() -> Self {
        Self {
            spacing_scale: 100.0,
            z_offset: -50.0,
            default_mass: 1.0,
            seed: 0,
        }
    }
}

/// Builds `count` particles, rounded up to a whole number of tiles.
///
/// Unlike file datasets, which drop their excess rows, generated
/// distributions always grow to the next tile multiple.
pub fn generate(distribution: Distribution, count: usize, params: &ProceduralParams) -> RecordBuffer {
    let num_bodies = padded_len(count);
    if num_bodies != count {
        info!("numBodies must be a multiple of 256, changing {count} to {num_bodies}");
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let records = match distribution {
        Distribution::Cube => cube(num_bodies, params, &mut rng),
        Distribution::TwoCubes => two_cubes(num_bodies, params, &mut rng),
        Distribution::Square => square(num_bodies, params),
        Distribution::SquareSpiral => square_spiral(num_bodies, params),
    };

    RecordBuffer::padded(records, ParticleRecord::zeroed())
}

/// Serves a single generated distribution through the dataset pipeline.
#[derive(Debug, Clone)]
pub struct ProceduralSource {
    pub distribution: Distribution,
    pub count: usize,
    pub params: ProceduralParams,
}

impl ProceduralSource {
    pub fn dataset_id(&self) -> DatasetId {
        DatasetId::new(self.distribution.name())
    }
}

impl DatasetSource for ProceduralSource {
    fn load(&self, _id: &DatasetId) -> Result<RecordBuffer, PlotError> {
        Ok(generate(self.distribution, self.count, &self.params))
    }
}

fn spacing(params: &ProceduralParams) -> f32 {
    0.001 * params.spacing_scale
}

// Lattice coordinate for 1-based index `i` on an `n`-wide grid
fn lattice(i: usize, n: usize, spacing: f32) -> f32 {
    (2.0 * i as f32 - n as f32) * spacing
}

fn integer_root(count: usize, root: f64) -> usize {
    // Nudge so exact powers (e.g. 64^3) survive floating error
    ((count as f64).powf(1.0 / root) + 1e-9).floor() as usize
}

fn random_in_cube(rng: &mut StdRng, half_side: f32) -> Vec3 {
    if half_side <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.gen_range(-half_side..half_side),
        rng.gen_range(-half_side..half_side),
        rng.gen_range(-half_side..half_side),
    )
}

fn cube(num_bodies: usize, params: &ProceduralParams, rng: &mut StdRng) -> Vec<ParticleRecord> {
    let side_count = integer_root(num_bodies, 3.0);
    let spacing = spacing(params);
    let side_length = side_count as f32 * spacing;
    let mut records = vec![ParticleRecord::zeroed(); num_bodies];

    for i in 1..=side_count {
        for j in 1..=side_count {
            for k in 1..=side_count {
                let index = (i - 1) * side_count * side_count + (j - 1) * side_count + (k - 1);
                let pos = Vec3::new(
                    lattice(i, side_count, spacing),
                    lattice(j, side_count, spacing),
                    lattice(k, side_count, spacing),
                );
                // Tangential swirl around the z axis
                let vel = pos.cross(Vec3::Z);
                records[index] = ParticleRecord::new(
                    [pos.x, pos.y, pos.z + params.z_offset],
                    vel.to_array(),
                    params.default_mass,
                );
            }
        }
    }

    // Whatever the lattice could not hold is scattered randomly inside it
    for record in records.iter_mut().skip(side_count.pow(3)) {
        let pos = random_in_cube(rng, side_length);
        *record = ParticleRecord::new(
            [pos.x, pos.y, pos.z + params.z_offset],
            [0.0; 3],
            params.default_mass,
        );
    }

    records
}

fn two_cubes(num_bodies: usize, params: &ProceduralParams, rng: &mut StdRng) -> Vec<ParticleRecord> {
    let half = num_bodies / 2;
    let side_count = integer_root(half, 3.0);
    let spacing = spacing(params);
    let side_length = side_count as f32 * spacing;
    let separation = 5.0 * side_length;
    let mut records = vec![ParticleRecord::zeroed(); num_bodies];

    for (cube_index, x_offset) in [separation / 2.0, -separation / 2.0].into_iter().enumerate() {
        let base = cube_index * half;

        for i in 1..=side_count {
            for j in 1..=side_count {
                for k in 1..=side_count {
                    let index =
                        base + (i - 1) * side_count * side_count + (j - 1) * side_count + (k - 1);
                    let pos = Vec3::new(
                        lattice(i, side_count, spacing) + x_offset,
                        lattice(j, side_count, spacing),
                        lattice(k, side_count, spacing) + params.z_offset,
                    );
                    // Squared swirl, sign preserved per component
                    let swirl = pos.cross(Vec3::Z);
                    let vel = swirl * swirl.abs();
                    records[index] =
                        ParticleRecord::new(pos.to_array(), vel.to_array(), params.default_mass);
                }
            }
        }

        for record in records[base..base + half].iter_mut().skip(side_count.pow(3)) {
            let pos = random_in_cube(rng, side_length);
            *record = ParticleRecord::new(
                [pos.x + x_offset, pos.y, pos.z + params.z_offset],
                [0.0; 3],
                params.default_mass,
            );
        }
    }

    records
}

fn square(num_bodies: usize, params: &ProceduralParams) -> Vec<ParticleRecord> {
    let side_count = integer_root(num_bodies, 2.0);
    let spacing = spacing(params);
    let mut records = vec![ParticleRecord::zeroed(); num_bodies];

    for i in 1..=side_count {
        for j in 1..=side_count {
            let index = (i - 1) * side_count + (j - 1);
            // Even rows and columns are mirrored through the origin
            let x_sign = if i % 2 == 0 { -1.0 } else { 1.0 };
            let y_sign = if j % 2 == 0 { -1.0 } else { 1.0 };
            records[index] = ParticleRecord::new(
                [
                    x_sign * lattice(i, side_count, spacing),
                    y_sign * lattice(j, side_count, spacing),
                    params.z_offset,
                ],
                [0.0; 3],
                params.default_mass,
            );
        }
    }

    records
}

fn square_spiral(num_bodies: usize, params: &ProceduralParams) -> Vec<ParticleRecord> {
    let side_count = integer_root(num_bodies, 2.0);
    let spacing = spacing(params);
    let mut records = vec![ParticleRecord::zeroed(); num_bodies];

    // Walk the grid ring by ring from the outside in; buffer order follows the walk
    for (index, (i, j)) in spiral_walk(side_count).into_iter().enumerate() {
        records[index] = ParticleRecord::new(
            [
                lattice(i, side_count, spacing),
                lattice(j, side_count, spacing),
                params.z_offset,
            ],
            [0.0; 3],
            params.default_mass,
        );
    }

    records
}

// 1-based (i, j) cells of an n x n grid in clockwise spiral order
fn spiral_walk(n: usize) -> Vec<(usize, usize)> {
    let mut cells = Vec::with_capacity(n * n);
    if n == 0 {
        return cells;
    }
    let (mut top, mut left) = (1, 1);
    let (mut bottom, mut right) = (n, n);

    while top <= bottom && left <= right {
        cells.extend((left..=right).map(|j| (top, j)));
        cells.extend((top + 1..=bottom).map(|i| (i, right)));
        if top < bottom {
            cells.extend((left..right).rev().map(|j| (bottom, j)));
        }
        if left < right {
            cells.extend((top + 1..bottom).rev().map(|i| (i, left)));
        }
        top += 1;
        left += 1;
        bottom -= 1;
        right -= 1;
    }

    cells
}
