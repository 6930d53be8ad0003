use std::fmt;
use std::ops::Deref;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

// Work-group width of the neighbour kernel; every buffer length is a multiple of it
pub const TILE_WIDTH: usize = 256;

// A single particle as laid out in GPU storage buffers
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ParticleRecord {
    pub position: [f32; 4], // xyz = position, w = mass
    pub velocity: [f32; 4], // xyz = velocity, w = neighbour density
}

impl ParticleRecord {
    pub fn new(position: [f32; 3], velocity: [f32; 3], mass: f32) -> Self {
        Self {
            position: [position[0], position[1], position[2], mass],
            velocity: [velocity[0], velocity[1], velocity[2], 0.0],
        }
    }

    pub fn mass(&self) -> f32 {
        self.position[3]
    }

    pub fn density(&self) -> f32 {
        self.velocity[3]
    }

    /// Copy of this record carrying a freshly computed density.
    pub fn with_density(&self, density: f32) -> Self {
        let mut record = *self;
        record.velocity[3] = density;
        record
    }

    pub fn distance_squared(&self, other: &ParticleRecord) -> f32 {
        let dx = other.position[0] - self.position[0];
        let dy = other.position[1] - self.position[1];
        let dz = other.position[2] - self.position[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Particle records whose length is always a positive multiple of [`TILE_WIDTH`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBuffer(Vec<ParticleRecord>);

impl RecordBuffer {
    /// Drops trailing records down to the nearest lower tile multiple.
    /// Returns `None` when not even one full tile remains.
    pub fn truncated(mut records: Vec<ParticleRecord>) -> Option<Self> {
        let usable = records.len() - records.len() % TILE_WIDTH;
        if usable == 0 {
            return None;
        }
        records.truncate(usable);
        Some(Self(records))
    }

    /// Pads with `fill` up to the nearest tile multiple (at least one tile).
    pub fn padded(mut records: Vec<ParticleRecord>, fill: ParticleRecord) -> Self {
        let target = padded_len(records.len());
        records.resize(target, fill);
        Self(records)
    }

    pub fn tile_count(&self) -> usize {
        self.0.len() / TILE_WIDTH
    }
}

impl Deref for RecordBuffer {
    type Target = [ParticleRecord];

    fn deref(&self) -> &[ParticleRecord] {
        &self.0
    }
}

/// Smallest positive multiple of [`TILE_WIDTH`] that holds `count` records.
pub fn padded_len(count: usize) -> usize {
    count.max(1).div_ceil(TILE_WIDTH) * TILE_WIDTH
}

/// Identifies a dataset, usually by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
