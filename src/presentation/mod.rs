//! Front/back storage so a frame can be drawn from one copy of the particles
//! while the next density pass writes the other.

use crate::density::DensityRange;
use crate::error::PlotError;
use crate::plot::types::ParticleRecord;

/// Two slots, one "current" (read by presentation) and one "next" (written by
/// compute). `swap` is the only way their roles change.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(current: T, next: T) -> Self {
        Self {
            slots: [current, next],
            current: 0,
        }
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn next(&self) -> &T {
        &self.slots[1 - self.current]
    }

    pub fn next_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Borrows the current slot for reading and the next slot for writing at
    /// the same time. Holding either borrow rules out a `swap`.
    pub fn split(&mut self) -> (&T, &mut T) {
        let (first, second) = self.slots.split_at_mut(1);
        if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

/// One copy of the particle data with the density range computed for it.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub records: Vec<ParticleRecord>,
    pub range: DensityRange,
}

/// What the render host draws: the current slot at one point in time.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub records: &'a [ParticleRecord],
    pub range: DensityRange,
    /// Bumped on every acquire and swap, so hosts can skip re-uploads.
    pub generation: u64,
}

/// Double-buffered particle storage for the active dataset.
///
/// Slots exist only between [`acquire`](Self::acquire) and
/// [`release`](Self::release) (or drop).
#[derive(Debug, Default)]
pub struct PresentationSurface {
    slots: Option<DoubleBuffer<Slot>>,
    generation: u64,
}

impl PresentationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills both slots with a private copy of `records`, replacing any
    /// previous contents.
    pub fn acquire(&mut self, records: &[ParticleRecord]) {
        let slot = Slot {
            records: records.to_vec(),
            range: DensityRange::default(),
        };
        self.slots = Some(DoubleBuffer::new(slot.clone(), slot));
        self.generation += 1;
    }

    pub fn release(&mut self) {
        self.slots = None;
    }

    pub fn is_active(&self) -> bool {
        self.slots.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The most recently swapped-in slot.
    pub fn render(&self) -> Result<Frame<'_>, PlotError> {
        let slots = self
            .slots
            .as_ref()
            .ok_or(PlotError::Precondition("render called without acquired slots"))?;
        let current = slots.current();
        Ok(Frame {
            records: &current.records,
            range: current.range,
            generation: self.generation,
        })
    }

    /// Runs `compute` with the current frame and the next slot's records,
    /// stores the returned range with them and swaps. Nothing is swapped if
    /// `compute` fails.
    pub fn publish_with<F>(&mut self, compute: F) -> Result<DensityRange, PlotError>
    where
        F: FnOnce(Frame<'_>, &mut [ParticleRecord]) -> Result<DensityRange, PlotError>,
    {
        let generation = self.generation;
        let slots = self
            .slots
            .as_mut()
            .ok_or(PlotError::Precondition("compute called without acquired slots"))?;

        let (current, next) = slots.split();
        let frame = Frame {
            records: &current.records,
            range: current.range,
            generation,
        };
        let range = compute(frame, &mut next.records)?;
        next.range = range;

        slots.swap();
        self.generation += 1;
        Ok(range)
    }
}
