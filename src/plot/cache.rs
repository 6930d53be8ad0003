use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use crate::error::PlotError;
use crate::plot::types::{DatasetId, RecordBuffer};

/// Session-lifetime store of every dataset materialized so far.
///
/// Entries are never evicted or replaced, so a dataset is parsed at most once
/// per session. Buffers are handed out as shared `Arc`s; callers copy them into
/// their own storage before writing densities.
#[derive(Debug, Default)]
pub struct PlotCache {
    plots: HashMap<DatasetId, Arc<RecordBuffer>>,
}

impl PlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&mut self, id: &DatasetId, load: F) -> Result<Arc<RecordBuffer>, PlotError>
    where
        F: FnOnce(&DatasetId) -> Result<RecordBuffer, PlotError>,
    {
        if let Some(plot) = self.plots.get(id) {
            info!("Loading plot {id} from cache ({} particles)", plot.len());
            return Ok(Arc::clone(plot));
        }

        let plot = Arc::new(load(id)?);
        info!("Storing plot {id} ({} plots cached)", self.plots.len() + 1);
        self.plots.insert(id.clone(), Arc::clone(&plot));
        Ok(plot)
    }

    pub fn get(&self, id: &DatasetId) -> Option<&Arc<RecordBuffer>> {
        self.plots.get(id)
    }

    pub fn contains(&self, id: &DatasetId) -> bool {
        self.plots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::types::{ParticleRecord, TILE_WIDTH};
    use std::cell::Cell;

    fn one_tile(x: f32) -> RecordBuffer {
        let records = vec![ParticleRecord::new([x, 0.0, 0.0], [0.0; 3], 1.0); TILE_WIDTH];
        RecordBuffer::truncated(records).unwrap()
    }

    #[test]
    fn loader_runs_once_per_identifier() {
        let mut cache = PlotCache::new();
        let id = DatasetId::new("a.csv");
        let calls = Cell::new(0);

        let first = cache
            .get_or_load(&id, |_| {
                calls.set(calls.get() + 1);
                Ok(one_tile(1.0))
            })
            .unwrap();
        for _ in 0..5 {
            let again = cache
                .get_or_load(&id, |_| {
                    calls.set(calls.get() + 1);
                    Ok(one_tile(2.0))
                })
                .unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first[0].position[0], 1.0);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache = PlotCache::new();
        let id = DatasetId::new("broken.csv");

        let result = cache.get_or_load(&id, |id| {
            Err(PlotError::EmptyDataset {
                dataset: id.to_string(),
                rows: 0,
            })
        });
        assert!(result.is_err());
        assert!(!cache.contains(&id));

        cache.get_or_load(&id, |_| Ok(one_tile(0.0))).unwrap();
        assert!(cache.contains(&id));
    }

    #[test]
    fn distinct_identifiers_get_distinct_entries() {
        let mut cache = PlotCache::new();
        let a = cache.get_or_load(&DatasetId::new("a"), |_| Ok(one_tile(1.0))).unwrap();
        let b = cache.get_or_load(&DatasetId::new("b"), |_| Ok(one_tile(2.0))).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }
}
