use std::fs;
use std::path::Path;

use crate::error::PlotError;
use crate::plot::types::DatasetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Next,
    Previous,
}

/// Ordered, fixed list of datasets with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    datasets: Vec<DatasetId>,
    current_index: usize,
}

impl DatasetCatalog {
    pub fn new(datasets: Vec<DatasetId>) -> Option<Self> {
        if datasets.is_empty() {
            return None;
        }
        Some(Self {
            datasets,
            current_index: 0,
        })
    }

    /// Every `*.csv` file in `dir`, ordered by file name.
    pub fn scan(dir: &Path) -> Result<Self, PlotError> {
        let entries = fs::read_dir(dir).map_err(|source| PlotError::Parse {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut datasets: Vec<DatasetId> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .filter_map(|path| path.file_name()?.to_str().map(DatasetId::new))
            .collect();
        datasets.sort();

        Self::new(datasets).ok_or_else(|| PlotError::NoDatasets {
            dir: dir.to_path_buf(),
        })
    }

    pub fn current(&self) -> &DatasetId {
        &self.datasets[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn datasets(&self) -> &[DatasetId] {
        &self.datasets
    }

    /// Points the cursor at `id`, returning its position if it is listed.
    pub fn select(&mut self, id: &DatasetId) -> Option<usize> {
        let index = self.datasets.iter().position(|dataset| dataset == id)?;
        self.current_index = index;
        Some(index)
    }

    /// Moves the cursor one step, wrapping at both ends.
    pub fn advance(&mut self, direction: CycleDirection) -> &DatasetId {
        let count = self.datasets.len();
        self.current_index = match direction {
            CycleDirection::Next => (self.current_index + 1) % count,
            CycleDirection::Previous => (self.current_index + count - 1) % count,
        };
        self.current()
    }
}
