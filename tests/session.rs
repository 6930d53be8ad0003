//! End-to-end plot session scenarios on the CPU kernel.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use nbody_flythrough::density::{CpuDensityKernel, DensityEngine, MAX_RADIUS, MIN_RADIUS};
use nbody_flythrough::error::PlotError;
use nbody_flythrough::plot::catalog::{CycleDirection, DatasetCatalog};
use nbody_flythrough::plot::loader::{CsvDirectory, DatasetSource, LoadOptions};
use nbody_flythrough::plot::session::{PlotSession, SessionState};
use nbody_flythrough::plot::types::{DatasetId, ParticleRecord, RecordBuffer, TILE_WIDTH};

/// Particles spaced one unit apart along x.
fn line_rows(count: usize) -> String {
    (0..count)
        .map(|i| format!("{i},0,0,0.5,0,0,1\n"))
        .collect()
}

fn write_dataset(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn csv_session(dir: &Path, radius: f32) -> PlotSession<CpuDensityKernel, CsvDirectory> {
    let catalog = DatasetCatalog::scan(dir).unwrap();
    let source = CsvDirectory::new(dir, LoadOptions::default());
    PlotSession::new(catalog, source, DensityEngine::new(CpuDensityKernel, radius))
}

fn densities<K, S>(session: &PlotSession<K, S>) -> Vec<f32>
where
    K: nbody_flythrough::density::DensityKernel,
    S: DatasetSource,
{
    session
        .render()
        .unwrap()
        .records
        .iter()
        .map(ParticleRecord::density)
        .collect()
}

// In-memory source that counts how often each dataset is materialized
#[derive(Default)]
struct CountingSource {
    loads: RefCell<HashMap<String, usize>>,
}

impl CountingSource {
    fn loads(&self, name: &str) -> usize {
        self.loads.borrow().get(name).copied().unwrap_or(0)
    }
}

impl DatasetSource for CountingSource {
    fn load(&self, id: &DatasetId) -> Result<RecordBuffer, PlotError> {
        *self.loads.borrow_mut().entry(id.to_string()).or_default() += 1;
        let records = (0..TILE_WIDTH)
            .map(|i| ParticleRecord::new([i as f32, 0.0, 0.0], [0.0; 3], 1.0))
            .collect();
        Ok(RecordBuffer::truncated(records).unwrap())
    }
}

fn counting_session(names: &[&str]) -> PlotSession<CpuDensityKernel, CountingSource> {
    let catalog = DatasetCatalog::new(names.iter().copied().map(DatasetId::new).collect()).unwrap();
    PlotSession::new(
        catalog,
        CountingSource::default(),
        DensityEngine::new(CpuDensityKernel, 1.0),
    )
}

#[test]
fn three_hundred_rows_present_one_tile() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "a.csv", &line_rows(300));

    let mut session = csv_session(dir.path(), 1.0);
    session.start().unwrap();

    assert_eq!(session.state(), SessionState::Presenting);
    let frame = session.render().unwrap();
    assert_eq!(frame.records.len(), 256);
    assert_eq!(frame.records[255].position[0], 255.0);
}

#[test]
fn exact_tile_presents_without_truncation() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "a.csv", &line_rows(256));

    let mut session = csv_session(dir.path(), 1.0);
    session.start().unwrap();

    let counts = densities(&session);
    assert_eq!(counts.len(), 256);
    assert_eq!(counts[0], 1.0);
    assert_eq!(counts[100], 2.0);
    assert_eq!(counts[255], 1.0);

    let range = session.density_range().unwrap();
    assert_eq!((range.min, range.max), (1.0, 2.0));
}

#[test]
fn empty_dataset_leaves_session_inactive() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "a.csv", "");

    let mut session = csv_session(dir.path(), 1.0);
    let err = session.start().unwrap_err();

    assert!(matches!(err, PlotError::EmptyDataset { rows: 0, .. }));
    assert_eq!(session.state(), SessionState::Inactive);
    assert!(session.active_dataset().is_none());
    assert!(matches!(session.render(), Err(PlotError::Precondition(_))));
    assert!(session.cache().is_empty());
}

#[test]
fn malformed_row_fails_the_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = line_rows(256);
    rows.push_str("1,2,3,4,5,6\n");
    write_dataset(dir.path(), "a.csv", &rows);

    let mut session = csv_session(dir.path(), 1.0);
    let err = session.start().unwrap_err();

    assert!(matches!(err, PlotError::Format { line: 257, .. }));
    assert_eq!(session.state(), SessionState::Inactive);
}

#[test]
fn failed_switch_tears_down_and_next_switch_recovers() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "a.csv", &line_rows(256));
    write_dataset(dir.path(), "b.csv", &line_rows(10));
    write_dataset(dir.path(), "c.csv", &line_rows(512));

    let mut session = csv_session(dir.path(), 1.0);
    session.start().unwrap();

    let err = session.switch_dataset(CycleDirection::Next).unwrap_err();
    assert!(matches!(err, PlotError::EmptyDataset { rows: 10, .. }));
    assert_eq!(session.state(), SessionState::Inactive);
    assert_eq!(session.catalog().current().as_str(), "b.csv");
    assert!(session.render().is_err());

    let id = session.switch_dataset(CycleDirection::Next).unwrap();
    assert_eq!(id.as_str(), "c.csv");
    assert_eq!(session.state(), SessionState::Presenting);
    assert_eq!(session.render().unwrap().records.len(), 512);
}

#[test]
fn cycling_wraps_in_both_directions() {
    let mut session = counting_session(&["a", "b", "c"]);
    session.start().unwrap();

    for _ in 0..3 {
        session.switch_dataset(CycleDirection::Next).unwrap();
    }
    assert_eq!(session.catalog().current_index(), 0);

    let id = session.switch_dataset(CycleDirection::Previous).unwrap();
    assert_eq!(id.as_str(), "c");
    for _ in 0..2 {
        session.switch_dataset(CycleDirection::Previous).unwrap();
    }
    assert_eq!(session.catalog().current_index(), 0);
    assert_eq!(session.active_dataset().unwrap().as_str(), "a");
}

#[test]
fn activating_a_dataset_moves_the_cycle_cursor() {
    let mut session = counting_session(&["a", "b", "c"]);
    session.start().unwrap();

    session.activate(&DatasetId::new("c")).unwrap();
    assert_eq!(session.catalog().current().as_str(), "c");

    let id = session.switch_dataset(CycleDirection::Next).unwrap();
    assert_eq!(id.as_str(), "a");
    assert_eq!(session.active_dataset().unwrap().as_str(), "a");
}

#[test]
fn activating_an_unlisted_dataset_is_rejected() {
    let mut session = counting_session(&["a", "b", "c"]);
    session.start().unwrap();
    session.switch_dataset(CycleDirection::Next).unwrap();

    let err = session.activate(&DatasetId::new("zzz")).unwrap_err();
    assert!(matches!(err, PlotError::UnknownDataset(ref name) if name == "zzz"));
    assert_eq!(session.state(), SessionState::Presenting);
    assert_eq!(session.active_dataset().unwrap().as_str(), "b");
    assert_eq!(session.catalog().current().as_str(), "b");
    assert_eq!(session.source().loads("zzz"), 0);
}

#[test]
fn revisiting_a_dataset_reuses_the_cached_plot() {
    let mut session = counting_session(&["a", "b"]);
    session.start().unwrap();
    let first = Arc::clone(session.cache().get(&DatasetId::new("a")).unwrap());

    for _ in 0..4 {
        session.switch_dataset(CycleDirection::Next).unwrap();
    }

    assert_eq!(session.source().loads("a"), 1);
    assert_eq!(session.source().loads("b"), 1);
    assert_eq!(session.cache().len(), 2);
    let again = session.cache().get(&DatasetId::new("a")).unwrap();
    assert!(Arc::ptr_eq(&first, again));
}

#[test]
fn cached_plot_keeps_placeholder_densities() {
    let mut session = counting_session(&["a"]);
    session.start().unwrap();

    assert_eq!(densities(&session)[10], 2.0);
    let cached = session.cache().get(&DatasetId::new("a")).unwrap();
    assert!(cached.iter().all(|record| record.density() == 0.0));
}

#[test]
fn radius_change_recomputes_before_returning() {
    let mut session = counting_session(&["a"]);
    session.start().unwrap();
    assert_eq!(densities(&session)[10], 2.0);

    assert!(session.double_radius().unwrap());
    assert_eq!(session.radius(), 2.0);
    assert_eq!(session.state(), SessionState::Presenting);
    let counts = densities(&session);
    assert_eq!(counts[0], 2.0);
    assert_eq!(counts[1], 3.0);
    assert_eq!(counts[10], 4.0);

    assert!(session.halve_radius().unwrap());
    assert!(session.halve_radius().unwrap());
    assert_eq!(session.radius(), 0.5);
    assert!(densities(&session).iter().all(|&count| count == 0.0));
}

#[test]
fn radius_limits_are_no_ops() {
    let mut session = counting_session(&["a"]);
    session.start().unwrap();

    while session.double_radius().unwrap() {}
    assert_eq!(session.radius(), MAX_RADIUS);
    let generation = session.render().unwrap().generation;
    assert!(!session.double_radius().unwrap());
    assert_eq!(session.render().unwrap().generation, generation);

    while session.halve_radius().unwrap() {}
    assert_eq!(session.radius(), MIN_RADIUS);
    assert!(!session.halve_radius().unwrap());
    assert_eq!(session.radius(), MIN_RADIUS);
}

#[test]
fn radius_change_while_inactive_only_updates_radius() {
    let mut session = counting_session(&["a"]);
    assert!(session.double_radius().unwrap());
    assert_eq!(session.radius(), 2.0);
    assert_eq!(session.state(), SessionState::Inactive);
    assert!(session.cache().is_empty());

    session.start().unwrap();
    assert_eq!(densities(&session)[10], 4.0);
}

#[test]
fn repeated_activation_is_deterministic() {
    let mut session = counting_session(&["a", "b"]);
    session.start().unwrap();
    let first = densities(&session);
    let first_range = session.density_range().unwrap();

    session.switch_dataset(CycleDirection::Next).unwrap();
    session.switch_dataset(CycleDirection::Next).unwrap();

    assert_eq!(densities(&session), first);
    assert_eq!(session.density_range().unwrap(), first_range);
    assert!(first_range.min <= first_range.max);
}
