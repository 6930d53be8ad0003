use std::fs;

use nbody_flythrough::config::PlotterConfig;
use nbody_flythrough::error::PlotError;
use nbody_flythrough::plot::catalog::DatasetCatalog;
use nbody_flythrough::plot::loader::{CsvDirectory, DatasetSource};
use nbody_flythrough::plot::procedural::{Distribution, ProceduralSource};
use nbody_flythrough::plot::types::{DatasetId, TILE_WIDTH};

#[test]
fn directory_datasets_load_with_configured_offset() {
    let dir = tempfile::tempdir().unwrap();
    let rows: String = (0..TILE_WIDTH).map(|i| format!("{i}, 1, 2, 0.1, 0.2, 0.3, 5\n")).collect();
    fs::write(dir.path().join("run_001.CSV"), &rows).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a dataset").unwrap();

    let config = PlotterConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let catalog = DatasetCatalog::scan(&config.data_dir).unwrap();
    assert_eq!(catalog.datasets(), &[DatasetId::new("run_001.CSV")]);

    let source = CsvDirectory::new(&config.data_dir, config.load_options());
    let buffer = source.load(catalog.current()).unwrap();
    assert_eq!(buffer.len(), TILE_WIDTH);
    assert_eq!(buffer[3].position, [3.0, 1.0, -48.0, 5.0]);
    assert_eq!(buffer[3].velocity, [0.1, 0.2, 0.3, 0.0]);
}

#[test]
fn missing_dataset_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = CsvDirectory::new(dir.path(), Default::default());

    assert!(matches!(
        source.load(&DatasetId::new("gone.csv")),
        Err(PlotError::Parse { .. })
    ));
}

#[test]
fn directory_without_csv_files_has_no_catalog() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        DatasetCatalog::scan(dir.path()),
        Err(PlotError::NoDatasets { .. })
    ));
}

#[test]
fn procedural_source_pads_up_to_a_tile() {
    let config = PlotterConfig {
        distribution: Some(Distribution::Cube),
        num_bodies: 1000,
        ..Default::default()
    };
    let source = ProceduralSource {
        distribution: Distribution::Cube,
        count: config.num_bodies,
        params: config.procedural_params(),
    };

    let buffer = source.load(&source.dataset_id()).unwrap();
    assert_eq!(buffer.len(), 1024);
    assert_eq!(buffer.tile_count(), 4);
}
