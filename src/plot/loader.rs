use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::PlotError;
use crate::plot::types::{DatasetId, ParticleRecord, RecordBuffer, TILE_WIDTH};

const FIELDS_PER_ROW: usize = 7;

/// Something that can materialize a dataset into a record buffer.
pub trait DatasetSource {
    fn load(&self, id: &DatasetId) -> Result<RecordBuffer, PlotError>;
}

impl<S: DatasetSource + ?Sized> DatasetSource for Box<S> {
    fn load(&self, id: &DatasetId) -> Result<RecordBuffer, PlotError> {
        (**self).load(id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadOptions {
    /// Added to every z coordinate as the rows are read.
    pub z_offset: f32,
}

/// Datasets stored as `x,y,z,vx,vy,vz,mass` files inside one directory.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    dir: PathBuf,
    options: LoadOptions,
}

impl CsvDirectory {
    pub fn new(dir: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }
}

impl DatasetSource for CsvDirectory {
    fn load(&self, id: &DatasetId) -> Result<RecordBuffer, PlotError> {
        load_csv(&self.dir.join(id.as_str()), &self.options)
    }
}

/// Reads a whole dataset file and truncates it to a tile multiple.
pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<RecordBuffer, PlotError> {
    let file = File::open(path).map_err(|source| PlotError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let origin = path.display().to_string();
    let records = parse_records(BufReader::new(file), &origin, options)?;
    let rows = records.len();

    let buffer = RecordBuffer::truncated(records).ok_or_else(|| PlotError::EmptyDataset {
        dataset: origin.clone(),
        rows,
    })?;

    if buffer.len() != rows {
        warn!(
            "{origin}: particle count must be a multiple of {TILE_WIDTH}, dropping {} of {rows} rows",
            rows - buffer.len()
        );
    }
    info!("Loaded {} particles from {origin}", buffer.len());

    Ok(buffer)
}

/// Parses every row of `reader`. Whitespace-only lines are skipped; any other
/// row must hold exactly seven numeric fields or the whole parse fails.
pub fn parse_records<R: BufRead>(
    reader: R,
    origin: &str,
    options: &LoadOptions,
) -> Result<Vec<ParticleRecord>, PlotError> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => PlotError::Format {
                origin: origin.to_string(),
                line: line_number,
                reason: format!("unreadable line: {e}"),
            },
            _ => PlotError::Parse {
                path: PathBuf::from(origin),
                source: e,
            },
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = parse_row(&line).map_err(|reason| PlotError::Format {
            origin: origin.to_string(),
            line: line_number,
            reason,
        })?;

        records.push(ParticleRecord::new(
            [fields[0], fields[1], fields[2] + options.z_offset],
            [fields[3], fields[4], fields[5]],
            fields[6],
        ));
    }

    Ok(records)
}

fn parse_row(line: &str) -> Result<[f32; FIELDS_PER_ROW], String> {
    let mut fields = [0.0; FIELDS_PER_ROW];
    let mut count = 0;

    for raw in line.split(',') {
        if count == FIELDS_PER_ROW {
            return Err(format!("expected {FIELDS_PER_ROW} fields, found more"));
        }
        fields[count] = raw
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("field {} is not a number: {raw:?}", count + 1))?;
        count += 1;
    }

    if count != FIELDS_PER_ROW {
        return Err(format!("expected {FIELDS_PER_ROW} fields, found {count}"));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Vec<ParticleRecord>, PlotError> {
        parse_records(Cursor::new(text), "memory", &LoadOptions::default())
    }

    #[test]
    fn parses_seven_field_rows() {
        let records = parse("1,2,3,4,5,6,7\n-1.5, 0.25 ,1e2,0,0,0,0.5\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, [1.0, 2.0, 3.0, 7.0]);
        assert_eq!(records[0].velocity, [4.0, 5.0, 6.0, 0.0]);
        assert_eq!(records[1].position, [-1.5, 0.25, 100.0, 0.5]);
    }

    #[test]
    fn applies_z_offset() {
        let options = LoadOptions { z_offset: -50.0 };
        let records = parse_records(Cursor::new("0,0,10,0,0,0,1"), "memory", &options).unwrap();
        assert_eq!(records[0].position[2], -40.0);
    }

    #[test]
    fn skips_blank_lines() {
        let records = parse("1,2,3,4,5,6,7\n\n   \n1,2,3,4,5,6,7\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn short_row_is_a_format_error() {
        match parse("1,2,3,4,5,6,7\n1,2,3\n") {
            Err(PlotError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn long_row_is_a_format_error() {
        assert!(matches!(
            parse("1,2,3,4,5,6,7,8\n"),
            Err(PlotError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn non_numeric_field_is_a_format_error() {
        assert!(matches!(
            parse("1,2,x,4,5,6,7\n"),
            Err(PlotError::Format { line: 1, .. })
        ));
    }

    // Yields one good row, then fails the way a dropped network mount would
    struct FailingReader {
        served: bool,
    }

    impl io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection lost"));
            }
            self.served = true;
            let row = b"1,2,3,4,5,6,7\n";
            buf[..row.len()].copy_from_slice(row);
            Ok(row.len())
        }
    }

    #[test]
    fn read_failure_mid_file_is_a_parse_error() {
        let reader = BufReader::new(FailingReader { served: false });
        match parse_records(reader, "remote.csv", &LoadOptions::default()) {
            Err(PlotError::Parse { path, source }) => {
                assert_eq!(path, PathBuf::from("remote.csv"));
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_a_format_error() {
        let bytes: &[u8] = b"1,2,3,4,5,6,7\n\xff\xfe,2,3,4,5,6,7\n";
        assert!(matches!(
            parse_records(Cursor::new(bytes), "memory", &LoadOptions::default()),
            Err(PlotError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let result = load_csv(Path::new("/definitely/not/here.csv"), &LoadOptions::default());
        assert!(matches!(result, Err(PlotError::Parse { .. })));
    }
}
