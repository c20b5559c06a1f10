use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::{fs, io, path::Path};

use crate::error::{FigureError, Result};

/// A benchmark CSV with a header row. Column lookups ignore case and treat
/// runs of spaces, dashes and underscores as a single `_`.
#[derive(Debug)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn from_path(path: &Path) -> Result<Table> {
        let file = fs::File::open(path).map_err(|err| FigureError::io(path, err))?;
        let table = Table::from_reader(file)?;
        debug!("{}: {} rows, columns {:?}", path.display(), table.len(), table.headers);
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Table> {
        let _guard = flame::start_guard("parse_table");
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers = rdr.headers()?.iter().map(normalize).collect();
        let rows = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Table { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let key = normalize(name);
        let idx = self
            .headers
            .iter()
            .position(|h| *h == key)
            .ok_or_else(|| FigureError::MissingColumn(name.to_string()))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let cell = record.get(idx).unwrap_or("");
                match cell.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(FigureError::NotANumber {
                        row: row + 1,
                        column: name.to_string(),
                        value: cell.to_string(),
                    }),
                }
            })
            .collect()
    }
}

pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            gap = true;
            continue;
        }
        if gap && !out.is_empty() {
            out.push('_');
        }
        gap = false;
        out.extend(c.to_lowercase());
    }
    out
}

pub fn read_samples(path: &Path) -> Result<Vec<f64>> {
    let input = fs::read_to_string(path).map_err(|err| FigureError::io(path, err))?;
    let samples = parse_samples(&input)?;
    debug!("{}: {} samples", path.display(), samples.len());
    Ok(samples)
}

// One number per line in practice, but any whitespace separates values.
pub fn parse_samples(input: &str) -> Result<Vec<f64>> {
    let _guard = flame::start_guard("parse_samples");
    let mut samples = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split_ascii_whitespace() {
            match token.parse::<f64>() {
                Ok(value) if value.is_finite() => samples.push(value),
                _ => {
                    return Err(FigureError::BadSample {
                        line: idx + 1,
                        value: token.to_string(),
                    })
                }
            }
        }
    }

    if samples.is_empty() {
        return Err(FigureError::Empty);
    }
    Ok(samples)
}

#[test]
fn column_lookup_ignores_case_and_spacing() {
    let csv = "hosts,Complete round_wall_avg,consensus_structured_wall_avg\n7,12.5,3\n16,20,4.25\n";
    let table = Table::from_reader(csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.column("complete_round_wall_avg").unwrap(), vec![12.5, 20.0]);
    assert_eq!(
        table.column("Consensus structured_wall_avg").unwrap(),
        vec![3.0, 4.25]
    );
}

#[test]
fn cells_are_trimmed() {
    let table = Table::from_reader(" a , b \n 1 , 2 \n".as_bytes()).unwrap();
    assert_eq!(table.column("b").unwrap(), vec![2.0]);
}

#[test]
fn missing_column_is_named() {
    let table = Table::from_reader("a,b\n1,2\n".as_bytes()).unwrap();
    match table.column("sign_wall_avg") {
        Err(FigureError::MissingColumn(name)) => assert_eq!(name, "sign_wall_avg"),
        other => panic!("expected missing column, got {:?}", other),
    }
}

#[test]
fn non_numeric_cell_reports_row() {
    let table = Table::from_reader("a\n1\nfast\n".as_bytes()).unwrap();
    match table.column("a") {
        Err(FigureError::NotANumber { row, value, .. }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "fast");
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn normalize_folds_separators() {
    assert_eq!(normalize("Complete round_wall_avg"), "complete_round_wall_avg");
    assert_eq!(normalize("  Sign - wall  avg "), "sign_wall_avg");
    assert_eq!(normalize("_lead"), "lead");
}

#[test]
fn samples_skip_comments_and_blank_lines() {
    let samples = parse_samples("# leaves per page\n12\n\n  512 \n3 4\n").unwrap();
    assert_eq!(samples, vec![12.0, 512.0, 3.0, 4.0]);
}

#[test]
fn bad_sample_reports_line() {
    match parse_samples("1\n2\nx\n") {
        Err(FigureError::BadSample { line, value }) => {
            assert_eq!(line, 3);
            assert_eq!(value, "x");
        }
        other => panic!("expected a bad sample, got {:?}", other),
    }
}

#[test]
fn empty_samples_are_rejected() {
    assert!(matches!(parse_samples("# nothing\n\n"), Err(FigureError::Empty)));
}
