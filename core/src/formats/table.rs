//! Reader for the mumax3 `table.txt` scalar log. Auxiliary display data;
//! the slice pipeline does not consume it.

use std::{io::Read, num::ParseFloatError};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing header line")]
    MissingHeader,
    #[error("header has no columns")]
    EmptyHeader,
    #[error("CSV parsing error (line {0}: {1})")]
    Csv(usize, csv::Error),
    #[error("wrong number of values (line {0}: {1} columns, expected {2})")]
    WrongValueCount(usize, usize, usize),
    #[error("float parsing error (line {0}, column {1}: {2})")]
    Float(usize, usize, ParseFloatError),
}

/// Column-labeled scalar time series. The log is tab-separated with a
/// single header line like `# t (s)\tmx ()\tmy ()\tmz ()`, one name/unit
/// pair per column, followed by one row of floats per saved step.
#[derive(Debug)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

#[derive(Debug)]
pub struct Column {
    pub name: String,
    pub unit: String,
    pub values: Vec<f32>,
}

impl Table {
    pub fn from_reader(rdr: impl Read) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .trim(csv::Trim::All)
            // Allows the trailing empty line mumax3 leaves at the end
            .flexible(true)
            .from_reader(rdr);

        let mut records = rdr.into_records();

        let header = match records.next() {
            Some(val) => val.map_err(|e| Error::Csv(1, e))?,
            None => return Err(Error::MissingHeader),
        };

        let mut columns: Vec<Column> = header
            .iter()
            .filter(|cell| !cell.is_empty())
            .map(|cell| {
                let (name, unit) = parse_header_cell(cell);
                Column {
                    name,
                    unit,
                    values: Vec::new(),
                }
            })
            .collect();
        if columns.is_empty() {
            return Err(Error::EmptyHeader);
        }
        let len = columns.len();

        let mut rows = 0;
        for (i, record) in records.enumerate() {
            let record = record.map_err(|e| Error::Csv(i + 2, e))?;

            let mut filled = 0;
            for (j, cell) in record.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                if filled < len {
                    let value = cell
                        .parse::<f32>()
                        .map_err(|e| Error::Float(i + 2, j, e))?;
                    columns[filled].values.push(value);
                }
                filled += 1;
            }
            if filled == 0 {
                continue;
            }
            if filled != len {
                return Err(Error::WrongValueCount(i + 2, filled, len));
            }
            rows += 1;
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of saved steps.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Splits a header cell like `# t (s)` or `mx ()` into name and unit.
fn parse_header_cell(cell: &str) -> (String, String) {
    let cell = cell.trim_start_matches('#').trim();
    match cell.split_once('(') {
        Some((name, rest)) => {
            let unit = rest.trim_end().trim_end_matches(')').trim();
            (name.trim().to_string(), unit.to_string())
        }
        None => (cell.to_string(), String::new()),
    }
}
