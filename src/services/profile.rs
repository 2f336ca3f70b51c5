//! Fixed-width decoder for the sounding table (`TEXT:LIST` layout).
//!
//! The table is positional, not delimited: every quantity occupies a
//! 7-character slot. The slot table below is the single place to edit if the
//! upstream layout ever changes.
//!
//! ```text
//! -----------------------------------------------------------------------------
//!    PRES   HGHT   TEMP   DWPT   RELH   MIXR   DRCT   SKNT   THTA   THTE   THTV
//!     hPa     m      C      C      %    g/kg    deg   knot     K      K      K
//! -----------------------------------------------------------------------------
//!  1000.0     96   24.6   20.6     78  15.51    335      6  297.8  343.0  300.6
//! ```

use crate::models::{LevelRecord, Quantity};

/// Width of every column in characters.
pub const COLUMN_WIDTH: usize = 7;

/// Lines preceding the first data row: rule, names, units, rule.
pub const HEADER_LINES: usize = 4;

/// One fixed-width slot: `[start, end)` byte offsets within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub quantity: Quantity,
    pub start: usize,
    pub end: usize,
}

const fn column(quantity: Quantity, index: usize) -> Column {
    Column {
        quantity,
        start: index * COLUMN_WIDTH,
        end: (index + 1) * COLUMN_WIDTH,
    }
}

pub const COLUMNS: [Column; 11] = [
    column(Quantity::Pressure, 0),
    column(Quantity::Height, 1),
    column(Quantity::Temperature, 2),
    column(Quantity::Dewpoint, 3),
    column(Quantity::RelativeHumidity, 4),
    column(Quantity::MixingRatio, 5),
    column(Quantity::WindDirection, 6),
    column(Quantity::WindSpeed, 7),
    column(Quantity::ThetaA, 8),
    column(Quantity::ThetaE, 9),
    column(Quantity::ThetaV, 10),
];

/// Drop the fixed header lines and any blank trailing lines of a data block.
///
/// A single newline right after the opening tag is not part of the table;
/// HTML parsers differ on whether they keep it. The last data row may or may
/// not be followed by a newline. Blocks too short to hold any data row yield
/// an empty slice.
pub fn strip_table_frame(block: &str) -> Vec<&str> {
    let block = block
        .strip_prefix("\r\n")
        .or_else(|| block.strip_prefix('\n'))
        .unwrap_or(block);
    let lines: Vec<&str> = block.split('\n').collect();
    if lines.len() <= HEADER_LINES {
        return Vec::new();
    }

    let mut rows = lines[HEADER_LINES..].to_vec();
    while rows.last().is_some_and(|line| line.trim().is_empty()) {
        rows.pop();
    }
    rows
}

/// Decode data rows into levels, one level per line, in input order.
///
/// Never fails: short lines, blank slots and unparsable slots all become
/// missing values.
pub fn parse_rows<S: AsRef<str>>(lines: &[S]) -> Vec<LevelRecord> {
    lines
        .iter()
        .enumerate()
        .map(|(row, line)| parse_line(row, line.as_ref().trim_end_matches('\r')))
        .collect()
}

/// Strip the frame and decode a full `<pre>` data block.
pub fn parse_block(block: &str) -> Vec<LevelRecord> {
    parse_rows(&strip_table_frame(block))
}

fn parse_line(row: usize, line: &str) -> LevelRecord {
    let mut level = LevelRecord::default();
    for col in COLUMNS.iter() {
        level.set(col.quantity, decode_slot(row, line, col));
    }
    level
}

fn decode_slot(row: usize, line: &str, col: &Column) -> Option<f64> {
    let bytes = line.as_bytes();
    if col.start >= bytes.len() {
        return None;
    }
    let end = col.end.min(bytes.len());

    let slot = match std::str::from_utf8(&bytes[col.start..end]) {
        Ok(s) => s.trim(),
        Err(_) => {
            tracing::warn!(
                "Row {}: non-ASCII text in {:?} slot, treating as missing",
                row,
                col.quantity
            );
            return None;
        }
    };

    if slot.is_empty() {
        return None;
    }

    match slot.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::warn!(
                "Row {}: cannot decode {:?} from '{}', treating as missing",
                row,
                col.quantity,
                slot
            );
            None
        }
    }
}
