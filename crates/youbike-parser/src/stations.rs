use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::{ParserError, RowIssue};
use crate::model::{Coordinate, StationRecord, StationType};

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "name", "city", "area", "address", "space", "type", "lat", "lng",
];

/// Position of every required column in the header row.
struct ColumnIndex {
    positions: [usize; REQUIRED_COLUMNS.len()],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParserError> {
        let mut positions = [0; REQUIRED_COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            match headers.iter().position(|header| header == column) {
                Some(position) => *slot = position,
                None => missing.push(column),
            }
        }
        if !missing.is_empty() {
            return Err(ParserError::MissingColumns { columns: missing });
        }
        Ok(Self { positions })
    }

    /// Fields past the end of a short row read as empty text.
    fn field<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        REQUIRED_COLUMNS
            .iter()
            .position(|name| *name == column)
            .and_then(|slot| record.get(self.positions[slot]))
            .unwrap_or("")
    }
}

/// Stations in source order plus the rows that were left out.
#[derive(Debug, Default)]
pub struct ParsedStations {
    pub stations: Vec<StationRecord>,
    pub skipped: Vec<RowIssue>,
}

/// Parses header-delimited station CSV text.
///
/// Short or ragged rows are accepted as the CSV reader sees them; a row is
/// only skipped when `space`, `type`, `lat` or `lng` cannot be converted.
/// Blank input yields no stations.
pub fn parse_station_csv(text: &str) -> Result<ParsedStations, ParserError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Ok(ParsedStations::default());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut parsed = ParsedStations::default();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        match convert_row(&record, &columns, line) {
            Ok(station) => parsed.stations.push(station),
            Err(issue) => parsed.skipped.push(issue),
        }
    }

    Ok(parsed)
}

fn convert_row(
    record: &StringRecord,
    columns: &ColumnIndex,
    line: u64,
) -> Result<StationRecord, RowIssue> {
    let text = |column: &str| columns.field(record, column);

    let space = text("space")
        .parse::<u32>()
        .map_err(|_| RowIssue::new(line, "space", text("space"), "is not a slot count"))?;
    let station_type = text("type")
        .parse::<StationType>()
        .map_err(|reason| RowIssue::new(line, "type", text("type"), reason))?;
    let latitude = text("lat")
        .parse::<Coordinate>()
        .map_err(|err| RowIssue::new(line, "lat", text("lat"), err.to_string()))?;
    let longitude = text("lng")
        .parse::<Coordinate>()
        .map_err(|err| RowIssue::new(line, "lng", text("lng"), err.to_string()))?;

    Ok(StationRecord {
        name: text("name").to_string(),
        city: text("city").to_string(),
        area: text("area").to_string(),
        address: text("address").to_string(),
        space,
        station_type,
        latitude,
        longitude,
    })
}
