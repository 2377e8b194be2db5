pub mod errors;
pub mod model;
mod stations;

pub use errors::{CoordinateError, ParserError, RowIssue};
pub use model::{Coordinate, StationRecord, StationType};
pub use stations::{parse_station_csv, ParsedStations, REQUIRED_COLUMNS};
