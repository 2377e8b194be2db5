use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use youbike_parser::{StationRecord, StationType};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// How stations are split into published documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Consecutive parts in source order, icons keyed by station type.
    #[default]
    ByPart,
    /// Parts numbered separately within each station type.
    ByType,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::ByPart => "by-part",
            Layout::ByType => "by-type",
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by-part" | "part" => Ok(Layout::ByPart),
            "by-type" | "type" => Ok(Layout::ByType),
            other => Err(format!("unknown layout {other:?}, expected by-part or by-type")),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a chunk within one run; parts are 1-based per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId {
    pub station_type: Option<StationType>,
    pub part: usize,
}

impl ChunkId {
    /// File stem used in the destination key: `3` or `yb2-1`.
    pub fn discriminator(&self) -> String {
        match self.station_type {
            None => self.part.to_string(),
            Some(station_type) => format!("yb{}-{}", station_type.code(), self.part),
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.discriminator())
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub stations: Vec<StationRecord>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Display name of the chunk's document, e.g. `YouBike 2.0 1 (2024-05-01 更新)`.
    pub fn title(&self, date: NaiveDate) -> String {
        let stem = match self.id.station_type {
            None => format!("YouBike {}", self.id.part),
            Some(station_type) => format!("{} {}", station_type.label(), self.id.part),
        };
        format!("{stem} ({} 更新)", date.format("%Y-%m-%d"))
    }
}

pub fn partition_for(
    layout: Layout,
    stations: Vec<StationRecord>,
    chunk_size: usize,
) -> Result<Vec<Chunk>> {
    match layout {
        Layout::ByPart => partition(stations, chunk_size),
        Layout::ByType => partition_by_type(stations, chunk_size),
    }
}

/// Splits stations into consecutive chunks of at most `chunk_size`, keeping
/// source order.
pub fn partition(stations: Vec<StationRecord>, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidChunkSize);
    }
    Ok(split(stations, chunk_size, None))
}

/// Groups stations by type (types in code order, stations in source order
/// within a group) and chunks each group independently.
pub fn partition_by_type(stations: Vec<StationRecord>, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidChunkSize);
    }

    let mut groups: BTreeMap<StationType, Vec<StationRecord>> = BTreeMap::new();
    for station in stations {
        groups.entry(station.station_type).or_default().push(station);
    }

    Ok(groups
        .into_iter()
        .flat_map(|(station_type, group)| split(group, chunk_size, Some(station_type)))
        .collect())
}

fn split(
    stations: Vec<StationRecord>,
    chunk_size: usize,
    station_type: Option<StationType>,
) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(stations.len().div_ceil(chunk_size));
    let mut remaining = stations.into_iter().peekable();
    let mut part = 0;

    while remaining.peek().is_some() {
        part += 1;
        chunks.push(Chunk {
            id: ChunkId { station_type, part },
            stations: remaining.by_ref().take(chunk_size).collect(),
        });
    }

    chunks
}
