//! Batimap Store - Repository port and adapters
//!
//! This crate defines the city repository port and provides the in-memory
//! adapters, the JSON snapshot format and the tile invalidation sinks.

pub mod memory;
pub mod ports;
pub mod snapshot;
pub mod tiles;

pub use memory::{Boundary, MemoryCityRepository, StaticCadastreSource, StaticOpenData};
pub use ports::{BuildingSourceRow, CityRepository, PointBuilding};
pub use snapshot::RepositorySnapshot;
pub use tiles::{FileTileInvalidator, RecordingTiles, TileEvent};
