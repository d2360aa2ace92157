//! Port trait definitions
//!
//! These traits define the external services that adapters must implement.

pub mod sources;

pub use sources::{
    BuildingQuery, CadastreFreshness, CadastreGenerator, CadastreListing, CadastreSource,
    LineStream, OpenDataSource, TileInvalidator,
};
