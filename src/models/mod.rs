//! Core data models for the boundary dataset.

pub mod fragment;
pub mod geojson;
pub mod region;

pub use fragment::{Fragment, GeoBbox, GeoPoint};
pub use geojson::GeoJsonMultiPolygon;
pub use region::{filter_regions, flat_regions, Region, RegionCode};
