//! Deterministic extraction of OpenStreetMap points of interest for a square
//! area, fetched from an Overpass endpoint.
//!
//! The same centre, tag set and snapshot date produce byte-identical
//! `pois.csv` / `pois.json`; the [`repro`] harness checks that claim against a
//! live endpoint.

pub mod apis;
pub mod error;
pub mod geometry;
pub mod hash;
pub mod normalize;
pub mod output;
pub mod overpass;
pub mod pipeline;
pub mod repro;
pub mod settings;
pub mod tags;
pub mod types;

pub use error::{PoiError, Result};
