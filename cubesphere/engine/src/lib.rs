//! Cubed-sphere finite-volume transport engine.
//! Grid construction and caching, latlon mapping, flux/divergence operators and the advection driver.
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro, clippy::large_enum_variant)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod array;
pub mod cfl;
pub mod config;
pub mod diagnostics;
pub mod divergence;
pub mod fields;
pub mod flux;
pub mod grid;
pub mod initial;
pub mod latlon;
pub mod stepper;
pub mod velocity;

pub use array::PanelArray;
pub use fields::CsField;
pub use grid::cache::{CacheKey, CacheStore, FileCache, MemoryCache};
pub use grid::{build_grid, CubedSphere, GridError};
pub use latlon::LatLonGrid;
pub use stepper::{RunReport, RunState, Simulation, SimulationParams};

/// Engine crate version, logged by the runner at startup.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    #[test]
    fn version_comes_from_the_manifest() {
        assert_eq!(super::version(), env!("CARGO_PKG_VERSION"));
        assert!(super::version().split('.').all(|part| part.parse::<u32>().is_ok()));
    }
}
