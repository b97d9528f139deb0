//! Cube-face ↔ lat/lon ↔ Cartesian kernels for cubed-sphere grids.
//! Pure and stateless; the engine calls these for every grid point it precomputes.
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::many_single_char_names, clippy::similar_names, clippy::module_name_repetitions)]

pub mod basis;
mod conformal;
pub mod math;
pub mod projection;

#[cfg(test)]
mod tests;

pub use basis::{
    basis_products, contravariant_to_latlon, latlon_to_contravariant, tangent_basis, BasisProducts,
    TangentBasis, CORNER_TOL,
};
pub use projection::{
    is_cube_corner, latlon_to_panel, panel_components, panel_normal, panel_to_latlon, panel_to_xyz,
    panel_vector, pick_panel, xyz_to_panel_coords, LocalMap, PanelId, Projection, ProjectionError, PANELS,
    PANEL_FRAMES,
};
