//! Ghost-cell stencils and panel edge connectivity.
//!
//! Every ghost cell centre lies on some other panel's interior. Its value is the bicubic Lagrange
//! interpolant of that panel's interior cell averages at the ghost's position, so the fill reads only
//! interior data and never depends on the order panels are visited.

use cubesphere_geo::{math, pick_panel, xyz_to_panel_coords, PanelId, PANELS};
use smallvec::SmallVec;

use super::CubedSphere;
use crate::array::PanelArray;

/// Matching tolerance for shared edge endpoints.
const LINK_TOL: f64 = 1.0e-10;

/// One of the four sides of a panel in computational coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// `x = x_min`
    West,
    /// `x = x_max`
    East,
    /// `y = y_min`
    South,
    /// `y = y_max`
    North,
}

impl Edge {
    /// All four edges in a fixed order.
    pub const ALL: [Edge; 4] = [Edge::West, Edge::East, Edge::South, Edge::North];

    /// Dense index matching [`Edge::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Edge::West => 0,
            Edge::East => 1,
            Edge::South => 2,
            Edge::North => 3,
        }
    }

    /// Sign of the face normal relative to the outward direction of this edge.
    #[inline]
    pub fn outward_sign(self) -> f64 {
        match self {
            Edge::West | Edge::South => -1.0,
            Edge::East | Edge::North => 1.0,
        }
    }

    /// True for edges made of x-faces (`pu` points).
    #[inline]
    pub fn is_x_face(self) -> bool {
        matches!(self, Edge::West | Edge::East)
    }
}

/// Location of boundary face `k` (0..N) along `edge` of panel `p`.
///
/// Returns `(i, j)` into the `pu` array for west/east edges and into `pv` for south/north.
#[inline]
pub fn edge_face(grid: &CubedSphere, edge: Edge, k: usize) -> (usize, usize) {
    let b = grid.bounds;
    match edge {
        Edge::West => (b.i0, b.j0 + k),
        Edge::East => (b.iend, b.j0 + k),
        Edge::South => (b.i0 + k, b.j0),
        Edge::North => (b.i0 + k, b.jend),
    }
}

/// The interior cell adjacent to boundary face `k` of `edge`.
#[inline]
pub fn edge_cell(grid: &CubedSphere, edge: Edge, k: usize) -> (usize, usize) {
    let b = grid.bounds;
    match edge {
        Edge::West => (b.i0, b.j0 + k),
        Edge::East => (b.iend - 1, b.j0 + k),
        Edge::South => (b.i0 + k, b.j0),
        Edge::North => (b.i0 + k, b.jend - 1),
    }
}

fn edge_endpoints(grid: &CubedSphere, edge: Edge) -> ((usize, usize), (usize, usize)) {
    let b = grid.bounds;
    match edge {
        Edge::West => ((b.i0, b.j0), (b.i0, b.jend)),
        Edge::East => ((b.iend, b.j0), (b.iend, b.jend)),
        Edge::South => ((b.i0, b.j0), (b.iend, b.j0)),
        Edge::North => ((b.i0, b.jend), (b.iend, b.jend)),
    }
}

/// The edge a panel shares with a neighbour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeLink {
    /// Neighbouring panel
    pub panel: PanelId,
    /// Its edge that coincides with ours
    pub edge: Edge,
    /// Face order runs opposite on the two sides
    pub reversed: bool,
}

impl EdgeLink {
    /// Neighbour face index matching our face `k` on an edge of `n` faces.
    #[inline]
    pub fn map_index(&self, k: usize, n: usize) -> usize {
        if self.reversed {
            n - 1 - k
        } else {
            k
        }
    }
}

/// Bicubic interpolation stencil for one ghost cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GhostStencil {
    /// Owning panel
    pub panel: PanelId,
    /// First source column
    pub i: usize,
    /// First source row
    pub j: usize,
    /// Weights along i
    pub wx: SmallVec<[f64; 4]>,
    /// Weights along j
    pub wy: SmallVec<[f64; 4]>,
}

/// Precomputed ghost-fill stencils and edge links for a grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Halo {
    /// One stencil per ghost cell; `None` for interior cells
    pub stencils: Vec<Option<GhostStencil>>,
    /// Per-panel links indexed by [`Edge::index`]; an unlinked edge behaves as closed
    pub links: [[Option<EdgeLink>; 4]; PANELS],
    n: usize,
    nt: usize,
}

/// Lagrange stencil of up to four points around continuous index `s`, restricted to `[lo, hi)`.
///
/// Returns the first index and the weights.
pub fn lagrange_stencil(s: f64, lo: usize, hi: usize) -> (usize, SmallVec<[f64; 4]>) {
    let width = (hi - lo).min(4);
    let half = (width as isize - 1) / 2;
    let start = (s.floor() as isize - half).clamp(lo as isize, (hi - width) as isize);
    let start = start as usize;
    let mut w = SmallVec::new();
    for a in 0..width {
        let xa = (start + a) as f64;
        let mut l = 1.0;
        for b in 0..width {
            if a != b {
                let xb = (start + b) as f64;
                l *= (s - xb) / (xa - xb);
            }
        }
        w.push(l);
    }
    (start, w)
}

impl Halo {
    /// Build stencils and edge links from the grid geometry.
    pub fn build(grid: &CubedSphere) -> Self {
        let n = grid.n;
        let nt = grid.nt();
        let b = grid.bounds;
        let mut stencils = vec![None; PANELS * nt * nt];
        let index = PanelArray::<()>::filled(nt, nt, ());

        for p in 0..PANELS {
            for j in 0..nt {
                for i in 0..nt {
                    if b.contains(i, j) {
                        continue;
                    }
                    let r = grid.centers[(p, i, j)].xyz;
                    let q = pick_panel(r);
                    let Some((x, y)) = xyz_to_panel_coords(q, r, grid.projection) else {
                        continue;
                    };
                    let sx = (x - grid.x_min) / grid.dx - 0.5 + grid.ghost as f64;
                    let sy = (y - grid.x_min) / grid.dx - 0.5 + grid.ghost as f64;
                    let (si, wx) = lagrange_stencil(sx, b.i0, b.iend);
                    let (sj, wy) = lagrange_stencil(sy, b.j0, b.jend);
                    stencils[index.offset(p, i, j)] = Some(GhostStencil { panel: q, i: si, j: sj, wx, wy });
                }
            }
        }

        let mut links = [[None; 4]; PANELS];
        for p in 0..PANELS {
            for edge in Edge::ALL {
                links[p][edge.index()] = find_link(grid, p, edge);
            }
        }

        Self { stencils, links, n, nt }
    }

    /// Stencil for ghost cell `(p, i, j)`, `None` for interior cells.
    #[inline]
    pub fn stencil(&self, p: usize, i: usize, j: usize) -> Option<&GhostStencil> {
        self.stencils.get((p * self.nt + j) * self.nt + i).and_then(Option::as_ref)
    }

    /// Link across `edge` of panel `p`.
    #[inline]
    pub fn link(&self, p: usize, edge: Edge) -> Option<EdgeLink> {
        self.links[p][edge.index()]
    }

    /// Interior cell on the neighbouring panel that is the true neighbour of the first ghost cell
    /// outside `edge` at position `k`.
    pub fn across(&self, grid: &CubedSphere, p: usize, edge: Edge, k: usize) -> Option<(usize, usize, usize)> {
        let link = self.link(p, edge)?;
        let k2 = link.map_index(k, self.n);
        let (i, j) = edge_cell(grid, link.edge, k2);
        Some((link.panel, i, j))
    }

    /// The four edge-sharing neighbours of interior cell `(p, i, j)`, crossing panel edges where needed.
    ///
    /// Closed edges contribute nothing.
    pub fn face_neighbors(&self, grid: &CubedSphere, p: usize, i: usize, j: usize) -> SmallVec<[(usize, usize, usize); 4]> {
        let b = grid.bounds;
        let mut out = SmallVec::new();
        let mut push = |cond: bool, own: (usize, usize), edge: Edge, k: usize| {
            if cond {
                out.push((p, own.0, own.1));
            } else if let Some(c) = self.across(grid, p, edge, k) {
                out.push(c);
            }
        };
        push(i > b.i0, (i.wrapping_sub(1), j), Edge::West, j - b.j0);
        push(i + 1 < b.iend, (i + 1, j), Edge::East, j - b.j0);
        push(j > b.j0, (i, j.wrapping_sub(1)), Edge::South, i - b.i0);
        push(j + 1 < b.jend, (i, j + 1), Edge::North, i - b.i0);
        out
    }
}

fn find_link(grid: &CubedSphere, p: usize, edge: Edge) -> Option<EdgeLink> {
    let (a0, a1) = edge_endpoints(grid, edge);
    let pa = grid.corners[(p, a0.0, a0.1)].xyz;
    let pb = grid.corners[(p, a1.0, a1.1)].xyz;
    let close = |u: [f64; 3], v: [f64; 3]| math::norm(math::sub(u, v)) < LINK_TOL;
    for q in (0..PANELS).filter(|&q| q != p) {
        for e in Edge::ALL {
            let (b0, b1) = edge_endpoints(grid, e);
            let qa = grid.corners[(q, b0.0, b0.1)].xyz;
            let qb = grid.corners[(q, b1.0, b1.1)].xyz;
            if close(pa, qa) && close(pb, qb) {
                return Some(EdgeLink { panel: q, edge: e, reversed: false });
            }
            if close(pa, qb) && close(pb, qa) {
                return Some(EdgeLink { panel: q, edge: e, reversed: true });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubesphere_geo::Projection;

    #[test]
    fn lagrange_weights_reproduce_cubics() {
        let (start, w) = lagrange_stencil(5.3, 3, 11);
        assert_eq!(start, 4);
        let f = |x: f64| 0.5 * x * x * x - x + 2.0;
        let v: f64 = w.iter().enumerate().map(|(a, wa)| wa * f((start + a) as f64)).sum();
        assert!((v - f(5.3)).abs() < 1e-10);
    }

    #[test]
    fn stencil_clamps_to_interior() {
        let (start, w) = lagrange_stencil(1.2, 3, 11);
        assert_eq!(start, 3);
        assert_eq!(w.len(), 4);
        let (start, w) = lagrange_stencil(2.0, 3, 5);
        assert_eq!((start, w.len()), (3, 2));
    }

    #[test]
    fn every_edge_is_linked_symmetrically() {
        let g = CubedSphere::new(5, Projection::Equiangular).unwrap();
        for p in 0..PANELS {
            for e in Edge::ALL {
                let l = g.halo.link(p, e).unwrap();
                let back = g.halo.link(l.panel, l.edge).unwrap();
                assert_eq!((back.panel, back.edge, back.reversed), (p, e, l.reversed));
            }
        }
    }

    #[test]
    fn every_interior_cell_has_four_neighbors() {
        let g = CubedSphere::new(4, Projection::Equidistant).unwrap();
        for (p, i, j) in g.interior_cells() {
            let nb = g.halo.face_neighbors(&g, p, i, j);
            assert_eq!(nb.len(), 4);
            for c in nb {
                assert!(g.bounds.contains(c.1, c.2));
            }
        }
    }
}
