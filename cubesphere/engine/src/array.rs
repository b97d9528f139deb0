//! Dense `(panel, i, j)` arena storage shared by geometry and field arrays.

use std::ops::{Index, IndexMut};

use cubesphere_geo::PANELS;

/// Six panels of `ni × nj` values, stored panel-major then row-major (`i` fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct PanelArray<T> {
    ni: usize,
    nj: usize,
    data: Vec<T>,
}

impl<T: Clone> PanelArray<T> {
    /// Array with every entry set to `value`.
    pub fn filled(ni: usize, nj: usize, value: T) -> Self {
        Self { ni, nj, data: vec![value; PANELS * ni * nj] }
    }
}

impl<T> PanelArray<T> {
    /// Wrap an existing buffer; `None` if its length does not match the shape.
    pub fn from_vec(ni: usize, nj: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == PANELS * ni * nj).then_some(Self { ni, nj, data })
    }

    /// Build by evaluating `f(panel, i, j)` at every entry.
    pub fn from_fn(ni: usize, nj: usize, mut f: impl FnMut(usize, usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(PANELS * ni * nj);
        for p in 0..PANELS {
            for j in 0..nj {
                for i in 0..ni {
                    data.push(f(p, i, j));
                }
            }
        }
        Self { ni, nj, data }
    }

    /// Extent along `i`.
    #[inline]
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// Extent along `j`.
    #[inline]
    pub fn nj(&self) -> usize {
        self.nj
    }

    /// Flat offset of `(panel, i, j)`.
    #[inline]
    pub fn offset(&self, p: usize, i: usize, j: usize) -> usize {
        (p * self.nj + j) * self.ni + i
    }

    /// Flat view of all entries.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat view of all entries.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Index<(usize, usize, usize)> for PanelArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, (p, i, j): (usize, usize, usize)) -> &T {
        &self.data[self.offset(p, i, j)]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for PanelArray<T> {
    #[inline]
    fn index_mut(&mut self, (p, i, j): (usize, usize, usize)) -> &mut T {
        let k = self.offset(p, i, j);
        &mut self.data[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_panel_major() {
        let a = PanelArray::from_fn(3, 2, |p, i, j| p * 100 + j * 10 + i);
        assert_eq!(a[(0, 2, 1)], 12);
        assert_eq!(a[(5, 0, 1)], 510);
        assert_eq!(a.as_slice().len(), 36);
        assert!(PanelArray::from_vec(3, 2, vec![0u8; 35]).is_none());
    }
}
