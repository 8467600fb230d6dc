//! Grid extents and the linear-index mapping used by per-layer label pools.

use serde::{Deserialize, Serialize};

use crate::point::{Point, PointTy};

pub type DimTy = u16;

/// The size of a (possibly multi-layer) grid: `width` columns by `height`
/// rows by `depth` layers. 2D problems (adc2015/adc2016) always have
/// `depth == 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Dimension {
    pub width: DimTy,
    pub height: DimTy,
    pub depth: DimTy,
}

impl Dimension {
    pub const fn new(width: DimTy, height: DimTy, depth: DimTy) -> Self {
        Dimension { width, height, depth }
    }

    pub const fn planar(width: DimTy, height: DimTy) -> Self {
        Dimension::new(width, height, 1)
    }

    pub const fn contains(self, point: Point) -> bool {
        point.x >= 0
            && point.x < self.width as PointTy
            && point.y >= 0
            && point.y < self.height as PointTy
            && point.z >= 0
            && point.z < self.depth as PointTy
    }

    pub const fn cell_count(self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Maps an in-bounds point to its linear index, `(z * height + y) * width + x`.
    ///
    /// This ordering matches the layer-major layout the original problem and
    /// solution file formats use, so per-layer label pools and solution grids
    /// can be built as flat `Vec`s indexed directly by it.
    pub const fn xyz_to_index(self, point: Point) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let idx = (point.z as usize * self.height as usize + point.y as usize)
            * self.width as usize
            + point.x as usize;
        Some(idx)
    }

    pub const fn index_to_point(self, index: usize) -> Option<Point> {
        if index >= self.cell_count() {
            return None;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let x = index % w;
        let y = (index / w) % h;
        let z = index / (w * h);
        Some(Point::new(x as PointTy, y as PointTy, z as PointTy))
    }

    /// Iterates every point within this volume in layer-major, row-major
    /// order: z outermost, then y, then x innermost.
    pub const fn iter_within(self) -> DimensionIter {
        DimensionIter::new(self)
    }
}

pub struct DimensionIter {
    dims: Dimension,
    current: Point,
}

impl DimensionIter {
    pub const fn new(dims: Dimension) -> Self {
        DimensionIter { dims, current: Point::new(0, 0, 0) }
    }
}

impl Iterator for DimensionIter {
    type Item = Point;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.z >= self.dims.depth as PointTy {
            return None;
        }
        let val = self.current;

        self.current.x += 1;
        if self.current.x >= self.dims.width as PointTy {
            self.current.x = 0;
            self.current.y += 1;
            if self.current.y >= self.dims.height as PointTy {
                self.current.y = 0;
                self.current.z += 1;
            }
        }

        Some(val)
    }
}

#[cfg(test)]
mod tests {
    use assertables::{assert_all, assert_len_eq_x};

    use super::*;

    #[test]
    fn iter_dims_covers_every_cell_once() {
        let dims = Dimension::new(7, 9, 3);
        let points = dims.iter_within().collect::<Vec<_>>();

        assert_len_eq_x!(points, 7 * 9 * 3);
        assert_all!(points.iter(), |p: &Point| dims.contains(*p));
    }

    #[test]
    fn index_round_trips_through_point() {
        let dims = Dimension::new(4, 5, 2);
        for idx in 0..dims.cell_count() {
            let point = dims.index_to_point(idx).unwrap();
            assert_eq!(dims.xyz_to_index(point), Some(idx));
        }
    }

    #[test]
    fn out_of_bounds_point_has_no_index() {
        let dims = Dimension::planar(3, 3);
        assert_eq!(dims.xyz_to_index(Point::new(3, 0, 0)), None);
        assert_eq!(dims.xyz_to_index(Point::new(0, 0, 1)), None);
        assert_eq!(dims.xyz_to_index(Point::new(-1, 0, 0)), None);
    }
}
