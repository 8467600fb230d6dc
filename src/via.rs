//! Inter-layer vias (ADC2016/ADC2017 problems only).

use serde::{Deserialize, Serialize};

use crate::dimensions::DimTy;

/// A vertical conduit at `(x, y)` spanning layers `z1..=z2`, identified by
/// `label`. A via occupies one node on every layer in its span and lets a
/// single net pass straight through all of them as if they were one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Via {
    pub label: String,
    pub x: DimTy,
    pub y: DimTy,
    pub z1: DimTy,
    pub z2: DimTy,
}

impl Via {
    /// Builds a via, normalizing `z1`/`z2` so `z1 <= z2` always holds
    /// afterwards regardless of input order.
    pub fn new(label: impl Into<String>, x: DimTy, y: DimTy, z1: DimTy, z2: DimTy) -> Self {
        let (z1, z2) = if z1 <= z2 { (z1, z2) } else { (z2, z1) };
        Via { label: label.into(), x, y, z1, z2 }
    }

    pub fn layer_span(&self) -> std::ops::RangeInclusive<DimTy> {
        self.z1..=self.z2
    }

    pub fn layer_count(&self) -> usize {
        (self.z2 - self.z1) as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_reversed_span() {
        let via = Via::new("A", 1, 2, 5, 2);
        assert_eq!(via.z1, 2);
        assert_eq!(via.z2, 5);
        assert_eq!(via.layer_count(), 4);
    }
}
