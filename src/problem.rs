//! The in-memory puzzle instance produced by a problem-file parser.

use std::collections::HashMap;

use crate::dimensions::Dimension;
use crate::point::Point;
use crate::via::Via;

/// One net: a label shared by exactly two terminal cells. `net_id` is the
/// net's position in [`Problem`]'s ordered list; `start`/`end` carry no
/// ordering meaning (swapping them describes the same net).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Net {
    pub net_id: usize,
    pub label: String,
    pub start: Point,
    pub end: Point,
}

/// A fully-parsed puzzle instance: grid size, ordered nets, optional vias.
///
/// `Problem` itself does not validate coordinates against `dimension` or
/// reject duplicate labels — that is the parser's job, since the parser is
/// what can attach a source line number to the error (see `format::read`).
/// Callers building a `Problem` programmatically (e.g. in tests) get
/// `add_net`/`add_via` which at least refuse same-label duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub dimension: Dimension,
    nets: Vec<Net>,
    net_index: HashMap<String, usize>,
    vias: Vec<Via>,
    via_index: HashMap<String, usize>,
}

impl Problem {
    pub fn new(dimension: Dimension) -> Self {
        Problem {
            dimension,
            nets: Vec::new(),
            net_index: HashMap::new(),
            vias: Vec::new(),
            via_index: HashMap::new(),
        }
    }

    /// Appends a net, assigning it the next `net_id`. Returns `false` without
    /// modifying `self` if `label` is already in use.
    pub fn add_net(&mut self, label: impl Into<String>, start: Point, end: Point) -> bool {
        let label = label.into();
        if self.net_index.contains_key(&label) {
            return false;
        }
        let net_id = self.nets.len();
        self.net_index.insert(label.clone(), net_id);
        self.nets.push(Net { net_id, label, start, end });
        true
    }

    /// Adds a via, refusing a label collision the same way `add_net` does.
    pub fn add_via(&mut self, via: Via) -> bool {
        if self.via_index.contains_key(&via.label) {
            return false;
        }
        self.via_index.insert(via.label.clone(), self.vias.len());
        self.vias.push(via);
        true
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn net_by_label(&self, label: &str) -> Option<&Net> {
        self.net_index.get(label).map(|&id| &self.nets[id])
    }

    pub fn vias(&self) -> &[Via] {
        &self.vias
    }

    pub fn via_count(&self) -> usize {
        self.vias.len()
    }

    pub fn via_by_label(&self, label: &str) -> Option<&Via> {
        self.via_index.get(label).map(|&id| &self.vias[id])
    }

    pub fn has_vias(&self) -> bool {
        !self.vias.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_net_label_is_rejected() {
        let mut problem = Problem::new(Dimension::planar(5, 5));
        assert!(problem.add_net("A", Point::new(0, 0, 0), Point::new(4, 4, 0)));
        assert!(!problem.add_net("A", Point::new(1, 1, 0), Point::new(2, 2, 0)));
        assert_eq!(problem.net_count(), 1);
    }

    #[test]
    fn net_ids_follow_insertion_order() {
        let mut problem = Problem::new(Dimension::planar(5, 5));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(1, 0, 0));
        problem.add_net("B", Point::new(0, 1, 0), Point::new(1, 1, 0));
        assert_eq!(problem.net_by_label("A").unwrap().net_id, 0);
        assert_eq!(problem.net_by_label("B").unwrap().net_id, 1);
    }
}
