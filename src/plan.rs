//! The cascade of encoding plans the pipeline tries in order.

use crate::graph::Format;

/// Whether "node-used" slack variables are present, and if so whether
/// ordinary nodes get a `U[n]` variable or are governed by a plain
/// `not_one` constraint instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Slack {
    /// Every non-terminal node always uses exactly two edges.
    None,
    /// Each non-terminal node has a `U[n]` variable gating whether it is used.
    WithUvar,
}

/// Which optional shape-ban families a plan applies. U-shape and W/W2-shape
/// are always on; L-shape and Y-shape are each independently toggled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EncodingPlan {
    pub name: &'static str,
    pub slack: Slack,
    pub l_shape: bool,
    pub y_shape: bool,
    /// Whether the W/W2-shape bans apply on a 3D (adc2017) graph. Every plan
    /// applies them on a 2D graph; only plan `A` restricts them to 2D.
    pub w_shape_3d: bool,
}

pub const PLAN_A: EncodingPlan =
    EncodingPlan { name: "A", slack: Slack::None, l_shape: false, y_shape: false, w_shape_3d: false };
pub const PLAN_B11: EncodingPlan =
    EncodingPlan { name: "B11", slack: Slack::WithUvar, l_shape: true, y_shape: true, w_shape_3d: true };
pub const PLAN_B10: EncodingPlan =
    EncodingPlan { name: "B10", slack: Slack::WithUvar, l_shape: true, y_shape: false, w_shape_3d: true };
pub const PLAN_B01: EncodingPlan =
    EncodingPlan { name: "B01", slack: Slack::WithUvar, l_shape: false, y_shape: true, w_shape_3d: true };
pub const PLAN_C: EncodingPlan =
    EncodingPlan { name: "C", slack: Slack::WithUvar, l_shape: false, y_shape: false, w_shape_3d: true };

/// The plans attempted, in order, for a graph of the given format.
///
/// 2D and adc2016 problems get the full cascade; adc2017 (3D, fully
/// 6-connected) only tries `A` and `C` by default — the extra shape bans
/// cost more to encode there than they save in search, per the original
/// tuning this crate inherited.
pub fn cascade_for(format: Format) -> &'static [EncodingPlan] {
    match format {
        Format::Adc2017 => &[PLAN_A, PLAN_C],
        Format::Adc2015 | Format::Adc2016 => &[PLAN_A, PLAN_B11, PLAN_B10, PLAN_B01, PLAN_C],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc2017_only_tries_a_and_c() {
        let plans = cascade_for(Format::Adc2017);
        assert_eq!(plans.iter().map(|p| p.name).collect::<Vec<_>>(), vec!["A", "C"]);
    }

    #[test]
    fn planar_tries_full_cascade() {
        let plans = cascade_for(Format::Adc2015);
        assert_eq!(plans.len(), 5);
    }
}
