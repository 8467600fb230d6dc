//! Translates a [`Graph`] into a CNF instance characterizing its legal
//! routings, plus whichever optional shape-ban families an [`EncodingPlan`]
//! selects.
//!
//! Variable and clause emission order follows a fixed schedule (edge
//! variables by edge id, then per-node label vectors by node id, then
//! via-binding variables in `(net, via)` order, then optional `U[n]` by node
//! id; node constraints, then edge constraints, then via constraints, then
//! shape constraints) so that two runs against the same graph and plan
//! produce byte-identical CNF.

use std::collections::HashMap;

use rustsat::types::{Clause, Lit};

use crate::graph::{Edge, EdgeIx, Format, Graph, Node, NodeIx};
use crate::plan::{EncodingPlan, Slack};
use crate::point::Direction;
use crate::sat::{self, Instance};

/// Every SAT variable the encoder introduced, keyed the way the decoder
/// needs to read them back out of a model.
#[derive(Debug, Clone)]
pub struct Variables {
    pub edge_vars: Vec<Lit>,
    pub node_labels: Vec<Vec<Lit>>,
    pub node_uvar: Vec<Option<Lit>>,
    pub via_binding: HashMap<(usize, usize), Lit>,
    pub binary_encoding: bool,
}

impl Variables {
    pub fn edge_lit(&self, edge: EdgeIx) -> Lit {
        self.edge_vars[edge.index()]
    }

    pub fn label_vars(&self, node: NodeIx) -> &[Lit] {
        &self.node_labels[node.index()]
    }

    /// Decodes a node's label vector under a model's truth assignment.
    /// `None` means "no label assigned" — only possible for a slack node
    /// that turned out unused.
    pub fn decode_label(&self, lit_is_true: impl Fn(Lit) -> bool, node: NodeIx) -> Option<usize> {
        let bits = self.label_vars(node);
        if self.binary_encoding {
            let mut value = 0usize;
            for (i, &lit) in bits.iter().enumerate() {
                if lit_is_true(lit) {
                    value |= 1 << i;
                }
            }
            value.checked_sub(1)
        } else {
            bits.iter().position(|&lit| lit_is_true(lit))
        }
    }
}

fn bits_for_count(count: usize) -> usize {
    let mut bits = 1;
    while (1usize << bits) < count + 1 {
        bits += 1;
    }
    bits
}

fn fix_label(instance: &mut Instance, guard: &[Lit], label_vars: &[Lit], label: usize, binary: bool) {
    if binary {
        let value = label + 1;
        for (i, &lvar) in label_vars.iter().enumerate() {
            let lit = if (value >> i) & 1 == 1 { lvar } else { !lvar };
            sat::unit_guarded(instance, guard, lit);
        }
    } else {
        for (i, &lvar) in label_vars.iter().enumerate() {
            let lit = if i == label { lvar } else { !lvar };
            sat::unit_guarded(instance, guard, lit);
        }
    }
}

pub(crate) fn node_label(graph: &Graph, net_id: usize, z: usize) -> Option<usize> {
    match graph.format {
        Format::Adc2016 => graph.adc2016.label_matrix[net_id][z],
        _ => Some(net_id),
    }
}

/// Builds variables and emits the base connectivity constraints (§4.2.1,
/// §4.2.2) for `graph` under `plan`'s slack setting. Shape bans are applied
/// separately by [`apply_shape_bans`]. `binary_encoding` selects one-hot vs.
/// binary label vectors for the whole run; it is decided once by the
/// pipeline, not per plan.
pub fn encode_base(graph: &Graph, instance: &mut Instance, plan: &EncodingPlan, binary_encoding: bool) -> Variables {
    let edge_vars: Vec<Lit> = graph.edges().iter().map(|_| sat::new_lit(instance)).collect();

    let label_count =
        if graph.format == Format::Adc2016 { graph.adc2016.label_num } else { graph.terminal_pairs.len() };
    let label_len = if binary_encoding { bits_for_count(label_count) } else { label_count };
    let node_labels: Vec<Vec<Lit>> =
        graph.nodes().iter().map(|_| (0..label_len).map(|_| sat::new_lit(instance)).collect()).collect();

    let node_uvar: Vec<Option<Lit>> = graph
        .nodes()
        .iter()
        .map(|n| (plan.slack == Slack::WithUvar && !n.is_terminal() && !n.is_via()).then(|| sat::new_lit(instance)))
        .collect();

    let mut via_binding = HashMap::new();
    if graph.format == Format::Adc2016 {
        for net_id in &graph.adc2016.multi_layer_nets {
            for &via_id in &graph.adc2016.net_via_list[*net_id] {
                via_binding.insert((*net_id, via_id), sat::new_lit(instance));
            }
        }
    }

    let mut vars = Variables { edge_vars, node_labels, node_uvar, via_binding, binary_encoding };

    for node in graph.nodes() {
        make_edge_constraint(graph, instance, &vars, node, plan.slack);
    }
    for edge in graph.edges() {
        make_adjacency_constraint(instance, &vars, edge);
    }
    make_via_constraints(graph, instance, &mut vars);

    vars
}

fn make_via_constraints(graph: &Graph, instance: &mut Instance, vars: &mut Variables) {
    if graph.format != Format::Adc2016 {
        return;
    }
    for via_id in 0..graph.via_nodes.len() {
        let lits: Vec<Lit> =
            graph.adc2016.via_net_list[via_id].iter().map(|&net_id| vars.via_binding[&(net_id, via_id)]).collect();
        if !lits.is_empty() {
            sat::exactly_one(instance, &lits);
        }
    }
    // Reverse: a multi-layer net binds exactly one of the vias that could
    // carry it.
    for &net_id in &graph.adc2016.multi_layer_nets {
        let lits: Vec<Lit> =
            graph.adc2016.net_via_list[net_id].iter().map(|&via_id| vars.via_binding[&(net_id, via_id)]).collect();
        if !lits.is_empty() {
            sat::exactly_one(instance, &lits);
        }
    }
}

fn make_edge_constraint(graph: &Graph, instance: &mut Instance, vars: &Variables, node: &Node, slack: Slack) {
    let evars: Vec<Lit> = graph.incident_edges(node.id).map(|e| vars.edge_lit(e)).collect();

    if let Some(net_id) = node.terminal {
        sat::exactly_one(instance, &evars);
        let label = node_label(graph, net_id, node.point.z as usize).expect("terminal always has a label");
        fix_label(instance, &[], vars.label_vars(node.id), label, vars.binary_encoding);
        return;
    }

    if let Some(via_id) = node.via {
        for &net_id in &graph.adc2016.via_net_list[via_id] {
            let Some(label) = graph.adc2016.label_matrix[net_id][node.point.z as usize] else {
                continue;
            };
            let binding = vars.via_binding[&(net_id, via_id)];
            let guard = [!binding];
            let (t1, t2) = graph.terminal_pairs[net_id];
            let on_this_layer =
                graph.node(t1).point.z as usize == node.point.z as usize || graph.node(t2).point.z as usize == node.point.z as usize;
            if on_this_layer {
                sat::exactly_k_guarded(instance, &guard, &evars, 1);
                fix_label(instance, &guard, vars.label_vars(node.id), label, vars.binary_encoding);
            } else {
                for &evar in &evars {
                    sat::unit_guarded(instance, &guard, !evar);
                }
            }
        }
        return;
    }

    match slack {
        Slack::None => sat::exactly_two(instance, &evars),
        Slack::WithUvar => {
            let uvar = vars.node_uvar[node.id.index()].expect("ordinary node has a uvar");
            sat::at_most_two(instance, &evars);
            sat::at_least_k_guarded(instance, &[!uvar], &evars, 2);
            for &evar in &evars {
                instance.add_clause(Clause::from_iter([uvar, !evar]));
            }
        }
    }
}

fn make_adjacency_constraint(instance: &mut Instance, vars: &Variables, edge: &Edge) {
    let evar = vars.edge_lit(edge.id);
    let labels1 = vars.label_vars(edge.node1);
    let labels2 = vars.label_vars(edge.node2);
    for (&a, &b) in labels1.iter().zip(labels2.iter()) {
        sat::iff_guarded(instance, &[!evar], a, b);
    }
    if !vars.binary_encoding {
        // One-hot vectors can agree on zero bits while both are all-false;
        // the iff clauses above alone wouldn't forbid that, so also require
        // the selected edge's endpoints share at least one true label bit.
        for (&a, &b) in labels1.iter().zip(labels2.iter()) {
            instance.add_clause(Clause::from_iter([!evar, a, b]));
        }
    }
}

/// Enumerates the four edges bounding every axis-aligned unit square in
/// `graph`, across all three axis pairs (xy, xz, yz) for which the relevant
/// edges exist. Squares involving z only ever appear on graphs with
/// vertical edges.
fn unit_squares(graph: &Graph) -> impl Iterator<Item = [EdgeIx; 4]> + '_ {
    const PAIRS: [(Direction, Direction); 3] =
        [(Direction::XPlus, Direction::YPlus), (Direction::XPlus, Direction::ZPlus), (Direction::YPlus, Direction::ZPlus)];

    graph.nodes().iter().flat_map(move |node_00| {
        PAIRS.iter().filter_map(move |&(dir1, dir2)| {
            let edge1 = node_00.edge(dir1)?;
            let edge2 = node_00.edge(dir2)?;
            let node_10 = graph.node(graph.edge(edge1).other(node_00.id));
            let node_01 = graph.node(graph.edge(edge2).other(node_00.id));
            let edge3 = node_10.edge(dir2)?;
            let edge4 = node_01.edge(dir1)?;
            Some([edge1, edge2, edge3, edge4])
        })
    })
}

fn apply_ushape(graph: &Graph, instance: &mut Instance, vars: &Variables) {
    for square in unit_squares(graph) {
        let lits: Vec<Lit> = square.iter().map(|&e| vars.edge_lit(e)).collect();
        sat::at_most_two(instance, &lits);
    }
}

/// W-shape (2x3) and W2-shape (2x4): bans the two parallel cross edges of a
/// stretched U unless the far end has already escaped the ban (a terminal
/// sits at either end, or — on a graph with vertical edges — the interior
/// rail cell has both z-neighbors, giving it a vertical escape disjunct
/// instead of an unconditional ban).
fn apply_wshape(graph: &Graph, instance: &mut Instance, vars: &Variables) {
    for node in graph.nodes() {
        for span in [2, 3] {
            wshape_sub(graph, instance, vars, node, Direction::XPlus, Direction::YPlus, span);
            wshape_sub(graph, instance, vars, node, Direction::YPlus, Direction::XPlus, span);
        }
    }
}

fn wshape_sub(
    graph: &Graph,
    instance: &mut Instance,
    vars: &Variables,
    node_00: &Node,
    along: Direction,
    across: Direction,
    span: usize,
) {
    let Some(edge_v1) = node_00.edge(across) else { return };
    let mut rail = node_00.id;
    let mut h_edges = Vec::new();
    for _ in 0..span {
        let Some(e) = graph.node(rail).edge(along) else { return };
        h_edges.push(e);
        rail = graph.edge(e).other(rail);
    }
    let far_node = graph.node(rail);
    let Some(edge_v2) = far_node.edge(across) else { return };
    if node_00.is_terminal() || far_node.is_terminal() {
        return;
    }

    let node_01 = graph.node(graph.edge(edge_v1).other(node_00.id));
    let var1 = vars.edge_lit(edge_v1);
    let var4 = vars.edge_lit(edge_v2);
    let mut clause = vec![!var1, !var4];
    clause.extend(h_edges.iter().map(|&e| !vars.edge_lit(e)));

    // Walk the opposite rail (through node_01) to the interior cell that
    // would be detoured around.
    let mut interior = node_01.id;
    for _ in 1..span {
        let Some(e) = graph.node(interior).edge(along) else {
            instance.add_clause(Clause::from_iter(clause));
            return;
        };
        interior = graph.edge(e).other(interior);
    }
    let interior_node = graph.node(interior);
    if interior_node.is_terminal() || interior_node.is_via() {
        return;
    }
    if let (Some(z_down), Some(_)) = (interior_node.edge(Direction::ZMinus), interior_node.edge(Direction::ZPlus)) {
        clause.push(vars.edge_lit(z_down));
    }
    instance.add_clause(Clause::from_iter(clause));
}

/// L-shape: for a non-terminal interior cell, bans both of two perpendicular
/// edges being selected at once unless a single shared-net terminal is found
/// along one of the two axis rays or the 45-degree diagonal between them —
/// the bend would then just be that net routing around its own terminal.
fn apply_lshape(graph: &Graph, instance: &mut Instance, vars: &Variables) {
    let w = graph.dimension.width as i32;
    let h = graph.dimension.height as i32;
    for node in graph.nodes() {
        if node.is_terminal() {
            continue;
        }
        let p = node.point;
        if p.x == 0 || p.x == w - 1 || p.y == 0 || p.y == h - 1 {
            continue;
        }
        for &(dx, dy) in &[(-1, -1), (-1, 1), (1, -1), (1, 1)] {
            lshape_sub(graph, instance, vars, node, dx, dy);
        }
    }
}

fn lshape_sub(graph: &Graph, instance: &mut Instance, vars: &Variables, node_00: &Node, dx: i32, dy: i32) {
    let dir1 = if dx > 0 { Direction::XPlus } else { Direction::XMinus };
    let dir2 = if dy > 0 { Direction::YPlus } else { Direction::YMinus };
    let Some(edge1) = node_00.edge(dir1) else { return };
    let Some(edge2) = node_00.edge(dir2) else { return };

    let p0 = node_00.point;
    let w = graph.dimension.width as i32;
    let h = graph.dimension.height as i32;
    let rx = if dx > 0 { w - p0.x } else { p0.x + 1 };
    let ry = if dy > 0 { h - p0.y } else { p0.y + 1 };

    let ray_terminal = |dx: i32, dy: i32, steps: i32| {
        (1..steps).find_map(|i| {
            let pt = crate::point::Point::new(p0.x + i * dx, p0.y + i * dy, p0.z);
            graph.node_at(pt).and_then(|n| n.terminal)
        })
    };

    let x_terminal = ray_terminal(dx, 0, rx);
    let y_terminal = ray_terminal(0, dy, ry);
    if let (Some(a), Some(b)) = (x_terminal, y_terminal) {
        if a == b {
            return;
        }
    }

    let diag_steps = rx.min(ry);
    let diag_hits_terminal = (1..diag_steps).any(|i| {
        let pt = crate::point::Point::new(p0.x + i * dx, p0.y + i * dy, p0.z);
        graph.node_at(pt).is_some_and(|n| n.is_terminal())
    });
    if diag_hits_terminal {
        return;
    }

    let evar1 = vars.edge_lit(edge1);
    let evar2 = vars.edge_lit(edge2);
    instance.add_clause(Clause::from_iter([!evar1, !evar2]));
}

/// Y-shape: forbids a T-junction where both outer edges of a 1x2 strip are
/// selected without the corresponding interior cell either being unused (if
/// it carries a `U[n]` slack var) or itself selecting its escape edge.
fn apply_yshape(graph: &Graph, instance: &mut Instance, vars: &Variables) {
    for node in graph.nodes() {
        if node.is_terminal() {
            continue;
        }
        yshape_sub(graph, instance, vars, node, Direction::XMinus, Direction::XPlus, Direction::YMinus, Direction::YPlus);
        yshape_sub(graph, instance, vars, node, Direction::YMinus, Direction::YPlus, Direction::XMinus, Direction::XPlus);
    }
}

fn yshape_sub(
    graph: &Graph,
    instance: &mut Instance,
    vars: &Variables,
    node_10: &Node,
    dir1: Direction,
    dir1_rev: Direction,
    dir3: Direction,
    dir3_rev: Direction,
) {
    let Some(edge_11) = node_10.edge(dir3) else { return };
    let node_11 = graph.node(graph.edge(edge_11).other(node_10.id));
    if node_11.is_terminal() {
        return;
    }

    let Some(e00) = node_10.edge(dir1) else { return };
    let Some(e20) = node_10.edge(dir1_rev) else { return };
    let node_00 = graph.node(graph.edge(e00).other(node_10.id));
    let node_20 = graph.node(graph.edge(e20).other(node_10.id));

    let Some(edge1) = node_00.edge(dir3) else { return };
    let Some(edge2) = node_20.edge(dir3) else { return };
    let evar1 = vars.edge_lit(edge1);
    let evar2 = vars.edge_lit(edge2);

    if let Some(uvar0) = vars.node_uvar[node_10.id.index()] {
        match node_10.edge(dir3_rev) {
            None => instance.add_clause(Clause::from_iter([!evar1, !evar2, !uvar0])),
            Some(edge3) => {
                let evar3 = vars.edge_lit(edge3);
                instance.add_clause(Clause::from_iter([!evar1, !evar2, evar3]));
            }
        }
    }

    if let Some(uvar1) = vars.node_uvar[node_11.id.index()] {
        match node_11.edge(dir3) {
            None => instance.add_clause(Clause::from_iter([!evar1, !evar2, !uvar1])),
            Some(edge4) => {
                let evar4 = vars.edge_lit(edge4);
                instance.add_clause(Clause::from_iter([!evar1, !evar2, evar4]));
            }
        }
    }
}

/// Applies every shape-ban family `plan` selects. U-shape always runs;
/// W/W2-shape run unless `plan` restricts them to 2D and `graph` is 3D;
/// L-shape and Y-shape are each independently toggled.
pub fn apply_shape_bans(graph: &Graph, instance: &mut Instance, vars: &Variables, plan: &EncodingPlan) {
    apply_ushape(graph, instance, vars);
    if plan.w_shape_3d || graph.format != Format::Adc2017 {
        apply_wshape(graph, instance, vars);
    }
    if plan.l_shape {
        apply_lshape(graph, instance, vars);
    }
    if plan.y_shape {
        apply_yshape(graph, instance, vars);
    }
}

pub fn encode(graph: &Graph, instance: &mut Instance, plan: &EncodingPlan, binary_encoding: bool) -> Variables {
    let vars = encode_base(graph, instance, plan, binary_encoding);
    apply_shape_bans(graph, instance, &vars, plan);
    vars
}

#[cfg(test)]
mod tests {
    use rustsat::instances::SatInstance;
    use rustsat::solvers::{Solve, SolverResult};
    use rustsat::types::{Assignment, TernaryVal};
    use rustsat_glucose::simp::Glucose as GlucoseSimp;

    use super::*;
    use crate::dimensions::Dimension;
    use crate::plan::{PLAN_A, PLAN_B11};
    use crate::point::Point;
    use crate::problem::Problem;
    use crate::via::Via;

    fn solve(instance: Instance) -> Option<Assignment> {
        let (cnf, _) = instance.into_cnf();
        let mut solver = GlucoseSimp::default();
        solver.add_cnf(cnf).unwrap();
        match solver.solve().unwrap() {
            SolverResult::Sat => Some(solver.full_solution().unwrap()),
            _ => None,
        }
    }

    #[test]
    fn single_net_single_row_is_satisfiable_under_plan_a() {
        let mut problem = Problem::new(Dimension::planar(3, 1));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(2, 0, 0));
        let graph = Graph::build(&problem, None);
        let mut instance: Instance = SatInstance::new();
        let vars = encode(&graph, &mut instance, &PLAN_A, false);
        let assignment = solve(instance).expect("satisfiable");
        let is_true = |l: Lit| assignment.lit_value(l) == TernaryVal::True;
        let selected = graph.edges().iter().filter(|e| is_true(vars.edge_lit(e.id))).count();
        assert_eq!(selected, 2);
    }

    #[test]
    fn two_by_two_grid_admits_a_route_under_b11() {
        let mut problem = Problem::new(Dimension::planar(2, 2));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(1, 1, 0));
        let graph = Graph::build(&problem, None);
        let mut instance: Instance = SatInstance::new();
        let _vars = encode(&graph, &mut instance, &PLAN_B11, false);
        assert!(solve(instance).is_some());
    }

    #[test]
    fn via_binding_picks_exactly_one_candidate_net() {
        let mut problem = Problem::new(Dimension::new(2, 1, 2));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(0, 0, 1));
        problem.add_via(Via::new("V", 1, 0, 0, 1));
        let graph = Graph::build(&problem, None);
        assert_eq!(graph.format, Format::Adc2016);
        let mut instance: Instance = SatInstance::new();
        let vars = encode_base(&graph, &mut instance, &PLAN_A, false);
        let assignment = solve(instance).expect("satisfiable");
        let is_true = |l: Lit| assignment.lit_value(l) == TernaryVal::True;
        let bound = vars.via_binding.values().filter(|&&l| is_true(l)).count();
        assert_eq!(bound, 1);
    }
}
