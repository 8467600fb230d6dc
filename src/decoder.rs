//! Recovers net routes from a satisfying assignment.

use rustsat::types::{Assignment, Lit, TernaryVal};

use crate::encoder::{Variables, node_label};
use crate::graph::{Graph, NodeIx};
use crate::point::Point;

/// One net's selected path, as the sequence of grid points it visits,
/// start terminal to end terminal inclusive. A via crossing contributes
/// every intermediate layer's point even though no edge was selected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub net_id: usize,
    pub points: Vec<Point>,
}

fn is_true(assignment: &Assignment, lit: Lit) -> bool {
    assignment.lit_value(lit) == TernaryVal::True
}

/// Walks every net's model-selected edges from its start terminal to its end
/// terminal. Refuses to step back onto the node just visited, so a node
/// wrongly left with degree > 2 in the model cannot turn the walk into a
/// cycle.
pub fn decode_routes(graph: &Graph, vars: &Variables, assignment: &Assignment) -> Vec<Route> {
    graph
        .terminal_pairs
        .iter()
        .enumerate()
        .map(|(net_id, &(start, end))| Route { net_id, points: walk_net(graph, vars, assignment, net_id, start, end) })
        .collect()
}

/// Checks that `node`'s decoded label vector agrees with the label
/// `net_id` is supposed to carry at `node`'s layer. The encoder's clauses
/// are supposed to make a mismatch unreachable in any satisfying model;
/// this only catches a model the encoder's own invariants failed to pin
/// down, so it stays a debug assertion rather than a user-facing error.
fn check_label(graph: &Graph, vars: &Variables, assignment: &Assignment, net_id: usize, node: NodeIx) {
    let z = graph.node(node).point.z as usize;
    let expected = node_label(graph, net_id, z);
    let decoded = vars.decode_label(|lit| is_true(assignment, lit), node);
    debug_assert_eq!(
        decoded, expected,
        "net {net_id}'s route visits node {node:?} whose decoded label ({decoded:?}) disagrees with its expected label ({expected:?})"
    );
}

fn walk_net(graph: &Graph, vars: &Variables, assignment: &Assignment, net_id: usize, start: NodeIx, end: NodeIx) -> Vec<Point> {
    let mut points = vec![graph.node(start).point];
    let mut prev: Option<NodeIx> = None;
    let mut current = start;
    check_label(graph, vars, assignment, net_id, current);

    while current != end {
        let target_z = graph.node(end).point.z;
        if graph.node(current).point.z != target_z {
            if let Some(via_id) = graph.node(current).via {
                if let Some(&binding) = vars.via_binding.get(&(net_id, via_id)) {
                    if is_true(assignment, binding) {
                        let (next, mut jumped_points) = cross_via(graph, via_id, current, target_z);
                        points.append(&mut jumped_points);
                        prev = Some(current);
                        current = next;
                        check_label(graph, vars, assignment, net_id, current);
                        continue;
                    }
                }
            }
        }

        let edge = graph
            .incident_edges(current)
            .find(|&e| is_true(assignment, vars.edge_lit(e)) && Some(graph.edge(e).other(current)) != prev)
            .expect("a satisfying model always continues a non-terminal node's route");
        let next = graph.edge(edge).other(current);
        prev = Some(current);
        current = next;
        points.push(graph.node(current).point);
        check_label(graph, vars, assignment, net_id, current);
    }

    points
}

/// Given a via column and the node on it the walk currently sits at, finds
/// the column's node on `target_z` and returns it along with every point on
/// the column strictly between the two (in visiting order), since no edges
/// exist there to otherwise record the crossing.
fn cross_via(graph: &Graph, via_id: usize, current: NodeIx, target_z: crate::point::PointTy) -> (NodeIx, Vec<Point>) {
    let column = &graph.via_nodes[via_id];
    let exit = *column
        .iter()
        .find(|&&n| graph.node(n).point.z == target_z)
        .expect("a via bound to a net spans that net's other terminal layer");

    let p0 = graph.node(current).point;
    let step: crate::point::PointTy = if target_z > p0.z { 1 } else { -1 };
    let mut points = Vec::new();
    let mut z = p0.z;
    while z != target_z {
        z += step;
        points.push(Point::new(p0.x, p0.y, z));
    }
    (exit, points)
}

#[cfg(test)]
mod tests {
    use rustsat::instances::SatInstance;
    use rustsat::solvers::{Solve, SolverResult};
    use rustsat_glucose::simp::Glucose as GlucoseSimp;

    use super::*;
    use crate::dimensions::Dimension;
    use crate::encoder::encode;
    use crate::plan::PLAN_A;
    use crate::problem::Problem;

    #[test]
    fn straight_row_decodes_to_terminal_to_terminal_path() {
        let mut problem = Problem::new(Dimension::planar(3, 1));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(2, 0, 0));
        let graph = Graph::build(&problem, None);
        let mut instance = SatInstance::new();
        let vars = encode(&graph, &mut instance, &PLAN_A, false);
        let (cnf, _) = instance.into_cnf();
        let mut solver = GlucoseSimp::default();
        solver.add_cnf(cnf).unwrap();
        assert_eq!(solver.solve().unwrap(), SolverResult::Sat);
        let assignment = solver.full_solution().unwrap();

        let routes = decode_routes(&graph, &vars, &assignment);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].points.first(), Some(&Point::new(0, 0, 0)));
        assert_eq!(routes[0].points.last(), Some(&Point::new(2, 0, 0)));
    }
}
