//! Post-decode rerouting: replaces each net's path with a shortest,
//! least-bent path through the graph's real edges, treating every other
//! net's current path as a fixed obstacle, repeated until a full pass
//! improves neither total length nor total bend count.

use std::collections::VecDeque;

use enum_map::EnumMap;

use crate::decoder::Route;
use crate::graph::{Graph, NodeIx};
use crate::point::{Direction, Point};

/// A bend exists at `b` when two or more axes differ across `a -> b -> c`.
pub fn check_bend(a: Point, b: Point, c: Point) -> bool {
    a.differing_axes(b).union(b.differing_axes(c)).count() >= 2
}

fn route_metrics(route: &Route) -> (usize, usize) {
    let pts = &route.points;
    if pts.len() < 2 {
        return (0, 0);
    }
    let interior = &pts[1..pts.len() - 1];
    let length = interior.len();
    let mut bends = 0;
    if !interior.is_empty() {
        let mut prev2 = pts[0];
        let mut prev1 = interior[0];
        for &point in &interior[1..] {
            if check_bend(prev2, prev1, point) {
                bends += 1;
            }
            prev2 = prev1;
            prev1 = point;
        }
        if check_bend(prev2, prev1, *pts.last().unwrap()) {
            bends += 1;
        }
    }
    (length, bends)
}

fn total_metrics(routes: &[Route]) -> (usize, usize) {
    routes.iter().map(route_metrics).fold((0, 0), |(al, ab), (l, b)| (al + l, ab + b))
}

#[derive(Debug, Clone, Copy)]
pub struct RerouteStats {
    pub total_length: usize,
    pub total_bends: usize,
    pub passes: usize,
}

/// Reroutes every net in turn, repeating full passes until one leaves total
/// length and total bend count unimproved. Operates only over `graph`'s
/// materialized edges — a route segment that crossed a via with no real
/// edge (see [`crate::decoder::cross_via`]) is left untouched by rerouting,
/// since there is no alternative edge to route it through.
pub fn reroute_until_stable(graph: &Graph, routes: &mut [Route]) -> RerouteStats {
    let (mut length, mut bends) = total_metrics(routes);
    let mut passes = 0;
    loop {
        let (prev_length, prev_bends) = (length, bends);
        for net_id in 0..routes.len() {
            reroute_one(graph, routes, net_id);
        }
        passes += 1;
        (length, bends) = total_metrics(routes);
        if length >= prev_length && bends >= prev_bends {
            break;
        }
    }
    RerouteStats { total_length: length, total_bends: bends, passes }
}

struct BacktraceEdge {
    to: NodeIx,
    bend_num: i32,
    next: Option<usize>,
}

fn reroute_one(graph: &Graph, routes: &mut [Route], net_id: usize) {
    let n = graph.nodes().len();
    let mut label = vec![0i32; n];
    for (i, route) in routes.iter().enumerate() {
        if i == net_id {
            continue;
        }
        for &p in &route.points {
            if let Some(node) = graph.node_at(p) {
                label[node.id.index()] = -1;
            }
        }
    }

    let route = &routes[net_id];
    let Some(&start_point) = route.points.first() else { return };
    let Some(&end_point) = route.points.last() else { return };
    let start = graph.node_at(start_point).expect("route start is a graph cell").id;
    let end = graph.node_at(end_point).expect("route end is a graph cell").id;
    if start == end {
        return;
    }

    label[start.index()] = 1;
    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(cell) = queue.pop_front() {
        if cell == end {
            break;
        }
        for dir in Direction::ALL {
            let Some(edge) = graph.node(cell).edge(dir) else { continue };
            let neighbor = graph.edge(edge).other(cell);
            if label[neighbor.index()] == 0 {
                label[neighbor.index()] = label[cell.index()] + 1;
                queue.push_back(neighbor);
            }
        }
    }
    if label[end.index()] == 0 {
        // No path avoiding the other nets' current cells; leave this net's
        // route as-is rather than failing the whole pass.
        return;
    }

    let mut edges: Vec<BacktraceEdge> = Vec::new();
    let mut backtrace: Vec<EnumMap<Direction, Option<usize>>> = vec![EnumMap::default(); n];
    let mut mark = vec![false; n];
    mark[end.index()] = true;
    let mut queue = VecDeque::new();
    queue.push_back(end);
    while let Some(cell) = queue.pop_front() {
        if cell == start {
            break;
        }
        let label_here = label[cell.index()];
        for dir in Direction::ALL {
            let Some(edge) = graph.node(cell).edge(dir) else { continue };
            let neighbor = graph.edge(edge).other(cell);
            if label[neighbor.index()] != label_here - 1 {
                continue;
            }
            let (min_b, min_edge) = if cell == end {
                (0, None)
            } else {
                let mut min_b = -1i32;
                let mut min_edge = None;
                for d in Direction::ALL {
                    let Some(arena_idx) = backtrace[cell.index()][d] else { continue };
                    let mut b = edges[arena_idx].bend_num;
                    let cell2 = edges[arena_idx].to;
                    if check_bend(graph.node(neighbor).point, graph.node(cell).point, graph.node(cell2).point) {
                        b += 1;
                    }
                    if min_b == -1 || min_b > b {
                        min_b = b;
                        min_edge = Some(arena_idx);
                    }
                }
                (min_b, min_edge)
            };
            let new_idx = edges.len();
            edges.push(BacktraceEdge { to: cell, bend_num: min_b, next: min_edge });
            backtrace[neighbor.index()][dir.opposite()] = Some(new_idx);
            if !mark[neighbor.index()] {
                mark[neighbor.index()] = true;
                queue.push_back(neighbor);
            }
        }
    }

    let mut min_b = -1i32;
    let mut min_edge = None;
    for d in Direction::ALL {
        let Some(arena_idx) = backtrace[start.index()][d] else { continue };
        let b = edges[arena_idx].bend_num;
        if min_b == -1 || min_b > b {
            min_b = b;
            min_edge = Some(arena_idx);
        }
    }
    let Some(mut current) = min_edge else { return };

    let mut points = vec![start_point];
    loop {
        let cell = edges[current].to;
        if cell == end {
            break;
        }
        points.push(graph.node(cell).point);
        current = edges[current].next.expect("backtrace chain reaches the end cell");
    }
    points.push(end_point);

    routes[net_id].points = points;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_bend_flags_any_two_simultaneously_changing_axes() {
        assert!(!check_bend(Point::new(0, 0, 0), Point::new(1, 0, 0), Point::new(2, 0, 0)));
        assert!(check_bend(Point::new(0, 0, 0), Point::new(1, 0, 0), Point::new(1, 1, 0)));
    }

    #[test]
    fn reroute_leaves_an_already_shortest_path_unchanged() {
        use crate::dimensions::Dimension;
        use crate::problem::Problem;

        let mut problem = Problem::new(Dimension::planar(3, 1));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(2, 0, 0));
        let graph = Graph::build(&problem, None);
        let mut routes =
            vec![Route { net_id: 0, points: vec![Point::new(0, 0, 0), Point::new(1, 0, 0), Point::new(2, 0, 0)] }];
        let stats = reroute_until_stable(&graph, &mut routes);
        assert_eq!(stats.total_length, 1);
        assert_eq!(routes[0].points, vec![Point::new(0, 0, 0), Point::new(1, 0, 0), Point::new(2, 0, 0)]);
    }
}
