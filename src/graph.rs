//! The materialized grid: nodes, undirected edges, and the format-dependent
//! connectivity and labeling tables built on top of them.

use enum_map::EnumMap;
use log::warn;
use petgraph::adj::IndexType;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::dimensions::Dimension;
use crate::point::{Direction, Point};
use crate::problem::Problem;
use crate::typed_ix::TypedIx;

/// Which ADC problem family a [`Graph`] was built for. This governs which
/// directions get edges and which derived tables (label pools, via/net
/// compatibility) get populated.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Format {
    /// Single layer (`D == 1`); never has vertical edges.
    Adc2015,
    /// Multiple layers joined only through via columns; no vertical edges.
    Adc2016,
    /// Multiple layers fully 6-connected; no vias.
    Adc2017,
}

impl Format {
    /// The format implied by a problem's shape, ignoring any caller override.
    pub fn guess(problem: &Problem) -> Format {
        if problem.dimension.depth == 1 {
            Format::Adc2015
        } else if problem.has_vias() {
            Format::Adc2016
        } else {
            Format::Adc2017
        }
    }

    fn has_vertical_edges(self) -> bool {
        matches!(self, Format::Adc2017)
    }
}

pub type NodeIx = TypedIx<Node, u32>;
pub type EdgeIx = TypedIx<Edge, u32>;

/// One grid cell. `slots` holds, per direction, the edge connecting to the
/// neighboring cell in that direction if one was created for this graph's
/// format.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeIx,
    pub point: Point,
    slots: EnumMap<Direction, Option<EdgeIx>>,
    pub terminal: Option<usize>,
    pub via: Option<usize>,
}

impl Node {
    pub fn edge(&self, dir: Direction) -> Option<EdgeIx> {
        self.slots[dir]
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn is_via(&self) -> bool {
        self.via.is_some()
    }
}

/// An undirected edge between two axis-adjacent nodes.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub id: EdgeIx,
    pub node1: NodeIx,
    pub node2: NodeIx,
}

impl Edge {
    pub fn other(&self, node: NodeIx) -> NodeIx {
        if node == self.node1 {
            self.node2
        } else if node == self.node2 {
            self.node1
        } else {
            panic!("node {node:?} is not an endpoint of edge {:?}", self.id)
        }
    }
}

/// Per-layer label-pool and via/net compatibility tables, populated only
/// for [`Format::Adc2016`] graphs.
#[derive(Debug, Clone, Default)]
pub struct Adc2016Tables {
    /// `net_id_list[z]`: net ids with a terminal on layer `z`, in label order.
    pub net_id_list: Vec<Vec<usize>>,
    /// `label_matrix[net_id][z]`: this net's label on layer `z`, or `None`
    /// if the net has no terminal there.
    pub label_matrix: Vec<Vec<Option<usize>>>,
    /// Max layer population; the number of distinct labels needed per layer.
    pub label_num: usize,
    /// Nets whose two terminals sit on different layers.
    pub multi_layer_nets: Vec<usize>,
    /// `via_net_list[via_id]`: multi-layer nets this via can bind.
    pub via_net_list: Vec<Vec<usize>>,
    /// `net_via_list[net_id]`: vias that can bind this net.
    pub net_via_list: Vec<Vec<usize>>,
}

/// The fully materialized, immutable grid graph for one problem.
#[derive(Debug, Clone)]
pub struct Graph {
    pub dimension: Dimension,
    pub format: Format,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    inner: UnGraph<(), (), u32>,
    pub terminal_pairs: Vec<(NodeIx, NodeIx)>,
    pub via_nodes: Vec<Vec<NodeIx>>,
    pub adc2016: Adc2016Tables,
}

impl Graph {
    /// Builds a graph from `problem`. If `format_override` is given but
    /// contradicts what the problem's shape requires (a 3D problem forced to
    /// `Adc2015`, or a problem with vias forced to `Adc2017`), the override is
    /// dropped in favor of the guessed format and a warning is logged — it is
    /// never silently honored, and it never causes a hard failure.
    pub fn build(problem: &Problem, format_override: Option<Format>) -> Graph {
        let guessed = Format::guess(problem);
        let format = match format_override {
            None => guessed,
            Some(Format::Adc2015) if problem.dimension.depth > 1 => {
                warn!(target: "nlink_solver::graph", "requested format Adc2015 contradicts depth > 1; falling back to {guessed:?}");
                guessed
            }
            Some(Format::Adc2017) if problem.has_vias() => {
                warn!(target: "nlink_solver::graph", "requested format Adc2017 contradicts presence of vias; falling back to {guessed:?}");
                guessed
            }
            Some(f) => f,
        };

        let dimension = problem.dimension;
        let mut inner = UnGraph::<(), (), u32>::default();
        let mut nodes: Vec<Node> = Vec::with_capacity(dimension.cell_count());
        for (i, point) in dimension.iter_within().enumerate() {
            inner.add_node(());
            nodes.push(Node {
                id: TypedIx::new(i),
                point,
                slots: EnumMap::default(),
                terminal: None,
                via: None,
            });
        }

        let mut edges = Vec::new();
        let mut add_edge = |nodes: &mut Vec<Node>,
                             inner: &mut UnGraph<(), (), u32>,
                             edges: &mut Vec<Edge>,
                             a: Point,
                             b: Point,
                             dir: Direction| {
            let ia = dimension.xyz_to_index(a).expect("a in bounds");
            let ib = dimension.xyz_to_index(b).expect("b in bounds");
            let na = nodes[ia].id;
            let nb = nodes[ib].id;
            inner.add_edge(NodeIndex::new(na.index()), NodeIndex::new(nb.index()), ());
            let edge_id: EdgeIx = TypedIx::new(edges.len());
            edges.push(Edge { id: edge_id, node1: na, node2: nb });
            nodes[ia].slots[dir] = Some(edge_id);
            nodes[ib].slots[dir.opposite()] = Some(edge_id);
        };

        for z in 0..dimension.depth as i32 {
            for y in 0..dimension.height as i32 {
                for x in 0..(dimension.width as i32 - 1) {
                    let a = Point::new(x, y, z);
                    let b = a.step(Direction::XPlus);
                    add_edge(&mut nodes, &mut inner, &mut edges, a, b, Direction::XPlus);
                }
            }
            for x in 0..dimension.width as i32 {
                for y in 0..(dimension.height as i32 - 1) {
                    let a = Point::new(x, y, z);
                    let b = a.step(Direction::YPlus);
                    add_edge(&mut nodes, &mut inner, &mut edges, a, b, Direction::YPlus);
                }
            }
        }

        if format.has_vertical_edges() {
            for x in 0..dimension.width as i32 {
                for y in 0..dimension.height as i32 {
                    for z in 0..(dimension.depth as i32 - 1) {
                        let a = Point::new(x, y, z);
                        let b = a.step(Direction::ZPlus);
                        add_edge(&mut nodes, &mut inner, &mut edges, a, b, Direction::ZPlus);
                    }
                }
            }
        }

        let mut terminal_pairs = Vec::with_capacity(problem.net_count());
        for net in problem.nets() {
            let i1 = dimension.xyz_to_index(net.start).expect("start in bounds");
            let i2 = dimension.xyz_to_index(net.end).expect("end in bounds");
            nodes[i1].terminal = Some(net.net_id);
            nodes[i2].terminal = Some(net.net_id);
            terminal_pairs.push((nodes[i1].id, nodes[i2].id));
        }

        let mut via_nodes = vec![Vec::new(); problem.via_count()];
        if matches!(format, Format::Adc2016) {
            for (via_id, via) in problem.vias().iter().enumerate() {
                for z in via.layer_span() {
                    let p = Point::new(via.x as i32, via.y as i32, z as i32);
                    let idx = dimension.xyz_to_index(p).expect("via cell in bounds");
                    nodes[idx].via = Some(via_id);
                    via_nodes[via_id].push(nodes[idx].id);
                }
            }
        }

        let adc2016 = if matches!(format, Format::Adc2016) {
            build_adc2016_tables(problem, &dimension)
        } else {
            Adc2016Tables::default()
        };

        Graph { dimension, format, nodes, edges, inner, terminal_pairs, via_nodes, adc2016 }
    }

    pub fn node(&self, id: NodeIx) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_at(&self, point: Point) -> Option<&Node> {
        self.dimension.xyz_to_index(point).map(|i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge(&self, id: EdgeIx) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges incident to `node`, in slot order (`x-, x+, y-, y+, z-, z+`).
    pub fn incident_edges(&self, node: NodeIx) -> impl Iterator<Item = EdgeIx> + '_ {
        Direction::ALL.into_iter().filter_map(move |dir| self.node(node).edge(dir))
    }

    /// The underlying undirected adjacency graph, for algorithms (e.g. the
    /// router's BFS) that want generic graph traversal instead of walking
    /// direction slots.
    pub fn adjacency(&self) -> &UnGraph<(), (), u32> {
        &self.inner
    }
}

fn build_adc2016_tables(problem: &Problem, dimension: &Dimension) -> Adc2016Tables {
    let depth = dimension.depth as usize;
    let net_num = problem.net_count();

    let mut net_id_list: Vec<Vec<usize>> = vec![Vec::new(); depth];
    let mut label_matrix: Vec<Vec<Option<usize>>> = vec![vec![None; depth]; net_num];
    let mut multi_layer_nets = Vec::new();

    for net in problem.nets() {
        let sz = net.start.z as usize;
        let ez = net.end.z as usize;
        net_id_list[sz].push(net.net_id);
        if sz != ez {
            multi_layer_nets.push(net.net_id);
            net_id_list[ez].push(net.net_id);
        }
    }

    let label_num = net_id_list.iter().map(Vec::len).max().unwrap_or(0);

    for (z, ids) in net_id_list.iter().enumerate() {
        for (label, &net_id) in ids.iter().enumerate() {
            label_matrix[net_id][z] = Some(label);
        }
    }

    let mut via_net_list = vec![Vec::new(); problem.via_count()];
    let mut net_via_list = vec![Vec::new(); net_num];
    for (via_id, via) in problem.vias().iter().enumerate() {
        for net in problem.nets() {
            let sz = net.start.z as u16;
            let ez = net.end.z as u16;
            if sz != ez && via.z1 <= sz && sz <= via.z2 && via.z1 <= ez && ez <= via.z2 {
                via_net_list[via_id].push(net.net_id);
                net_via_list[net.net_id].push(via_id);
            }
        }
    }

    Adc2016Tables { net_id_list, label_matrix, label_num, multi_layer_nets, via_net_list, net_via_list }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::via::Via;

    fn planar_problem() -> Problem {
        let mut p = Problem::new(Dimension::planar(3, 3));
        p.add_net("A", Point::new(0, 0, 0), Point::new(2, 2, 0));
        p
    }

    #[test]
    fn planar_format_is_guessed_without_vertical_edges() {
        let problem = planar_problem();
        let graph = Graph::build(&problem, None);
        assert_eq!(graph.format, Format::Adc2015);
        assert_eq!(graph.node_at(Point::new(0, 0, 0)).unwrap().terminal, Some(0));
    }

    #[test]
    fn contradicting_override_falls_back_to_guess() {
        let mut problem = Problem::new(Dimension::new(3, 3, 2));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(0, 0, 1));
        let graph = Graph::build(&problem, Some(Format::Adc2015));
        assert_eq!(graph.format, Format::Adc2017);
    }

    #[test]
    fn adc2017_has_vertical_edges_adc2016_does_not() {
        let mut with_via = Problem::new(Dimension::new(2, 2, 2));
        with_via.add_net("A", Point::new(0, 0, 0), Point::new(0, 0, 1));
        with_via.add_via(Via::new("V", 1, 1, 0, 1));
        let graph = Graph::build(&with_via, None);
        assert_eq!(graph.format, Format::Adc2016);
        assert!(graph.node_at(Point::new(0, 0, 0)).unwrap().edge(Direction::ZPlus).is_none());

        let mut no_via = Problem::new(Dimension::new(2, 2, 2));
        no_via.add_net("A", Point::new(0, 0, 0), Point::new(0, 0, 1));
        let graph = Graph::build(&no_via, None);
        assert_eq!(graph.format, Format::Adc2017);
        assert!(graph.node_at(Point::new(0, 0, 0)).unwrap().edge(Direction::ZPlus).is_some());
    }

    #[test]
    fn adc2016_label_pool_assigns_distinct_labels_per_layer() {
        let mut problem = Problem::new(Dimension::new(2, 2, 2));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(0, 0, 1));
        problem.add_net("B", Point::new(1, 0, 0), Point::new(1, 1, 0));
        problem.add_via(Via::new("V", 1, 1, 0, 1));
        let graph = Graph::build(&problem, None);
        assert_eq!(graph.adc2016.label_num, 2);
        assert_eq!(graph.adc2016.multi_layer_nets, vec![0]);
        assert_eq!(graph.adc2016.net_via_list[0], vec![0]);
    }
}
