//! Runs the encode-then-solve cascade across a format's candidate plans in
//! order, returning the first plan that is satisfiable.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_stream::stream;
use futures::Stream;
use log::{error, info};
use rustsat::instances::{BasicVarManager, ManageVars, SatInstance};
use rustsat::solvers::{Interrupt, InterruptSolver, Solve, SolverResult};
use rustsat::types::Assignment;
use rustsat_glucose::simp::Glucose as GlucoseSimp;
use thiserror::Error;

use crate::decoder::{Route, decode_routes};
use crate::encoder::{Variables, encode};
use crate::graph::Graph;
use crate::plan::{EncodingPlan, cascade_for};
use crate::router::{RerouteStats, reroute_until_stable};
use crate::solver_runner::run_solver;

pub type InterrupterContainer = Arc<Mutex<Option<Box<dyn InterruptSolver + Send>>>>;

/// Why the cascade stopped without a plan ever reaching `Sat`. Not an error:
/// no candidate plan's formula was satisfiable, or the caller interrupted
/// the run, and either is a legitimate outcome for the caller to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Every plan in the format's cascade came back UNSAT.
    Unsat,
    /// The solve was interrupted (e.g. Ctrl-C) before a plan finished.
    Interrupted,
    /// Every plan in the cascade would have exceeded `--var-limit` and was
    /// skipped before ever being handed to the solver.
    VarLimitExceeded,
}

/// What running the full plan cascade against one graph produced.
#[derive(Debug)]
pub enum PipelineOutcome {
    Sat(PipelineResult),
    Abort(AbortReason),
}

#[derive(Debug)]
pub struct PipelineResult {
    pub plan_name: &'static str,
    pub routes: Vec<Route>,
    pub reroute_stats: RerouteStats,
}

/// A genuine bug: something the pipeline's own invariants promised couldn't
/// happen. Never raised for UNSAT or an interrupt — those are
/// [`PipelineOutcome::Abort`] values, not errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A satisfying model decoded to a route that does not actually connect
    /// its net's two terminals — the encoder's clauses are supposed to make
    /// this unreachable.
    #[error("plan {plan_name}: net {net_id}'s decoded route does not close between its terminals")]
    RouteNotClosed { plan_name: &'static str, net_id: usize },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Decodes a satisfying assignment into routes, checks each one actually
/// closes between its net's terminals, and reroutes to a local optimum.
/// Shared by the synchronous and streaming entry points below.
fn finish_sat(
    graph: &Graph,
    plan: &EncodingPlan,
    vars: &Variables,
    assignment: &Assignment,
) -> Result<PipelineResult, PipelineError> {
    let mut routes = decode_routes(graph, vars, assignment);
    for route in &routes {
        let (start, end) = graph.terminal_pairs[route.net_id];
        let closes = route.points.first() == Some(&graph.node(start).point)
            && route.points.last() == Some(&graph.node(end).point);
        if !closes {
            error!(
                target: "nlink_solver::pipeline",
                "plan {}: net {} decoded route does not close between its terminals",
                plan.name, route.net_id
            );
            return Err(PipelineError::RouteNotClosed { plan_name: plan.name, net_id: route.net_id });
        }
    }
    let reroute_stats = reroute_until_stable(graph, &mut routes);
    info!(
        target: "nlink_solver::pipeline",
        "plan {} satisfiable; rerouted to length {} bends {} in {} passes",
        plan.name, reroute_stats.total_length, reroute_stats.total_bends, reroute_stats.passes
    );
    Ok(PipelineResult { plan_name: plan.name, routes, reroute_stats })
}

/// A step reported while the cascade runs, for callers (the verbose CLI
/// path) that want per-plan progress instead of waiting silently for the
/// whole cascade to finish. `Done` is always the stream's last item.
#[derive(Debug)]
pub enum PlanEvent {
    Trying { plan_name: &'static str },
    VarLimitSkip { plan_name: &'static str, used: u32, limit: u32 },
    Unsat { plan_name: &'static str },
    Done(Result<PipelineOutcome, PipelineError>),
}

/// Same cascade as [`run`], reported as a stream of [`PlanEvent`]s instead
/// of returned all at once. Each plan's solve still runs on a blocking
/// thread (via [`run_solver`]) so the stream can be polled, and therefore
/// interrupted, while the solver is working.
pub fn run_stream<'g>(
    graph: &'g Graph,
    binary_encoding: bool,
    var_limit: Option<u32>,
    interrupter: InterrupterContainer,
) -> impl Stream<Item = PlanEvent> + 'g {
    stream! {
        let mut any_attempted = false;
        for plan in cascade_for(graph.format) {
            yield PlanEvent::Trying { plan_name: plan.name };
            let mut instance: SatInstance<BasicVarManager> = SatInstance::new();
            let vars = encode(graph, &mut instance, plan, binary_encoding);

            if let Some(limit) = var_limit {
                let used = instance.var_manager().n_used();
                if used > limit {
                    yield PlanEvent::VarLimitSkip { plan_name: plan.name, used, limit };
                    continue;
                }
            }
            any_attempted = true;
            let (cnf, _) = instance.into_cnf();

            let (solver_future, sub_interrupter) = match run_solver(GlucoseSimp::default(), cnf) {
                Ok(pair) => pair,
                Err(err) => {
                    yield PlanEvent::Done(Err(PipelineError::Other(err)));
                    return;
                }
            };
            *interrupter.lock().expect("mutex poisoned") = Some(Box::new(sub_interrupter));

            let (result, solver) = match solver_future.future().await {
                Ok(pair) => pair,
                Err(err) => {
                    yield PlanEvent::Done(Err(PipelineError::Other(err)));
                    return;
                }
            };

            match result {
                SolverResult::Sat => {
                    let assignment = match solver.full_solution().context("failed to get full solution") {
                        Ok(a) => a,
                        Err(err) => {
                            yield PlanEvent::Done(Err(PipelineError::Other(err)));
                            return;
                        }
                    };
                    yield PlanEvent::Done(finish_sat(graph, plan, &vars, &assignment).map(PipelineOutcome::Sat));
                    return;
                }
                SolverResult::Unsat => {
                    yield PlanEvent::Unsat { plan_name: plan.name };
                }
                SolverResult::Interrupted => {
                    yield PlanEvent::Done(Ok(PipelineOutcome::Abort(AbortReason::Interrupted)));
                    return;
                }
            }
        }
        let outcome = if any_attempted { AbortReason::Unsat } else { AbortReason::VarLimitExceeded };
        yield PlanEvent::Done(Ok(PipelineOutcome::Abort(outcome)));
    }
}

/// Tries every plan `graph.format`'s cascade names, in order, stopping at
/// the first satisfiable one. A plan coming back UNSAT moves on to the
/// next; a plan whose variable count would exceed `var_limit` is skipped
/// without ever reaching the solver; an interrupt (e.g. Ctrl-C) aborts the
/// whole cascade immediately rather than continuing to the next plan. All
/// three are reported as [`PipelineOutcome::Abort`] values, never as an
/// `Err` — `Err` is reserved for inconsistencies that indicate a bug in
/// this crate.
pub fn run(
    graph: &Graph,
    binary_encoding: bool,
    var_limit: Option<u32>,
    interrupter: InterrupterContainer,
) -> Result<PipelineOutcome, PipelineError> {
    let mut any_attempted = false;
    for plan in cascade_for(graph.format) {
        info!(target: "nlink_solver::pipeline", "trying plan {}", plan.name);
        let mut instance: SatInstance<BasicVarManager> = SatInstance::new();
        let vars = encode(graph, &mut instance, plan, binary_encoding);

        if let Some(limit) = var_limit {
            let used = instance.var_manager().n_used();
            if used > limit {
                info!(
                    target: "nlink_solver::pipeline",
                    "plan {} would use {} variables, over the limit of {}; skipping",
                    plan.name, used, limit
                );
                continue;
            }
        }
        any_attempted = true;
        let (cnf, _) = instance.into_cnf();

        let mut solver = GlucoseSimp::default();
        *interrupter.lock().expect("mutex poisoned") = Some(Box::new(solver.interrupter()));
        solver.add_cnf(cnf).context("failed to add CNF to solver")?;

        match solver.solve().context("error while solving")? {
            SolverResult::Sat => {
                let assignment = solver.full_solution().context("failed to get full solution")?;
                return finish_sat(graph, plan, &vars, &assignment).map(PipelineOutcome::Sat);
            }
            SolverResult::Unsat => {
                info!(target: "nlink_solver::pipeline", "plan {} unsatisfiable, trying next plan", plan.name);
            }
            SolverResult::Interrupted => return Ok(PipelineOutcome::Abort(AbortReason::Interrupted)),
        }
    }
    if any_attempted {
        Ok(PipelineOutcome::Abort(AbortReason::Unsat))
    } else {
        Ok(PipelineOutcome::Abort(AbortReason::VarLimitExceeded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimension;
    use crate::point::Point;
    use crate::problem::Problem;

    #[test]
    fn solvable_planar_problem_produces_a_route_per_net() {
        let mut problem = Problem::new(Dimension::planar(3, 3));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(2, 2, 0));
        let graph = Graph::build(&problem, None);
        let interrupter: InterrupterContainer = Arc::new(Mutex::new(None));
        let outcome = run(&graph, false, None, interrupter).expect("pipeline ran without a bug");
        let PipelineOutcome::Sat(result) = outcome else { panic!("expected a satisfiable plan") };
        assert_eq!(result.routes.len(), 1);
    }

    #[test]
    fn var_limit_below_every_plan_aborts_without_solving() {
        let mut problem = Problem::new(Dimension::planar(3, 3));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(2, 2, 0));
        let graph = Graph::build(&problem, None);
        let interrupter: InterrupterContainer = Arc::new(Mutex::new(None));
        let outcome = run(&graph, false, Some(1), interrupter).expect("pipeline ran without a bug");
        let PipelineOutcome::Abort(reason) = outcome else { panic!("expected an abort") };
        assert_eq!(reason, AbortReason::VarLimitExceeded);
    }

    fn run_text(text: &str) -> PipelineOutcome {
        let problem = crate::format::read_problem(text).expect("well-formed problem");
        let graph = Graph::build(&problem, None);
        run(&graph, false, None, Arc::new(Mutex::new(None))).expect("pipeline ran without a bug")
    }

    /// S1 (2x2, 1 net): any Manhattan path of length 2 between opposite
    /// corners is acceptable.
    #[test]
    fn scenario_s1_two_by_two_one_net() {
        let PipelineOutcome::Sat(result) = run_text("SIZE 2X2\nLINE_NUM 1\nLINE#1 (0,0)-(1,1)\n") else {
            panic!("expected a satisfiable plan")
        };
        assert_eq!(result.routes.len(), 1);
        let route = &result.routes[0];
        assert_eq!(route.points.first(), Some(&Point::new(0, 0, 0)));
        assert_eq!(route.points.last(), Some(&Point::new(1, 1, 0)));
        assert_eq!(route.points.len() - 1, 2);
    }

    /// S2 (3x3, 2 nets): nets may share no cell, so the two decoded paths
    /// must be disjoint.
    #[test]
    fn scenario_s2_three_by_three_two_disjoint_nets() {
        let PipelineOutcome::Sat(result) =
            run_text("SIZE 3X3\nLINE_NUM 2\nLINE#1 (0,0)-(2,2)\nLINE#2 (2,0)-(0,2)\n")
        else {
            panic!("expected a satisfiable plan")
        };
        assert_eq!(result.routes.len(), 2);
        let mut seen = std::collections::HashSet::new();
        let total_points: usize = result.routes.iter().map(|r| r.points.len()).sum();
        for route in &result.routes {
            for &p in &route.points {
                seen.insert(p);
            }
        }
        assert_eq!(seen.len(), total_points, "the two nets' paths must not share a cell");
    }

    /// S3 (2D unsat): two LINE#s with identical terminal coordinates are a
    /// parse-time rejection; the pipeline must never run.
    #[test]
    fn scenario_s3_duplicate_terminals_rejected_at_parse_time() {
        let text = "SIZE 2X1\nLINE_NUM 2\nLINE#1 (0,0)-(1,0)\nLINE#2 (0,0)-(1,0)\n";
        let errors = crate::format::read_problem(text).expect_err("duplicate terminals must fail the parse");
        assert!(errors.iter().any(|e| e.message.contains("duplicated")));
    }

    /// S4 (2 layers + via): format guesses to Adc2016, and the lone net
    /// crosses through via `a`'s column instead of taking a direct z-edge.
    #[test]
    fn scenario_s4_two_layers_with_via() {
        let text = "SIZE 2X2X2\nLINE_NUM 1\nLINE#1 (0,0,1)-(1,1,2)\nVIA#a (0,0,1)(0,0,2)\n";
        let problem = crate::format::read_problem(text).expect("well-formed problem");
        let graph = Graph::build(&problem, None);
        assert_eq!(graph.format, crate::graph::Format::Adc2016);
        let interrupter: InterrupterContainer = Arc::new(Mutex::new(None));
        let PipelineOutcome::Sat(result) = run(&graph, false, None, interrupter).expect("pipeline ran without a bug")
        else {
            panic!("expected a satisfiable plan")
        };
        let route = &result.routes[0];
        assert_eq!(route.points.first(), Some(&Point::new(0, 0, 0)));
        assert_eq!(route.points.last(), Some(&Point::new(1, 1, 1)));
        assert!(route.points.contains(&Point::new(0, 0, 1)), "route should cross the via column");
    }

    /// S5 (3D without via): format guesses to Adc2017, and the lone net must
    /// use at least one direct z-edge since there is no via to cross through.
    #[test]
    fn scenario_s5_two_layers_without_via_uses_a_z_edge() {
        let text = "SIZE 2X2X2\nLINE_NUM 1\nLINE#1 (0,0,1)-(1,1,2)\n";
        let problem = crate::format::read_problem(text).expect("well-formed problem");
        let graph = Graph::build(&problem, None);
        assert_eq!(graph.format, crate::graph::Format::Adc2017);
        let interrupter: InterrupterContainer = Arc::new(Mutex::new(None));
        let PipelineOutcome::Sat(result) = run(&graph, false, None, interrupter).expect("pipeline ran without a bug")
        else {
            panic!("expected a satisfiable plan")
        };
        let route = &result.routes[0];
        assert!(
            route.points.windows(2).any(|w| w[0].z != w[1].z),
            "a 3D route with no via must cross layers on a z-edge"
        );
    }

    /// S6 (rerouter): starting from a length-12 route in a 6x6 grid with
    /// two nets, rerouting must not increase the total length.
    #[test]
    fn scenario_s6_rerouting_a_length_twelve_route_does_not_increase_total_length() {
        let mut problem = Problem::new(Dimension::planar(6, 6));
        problem.add_net("A", Point::new(0, 0, 0), Point::new(5, 0, 0));
        problem.add_net("B", Point::new(0, 5, 0), Point::new(1, 5, 0));
        let graph = Graph::build(&problem, None);

        let net_a_detour = vec![
            Point::new(0, 0, 0),
            Point::new(0, 1, 0),
            Point::new(0, 2, 0),
            Point::new(0, 3, 0),
            Point::new(0, 4, 0),
            Point::new(1, 4, 0),
            Point::new(2, 4, 0),
            Point::new(2, 3, 0),
            Point::new(2, 2, 0),
            Point::new(2, 1, 0),
            Point::new(2, 0, 0),
            Point::new(3, 0, 0),
            Point::new(4, 0, 0),
            Point::new(5, 0, 0),
        ];
        let net_b_straight = vec![Point::new(0, 5, 0), Point::new(1, 5, 0)];
        let initial_length = (net_a_detour.len() - 2) + net_b_straight.len().saturating_sub(2);
        assert_eq!(initial_length, 12);

        let mut routes = vec![
            crate::decoder::Route { net_id: 0, points: net_a_detour },
            crate::decoder::Route { net_id: 1, points: net_b_straight },
        ];
        let stats = crate::router::reroute_until_stable(&graph, &mut routes);
        assert!(stats.total_length <= initial_length);
    }
}
