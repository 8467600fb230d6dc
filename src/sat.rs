//! Cardinality-constraint helpers shared by the encoder.
//!
//! The reference this crate is modeled on grew `add_exact_two`,
//! `add_at_most_two`, and similar hand-unrolled-per-arity methods over time,
//! and more than one bug traced back to one of them quietly assuming an
//! arity it was no longer called with. Everything here is instead built from
//! two generic primitives, [`at_most_k`] and [`at_least_k`], parameterized on
//! `k` — there is no per-arity method to drift out of sync.

use itertools::Itertools;
use rustsat::instances::{BasicVarManager, SatInstance};
use rustsat::types::{Clause, Lit};

pub type Instance = SatInstance<BasicVarManager>;

pub fn new_lit(instance: &mut Instance) -> Lit {
    instance.var_manager_mut().new_var().pos_lit()
}

fn guarded_clause(guard: &[Lit], lits: impl IntoIterator<Item = Lit>) -> Clause {
    Clause::from_iter(guard.iter().copied().chain(lits))
}

/// Adds clauses asserting that, whenever every literal in `guard` holds, at
/// most `k` of `lits` are true. `guard` is typically `&[]` (unconditional) or
/// a single negated enabling literal, e.g. `&[!uvar]` for "only enforced when
/// `uvar` is true".
///
/// For `k == 0` this is one clause per literal. For `k == 1` this is the
/// familiar pairwise `(-a | -b)` encoding. For larger `k` a sequential
/// counter (Sinz 2005) encoding is used so clause count stays linear in
/// `lits.len()` instead of combinatorial.
pub fn at_most_k_guarded(instance: &mut Instance, guard: &[Lit], lits: &[Lit], k: usize) {
    let n = lits.len();
    if k >= n {
        return;
    }
    if k == 0 {
        for &lit in lits {
            instance.add_clause(guarded_clause(guard, [!lit]));
        }
        return;
    }
    if k == 1 {
        for (&a, &b) in lits.iter().tuple_combinations() {
            instance.add_clause(guarded_clause(guard, [!a, !b]));
        }
        return;
    }

    // register[i][j] means "at least j+1 of the first i+1 literals are true".
    let registers: Vec<Vec<Lit>> =
        (0..n).map(|_| (0..k).map(|_| new_lit(instance)).collect()).collect();

    instance.add_clause(guarded_clause(guard, [!lits[0], registers[0][0]]));
    for j in 1..k {
        instance.add_clause(guarded_clause(guard, [!registers[0][j]]));
    }
    for i in 1..n {
        instance.add_clause(guarded_clause(guard, [!lits[i], registers[i][0]]));
        instance.add_clause(guarded_clause(guard, [!registers[i - 1][0], registers[i][0]]));
        for j in 1..k {
            instance.add_clause(guarded_clause(
                guard,
                [!lits[i], !registers[i - 1][j - 1], registers[i][j]],
            ));
            instance.add_clause(guarded_clause(guard, [!registers[i - 1][j], registers[i][j]]));
        }
        instance.add_clause(guarded_clause(guard, [!lits[i], !registers[i - 1][k - 1]]));
    }
}

/// Guarded counterpart of "at least `k`", built by applying
/// [`at_most_k_guarded`] to the negated literals with the complementary bound.
pub fn at_least_k_guarded(instance: &mut Instance, guard: &[Lit], lits: &[Lit], k: usize) {
    if k == 0 {
        return;
    }
    if k > lits.len() {
        instance.add_clause(Clause::from_iter(guard.iter().copied()));
        return;
    }
    let negated: Vec<Lit> = lits.iter().map(|&l| !l).collect();
    at_most_k_guarded(instance, guard, &negated, lits.len() - k);
}

pub fn at_most_k(instance: &mut Instance, lits: &[Lit], k: usize) {
    at_most_k_guarded(instance, &[], lits, k);
}

pub fn at_least_k(instance: &mut Instance, lits: &[Lit], k: usize) {
    at_least_k_guarded(instance, &[], lits, k);
}

pub fn exactly_k_guarded(instance: &mut Instance, guard: &[Lit], lits: &[Lit], k: usize) {
    at_most_k_guarded(instance, guard, lits, k);
    at_least_k_guarded(instance, guard, lits, k);
}

pub fn exactly_k(instance: &mut Instance, lits: &[Lit], k: usize) {
    at_most_k(instance, lits, k);
    at_least_k(instance, lits, k);
}

/// Asserts `lit`, but only under `guard` (i.e. `guard ∨ lit` as a binary
/// clause) — the conditional-unit-clause form used to fix a node's label
/// vector only when some enabling binding variable is true.
pub fn unit_guarded(instance: &mut Instance, guard: &[Lit], lit: Lit) {
    instance.add_clause(guarded_clause(guard, [lit]));
}

/// Asserts `a <-> b`, but only under `guard`: two guarded binary clauses.
/// This is the per-bit equality used by the edge/adjacent-label constraint
/// ("if this edge is selected its endpoints' labels must match").
pub fn iff_guarded(instance: &mut Instance, guard: &[Lit], a: Lit, b: Lit) {
    instance.add_clause(guarded_clause(guard, [!a, b]));
    instance.add_clause(guarded_clause(guard, [a, !b]));
}

pub fn exactly_one(instance: &mut Instance, lits: &[Lit]) {
    exactly_k(instance, lits, 1);
}

pub fn at_most_two(instance: &mut Instance, lits: &[Lit]) {
    at_most_k(instance, lits, 2);
}

pub fn at_least_two(instance: &mut Instance, lits: &[Lit]) {
    at_least_k(instance, lits, 2);
}

pub fn exactly_two(instance: &mut Instance, lits: &[Lit]) {
    exactly_k(instance, lits, 2);
}

/// Forbids exactly one of `lits` from being true — the count must land on 0,
/// 2, 3, ... One clause per literal: "if this one is true, some other one
/// must be too". Used for ordinary (non-terminal, non-via) nodes in
/// no-uvar slack mode, where a node is either untouched or passed through by
/// exactly two edges, never dead-ended by exactly one.
pub fn not_one(instance: &mut Instance, lits: &[Lit]) {
    for (i, &a_i) in lits.iter().enumerate() {
        let mut clause = vec![!a_i];
        clause.extend(lits.iter().enumerate().filter(|&(j, _)| j != i).map(|(_, &l)| l));
        instance.add_clause(Clause::from_iter(clause));
    }
}

#[cfg(test)]
mod tests {
    use rustsat::instances::SatInstance;
    use rustsat::solvers::{Solve, SolverResult};
    use rustsat::types::{Assignment, TernaryVal};
    use rustsat_glucose::simp::Glucose as GlucoseSimp;

    use super::*;

    fn solve(instance: Instance) -> Option<Assignment> {
        let (cnf, _) = instance.into_cnf();
        let mut solver = GlucoseSimp::default();
        solver.add_cnf(cnf).unwrap();
        match solver.solve().unwrap() {
            SolverResult::Sat => Some(solver.full_solution().unwrap()),
            _ => None,
        }
    }

    fn true_count(assignment: &Assignment, lits: &[Lit]) -> usize {
        lits.iter().filter(|&&l| assignment.lit_value(l) == TernaryVal::True).count()
    }

    #[test]
    fn exactly_one_forces_single_true_literal() {
        let mut instance: Instance = SatInstance::new();
        let lits: Vec<Lit> = (0..5).map(|_| new_lit(&mut instance)).collect();
        exactly_one(&mut instance, &lits);
        let assignment = solve(instance).expect("satisfiable");
        assert_eq!(true_count(&assignment, &lits), 1);
    }

    #[test]
    fn at_most_two_never_admits_three() {
        let mut instance: Instance = SatInstance::new();
        let lits: Vec<Lit> = (0..4).map(|_| new_lit(&mut instance)).collect();
        at_most_two(&mut instance, &lits);
        at_least_k(&mut instance, &lits, 3);
        assert!(solve(instance).is_none());
    }

    #[test]
    fn at_least_two_of_four_is_satisfiable() {
        let mut instance: Instance = SatInstance::new();
        let lits: Vec<Lit> = (0..4).map(|_| new_lit(&mut instance)).collect();
        at_least_two(&mut instance, &lits);
        let assignment = solve(instance).expect("satisfiable");
        assert!(true_count(&assignment, &lits) >= 2);
    }

    #[test]
    fn not_one_excludes_exactly_one_true() {
        let mut instance: Instance = SatInstance::new();
        let lits: Vec<Lit> = (0..3).map(|_| new_lit(&mut instance)).collect();
        not_one(&mut instance, &lits);
        exactly_k(&mut instance, &lits, 1);
        assert!(solve(instance).is_none());
    }

    #[test]
    fn guarded_at_least_two_only_applies_when_guard_true() {
        let mut instance: Instance = SatInstance::new();
        let uvar = new_lit(&mut instance);
        let lits: Vec<Lit> = (0..3).map(|_| new_lit(&mut instance)).collect();
        at_least_k_guarded(&mut instance, &[!uvar], &lits, 2);
        instance.add_unit(!uvar);
        // uvar is forced false, so the guarded constraint is vacuous: all
        // lits false stays satisfiable.
        for &l in &lits {
            instance.add_unit(!l);
        }
        assert!(solve(instance).is_some());
    }
}
