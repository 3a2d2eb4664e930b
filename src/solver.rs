//! The CNF solver contract and the varisat-backed oracle.
//!
//! Literals are DIMACS-style `i32`s: variable identifiers are positive
//! integers and negation is sign flip. The solver is synchronous and
//! treated as a pure, stateful oracle; model enumeration is driven by the
//! caller adding blocking clauses between `solve` calls.

use crate::error::Error;

/// A DIMACS-style literal.
pub type Lit = i32;

/// The standard CNF interface expected from a SAT backend.
pub trait SatSolver {
    fn add_clause(&mut self, lits: &[Lit]);

    /// Solve the current formula. `Ok(true)` means satisfiable.
    fn solve(&mut self) -> Result<bool, Error>;

    /// The satisfying assignment of the last successful `solve`, as one
    /// literal per known variable.
    fn model(&self) -> Option<Vec<Lit>>;

    /// Number of clauses added so far.
    fn num_clauses(&self) -> usize;
}

/// The default backend.
pub struct VarisatSolver {
    inner: varisat::Solver<'static>,
    clauses: usize,
}

impl VarisatSolver {
    pub fn new() -> Self {
        Self {
            inner: varisat::Solver::new(),
            clauses: 0,
        }
    }
}

impl Default for VarisatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SatSolver for VarisatSolver {
    fn add_clause(&mut self, lits: &[Lit]) {
        use varisat::ExtendFormula;
        let lits: Vec<varisat::Lit> = lits
            .iter()
            .map(|l| varisat::Lit::from_dimacs(*l as isize))
            .collect();
        self.inner.add_clause(&lits);
        self.clauses += 1;
    }

    fn solve(&mut self) -> Result<bool, Error> {
        self.inner.solve().map_err(|e| Error::Solver(e.to_string()))
    }

    fn model(&self) -> Option<Vec<Lit>> {
        self.inner
            .model()
            .map(|m| m.iter().map(|l| l.to_dimacs() as Lit).collect())
    }

    fn num_clauses(&self) -> usize {
        self.clauses
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varisat_sat_and_model() {
        // (x1 ∨ x3) ∧ (¬x2 ∨ x3), satisfiable.
        let mut solver = VarisatSolver::new();
        solver.add_clause(&[1, 3]);
        solver.add_clause(&[-2, 3]);
        assert!(solver.solve().unwrap());
        let model = solver.model().unwrap();
        assert!(model.contains(&1) || model.contains(&3));
    }

    #[test]
    fn test_varisat_unsat() {
        let mut solver = VarisatSolver::new();
        solver.add_clause(&[1]);
        solver.add_clause(&[-1]);
        assert!(!solver.solve().unwrap());
    }

    #[test]
    fn test_blocking_clause_enumeration() {
        let mut solver = VarisatSolver::new();
        solver.add_clause(&[1, 2]);
        let mut count = 0;
        while solver.solve().unwrap() {
            let model = solver.model().unwrap();
            let blocking: Vec<Lit> = model.iter().map(|l| -l).collect();
            solver.add_clause(&blocking);
            count += 1;
            assert!(count <= 4, "enumeration must terminate");
        }
        // Three satisfying assignments of (x1 ∨ x2) over two variables.
        assert_eq!(count, 3);
    }

    #[test]
    fn test_clause_count() {
        let mut solver = VarisatSolver::new();
        solver.add_clause(&[1]);
        solver.add_clause(&[1, 2]);
        assert_eq!(solver.num_clauses(), 2);
    }
}
