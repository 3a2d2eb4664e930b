//! The SAT ↔ automaton candidate encoding.
//!
//! A candidate with state bound `k` over an effective alphabet Σ′ owns
//! `k·|Σ′|·k` transition variables (dst varies fastest, then symbol, then
//! src), `k` accepting-state variables, and on-demand Tseitin auxiliaries.
//! Variables are handed out by an explicit allocator that lives for one
//! synthesis run; state 0 is always the unique initial state.

use std::collections::HashSet;

use itertools::Itertools;

use crate::nfa::Nfa;
use crate::solver::{Lit, SatSolver};
use crate::symbol::{Symbol, SymbolMap};

/// Monotone variable allocator for one synthesis run. Fresh variables are
/// contiguous and never reused; a new run starts from a new allocator.
pub struct VarAllocator {
    next: Lit,
}

impl VarAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate `n` fresh variables and return their range.
    pub fn alloc(&mut self, n: usize) -> VarRange {
        let first = self.next;
        self.next += n as Lit;
        VarRange { first, count: n }
    }

    /// Total number of variables allocated so far.
    pub fn allocated(&self) -> usize {
        (self.next - 1) as usize
    }
}

impl Default for VarAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A contiguous range of SAT variables.
#[derive(Clone, Copy, Debug)]
pub struct VarRange {
    first: Lit,
    count: usize,
}

impl VarRange {
    pub fn get(&self, i: usize) -> Lit {
        assert!(i < self.count);
        self.first + i as Lit
    }

    pub fn iter(&self) -> impl Iterator<Item = Lit> + '_ {
        (0..self.count).map(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Index descriptor for the flat transition-variable array:
/// `offset + src·stride_src + sym·stride_sym + dst`. dst varies fastest.
#[derive(Clone, Copy, Debug)]
struct TransDescriptor {
    offset: Lit,
    stride_src: usize,
    stride_sym: usize,
}

/// The variable layout of one candidate automaton (invariant or relation).
pub struct CandidateLayout {
    num_states: usize,
    alphabet: Vec<Symbol>,
    symbol_map: SymbolMap,
    trans: TransDescriptor,
    accept: VarRange,
    transducer: bool,
}

impl CandidateLayout {
    /// Allocate the transition and accepting-state variables, in this
    /// order, from `alloc`. `alphabet` is the effective alphabet Σ′ and
    /// must be sorted and duplicate-free; `symbol_map` is the map the
    /// decoded automaton will carry.
    pub fn allocate(
        alloc: &mut VarAllocator,
        num_states: usize,
        alphabet: Vec<Symbol>,
        symbol_map: SymbolMap,
        transducer: bool,
    ) -> Self {
        assert!(num_states > 0, "state bound must be positive");
        assert!(!alphabet.is_empty(), "effective alphabet is empty");
        let trans_range = alloc.alloc(num_states * alphabet.len() * num_states);
        let accept = alloc.alloc(num_states);
        let stride_src = alphabet.len() * num_states;
        Self {
            num_states,
            alphabet,
            symbol_map,
            trans: TransDescriptor {
                offset: trans_range.first,
                stride_src,
                stride_sym: num_states,
            },
            accept,
            transducer,
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn alphabet(&self) -> &[Symbol] {
        &self.alphabet
    }

    /// Width of the symbols this candidate ranges over.
    pub fn width(&self) -> usize {
        self.symbol_map.width()
    }

    /// The variable asserting the transition ⟨src, alphabet[sym], dst⟩.
    pub fn trans_var(&self, src: usize, sym: usize, dst: usize) -> Lit {
        assert!(src < self.num_states && sym < self.alphabet.len() && dst < self.num_states);
        self.trans.offset
            + (src * self.trans.stride_src + sym * self.trans.stride_sym + dst) as Lit
    }

    /// The variable asserting that `state` is accepting.
    pub fn accept_var(&self, state: usize) -> Lit {
        self.accept.get(state)
    }

    /// Position of `sym` in the effective alphabet, if present.
    pub fn symbol_index(&self, sym: &Symbol) -> Option<usize> {
        self.alphabet.iter().position(|s| s == sym)
    }

    /// The decision variables of this candidate, for blocking clauses.
    pub fn decision_vars(&self) -> Vec<Lit> {
        let trans_count = self.trans.stride_src * self.num_states;
        (0..trans_count)
            .map(|i| self.trans.offset + i as Lit)
            .chain(self.accept.iter())
            .collect()
    }

    /// Existence and accepting base clauses. For a transducer both are
    /// weakened by additionally allowing the first variable to be false,
    /// which rules out only the all-false assignment of interest while
    /// avoiding a trivial model.
    pub fn base_clauses(&self, solver: &mut dyn SatSolver) {
        let mut existence: Vec<Lit> = self.decision_vars();
        existence.truncate(self.trans.stride_src * self.num_states);
        if self.transducer {
            existence.push(-self.trans.offset);
        }
        solver.add_clause(&existence);

        let mut accepting: Vec<Lit> = self.accept.iter().collect();
        if self.transducer {
            accepting.push(-self.accept.get(0));
        }
        solver.add_clause(&accepting);
    }

    /// Optional totality: every (src, sym) has at least one successor.
    pub fn completeness_clauses(&self, solver: &mut dyn SatSolver) {
        for src in 0..self.num_states {
            for sym in 0..self.alphabet.len() {
                let clause: Vec<Lit> = (0..self.num_states)
                    .map(|dst| self.trans_var(src, sym, dst))
                    .collect();
                solver.add_clause(&clause);
            }
        }
    }

    /// Optional determinism: no (src, sym) has two distinct successors.
    pub fn determinism_clauses(&self, solver: &mut dyn SatSolver) {
        for src in 0..self.num_states {
            for sym in 0..self.alphabet.len() {
                for dst in 0..self.num_states {
                    for dst2 in dst + 1..self.num_states {
                        solver.add_clause(&[
                            -self.trans_var(src, sym, dst),
                            -self.trans_var(src, sym, dst2),
                        ]);
                    }
                }
            }
        }
    }

    /// Decode a model into the candidate automaton. State 0 is initial;
    /// the result is trimmed. Equal models decode to equal automata.
    pub fn decode(&self, model: &[Lit]) -> Nfa {
        let positive: HashSet<Lit> = model.iter().copied().filter(|l| *l > 0).collect();
        let mut aut = Nfa::with_states(self.num_states, self.symbol_map.clone());
        aut.mark_initial(0);
        for state in 0..self.num_states {
            if positive.contains(&self.accept_var(state)) {
                aut.mark_accept(state);
            }
        }
        for src in 0..self.num_states {
            for (sym_index, sym) in self.alphabet.iter().enumerate() {
                for dst in 0..self.num_states {
                    if positive.contains(&self.trans_var(src, sym_index, dst)) {
                        aut.add_transition(src, *sym, dst);
                    }
                }
            }
        }
        aut.trim()
    }

    /// Require that at least one of `words` is accepted.
    ///
    /// The DNF over all runs of all words is converted to CNF by Tseitin:
    /// each run gets a fresh auxiliary `y` with binary clauses `(lit ∨ ¬y)`
    /// per run literal, and a single final OR over the auxiliaries of *all*
    /// words closes the disjunction. Words containing symbols outside the
    /// effective alphabet cannot be accepted by any candidate and
    /// contribute no runs. Returns the number of auxiliaries introduced.
    pub fn accept_at_least_one_of(
        &self,
        words: &[Vec<Symbol>],
        solver: &mut dyn SatSolver,
        alloc: &mut VarAllocator,
    ) -> usize {
        let mut aux: Vec<Lit> = Vec::new();
        for word in words {
            let Some(indices) = word
                .iter()
                .map(|s| self.symbol_index(s))
                .collect::<Option<Vec<usize>>>()
            else {
                continue;
            };
            if indices.is_empty() {
                // The empty word: acceptance is finality of state 0.
                let y = alloc.alloc(1).get(0);
                solver.add_clause(&[self.accept_var(0), -y]);
                aux.push(y);
                continue;
            }
            for run in indices
                .iter()
                .map(|_| 0..self.num_states)
                .multi_cartesian_product()
            {
                let y = alloc.alloc(1).get(0);
                let mut src = 0;
                for (sym, dst) in indices.iter().zip(&run) {
                    solver.add_clause(&[self.trans_var(src, *sym, *dst), -y]);
                    src = *dst;
                }
                solver.add_clause(&[self.accept_var(src), -y]);
                aux.push(y);
            }
        }
        solver.add_clause(&aux);
        aux.len()
    }

    /// Require that `word` is rejected, as direct CNF: for every run, some
    /// transition is absent or the final state is not accepting.
    pub fn reject(&self, word: &[Symbol], solver: &mut dyn SatSolver) {
        if word.is_empty() {
            solver.add_clause(&[-self.accept_var(0)]);
            return;
        }
        let Some(indices) = word
            .iter()
            .map(|s| self.symbol_index(s))
            .collect::<Option<Vec<usize>>>()
        else {
            // No candidate over Σ′ accepts a word with foreign symbols.
            return;
        };
        for run in indices
            .iter()
            .map(|_| 0..self.num_states)
            .multi_cartesian_product()
        {
            let mut clause = Vec::with_capacity(indices.len() + 1);
            let mut src = 0;
            for (sym, dst) in indices.iter().zip(&run) {
                clause.push(-self.trans_var(src, *sym, *dst));
                src = *dst;
            }
            clause.push(-self.accept_var(src));
            solver.add_clause(&clause);
        }
    }
}

/// Re-expand a projected witness to full width: the erased trailing
/// positions of every symbol are enumerated over all assignments,
/// producing `2^{(w′−w)·|word|}` concrete words.
pub fn expand_projected_word(word: &[Symbol], target_width: usize) -> Vec<Vec<Symbol>> {
    if word.is_empty() {
        return vec![vec![]];
    }
    let missing = target_width - word[0].width();
    word.iter()
        .map(|sym| {
            Symbol::enumerate(missing)
                .into_iter()
                .map(|ext| sym.concat(&ext))
                .collect::<Vec<Symbol>>()
        })
        .multi_cartesian_product()
        .collect()
}
