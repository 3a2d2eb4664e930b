use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::error::Error;
use crate::symbol::{Symbol, SymbolMap};

/// Identifier for a single state. States of an automaton are always
/// numbered `0..num_states`.
pub type StateId = usize;

/// A nondeterministic finite automaton over a bit-vector alphabet.
///
/// The alphabet is `{0,1}^w` where `w` is the width of the symbol map; the
/// map also records the tape structure and proposition names. Transducers
/// are plain `Nfa` values whose tapes come in two equal halves — there is
/// no separate type, transducer-specific operations check the tape count.
///
/// Every algebraic operation returns a fresh automaton; inputs are never
/// aliased by outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nfa {
    num_states: usize,
    initial: BTreeSet<StateId>,
    accepting: BTreeSet<StateId>,
    transitions: BTreeSet<(StateId, Symbol, StateId)>,
    symbol_map: SymbolMap,
}

impl Nfa {
    /// An automaton with `num_states` fresh states and no transitions.
    pub fn with_states(num_states: usize, symbol_map: SymbolMap) -> Self {
        Self {
            num_states,
            initial: BTreeSet::new(),
            accepting: BTreeSet::new(),
            transitions: BTreeSet::new(),
            symbol_map,
        }
    }

    /// Create and add a new state, returning its id.
    pub fn add_state(&mut self) -> StateId {
        let id = self.num_states;
        self.num_states += 1;
        id
    }

    pub fn mark_initial(&mut self, id: StateId) {
        assert!(id < self.num_states);
        self.initial.insert(id);
    }

    pub fn mark_accept(&mut self, id: StateId) {
        assert!(id < self.num_states);
        self.accepting.insert(id);
    }

    pub fn add_transition(&mut self, src: StateId, symbol: Symbol, dst: StateId) {
        assert!(src < self.num_states && dst < self.num_states);
        assert!(
            symbol.width() == self.symbol_map.width(),
            "symbol width {} does not match alphabet width {}",
            symbol.width(),
            self.symbol_map.width()
        );
        self.transitions.insert((src, symbol, dst));
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn symbol_map(&self) -> &SymbolMap {
        &self.symbol_map
    }

    /// Number of tapes, derived from the symbol map.
    pub fn number_of_tapes(&self) -> usize {
        self.symbol_map.number_of_tapes()
    }

    pub fn initial_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.initial.iter().copied()
    }

    pub fn accepting_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.accepting.iter().copied()
    }

    pub fn is_accepting(&self, id: StateId) -> bool {
        self.accepting.contains(&id)
    }

    /// All transitions in a deterministic (sorted) order.
    pub fn transitions(&self) -> impl Iterator<Item = &(StateId, Symbol, StateId)> {
        self.transitions.iter()
    }

    /// Distinct symbols appearing on transitions, sorted.
    pub fn used_symbols(&self) -> Vec<Symbol> {
        let set: BTreeSet<Symbol> = self.transitions.iter().map(|(_, s, _)| *s).collect();
        set.into_iter().collect()
    }

    /// Distinct first halves of the symbols appearing on transitions, sorted.
    /// Requires a paired (transducer) alphabet.
    pub fn used_symbols_first_half(&self) -> Vec<Symbol> {
        let set: BTreeSet<Symbol> = self
            .transitions
            .iter()
            .map(|(_, s, _)| s.first_half())
            .collect();
        set.into_iter().collect()
    }

    fn ensure_same_map(&self, other: &Nfa, op: &str) -> Result<(), Error> {
        if self.symbol_map != other.symbol_map {
            return Err(Error::AlphabetMismatch(format!(
                "{op} requires identical symbol maps (widths {} and {})",
                self.symbol_map.width(),
                other.symbol_map.width()
            )));
        }
        Ok(())
    }

    /// Transitions grouped by source state, for traversals.
    fn outgoing(&self) -> HashMap<StateId, Vec<(Symbol, StateId)>> {
        let mut map: HashMap<StateId, Vec<(Symbol, StateId)>> = HashMap::new();
        for (src, sym, dst) in &self.transitions {
            map.entry(*src).or_default().push((*sym, *dst));
        }
        map
    }

    /// L(result) = L(self) ∪ L(other). Disjoint union of the two machines;
    /// both initial sets are kept.
    pub fn union(&self, other: &Nfa) -> Result<Nfa, Error> {
        self.ensure_same_map(other, "union")?;
        let offset = self.num_states;
        let mut out = Nfa::with_states(self.num_states + other.num_states, self.symbol_map.clone());
        for s in &self.initial {
            out.mark_initial(*s);
        }
        for s in &self.accepting {
            out.mark_accept(*s);
        }
        for (src, sym, dst) in &self.transitions {
            out.add_transition(*src, *sym, *dst);
        }
        for s in &other.initial {
            out.mark_initial(*s + offset);
        }
        for s in &other.accepting {
            out.mark_accept(*s + offset);
        }
        for (src, sym, dst) in &other.transitions {
            out.add_transition(*src + offset, *sym, *dst + offset);
        }
        Ok(out)
    }

    /// L(result) = L(self) ∩ L(other), by the product construction over
    /// reachable state pairs.
    pub fn intersect(&self, other: &Nfa) -> Result<Nfa, Error> {
        self.ensure_same_map(other, "intersection")?;

        let left = self.outgoing();
        let right = other.outgoing();

        let mut ids: BTreeMap<(StateId, StateId), StateId> = BTreeMap::new();
        let mut out = Nfa::with_states(0, self.symbol_map.clone());
        let mut queue = VecDeque::new();

        for p in &self.initial {
            for q in &other.initial {
                let id = out.add_state();
                ids.insert((*p, *q), id);
                out.mark_initial(id);
                queue.push_back((*p, *q));
            }
        }

        while let Some((p, q)) = queue.pop_front() {
            let id = ids[&(p, q)];
            if self.accepting.contains(&p) && other.accepting.contains(&q) {
                out.mark_accept(id);
            }
            let (Some(ps), Some(qs)) = (left.get(&p), right.get(&q)) else {
                continue;
            };
            for (sym, p2) in ps {
                for (sym2, q2) in qs {
                    if sym != sym2 {
                        continue;
                    }
                    let next = *ids.entry((*p2, *q2)).or_insert_with(|| {
                        queue.push_back((*p2, *q2));
                        out.add_state()
                    });
                    out.add_transition(id, *sym, next);
                }
            }
        }

        Ok(out)
    }

    /// A deterministic, complete automaton with the same language, by the
    /// powerset construction over the full alphabet `{0,1}^w`. Every state
    /// of the result has exactly one successor per symbol; the empty subset
    /// acts as the sink.
    pub fn determinise(&self) -> Nfa {
        let alphabet = Symbol::enumerate(self.symbol_map.width());
        let outgoing = self.outgoing();

        let mut subsets: Vec<Vec<StateId>> = Vec::new();
        let mut ids: HashMap<Vec<StateId>, StateId> = HashMap::new();
        let mut out = Nfa::with_states(0, self.symbol_map.clone());

        let start: Vec<StateId> = self.initial.iter().copied().collect();
        let start_id = out.add_state();
        out.mark_initial(start_id);
        ids.insert(start.clone(), start_id);
        subsets.push(start);

        let mut queue = VecDeque::from([start_id]);
        while let Some(id) = queue.pop_front() {
            let subset = subsets[id].clone();
            if subset.iter().any(|s| self.accepting.contains(s)) {
                out.mark_accept(id);
            }
            for sym in &alphabet {
                let mut next: BTreeSet<StateId> = BTreeSet::new();
                for s in &subset {
                    if let Some(edges) = outgoing.get(s) {
                        for (edge_sym, dst) in edges {
                            if edge_sym == sym {
                                next.insert(*dst);
                            }
                        }
                    }
                }
                let next: Vec<StateId> = next.into_iter().collect();
                let next_id = *ids.entry(next.clone()).or_insert_with(|| {
                    let id = out.add_state();
                    subsets.push(next);
                    queue.push_back(id);
                    id
                });
                out.add_transition(id, *sym, next_id);
            }
        }

        out
    }

    /// L(result) = Σ* ∖ L(self): determinise (which totalises over the full
    /// alphabet), then flip finality.
    pub fn complement(&self) -> Nfa {
        let det = self.determinise();
        let mut out = Nfa::with_states(det.num_states, det.symbol_map.clone());
        for s in &det.initial {
            out.mark_initial(*s);
        }
        for s in 0..det.num_states {
            if !det.accepting.contains(&s) {
                out.mark_accept(s);
            }
        }
        for (src, sym, dst) in &det.transitions {
            out.add_transition(*src, *sym, *dst);
        }
        out
    }

    /// Remove states that are unreachable from an initial state or from
    /// which no accepting state is reachable, renumbering the survivors.
    /// Preserves the language.
    pub fn trim(&self) -> Nfa {
        // Forward pass from the initial states.
        let outgoing = self.outgoing();
        let mut forward: BTreeSet<StateId> = BTreeSet::new();
        let mut queue: VecDeque<StateId> = self.initial.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            if !forward.insert(s) {
                continue;
            }
            if let Some(edges) = outgoing.get(&s) {
                for (_, dst) in edges {
                    queue.push_back(*dst);
                }
            }
        }

        // Backward pass from the accepting states.
        let mut incoming: HashMap<StateId, Vec<StateId>> = HashMap::new();
        for (src, _, dst) in &self.transitions {
            incoming.entry(*dst).or_default().push(*src);
        }
        let mut backward: BTreeSet<StateId> = BTreeSet::new();
        let mut queue: VecDeque<StateId> = self.accepting.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            if !backward.insert(s) {
                continue;
            }
            if let Some(srcs) = incoming.get(&s) {
                for src in srcs {
                    queue.push_back(*src);
                }
            }
        }

        let alive: Vec<StateId> = forward.intersection(&backward).copied().collect();
        let mut renumber: HashMap<StateId, StateId> = HashMap::new();
        for (new, old) in alive.iter().enumerate() {
            renumber.insert(*old, new);
        }

        let mut out = Nfa::with_states(alive.len(), self.symbol_map.clone());
        for s in &self.initial {
            if let Some(n) = renumber.get(s) {
                out.mark_initial(*n);
            }
        }
        for s in &self.accepting {
            if let Some(n) = renumber.get(s) {
                out.mark_accept(*n);
            }
        }
        for (src, sym, dst) in &self.transitions {
            if let (Some(s), Some(d)) = (renumber.get(src), renumber.get(dst)) {
                out.add_transition(*s, *sym, *d);
            }
        }
        out
    }

    /// Currently trimming only; callers do not depend on canonical
    /// minimality, so equivalent-state merging is left out.
    pub fn minimise(&self) -> Nfa {
        self.trim()
    }

    /// A shortest accepted word, or `None` when the language is empty.
    /// `Some(vec![])` means the empty word is accepted.
    pub fn witness(&self) -> Option<Vec<Symbol>> {
        let outgoing = self.outgoing();
        let mut pred: HashMap<StateId, (StateId, Symbol)> = HashMap::new();
        let mut seen: BTreeSet<StateId> = self.initial.iter().copied().collect();
        let mut queue: VecDeque<StateId> = self.initial.iter().copied().collect();

        let mut hit = self
            .initial
            .iter()
            .find(|s| self.accepting.contains(*s))
            .copied();
        while hit.is_none() {
            let Some(s) = queue.pop_front() else { break };
            if let Some(edges) = outgoing.get(&s) {
                for (sym, dst) in edges {
                    if seen.insert(*dst) {
                        pred.insert(*dst, (s, *sym));
                        if self.accepting.contains(dst) {
                            hit = Some(*dst);
                            break;
                        }
                        queue.push_back(*dst);
                    }
                }
            }
        }

        let mut state = hit?;
        let mut word = Vec::new();
        while let Some((prev, sym)) = pred.get(&state) {
            word.push(*sym);
            state = *prev;
        }
        word.reverse();
        Some(word)
    }

    pub fn is_empty(&self) -> bool {
        self.witness().is_none()
    }

    /// Membership test by direct NFA simulation.
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let outgoing = self.outgoing();
        let mut current: BTreeSet<StateId> = self.initial.iter().copied().collect();
        for sym in word {
            let mut next = BTreeSet::new();
            for s in &current {
                if let Some(edges) = outgoing.get(s) {
                    for (edge_sym, dst) in edges {
                        if edge_sym == sym {
                            next.insert(*dst);
                        }
                    }
                }
            }
            current = next;
            if current.is_empty() {
                return false;
            }
        }
        current.iter().any(|s| self.accepting.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map1() -> SymbolMap {
        SymbolMap::single(vec!["p".into()])
    }

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn word(s: &str) -> Vec<Symbol> {
        s.chars().map(|c| sym(&c.to_string())).collect()
    }

    /// Accepts exactly the word "10".
    fn exactly_10() -> Nfa {
        let mut a = Nfa::with_states(3, map1());
        a.mark_initial(0);
        a.mark_accept(2);
        a.add_transition(0, sym("1"), 1);
        a.add_transition(1, sym("0"), 2);
        a
    }

    /// Accepts 1*.
    fn ones() -> Nfa {
        let mut a = Nfa::with_states(1, map1());
        a.mark_initial(0);
        a.mark_accept(0);
        a.add_transition(0, sym("1"), 0);
        a
    }

    #[test]
    fn test_accepts() {
        let a = exactly_10();
        assert!(a.accepts(&word("10")));
        assert!(!a.accepts(&word("1")));
        assert!(!a.accepts(&word("101")));
        assert!(!a.accepts(&[]));
    }

    #[test]
    fn test_union() {
        let u = exactly_10().union(&ones()).unwrap();
        assert!(u.accepts(&word("10")));
        assert!(u.accepts(&word("111")));
        assert!(u.accepts(&[]));
        assert!(!u.accepts(&word("01")));
    }

    #[test]
    fn test_intersect() {
        let i = ones().intersect(&exactly_10()).unwrap();
        assert!(i.is_empty());

        let j = ones().intersect(&ones()).unwrap();
        assert!(j.accepts(&word("11")));
        assert!(j.accepts(&[]));
    }

    #[test]
    fn test_alphabet_mismatch() {
        let other = Nfa::with_states(1, SymbolMap::single(vec!["p".into(), "q".into()]));
        assert!(matches!(
            ones().intersect(&other),
            Err(Error::AlphabetMismatch(_))
        ));
    }

    #[test]
    fn test_determinise_is_total_and_equivalent() {
        let d = exactly_10().determinise();
        // Complete: one successor per state per symbol.
        let expected = d.num_states() * 2;
        assert_eq!(d.transitions().count(), expected);
        for w in ["", "1", "10", "100", "01"] {
            assert_eq!(d.accepts(&word(w)), exactly_10().accepts(&word(w)));
        }
    }

    #[test]
    fn test_complement() {
        let c = ones().complement();
        assert!(!c.accepts(&[]));
        assert!(!c.accepts(&word("11")));
        assert!(c.accepts(&word("0")));
        assert!(c.accepts(&word("10")));
    }

    #[test]
    fn test_trim_drops_useless_states() {
        let mut a = exactly_10();
        // A state reachable from nowhere and a dead end.
        let dead = a.add_state();
        a.add_transition(1, sym("1"), dead);
        let t = a.trim();
        assert_eq!(t.num_states(), 3);
        assert!(t.accepts(&word("10")));
        assert!(!t.accepts(&word("11")));
    }

    #[test]
    fn test_witness_is_shortest() {
        let mut a = exactly_10();
        a.mark_accept(1);
        assert_eq!(a.witness().unwrap(), word("1"));
    }

    #[test]
    fn test_witness_empty_word() {
        assert_eq!(ones().witness().unwrap(), vec![]);
    }

    #[test]
    fn test_emptiness() {
        let mut a = Nfa::with_states(2, map1());
        a.mark_initial(0);
        a.mark_accept(1);
        assert!(a.is_empty());
        a.add_transition(0, sym("0"), 1);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_transition_iteration_is_sorted() {
        let a = exactly_10();
        let ts: Vec<_> = a.transitions().collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted);
    }

    #[test]
    fn test_used_symbols() {
        let a = exactly_10();
        assert_eq!(a.used_symbols(), vec![sym("0"), sym("1")]);
    }
}
