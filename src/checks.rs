//! The semantic side-conditions of the synthesis loop, phrased as automata
//! queries over the engine: language inclusion with witness extraction,
//! irreflexivity and transitivity of the relation, the reachability
//! condition, and the eventuality-progress condition.

use crate::error::Error;
use crate::frontend::TraceQuantifier;
use crate::nfa::Nfa;
use crate::symbol::{Symbol, SymbolMap};

/// A shortest word in L(sub) ∖ L(sup), or `None` when L(sub) ⊆ L(sup).
pub fn inclusion_witness(sub: &Nfa, sup: &Nfa) -> Result<Option<Vec<Symbol>>, Error> {
    let difference = sub.intersect(&sup.complement())?;
    Ok(difference.witness())
}

/// The identity relation over the paired alphabet of `map`: pairs ⟨c, c⟩.
pub fn identity_relation(map: &SymbolMap) -> Nfa {
    let half = map.width() / 2;
    let mut id = Nfa::with_states(1, map.clone());
    id.mark_initial(0);
    id.mark_accept(0);
    for sym in Symbol::enumerate(half) {
        id.add_transition(0, sym.concat(&sym), 0);
    }
    id
}

/// Lift a configuration language to the paired alphabet of `map`,
/// constraining the first half and leaving the second half free.
pub fn cylindrify_first_half(aut: &Nfa, map: &SymbolMap) -> Result<Nfa, Error> {
    if *aut.symbol_map() != map.first_half() {
        return Err(Error::AlphabetMismatch(
            "configuration language does not match the first half of the pair alphabet".into(),
        ));
    }
    let half = map.width() / 2;
    let mut out = Nfa::with_states(aut.num_states(), map.clone());
    for s in aut.initial_states() {
        out.mark_initial(s);
    }
    for s in aut.accepting_states() {
        out.mark_accept(s);
    }
    for (src, sym, dst) in aut.transitions() {
        for free in Symbol::enumerate(half) {
            out.add_transition(*src, sym.concat(&free), *dst);
        }
    }
    Ok(out)
}

/// Relational composition: ⟨a, c⟩ is accepted iff some b has ⟨a, b⟩ ∈
/// L(first) and ⟨b, c⟩ ∈ L(second). Product construction synchronised on
/// the middle configuration.
pub fn compose(first: &Nfa, second: &Nfa) -> Result<Nfa, Error> {
    if first.symbol_map() != second.symbol_map() {
        return Err(Error::AlphabetMismatch(
            "composition requires identical pair alphabets".into(),
        ));
    }
    use std::collections::{BTreeMap, VecDeque};

    let mut ids: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut out = Nfa::with_states(0, first.symbol_map().clone());
    let mut queue = VecDeque::new();
    for p in first.initial_states() {
        for q in second.initial_states() {
            let id = out.add_state();
            out.mark_initial(id);
            ids.insert((p, q), id);
            queue.push_back((p, q));
        }
    }
    while let Some((p, q)) = queue.pop_front() {
        let id = ids[&(p, q)];
        if first.is_accepting(p) && second.is_accepting(q) {
            out.mark_accept(id);
        }
        for &(src1, sym1, dst1) in first.transitions() {
            if src1 != p {
                continue;
            }
            for &(src2, sym2, dst2) in second.transitions() {
                if src2 != q || sym1.second_half() != sym2.first_half() {
                    continue;
                }
                let next = *ids.entry((dst1, dst2)).or_insert_with(|| {
                    queue.push_back((dst1, dst2));
                    out.add_state()
                });
                out.add_transition(id, sym1.first_half().concat(&sym2.second_half()), next);
            }
        }
    }
    Ok(out)
}

/// One-step successors: the configurations c′ with ⟨c, c′⟩ ∈ L(step) for
/// some c ∈ L(from). Product of `from` with `step` synchronised on the
/// first half; the result ranges over the half alphabet.
pub fn post_image(from: &Nfa, step: &Nfa) -> Result<Nfa, Error> {
    let half_map = step.symbol_map().first_half();
    if *from.symbol_map() != half_map {
        return Err(Error::AlphabetMismatch(
            "post image requires the configuration language over the half alphabet".into(),
        ));
    }
    use std::collections::{BTreeMap, VecDeque};

    let mut ids: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut out = Nfa::with_states(0, half_map);
    let mut queue = VecDeque::new();
    for p in from.initial_states() {
        for q in step.initial_states() {
            let id = out.add_state();
            out.mark_initial(id);
            ids.insert((p, q), id);
            queue.push_back((p, q));
        }
    }
    while let Some((p, q)) = queue.pop_front() {
        let id = ids[&(p, q)];
        if from.is_accepting(p) && step.is_accepting(q) {
            out.mark_accept(id);
        }
        for &(src1, sym1, dst1) in from.transitions() {
            if src1 != p {
                continue;
            }
            for &(src2, sym2, dst2) in step.transitions() {
                if src2 != q || sym1 != sym2.first_half() {
                    continue;
                }
                let next = *ids.entry((dst1, dst2)).or_insert_with(|| {
                    queue.push_back((dst1, dst2));
                    out.add_state()
                });
                out.add_transition(id, sym2.second_half(), next);
            }
        }
    }
    Ok(out.minimise())
}

/// Check 1 — initial inclusion: L(I) ⊆ L(A).
///
/// The witness, when any, is reported with the trailing auxiliary-tape
/// bits erased; the encoder re-expands it over those positions.
pub fn initial_inclusion(initial: &Nfa, invariant: &Nfa) -> Result<Option<Vec<Symbol>>, Error> {
    let Some(witness) = inclusion_witness(initial, invariant)? else {
        return Ok(None);
    };
    let map = invariant.symbol_map();
    let keep = map.width() - map.tape(map.number_of_tapes() - 1).len();
    Ok(Some(witness.iter().map(|s| s.slice(0, keep)).collect()))
}

/// Check 2 — inductiveness: one S̃-step keeps invariant configurations in
/// the invariant.
pub fn inductiveness(extended: &Nfa, invariant: &Nfa) -> Result<bool, Error> {
    let post = post_image(invariant, extended)?;
    Ok(inclusion_witness(&post, invariant)?.is_none())
}

/// Check 3 — irreflexivity of the relation: no ⟨c, c⟩ ∈ L(T). The witness
/// is the offending pair word.
pub fn irreflexive(relation: &Nfa) -> Result<Option<Vec<Symbol>>, Error> {
    let identity = identity_relation(relation.symbol_map());
    Ok(relation.intersect(&identity)?.witness())
}

/// Check 4 — transitivity of the relation on invariant configurations:
/// T∘T ⊆ T with both stepped-through configurations restricted to L(A).
pub fn transitive(relation: &Nfa, invariant: &Nfa) -> Result<bool, Error> {
    let restricted =
        relation.intersect(&cylindrify_first_half(invariant, relation.symbol_map())?)?;
    let composed = compose(&restricted, &restricted)?;
    Ok(inclusion_witness(&composed, relation)?.is_none())
}

/// Check 5 — backwards reachability: every invariant configuration lies in
/// the (bounded) forward closure of the initial configurations under S̃.
pub fn backwards_reachable(
    invariant: &Nfa,
    initial: &Nfa,
    extended: &Nfa,
    iteration_bound: usize,
) -> Result<bool, Error> {
    let mut reach = initial.minimise();
    for _ in 0..iteration_bound {
        if inclusion_witness(invariant, &reach)?.is_none() {
            return Ok(true);
        }
        let next = reach.union(&post_image(&reach, extended)?)?.minimise();
        if inclusion_witness(&next, &reach)?.is_none() {
            // Fixpoint: the closure is exact.
            return Ok(inclusion_witness(invariant, &next)?.is_none());
        }
        reach = next;
    }
    Ok(inclusion_witness(invariant, &reach)?.is_none())
}

/// The inputs of the trace-quantifier / eventuality condition. The
/// original system transducer and initial automaton are part of the
/// collaborator contract and travel with the context.
pub struct TransitionContext<'a> {
    pub extended: &'a Nfa,
    pub eventual: &'a Nfa,
    pub system: &'a Nfa,
    pub initial: &'a Nfa,
    pub quantifiers: &'a [TraceQuantifier],
}

/// Check 6 — eventuality progress: every eventuality transition taken from
/// an invariant configuration is a decrease of the relation,
/// L(S̃ ∩ E ∩ cyl(A)) ⊆ L(T).
pub fn transition_condition(
    ctx: &TransitionContext<'_>,
    invariant: &Nfa,
    relation: &Nfa,
) -> Result<bool, Error> {
    let expected_tapes = (ctx.quantifiers.len() + 1) * 2;
    if ctx.extended.number_of_tapes() != expected_tapes {
        return Err(Error::AlphabetMismatch(format!(
            "extended transducer has {} tapes, trace quantifiers require {expected_tapes}",
            ctx.extended.number_of_tapes()
        )));
    }
    let eventuality_steps = ctx.extended.intersect(ctx.eventual)?;
    let from_invariant = eventuality_steps
        .intersect(&cylindrify_first_half(invariant, ctx.extended.symbol_map())?)?;
    Ok(inclusion_witness(&from_invariant, relation)?.is_none())
}
