//! Operations that restructure the tape layout of an automaton's alphabet
//! while preserving its language under the intended semantic embedding:
//! cylindrification to richer tapes, existential projection of single bits,
//! and the multi-tape liftings used for trace-quantifier expansion.

use crate::error::Error;
use crate::nfa::Nfa;
use crate::symbol::{Symbol, SymbolMap};

/// Which tape a restructuring operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhichTape {
    Last,
    SecondToLast,
}

fn target_tape(map: &SymbolMap, which: WhichTape) -> usize {
    let n = map.number_of_tapes();
    match which {
        WhichTape::Last => n - 1,
        WhichTape::SecondToLast => n - 2,
    }
}

/// Copy states, initial and accepting sets into a fresh automaton over a
/// new map; transitions are filled in by the caller.
fn same_shape(aut: &Nfa, map: SymbolMap) -> Nfa {
    let mut out = Nfa::with_states(aut.num_states(), map);
    for s in aut.initial_states() {
        out.mark_initial(s);
    }
    for s in aut.accepting_states() {
        out.mark_accept(s);
    }
    out
}

/// Cylindrify the chosen tape to the richer descriptor.
///
/// Each new position named in `descriptor` maps to the bit of the same
/// proposition on the old tape when present; positions naming propositions
/// the old tape lacks are *free*, and every existing transition is lifted
/// once per assignment to the free positions (`2^f` copies). The state set
/// is unchanged.
pub fn extend_alphabet_on_tape(aut: &Nfa, descriptor: &[String], which: WhichTape) -> Nfa {
    let map = aut.symbol_map();
    let tape_index = target_tape(map, which);
    let old_tape = map.tape(tape_index);
    let prefix_len = map.tape_offset(tape_index);
    let suffix_len = map.width() - prefix_len - old_tape.len();

    // For each new position: the old in-tape position of the same
    // proposition, or None for a free position.
    let mapping: Vec<Option<usize>> = descriptor
        .iter()
        .map(|name| old_tape.iter().position(|p| p == name))
        .collect();
    let free_count = mapping.iter().filter(|m| m.is_none()).count();

    let mut new_map = map.clone();
    new_map.replace_tape(tape_index, descriptor.to_vec());

    let mut out = same_shape(aut, new_map);
    for (src, sym, dst) in aut.transitions() {
        for free in Symbol::enumerate(free_count) {
            let mut lifted = sym.slice(0, prefix_len);
            let mut next_free = 0;
            for m in &mapping {
                let bit = match m {
                    Some(j) => sym.bit(prefix_len + j),
                    None => {
                        next_free += 1;
                        free.bit(next_free - 1)
                    }
                };
                lifted = lifted.push_bit(bit);
            }
            let suffix = sym.slice(prefix_len + old_tape.len(), suffix_len);
            out.add_transition(*src, lifted.concat(&suffix), *dst);
        }
    }
    out
}

/// Existentially project away bit `index` of the chosen tape.
pub fn remove_symbol_on_index(aut: &Nfa, index: usize, which: WhichTape) -> Nfa {
    let map = aut.symbol_map();
    let tape_index = target_tape(map, which);
    let position = map.tape_offset(tape_index) + index;
    assert!(index < map.tape(tape_index).len(), "bit index out of range");

    let keep: Vec<usize> = (0..map.width()).filter(|p| *p != position).collect();
    let mut descriptor = map.tape(tape_index).to_vec();
    descriptor.remove(index);
    let mut new_map = map.clone();
    new_map.replace_tape(tape_index, descriptor);

    let mut out = same_shape(aut, new_map);
    for (src, sym, dst) in aut.transitions() {
        out.add_transition(*src, sym.project(&keep), *dst);
    }
    out
}

/// Append an empty tape (width 0) to the symbol map. Transitions are
/// unchanged.
pub fn create_new_tape(aut: &Nfa) -> Nfa {
    let mut new_map = aut.symbol_map().clone();
    new_map.push_empty_tape();
    let mut out = same_shape(aut, new_map);
    for (src, sym, dst) in aut.transitions() {
        out.add_transition(*src, *sym, *dst);
    }
    out
}

/// Lift a single-tape automaton to `n` tapes for trace-quantifier
/// expansion: `n-1` content tapes each independently constrained to the
/// original language, plus one trailing empty auxiliary tape.
///
/// Built as the intersection of `n-1` copies; copy `i` carries the original
/// symbol on tape `i` and all `2^{w·(n-2)}` assignments on the other
/// content tapes. The input is determinised first and the result is
/// minimised.
pub fn multitape_lift(aut: &Nfa, n: usize) -> Result<Nfa, Error> {
    assert!(n >= 2, "lift needs at least two tapes");
    if aut.number_of_tapes() != 1 {
        return Err(Error::AlphabetMismatch(
            "multitape lift requires a single-tape automaton".into(),
        ));
    }
    let det = aut.determinise();
    let w = det.symbol_map().width();

    let mut new_map = SymbolMap::new(vec![det.symbol_map().tape(0).to_vec(); n - 1]);
    new_map.push_empty_tape();

    let mut copies = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let mut copy = same_shape(&det, new_map.clone());
        for (src, sym, dst) in det.transitions() {
            for free in Symbol::enumerate(w * (n - 2)) {
                let mut lifted = Symbol::empty();
                let mut offset = 0;
                for j in 0..n - 1 {
                    if j == i {
                        lifted = lifted.concat(sym);
                    } else {
                        lifted = lifted.concat(&free.slice(offset, w));
                        offset += w;
                    }
                }
                copy.add_transition(*src, lifted, *dst);
            }
        }
        copies.push(copy);
    }

    let mut product = copies.remove(0);
    for copy in &copies {
        product = product.intersect(copy)?;
    }
    Ok(product.minimise())
}

/// The two-halves analogue of `multitape_lift` for transducers: each half
/// gets `n/2 - 1` content tapes plus one trailing empty auxiliary tape,
/// and copy `i` constrains tape `i` of *both* halves to the original
/// current/next symbols.
pub fn multitape_lift_transducer(t: &Nfa, n: usize) -> Result<Nfa, Error> {
    assert!(n >= 4 && n % 2 == 0, "transducer lift needs an even tape count of at least 4");
    if t.number_of_tapes() != 2 {
        return Err(Error::AlphabetMismatch(
            "transducer lift requires a two-tape transducer".into(),
        ));
    }
    let h = n / 2 - 1;
    let w = t.symbol_map().width() / 2;

    let mut half_map = SymbolMap::new(vec![t.symbol_map().tape(0).to_vec(); h]);
    half_map.push_empty_tape();
    let new_map = SymbolMap::paired(&half_map);

    let mut copies = Vec::with_capacity(h);
    for i in 0..h {
        let mut copy = same_shape(t, new_map.clone());
        for (src, sym, dst) in t.transitions() {
            let current = sym.first_half();
            let next = sym.second_half();
            for free in Symbol::enumerate((h - 1) * 2 * w) {
                let mut offset = 0;
                let mut lifted = Symbol::empty();
                for half in [&current, &next] {
                    for j in 0..h {
                        if j == i {
                            lifted = lifted.concat(half);
                        } else {
                            lifted = lifted.concat(&free.slice(offset, w));
                            offset += w;
                        }
                    }
                }
                copy.add_transition(*src, lifted, *dst);
            }
        }
        copies.push(copy);
    }

    let mut product = copies.remove(0);
    for copy in &copies {
        product = product.intersect(copy)?;
    }
    Ok(product.minimise())
}

/// Strip the trailing auxiliary tape, restoring an `n-1`-tape automaton.
pub fn remove_configuration_tape(aut: &Nfa) -> Nfa {
    let map = aut.symbol_map();
    assert!(map.number_of_tapes() > 1, "no tape to remove");
    let new_width = map.width() - map.tape(map.number_of_tapes() - 1).len();
    let mut new_map = map.clone();
    new_map.pop_tape();

    let mut out = same_shape(aut, new_map);
    for (src, sym, dst) in aut.transitions() {
        out.add_transition(*src, sym.slice(0, new_width), *dst);
    }
    out.minimise()
}

/// Fill the empty auxiliary tape of *both* halves of a transducer with
/// `descriptor`, enumerating all `2^{2·|descriptor|}` assignments per
/// transition.
pub fn extend_transducer_on_configuration_tapes(t: &Nfa, descriptor: &[String]) -> Result<Nfa, Error> {
    let map = t.symbol_map();
    let h = map.tapes_half();
    if !map.tape(h - 1).is_empty() || !map.tape(2 * h - 1).is_empty() {
        return Err(Error::AlphabetMismatch(
            "configuration tapes must be empty before extension".into(),
        ));
    }
    let len = descriptor.len();
    let half_width = map.width() / 2;

    let mut new_map = map.clone();
    new_map.replace_tape(h - 1, descriptor.to_vec());
    new_map.replace_tape(2 * h - 1, descriptor.to_vec());

    let mut out = same_shape(t, new_map);
    for (src, sym, dst) in t.transitions() {
        let current = sym.slice(0, half_width);
        let next = sym.slice(half_width, half_width);
        for free in Symbol::enumerate(2 * len) {
            let lifted = current
                .concat(&free.slice(0, len))
                .concat(&next)
                .concat(&free.slice(len, len));
            out.add_transition(*src, lifted, *dst);
        }
    }
    Ok(out)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_single_tape_nfa() -> impl Strategy<Value = Nfa> {
        let states = 1usize..4;
        states.prop_flat_map(|n| {
            let trans = proptest::collection::vec((0..n, any::<bool>(), 0..n), 0..8);
            let accepting = proptest::collection::vec(0..n, 0..n);
            (Just(n), trans, accepting).prop_map(|(n, trans, accepting)| {
                let mut a = Nfa::with_states(n, SymbolMap::single(vec!["p".into()]));
                a.mark_initial(0);
                for s in accepting {
                    a.mark_accept(s);
                }
                for (src, bit, dst) in trans {
                    a.add_transition(src, Symbol::new(bit as u64, 1), dst);
                }
                a
            })
        })
    }

    fn words_up_to(max_len: usize) -> Vec<Vec<Symbol>> {
        let mut out = vec![vec![]];
        let mut layer: Vec<Vec<Symbol>> = vec![vec![]];
        for _ in 0..max_len {
            let mut next = Vec::new();
            for w in &layer {
                for b in 0..2u64 {
                    let mut w2 = w.clone();
                    w2.push(Symbol::new(b, 1));
                    next.push(w2);
                }
            }
            out.extend(next.iter().cloned());
            layer = next;
        }
        out
    }

    proptest! {
        #[test]
        fn extend_remove_round_trip(a in arb_single_tape_nfa()) {
            let e = extend_alphabet_on_tape(&a, &["p".into(), "q".into()], WhichTape::Last);
            let r = remove_symbol_on_index(&e, 1, WhichTape::Last);
            for w in words_up_to(4) {
                prop_assert_eq!(r.accepts(&w), a.accepts(&w));
            }
        }

        #[test]
        fn lift_is_componentwise(a in arb_single_tape_nfa()) {
            // Every 2-bit word of the 3-tape lift projects to two words of
            // the original language, and conversely for equal-length pairs.
            let lifted = multitape_lift(&a, 3).unwrap();
            for u in words_up_to(3) {
                for v in words_up_to(3) {
                    if u.len() != v.len() {
                        continue;
                    }
                    let paired: Vec<Symbol> = u
                        .iter()
                        .zip(v.iter())
                        .map(|(x, y)| x.concat(y))
                        .collect();
                    let expected = a.accepts(&u) && a.accepts(&v);
                    prop_assert_eq!(lifted.accepts(&paired), expected);
                }
            }
        }
    }
}
