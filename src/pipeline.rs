//! Construction of the synthesis inputs from the raw system automata and
//! the formula frontend's machines: the initial-configuration automaton is
//! lifted to one tape per trace quantifier and restricted by the initial
//! MSO automaton; the system transducer is lifted the same way and
//! restricted by the local-constraints transducer.

use crate::error::Error;
use crate::frontend::TraceQuantifier;
use crate::nfa::Nfa;
use crate::tape::{
    extend_alphabet_on_tape, extend_transducer_on_configuration_tapes, multitape_lift,
    multitape_lift_transducer, WhichTape,
};

/// Restrict the single-tape initial-configuration automaton with the
/// formula's initial MSO automaton, then re-shape its auxiliary tape to
/// the configuration-tape descriptor of the extended transducer. The
/// result ranges over the half alphabet of S̃.
pub fn restrict_initial(
    initial: &Nfa,
    formula_initial: &Nfa,
    quantifiers: &[TraceQuantifier],
    configuration_tape: &[String],
) -> Result<Nfa, Error> {
    let lifted = multitape_lift(initial, quantifiers.len() + 1)?;

    let formula_map = formula_initial.symbol_map();
    let trace_tape = formula_map
        .tape(formula_map.number_of_tapes() - 1)
        .to_vec();
    let extended = extend_alphabet_on_tape(&lifted, &trace_tape, WhichTape::Last).minimise();

    let restricted = extended
        .intersect(&formula_initial.minimise())?
        .minimise();

    let with_configuration =
        extend_alphabet_on_tape(&restricted, configuration_tape, WhichTape::Last);
    Ok(with_configuration.minimise())
}

/// Lift the system transducer to the trace-quantifier arity, fill its
/// configuration tapes, and restrict it with the local-constraints
/// transducer. The result is the extended transducer S̃.
pub fn restrict_transducer(
    system: &Nfa,
    formula_local: &Nfa,
    quantifiers: &[TraceQuantifier],
) -> Result<Nfa, Error> {
    let lifted = multitape_lift_transducer(system, (quantifiers.len() + 1) * 2)?;

    let formula_map = formula_local.symbol_map();
    let configuration_tape = formula_map
        .tape(formula_map.tapes_half() - 1)
        .to_vec();
    let extended = extend_transducer_on_configuration_tapes(&lifted, &configuration_tape)?;

    let restricted = extended.intersect(&formula_local.minimise())?;
    Ok(restricted.minimise())
}
