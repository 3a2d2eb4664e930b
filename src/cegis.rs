//! The counter-example-guided synthesis loop.
//!
//! Candidates for the invariant A and the relation T are drawn from a SAT
//! solver, checked semantically in a fixed order, and every failing check
//! either refines the encoding with new clauses or, for a user-supplied
//! certificate, aborts with the matching rejection.

use log::{debug, info};

use crate::checks;
use crate::checks::TransitionContext;
use crate::encode::{expand_projected_word, CandidateLayout, VarAllocator};
use crate::error::{CheckFailure, Error};
use crate::frontend::TraceQuantifier;
use crate::nfa::Nfa;
use crate::solver::{Lit, SatSolver, VarisatSolver};

/// The certificate pair: invariant automaton plus well-founded-relation
/// transducer.
pub struct AdviceBits {
    pub invariant: Nfa,
    pub relation: Nfa,
}

/// Tunables of one synthesis run.
pub struct CegisConfig {
    /// State bound for the generated automata.
    pub max_states: usize,
    /// Separate state bound for the relation, defaulting to `max_states`.
    pub relation_bound: Option<usize>,
    /// Skip a refinement when the current model has more true literals
    /// than this, to keep the clause count from exploding; the next model
    /// is requested instead.
    pub refine_guard: usize,
    /// Assert the completeness base clauses (total transition relation).
    pub completeness: bool,
    /// Assert the determinism base clauses.
    pub determinism: bool,
    /// Run the inductiveness check (step 2). Off by default.
    pub inductiveness: bool,
    /// Iteration bound of the reachability fixpoint (check 5).
    pub reach_bound: usize,
}

impl CegisConfig {
    pub fn new(max_states: usize) -> Self {
        Self {
            max_states,
            relation_bound: None,
            refine_guard: 15,
            completeness: false,
            determinism: false,
            inductiveness: false,
            reach_bound: 32,
        }
    }
}

/// The automata a synthesis run works over.
pub struct SynthesisInputs<'a> {
    /// Restricted initial-configuration automaton, over the half alphabet.
    pub initial: &'a Nfa,
    /// Extended transducer S̃ of the system.
    pub extended: &'a Nfa,
    /// The original system transducer.
    pub system: &'a Nfa,
    /// Eventuality-transitions transducer, same alphabet as S̃.
    pub eventual: &'a Nfa,
    pub quantifiers: &'a [TraceQuantifier],
    /// A user-supplied relation; checked instead of synthesised.
    pub supplied_relation: Option<&'a Nfa>,
    /// A user-supplied invariant; checked instead of synthesised.
    pub supplied_invariant: Option<&'a Nfa>,
}

/// Synthesise advice bits with the default SAT backend. `Ok(None)` means
/// the solver exhausted all models within the state bound.
pub fn synthesize(
    inputs: &SynthesisInputs<'_>,
    config: &CegisConfig,
) -> Result<Option<AdviceBits>, Error> {
    let mut solver = VarisatSolver::new();
    synthesize_with(inputs, config, &mut solver)
}

/// Synthesise advice bits on a caller-provided solver.
pub fn synthesize_with(
    inputs: &SynthesisInputs<'_>,
    config: &CegisConfig,
    solver: &mut dyn SatSolver,
) -> Result<Option<AdviceBits>, Error> {
    let mut alloc = VarAllocator::new();
    let full_map = inputs.extended.symbol_map().clone();
    let half_map = full_map.first_half();

    // Layouts for whichever of A, T is synthesised. The effective alphabets
    // are the symbols seen on the relevant tapes of the extended transducer.
    let invariant_layout = match inputs.supplied_invariant {
        Some(_) => None,
        None => Some(CandidateLayout::allocate(
            &mut alloc,
            config.max_states,
            inputs.extended.used_symbols_first_half(),
            half_map.clone(),
            false,
        )),
    };
    let relation_layout = match inputs.supplied_relation {
        Some(_) => None,
        None => Some(CandidateLayout::allocate(
            &mut alloc,
            config.relation_bound.unwrap_or(config.max_states),
            inputs.extended.used_symbols(),
            full_map.clone(),
            true,
        )),
    };

    let mut decision_vars: Vec<Lit> = Vec::new();
    for layout in invariant_layout.iter().chain(relation_layout.iter()) {
        layout.base_clauses(solver);
        if config.completeness {
            layout.completeness_clauses(solver);
        }
        if config.determinism {
            layout.determinism_clauses(solver);
        }
        decision_vars.extend(layout.decision_vars());
    }

    let ctx = TransitionContext {
        extended: inputs.extended,
        eventual: inputs.eventual,
        system: inputs.system,
        initial: inputs.initial,
        quantifiers: inputs.quantifiers,
    };

    let mut iterations = 0usize;
    while solver.solve()? {
        let model = solver
            .model()
            .ok_or_else(|| Error::Solver("sat without a model".into()))?;
        // Block this candidate up front so that every restart path below
        // advances the enumeration.
        if !decision_vars.is_empty() {
            let positive: std::collections::HashSet<Lit> =
                model.iter().copied().filter(|l| *l > 0).collect();
            let blocking: Vec<Lit> = decision_vars
                .iter()
                .map(|v| if positive.contains(v) { -v } else { *v })
                .collect();
            solver.add_clause(&blocking);
        }
        iterations += 1;
        info!("iteration {iterations}");

        let invariant = match (inputs.supplied_invariant, &invariant_layout) {
            (Some(aut), _) => (*aut).clone(),
            (None, Some(layout)) => layout.decode(&model),
            (None, None) => unreachable!(),
        };
        let relation = match (inputs.supplied_relation, &relation_layout) {
            (Some(aut), _) => (*aut).clone(),
            (None, Some(layout)) => layout.decode(&model),
            (None, None) => unreachable!(),
        };

        // 1) inclusion of the initial configurations.
        if let Some(witness) = checks::initial_inclusion(inputs.initial, &invariant)? {
            if inputs.supplied_invariant.is_some() {
                return Err(Error::CertificateRejected(CheckFailure::InitialNotContained));
            }
            let true_literals = model.iter().filter(|l| **l > 0).count();
            if true_literals > config.refine_guard {
                debug!("refinement skipped: {true_literals} true literals exceed the guard");
                continue;
            }
            let layout = invariant_layout.as_ref().unwrap();
            let words = expand_projected_word(&witness, layout.width());
            let aux = layout.accept_at_least_one_of(&words, solver, &mut alloc);
            debug!("initial inclusion refined: {} words, {aux} auxiliaries", words.len());
            continue;
        }

        // 2) inductiveness.
        if config.inductiveness && !checks::inductiveness(inputs.extended, &invariant)? {
            if inputs.supplied_invariant.is_some() {
                return Err(Error::CertificateRejected(CheckFailure::NotInductive));
            }
            debug!("candidate invariant not inductive");
            continue;
        }

        // 3) irreflexivity of the relation.
        if let Some(word) = checks::irreflexive(&relation)? {
            if inputs.supplied_relation.is_some() {
                return Err(Error::CertificateRejected(CheckFailure::NotIrreflexive));
            }
            relation_layout.as_ref().unwrap().reject(&word, solver);
            debug!("irreflexivity refined: rejected a reflexive pair");
            continue;
        }

        // 4) transitivity of the relation on invariant configurations.
        if !checks::transitive(&relation, &invariant)? {
            if inputs.supplied_relation.is_some() && inputs.supplied_invariant.is_some() {
                return Err(Error::CertificateRejected(CheckFailure::NotTransitive));
            }
            debug!("candidate relation not transitive");
            continue;
        }

        // 5) backwards reachability.
        if !checks::backwards_reachable(
            &invariant,
            inputs.initial,
            inputs.extended,
            config.reach_bound,
        )? {
            if inputs.supplied_relation.is_some() && inputs.supplied_invariant.is_some() {
                return Err(Error::CertificateRejected(CheckFailure::BackwardsReachability));
            }
            debug!("candidate invariant not backwards reachable");
            continue;
        }

        // 6) trace-quantifier / eventuality condition.
        if checks::transition_condition(&ctx, &invariant, &relation)? {
            info!("advice bits found after {iterations} iterations");
            return Ok(Some(AdviceBits {
                invariant,
                relation,
            }));
        }
        if inputs.supplied_relation.is_some() && inputs.supplied_invariant.is_some() {
            return Err(Error::CertificateRejected(CheckFailure::TransitionCondition));
        }
        debug!("transition condition failed");
    }

    info!("model enumeration exhausted after {iterations} iterations");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolMap};
    use crate::tape::multitape_lift_transducer;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    /// Identity system transducer over one atomic proposition.
    fn identity_system() -> Nfa {
        let map = SymbolMap::new(vec![vec!["a".into()], vec!["a".into()]]);
        let mut t = Nfa::with_states(1, map);
        t.mark_initial(0);
        t.mark_accept(0);
        t.add_transition(0, sym("00"), 0);
        t.add_transition(0, sym("11"), 0);
        t
    }

    /// The extended transducer for one universal trace quantifier.
    fn extended() -> Nfa {
        multitape_lift_transducer(&identity_system(), 4).unwrap()
    }

    /// Initial configurations 1* over the half alphabet of `extended`.
    fn initial_ones(half_map: SymbolMap) -> Nfa {
        let mut a = Nfa::with_states(1, half_map);
        a.mark_initial(0);
        a.mark_accept(0);
        a.add_transition(0, sym("1"), 0);
        a
    }

    /// Initial configurations accepting exactly the word "10".
    fn initial_exactly_10(half_map: SymbolMap) -> Nfa {
        let mut a = Nfa::with_states(3, half_map);
        a.mark_initial(0);
        a.mark_accept(2);
        a.add_transition(0, sym("1"), 1);
        a.add_transition(1, sym("0"), 2);
        a
    }

    /// Initial configurations accepting exactly the word "1".
    fn initial_exactly_1(half_map: SymbolMap) -> Nfa {
        let mut a = Nfa::with_states(2, half_map);
        a.mark_initial(0);
        a.mark_accept(1);
        a.add_transition(0, sym("1"), 1);
        a
    }

    #[test]
    fn test_trivial_invariant_synthesis() {
        // Identity system, I = 1*, no eventuality obligations: the loop
        // must produce an invariant containing I and an irreflexive,
        // transitive relation.
        let system = identity_system();
        let extended = extended();
        let initial = initial_ones(extended.symbol_map().first_half());
        let eventual = Nfa::with_states(0, extended.symbol_map().clone());
        let quantifiers = [TraceQuantifier::Forall];

        let inputs = SynthesisInputs {
            initial: &initial,
            extended: &extended,
            system: &system,
            eventual: &eventual,
            quantifiers: &quantifiers,
            supplied_relation: None,
            supplied_invariant: None,
        };
        let advice = synthesize(&inputs, &CegisConfig::new(1)).unwrap().unwrap();

        // Soundness: all checks hold on the returned pair.
        assert!(checks::initial_inclusion(&initial, &advice.invariant)
            .unwrap()
            .is_none());
        assert!(checks::irreflexive(&advice.relation).unwrap().is_none());
        assert!(checks::transitive(&advice.relation, &advice.invariant).unwrap());
        assert!(
            checks::backwards_reachable(&advice.invariant, &initial, &extended, 32).unwrap()
        );
    }

    #[test]
    fn test_supplied_irreflexive_violation_rejected() {
        // A supplied relation accepting ⟨00, 00⟩ must abort the run.
        let system = identity_system();
        let extended = extended();
        let initial = initial_ones(extended.symbol_map().first_half());
        let eventual = Nfa::with_states(0, extended.symbol_map().clone());
        let quantifiers = [TraceQuantifier::Forall];

        let mut relation = Nfa::with_states(3, extended.symbol_map().clone());
        relation.mark_initial(0);
        relation.mark_accept(2);
        relation.add_transition(0, sym("00"), 1);
        relation.add_transition(1, sym("00"), 2);

        // Invariant accepting every configuration.
        let mut invariant = Nfa::with_states(1, extended.symbol_map().first_half());
        invariant.mark_initial(0);
        invariant.mark_accept(0);
        invariant.add_transition(0, sym("0"), 0);
        invariant.add_transition(0, sym("1"), 0);

        let inputs = SynthesisInputs {
            initial: &initial,
            extended: &extended,
            system: &system,
            eventual: &eventual,
            quantifiers: &quantifiers,
            supplied_relation: Some(&relation),
            supplied_invariant: Some(&invariant),
        };
        let result = synthesize(&inputs, &CegisConfig::new(2));
        assert!(matches!(
            result,
            Err(Error::CertificateRejected(CheckFailure::NotIrreflexive))
        ));
    }

    #[test]
    fn test_unsatisfiable_bound_reports_no_solution() {
        // L(I) = {10} needs three states; with the invariant forced to
        // equal the reachable language, bound 2 admits no candidate.
        let system = identity_system();
        let extended = extended();
        let initial = initial_exactly_10(extended.symbol_map().first_half());
        let eventual = Nfa::with_states(0, extended.symbol_map().clone());
        let quantifiers = [TraceQuantifier::Forall];
        // Supply a valid (empty) relation so only the invariant is
        // enumerated.
        let relation = Nfa::with_states(0, extended.symbol_map().clone());

        let inputs = SynthesisInputs {
            initial: &initial,
            extended: &extended,
            system: &system,
            eventual: &eventual,
            quantifiers: &quantifiers,
            supplied_relation: Some(&relation),
            supplied_invariant: None,
        };
        let result = synthesize(&inputs, &CegisConfig::new(2)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_refinement_reaches_required_word() {
        // The first candidates may reject "1"; the accept-at-least-one-of
        // refinement must steer the solver towards an invariant containing
        // it. Bound 2 is large enough for exactly {1} itself.
        let system = identity_system();
        let extended = extended();
        let initial = initial_exactly_1(extended.symbol_map().first_half());
        let eventual = Nfa::with_states(0, extended.symbol_map().clone());
        let quantifiers = [TraceQuantifier::Forall];
        let relation = Nfa::with_states(0, extended.symbol_map().clone());

        let inputs = SynthesisInputs {
            initial: &initial,
            extended: &extended,
            system: &system,
            eventual: &eventual,
            quantifiers: &quantifiers,
            supplied_relation: Some(&relation),
            supplied_invariant: None,
        };
        let mut config = CegisConfig::new(2);
        // Keep refinements active for every model of this encoding.
        config.refine_guard = 64;
        let advice = synthesize(&inputs, &config).unwrap().unwrap();
        assert!(advice.invariant.accepts(&[sym("1")]));
    }
}
