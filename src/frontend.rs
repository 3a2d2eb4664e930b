//! Interface to the formula frontend collaborator.
//!
//! The frontend reduces a HyperLTL(MSO) formula to three automata — the
//! initial MSO automaton, the local-constraints transducer and the
//! eventuality-transitions transducer — plus the ordered trace-quantifier
//! prefix. Its output reaches this crate as a line-oriented *bundle* file:
//!
//! ```text
//! @Formula-bundle
//! %Quantifiers forall exists
//! %Trace-tape  x y
//! %Initial     initial.mata
//! %Local       local.mata
//! %Eventual    eventual.mata
//! ```
//!
//! Paths are resolved relative to the bundle file. The core never inspects
//! formula structure; it only consumes these machines and their maps.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::mata;
use crate::nfa::Nfa;
use crate::symbol::SymbolMap;

/// One HyperLTL trace quantifier. The polarity is consumed by the formula
/// frontend; the core uses the prefix length to fix the arity of the
/// multi-tape liftings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceQuantifier {
    Forall,
    Exists,
}

impl TraceQuantifier {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "forall" => Some(TraceQuantifier::Forall),
            "exists" => Some(TraceQuantifier::Exists),
            _ => None,
        }
    }
}

/// The compiled output of the formula frontend.
pub struct FormulaBundle {
    pub quantifiers: Vec<TraceQuantifier>,
    /// Automaton over the per-trace tapes plus the trailing MSO trace tape.
    pub initial_mso: Nfa,
    /// Transducer over the paired per-trace tapes plus configuration tapes.
    pub local_constraints: Nfa,
    /// Transducer marking the eventuality transitions, same alphabet as
    /// the local constraints.
    pub eventuality: Nfa,
    /// Proposition names of the trailing MSO tape.
    pub trace_tape: Vec<String>,
}

/// Load a formula bundle. `propositions` is the system's atomic-proposition
/// list from the symbol-mapping file; it fixes the per-trace tape layout of
/// all three automata.
pub fn load_bundle(path: &Path, propositions: &[String]) -> Result<FormulaBundle, Error> {
    let label = path.display().to_string();
    let input =
        std::fs::read_to_string(path).map_err(|e| Error::parse(label.clone(), e.to_string()))?;

    let mut quantifiers: Vec<TraceQuantifier> = Vec::new();
    let mut trace_tape: Vec<String> = Vec::new();
    let mut initial_path: Option<PathBuf> = None;
    let mut local_path: Option<PathBuf> = None;
    let mut eventual_path: Option<PathBuf> = None;

    let base = path.parent().unwrap_or(Path::new("."));
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("@Formula-bundle") {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "%Quantifiers" => {
                for token in &tokens[1..] {
                    let q = TraceQuantifier::parse(token).ok_or_else(|| {
                        Error::parse(&label, format!("unknown quantifier: {token}"))
                    })?;
                    quantifiers.push(q);
                }
            }
            "%Trace-tape" => {
                trace_tape = tokens[1..].iter().map(|s| s.to_string()).collect();
            }
            "%Initial" if tokens.len() == 2 => initial_path = Some(base.join(tokens[1])),
            "%Local" if tokens.len() == 2 => local_path = Some(base.join(tokens[1])),
            "%Eventual" if tokens.len() == 2 => eventual_path = Some(base.join(tokens[1])),
            _ => return Err(Error::parse(&label, format!("malformed line: {line}"))),
        }
    }

    if quantifiers.is_empty() {
        return Err(Error::parse(&label, "missing %Quantifiers"));
    }
    let initial_path =
        initial_path.ok_or_else(|| Error::parse(&label, "missing %Initial"))?;
    let local_path = local_path.ok_or_else(|| Error::parse(&label, "missing %Local"))?;
    let eventual_path =
        eventual_path.ok_or_else(|| Error::parse(&label, "missing %Eventual"))?;

    // Per-trace tapes, one per quantifier, plus the trailing MSO tape.
    let mut initial_tapes: Vec<Vec<String>> =
        vec![propositions.to_vec(); quantifiers.len()];
    initial_tapes.push(trace_tape.clone());
    let initial_map = SymbolMap::new(initial_tapes.clone());
    let half_map = SymbolMap::new(initial_tapes);

    let initial_mso = mata::parse_nfa_file(&initial_path, initial_map)?;
    let local_constraints = mata::parse_transducer_file(&local_path, &half_map)?;
    let eventuality = mata::parse_transducer_file(&eventual_path, &half_map)?;

    Ok(FormulaBundle {
        quantifiers,
        initial_mso,
        local_constraints,
        eventuality,
        trace_tape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_bundle() {
        let dir = std::env::temp_dir().join("hypercert-bundle-test");
        std::fs::create_dir_all(&dir).unwrap();
        write_temp(
            &dir,
            "initial.mata",
            "%States-enum s0\n%Initial s0\n%Final s0\ns0 11 s0\n",
        );
        write_temp(
            &dir,
            "local.mata",
            "%States-enum s0\n%Initial s0\n%Final s0\ns0 1111 s0\n",
        );
        write_temp(
            &dir,
            "eventual.mata",
            "%States-enum s0\n%Initial s0\n%Final s0\n",
        );
        let bundle_path = write_temp(
            &dir,
            "formula.bundle",
            "@Formula-bundle\n\
             %Quantifiers forall\n\
             %Trace-tape x\n\
             %Initial initial.mata\n\
             %Local local.mata\n\
             %Eventual eventual.mata\n",
        );

        let bundle = load_bundle(&bundle_path, &["p".into()]).unwrap();
        assert_eq!(bundle.quantifiers, vec![TraceQuantifier::Forall]);
        assert_eq!(bundle.trace_tape, vec!["x".to_string()]);
        // One per-trace tape plus the MSO tape.
        assert_eq!(bundle.initial_mso.number_of_tapes(), 2);
        assert_eq!(bundle.initial_mso.symbol_map().width(), 2);
        // The transducers pair the halves.
        assert_eq!(bundle.local_constraints.number_of_tapes(), 4);
        assert_eq!(bundle.local_constraints.symbol_map().width(), 4);
        assert_eq!(bundle.eventuality.symbol_map().width(), 4);
    }

    #[test]
    fn test_load_bundle_rejects_unknown_quantifier() {
        let dir = std::env::temp_dir().join("hypercert-bundle-bad");
        std::fs::create_dir_all(&dir).unwrap();
        let bundle_path = write_temp(&dir, "formula.bundle", "%Quantifiers sometimes\n");
        assert!(matches!(
            load_bundle(&bundle_path, &["p".into()]),
            Err(Error::InputParse { .. })
        ));
    }
}
