use thiserror::Error;

/// Which semantic side-condition a supplied certificate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckFailure {
    /// L(I) is not contained in the supplied invariant.
    InitialNotContained,
    /// The supplied invariant is not inductive under the extended transducer.
    NotInductive,
    /// The supplied relation accepts some pair ⟨c, c⟩.
    NotIrreflexive,
    /// The supplied relation is not transitive on invariant configurations.
    NotTransitive,
    /// Some invariant configuration is not reachable from the initial ones.
    BackwardsReachability,
    /// The trace-quantifier / eventuality condition does not hold.
    TransitionCondition,
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CheckFailure::InitialNotContained => "initial not contained",
            CheckFailure::NotInductive => "invariant not inductive",
            CheckFailure::NotIrreflexive => "relation not irreflexive",
            CheckFailure::NotTransitive => "relation not transitive",
            CheckFailure::BackwardsReachability => "backwards reachability fails",
            CheckFailure::TransitionCondition => "transition condition fails",
        };
        f.write_str(msg)
    }
}

/// Errors surfaced by parsing, the automata algebra and the synthesis loop.
///
/// Exhausted model enumeration is not an error: `synthesize` reports it as
/// `Ok(None)` and the driver prints the "no solution within bound" message.
#[derive(Debug, Error)]
pub enum Error {
    /// A malformed input file.
    #[error("parse error in {path}: {message}")]
    InputParse { path: String, message: String },

    /// An algebraic operation received operands with incompatible symbol
    /// maps. This indicates a bug in the lifting pipeline, not bad input.
    #[error("alphabet mismatch: {0}")]
    AlphabetMismatch(String),

    /// A user-supplied invariant or relation failed a semantic check.
    #[error("supplied certificate rejected: {0}")]
    CertificateRejected(CheckFailure),

    /// The SAT backend reported a failure.
    #[error("sat solver error: {0}")]
    Solver(String),
}

impl Error {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InputParse {
            path: path.into(),
            message: message.into(),
        }
    }
}
