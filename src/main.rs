use std::path::{Path, PathBuf};

use clap::Parser;
use hypercert::cegis::{synthesize, AdviceBits, CegisConfig, SynthesisInputs};
use hypercert::dot;
use hypercert::error::Error;
use hypercert::frontend::load_bundle;
use hypercert::mata::{parse_nfa_file, parse_transducer_file, read_symbol_mapping};
use hypercert::nfa::Nfa;
use hypercert::pipeline::{restrict_initial, restrict_transducer};
use hypercert::symbol::SymbolMap;

#[derive(Parser)]
#[command(
    name = "hypercert",
    about = "Synthesis of advice bits for HyperLTL(MSO) properties of regular transition systems"
)]
struct Cli {
    /// Path to the formula bundle produced by the formula frontend.
    #[arg(long)]
    formula: PathBuf,

    /// Path to the .mata automaton of initial configurations.
    #[arg(long)]
    initial_config: PathBuf,

    /// Path to the .mata transducer of the system's transition relation.
    #[arg(long)]
    system_transducer: PathBuf,

    /// Path to the symbol-mapping file (one atomic proposition per line).
    #[arg(long)]
    symbol_mapping: PathBuf,

    /// Maximum number of states of the generated advice bits.
    #[arg(long)]
    max_states: usize,

    /// Optional .mata transducer to check as the relation instead of
    /// synthesising one.
    #[arg(long)]
    relation: Option<PathBuf>,

    /// Optional .mata automaton to check as the invariant instead of
    /// synthesising one.
    #[arg(long)]
    invariant: Option<PathBuf>,

    /// Optional separate state bound for the relation.
    #[arg(long)]
    relation_bound: Option<usize>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(Some(advice)) => {
            if let Err(e) = persist(&advice) {
                eprintln!("{e}");
                std::process::exit(2);
            }
            println!("Advice bits written to A.dot and T.dot");
        }
        Ok(None) => {
            eprintln!("Solution was not found for {} states", cli.max_states);
            std::process::exit(1);
        }
        Err(e @ Error::CertificateRejected(_)) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<Option<AdviceBits>, Error> {
    let propositions = read_symbol_mapping(&cli.symbol_mapping)?;
    let bundle = load_bundle(&cli.formula, &propositions)?;

    let system_half = SymbolMap::single(propositions.clone());
    let system = parse_transducer_file(&cli.system_transducer, &system_half)?;

    // Extended transducer S̃ and the restricted initial configurations.
    let extended = restrict_transducer(&system, &bundle.local_constraints, &bundle.quantifiers)?;
    let half_map = extended.symbol_map().first_half();
    let configuration_tape = half_map
        .tape(half_map.number_of_tapes() - 1)
        .to_vec();

    let raw_initial = parse_nfa_file(&cli.initial_config, SymbolMap::single(propositions))?;
    let initial = restrict_initial(
        &raw_initial,
        &bundle.initial_mso,
        &bundle.quantifiers,
        &configuration_tape,
    )?;

    let supplied_relation = cli
        .relation
        .as_deref()
        .map(|p| parse_transducer_file(p, &half_map))
        .transpose()?;
    let supplied_invariant = cli
        .invariant
        .as_deref()
        .map(|p| parse_nfa_file(p, half_map.clone()))
        .transpose()?;

    let mut config = CegisConfig::new(cli.max_states);
    config.relation_bound = cli.relation_bound;

    let inputs = SynthesisInputs {
        initial: &initial,
        extended: &extended,
        system: &system,
        eventual: &bundle.eventuality,
        quantifiers: &bundle.quantifiers,
        supplied_relation: supplied_relation.as_ref(),
        supplied_invariant: supplied_invariant.as_ref(),
    };
    synthesize(&inputs, &config)
}

fn persist(advice: &AdviceBits) -> Result<(), Error> {
    write_dot(&advice.invariant, "A", Path::new("A.dot"))?;
    write_dot(&advice.relation, "T", Path::new("T.dot"))
}

fn write_dot(aut: &Nfa, name: &str, path: &Path) -> Result<(), Error> {
    std::fs::write(path, dot::render(aut, name))
        .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))
}
