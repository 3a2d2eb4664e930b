//! Line-oriented `.mata` input and output.
//!
//! ```text
//! @NFA-explicit
//! %States-enum  s0 s1 s2
//! %Initial      s0
//! %Final        s2
//! s0 <symbol>   s1
//! ```
//!
//! Transducer files store the paired symbol `current·next`; an odd-length
//! stored symbol carries a one-character separator at the midpoint, which
//! the reader drops.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::nfa::Nfa;
use crate::symbol::{Symbol, SymbolMap};

struct RawAutomaton {
    states: Vec<String>,
    initial: Vec<String>,
    fin: Vec<String>,
    transitions: Vec<(String, String, String)>,
}

fn parse_raw(input: &str, path: &str) -> Result<RawAutomaton, Error> {
    let mut raw = RawAutomaton {
        states: Vec::new(),
        initial: Vec::new(),
        fin: Vec::new(),
        transitions: Vec::new(),
    };
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("@NFA-explicit") {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if line.starts_with("%States-enum") {
            raw.states = tokens[1..].iter().map(|s| s.to_string()).collect();
        } else if line.starts_with("%Initial") {
            raw.initial = tokens[1..].iter().map(|s| s.to_string()).collect();
        } else if line.starts_with("%Final") {
            raw.fin = tokens[1..].iter().map(|s| s.to_string()).collect();
        } else if tokens.len() == 3 {
            raw.transitions.push((
                tokens[0].to_string(),
                tokens[1].to_string(),
                tokens[2].to_string(),
            ));
        } else {
            return Err(Error::parse(path, format!("malformed line: {line}")));
        }
    }
    Ok(raw)
}

fn build(
    raw: RawAutomaton,
    path: &str,
    map: SymbolMap,
    decode_symbol: impl Fn(&str) -> Option<Symbol>,
) -> Result<Nfa, Error> {
    let ids: HashMap<&str, usize> = raw
        .states
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let lookup = |name: &str| -> Result<usize, Error> {
        ids.get(name)
            .copied()
            .ok_or_else(|| Error::parse(path, format!("undeclared state: {name}")))
    };

    let mut aut = Nfa::with_states(raw.states.len(), map);
    for name in &raw.initial {
        aut.mark_initial(lookup(name)?);
    }
    for name in &raw.fin {
        aut.mark_accept(lookup(name)?);
    }
    for (src, sym, dst) in &raw.transitions {
        let symbol = decode_symbol(sym)
            .ok_or_else(|| Error::parse(path, format!("bad symbol: {sym}")))?;
        aut.add_transition(lookup(src)?, symbol, lookup(dst)?);
    }
    Ok(aut)
}

/// Parse a plain NFA whose symbols have exactly the width of `map`.
pub fn parse_nfa_str(input: &str, path: &str, map: SymbolMap) -> Result<Nfa, Error> {
    let raw = parse_raw(input, path)?;
    let width = map.width();
    build(raw, path, map, |s| {
        let sym = Symbol::parse(s)?;
        (sym.width() == width).then_some(sym)
    })
}

/// Parse a transducer over the paired alphabet of `half_map`. The stored
/// symbol is split at its midpoint to rebuild the paired-tape layout; a
/// one-character midpoint separator is tolerated and dropped.
pub fn parse_transducer_str(input: &str, path: &str, half_map: &SymbolMap) -> Result<Nfa, Error> {
    let raw = parse_raw(input, path)?;
    let map = SymbolMap::paired(half_map);
    let width = map.width();
    build(raw, path, map, |s| {
        let chars: Vec<char> = s.chars().collect();
        let s: String = if chars.len() == width + 1 {
            // Separator at the midpoint of the stored symbol.
            let mid = chars.len() / 2;
            chars[..mid].iter().chain(&chars[mid + 1..]).collect()
        } else {
            chars.iter().collect()
        };
        let sym = Symbol::parse(&s)?;
        (sym.width() == width).then_some(sym)
    })
}

/// Render an automaton back to `.mata` source. Transducer symbols are
/// emitted as the plain paired bit string (no midpoint separator), which
/// `parse_transducer_str` reads back unchanged.
pub fn render_mata(aut: &Nfa) -> String {
    use std::fmt::Write;
    let mut out = String::from("@NFA-explicit\n");

    let names: Vec<String> = (0..aut.num_states()).map(|i| format!("s{i}")).collect();
    let _ = writeln!(out, "%States-enum {}", names.join(" "));
    let initial: Vec<&str> = aut.initial_states().map(|s| names[s].as_str()).collect();
    let _ = writeln!(out, "%Initial {}", initial.join(" "));
    let fin: Vec<&str> = aut.accepting_states().map(|s| names[s].as_str()).collect();
    let _ = writeln!(out, "%Final {}", fin.join(" "));
    for (src, sym, dst) in aut.transitions() {
        let _ = writeln!(out, "{} {} {}", names[*src], sym, names[*dst]);
    }
    out
}

/// Read a `.mata` NFA from disk.
pub fn parse_nfa_file(path: &Path, map: SymbolMap) -> Result<Nfa, Error> {
    let label = path.display().to_string();
    let input =
        std::fs::read_to_string(path).map_err(|e| Error::parse(label.clone(), e.to_string()))?;
    parse_nfa_str(&input, &label, map)
}

/// Read a `.mata` transducer from disk.
pub fn parse_transducer_file(path: &Path, half_map: &SymbolMap) -> Result<Nfa, Error> {
    let label = path.display().to_string();
    let input =
        std::fs::read_to_string(path).map_err(|e| Error::parse(label.clone(), e.to_string()))?;
    parse_transducer_str(&input, &label, half_map)
}

/// Read a symbol-mapping file: one atomic-proposition name per line,
/// order significant (position `i` corresponds to bit `i`).
pub fn read_symbol_mapping(path: &Path) -> Result<Vec<String>, Error> {
    let label = path.display().to_string();
    let input =
        std::fs::read_to_string(path).map_err(|e| Error::parse(label.clone(), e.to_string()))?;
    let names: Vec<String> = input
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if names.is_empty() {
        return Err(Error::parse(label, "empty symbol mapping"));
    }
    Ok(names)
}
