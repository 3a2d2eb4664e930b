//! Rendering of automata to Graphviz DOT source. Edges between the same
//! state pair are merged into one arrow labelled with all their symbols.

use std::collections::BTreeMap;

use crate::nfa::Nfa;

/// Render `aut` as a DOT digraph named `name`. The symbol map is shown as
/// the graph label; initial states get an incoming arrow from an unlabelled
/// point node, accepting states a double circle.
pub fn render(aut: &Nfa, name: &str) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{name}\" {{");
    let _ = writeln!(out, "    rankdir=LR;");
    let _ = writeln!(
        out,
        "    label=\"Symbols: {:?}\"; labelloc=t; fontname=\"Helvetica\";",
        aut.symbol_map().tapes()
    );

    for state in 0..aut.num_states() {
        let shape = if aut.is_accepting(state) {
            "doublecircle"
        } else {
            "circle"
        };
        let _ = writeln!(out, "    {state} [shape={shape}];");
    }
    for state in aut.initial_states() {
        let _ = writeln!(out, "    q{state} [shape=point];");
        let _ = writeln!(out, "    q{state} -> {state};");
    }

    // One edge per state pair, all symbols on the label.
    let mut edges: BTreeMap<(usize, usize), Vec<String>> = BTreeMap::new();
    for (src, sym, dst) in aut.transitions() {
        edges.entry((*src, *dst)).or_default().push(sym.to_string());
    }
    for ((src, dst), mut symbols) in edges {
        symbols.sort();
        let _ = writeln!(out, "    {src} -> {dst} [label=\"<{}>\"];", symbols.join(" | "));
    }

    let _ = writeln!(out, "}}");
    out
}
