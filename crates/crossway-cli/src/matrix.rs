//! Human-readable views of the compatibility rules.

use std::fmt::Write as _;

use crossway_kernel::{CompatibilityRule, Trajectory, compatibility};

/// One-line verdict on whether `candidate` may enter while `existing` is
/// inside.
pub fn describe(candidate: Trajectory, existing: Trajectory) -> String {
    match compatibility(candidate, existing) {
        Some(rule) => format!("{candidate} may enter while {existing} is inside ({rule})"),
        None => format!("{candidate} must wait while {existing} is inside (conflict)"),
    }
}

fn abbrev(t: Trajectory) -> String {
    let initial = |d: crossway_kernel::Direction| {
        d.as_str()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    };
    format!("{}>{}", initial(t.origin), initial(t.destination))
}

fn symbol(rule: Option<CompatibilityRule>) -> char {
    match rule {
        Some(CompatibilityRule::Reverse) => 'R',
        Some(CompatibilityRule::SameOrigin) => 'O',
        Some(CompatibilityRule::DisjointRightTurns) => 'T',
        None => 'x',
    }
}

/// The full 12×12 matrix.  Rows are candidates, columns admitted
/// trajectories.
pub fn render_table() -> String {
    let all: Vec<Trajectory> = Trajectory::all().collect();
    let mut out = String::new();

    let _ = write!(out, "{:>6}", "");
    for existing in &all {
        let _ = write!(out, "{:>5}", abbrev(*existing));
    }
    let _ = writeln!(out);

    for candidate in &all {
        let _ = write!(out, "{:>6}", abbrev(*candidate));
        for existing in &all {
            let _ = write!(out, "{:>5}", symbol(compatibility(*candidate, *existing)));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "R reverse pair   O same origin   T right turns, different exits   x conflict"
    );
    out
}
