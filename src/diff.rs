//! Configuration diff engine and command sequencer.
//!
//! Given a candidate tree and a running tree, [`diff`] computes the minimal,
//! correctly-ordered command sequence that converges the device onto the
//! candidate, under a [`MatchMode`] strictness policy and a [`ReplaceMode`]
//! emission granularity. [`sequence`] splices caller-supplied before/after
//! command lists around a non-empty diff.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::sections::DEFAULT_TERMINATOR;
use crate::tree::{ConfigLine, ConfigTree};

/// How candidate entries are matched against the running configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Emit a candidate line only if no identical line exists under the
    /// corresponding running section (default).
    #[default]
    Line,
    /// Positional: candidate line `i` is compared against running line `i`
    /// under the same parent.
    Strict,
    /// The full ordered child list must match; any mismatch re-emits the
    /// entire candidate section.
    Exact,
    /// Bypass comparison entirely; emit the candidate verbatim.
    None,
}

impl std::str::FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(MatchMode::Line),
            "strict" => Ok(MatchMode::Strict),
            "exact" => Ok(MatchMode::Exact),
            "none" => Ok(MatchMode::None),
            _ => Err(Error::InvalidParameter(format!(
                "Invalid match mode '{s}'. Valid options: line, strict, exact, none"
            ))),
        }
    }
}

/// Emission granularity when a section differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    /// Emit only the differing lines (default).
    #[default]
    Line,
    /// If any child differs, emit every child line under that parent.
    Block,
}

impl std::str::FromStr for ReplaceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(ReplaceMode::Line),
            "block" => Ok(ReplaceMode::Block),
            _ => Err(Error::InvalidParameter(format!(
                "Invalid replace mode '{s}'. Valid options: line, block"
            ))),
        }
    }
}

/// Compute the ordered command list that converges `running` onto
/// `candidate`, restricted to the subtree rooted at `path` (empty path =
/// whole tree), using the default `exit` terminator.
///
/// Ordering is always outer-to-inner section openers, child commands, then
/// one terminator per opened section. A `path` naming a section absent from
/// `running` emits the opener plus every candidate child; a `path` with no
/// candidate entries yields an empty list.
pub fn diff(
    candidate: &ConfigTree,
    running: &ConfigTree,
    match_mode: MatchMode,
    replace: ReplaceMode,
    path: &[String],
) -> Vec<String> {
    diff_with_terminator(candidate, running, match_mode, replace, path, DEFAULT_TERMINATOR)
}

/// [`diff`] with a caller-supplied terminator token, for grammars that do
/// not close sections with `exit`.
pub fn diff_with_terminator(
    candidate: &ConfigTree,
    running: &ConfigTree,
    match_mode: MatchMode,
    replace: ReplaceMode,
    path: &[String],
    terminator: &str,
) -> Vec<String> {
    let mut commands = Vec::new();

    for (section_path, children) in candidate.sections() {
        if !section_path.starts_with(path) {
            continue;
        }

        let selected: Vec<&ConfigLine> = if match_mode == MatchMode::None {
            children.iter().collect()
        } else {
            match running.children(section_path) {
                // Section missing from running: everything under it is new.
                None => children.iter().collect(),
                Some(present) => select_lines(children, present, match_mode),
            }
        };

        let selected = if replace == ReplaceMode::Block && !selected.is_empty() {
            children.iter().collect()
        } else {
            selected
        };

        if selected.is_empty() {
            continue;
        }

        commands.extend(section_path.iter().cloned());
        commands.extend(selected.iter().map(|l| l.text().to_string()));
        commands.extend(std::iter::repeat(terminator.to_string()).take(section_path.len()));
    }

    tracing::debug!(
        count = commands.len(),
        ?match_mode,
        ?replace,
        "computed configuration diff"
    );
    commands
}

fn select_lines<'a>(
    candidate: &'a [ConfigLine],
    running: &[ConfigLine],
    match_mode: MatchMode,
) -> Vec<&'a ConfigLine> {
    match match_mode {
        MatchMode::Line => candidate
            .iter()
            .filter(|line| !running.iter().any(|r| r.text() == line.text()))
            .collect(),
        MatchMode::Strict => candidate
            .iter()
            .filter(|line| {
                running
                    .get(line.order())
                    .map_or(true, |r| r.text() != line.text())
            })
            .collect(),
        MatchMode::Exact => {
            let equal = candidate.len() == running.len()
                && candidate
                    .iter()
                    .zip(running.iter())
                    .all(|(c, r)| c.text() == r.text());
            if equal {
                Vec::new()
            } else {
                candidate.iter().collect()
            }
        }
        MatchMode::None => candidate.iter().collect(),
    }
}

/// Wrap a computed diff with caller-supplied pre/post command lists.
///
/// `before` and `after` are spliced verbatim, but only when the diff is
/// non-empty: a no-op reconciliation must fire no side effects at all.
pub fn sequence(diff_commands: Vec<String>, before: &[String], after: &[String]) -> Vec<String> {
    if diff_commands.is_empty() {
        return Vec::new();
    }
    before
        .iter()
        .cloned()
        .chain(diff_commands)
        .chain(after.iter().cloned())
        .collect()
}
