//! Reconciliation orchestrator.
//!
//! [`Reconciler::run`] drives one request end to end: snapshot, candidate
//! build, diff, apply, save decision, and diff report. All state is local to
//! the request; warnings and diagnostics accumulate on the returned
//! [`ReconcileReport`] rather than any shared structure.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::TextDiff;

use crate::device::{Command, ConfigStore, Device};
use crate::diff::{diff_with_terminator, sequence, MatchMode, ReplaceMode};
use crate::error::{Error, Result};
use crate::sections::{IgnoreRules, SectionRules};
use crate::tree::ConfigTree;

/// When to copy the running configuration to non-volatile storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveWhen {
    /// Always persist, unconditionally reported as a change.
    Always,
    /// Never persist (default).
    #[default]
    Never,
    /// Persist iff running and startup configuration differ.
    Modified,
    /// Persist iff this reconciliation applied at least one command.
    Changed,
}

impl std::str::FromStr for SaveWhen {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "always" => Ok(SaveWhen::Always),
            "never" => Ok(SaveWhen::Never),
            "modified" => Ok(SaveWhen::Modified),
            "changed" => Ok(SaveWhen::Changed),
            _ => Err(Error::InvalidParameter(format!(
                "Invalid save_when '{s}'. Valid options: always, never, modified, changed"
            ))),
        }
    }
}

/// Reference configuration for the before/after diff report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiffAgainst {
    /// A snapshot of the running configuration taken before changes were
    /// applied (default). Unavailable under dry-run.
    #[default]
    Running,
    /// The startup configuration.
    Startup,
    /// A caller-supplied reference configuration.
    Intended,
}

impl std::str::FromStr for DiffAgainst {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(DiffAgainst::Running),
            "startup" => Ok(DiffAgainst::Startup),
            "intended" => Ok(DiffAgainst::Intended),
            _ => Err(Error::InvalidParameter(format!(
                "Invalid diff_against '{s}'. Valid options: running, startup, intended"
            ))),
        }
    }
}

/// Caller-facing option set for one reconciliation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileParams {
    /// Ordered candidate command lines for the target section.
    pub lines: Vec<String>,

    /// Ordered parent path identifying the section `lines` belong to;
    /// empty means top level.
    pub parents: Vec<String>,

    /// Path to a config file used as the candidate. Mutually exclusive with
    /// `lines` and `parents`.
    pub src: Option<PathBuf>,

    /// Commands pushed before the computed diff, only when a change is made.
    pub before: Vec<String>,

    /// Commands appended after the computed diff, only when a change is made.
    pub after: Vec<String>,

    /// Strictness policy for matching candidate against running entries.
    #[serde(rename = "match")]
    pub match_mode: MatchMode,

    /// Emission granularity when a section differs.
    pub replace: ReplaceMode,

    /// Caller-supplied base running configuration, skipping the device
    /// fetch for the comparison.
    pub running_config: Option<String>,

    /// Reference configuration text, required when `diff_against` is
    /// `intended`.
    pub intended_config: Option<String>,

    /// Capture the pre-change running configuration into the report.
    pub backup: bool,

    /// Persistence policy, evaluated after the diff has run.
    pub save_when: SaveWhen,

    /// Reference selector for the diff report.
    pub diff_against: DiffAgainst,

    /// Lines (exact or regex) excluded from all equality and diff
    /// computations.
    pub diff_ignore_lines: Vec<String>,
}

impl ReconcileParams {
    /// Validate option combinations before any device interaction.
    pub fn validate(&self) -> Result<()> {
        if self.src.is_some() && !self.lines.is_empty() {
            return Err(Error::InvalidParameter(
                "'lines' and 'src' are mutually exclusive".to_string(),
            ));
        }
        if self.src.is_some() && !self.parents.is_empty() {
            return Err(Error::InvalidParameter(
                "'parents' and 'src' are mutually exclusive".to_string(),
            ));
        }
        if matches!(self.match_mode, MatchMode::Strict | MatchMode::Exact) && self.lines.is_empty()
        {
            return Err(Error::MissingParameter(format!(
                "'lines' is required when match is '{}'",
                match self.match_mode {
                    MatchMode::Strict => "strict",
                    _ => "exact",
                }
            )));
        }
        if self.replace == ReplaceMode::Block && self.lines.is_empty() {
            return Err(Error::MissingParameter(
                "'lines' is required when replace is 'block'".to_string(),
            ));
        }
        if self.diff_against == DiffAgainst::Intended && self.intended_config.is_none() {
            return Err(Error::MissingParameter(
                "'intended_config' is required when diff_against is 'intended'".to_string(),
            ));
        }
        Ok(())
    }

    fn has_candidate(&self) -> bool {
        !self.lines.is_empty() || self.src.is_some()
    }
}

/// Per-request execution switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and report everything, but execute nothing on the device.
    pub dry_run: bool,
    /// Produce the before/after diff report.
    pub diff: bool,
}

/// Before/after text produced by the diff reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDiff {
    /// The reference configuration, ignore-filtered.
    pub before: String,
    /// The current running configuration, ignore-filtered.
    pub after: String,
    /// Rendered unified diff of the two.
    pub details: String,
}

/// Outcome of one reconciliation request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Whether the request changed (or, under dry-run, would change) device
    /// state.
    pub changed: bool,
    /// The ordered command list applied (or that would be applied).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    /// Whether the running configuration was copied to non-volatile storage.
    pub saved: bool,
    /// Pre-change running configuration, when `backup` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    /// Before/after diff, when requested and the texts differ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<ConfigDiff>,
    /// Non-fatal diagnostics accumulated during the request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Alias for [`commands`](Self::commands), kept for callers that consume
    /// the legacy `updates` field name.
    pub fn updates(&self) -> &[String] {
        &self.commands
    }
}

/// Stable fingerprint over configuration text, used to short-circuit
/// equality checks in the diff reporter.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn render_diff(before: &str, after: &str) -> String {
    let text_diff = TextDiff::from_lines(before, after);
    text_diff
        .unified_diff()
        .header("before", "after")
        .to_string()
}

/// Drives declarative reconciliation against one device session.
pub struct Reconciler<D: Device> {
    device: D,
    rules: SectionRules,
}

impl<D: Device> Reconciler<D> {
    /// A reconciler using the default section grammar.
    pub fn new(device: D) -> Self {
        Self {
            device,
            rules: SectionRules::default(),
        }
    }

    /// A reconciler with a caller-supplied section grammar.
    pub fn with_rules(device: D, rules: SectionRules) -> Self {
        Self { device, rules }
    }

    /// The underlying device session.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Run one reconciliation request.
    pub async fn run(&self, params: &ReconcileParams, opts: RunOptions) -> Result<ReconcileReport> {
        params.validate()?;

        let mut report = ReconcileReport::default();

        // Pre-change snapshot, taken only when something will consume it.
        let mut snapshot: Option<String> = None;
        if params.backup || (opts.diff && params.diff_against == DiffAgainst::Running) {
            let contents = self.device.fetch_running_config().await?;
            if params.backup {
                report.backup = Some(contents.clone());
            }
            snapshot = Some(contents);
        }

        if params.has_candidate() {
            let commands = self.compute_commands(params, snapshot.as_deref()).await?;
            let commands = sequence(commands, &params.before, &params.after);

            if !commands.is_empty() {
                if !opts.dry_run {
                    self.apply(&commands).await?;
                }
                report.commands = commands;
                report.changed = true;
            }
        }

        let (running_cached, startup_cached) =
            self.decide_save(params, opts, &mut report).await?;

        if opts.diff {
            self.report_diff(params, opts, &mut report, snapshot, running_cached, startup_cached)
                .await?;
        }

        Ok(report)
    }

    async fn compute_commands(
        &self,
        params: &ReconcileParams,
        snapshot: Option<&str>,
    ) -> Result<Vec<String>> {
        let candidate = match &params.src {
            Some(path) => ConfigTree::from_file(path, &self.rules)?,
            None => ConfigTree::from_lines(&params.lines, &params.parents),
        };

        // match=none never consults the device.
        let running = if params.match_mode == MatchMode::None {
            ConfigTree::default()
        } else {
            let text = match (&params.running_config, snapshot) {
                (Some(text), _) => text.clone(),
                (None, Some(text)) => text.to_string(),
                (None, None) => self.device.fetch_running_config().await?,
            };
            ConfigTree::parse(&text, &self.rules)?
        };

        Ok(diff_with_terminator(
            &candidate,
            &running,
            params.match_mode,
            params.replace,
            &params.parents,
            self.rules.terminator(),
        ))
    }

    async fn apply(&self, commands: &[String]) -> Result<()> {
        let commands: Vec<Command> = commands.iter().cloned().map(Command::new).collect();
        self.device.run_commands(&commands).await?;
        Ok(())
    }

    /// Evaluate the persistence policy. Returns any configuration text
    /// fetched along the way so the diff reporter can reuse it.
    async fn decide_save(
        &self,
        params: &ReconcileParams,
        opts: RunOptions,
        report: &mut ReconcileReport,
    ) -> Result<(Option<String>, Option<String>)> {
        let mut running_cached = None;
        let mut startup_cached = None;

        match params.save_when {
            SaveWhen::Never => {}
            SaveWhen::Always => self.persist(opts, report).await?,
            SaveWhen::Changed => {
                if report.changed {
                    self.persist(opts, report).await?;
                }
            }
            SaveWhen::Modified => {
                let running = self.device.fetch_named_config(ConfigStore::Running).await?;
                let startup = self.device.fetch_named_config(ConfigStore::Startup).await?;

                let ignore = IgnoreRules::new(&params.diff_ignore_lines);
                let running_tree = ConfigTree::parse_filtered(&running, &self.rules, &ignore)?;
                let startup_tree = ConfigTree::parse_filtered(&startup, &self.rules, &ignore)?;

                if running_tree != startup_tree {
                    self.persist(opts, report).await?;
                }

                running_cached = Some(running);
                startup_cached = Some(startup);
            }
        }

        Ok((running_cached, startup_cached))
    }

    async fn persist(&self, opts: RunOptions, report: &mut ReconcileReport) -> Result<()> {
        report.changed = true;
        if opts.dry_run {
            report.warn(
                "skipping command `write memory` due to dry-run; \
                 configuration not copied to non-volatile storage",
            );
            return Ok(());
        }
        let command =
            Command::new("write memory").with_prompt("Are you sure you want to save", "y");
        self.device.run_command(&command).await?;
        report.saved = true;
        Ok(())
    }

    async fn report_diff(
        &self,
        params: &ReconcileParams,
        opts: RunOptions,
        report: &mut ReconcileReport,
        snapshot: Option<String>,
        running_cached: Option<String>,
        startup_cached: Option<String>,
    ) -> Result<()> {
        let after_text = match running_cached {
            Some(text) => text,
            None => self.device.fetch_running_config().await?,
        };

        let before_text = match params.diff_against {
            DiffAgainst::Running => {
                if opts.dry_run {
                    report.warn("unable to diff against the running-config snapshot under dry-run");
                    None
                } else {
                    snapshot
                }
            }
            DiffAgainst::Startup => match startup_cached {
                Some(text) => Some(text),
                None => Some(self.device.fetch_named_config(ConfigStore::Startup).await?),
            },
            DiffAgainst::Intended => params.intended_config.clone(),
        };

        let Some(before_text) = before_text else {
            return Ok(());
        };

        let ignore = IgnoreRules::new(&params.diff_ignore_lines);
        let before = ignore.filter_text(&before_text);
        let after = ignore.filter_text(&after_text);

        // The fingerprint is a cheap short-circuit; direct comparison is
        // authoritative so a hash collision cannot mask a difference.
        let differs = fingerprint(&before) != fingerprint(&after) || before != after;
        if differs {
            report.changed = true;
            let details = render_diff(&before, &after);
            report.diff = Some(ConfigDiff {
                before,
                after,
                details,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_params() -> ReconcileParams {
        ReconcileParams {
            lines: vec!["domain-name example.net".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_params().validate().is_ok());
        assert!(ReconcileParams::default().validate().is_ok());
    }

    #[test]
    fn test_validate_lines_src_exclusive() {
        let params = ReconcileParams {
            src: Some(PathBuf::from("candidate.cfg")),
            ..base_params()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_validate_parents_src_exclusive() {
        let params = ReconcileParams {
            src: Some(PathBuf::from("candidate.cfg")),
            parents: vec!["interface 0/1".to_string()],
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_validate_exact_requires_lines() {
        let params = ReconcileParams {
            match_mode: MatchMode::Exact,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::MissingParameter(_))));
    }

    #[test]
    fn test_validate_block_requires_lines() {
        let params = ReconcileParams {
            replace: ReplaceMode::Block,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::MissingParameter(_))));
    }

    #[test]
    fn test_validate_intended_requires_config() {
        let params = ReconcileParams {
            diff_against: DiffAgainst::Intended,
            ..base_params()
        };
        assert!(matches!(params.validate(), Err(Error::MissingParameter(_))));

        let params = ReconcileParams {
            diff_against: DiffAgainst::Intended,
            intended_config: Some("domain-name example.net".to_string()),
            ..base_params()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: ReconcileParams = serde_json::from_str(
            r#"{"lines": ["description WAN"], "parents": ["interface 0/1"], "match": "strict"}"#,
        )
        .unwrap();
        assert_eq!(params.match_mode, MatchMode::Strict);
        assert_eq!(params.replace, ReplaceMode::Line);
        assert_eq!(params.save_when, SaveWhen::Never);
        assert_eq!(params.diff_against, DiffAgainst::Running);
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = fingerprint("hostname sw1\n");
        let b = fingerprint("hostname sw1\n");
        let c = fingerprint("hostname sw2\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_render_diff_marks_changes() {
        let details = render_diff("description LAN\n", "description WAN\n");
        assert!(details.contains("-description LAN"));
        assert!(details.contains("+description WAN"));
    }

    #[test]
    fn test_save_when_parsing() {
        assert_eq!("always".parse::<SaveWhen>().unwrap(), SaveWhen::Always);
        assert_eq!("modified".parse::<SaveWhen>().unwrap(), SaveWhen::Modified);
        assert!("sometimes".parse::<SaveWhen>().is_err());
        assert_eq!("intended".parse::<DiffAgainst>().unwrap(), DiffAgainst::Intended);
        assert!("backup".parse::<DiffAgainst>().is_err());
    }
}
