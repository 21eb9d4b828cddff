//! # edgecfg - Declarative Network Configuration Reconciliation
//!
//! edgecfg computes the minimal, correctly-ordered sequence of CLI commands
//! that transforms a device's running configuration into a desired candidate
//! configuration. It targets device families whose configuration is flat
//! text with implicit sections: a section-opening line (`interface 0/1`,
//! `vlan database`, ...) nests the following lines until a universal `exit`
//! terminator.
//!
//! ## Architecture Overview
//!
//! ```text
//! raw running text ──▶ SectionRules::classify ──▶ ConfigTree (running)
//! candidate lines/file ──────────────────────▶ ConfigTree (candidate)
//!
//! (candidate, running, match, replace, path)
//!        │
//!        ▼
//!   diff::diff ──▶ diff::sequence(before/after) ──▶ Device::run_commands
//!        │
//!        ▼
//!   SaveWhen policy ──▶ `write memory` (confirmed interactively)
//!   DiffAgainst reporter ──▶ before/after text on the report
//! ```
//!
//! Trees are request-scoped: built fresh from freshly fetched text, never
//! mutated, discarded once a command list or diff has been produced.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use edgecfg::{ReconcileParams, Reconciler, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> edgecfg::Result<()> {
//!     let device = MySshSession::connect("sw1.example.net").await?;
//!     let reconciler = Reconciler::new(device);
//!
//!     let params = ReconcileParams {
//!         lines: vec!["description WAN".into(), "ip access-group ACL1 in".into()],
//!         parents: vec!["interface 0/1".into()],
//!         ..Default::default()
//!     };
//!
//!     let report = reconciler.run(&params, RunOptions::default()).await?;
//!     println!("changed={} commands={:?}", report.changed, report.commands);
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod diff;
pub mod error;
pub mod reconcile;
pub mod sections;
pub mod tree;

pub use device::{Command, ConfigStore, Device};
pub use diff::{diff, sequence, MatchMode, ReplaceMode};
pub use error::{Error, Result};
pub use reconcile::{
    ConfigDiff, DiffAgainst, ReconcileParams, ReconcileReport, Reconciler, RunOptions, SaveWhen,
};
pub use sections::{ClassifiedLine, IgnoreRules, LineKind, SectionRules};
pub use tree::{ConfigLine, ConfigTree};
