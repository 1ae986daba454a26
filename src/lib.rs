//! lootsort - rule-based file sorting and cleanup
//!
//! Files found under a preset's directories become [`Candidate`]s. A
//! [`RuleEngine`] decides what happens to each one, a [`ConflictResolver`]
//! settles clashing destinations, and the resulting [`Plan`] is previewed
//! before the [`Executor`] applies it. Three modes share that pipeline:
//! sort (ordered glob rules with filters), clean (marker deletion and name
//! sanitizing) and token routing (images routed by identifiers found in their
//! embedded metadata).

pub mod candidate;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod executor;
pub mod filter;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod plan;
pub mod prompt;
pub mod rules;
pub mod scanner;

pub use candidate::{Candidate, Dimensions, FsProbe, Probe};
pub use config::{ConfigError, Job, Mode, Preset};
pub use conflict::{ConflictResolver, DuplicatePolicy};
pub use executor::{ExecutionSummary, Executor, ItemStatus, TerminalState};
pub use metadata::{MetadataExtractor, TokenScan};
pub use plan::{Plan, Preview, PreviewConfig};
pub use rules::{Action, Evaluation, MatchResult, Rule, RuleEngine, RuleSet};
pub use scanner::Scanner;
