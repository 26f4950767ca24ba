#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_wraps,
    dead_code
)]

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod routing;
pub mod sessions;

pub use config::Config;

/// Rule-set management subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RulesCommands {
    /// Print a rule set as TOML (the built-in table unless --configured)
    #[command(long_about = "\
Print a rule set as TOML.

By default the built-in bilingual table is printed, which is a good \
starting point for a custom rules file. With --configured, the rule \
set named by routing.rules_path is printed instead.

Examples:
  careroute rules export > ~/.careroute/rules.toml
  careroute rules export --configured")]
    Export {
        /// Export the rule set the current config resolves to
        #[arg(long)]
        configured: bool,
    },
    /// Validate a rule-set file against the current routing settings
    #[command(long_about = "\
Validate a rule-set file.

Parses the TOML file, compiles every pattern, and checks the agent \
and boost constraints together with the [routing] settings of the \
current config. Exits non-zero when the file would be rejected.

Examples:
  careroute rules check ./rules.toml")]
    Check {
        /// Path to the rule-set TOML file
        path: String,
    },
}
