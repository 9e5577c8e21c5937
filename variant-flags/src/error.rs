use crate::table::PriorityClass;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Where a rejected flag string was found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagContext {
  BaseFlag { variant: String },
  VariantRule { variant: String },
  BuildVariableRule { variable: String },
  ExtraFlagKey,
  ExtraFlagRule { key: String },
}

impl std::fmt::Display for FlagContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FlagContext::BaseFlag { variant } => write!(f, "base flags of variant `{variant}`"),
      FlagContext::VariantRule { variant } => write!(f, "rules for variant `{variant}`"),
      FlagContext::BuildVariableRule { variable } => {
        write!(f, "rules for build variable `{variable}`")
      }
      FlagContext::ExtraFlagKey => f.write_str("extra flag rule keys"),
      FlagContext::ExtraFlagRule { key } => write!(f, "rules for extra flag `{key}`"),
    }
  }
}

/// Errors raised while loading or validating variant and rule tables.
///
/// All of these are fatal: a resolver is never constructed from a table that
/// failed validation.
#[derive(Debug, Error)]
pub enum ConfigurationError {
  #[error("read manifest {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse manifest as TOML ({toml}) or JSON ({json})")]
  Parse { toml: String, json: String },

  /// A priority classification names a variant that is not in the variant table.
  #[error("{class} variant list references unknown variant `{name}`")]
  UnknownClassifiedVariant { class: PriorityClass, name: String },

  /// A variant is classified both slow and fast.
  #[error("variant `{name}` is classified as both slow and fast")]
  ConflictingPriority { name: String },

  #[error("variant `{name}` is defined more than once")]
  DuplicateVariant { name: String },

  #[error("variant `{name}` has no flag sets")]
  EmptyVariant { name: String },

  /// Wildcards only make sense as exclusion patterns, never as flags to pass.
  #[error("base flags of variant `{variant}` contain wildcard `{flag}`")]
  WildcardBaseFlag { variant: String, flag: String },

  #[error("malformed flag `{flag}` in {context}: {reason}")]
  MalformedFlag {
    context: FlagContext,
    flag: String,
    reason: &'static str,
  },

  /// A per-variant rule is keyed by a name missing from the variant table.
  #[error("incompatibility rules reference unknown variant `{name}`")]
  UnknownRuleVariant { name: String },

  /// A rule entry reuses the per-variant rules of a variant that has none.
  #[error("{owner} reuses rules of variant `{name}`, which has no rule entry")]
  UnknownRuleReference { owner: String, name: String },
}
