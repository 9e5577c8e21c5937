//! Test variant flag tables and flag compatibility resolution.
//!
//! A test suite is re-run under several *variants*, each of which passes its
//! own engine flags. Some flags contradict a variant, a build configuration,
//! or another flag; [`CompatibilityResolver`] decides whether a combination is
//! usable and in which order variants should run.
//!
//! ```
//! let resolver = variant_flags::builtin::resolver().unwrap();
//! assert!(!resolver.is_compatible("jitless", &["lite_mode"], &["--opt"]));
//! assert!(resolver.is_compatible("jitless", &[], &["--no-opt"]));
//! ```

pub mod builtin;
mod config;
mod error;
mod flag;
mod manifest;
mod resolver;
mod table;

pub use config::ResolverConfig;
pub use error::ConfigurationError;
pub use error::FlagContext;
pub use flag::flag_name;
pub use flag::FlagPattern;
pub use flag::WILDCARD_VALUE;
pub use manifest::CompositeRule;
pub use manifest::Entries;
pub use manifest::Manifest;
pub use manifest::RawIncompatible;
pub use manifest::RawPriority;
pub use manifest::RawRule;
pub use resolver::AlternativeReport;
pub use resolver::CompatibilityResolver;
pub use resolver::Conflict;
pub use resolver::FlagOrigin;
pub use resolver::Verdict;
pub use table::FlagRule;
pub use table::PriorityClass;
pub use table::RuleSource;
pub use table::RuleTable;
pub use table::Variant;
pub use table::VariantTable;
