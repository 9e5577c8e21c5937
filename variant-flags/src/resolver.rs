use crate::config::ResolverConfig;
use crate::error::ConfigurationError;
use crate::flag::FlagPattern;
use crate::manifest::Manifest;
use crate::table::PriorityClass;
use crate::table::RuleSource;
use crate::table::RuleTable;
use crate::table::Variant;
use crate::table::VariantTable;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Whether a flag came from the variant itself or from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagOrigin {
  Base,
  Extra,
}

impl fmt::Display for FlagOrigin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      FlagOrigin::Base => "base",
      FlagOrigin::Extra => "extra",
    })
  }
}

/// A flag that an active rule forbids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
  pub source: RuleSource,
  pub pattern: FlagPattern,
  pub flag: String,
  pub origin: FlagOrigin,
  /// For flag-keyed rules, the flag occurrence that activated the rule.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub triggered_by: Option<String>,
}

impl fmt::Display for Conflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} flag `{}` matches `{}` excluded by {}",
      self.origin, self.flag, self.pattern, self.source
    )?;
    if let Some(trigger) = &self.triggered_by {
      write!(f, " (via `{trigger}`)")?;
    }
    Ok(())
  }
}

/// Result of checking one flag-set alternative of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternativeReport {
  pub index: usize,
  pub base_flags: Vec<String>,
  pub conflicts: Vec<Conflict>,
}

impl AlternativeReport {
  pub fn is_compatible(&self) -> bool {
    self.conflicts.is_empty()
  }
}

/// Full result of a compatibility query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
  pub variant: String,
  pub known_variant: bool,
  pub alternatives: Vec<AlternativeReport>,
}

impl Verdict {
  /// A variant can run if at least one of its flag sets is free of conflicts.
  pub fn is_compatible(&self) -> bool {
    self.alternatives.iter().any(AlternativeReport::is_compatible)
  }

  pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
    self.alternatives.iter().flat_map(|alt| alt.conflicts.iter())
  }

  pub fn compatible_alternatives(&self) -> impl Iterator<Item = &AlternativeReport> {
    self.alternatives.iter().filter(|alt| alt.is_compatible())
  }
}

struct Candidate<'a> {
  flag: &'a str,
  origin: FlagOrigin,
}

struct Trigger<'a> {
  source: RuleSource,
  /// Candidate index of the flag that activated a flag-keyed rule; that
  /// occurrence never conflicts with itself.
  occurrence: Option<usize>,
  flag: Option<&'a str>,
}

/// Answers flag compatibility and run order queries over validated, immutable
/// variant and rule tables.
#[derive(Debug, Clone)]
pub struct CompatibilityResolver {
  variants: VariantTable,
  rules: RuleTable,
}

impl CompatibilityResolver {
  pub fn new(config: ResolverConfig) -> Result<Self, ConfigurationError> {
    let ResolverConfig {
      variants,
      slow,
      fast,
      variant_rules,
      build_variable_rules,
      extra_flag_rules,
    } = config;
    let variants = VariantTable::new(variants, &slow, &fast)?;
    let rules = RuleTable::new(
      variant_rules,
      build_variable_rules,
      extra_flag_rules,
      &variants,
    )?;
    info!(
      variants = variants.len(),
      variant_rules = rules.variant_rule_count(),
      build_variable_rules = rules.build_variable_rule_count(),
      flag_rules = rules.flag_rule_count(),
      "validated variant tables"
    );
    Ok(Self { variants, rules })
  }

  pub fn from_manifest(manifest: Manifest) -> Result<Self, ConfigurationError> {
    Self::new(manifest.into_config()?)
  }

  pub fn from_manifest_str(raw: &str) -> Result<Self, ConfigurationError> {
    Self::from_manifest(Manifest::from_str(raw)?)
  }

  pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
    Self::from_manifest(Manifest::from_path(path)?)
  }

  pub fn variant(&self, name: &str) -> Option<&Variant> {
    self.variants.get(name)
  }

  pub fn variants(&self) -> &VariantTable {
    &self.variants
  }

  pub fn rules(&self) -> &RuleTable {
    &self.rules
  }

  pub fn variant_names(&self) -> impl Iterator<Item = &str> {
    self.variants.iter().map(Variant::name)
  }

  pub fn base_flag_sets(&self, name: &str) -> Option<&[Vec<String>]> {
    self.variant(name).map(Variant::flag_sets)
  }

  /// Unknown variants are treated as unclassified.
  pub fn priority_of(&self, name: &str) -> PriorityClass {
    self
      .variant(name)
      .map(Variant::priority)
      .unwrap_or_default()
  }

  /// Stable sort by priority class: slow variants first, fast variants last.
  pub fn order_variants<T: AsRef<str>>(&self, names: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut ordered: Vec<T> = names.into_iter().collect();
    ordered.sort_by_key(|name| self.priority_of(name.as_ref()).sort_key());
    ordered
  }

  /// Every variant, in run order; variants of one class keep definition order.
  pub fn all_variants(&self) -> Vec<&str> {
    self.order_variants(self.variant_names())
  }

  pub fn is_compatible(&self, variant: &str, build_variables: &[&str], extra_flags: &[&str]) -> bool {
    self
      .check(variant, build_variables, extra_flags)
      .is_compatible()
  }

  /// Checks every flag-set alternative of `variant` combined with the extra
  /// flags under the active build variables.
  pub fn check(&self, variant: &str, build_variables: &[&str], extra_flags: &[&str]) -> Verdict {
    let empty = [Vec::new()];
    let (flag_sets, known_variant) = match self.variant(variant) {
      Some(v) => (v.flag_sets(), true),
      None => {
        warn!(variant, "compatibility query for unknown variant");
        (&empty[..], false)
      }
    };

    let alternatives = flag_sets
      .iter()
      .enumerate()
      .map(|(index, base_flags)| AlternativeReport {
        index,
        base_flags: base_flags.clone(),
        conflicts: self.conflicts(variant, base_flags, build_variables, extra_flags),
      })
      .collect();

    Verdict {
      variant: variant.to_string(),
      known_variant,
      alternatives,
    }
  }

  fn conflicts(
    &self,
    variant: &str,
    base_flags: &[String],
    build_variables: &[&str],
    extra_flags: &[&str],
  ) -> Vec<Conflict> {
    let candidates: Vec<Candidate> = base_flags
      .iter()
      .map(|flag| Candidate {
        flag: flag.as_str(),
        origin: FlagOrigin::Base,
      })
      .chain(extra_flags.iter().map(|&flag| Candidate {
        flag,
        origin: FlagOrigin::Extra,
      }))
      .collect();

    let exclusions = self.collect_exclusions(variant, build_variables, &candidates);
    debug!(
      variant,
      candidates = candidates.len(),
      patterns = exclusions.len(),
      "collected exclusion patterns"
    );

    let mut conflicts = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
      for (pattern, triggers) in &exclusions {
        if !pattern.matches(candidate.flag) {
          continue;
        }
        for trigger in triggers {
          if trigger.occurrence == Some(idx) {
            continue;
          }
          let conflict = Conflict {
            source: trigger.source.clone(),
            pattern: (*pattern).clone(),
            flag: candidate.flag.to_string(),
            origin: candidate.origin,
            triggered_by: trigger.flag.map(str::to_string),
          };
          if !conflicts.contains(&conflict) {
            debug!(%conflict, "flag conflict");
            conflicts.push(conflict);
          }
        }
      }
    }
    conflicts
  }

  /// Merges the rules of every active source into one pattern → triggers map,
  /// so each candidate is tested against each distinct pattern once.
  fn collect_exclusions<'a>(
    &'a self,
    variant: &str,
    build_variables: &[&str],
    candidates: &[Candidate<'a>],
  ) -> BTreeMap<&'a FlagPattern, Vec<Trigger<'a>>> {
    let mut exclusions: BTreeMap<&FlagPattern, Vec<Trigger>> = BTreeMap::new();
    let mut add = |patterns: &'a BTreeSet<FlagPattern>,
                   source: &RuleSource,
                   occurrence: Option<usize>,
                   flag: Option<&'a str>| {
      for pattern in patterns {
        exclusions.entry(pattern).or_default().push(Trigger {
          source: source.clone(),
          occurrence,
          flag,
        });
      }
    };

    if let Some(patterns) = self.rules.for_variant(variant) {
      add(patterns, &RuleSource::Variant(variant.to_string()), None, None);
    }

    let active: BTreeSet<&str> = build_variables.iter().copied().collect();
    for variable in active {
      if let Some(patterns) = self.rules.for_build_variable(variable) {
        add(
          patterns,
          &RuleSource::BuildVariable(variable.to_string()),
          None,
          None,
        );
      }
    }

    for (idx, candidate) in candidates.iter().enumerate() {
      for rule in self.rules.for_flag(candidate.flag) {
        add(
          rule.excluded(),
          &RuleSource::ExtraFlag(rule.key().clone()),
          Some(idx),
          Some(candidate.flag),
        );
      }
    }

    exclusions
  }
}
