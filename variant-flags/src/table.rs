use crate::error::ConfigurationError;
use crate::error::FlagContext;
use crate::flag::check_syntax;
use crate::flag::flag_name;
use crate::flag::FlagPattern;
use crate::flag::WILDCARD_VALUE;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Controls where a variant lands in the run order. Slow variants start first
/// so they don't hold up the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
  Slow,
  #[default]
  Normal,
  Fast,
}

impl PriorityClass {
  pub fn sort_key(self) -> u8 {
    match self {
      PriorityClass::Slow => 0,
      PriorityClass::Normal => 50,
      PriorityClass::Fast => 100,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PriorityClass::Slow => "slow",
      PriorityClass::Normal => "normal",
      PriorityClass::Fast => "fast",
    }
  }
}

impl fmt::Display for PriorityClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
  name: String,
  flag_sets: Vec<Vec<String>>,
  priority: PriorityClass,
}

impl Variant {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Alternative flag sets; a run passes exactly one of them.
  pub fn flag_sets(&self) -> &[Vec<String>] {
    &self.flag_sets
  }

  pub fn priority(&self) -> PriorityClass {
    self.priority
  }
}

/// All variants, in definition order, with a by-name index.
#[derive(Debug, Clone, Default)]
pub struct VariantTable {
  variants: Vec<Variant>,
  by_name: AHashMap<String, usize>,
}

impl VariantTable {
  pub fn new(
    definitions: Vec<(String, Vec<Vec<String>>)>,
    slow: &[String],
    fast: &[String],
  ) -> Result<Self, ConfigurationError> {
    let mut table = VariantTable::default();
    for (name, flag_sets) in definitions {
      if table.by_name.contains_key(&name) {
        return Err(ConfigurationError::DuplicateVariant { name });
      }
      if flag_sets.is_empty() {
        return Err(ConfigurationError::EmptyVariant { name });
      }
      for flag in flag_sets.iter().flatten() {
        check_base_flag(&name, flag)?;
      }
      table.by_name.insert(name.clone(), table.variants.len());
      table.variants.push(Variant {
        name,
        flag_sets,
        priority: PriorityClass::Normal,
      });
    }

    for (class, names) in [(PriorityClass::Slow, slow), (PriorityClass::Fast, fast)] {
      for name in names {
        let Some(&idx) = table.by_name.get(name) else {
          return Err(ConfigurationError::UnknownClassifiedVariant {
            class,
            name: name.clone(),
          });
        };
        let variant = &mut table.variants[idx];
        if variant.priority != PriorityClass::Normal && variant.priority != class {
          return Err(ConfigurationError::ConflictingPriority { name: name.clone() });
        }
        variant.priority = class;
      }
    }

    Ok(table)
  }

  pub fn get(&self, name: &str) -> Option<&Variant> {
    self.by_name.get(name).map(|&idx| &self.variants[idx])
  }

  pub fn contains(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Variant> {
    self.variants.iter()
  }

  pub fn len(&self) -> usize {
    self.variants.len()
  }

  pub fn is_empty(&self) -> bool {
    self.variants.is_empty()
  }
}

fn check_base_flag(variant: &str, flag: &str) -> Result<(), ConfigurationError> {
  let (_, value) = check_syntax(flag).map_err(|reason| ConfigurationError::MalformedFlag {
    context: FlagContext::BaseFlag {
      variant: variant.to_string(),
    },
    flag: flag.to_string(),
    reason,
  })?;
  if value == Some(WILDCARD_VALUE) {
    return Err(ConfigurationError::WildcardBaseFlag {
      variant: variant.to_string(),
      flag: flag.to_string(),
    });
  }
  Ok(())
}

/// The condition that made an exclusion pattern apply.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum RuleSource {
  Variant(String),
  BuildVariable(String),
  ExtraFlag(FlagPattern),
}

impl fmt::Display for RuleSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RuleSource::Variant(name) => write!(f, "variant `{name}`"),
      RuleSource::BuildVariable(name) => write!(f, "build variable `{name}`"),
      RuleSource::ExtraFlag(pattern) => write!(f, "flag `{pattern}`"),
    }
  }
}

/// Exclusions triggered by a flag, keyed by an exact flag or a wildcard.
#[derive(Debug, Clone)]
pub struct FlagRule {
  key: FlagPattern,
  excluded: BTreeSet<FlagPattern>,
}

impl FlagRule {
  pub fn key(&self) -> &FlagPattern {
    &self.key
  }

  pub fn excluded(&self) -> &BTreeSet<FlagPattern> {
    &self.excluded
  }
}

/// Incompatibility rules from the three independent sources. Entries with the
/// same key are merged.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
  by_variant: AHashMap<String, BTreeSet<FlagPattern>>,
  by_build_variable: AHashMap<String, BTreeSet<FlagPattern>>,
  by_exact_flag: AHashMap<String, FlagRule>,
  /// Keyed by flag name, without the `=*`.
  by_wildcard_flag: AHashMap<String, FlagRule>,
}

impl RuleTable {
  pub fn new(
    variant_rules: Vec<(String, Vec<String>)>,
    build_variable_rules: Vec<(String, Vec<String>)>,
    extra_flag_rules: Vec<(String, Vec<String>)>,
    variants: &VariantTable,
  ) -> Result<Self, ConfigurationError> {
    let mut table = RuleTable::default();

    for (variant, patterns) in variant_rules {
      if !variants.contains(&variant) {
        return Err(ConfigurationError::UnknownRuleVariant { name: variant });
      }
      let context = FlagContext::VariantRule {
        variant: variant.clone(),
      };
      let parsed = parse_patterns(&patterns, &context)?;
      table.by_variant.entry(variant).or_default().extend(parsed);
    }

    for (variable, patterns) in build_variable_rules {
      let context = FlagContext::BuildVariableRule {
        variable: variable.clone(),
      };
      let parsed = parse_patterns(&patterns, &context)?;
      table
        .by_build_variable
        .entry(variable)
        .or_default()
        .extend(parsed);
    }

    for (raw_key, patterns) in extra_flag_rules {
      let key = parse_pattern(&raw_key, &FlagContext::ExtraFlagKey)?;
      let context = FlagContext::ExtraFlagRule {
        key: raw_key.clone(),
      };
      let parsed = parse_patterns(&patterns, &context)?;
      let slot = match &key {
        FlagPattern::Exact(flag) => table.by_exact_flag.entry(flag.clone()),
        FlagPattern::Wildcard(name) => table.by_wildcard_flag.entry(name.clone()),
      };
      slot
        .or_insert_with(|| FlagRule {
          key,
          excluded: BTreeSet::new(),
        })
        .excluded
        .extend(parsed);
    }

    Ok(table)
  }

  pub fn for_variant(&self, variant: &str) -> Option<&BTreeSet<FlagPattern>> {
    self.by_variant.get(variant)
  }

  pub fn for_build_variable(&self, variable: &str) -> Option<&BTreeSet<FlagPattern>> {
    self.by_build_variable.get(variable)
  }

  /// Rules whose key matches `flag`: at most one exact-keyed and one
  /// wildcard-keyed rule.
  pub fn for_flag<'a>(&'a self, flag: &str) -> impl Iterator<Item = &'a FlagRule> {
    let exact = self.by_exact_flag.get(flag);
    let wildcard = self.by_wildcard_flag.get(flag_name(flag));
    exact.into_iter().chain(wildcard)
  }

  pub fn variant_rule_count(&self) -> usize {
    self.by_variant.len()
  }

  pub fn build_variable_rule_count(&self) -> usize {
    self.by_build_variable.len()
  }

  pub fn flag_rule_count(&self) -> usize {
    self.by_exact_flag.len() + self.by_wildcard_flag.len()
  }
}

fn parse_pattern(raw: &str, context: &FlagContext) -> Result<FlagPattern, ConfigurationError> {
  FlagPattern::parse(raw).map_err(|reason| ConfigurationError::MalformedFlag {
    context: context.clone(),
    flag: raw.to_string(),
    reason,
  })
}

fn parse_patterns(
  raw: &[String],
  context: &FlagContext,
) -> Result<Vec<FlagPattern>, ConfigurationError> {
  raw.iter().map(|p| parse_pattern(p, context)).collect()
}
