use crate::config::ResolverConfig;
use crate::error::ConfigurationError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

/// On-disk description of variants and incompatibility rules (TOML or JSON).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  #[serde(default)]
  pub variants: Entries<Vec<Vec<String>>>,
  #[serde(default)]
  pub priority: RawPriority,
  #[serde(default)]
  pub incompatible: RawIncompatible,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPriority {
  #[serde(default)]
  pub slow: Vec<String>,
  #[serde(default)]
  pub fast: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawIncompatible {
  #[serde(default)]
  pub variant: Entries<RawRule>,
  #[serde(default)]
  pub build_variable: Entries<RawRule>,
  #[serde(default)]
  pub extra_flag: Entries<RawRule>,
}

/// Table entries in document order. Repeated keys are kept so the table
/// builders can reject or merge them.
#[derive(Debug, Clone)]
pub struct Entries<T>(pub Vec<(String, T)>);

impl<T> Default for Entries<T> {
  fn default() -> Self {
    Entries(Vec::new())
  }
}

impl<T> Entries<T> {
  /// Every value stored under `key`, in document order.
  pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a T> + 'a {
    self
      .0
      .iter()
      .filter(move |(name, _)| name == key)
      .map(|(_, value)| value)
  }
}

impl<'de, T> Deserialize<'de> for Entries<T>
where
  T: Deserialize<'de>,
{
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::de::Deserializer<'de>,
  {
    struct Visitor<T>(PhantomData<T>);

    impl<'de, T> serde::de::Visitor<'de> for Visitor<T>
    where
      T: Deserialize<'de>,
    {
      type Value = Entries<T>;

      fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a table of named entries")
      }

      fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
      where
        A: serde::de::MapAccess<'de>,
      {
        let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, T>()? {
          out.push(entry);
        }
        Ok(Entries(out))
      }
    }

    deserializer.deserialize_map(Visitor(PhantomData))
  }
}

/// A rule entry: either a plain pattern list, or patterns plus the names of
/// per-variant rule entries whose patterns are reused.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRule {
  Flags(Vec<String>),
  Composite(CompositeRule),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeRule {
  #[serde(default)]
  pub flags: Vec<String>,
  #[serde(default)]
  pub variant_rules: Vec<String>,
}

impl RawRule {
  fn parts(&self) -> (&[String], &[String]) {
    match self {
      RawRule::Flags(flags) => (flags.as_slice(), &[][..]),
      RawRule::Composite(rule) => (rule.flags.as_slice(), rule.variant_rules.as_slice()),
    }
  }
}

impl Manifest {
  pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_str(&raw)
  }

  pub fn from_str(raw: &str) -> Result<Self, ConfigurationError> {
    match toml::from_str::<Manifest>(raw) {
      Ok(manifest) => Ok(manifest),
      Err(toml_err) => {
        serde_json::from_str::<Manifest>(raw).map_err(|json_err| ConfigurationError::Parse {
          toml: toml_err.to_string(),
          json: json_err.to_string(),
        })
      }
    }
  }

  /// Flattens the manifest into table definitions, expanding `variant_rules`
  /// references by value.
  pub fn into_config(self) -> Result<ResolverConfig, ConfigurationError> {
    let Manifest {
      variants,
      priority,
      incompatible,
    } = self;

    let expand = |owner: String, rule: &RawRule| -> Result<(String, Vec<String>), ConfigurationError> {
      let mut visiting = BTreeSet::new();
      let mut out = Vec::new();
      expand_rule(&owner, rule, &incompatible.variant, &mut visiting, &mut out)?;
      Ok((owner, out))
    };

    let mut config = ResolverConfig {
      variants: variants.0,
      slow: priority.slow,
      fast: priority.fast,
      ..ResolverConfig::default()
    };
    for (name, rule) in &incompatible.variant.0 {
      config.variant_rules.push(expand(name.clone(), rule)?);
    }
    for (name, rule) in &incompatible.build_variable.0 {
      config.build_variable_rules.push(expand(name.clone(), rule)?);
    }
    for (flag, rule) in &incompatible.extra_flag.0 {
      config.extra_flag_rules.push(expand(flag.clone(), rule)?);
    }
    Ok(config)
  }
}

fn expand_rule(
  owner: &str,
  rule: &RawRule,
  variant_rules: &Entries<RawRule>,
  visiting: &mut BTreeSet<String>,
  out: &mut Vec<String>,
) -> Result<(), ConfigurationError> {
  let (flags, references) = rule.parts();
  for flag in flags {
    if !out.contains(flag) {
      out.push(flag.clone());
    }
  }
  for name in references {
    let mut referenced = variant_rules.get_all(name).peekable();
    if referenced.peek().is_none() {
      return Err(ConfigurationError::UnknownRuleReference {
        owner: owner.to_string(),
        name: name.clone(),
      });
    }
    // A reference cycle adds nothing new.
    if visiting.insert(name.clone()) {
      for rule in referenced {
        expand_rule(owner, rule, variant_rules, visiting, out)?;
      }
    }
  }
  Ok(())
}
