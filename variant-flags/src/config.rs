/// Unvalidated table definitions, as handed to
/// [`CompatibilityResolver::new`](crate::CompatibilityResolver::new).
///
/// Entries are kept as ordered pairs so duplicate definitions can be detected
/// (for variants) or merged (for rules).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverConfig {
  pub variants: Vec<(String, Vec<Vec<String>>)>,
  pub slow: Vec<String>,
  pub fast: Vec<String>,
  pub variant_rules: Vec<(String, Vec<String>)>,
  pub build_variable_rules: Vec<(String, Vec<String>)>,
  pub extra_flag_rules: Vec<(String, Vec<String>)>,
}

fn owned<I, S>(items: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  items.into_iter().map(Into::into).collect()
}

impl ResolverConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a variant with a single flag set.
  pub fn variant<I, S>(self, name: impl Into<String>, flags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.variant_alternatives(name, vec![owned(flags)])
  }

  pub fn variant_alternatives(mut self, name: impl Into<String>, flag_sets: Vec<Vec<String>>) -> Self {
    self.variants.push((name.into(), flag_sets));
    self
  }

  pub fn slow<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.slow.extend(owned(names));
    self
  }

  pub fn fast<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.fast.extend(owned(names));
    self
  }

  pub fn variant_rule<I, S>(mut self, variant: impl Into<String>, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.variant_rules.push((variant.into(), owned(patterns)));
    self
  }

  pub fn build_variable_rule<I, S>(mut self, variable: impl Into<String>, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .build_variable_rules
      .push((variable.into(), owned(patterns)));
    self
  }

  pub fn extra_flag_rule<I, S>(mut self, flag: impl Into<String>, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.extra_flag_rules.push((flag.into(), owned(patterns)));
    self
  }
}
