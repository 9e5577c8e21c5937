use serde::Serialize;
use serde::Serializer;
use std::fmt;
use std::str::FromStr;

/// Value marker that turns a flag into a wildcard pattern (`--name=*`).
pub const WILDCARD_VALUE: &str = "*";

/// Returns the flag name of a command-line flag: everything before the first
/// `=`, or the whole flag if it carries no value.
pub fn flag_name(flag: &str) -> &str {
  match flag.split_once('=') {
    Some((name, _)) => name,
    None => flag,
  }
}

/// A flag that must not be passed under some condition.
///
/// Exact patterns match a flag only by string equality. Wildcard patterns
/// (`--name=*`) match every flag with the same name, whatever its value,
/// including the bare `--name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlagPattern {
  Exact(String),
  /// Name includes the leading `--`.
  Wildcard(String),
}

impl FlagPattern {
  /// Parses a well-formed flag pattern: `--name`, `--name=value` or `--name=*`.
  pub fn parse(raw: &str) -> Result<FlagPattern, &'static str> {
    let (name, value) = check_syntax(raw)?;
    match value {
      Some(WILDCARD_VALUE) => Ok(FlagPattern::Wildcard(name.to_string())),
      _ => Ok(FlagPattern::Exact(raw.to_string())),
    }
  }

  pub fn is_wildcard(&self) -> bool {
    matches!(self, FlagPattern::Wildcard(_))
  }

  pub fn name(&self) -> &str {
    match self {
      FlagPattern::Exact(flag) => flag_name(flag),
      FlagPattern::Wildcard(name) => name,
    }
  }

  pub fn matches(&self, flag: &str) -> bool {
    match self {
      FlagPattern::Exact(pattern) => pattern == flag,
      FlagPattern::Wildcard(name) => flag_name(flag) == name,
    }
  }
}

impl FromStr for FlagPattern {
  type Err = &'static str;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    FlagPattern::parse(raw)
  }
}

impl fmt::Display for FlagPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FlagPattern::Exact(flag) => f.write_str(flag),
      FlagPattern::Wildcard(name) => write!(f, "{name}={WILDCARD_VALUE}"),
    }
  }
}

impl Serialize for FlagPattern {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Checks that `raw` is a flag a test runner could pass, returning its name
/// and optional value. A value of `*` is accepted here; callers that need a
/// concrete flag reject it themselves.
pub(crate) fn check_syntax(raw: &str) -> Result<(&str, Option<&str>), &'static str> {
  let Some(rest) = raw.strip_prefix("--") else {
    return Err("flags must start with `--`");
  };
  let (name_part, value) = match rest.split_once('=') {
    Some((name, value)) => (name, Some(value)),
    None => (rest, None),
  };

  if name_part.is_empty() {
    return Err("missing flag name");
  }
  if name_part.starts_with('-') {
    return Err("flag names must not start with `-`");
  }
  if !name_part
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
  {
    return Err("flag names may only contain ASCII letters, digits, `-` and `_`");
  }

  if let Some(value) = value {
    if value.is_empty() {
      return Err("missing value after `=`");
    }
    if value.chars().any(char::is_whitespace) {
      return Err("flag values must not contain whitespace");
    }
    if value != WILDCARD_VALUE && value.contains('*') {
      return Err("`*` must be the entire value");
    }
  }

  let name_len = "--".len() + name_part.len();
  Ok((&raw[..name_len], value))
}
