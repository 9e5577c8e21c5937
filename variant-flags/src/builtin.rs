//! The V8 test-runner variant table shipped with this crate.

use crate::error::ConfigurationError;
use crate::resolver::CompatibilityResolver;
use once_cell::sync::OnceCell;

pub const BUILTIN_MANIFEST: &str = include_str!("../data/variants.toml");

static RESOLVER: OnceCell<CompatibilityResolver> = OnceCell::new();

/// Returns the process-wide resolver for the built-in table, validating it on
/// first use. Concurrent first callers block until validation completes.
pub fn resolver() -> Result<&'static CompatibilityResolver, ConfigurationError> {
  RESOLVER.get_or_try_init(load)
}

/// Builds a fresh resolver from the built-in table.
pub fn load() -> Result<CompatibilityResolver, ConfigurationError> {
  CompatibilityResolver::from_manifest_str(BUILTIN_MANIFEST)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::PriorityClass;

  #[test]
  fn builtin_table_validates() {
    let resolver = resolver().unwrap();
    assert_eq!(resolver.variants().len(), 28);
    assert_eq!(resolver.priority_of("stress"), PriorityClass::Slow);
    assert_eq!(resolver.priority_of("default"), PriorityClass::Fast);
    assert_eq!(
      resolver.base_flag_sets("stress_sampling").unwrap(),
      &[vec!["--stress-sampling-allocation-profiler=16384".to_string()]]
    );
  }

  #[test]
  fn singleton_is_shared() {
    let first = resolver().unwrap() as *const CompatibilityResolver;
    let second = resolver().unwrap() as *const CompatibilityResolver;
    assert_eq!(first, second);
  }
}
