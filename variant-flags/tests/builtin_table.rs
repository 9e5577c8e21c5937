use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use variant_flags::builtin;
use variant_flags::CompatibilityResolver;
use variant_flags::ConfigurationError;
use variant_flags::FlagPattern;
use variant_flags::PriorityClass;
use variant_flags::ResolverConfig;
use variant_flags::RuleSource;

#[test]
fn jitless_under_lite_mode_rejects_opt() {
  let resolver = builtin::resolver().unwrap();
  let verdict = resolver.check("jitless", &["lite_mode"], &["--opt"]);
  assert!(!verdict.is_compatible());
  assert!(!resolver.is_compatible("jitless", &["lite_mode"], &["--opt"]));

  let sources: Vec<_> = verdict.conflicts().map(|c| c.source.clone()).collect();
  assert!(sources.contains(&RuleSource::Variant("jitless".to_string())));
  assert!(sources.contains(&RuleSource::BuildVariable("lite_mode".to_string())));
}

#[test]
fn build_variable_inherits_variant_rules() {
  let resolver = builtin::resolver().unwrap();
  for flag in ["--opt", "--always-opt", "--liftoff", "--track-field-types", "--validate-asm"] {
    assert!(
      !resolver.is_compatible("default", &["lite_mode"], &[flag]),
      "{flag} should conflict with lite_mode"
    );
  }
  assert!(!resolver.is_compatible("default", &["lite_mode"], &["--max-semi-space-size=16"]));
  assert!(resolver.is_compatible("default", &["lite_mode"], &["--stress-opt"]));
}

#[test]
fn wildcard_rules_match_any_value() {
  let resolver = builtin::resolver().unwrap();
  assert!(!resolver.is_compatible("stress", &[], &["--max-inlined-bytecode-size=1"]));
  assert!(!resolver.is_compatible("stress", &[], &["--max-inlined-bytecode-size-cumulative=99"]));
  assert!(!resolver.is_compatible("turboprop", &[], &["--interrupt-budget=1024"]));
  assert!(!resolver.is_compatible("default", &["predictable"], &["--wasm-num-compilation-tasks=0"]));
  // Bare names collide with wildcards too.
  assert!(!resolver.is_compatible("turboprop", &[], &["--interrupt-budget"]));
}

#[test]
fn gc_interval_may_be_passed_once() {
  let resolver = builtin::resolver().unwrap();
  assert!(resolver.is_compatible("default", &[], &["--gc-interval=1"]));
  assert!(!resolver.is_compatible("default", &[], &["--gc-interval=1", "--gc-interval=2"]));
  assert!(!resolver.is_compatible("default", &[], &["--gc-interval=1", "--gc-interval=1"]));
}

#[test]
fn self_excluding_wildcard_across_base_and_extra_flags() {
  let resolver = CompatibilityResolver::new(
    ResolverConfig::new()
      .variant("x2", ["--x=2"])
      .variant("plain", Vec::<String>::new())
      .extra_flag_rule("--x=*", ["--x=*"]),
  )
  .unwrap();
  assert!(!resolver.is_compatible("x2", &[], &["--x=1"]));
  assert!(resolver.is_compatible("plain", &[], &["--x=1"]));
  assert!(resolver.is_compatible("x2", &[], &[]));
}

#[test]
fn extra_flag_rules_conflict_between_extras() {
  let resolver = builtin::resolver().unwrap();
  let verdict = resolver.check(
    "default",
    &[],
    &["--concurrent-recompilation", "--predictable"],
  );
  let conflict = verdict.conflicts().next().unwrap();
  assert_eq!(conflict.flag, "--predictable");
  assert_eq!(
    conflict.source,
    RuleSource::ExtraFlag(FlagPattern::parse("--concurrent-recompilation").unwrap())
  );
  assert!(resolver.is_compatible("default", &[], &["--concurrent-recompilation"]));
}

#[test]
fn reused_rule_set_for_incremental_marking_flag() {
  let resolver = builtin::resolver().unwrap();
  assert!(!resolver.is_compatible(
    "default",
    &[],
    &["--stress-incremental-marking", "--no-stress-incremental-marking"],
  ));
  assert!(!resolver.is_compatible(
    "stress_incremental_marking",
    &[],
    &["--no-stress-incremental-marking"],
  ));
}

#[test]
fn inactive_rules_never_conflict() {
  let resolver = builtin::resolver().unwrap();
  // `--predictable` is only excluded by variants and flags that are not active here.
  assert!(resolver.is_compatible("default", &[], &["--predictable", "--opt", "--liftoff"]));
  // Unknown build variables carry no rules.
  assert!(resolver.is_compatible("jitless", &["is_debug"], &["--no-opt"]));
}

#[test]
fn variant_base_flags_conflict_with_build_variables() {
  let resolver = builtin::resolver().unwrap();
  // nooptimization passes `--liftoff`, which predictable builds forbid.
  assert!(!resolver.is_compatible("nooptimization", &["predictable"], &[]));
  assert!(!resolver.is_compatible("stress_concurrent_allocation", &["predictable"], &[]));
  assert!(resolver.is_compatible("stress", &["predictable"], &[]));
}

#[test]
fn queries_are_repeatable() {
  let resolver = builtin::resolver().unwrap();
  let first = resolver.check("stress", &["lite_mode"], &["--liftoff", "--gc-interval=3"]);
  let second = resolver.check("stress", &["lite_mode"], &["--liftoff", "--gc-interval=3"]);
  assert_eq!(first, second);
}

#[test]
fn all_variants_run_slow_first_and_default_last() {
  let resolver = builtin::resolver().unwrap();
  let all = resolver.all_variants();
  assert_eq!(all.len(), resolver.variants().len());
  assert_eq!(&all[..3], &["nooptimization", "stress", "stress_snapshot"]);
  assert_eq!(all.last(), Some(&"default"));
}

#[test]
fn all_variants_keep_definition_order_within_class() {
  let resolver = builtin::resolver().unwrap();
  let all = resolver.all_variants();
  let position = |name: &str| all.iter().position(|&n| n == name).unwrap();
  assert!(position("interpreted_regexp") < position("experimental_regexp"));
  assert!(position("trusted") < position("no_wasm_traps"));
  assert!(position("no_wasm_traps") < position("turboprop"));

  let defined: Vec<&str> = resolver
    .variant_names()
    .filter(|&name| resolver.priority_of(name) == PriorityClass::Normal)
    .collect();
  let normal: Vec<&str> = all
    .iter()
    .copied()
    .filter(|&name| resolver.priority_of(name) == PriorityClass::Normal)
    .collect();
  assert_eq!(normal, defined);
}

#[test]
fn order_preserves_input_order_within_class() {
  let resolver = builtin::resolver().unwrap();
  let ordered = resolver.order_variants(["default", "jitless", "stress", "future", "nooptimization"]);
  assert_eq!(
    ordered,
    vec!["stress", "nooptimization", "jitless", "future", "default"]
  );
  let owned = resolver.order_variants(vec!["default".to_string(), "stress_snapshot".to_string()]);
  assert_eq!(owned, vec!["stress_snapshot".to_string(), "default".to_string()]);
}

#[test]
fn unknown_classified_variant_fails_construction() {
  let err = CompatibilityResolver::new(
    ResolverConfig::new()
      .variant("default", Vec::<String>::new())
      .slow(["nonexistent_variant"]),
  )
  .unwrap_err();
  match err {
    ConfigurationError::UnknownClassifiedVariant { class, name } => {
      assert_eq!(class, PriorityClass::Slow);
      assert_eq!(name, "nonexistent_variant");
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn malformed_patterns_fail_construction() {
  let err = CompatibilityResolver::new(
    ResolverConfig::new()
      .variant("default", Vec::<String>::new())
      .build_variable_rule("lite_mode", ["max-semi-space-size=*"]),
  )
  .unwrap_err();
  assert!(matches!(err, ConfigurationError::MalformedFlag { .. }));
  assert!(err.to_string().contains("lite_mode"), "{err}");

  let err = CompatibilityResolver::new(ResolverConfig::new().extra_flag_rule("--gc-interval=", ["--x"]))
    .unwrap_err();
  assert!(matches!(err, ConfigurationError::MalformedFlag { .. }));
}

#[test]
fn loads_manifest_from_disk() {
  let temp = tempdir().unwrap();
  let path = temp.path().join("variants.toml");
  fs::write(
    &path,
    r#"
[variants]
default = [[]]
jitless = [["--jitless"]]

[incompatible.variant]
jitless = ["--opt"]
"#,
  )
  .unwrap();
  let resolver = CompatibilityResolver::from_path(&path).unwrap();
  assert!(!resolver.is_compatible("jitless", &[], &["--opt"]));

  let err = CompatibilityResolver::from_path(&temp.path().join("missing.toml")).unwrap_err();
  assert!(matches!(err, ConfigurationError::Read { .. }));
}

#[test]
fn resolver_is_shared_across_threads() {
  let resolver = Arc::new(builtin::load().unwrap());
  let handles: Vec<_> = (0..4)
    .map(|_| {
      let resolver = Arc::clone(&resolver);
      std::thread::spawn(move || resolver.is_compatible("jitless", &["lite_mode"], &["--opt"]))
    })
    .collect();
  for handle in handles {
    assert!(!handle.join().unwrap());
  }
}
