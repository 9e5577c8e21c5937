use anyhow::bail;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;
use variant_flags::builtin;
use variant_flags::CompatibilityResolver;
use variant_flags::PriorityClass;
use variant_flags::Verdict;

mod report;

use report::write_json_report_to_stdout;
use report::ReportRef;

/// Exit code for configuration and usage errors; 1 is reserved for
/// incompatible flag combinations.
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "variant-flags", version, about = "Query test variant flags and their compatibility")]
struct Cli {
  /// Enable tracing output on stderr (filter with RUST_LOG).
  #[arg(long, global = true)]
  trace: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Check whether a variant can run with the given build variables and extra flags.
  Check(CheckArgs),
  /// Print variants in run order (all variants if none are given).
  Order(OrderArgs),
  /// Print the flag sets a variant passes.
  Flags(FlagsArgs),
  /// Load and validate a variant manifest.
  Validate(TableArgs),
}

#[derive(Args, Debug)]
struct TableArgs {
  /// Variant manifest (TOML or JSON). Defaults to the built-in V8 table.
  #[arg(long, value_name = "PATH")]
  manifest: Option<PathBuf>,

  /// Print a JSON report instead of text.
  #[arg(long)]
  json: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
  #[command(flatten)]
  table: TableArgs,

  /// Variant to check.
  #[arg(long, value_name = "NAME")]
  variant: String,

  /// Active build variable (e.g. `lite_mode`); may be repeated.
  #[arg(long = "build-var", value_name = "VAR")]
  build_vars: Vec<String>,

  /// Extra flags passed alongside the variant, after `--`.
  #[arg(last = true, value_name = "EXTRA_FLAGS")]
  extra_flags: Vec<String>,
}

#[derive(Args, Debug)]
struct OrderArgs {
  #[command(flatten)]
  table: TableArgs,

  /// Variant names to order.
  names: Vec<String>,
}

#[derive(Args, Debug)]
struct FlagsArgs {
  #[command(flatten)]
  table: TableArgs,

  /// Variant name.
  name: String,
}

#[derive(Debug, Serialize)]
struct OrderEntry<'a> {
  name: &'a str,
  priority: PriorityClass,
}

#[derive(Debug, Serialize)]
struct FlagsReport<'a> {
  name: &'a str,
  priority: PriorityClass,
  flag_sets: &'a [Vec<String>],
}

#[derive(Debug, Serialize)]
struct ValidateReport<'a> {
  variants: usize,
  variant_rules: usize,
  build_variable_rules: usize,
  flag_rules: usize,
  order: Vec<&'a str>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.trace);
  match try_main(cli.command) {
    Ok(code) => code,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::from(EXIT_ERROR)
    }
  }
}

fn try_main(command: Command) -> Result<ExitCode> {
  match command {
    Command::Check(args) => run_check(args),
    Command::Order(args) => run_order(args),
    Command::Flags(args) => run_flags(args),
    Command::Validate(args) => run_validate(args),
  }
}

fn init_tracing(enable: bool) {
  if !enable {
    return;
  }

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
  let builder = fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr);
  if let Err(err) = builder.try_init() {
    eprintln!("failed to install tracing subscriber: {err}");
  }
}

fn load_resolver(table: &TableArgs) -> Result<CompatibilityResolver> {
  let resolver = match &table.manifest {
    Some(path) => {
      debug!(manifest = %path.display(), "loading variant manifest");
      CompatibilityResolver::from_path(path)?
    }
    None => builtin::load()?,
  };
  Ok(resolver)
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
  let resolver = load_resolver(&args.table)?;
  let build_vars: Vec<&str> = args.build_vars.iter().map(String::as_str).collect();
  let extra_flags: Vec<&str> = args.extra_flags.iter().map(String::as_str).collect();
  let verdict = resolver.check(&args.variant, &build_vars, &extra_flags);

  if args.table.json {
    write_json_report_to_stdout(&ReportRef::new("check", &verdict))?;
  } else {
    print_verdict(&verdict);
  }

  Ok(if verdict.is_compatible() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

fn print_verdict(verdict: &Verdict) {
  if !verdict.known_variant {
    eprintln!("warning: unknown variant `{}`", verdict.variant);
  }
  let status = if verdict.is_compatible() {
    "compatible"
  } else {
    "incompatible"
  };
  println!("{}: {status}", verdict.variant);
  if verdict.alternatives.len() == 1 && verdict.is_compatible() {
    return;
  }
  for alt in &verdict.alternatives {
    println!("  flag set {} [{}]:", alt.index, alt.base_flags.join(" "));
    if alt.is_compatible() {
      println!("    ok");
    }
    for conflict in &alt.conflicts {
      println!("    {conflict}");
    }
  }
}

fn run_order(args: OrderArgs) -> Result<ExitCode> {
  let resolver = load_resolver(&args.table)?;
  let ordered: Vec<&str> = if args.names.is_empty() {
    resolver.all_variants()
  } else {
    for name in &args.names {
      if resolver.variant(name).is_none() {
        eprintln!("warning: unknown variant `{name}`");
      }
    }
    resolver.order_variants(args.names.iter().map(String::as_str))
  };

  if args.table.json {
    let entries: Vec<OrderEntry> = ordered
      .iter()
      .map(|&name| OrderEntry {
        name,
        priority: resolver.priority_of(name),
      })
      .collect();
    write_json_report_to_stdout(&ReportRef::new("order", &entries))?;
  } else {
    for name in ordered {
      println!("{name}");
    }
  }
  Ok(ExitCode::SUCCESS)
}

fn run_flags(args: FlagsArgs) -> Result<ExitCode> {
  let resolver = load_resolver(&args.table)?;
  let Some(variant) = resolver.variant(&args.name) else {
    bail!("unknown variant `{}`", args.name);
  };

  if args.table.json {
    let report = FlagsReport {
      name: variant.name(),
      priority: variant.priority(),
      flag_sets: variant.flag_sets(),
    };
    write_json_report_to_stdout(&ReportRef::new("flags", &report))?;
  } else {
    for set in variant.flag_sets() {
      if set.is_empty() {
        println!("(no flags)");
      } else {
        println!("{}", set.join(" "));
      }
    }
  }
  Ok(ExitCode::SUCCESS)
}

fn run_validate(args: TableArgs) -> Result<ExitCode> {
  let resolver = load_resolver(&args)?;
  let rules = resolver.rules();
  let report = ValidateReport {
    variants: resolver.variants().len(),
    variant_rules: rules.variant_rule_count(),
    build_variable_rules: rules.build_variable_rule_count(),
    flag_rules: rules.flag_rule_count(),
    order: resolver.all_variants(),
  };

  if args.json {
    write_json_report_to_stdout(&ReportRef::new("validate", &report))?;
  } else {
    println!(
      "ok: {} variants, {} variant rules, {} build variable rules, {} flag rules",
      report.variants, report.variant_rules, report.build_variable_rules, report.flag_rules
    );
  }
  Ok(ExitCode::SUCCESS)
}
