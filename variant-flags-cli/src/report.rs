use anyhow::Context;
use serde::Serialize;
use std::io;
use std::io::Write;

/// Bump when the shape of any JSON report changes.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Top-level wrapper for every JSON report the CLI prints.
#[derive(Debug, Serialize)]
pub struct ReportRef<'a, T> {
  pub schema_version: u32,
  pub command: &'static str,
  pub report: &'a T,
}

impl<'a, T> ReportRef<'a, T> {
  pub fn new(command: &'static str, report: &'a T) -> Self {
    Self {
      schema_version: REPORT_SCHEMA_VERSION,
      command,
      report,
    }
  }
}

/// Write a pretty JSON report to `writer`.
///
/// Output is deterministic as long as `report` only contains ordered
/// collections.
pub fn write_json_report_to_writer<W: Write, T: Serialize>(
  writer: &mut W,
  report: &T,
) -> anyhow::Result<()> {
  serde_json::to_writer_pretty(&mut *writer, report).context("write JSON report")?;
  writeln!(&mut *writer).ok();
  Ok(())
}

pub fn write_json_report_to_stdout<T: Serialize>(report: &T) -> anyhow::Result<()> {
  let stdout = io::stdout();
  let mut handle = stdout.lock();
  write_json_report_to_writer(&mut handle, report)
}
