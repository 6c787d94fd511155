//! Interactive prompts and their input checks.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use stanpost_core::{BatchOutcome, RoutingGroup};

/// Print `message` and read one trimmed line from `input`.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, message: &str) -> Result<String> {
    write!(output, "{}", message).context("Failed to write prompt")?;
    output.flush().context("Failed to flush prompt")?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read input")?;
    if read == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

/// Group matching `code` exactly.
pub fn select_group<'a>(groups: &'a [RoutingGroup], code: &str) -> Result<&'a RoutingGroup> {
    match groups.iter().find(|g| g.code == code) {
        Some(group) => Ok(group),
        None => bail!("invalid routing code selection: {:?}", code),
    }
}

/// Parse a record count in `1..=limit`.
pub fn parse_count(input: &str, limit: usize) -> Result<usize> {
    let count: usize = input
        .parse()
        .with_context(|| format!("invalid number format: {:?}", input))?;
    if count == 0 || count > limit {
        bail!("invalid count: must be between 1 and {}", limit);
    }
    Ok(count)
}

/// One line per record: primary status and failed uploads.
pub fn describe(outcome: &BatchOutcome) -> String {
    let result = &outcome.result;
    match &result.primary {
        Err(e) => format!("{}: FAILED ({})", outcome.idpel, e),
        Ok(_) if result.is_complete_success() => format!(
            "{}: OK ({}/{})",
            outcome.idpel,
            result.succeeded_count(),
            result.total()
        ),
        Ok(_) => format!(
            "{}: OK ({}/{}, failed uploads: {})",
            outcome.idpel,
            result.succeeded_count(),
            result.total(),
            result.failed_endpoints().join(", ")
        ),
    }
}
