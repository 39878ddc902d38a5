use super::CliError;
use anyhow::Context;
use autobk_core::{BackgroundResult, Spectrum};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub(super) fn read_spectrum_file(path: &Path) -> Result<Spectrum, CliError> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file '{}'", path.display()))?;

    let mut energy = Vec::new();
    let mut mu = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(['#', '*', ';']) {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(first), Some(second)) = (fields.next(), fields.next()) else {
            return Err(CliError::Usage(format!(
                "line {} of '{}' does not hold two columns",
                line_number + 1,
                path.display()
            )));
        };
        let parse = |field: &str| -> Result<f64, CliError> {
            field.parse().map_err(|_| {
                CliError::Usage(format!(
                    "invalid number '{}' on line {} of '{}'",
                    field,
                    line_number + 1,
                    path.display()
                ))
            })
        };
        energy.push(parse(first)?);
        mu.push(parse(second)?);
    }

    Spectrum::new(energy, mu).map_err(CliError::Compute)
}

pub(super) fn write_background_table(
    path: &Path,
    spectrum: &Spectrum,
    result: &BackgroundResult,
) -> Result<(), CliError> {
    let mut table = String::new();
    let band = result.delta_background.as_deref();
    let _ = writeln!(
        table,
        "# energy mu bkg chie{}",
        if band.is_some() { " delta_bkg" } else { "" }
    );

    for index in 0..spectrum.len() {
        let _ = write!(
            table,
            "{:18.10e} {:18.10e} {:18.10e} {:18.10e}",
            spectrum.energy()[index],
            spectrum.mu()[index],
            result.background[index],
            result.chie[index]
        );
        if let Some(band) = band {
            let _ = write!(table, " {:18.10e}", band[index]);
        }
        let _ = writeln!(table);
    }

    fs::write(path, table)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

pub(super) fn write_chi_table(path: &Path, result: &BackgroundResult) -> Result<(), CliError> {
    let mut table = String::new();
    let band = result.delta_chi.as_deref();
    let _ = writeln!(
        table,
        "# k chi{}",
        if band.is_some() { " delta_chi" } else { "" }
    );

    for index in 0..result.k.len() {
        let _ = write!(
            table,
            "{:18.10e} {:18.10e}",
            result.k[index], result.chi[index]
        );
        if let Some(band) = band {
            let _ = write!(table, " {:18.10e}", band[index]);
        }
        let _ = writeln!(table);
    }

    fs::write(path, table)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

pub(super) fn write_diagnostics_json(path: &Path, result: &BackgroundResult) -> Result<(), CliError> {
    let report = serde_json::json!({
        "edge": result.edge,
        "diagnostics": result.diagnostics,
    });
    let text =
        serde_json::to_string_pretty(&report).context("failed to serialize diagnostics")?;
    fs::write(path, text)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}
