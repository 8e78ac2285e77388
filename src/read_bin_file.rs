use crate::input::TemperatureBin;
use anyhow::{anyhow, Context};
use csv::{ReaderBuilder, Trim};
use serde_valid::Validate;
use std::io::Read;

/// Read a temperature bin table from CSV with a header row naming the columns
/// `odb`, `owb`, `occupied_hours` and (optionally) `unoccupied_hours`.
pub fn bins_from_csv(file: impl Read) -> anyhow::Result<Vec<TemperatureBin>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut bins = vec![];
    for (i, result) in reader.deserialize().enumerate() {
        let bin: TemperatureBin =
            result.with_context(|| format!("Could not read temperature bin in row {}", i + 1))?;
        bin.validate().map_err(|errors| {
            anyhow!("Temperature bin in row {} is invalid: {errors}", i + 1)
        })?;
        bins.push(bin);
    }

    Ok(bins)
}
