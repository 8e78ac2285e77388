#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod input;
pub mod output;
pub mod read_bin_file;
mod statistics;

#[macro_use]
extern crate is_close;

pub use crate::core::bin_simulation::{BinRecord, SimulationResults};
use crate::core::bin_simulation::{run_bin_simulation, SimulationSettings};
use crate::core::design_conditions::{resolve_design_conditions, DesignConditions};
use crate::core::equipment::{EquipmentProfile, ProfileError, SharedRating, UnitRole};
use crate::core::load_line::{compute_load_line, LoadLine, LoadLineInputs};
use crate::core::performance::air::InsideHumidity;
use crate::errors::{OutputError, RtuCoreError, RtuError};
use crate::input::{ingest_for_processing, TemperatureBin, UnitInput};
use crate::output::Output;
use anyhow::anyhow;
use csv::WriterBuilder;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::io::{Read, Write};
use tracing::info;

/// Results for the candidate and standard units, in that order
#[derive(Debug, Serialize)]
pub struct RunResults {
    pub design: DesignConditions,
    pub load_line: LoadLine,
    pub units: IndexMap<UnitRole, SimulationResults>,
}

impl RunResults {
    pub fn unit(&self, role: UnitRole) -> Option<&SimulationResults> {
        self.units.get(&role)
    }

    /// Annual energy the candidate unit saves over the standard unit, kWh
    pub fn annual_savings_kwh(&self) -> Option<f64> {
        Some(
            self.unit(UnitRole::Standard)?.annual_total_kwh
                - self.unit(UnitRole::Candidate)?.annual_total_kwh,
        )
    }
}

/// Run both units of a project through its bin table.
///
/// The bin table comes from the input unless one is given separately (e.g. read from a CSV
/// file). Bin tables for each unit and occupancy are written as CSV, and a summary as JSON.
pub fn run_project(
    input: impl Read,
    output: impl Output,
    bins_from_file: Option<Vec<TemperatureBin>>,
) -> Result<RunResults, RtuError> {
    let input = ingest_for_processing(input)?;

    let mut bins = match bins_from_file {
        Some(bins) => bins,
        None => input.bins.clone(),
    };
    if bins.is_empty() {
        return Err(anyhow!("No temperature bins were given in the input or as a bin file").into());
    }
    bins.sort_by(|a, b| OrderedFloat(a.odb).cmp(&OrderedFloat(b.odb)));

    let project = &input.project;
    let rating = SharedRating::from_project(project).map_err(anyhow::Error::from)?;
    let candidate = build_profile(UnitRole::Candidate, &input.candidate, &rating)?;
    let standard = build_profile(UnitRole::Standard, &input.standard, &rating)?;

    let design =
        resolve_design_conditions(input.design.dry_bulb, input.design.elevation_ft, &bins)
            .map_err(|err| RtuCoreError::new(err.into()))?;

    let inside_humidity = InsideHumidity::from(&project.inside_humidity);
    let load_line = compute_load_line(
        &candidate,
        &LoadLineInputs {
            design,
            indoor_setpoint: project.indoor_setpoint,
            inside_humidity,
            oversizing_percent: project.oversizing_percent,
            internal_load_fraction: project.internal_load_fraction,
            locked: project.load_line_lock,
        },
    )
    .map_err(|err| RtuCoreError::new(err.into()))?;
    info!(
        slope = load_line.slope,
        intercept = load_line.intercept,
        locked = load_line.locked,
        "load line built from the candidate unit"
    );

    let settings = SimulationSettings {
        indoor_setpoint: project.indoor_setpoint,
        setback: project.setback,
        inside_humidity,
        units: project.units,
    };
    let (candidate_results, standard_results) = rayon::join(
        || run_bin_simulation(&candidate, &load_line, &bins, &settings),
        || run_bin_simulation(&standard, &load_line, &bins, &settings),
    );

    let results = RunResults {
        design,
        load_line,
        units: IndexMap::from([
            (UnitRole::Candidate, candidate_results),
            (UnitRole::Standard, standard_results),
        ]),
    };
    if let Some(savings) = results.annual_savings_kwh() {
        info!(annual_savings_kwh = savings, "candidate against standard");
    }

    if !output.is_noop() {
        write_results(&output, &results)
            .map_err(|err| RtuError::ErrorInOutput(OutputError::new(err)))?;
    }

    Ok(results)
}

fn build_profile(
    role: UnitRole,
    unit: &UnitInput,
    rating: &SharedRating,
) -> Result<EquipmentProfile, RtuError> {
    EquipmentProfile::build(role, unit, rating).map_err(|err| match err {
        ProfileError::Input { .. } => RtuError::InvalidRequest(err.into()),
        ProfileError::RatedBypassFactor { .. } => RtuCoreError::new(err.into()).into(),
    })
}

fn write_results(output: &impl Output, results: &RunResults) -> anyhow::Result<()> {
    for (role, unit_results) in &results.units {
        for (occupancy, records) in [
            ("occupied", &unit_results.occupied_bins),
            ("unoccupied", &unit_results.unoccupied_bins),
        ] {
            if records.is_empty() {
                continue;
            }
            write_bin_table(output, &format!("{role}_{occupancy}"), records)?;
        }
    }

    let mut writer = output.writer_for_location_key("summary", "json")?;
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;

    Ok(())
}

fn write_bin_table(
    output: &impl Output,
    location_key: &str,
    records: &[BinRecord],
) -> anyhow::Result<()> {
    info!("writing out bin table {location_key}");
    let writer = output.writer_for_location_key(location_key, "csv")?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests;
