/// Parsing and modelling of a manufacturer's rated-performance table.
///
/// The table is tab separated text exported from the rating spreadsheet. The second line
/// carries the format version; the body has one `Cap/Cond/ST` row per outdoor/entering wet-bulb
/// point and one `Partload` row per load level, plus single-value nameplate rows.
use crate::core::regression::{FittedModel, RegressionError};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

const REQUIRED_VERSION: &str = "V1.2";
const MAX_LINES: usize = 40;
const MAX_OPERATING_POINTS: usize = 18;
const MAX_PART_LOAD_ROWS: usize = 4;

/// Entering dry bulbs of the three S/T columns
const ST_ENTERING_DRY_BULBS: [f64; 3] = [75., 80., 85.];
/// Outdoor dry bulbs of the four part-load EER columns
const PART_LOAD_OUTDOOR_DRY_BULBS: [f64; 4] = [95., 81.5, 68., 65.];

pub(crate) const GROSS_CAPACITY_TERMS: &str = "X1 + X1^2 + X2^2 + X1*X2 + X1^2*X2^2";
pub(crate) const CONDENSER_POWER_TERMS: &str = "X1^2 + X2^2 + X1*X2 + X1^2*X2^2 + X1^3*X2^3";
pub(crate) const ST_RATIO_TERMS: &str = "X2 + X3 + X2*X3 + X2^2*X3 + X1*X2*X3^2 + X1*X2^2*X3";
pub(crate) const PART_LOAD_EER_TERMS: &str = "1 + X1 + X1^2 + X1*X2 + X1^2*X2 + X1^3";

#[derive(Debug, Error, PartialEq)]
pub enum ManufacturerDataError {
    #[error("Spreadsheet data is not in the correct form ({lines} lines).")]
    WrongForm { lines: usize },
    #[error("Spreadsheet version is not {REQUIRED_VERSION}.")]
    WrongVersion,
}

/// Single-value rows of the table, as rated by the manufacturer
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Nameplate {
    pub air_flow: Option<f64>,
    pub gross_cooling_capacity: Option<f64>,
    pub net_cooling_capacity: Option<f64>,
    pub rated_air_flow: Option<f64>,
    pub evaporator_fan_power: Option<f64>,
    pub condenser_power: Option<f64>,
    pub auxiliary_power: Option<f64>,
    pub total_system_power: Option<f64>,
    pub eer: Option<f64>,
    pub ieer: Option<f64>,
    pub st_ratio: Option<f64>,
}

/// Numeric rows extracted from the table, each laid out as `[response, x1, x2, ...]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RatedPerformanceTable {
    /// Gross capacity (kBtuh) vs ODB, EWB
    pub gross_capacity: Vec<Vec<f64>>,
    /// Condenser power (kW) vs ODB, EWB
    pub condenser_power: Vec<Vec<f64>>,
    /// S/T ratio vs ODB, EWB, EDB
    pub st_ratio: Vec<Vec<f64>>,
    /// EER normalised by the first part-load row vs load %, ODB
    pub normalised_part_load_eer: Vec<Vec<f64>>,
    pub nameplate: Nameplate,
    operating_points: usize,
    part_load_rows: usize,
}

/// Missing or non-numeric cells read as not-a-number so that the regression discards them.
fn cell_value(cells: &[&str], index: usize) -> f64 {
    cells
        .get(index)
        .and_then(|cell| cell.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn nameplate_value(cells: &[&str]) -> Option<f64> {
    Some(cell_value(cells, 2)).filter(|value| value.is_finite())
}

impl RatedPerformanceTable {
    pub fn parse(text: &str) -> Result<Self, ManufacturerDataError> {
        let lines: Vec<&str> = if text.is_empty() {
            vec![]
        } else {
            text.split("\r\n")
                .flat_map(|line| line.split(['\n', '\r']))
                .collect()
        };

        if !(lines.len() > 1 && lines.len() < MAX_LINES) {
            return Err(ManufacturerDataError::WrongForm { lines: lines.len() });
        }
        if !lines[1].contains(REQUIRED_VERSION) {
            return Err(ManufacturerDataError::WrongVersion);
        }

        let mut table = Self::default();
        // raw part-load EER indexed [row][outdoor column]
        let mut part_load_eer: Vec<(f64, [f64; 4])> = vec![];

        for line in lines.iter().take(lines.len() - 1).skip(2) {
            let cells: Vec<&str> = line.split('\t').collect();
            let key = cells.first().map_or("", |cell| cell.trim());

            match key {
                "Cap/Cond/ST" => {
                    if table.operating_points == MAX_OPERATING_POINTS {
                        warn!("Ignoring rated operating point beyond the first {MAX_OPERATING_POINTS}");
                        continue;
                    }
                    let mut temperatures = cells.get(1).copied().unwrap_or("").split('/');
                    let odb = temperatures
                        .next()
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or(f64::NAN);
                    let ewb = temperatures
                        .next()
                        .and_then(|t| t.trim().parse().ok())
                        .unwrap_or(f64::NAN);

                    table.gross_capacity.push(vec![cell_value(&cells, 2), odb, ewb]);
                    table.condenser_power.push(vec![cell_value(&cells, 3), odb, ewb]);
                    for (k, edb) in ST_ENTERING_DRY_BULBS.iter().enumerate() {
                        let st = cell_value(&cells, 4 + k);
                        if st.is_finite() && st < 1. {
                            table.st_ratio.push(vec![st, odb, ewb, *edb]);
                        }
                    }
                    table.operating_points += 1;
                }
                "Partload" => {
                    if part_load_eer.len() == MAX_PART_LOAD_ROWS {
                        warn!("Ignoring part-load row beyond the first {MAX_PART_LOAD_ROWS}");
                        continue;
                    }
                    let load_percent = cell_value(&cells, 1);
                    let eer = [0, 1, 2, 3].map(|k| cell_value(&cells, 2 + k));
                    part_load_eer.push((load_percent, eer));
                    table.part_load_rows += 1;
                }
                "AirFlow" => table.nameplate.air_flow = nameplate_value(&cells),
                "GrossCoolingCapacity" => {
                    table.nameplate.gross_cooling_capacity = nameplate_value(&cells)
                }
                "NetCoolingCapacity" => table.nameplate.net_cooling_capacity = nameplate_value(&cells),
                "ARI_RatedAirFlow" => table.nameplate.rated_air_flow = nameplate_value(&cells),
                "EvaporatorFanPower" => table.nameplate.evaporator_fan_power = nameplate_value(&cells),
                "CondenserPower" | "CondensorPower" => {
                    table.nameplate.condenser_power = nameplate_value(&cells)
                }
                "AuxilaryPower" | "AuxiliaryPower" => {
                    table.nameplate.auxiliary_power = nameplate_value(&cells)
                }
                "TotalSystemPower" => table.nameplate.total_system_power = nameplate_value(&cells),
                "EER" => table.nameplate.eer = nameplate_value(&cells),
                "IEER" => table.nameplate.ieer = nameplate_value(&cells),
                "ST_Ratio" => table.nameplate.st_ratio = nameplate_value(&cells),
                _ => {}
            }
        }

        if let Some((_, reference)) = part_load_eer.first().copied() {
            for (load_percent, eer) in &part_load_eer {
                for (k, odb) in PART_LOAD_OUTDOOR_DRY_BULBS.iter().enumerate() {
                    let normalised = if reference[k].is_finite() && reference[k] != 0. {
                        eer[k] / reference[k]
                    } else {
                        f64::NAN
                    };
                    if normalised.is_finite() {
                        table
                            .normalised_part_load_eer
                            .push(vec![normalised, *load_percent, *odb]);
                    }
                }
            }
        }

        Ok(table)
    }

    /// Fit the four models the table supports. A model that cannot be fitted is logged and left
    /// out, so the built-in curves apply in its place.
    pub fn fit_models(&self) -> ManufacturerModels {
        let fit = |rows: &[Vec<f64>], expression: &str, name: &str| -> Option<FittedModel> {
            if rows.len() <= 2 {
                return None;
            }
            FittedModel::fit(rows, expression)
                .inspect_err(|error: &RegressionError| {
                    warn!("{name} model could not be fitted, using built-in curves: {error}")
                })
                .ok()
        };

        let mut models = ManufacturerModels::default();
        if self.operating_points > 1 {
            models.gross_capacity = fit(&self.gross_capacity, GROSS_CAPACITY_TERMS, "Gross capacity");
            models.condenser_power =
                fit(&self.condenser_power, CONDENSER_POWER_TERMS, "Condenser power");
            models.st_ratio = fit(&self.st_ratio, ST_RATIO_TERMS, "S/T ratio");
        }
        if self.part_load_rows > 1 {
            models.part_load_eer = fit(
                &self.normalised_part_load_eer,
                PART_LOAD_EER_TERMS,
                "Normalized EER",
            );
        }

        models
    }
}

/// Optional manufacturer-data models for one unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ManufacturerModels {
    pub gross_capacity: Option<FittedModel>,
    pub condenser_power: Option<FittedModel>,
    pub st_ratio: Option<FittedModel>,
    pub part_load_eer: Option<FittedModel>,
}

impl ManufacturerModels {
    /// Gross capacity relative to the 95 °F / 67 °F rating point
    pub fn gross_capacity_correction(&self, odb: f64, ewb: f64) -> Option<f64> {
        self.gross_capacity
            .as_ref()
            .map(|model| model.predict(&[odb, ewb]) / model.predict(&[95., 67.]))
    }

    /// Condenser power relative to the 95 °F / 67 °F rating point
    pub fn condenser_power_correction(&self, odb: f64, ewb: f64) -> Option<f64> {
        self.condenser_power
            .as_ref()
            .map(|model| model.predict(&[odb, ewb]) / model.predict(&[95., 67.]))
    }

    pub fn st_ratio(&self, odb: f64, ewb: f64, edb: f64) -> Option<f64> {
        self.st_ratio
            .as_ref()
            .map(|model| model.predict(&[odb, ewb, edb]).clamp(0., 1.))
    }

    /// Normalised EER at a load percentage (capped at 100), floored at zero
    pub fn part_load_factor(&self, load_percent: f64, odb: f64) -> Option<f64> {
        self.part_load_eer
            .as_ref()
            .map(|model| model.predict(&[load_percent.min(100.), odb]).max(0.))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn gross_capacity(odb: f64, ewb: f64) -> f64 {
        60. - 0.2 * (odb - 95.) + 0.9 * (ewb - 67.)
    }

    fn condenser_kw(odb: f64, ewb: f64) -> f64 {
        4. + 0.04 * (odb - 95.) + 0.01 * (ewb - 67.)
    }

    #[fixture]
    fn spreadsheet() -> String {
        let mut lines = vec![
            "Rated performance".to_string(),
            "Format V1.2".to_string(),
            "AirFlow\tcfm\t2000".to_string(),
            "AuxilaryPower\tkW\t0.15".to_string(),
            "EER\t-\t11.2".to_string(),
        ];
        for odb in [75., 85., 95., 105., 115.] {
            for ewb in [57., 62., 67., 72.] {
                lines.push(format!(
                    "Cap/Cond/ST\t{odb}/{ewb}\t{:.4}\t{:.4}\t{:.3}\t{:.3}\t{:.3}",
                    gross_capacity(odb, ewb),
                    condenser_kw(odb, ewb),
                    0.6 + 0.002 * (odb - 95.) - 0.01 * (ewb - 67.),
                    0.75 + 0.002 * (odb - 95.) - 0.01 * (ewb - 67.),
                    if ewb < 60. { 1.0 } else { 0.9 },
                ));
            }
        }
        for (load, eer) in [
            (100., [11.2, 13.1, 15.0, 15.4]),
            (75., [12.0, 14.0, 16.2, 16.5]),
            (50., [12.4, 14.6, 16.9, 17.1]),
            (25., [11.0, 13.0, 15.1, 15.3]),
        ] {
            lines.push(format!(
                "Partload\t{load}\t{}\t{}\t{}\t{}",
                eer[0], eer[1], eer[2], eer[3]
            ));
        }
        lines.push("".to_string());
        lines.join("\r\n")
    }

    #[rstest]
    fn test_parse_collects_rows_and_nameplate(spreadsheet: String) {
        let table = RatedPerformanceTable::parse(&spreadsheet).unwrap();

        assert_eq!(table.gross_capacity.len(), 18);
        assert_eq!(table.condenser_power.len(), 18);
        assert_eq!(table.nameplate.air_flow, Some(2000.));
        assert_eq!(table.nameplate.auxiliary_power, Some(0.15));
        assert_eq!(table.nameplate.eer, Some(11.2));
        // S/T values of 1.0 are not usable
        assert!(table.st_ratio.iter().all(|row| row[0] < 1.));
        assert_eq!(table.normalised_part_load_eer.len(), 16);
        assert_relative_eq!(table.normalised_part_load_eer[0][0], 1.);
        assert_relative_eq!(table.normalised_part_load_eer[4][0], 12.0 / 11.2);
    }

    #[rstest]
    fn test_rejects_wrong_version(spreadsheet: String) {
        let old = spreadsheet.replace("V1.2", "V1.1");
        assert_eq!(
            RatedPerformanceTable::parse(&old),
            Err(ManufacturerDataError::WrongVersion)
        );
    }

    #[rstest]
    #[case("")]
    #[case("only one line")]
    fn test_rejects_too_few_lines(#[case] text: &str) {
        assert!(matches!(
            RatedPerformanceTable::parse(text),
            Err(ManufacturerDataError::WrongForm { .. })
        ));
    }

    #[rstest]
    fn test_rejects_too_many_lines() {
        let text = vec!["x\tV1.2"; 45].join("\n");
        assert_eq!(
            RatedPerformanceTable::parse(&text),
            Err(ManufacturerDataError::WrongForm { lines: 45 })
        );
    }

    #[rstest]
    fn test_fitted_models_are_normalised_to_rating_point(spreadsheet: String) {
        let models = RatedPerformanceTable::parse(&spreadsheet)
            .unwrap()
            .fit_models();

        assert!(models.gross_capacity.is_some());
        assert!(models.condenser_power.is_some());
        assert!(models.st_ratio.is_some());
        assert!(models.part_load_eer.is_some());

        assert_relative_eq!(
            models.gross_capacity_correction(95., 67.).unwrap(),
            1.,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            models.gross_capacity_correction(105., 67.).unwrap(),
            gross_capacity(105., 67.) / gross_capacity(95., 67.),
            epsilon = 5e-3
        );
        assert!(models.condenser_power_correction(105., 67.).unwrap() > 1.);

        let st = models.st_ratio(95., 67., 80.).unwrap();
        assert!((0. ..=1.).contains(&st));
        assert!(models.part_load_factor(150., 95.).unwrap() >= 0.);
    }

    #[rstest]
    fn test_single_operating_point_fits_nothing() {
        let text = "head\nV1.2\nCap/Cond/ST\t95/67\t60\t4\t0.7\t0.75\t0.8\nPartload\t100\t11\t12\t13\t14\n";
        let models = RatedPerformanceTable::parse(text).unwrap().fit_models();
        assert_eq!(models, ManufacturerModels::default());
    }
}
