use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_enum_str::Deserialize_enum_str;
use serde_valid::Validate;
use std::fmt::{Display, Formatter};
use std::io::{BufReader, Read};

pub fn ingest_for_processing(json: impl Read) -> Result<Input, anyhow::Error> {
    let reader = BufReader::new(json);

    let input: Input = serde_json::from_reader(reader)?;
    input
        .validate()
        .map_err(|errors| anyhow!("Input failed validation: {errors}"))?;

    Ok(input)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Input {
    #[validate]
    pub project: ProjectInput,
    #[validate]
    pub design: DesignInput,
    /// Bin table; may instead be supplied as a separate CSV file
    #[serde(default)]
    #[validate]
    pub bins: Vec<TemperatureBin>,
    #[validate]
    pub candidate: UnitInput,
    #[validate]
    pub standard: UnitInput,
}

/// Settings shared by both units and the building they serve.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProjectInput {
    /// Rated net total cooling capacity of each unit, kBtuh
    #[validate(exclusive_minimum = 0.)]
    pub total_capacity_kbtuh: f64,
    /// Rated indoor airflow; 400 CFM per ton when not given
    #[validate(exclusive_minimum = 0.)]
    pub airflow_cfm: Option<f64>,
    /// Occupied cooling setpoint, °F
    pub indoor_setpoint: f64,
    /// Rise of the setpoint during unoccupied hours, °F. No unoccupied pass is run when zero.
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub setback: f64,
    #[serde(default)]
    pub ventilation: Ventilation,
    #[serde(default)]
    #[validate]
    pub inside_humidity: InsideHumidityInput,
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub oversizing_percent: f64,
    /// Share of the design sensible load from solar and internal gains
    #[serde(default = "default_internal_load_fraction")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub internal_load_fraction: f64,
    /// Number of identical units installed
    #[serde(default = "default_units")]
    #[validate(minimum = 1)]
    pub units: u32,
    #[serde(default = "default_fan_affinity_exponent")]
    #[validate(exclusive_minimum = 0.)]
    pub fan_affinity_exponent: f64,
    #[serde(default)]
    pub curve_set: CurveSet,
    pub load_line_lock: Option<LockedLoadLine>,
}

fn default_internal_load_fraction() -> f64 {
    0.5
}

fn default_units() -> u32 {
    1
}

fn default_fan_affinity_exponent() -> f64 {
    2.5
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Ventilation {
    /// Outdoor air as a percentage of the rated fan airflow
    PercentOfFan(f64),
    Cfm(f64),
}

impl Default for Ventilation {
    fn default() -> Self {
        Self::PercentOfFan(10.)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct InsideHumidityInput {
    #[serde(default = "default_track_outdoor")]
    pub track_outdoor: bool,
    #[serde(default = "default_relative_humidity_percent")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 100.)]
    pub relative_humidity_percent: f64,
}

fn default_track_outdoor() -> bool {
    true
}

fn default_relative_humidity_percent() -> f64 {
    60.
}

impl Default for InsideHumidityInput {
    fn default() -> Self {
        Self {
            track_outdoor: default_track_outdoor(),
            relative_humidity_percent: default_relative_humidity_percent(),
        }
    }
}

/// A load line fixed by the caller instead of derived from design conditions
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockedLoadLine {
    pub slope: f64,
    pub intercept: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DesignInput {
    /// Design outdoor dry bulb, °F
    pub dry_bulb: f64,
    #[serde(default)]
    pub elevation_ft: f64,
}

/// Outdoor temperature bin with its hours of occurrence.
///
/// The same field names are used as the header row of a bin CSV file.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TemperatureBin {
    /// Outdoor dry bulb, °F
    pub odb: f64,
    /// Mean coincident wet bulb, °F
    pub owb: f64,
    #[validate(minimum = 0.)]
    pub occupied_hours: f64,
    #[serde(default)]
    #[validate(minimum = 0.)]
    pub unoccupied_hours: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UnitInput {
    /// Rated EER; condenser power is inferred from it when not given
    #[validate(exclusive_minimum = 0.)]
    pub eer: Option<f64>,
    #[serde(default)]
    pub fan_control: FanControl,
    #[serde(default = "default_stages")]
    pub stages: usize,
    #[serde(default)]
    pub economizer: bool,
    #[serde(default)]
    pub specific_rtu: SpecificRtu,
    #[serde(default = "default_st_ratio_at_test")]
    pub st_ratio_at_test: f64,
    #[validate(minimum = 0.)]
    pub blower_kw: Option<f64>,
    #[validate(minimum = 0.)]
    pub auxiliary_kw: Option<f64>,
    #[validate(minimum = 0.)]
    pub condenser_kw: Option<f64>,
    #[validate(minimum = 0.)]
    #[validate(maximum = 100.)]
    pub condenser_fan_percent: Option<f64>,
    #[serde(default = "default_degradation_factor_percent")]
    #[validate(minimum = 0.)]
    #[validate(maximum = 100.)]
    pub degradation_factor_percent: f64,
    /// Tab-separated manufacturer rated performance table
    pub rated_performance: Option<String>,
}

fn default_stages() -> usize {
    1
}

fn default_st_ratio_at_test() -> f64 {
    0.72
}

fn default_degradation_factor_percent() -> f64 {
    25.
}

impl UnitInput {
    /// Whether any of the electrical power figures were given explicitly
    pub fn has_power_inputs(&self) -> bool {
        self.blower_kw.is_some() || self.auxiliary_kw.is_some() || self.condenser_kw.is_some()
    }
}

#[derive(Clone, Copy, Debug, Deserialize_enum_str, Eq, PartialEq, Serialize)]
pub enum FanControl {
    #[serde(rename = "1-Spd: Always ON")]
    SingleSpeedAlwaysOn,
    #[serde(rename = "1-Spd: Cycles With Compressor")]
    SingleSpeedCycles,
    #[serde(rename = "N-Spd: Always ON")]
    MultiSpeedAlwaysOn,
    #[serde(rename = "N-Spd: Cycles With Compressor")]
    MultiSpeedCycles,
    #[serde(rename = "V-Spd: Always ON")]
    VariableSpeed,
}

impl Default for FanControl {
    fn default() -> Self {
        Self::SingleSpeedAlwaysOn
    }
}

impl FanControl {
    pub fn is_single_speed(&self) -> bool {
        matches!(self, Self::SingleSpeedAlwaysOn | Self::SingleSpeedCycles)
    }

    pub fn is_variable_speed(&self) -> bool {
        matches!(self, Self::VariableSpeed)
    }

    pub fn is_always_on(&self) -> bool {
        matches!(
            self,
            Self::SingleSpeedAlwaysOn | Self::MultiSpeedAlwaysOn | Self::VariableSpeed
        )
    }

    pub fn cycles_with_compressor(&self) -> bool {
        !self.is_always_on()
    }

    /// Control used outside occupied hours: single and multi speed fans only run with the
    /// compressor.
    pub fn unoccupied(&self) -> Self {
        match self {
            Self::SingleSpeedAlwaysOn | Self::SingleSpeedCycles => Self::SingleSpeedCycles,
            Self::MultiSpeedAlwaysOn | Self::MultiSpeedCycles => Self::MultiSpeedCycles,
            Self::VariableSpeed => Self::VariableSpeed,
        }
    }
}

impl Display for FanControl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::SingleSpeedAlwaysOn => "1-Spd: Always ON",
                Self::SingleSpeedCycles => "1-Spd: Cycles With Compressor",
                Self::MultiSpeedAlwaysOn => "N-Spd: Always ON",
                Self::MultiSpeedCycles => "N-Spd: Cycles With Compressor",
                Self::VariableSpeed => "V-Spd: Always ON",
            }
        )
    }
}

/// Particular unit designs with their own performance data
#[derive(Clone, Copy, Debug, Deserialize_enum_str, Eq, PartialEq, Serialize)]
pub enum SpecificRtu {
    None,
    #[serde(rename = "Advanced Controls")]
    AdvancedControls,
    #[serde(rename = "Three Stages")]
    ThreeStages,
    #[serde(rename = "Variable-Speed Compressor")]
    VariableSpeedCompressor,
}

impl Default for SpecificRtu {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Clone, Copy, Debug, Deserialize_enum_str, Eq, PartialEq, Serialize)]
pub enum CurveSet {
    #[serde(rename = "DOE2")]
    Doe2,
    Carrier,
}

impl Default for CurveSet {
    fn default() -> Self {
        Self::Doe2
    }
}
