//! Rated performance and control settings of one packaged unit, resolved from its inputs and
//! fixed for the whole simulation.
pub use crate::input::{CurveSet, FanControl, SpecificRtu};

use crate::core::manufacturer_data::{ManufacturerModels, RatedPerformanceTable};
use crate::core::performance::curves::CurveFamily;
use crate::core::psychrometrics::{
    a0_from_bypass_factor, bypass_factor_from_capacity, hr_from_wb, PsychrometricError,
};
use crate::core::units::{
    round_half_even, BTUH_PER_KBTUH, KBTUH_PER_KW, KBTUH_PER_TON, STANDARD_PRESSURE_INHG,
};
use crate::input::{ProjectInput, UnitInput, Ventilation};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

// default blower power is a straight line in rated capacity
const BLOWER_KW_PER_KBTUH: f64 = 0.0132;
const BLOWER_KW_AT_ZERO_CAPACITY: f64 = -0.2283;

const CFM_PER_TON: f64 = 400.;
const DEFAULT_CONDENSER_FAN_PERCENT: f64 = 9.;
const MIN_CAPACITY_FRACTION: f64 = 0.15;

// AHRI rating point for the entering air
const RATED_EDB: f64 = 80.;
const RATED_EWB: f64 = 67.;
const FULL_LOAD_CAPACITY_FRACTION: f64 = 1.;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    Candidate,
    Standard,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                UnitRole::Candidate => "candidate",
                UnitRole::Standard => "standard",
            }
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Unsupported number of stages: {0} (expected 1, 2, 3, 5 or 10)")]
    UnsupportedStageCount(usize),
    #[error("S/T ratio at test must lie between 0 and 1 (exclusive), got {0}")]
    StRatioAtTest(f64),
    #[error("Invalid {name} (expected a positive number): {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("Invalid ventilation rate: {0}")]
    Ventilation(f64),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("{unit} unit: {source}")]
    Input { unit: UnitRole, source: InputError },
    #[error(
        "{unit} unit, stage at capacity fraction {capacity_fraction}: rated bypass factor could not be found: {source}"
    )]
    RatedBypassFactor {
        unit: UnitRole,
        capacity_fraction: f64,
        source: PsychrometricError,
    },
}

/// Capacity fractions of each stage, lowest first
pub fn stage_fractions(stage_count: usize) -> Result<Vec<f64>, InputError> {
    Ok(match stage_count {
        1 => vec![1.],
        2 => vec![0.5, 1.],
        3 => vec![0.4, 0.6, 1.],
        5 => vec![0.2, 0.4, 0.6, 0.8, 1.],
        10 => (1..=10).map(|stage| stage as f64 / 10.).collect(),
        _ => return Err(InputError::UnsupportedStageCount(stage_count)),
    })
}

/// Blower power (kW) assumed for a unit of the given rated capacity, before rounding
pub fn default_blower_kw(net_capacity_kbtuh: f64) -> f64 {
    BLOWER_KW_PER_KBTUH * net_capacity_kbtuh + BLOWER_KW_AT_ZERO_CAPACITY
}

fn positive(name: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_finite() && value > 0. {
        Ok(value)
    } else {
        Err(InputError::NotPositive { name, value })
    }
}

/// Rating and airflow settings common to both units of a project
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SharedRating {
    pub net_capacity_kbtuh: f64,
    pub airflow_cfm: f64,
    pub ventilation_cfm: f64,
    pub fan_affinity_exponent: f64,
    pub curve_set: CurveSet,
}

impl SharedRating {
    pub fn from_project(project: &ProjectInput) -> Result<Self, InputError> {
        let net_capacity_kbtuh = positive("total capacity", project.total_capacity_kbtuh)?;
        let airflow_cfm = positive(
            "airflow",
            project
                .airflow_cfm
                .unwrap_or(net_capacity_kbtuh / KBTUH_PER_TON * CFM_PER_TON),
        )?;
        let ventilation_cfm = match project.ventilation {
            Ventilation::Cfm(cfm) => cfm,
            Ventilation::PercentOfFan(percent) => airflow_cfm * percent / 100.,
        };
        if !(ventilation_cfm.is_finite() && ventilation_cfm >= 0.) {
            return Err(InputError::Ventilation(ventilation_cfm));
        }

        Ok(Self {
            net_capacity_kbtuh,
            airflow_cfm,
            ventilation_cfm,
            fan_affinity_exponent: positive(
                "fan affinity exponent",
                project.fan_affinity_exponent,
            )?,
            curve_set: project.curve_set,
        })
    }
}

/// A packaged unit as simulated: rated figures, controls, curves and any fitted models.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EquipmentProfile {
    pub role: UnitRole,
    pub net_capacity_kbtuh: f64,
    pub airflow_cfm: f64,
    pub ventilation_cfm: f64,
    pub blower_kw: f64,
    pub auxiliary_kw: f64,
    pub condenser_kw: f64,
    pub eer: f64,
    pub st_ratio_at_test: f64,
    pub fan_control: FanControl,
    pub specific_rtu: SpecificRtu,
    pub curves: CurveFamily,
    /// Strictly increasing, ending at 1.0
    pub stages: Vec<f64>,
    pub min_capacity_fraction: f64,
    pub degradation_factor_percent: f64,
    pub condenser_fan_percent: f64,
    pub fan_affinity_exponent: f64,
    pub economizer: bool,
    pub models: ManufacturerModels,
    /// Bypass exponent, `BPF = exp(-a0 / m)` for a dry-air mass flow `m` in lb/h
    pub a0: f64,
}

impl EquipmentProfile {
    /// Resolve a unit's inputs and defaults into its profile.
    ///
    /// Condenser power is inferred from the EER when not given, and the rated bypass factor is
    /// found from the S/T ratio at AHRI conditions. The standard unit is always modelled with
    /// generic curves.
    pub fn build(
        role: UnitRole,
        unit: &UnitInput,
        shared: &SharedRating,
    ) -> Result<Self, ProfileError> {
        let input_error = |source| ProfileError::Input { unit: role, source };

        let net_capacity_kbtuh = positive("total capacity", shared.net_capacity_kbtuh)
            .map_err(input_error)?;
        let airflow_cfm = positive("airflow", shared.airflow_cfm).map_err(input_error)?;
        let st_ratio_at_test = unit.st_ratio_at_test;
        if !(st_ratio_at_test > 0. && st_ratio_at_test < 1.) {
            return Err(input_error(InputError::StRatioAtTest(st_ratio_at_test)));
        }
        let stages = stage_fractions(unit.stages).map_err(input_error)?;

        let unrounded_default_blower_kw = default_blower_kw(net_capacity_kbtuh);
        let blower_kw = unit
            .blower_kw
            .unwrap_or_else(|| round_half_even(unrounded_default_blower_kw, 3));
        let mut auxiliary_kw = unit.auxiliary_kw.unwrap_or(0.);
        let mut condenser_kw = unit.condenser_kw.unwrap_or(0.);

        if condenser_kw == 0. {
            if let Some(eer) = unit.eer {
                let blower_kw_for_condenser = if unit.has_power_inputs() {
                    blower_kw
                } else {
                    unrounded_default_blower_kw
                };
                condenser_kw = round_half_even(
                    net_capacity_kbtuh / eer - (blower_kw_for_condenser + auxiliary_kw),
                    3,
                );
            }
        }

        let eer = unit.eer.unwrap_or_else(|| {
            net_capacity_kbtuh / (blower_kw + auxiliary_kw + condenser_kw).max(0.001)
        });

        let condenser_fan_percent = match unit.condenser_fan_percent {
            Some(percent) if percent > 0. => percent,
            _ => DEFAULT_CONDENSER_FAN_PERCENT,
        };

        let specific_rtu = match role {
            UnitRole::Candidate => unit.specific_rtu,
            UnitRole::Standard => {
                if unit.specific_rtu != SpecificRtu::None {
                    warn!(
                        "Specific RTU {:?} ignored for the standard unit",
                        unit.specific_rtu
                    );
                }
                SpecificRtu::None
            }
        };

        let models = match unit.rated_performance.as_deref() {
            Some(text) => match RatedPerformanceTable::parse(text) {
                Ok(table) => {
                    if let Some(auxiliary_power) = table.nameplate.auxiliary_power {
                        auxiliary_kw = auxiliary_power;
                    }
                    table.fit_models()
                }
                Err(error) => {
                    warn!("{role} unit: rated performance table ignored: {error}");
                    ManufacturerModels::default()
                }
            },
            None => ManufacturerModels::default(),
        };

        let rated_ehr = hr_from_wb(RATED_EDB, RATED_EWB, STANDARD_PRESSURE_INHG);
        let rated_gross_capacity_btuh =
            (net_capacity_kbtuh + blower_kw * KBTUH_PER_KW) * BTUH_PER_KBTUH;
        let rated_bypass_factor = bypass_factor_from_capacity(
            rated_gross_capacity_btuh,
            st_ratio_at_test,
            airflow_cfm,
            RATED_EDB,
            rated_ehr,
            STANDARD_PRESSURE_INHG,
        )
        .map_err(|source| ProfileError::RatedBypassFactor {
            unit: role,
            capacity_fraction: FULL_LOAD_CAPACITY_FRACTION,
            source,
        })?;

        Ok(Self {
            role,
            net_capacity_kbtuh,
            airflow_cfm,
            ventilation_cfm: shared.ventilation_cfm,
            blower_kw,
            auxiliary_kw,
            condenser_kw,
            eer,
            st_ratio_at_test,
            fan_control: unit.fan_control,
            specific_rtu,
            curves: CurveFamily::resolve(specific_rtu, shared.curve_set),
            stages,
            min_capacity_fraction: MIN_CAPACITY_FRACTION,
            degradation_factor_percent: unit.degradation_factor_percent,
            condenser_fan_percent,
            fan_affinity_exponent: shared.fan_affinity_exponent,
            economizer: unit.economizer,
            models,
            a0: a0_from_bypass_factor(rated_bypass_factor, airflow_cfm),
        })
    }

    /// Ventilation airflow as a fraction of rated airflow
    pub fn ventilation_fraction(&self) -> f64 {
        self.ventilation_cfm / self.airflow_cfm
    }

    /// Whether capacity modulates continuously rather than in stages
    pub fn is_variable_capacity(&self) -> bool {
        self.fan_control.is_variable_speed() || self.curves == CurveFamily::VariableSpeed
    }

    pub fn lowest_stage(&self) -> f64 {
        self.stages.first().copied().unwrap_or(1.)
    }

    /// The same unit as controlled outside occupied hours
    pub fn for_unoccupied_hours(&self) -> Self {
        Self {
            fan_control: self.fan_control.unoccupied(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
impl SharedRating {
    /// Five-ton rating at 400 CFM per ton with 10% outdoor air
    pub(crate) fn example() -> Self {
        Self {
            net_capacity_kbtuh: 60.,
            airflow_cfm: 2000.,
            ventilation_cfm: 200.,
            fan_affinity_exponent: 2.5,
            curve_set: CurveSet::Doe2,
        }
    }
}

#[cfg(test)]
impl UnitInput {
    pub(crate) fn example() -> Self {
        Self {
            eer: Some(11.),
            fan_control: FanControl::SingleSpeedAlwaysOn,
            stages: 1,
            economizer: false,
            specific_rtu: SpecificRtu::None,
            st_ratio_at_test: 0.72,
            blower_kw: None,
            auxiliary_kw: None,
            condenser_kw: None,
            condenser_fan_percent: None,
            degradation_factor_percent: 25.,
            rated_performance: None,
        }
    }
}

#[cfg(test)]
impl EquipmentProfile {
    /// Single-stage, always-on, five-ton candidate unit with an EER of 11
    pub(crate) fn example() -> Self {
        Self::build(
            UnitRole::Candidate,
            &UnitInput::example(),
            &SharedRating::example(),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::psychrometrics::bypass_factor_from_a0;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(1, vec![1.])]
    #[case(2, vec![0.5, 1.])]
    #[case(3, vec![0.4, 0.6, 1.])]
    #[case(5, vec![0.2, 0.4, 0.6, 0.8, 1.])]
    fn test_stage_fractions(#[case] count: usize, #[case] expected: Vec<f64>) {
        assert_eq!(stage_fractions(count).unwrap(), expected);
    }

    #[rstest]
    fn test_ten_stages_end_at_full_capacity() {
        let stages = stage_fractions(10).unwrap();
        assert_eq!(stages.len(), 10);
        assert_relative_eq!(stages[0], 0.1);
        assert_eq!(stages[9], 1.);
        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(6)]
    fn test_unsupported_stage_counts(#[case] count: usize) {
        assert_eq!(
            stage_fractions(count),
            Err(InputError::UnsupportedStageCount(count))
        );
    }

    #[rstest]
    fn test_defaults_from_capacity_and_eer() {
        let profile = EquipmentProfile::example();

        assert_eq!(profile.blower_kw, 0.564);
        assert_eq!(profile.auxiliary_kw, 0.);
        // the unrounded default blower power is used to infer condenser power
        assert_eq!(profile.condenser_kw, 4.891);
        assert_eq!(profile.eer, 11.);
        assert_eq!(profile.condenser_fan_percent, 9.);
        assert_eq!(profile.min_capacity_fraction, 0.15);
        assert_eq!(
            profile.curves,
            CurveFamily::Doe2 {
                flow_dependent: false
            }
        );
        assert_relative_eq!(profile.ventilation_fraction(), 0.1);
        assert!(!profile.is_variable_capacity());
    }

    #[rstest]
    fn test_explicit_power_inputs() {
        let unit = UnitInput {
            blower_kw: Some(0.8),
            auxiliary_kw: Some(0.1),
            ..UnitInput::example()
        };
        let profile =
            EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example()).unwrap();

        assert_eq!(profile.blower_kw, 0.8);
        assert_eq!(profile.auxiliary_kw, 0.1);
        assert_eq!(profile.condenser_kw, round_half_even(60. / 11. - 0.9, 3));
    }

    #[rstest]
    fn test_eer_inferred_from_power() {
        let unit = UnitInput {
            eer: None,
            condenser_kw: Some(4.),
            ..UnitInput::example()
        };
        let profile =
            EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example()).unwrap();

        assert_relative_eq!(profile.eer, 60. / (0.564 + 4.));
    }

    #[rstest]
    fn test_rated_bypass_factor_failure_names_unit_and_stage() {
        let starved = SharedRating {
            airflow_cfm: 200.,
            ..SharedRating::example()
        };
        let error =
            EquipmentProfile::build(UnitRole::Standard, &UnitInput::example(), &starved).unwrap_err();

        assert!(matches!(
            error,
            ProfileError::RatedBypassFactor {
                unit: UnitRole::Standard,
                capacity_fraction,
                ..
            } if capacity_fraction == 1.
        ));
        assert!(error
            .to_string()
            .starts_with("standard unit, stage at capacity fraction 1: rated bypass factor"));
    }

    #[rstest]
    fn test_rated_bypass_factor_is_recovered_from_a0() {
        let profile = EquipmentProfile::example();
        let rated_ehr = hr_from_wb(80., 67., STANDARD_PRESSURE_INHG);
        let rated_bypass_factor = bypass_factor_from_capacity(
            (60. + profile.blower_kw * KBTUH_PER_KW) * 1000.,
            0.72,
            2000.,
            80.,
            rated_ehr,
            STANDARD_PRESSURE_INHG,
        )
        .unwrap();

        assert!(profile.a0 > 0.);
        assert_relative_eq!(
            bypass_factor_from_a0(profile.a0, 80., 67., STANDARD_PRESSURE_INHG, 2000.),
            rated_bypass_factor,
            max_relative = 1e-9
        );
    }

    #[rstest]
    #[case(0.)]
    #[case(1.)]
    #[case(1.2)]
    #[case(f64::NAN)]
    fn test_st_ratio_at_test_out_of_range(#[case] st_ratio_at_test: f64) {
        let unit = UnitInput {
            st_ratio_at_test,
            ..UnitInput::example()
        };
        let result = EquipmentProfile::build(UnitRole::Standard, &unit, &SharedRating::example());
        assert!(matches!(
            result,
            Err(ProfileError::Input {
                unit: UnitRole::Standard,
                source: InputError::StRatioAtTest(_)
            })
        ));
    }

    #[rstest]
    fn test_unsupported_stage_count_names_the_unit() {
        let unit = UnitInput {
            stages: 4,
            ..UnitInput::example()
        };
        let error = EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example())
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "candidate unit: Unsupported number of stages: 4 (expected 1, 2, 3, 5 or 10)"
        );
    }

    #[rstest]
    fn test_standard_unit_uses_generic_curves() {
        let unit = UnitInput {
            specific_rtu: SpecificRtu::ThreeStages,
            stages: 3,
            ..UnitInput::example()
        };
        let candidate =
            EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example()).unwrap();
        let standard =
            EquipmentProfile::build(UnitRole::Standard, &unit, &SharedRating::example()).unwrap();

        assert_eq!(candidate.curves, CurveFamily::ThreeStage);
        assert_eq!(standard.specific_rtu, SpecificRtu::None);
        assert_eq!(
            standard.curves,
            CurveFamily::Doe2 {
                flow_dependent: false
            }
        );
    }

    #[rstest]
    fn test_unreadable_rated_performance_is_ignored() {
        let unit = UnitInput {
            rated_performance: Some("not a rated performance table".into()),
            ..UnitInput::example()
        };
        let profile =
            EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example()).unwrap();
        assert_eq!(profile.models, ManufacturerModels::default());
    }

    #[rstest]
    fn test_variable_speed_compressor_is_variable_capacity() {
        let unit = UnitInput {
            specific_rtu: SpecificRtu::VariableSpeedCompressor,
            ..UnitInput::example()
        };
        let profile =
            EquipmentProfile::build(UnitRole::Candidate, &unit, &SharedRating::example()).unwrap();
        assert_eq!(profile.curves, CurveFamily::VariableSpeed);
        assert!(profile.is_variable_capacity());
    }

    #[rstest]
    fn test_unoccupied_profile_cycles_fan() {
        let profile = EquipmentProfile {
            fan_control: FanControl::MultiSpeedAlwaysOn,
            ..EquipmentProfile::example()
        };
        assert_eq!(
            profile.for_unoccupied_hours().fan_control,
            FanControl::MultiSpeedCycles
        );
    }
}
