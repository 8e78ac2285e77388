use crate::core::equipment::{EquipmentProfile, SpecificRtu};
use crate::core::performance::staging::IntegratedState;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum CompressorMode {
    On,
    Off,
}

/// Lowest stage fraction above the ventilation fraction, or 1.0 if there is none
pub fn stage_fraction_above_ventilation(stages: &[f64], ventilation_fraction: f64) -> f64 {
    stages
        .iter()
        .copied()
        .find(|stage| *stage > ventilation_fraction)
        .unwrap_or(1.)
}

/// Fraction of rated airflow through the coil.
///
/// Arguments:
/// * `capacity_fraction` - capacity fraction the compressor is running at (ignored when off)
/// * `economizer_running` - whether outdoor air beyond ventilation is being used for cooling
/// * `integrated` - state of any integrated economizer attempt in this bin
pub fn flow_fraction(
    profile: &EquipmentProfile,
    capacity_fraction: f64,
    mode: CompressorMode,
    economizer_running: bool,
    integrated: IntegratedState,
    odb: f64,
) -> f64 {
    let fan_control = profile.fan_control;

    if profile.specific_rtu == SpecificRtu::AdvancedControls {
        return match mode {
            CompressorMode::On => {
                if is_close!(capacity_fraction, 0.5, rel_tol = 1e-9) {
                    if odb >= 70. {
                        0.75
                    } else {
                        0.90
                    }
                } else if is_close!(capacity_fraction, 1., rel_tol = 1e-9) {
                    0.90
                } else {
                    0.
                }
            }
            CompressorMode::Off => {
                if economizer_running {
                    if integrated == IntegratedState::Attempting {
                        0.90
                    } else {
                        0.75
                    }
                } else if fan_control.cycles_with_compressor() {
                    0.
                } else {
                    0.40
                }
            }
        };
    }

    let ventilation_fraction = profile.ventilation_fraction();

    match mode {
        CompressorMode::On => {
            if fan_control.is_single_speed() {
                1.
            } else if economizer_running {
                capacity_fraction
            } else if fan_control.is_variable_speed() {
                ventilation_fraction.max(capacity_fraction)
            } else {
                stage_fraction_above_ventilation(&profile.stages, ventilation_fraction)
                    .max(capacity_fraction)
            }
        }
        CompressorMode::Off => {
            if economizer_running {
                1.
            } else if fan_control.cycles_with_compressor() {
                0.
            } else if fan_control.is_variable_speed() {
                ventilation_fraction
            } else if fan_control.is_single_speed() {
                1.
            } else {
                stage_fraction_above_ventilation(&profile.stages, ventilation_fraction)
            }
        }
    }
}
