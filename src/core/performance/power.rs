use crate::core::equipment::EquipmentProfile;
use crate::core::performance::curves::{variable_speed_power_factor, CurveFamily};
use crate::core::performance::staging::{StageRole, StageState};

/// Efficiency factor applied to condenser power when the compressor cycles at `load_fraction`.
pub fn cycling_efficiency(degradation_factor_percent: f64, load_fraction: f64) -> f64 {
    if load_fraction < 1. {
        load_fraction * (degradation_factor_percent / 100.)
            + (100. - degradation_factor_percent) / 100.
    } else {
        1.
    }
}

/// Affinity-law power factor for a fan at `flow_fraction` of rated flow
pub fn fan_power_factor(fan_affinity_exponent: f64, flow_fraction: f64) -> f64 {
    if flow_fraction < 1. {
        flow_fraction.powf(fan_affinity_exponent)
    } else {
        1.
    }
}

/// Blower power (kW) at a flow fraction
pub fn fan_power_kw(profile: &EquipmentProfile, flow_fraction: f64) -> f64 {
    profile.blower_kw * fan_power_factor(profile.fan_affinity_exponent, flow_fraction)
}

/// Part-load condenser power (kW) of one stage at the operating point.
///
/// The full-load power at the operating point comes from a fitted condenser model when the unit
/// has one, and from the curve family otherwise. The corrections used are recorded on the stage.
pub fn condenser_power_kw(
    profile: &EquipmentProfile,
    stage: &mut StageState,
    role: StageRole,
    odb: f64,
    ewb: f64,
    edb: f64,
) -> f64 {
    let (efficiency_correction, power_correction) =
        match profile.models.condenser_power_correction(odb, ewb) {
            Some(power_correction) => (1., power_correction),
            None => {
                let efficiency = profile.curves.efficiency_correction(
                    profile.net_capacity_kbtuh,
                    stage,
                    odb,
                    ewb,
                    edb,
                );
                let capacity = profile.curves.total_capacity_correction(
                    profile.net_capacity_kbtuh,
                    stage,
                    odb,
                    ewb,
                );
                (efficiency, capacity * efficiency)
            }
        };
    stage.efficiency_correction = efficiency_correction;
    stage.condenser_power_correction = power_correction;

    let full_load = profile.condenser_kw * power_correction;
    let stage_full_load = match role {
        StageRole::BMinusA => stage.capacity_fraction_difference * full_load,
        StageRole::A | StageRole::B => stage.capacity_fraction * full_load,
    };

    let variable_speed_fan = profile.fan_control.is_variable_speed();

    if profile.models.part_load_eer.is_some() {
        if stage.runtime > 1. {
            return stage_full_load;
        }
        let load_fraction = if variable_speed_fan {
            stage.capacity_fraction
        } else {
            stage.load_fraction.unwrap_or(1.)
        };
        let part_load_factor = profile
            .models
            .part_load_factor(load_fraction * 100., odb)
            .unwrap_or(1.);
        return stage_full_load / part_load_factor.max(1e-9);
    }

    if variable_speed_fan && profile.curves == CurveFamily::VariableSpeed {
        return full_load * variable_speed_power_factor(stage.capacity_fraction);
    }

    if variable_speed_fan {
        // condenser fan power is taken at rating conditions, uncorrected
        let condenser_fan_full_load = profile.condenser_kw * profile.condenser_fan_percent / 100.;
        let condenser_fan = condenser_fan_full_load
            * fan_power_factor(profile.fan_affinity_exponent, stage.capacity_fraction);
        let compressor_full_load = full_load - condenser_fan_full_load;
        let compressor = if stage.runtime <= 1. {
            compressor_full_load * stage.capacity_fraction
        } else {
            compressor_full_load
        };
        return compressor + condenser_fan;
    }

    stage_full_load
        / cycling_efficiency(
            profile.degradation_factor_percent,
            stage.load_fraction.unwrap_or(1.),
        )
}
