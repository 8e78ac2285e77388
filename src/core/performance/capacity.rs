use crate::core::equipment::EquipmentProfile;
use crate::core::performance::staging::StageState;
use crate::core::psychrometrics::{hr_from_wb, st_ratio_from_a0, SupplyConditions};
use crate::core::units::{BTUH_PER_KBTUH, KBTUH_PER_KW};

/// Blower heat (kBtuh) at a flow fraction, following the fan affinity law
pub(crate) fn stage_fan_heat_kbtuh(profile: &EquipmentProfile, flow_fraction: f64) -> f64 {
    profile.blower_kw * KBTUH_PER_KW * flow_fraction.powf(profile.fan_affinity_exponent)
}

/// Net total capacity (kBtuh) of a stage at the operating point.
///
/// Rated fan heat is added back to reach gross capacity, which is corrected for temperature and
/// scaled for part load before the stage's own fan heat is removed again. The applied total
/// capacity correction is recorded on the stage.
pub fn net_total_capacity(
    profile: &EquipmentProfile,
    stage: &mut StageState,
    odb: f64,
    ewb: f64,
) -> f64 {
    let rated_fan_heat = profile.blower_kw * KBTUH_PER_KW;
    let gross_rated = profile.net_capacity_kbtuh + rated_fan_heat;

    let correction = profile
        .models
        .gross_capacity_correction(odb, ewb)
        .unwrap_or_else(|| {
            profile
                .curves
                .total_capacity_correction(profile.net_capacity_kbtuh, stage, odb, ewb)
        });
    stage.total_capacity_correction = correction;

    let part_load_factor = profile
        .curves
        .part_load_capacity_factor(stage.capacity_fraction);

    gross_rated * correction * part_load_factor
        - rated_fan_heat * stage.flow_fraction.powf(profile.fan_affinity_exponent)
}

/// Net sensible capacity (kBtuh) of a stage at the operating point.
///
/// The sensible split comes from a fitted S/T model when the unit has one, otherwise from the
/// rated bypass factor carried to the stage airflow. S/T ratio and supply dry bulb are recorded
/// on the stage.
pub fn net_sensible_capacity(
    profile: &EquipmentProfile,
    stage: &mut StageState,
    odb: f64,
    ewb: f64,
    edb: f64,
    bp: f64,
) -> f64 {
    let stage_fan_heat = stage_fan_heat_kbtuh(profile, stage.flow_fraction);
    let gross_total = net_total_capacity(profile, stage, odb, ewb) + stage_fan_heat;

    let ehr = hr_from_wb(edb, ewb, bp);
    let stage_cfm = profile.airflow_cfm * stage.flow_fraction;

    let st_ratio = profile.models.st_ratio(odb, ewb, edb).unwrap_or_else(|| {
        st_ratio_from_a0(
            profile.a0,
            gross_total * BTUH_PER_KBTUH,
            stage_cfm,
            ehr,
            edb,
            bp,
        )
        .st_ratio
    });
    stage.st_ratio = st_ratio;

    // only the supply dry bulb is needed here, so the state is not checked against saturation
    stage.supply_dry_bulb = SupplyConditions::solve(
        gross_total * BTUH_PER_KBTUH,
        st_ratio,
        stage_cfm,
        edb,
        ehr,
        bp,
    )
    .sdb;

    gross_total * st_ratio - stage_fan_heat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::performance::curves::CurveFamily;
    use crate::core::units::STANDARD_PRESSURE_INHG;
    use approx::assert_relative_eq;
    use rstest::*;

    fn full_load() -> StageState {
        StageState {
            capacity_fraction: 1.,
            flow_fraction: 1.,
            load_fraction: Some(1.),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_net_total_capacity_at_rating_point() {
        let profile = EquipmentProfile::example();
        let mut stage = full_load();
        let capacity = net_total_capacity(&profile, &mut stage, 95., 67.);

        // the DOE-2 curves are within a fraction of a percent of 1 at 95/67
        assert_relative_eq!(capacity, profile.net_capacity_kbtuh, max_relative = 1e-3);
        assert!(stage.total_capacity_correction > 0.99);
    }

    #[rstest]
    fn test_half_stage_keeps_half_of_gross_capacity() {
        let profile = EquipmentProfile::example();
        let mut full = full_load();
        let mut half = StageState {
            capacity_fraction: 0.5,
            flow_fraction: 0.5,
            ..Default::default()
        };
        let full_capacity = net_total_capacity(&profile, &mut full, 95., 67.);
        let half_capacity = net_total_capacity(&profile, &mut half, 95., 67.);

        let fan_heat = profile.blower_kw * KBTUH_PER_KW;
        let expected = (full_capacity + fan_heat) * 0.5 - fan_heat * 0.5f64.powf(2.5);
        assert_relative_eq!(half_capacity, expected, max_relative = 1e-12);
    }

    #[rstest]
    fn test_sensible_capacity_is_a_share_of_total() {
        let profile = EquipmentProfile::example();
        let mut stage = full_load();
        let sensible =
            net_sensible_capacity(&profile, &mut stage, 95., 67., 80., STANDARD_PRESSURE_INHG);
        let total = net_total_capacity(&profile, &mut full_load(), 95., 67.);

        assert!(sensible > 0. && sensible < total);
        // rated S/T is recovered at rating conditions
        assert_relative_eq!(stage.st_ratio, profile.st_ratio_at_test, epsilon = 0.02);
        assert!(stage.supply_dry_bulb < 80. && stage.supply_dry_bulb > 40.);
    }

    #[rstest]
    fn test_variable_speed_uses_its_part_load_factor() {
        let profile = EquipmentProfile {
            curves: CurveFamily::VariableSpeed,
            ..EquipmentProfile::example()
        };
        let mut stage = StageState {
            capacity_fraction: 0.5,
            flow_fraction: 0.,
            ..Default::default()
        };
        let capacity = net_total_capacity(&profile, &mut stage, 95., 67.);
        let gross_rated = profile.net_capacity_kbtuh + profile.blower_kw * KBTUH_PER_KW;
        let expected = gross_rated
            * stage.total_capacity_correction
            * crate::core::performance::curves::variable_speed_capacity_factor(0.5);
        assert_relative_eq!(capacity, expected, max_relative = 1e-12);
    }
}
