use crate::core::equipment::EquipmentProfile;
use crate::core::performance::air::sensible_ventilation_load;
use crate::core::performance::capacity::net_sensible_capacity;
use crate::core::performance::flow_fraction::{flow_fraction, CompressorMode};
use crate::core::performance::staging::{IntegratedState, PairMode, StageState, StagingDecision};

/// Outdoor air state of a bin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutdoorConditions {
    pub odb: f64,
    pub owb: f64,
    pub ohr: f64,
    pub bp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntegratedOutcome {
    /// Economizer and the lowest compressor stage together meet the load
    Satisfied(StagingDecision),
    /// The caller falls back to compressor-only staging with ventilation airflow
    Failed,
}

/// Try to meet the non-ventilation load with the economizer and the lowest compressor stage
/// running together, solving linearly for the compressor runtime.
pub fn attempt_integrated_economizer(
    profile: &EquipmentProfile,
    outdoor: &OutdoorConditions,
    non_ventilation_load: f64,
    idb: f64,
) -> IntegratedOutcome {
    let OutdoorConditions { odb, owb, ohr, bp } = *outdoor;
    let integrated = IntegratedState::Attempting;
    let capacity_fraction = profile.lowest_stage();

    let economizer_flow_fraction = flow_fraction(
        profile,
        capacity_fraction,
        CompressorMode::Off,
        true,
        integrated,
        odb,
    );

    // positive when it is cooler outside than inside
    let economizer_capacity_max =
        -sensible_ventilation_load(profile.airflow_cfm, ohr, odb, idb, bp);
    let economizer_capacity = economizer_capacity_max * economizer_flow_fraction;

    let compressor_flow_fraction = flow_fraction(
        profile,
        capacity_fraction,
        CompressorMode::On,
        false,
        integrated,
        odb,
    );
    let mut a = StageState {
        capacity_fraction,
        flow_fraction: compressor_flow_fraction,
        ..Default::default()
    };

    // the coil sees outdoor air
    let coil_capacity = net_sensible_capacity(profile, &mut a, odb, owb, odb, bp);
    a.sensible_capacity_kbtuh = coil_capacity;
    let combined_capacity = coil_capacity + economizer_capacity_max * compressor_flow_fraction;

    if economizer_capacity > non_ventilation_load {
        return IntegratedOutcome::Failed;
    }

    let runtime =
        (non_ventilation_load - economizer_capacity) / (combined_capacity - economizer_capacity);
    if !(0. ..=1.).contains(&runtime) {
        return IntegratedOutcome::Failed;
    }

    // no credit for part load: the cycling penalty is at its maximum
    a.load_fraction = Some(0.);
    a.runtime = runtime;

    IntegratedOutcome::Satisfied(StagingDecision {
        a,
        mode: PairMode::AOnly,
        economizer_running: true,
        integrated,
        stage_level: runtime,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::equipment::FanControl;
    use crate::core::psychrometrics::hr_from_wb;
    use crate::core::units::STANDARD_PRESSURE_INHG;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn outdoor(odb: f64, owb: f64) -> OutdoorConditions {
        OutdoorConditions {
            odb,
            owb,
            ohr: hr_from_wb(odb, owb, STANDARD_PRESSURE_INHG),
            bp: STANDARD_PRESSURE_INHG,
        }
    }

    #[fixture]
    fn staged() -> EquipmentProfile {
        EquipmentProfile {
            fan_control: FanControl::MultiSpeedAlwaysOn,
            stages: vec![0.5, 1.],
            economizer: true,
            ..EquipmentProfile::example()
        }
    }

    #[rstest]
    fn test_economizer_alone_is_enough(staged: EquipmentProfile) {
        // a large economizer capacity against a small load: nothing left for the compressor
        let outcome = attempt_integrated_economizer(&staged, &outdoor(55., 50.), 1., 75.);
        assert_eq!(outcome, IntegratedOutcome::Failed);
    }

    #[rstest]
    fn test_compressor_makes_up_shortfall(staged: EquipmentProfile) {
        let conditions = outdoor(70., 60.);
        let economizer_capacity = -sensible_ventilation_load(
            staged.airflow_cfm,
            conditions.ohr,
            conditions.odb,
            75.,
            conditions.bp,
        );
        let load = economizer_capacity + 10.;

        match attempt_integrated_economizer(&staged, &conditions, load, 75.) {
            IntegratedOutcome::Satisfied(decision) => {
                assert!(decision.a.runtime > 0. && decision.a.runtime <= 1.);
                assert_eq!(decision.a.load_fraction, Some(0.));
                assert_eq!(decision.a.capacity_fraction, 0.5);
                assert_eq!(decision.integrated, IntegratedState::Attempting);
                assert_eq!(decision.stage_level, decision.a.runtime);
                assert!(decision.economizer_running);
            }
            IntegratedOutcome::Failed => panic!("integrated economizer should meet this load"),
        }
    }

    #[rstest]
    fn test_load_beyond_lowest_stage_fails(staged: EquipmentProfile) {
        let outcome = attempt_integrated_economizer(&staged, &outdoor(72., 62.), 500., 75.);
        assert_eq!(outcome, IntegratedOutcome::Failed);
    }
}
