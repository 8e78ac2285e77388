use crate::core::psychrometrics::{
    enthalpy_from_hr, hr_from_rh, rh_from_hr, specific_volume_from_hr, wb_from_hr,
};
use crate::core::units::{KBTUH_PER_KW, MINUTES_PER_HOUR};
use crate::input::InsideHumidityInput;
use serde::Serialize;

/// Share of blower power that is not absorbed by the air stream (fan 70%, motor 85% efficient)
const FAN_AND_MOTOR_EFFICIENCY: f64 = 0.70 * 0.85;

const TRACKED_RH_MIN: f64 = 0.20;
const TRACKED_RH_MAX: f64 = 0.65;

/// Conditions of the air entering the evaporator coil
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EnteringConditions {
    pub edb: f64,
    pub ewb: f64,
    pub ehr: f64,
}

/// Adiabatic mixing of return air with outdoor air, followed by the blower heat.
///
/// Ventilation flow above the fan flow is assumed to enter the building through another fan,
/// so at most the whole fan flow is outdoor air.
pub fn mix_entering_air(
    blower_kw: f64,
    idb: f64,
    ihr: f64,
    odb: f64,
    ohr: f64,
    bp: f64,
    ventilation_cfm: f64,
    fan_cfm: f64,
) -> EnteringConditions {
    let (room_cfm, outdoor_cfm) = if ventilation_cfm > fan_cfm {
        (0., fan_cfm)
    } else {
        (fan_cfm - ventilation_cfm, ventilation_cfm)
    };

    // lb dry air per minute
    let room_mass_flow = room_cfm / specific_volume_from_hr(idb, ihr, bp);
    let outdoor_mass_flow = outdoor_cfm / specific_volume_from_hr(odb, ohr, bp);
    let mixed_mass_flow = room_mass_flow + outdoor_mass_flow;

    let ehr = (ihr * room_mass_flow + ohr * outdoor_mass_flow) / mixed_mass_flow;
    let enthalpy = (enthalpy_from_hr(idb, ihr) * room_mass_flow
        + enthalpy_from_hr(odb, ohr) * outdoor_mass_flow)
        / mixed_mass_flow;

    let edb_before_fan = (enthalpy - ehr * 1061.) / (0.24 + ehr * 0.444);
    let fan_heat_rise = (1_000. * KBTUH_PER_KW * blower_kw * (1. - FAN_AND_MOTOR_EFFICIENCY))
        / (MINUTES_PER_HOUR * mixed_mass_flow * (0.240 + 0.444 * ehr));
    let edb = edb_before_fan + fan_heat_rise;

    EnteringConditions {
        edb,
        ewb: wb_from_hr(edb, ehr, bp).unwrap_or(f64::NAN),
        ehr,
    }
}

/// Sensible heat gain (kBtuh) from bringing `cfm` of outdoor air to the indoor dry bulb;
/// negative when it is cooler outside.
pub fn sensible_ventilation_load(cfm: f64, ohr: f64, odb: f64, idb: f64, bp: f64) -> f64 {
    cfm * (MINUTES_PER_HOUR / specific_volume_from_hr(odb, ohr, bp))
        * (0.24 + ohr * 0.444)
        * (odb - idb)
        / 1_000.
}

/// Outdoor airflow whose ventilation load rises by `slope_kbtuh_per_f` per °F
pub fn cfm_for_ventilation_slope(slope_kbtuh_per_f: f64, ohr: f64, odb: f64, bp: f64) -> f64 {
    slope_kbtuh_per_f * (specific_volume_from_hr(odb, ohr, bp) / MINUTES_PER_HOUR)
        * (1. / (0.24 + ohr * 0.444))
        * 1_000.
}

/// How the indoor humidity is set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InsideHumidity {
    /// Indoor humidity ratio follows the outdoor humidity ratio
    pub track_outdoor: bool,
    /// Fixed relative humidity setpoint (fraction)
    pub relative_humidity: f64,
}

impl Default for InsideHumidity {
    fn default() -> Self {
        Self {
            track_outdoor: true,
            relative_humidity: 0.60,
        }
    }
}

impl From<&InsideHumidityInput> for InsideHumidity {
    fn from(input: &InsideHumidityInput) -> Self {
        Self {
            track_outdoor: input.track_outdoor,
            relative_humidity: input.relative_humidity_percent / 100.,
        }
    }
}

impl InsideHumidity {
    /// Indoor relative humidity (fraction). A tracked value is kept within 20% to 65%.
    pub fn relative_humidity(&self, ohr: f64, idb: f64, bp: f64) -> f64 {
        if self.track_outdoor {
            rh_from_hr(idb, ohr, bp).clamp(TRACKED_RH_MIN, TRACKED_RH_MAX)
        } else {
            self.relative_humidity
        }
    }

    pub fn humidity_ratio(&self, ohr: f64, idb: f64, bp: f64) -> f64 {
        hr_from_rh(idb, self.relative_humidity(ohr, idb, bp), bp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::psychrometrics::hr_from_wb;
    use crate::core::units::STANDARD_PRESSURE_INHG;
    use approx::assert_relative_eq;
    use rstest::*;

    const BP: f64 = STANDARD_PRESSURE_INHG;

    #[rstest]
    fn test_ventilation_load_sign_and_inverse() {
        let ohr = hr_from_wb(95., 75., BP);
        let load = sensible_ventilation_load(500., ohr, 95., 75., BP);
        assert!(load > 0.);
        assert!(sensible_ventilation_load(500., ohr, 65., 75., BP) < 0.);
        assert_eq!(sensible_ventilation_load(500., ohr, 75., 75., BP), 0.);

        let cfm = cfm_for_ventilation_slope(load / 20., ohr, 95., BP);
        assert_relative_eq!(cfm, 500., max_relative = 1e-12);
    }

    #[rstest]
    fn test_mixing_without_outdoor_air_adds_only_fan_heat() {
        let ihr = hr_from_rh(75., 0.5, BP);
        let mixed = mix_entering_air(0., 75., ihr, 95., 0.015, BP, 0., 2000.);
        assert_relative_eq!(mixed.edb, 75., epsilon = 1e-9);
        assert_relative_eq!(mixed.ehr, ihr, max_relative = 1e-12);

        let with_fan = mix_entering_air(1.5, 75., ihr, 95., 0.015, BP, 0., 2000.);
        assert!(with_fan.edb > mixed.edb);
        assert!(with_fan.edb - mixed.edb < 1.);
    }

    #[rstest]
    fn test_mixing_lies_between_streams() {
        let ihr = hr_from_rh(75., 0.5, BP);
        let ohr = hr_from_wb(95., 75., BP);
        let mixed = mix_entering_air(0., 75., ihr, 95., ohr, BP, 400., 2000.);
        assert!(mixed.edb > 75. && mixed.edb < 80.);
        assert!(mixed.ehr > ihr && mixed.ehr < ohr);
        assert!(mixed.ewb < mixed.edb);
    }

    #[rstest]
    fn test_ventilation_above_fan_flow_is_capped() {
        let ihr = hr_from_rh(75., 0.5, BP);
        let ohr = hr_from_wb(95., 75., BP);
        let all_outdoor = mix_entering_air(0., 75., ihr, 95., ohr, BP, 2000., 2000.);
        let excess = mix_entering_air(0., 75., ihr, 95., ohr, BP, 5000., 2000.);
        assert_eq!(all_outdoor, excess);
        assert_relative_eq!(excess.edb, 95., epsilon = 1e-6);
    }

    #[rstest]
    fn test_tracked_inside_humidity_is_limited() {
        let tracking = InsideHumidity::default();
        assert_eq!(tracking.relative_humidity(0.030, 75., BP), 0.65);
        assert_eq!(tracking.relative_humidity(0.001, 75., BP), 0.20);

        let fixed = InsideHumidity {
            track_outdoor: false,
            relative_humidity: 0.45,
        };
        assert_eq!(fixed.relative_humidity(0.030, 75., BP), 0.45);
        assert_relative_eq!(
            rh_from_hr(75., fixed.humidity_ratio(0.030, 75., BP), BP),
            0.45,
            max_relative = 1e-9
        );
    }
}
