use crate::core::design_conditions::DesignConditions;
use crate::core::equipment::EquipmentProfile;
use crate::core::performance::air::{
    mix_entering_air, sensible_ventilation_load, EnteringConditions, InsideHumidity,
};
use crate::core::performance::capacity::net_sensible_capacity;
use crate::core::performance::staging::StageState;
use crate::core::psychrometrics::enthalpy_from_hr;
use crate::core::units::STANDARD_PRESSURE_INHG;
use crate::input::LockedLoadLine;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// AHRI rating point the sensible capacity at test is taken at
const TEST_ODB: f64 = 95.;
const TEST_EWB: f64 = 67.;
const TEST_EDB: f64 = 80.;

#[derive(Debug, Error, PartialEq)]
pub enum LoadLineError {
    #[error("Outside design temperature ({odb}) is equal to the set point ({idb}).")]
    DesignAtSetpoint { odb: f64, idb: f64 },
    #[error("Outside design temperature ({odb}) is lower than the set point ({idb}).")]
    DesignBelowSetpoint { odb: f64, idb: f64 },
    #[error(
        "For the specified ventilation rate, the non-ventilation load at design is less than the \
         internal load (negative non-ventilation slope). Reduce ventilation or lock the \
         non-ventilation load line before increasing ventilation."
    )]
    VentilationExceedsCapacity,
    #[error("Unable to compute mixed-air entering conditions")]
    EnteringConditions,
    #[error("Locked load line must be finite (slope {slope}, intercept {intercept})")]
    LockedNotFinite { slope: f64, intercept: f64 },
}

/// Building and sizing inputs the load line is derived from
#[derive(Clone, Copy, Debug)]
pub struct LoadLineInputs {
    pub design: DesignConditions,
    pub indoor_setpoint: f64,
    pub inside_humidity: InsideHumidity,
    pub oversizing_percent: f64,
    /// Share of the design load from solar and internal gains (S&I)
    pub internal_load_fraction: f64,
    pub locked: Option<LockedLoadLine>,
}

/// Everything worked out at the design point, kept for reporting
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DesignSnapshot {
    pub odb: f64,
    pub owb: f64,
    pub ohr: f64,
    pub pressure: f64,
    pub elevation_ft: f64,
    pub idb: f64,
    pub inside_relative_humidity: f64,
    pub inside_humidity_ratio: f64,
    pub inside_enthalpy: f64,
    pub entering: EnteringConditions,
    pub st_ratio_at_design: f64,
    pub sensible_capacity_at_test_kbtuh: f64,
    pub sensible_capacity_at_design_kbtuh: f64,
    pub ventilation_cfm: f64,
    pub ventilation_load_at_design_kbtuh: f64,
    pub sensible_load_at_design_kbtuh: f64,
    pub non_ventilation_load_at_design_kbtuh: f64,
    pub internal_load_kbtuh: f64,
}

/// Non-ventilation sensible building load as a straight line in outdoor temperature.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoadLine {
    /// kBtuh per °F above the setpoint
    pub slope: f64,
    /// Solar and internal gains (kBtuh) at the setpoint
    pub intercept: f64,
    pub locked: bool,
    pub design: DesignSnapshot,
}

impl LoadLine {
    pub fn non_ventilation_load(&self, odb: f64, idb: f64) -> f64 {
        self.slope * (odb - idb) + self.intercept
    }
}

/// Slope and intercept of the line through the internal load at the setpoint and the
/// non-ventilation load at design.
pub(crate) fn fit_line(
    idb: f64,
    odb: f64,
    non_ventilation_load: f64,
    internal_load: f64,
) -> (f64, f64) {
    (
        (non_ventilation_load - internal_load) / (odb - idb),
        internal_load,
    )
}

/// Build the building load line from the design point, assuming the unit is sized so that it
/// runs continuously at design (less any oversizing).
pub fn compute_load_line(
    profile: &EquipmentProfile,
    inputs: &LoadLineInputs,
) -> Result<LoadLine, LoadLineError> {
    let DesignConditions {
        odb,
        owb,
        ohr,
        pressure,
        elevation_ft,
        ..
    } = inputs.design;
    let idb = inputs.indoor_setpoint;

    let inside_relative_humidity = inputs.inside_humidity.relative_humidity(ohr, idb, pressure);
    let inside_humidity_ratio = inputs.inside_humidity.humidity_ratio(ohr, idb, pressure);
    let inside_enthalpy = enthalpy_from_hr(idb, inside_humidity_ratio);

    let mut full_load = StageState {
        capacity_fraction: 1.,
        flow_fraction: 1.,
        load_fraction: Some(1.),
        runtime: 1.,
        ..Default::default()
    };

    let sensible_capacity_at_test = net_sensible_capacity(
        profile,
        &mut full_load,
        TEST_ODB,
        TEST_EWB,
        TEST_EDB,
        STANDARD_PRESSURE_INHG,
    );

    let ventilation_cfm = profile.ventilation_cfm;
    let ventilation_load = sensible_ventilation_load(ventilation_cfm, ohr, odb, idb, pressure);

    let entering = mix_entering_air(
        profile.blower_kw,
        idb,
        inside_humidity_ratio,
        odb,
        ohr,
        pressure,
        ventilation_cfm,
        profile.airflow_cfm,
    );
    if ![entering.edb, entering.ewb, entering.ehr]
        .iter()
        .all(|value| value.is_finite())
    {
        return Err(LoadLineError::EnteringConditions);
    }

    let sensible_capacity_at_design = net_sensible_capacity(
        profile,
        &mut full_load,
        odb,
        entering.ewb,
        entering.edb,
        pressure,
    );

    let load_reduction_factor = 1. + inputs.oversizing_percent / 100.;
    let sensible_load = sensible_capacity_at_design / load_reduction_factor;
    let non_ventilation_load = (sensible_load - ventilation_load).max(0.);
    let internal_load = sensible_load * inputs.internal_load_fraction;

    if odb == idb {
        return Err(LoadLineError::DesignAtSetpoint { odb, idb });
    }

    let design = DesignSnapshot {
        odb,
        owb,
        ohr,
        pressure,
        elevation_ft,
        idb,
        inside_relative_humidity,
        inside_humidity_ratio,
        inside_enthalpy,
        entering,
        st_ratio_at_design: full_load.st_ratio,
        sensible_capacity_at_test_kbtuh: sensible_capacity_at_test,
        sensible_capacity_at_design_kbtuh: sensible_capacity_at_design,
        ventilation_cfm,
        ventilation_load_at_design_kbtuh: ventilation_load,
        sensible_load_at_design_kbtuh: sensible_load,
        non_ventilation_load_at_design_kbtuh: non_ventilation_load,
        internal_load_kbtuh: internal_load,
    };

    let (slope, intercept, locked) = match inputs.locked {
        Some(LockedLoadLine { slope, intercept }) => {
            if !(slope.is_finite() && intercept.is_finite()) {
                return Err(LoadLineError::LockedNotFinite { slope, intercept });
            }
            (slope, intercept, true)
        }
        None => {
            let (slope, intercept) = fit_line(idb, odb, non_ventilation_load, internal_load);
            (slope, intercept, false)
        }
    };
    debug!(slope, intercept, locked, "load line");

    if slope < 0. {
        return Err(if odb < idb {
            LoadLineError::DesignBelowSetpoint { odb, idb }
        } else {
            LoadLineError::VentilationExceedsCapacity
        });
    }

    Ok(LoadLine {
        slope,
        intercept,
        locked,
        design,
    })
}
