/// This module provides moist-air property conversions in Imperial units (°F, inHg, lb/lb).
///
/// All conversions are pure functions. Wet bulb from humidity ratio and dew point from enthalpy
/// are solved iteratively and return their best estimate when the iteration cap is reached.
use crate::core::solvers::{Convergence, ForwardNewton};
use crate::core::units::{
    INHG_PER_PSI, MINUTES_PER_HOUR, RANKINE_OFFSET, SQUARE_INCHES_PER_SQUARE_FOOT,
    STANDARD_PRESSURE_INHG,
};
use serde::Serialize;
use thiserror::Error;

const MOLECULAR_WEIGHT_RATIO: f64 = 0.62198;
const ADP_TEMPERATURE_STEP: f64 = 0.2;
const ADP_MAX_STEPS: usize = 1000;
const CONDENSATE_ENTHALPY_DATUM: f64 = 32.;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PsychrometricError {
    #[error("ADP: supply humidity ratio {shr} is negative")]
    NegativeSupplyHumidityRatio { shr: f64 },
    #[error("ADP: supply dry bulb {sdb} exceeds entering dry bulb {edb} (step {step})")]
    SupplyWarmerThanEntering { sdb: f64, edb: f64, step: usize },
    #[error("ADP: supply humidity ratio {shr} exceeds entering humidity ratio {ehr} (step {step})")]
    SupplyMoisterThanEntering { shr: f64, ehr: f64, step: usize },
    #[error("ADP: distance to saturation grew, not finding saturation point (step {step})")]
    SaturationNotApproached { step: usize },
    #[error("ADP: march never met exit conditions (step {step})")]
    MarchExhausted { step: usize },
    #[error("Supply: dry bulb {sdb} is below the dew point {dew_point} for the calculated humidity ratio (it is on the other side of the saturation curve)")]
    SupplyBeyondSaturation { sdb: f64, dew_point: f64 },
    #[error("Supply: humidity ratio {shr} is less than 0")]
    SupplyHumidityRatioNegative { shr: f64 },
}

/// Specific volume of moist air, ft³ per lb of dry air
pub fn specific_volume_from_hr(db: f64, hr: f64, bp: f64) -> f64 {
    53.352 * (db + RANKINE_OFFSET) * (1. + 1.6078 * hr)
        / (bp * SQUARE_INCHES_PER_SQUARE_FOOT / INHG_PER_PSI)
}

pub fn specific_volume_from_rh(db: f64, rh: f64, bp: f64) -> f64 {
    specific_volume_from_hr(db, hr_from_rh(db, rh, bp), bp)
}

pub fn specific_volume_from_wb(db: f64, wb: f64, bp: f64) -> f64 {
    specific_volume_from_hr(db, hr_from_wb(db, wb, bp), bp)
}

/// Dry-air mass flow (lb/h) for a volumetric flow (CFM) at the given state
pub fn dry_air_mass_flow_per_hour(cfm: f64, db: f64, hr: f64, bp: f64) -> f64 {
    cfm * MINUTES_PER_HOUR / specific_volume_from_hr(db, hr, bp)
}

pub fn dew_point_from_hr(hr: f64, bp: f64) -> f64 {
    let vapour_pressure_psi = bp * hr / (MOLECULAR_WEIGHT_RATIO + hr) / INHG_PER_PSI;
    let alpha = vapour_pressure_psi.ln();

    let above_freezing = 100.45
        + 33.193 * alpha
        + 2.319 * alpha.powi(2)
        + 0.17074 * alpha.powi(3)
        + 1.2063 * vapour_pressure_psi.powf(0.1984);

    if above_freezing > 32. {
        above_freezing
    } else {
        90.12 + 26.142 * alpha + 0.8927 * alpha.powi(2)
    }
}

pub fn dew_point_from_rh(db: f64, rh: f64, bp: f64) -> f64 {
    dew_point_from_hr(hr_from_rh(db, rh, bp), bp)
}

pub fn dew_point_from_wb(db: f64, wb: f64, bp: f64) -> f64 {
    dew_point_from_hr(hr_from_wb(db, wb, bp), bp)
}

/// Saturation vapour pressure over water (above 32 °F) or ice, in inHg
pub fn saturation_pressure(db: f64) -> f64 {
    let r = db + RANKINE_OFFSET;
    let exponent = if db > 32. {
        -1.044_039_708e4 / r - 1.129_464_96e1 - 2.702_235_5e-2 * r + 1.289_036_0e-5 * r.powi(2)
            - 2.478_068e-9 * r.powi(3)
            + 6.545_967_3 * r.ln()
    } else {
        -1.021_416_462e4 / r - 4.893_503_01 - 5.376_579_44e-3 * r + 1.920_237_69e-7 * r.powi(2)
            + 3.557_583_16e-10 * r.powi(3)
            - 9.034_468_83e-14 * r.powi(4)
            + 4.163_501_9 * r.ln()
    };

    exponent.exp() * INHG_PER_PSI
}

pub fn saturation_hr(db: f64, bp: f64) -> f64 {
    let pws = saturation_pressure(db);
    MOLECULAR_WEIGHT_RATIO * pws / (bp - pws)
}

pub fn hr_from_wb(db: f64, wb: f64, bp: f64) -> f64 {
    ((1093. - 0.556 * wb) * saturation_hr(wb, bp) - 0.240 * (db - wb))
        / (1093. + 0.444 * db - wb)
}

pub fn hr_from_rh(db: f64, rh: f64, bp: f64) -> f64 {
    let vapour_pressure = rh * saturation_pressure(db);
    MOLECULAR_WEIGHT_RATIO * vapour_pressure / (bp - vapour_pressure)
}

pub fn hr_from_enthalpy(db: f64, h: f64) -> f64 {
    (h - 0.240 * db) / (1061. + 0.444 * db)
}

/// Enthalpy of moist air, Btu per lb of dry air
pub fn enthalpy_from_hr(db: f64, hr: f64) -> f64 {
    0.240 * db + hr * (1061. + 0.444 * db)
}

pub fn enthalpy_from_wb(db: f64, wb: f64, bp: f64) -> f64 {
    enthalpy_from_hr(db, hr_from_wb(db, wb, bp))
}

pub fn enthalpy_from_rh(db: f64, rh: f64, bp: f64) -> f64 {
    enthalpy_from_hr(db, hr_from_rh(db, rh, bp))
}

pub fn db_from_enthalpy_hr(h: f64, hr: f64) -> f64 {
    (h - 1061. * hr) / (0.240 + 0.444 * hr)
}

pub fn rh_from_hr(db: f64, hr: f64, bp: f64) -> f64 {
    (bp * hr / (MOLECULAR_WEIGHT_RATIO + hr)) / saturation_pressure(db)
}

pub fn rh_from_wb(db: f64, wb: f64, bp: f64) -> f64 {
    rh_from_hr(db, hr_from_wb(db, wb, bp), bp)
}

pub fn wb_from_rh(db: f64, rh: f64, bp: f64) -> Option<f64> {
    wb_from_hr(db, hr_from_rh(db, rh, bp), bp)
}

/// Polynomial approximation of the wet bulb used to seed the Newton solve
fn wb_initial_guess(db: f64, hr: f64) -> f64 {
    let h = enthalpy_from_hr(db, hr);
    let y = h.ln();
    if h < 11.758 {
        0.6040 + 3.4841 * y + 1.3601 * y.powi(2) + 0.9731 * y.powi(3)
    } else {
        30.9185 - 39.682 * y + 20.5841 * y.powi(2) - 1.758 * y.powi(3)
    }
}

/// Wet bulb (°F) for a dry bulb and humidity ratio.
///
/// Returns `None` when any input is not a number. Otherwise the last Newton estimate is returned
/// whether or not the 0.001 °F step tolerance was met.
pub fn wb_from_hr(db: f64, hr: f64, bp: f64) -> Option<f64> {
    if db.is_nan() || hr.is_nan() || bp.is_nan() {
        return None;
    }

    let first_guess = if db > 0. {
        wb_initial_guess(db, hr)
    } else {
        db
    };

    // one initial step plus up to ten refinements
    let solver = ForwardNewton {
        step: 0.02,
        tolerance: 0.001,
        max_steps: 11,
        convergence: Convergence::StepSize,
        bounds: None,
    };

    Some(
        solver
            .solve(|wb| hr - hr_from_wb(db, wb, bp), first_guess)
            .estimate,
    )
}

/// Saturation temperature whose enthalpy matches `h`, starting from `initial_guess`
pub fn dew_point_from_enthalpy(initial_guess: f64, h: f64, bp: f64) -> f64 {
    let solver = ForwardNewton {
        step: 0.001,
        tolerance: 0.001,
        max_steps: 10,
        convergence: Convergence::ResidualAfterStep,
        bounds: None,
    };

    solver
        .solve(
            |adp| h - enthalpy_from_hr(adp, hr_from_rh(adp, 1.0, bp)),
            initial_guess,
        )
        .estimate
}

/// Supply air state leaving a coil.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SupplyConditions {
    pub sdb: f64,
    pub shr: f64,
}

impl SupplyConditions {
    /// Closed-form supply state from total capacity (Btuh), S/T ratio and entering state.
    ///
    /// The state is not checked against the saturation curve; see [`Self::validated`].
    pub fn solve(
        total_capacity_btuh: f64,
        st_ratio: f64,
        cfm: f64,
        edb: f64,
        ehr: f64,
        bp: f64,
    ) -> Self {
        let mass_flow = dry_air_mass_flow_per_hour(cfm, edb, ehr, bp);

        let latent_capacity = (1. - st_ratio) * total_capacity_btuh;
        let shr = ehr - latent_capacity / (mass_flow * (1061. + 0.444 * edb));

        let sensible_capacity = total_capacity_btuh * st_ratio;
        let sdb = edb - sensible_capacity / (mass_flow * (0.24 + 0.444 * shr));

        Self { sdb, shr }
    }

    pub fn validated(self, bp: f64) -> Result<Self, PsychrometricError> {
        let dew_point = dew_point_from_hr(self.shr, bp);
        if self.sdb < dew_point {
            return Err(PsychrometricError::SupplyBeyondSaturation {
                sdb: self.sdb,
                dew_point,
            });
        }
        if self.shr < 0. {
            return Err(PsychrometricError::SupplyHumidityRatioNegative { shr: self.shr });
        }
        Ok(self)
    }

    /// Supply state checked against the saturation curve
    pub fn solve_checked(
        total_capacity_btuh: f64,
        st_ratio: f64,
        cfm: f64,
        edb: f64,
        ehr: f64,
        bp: f64,
    ) -> Result<Self, PsychrometricError> {
        Self::solve(total_capacity_btuh, st_ratio, cfm, edb, ehr, bp).validated(bp)
    }

    /// Supply state including the enthalpy carried away by condensate
    pub fn solve_with_condensate(
        total_capacity_btuh: f64,
        st_ratio: f64,
        cfm: f64,
        edb: f64,
        ehr: f64,
        bp: f64,
    ) -> Result<Self, PsychrometricError> {
        let first = Self::solve(total_capacity_btuh, st_ratio, cfm, edb, ehr, bp);
        let mass_flow = dry_air_mass_flow_per_hour(cfm, edb, ehr, bp);
        let condensate_flux =
            mass_flow * (ehr - first.shr) * (first.sdb - CONDENSATE_ENTHALPY_DATUM);

        Self::solve_checked(
            total_capacity_btuh + condensate_flux,
            st_ratio,
            cfm,
            edb,
            ehr,
            bp,
        )
    }
}

/// Total coil capacity (Btuh) between an entering and a supply state, net of condensate enthalpy
pub fn total_capacity_btuh(
    cfm: f64,
    bp: f64,
    edb: f64,
    ehr: f64,
    supply: SupplyConditions,
) -> f64 {
    let mass_flow = dry_air_mass_flow_per_hour(cfm, edb, ehr, bp);
    let condensate_flow = mass_flow * (ehr - supply.shr);

    mass_flow * (enthalpy_from_hr(edb, ehr) - enthalpy_from_hr(supply.sdb, supply.shr))
        - condensate_flow * (supply.sdb - CONDENSATE_ENTHALPY_DATUM)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ApparatusDewPoint {
    pub adp: f64,
    pub hr_at_adp: f64,
}

/// Apparatus dew point: march from the supply state along the coil process line in 0.2 °F
/// steps until the line crosses saturation, then interpolate the crossing.
pub fn apparatus_dew_point(
    sdb: f64,
    shr: f64,
    edb: f64,
    ehr: f64,
    bp: f64,
) -> Result<ApparatusDewPoint, PsychrometricError> {
    if shr < 0. {
        return Err(PsychrometricError::NegativeSupplyHumidityRatio { shr });
    }

    let slope = (ehr - shr) / (edb - sdb);

    let mut candidate = sdb;
    let mut hr_candidate = shr;
    let mut delta = 1000.;

    for step in 1..ADP_MAX_STEPS {
        let candidate_previous = candidate;
        let hr_previous = hr_candidate;
        let delta_previous = delta;

        candidate = sdb - step as f64 * ADP_TEMPERATURE_STEP;
        hr_candidate = shr - step as f64 * ADP_TEMPERATURE_STEP * slope;
        delta = candidate - dew_point_from_hr(hr_candidate, bp);

        if delta < 0. {
            let weight = delta.abs() / (delta.abs() + delta_previous.abs());
            return Ok(ApparatusDewPoint {
                adp: candidate + weight * (candidate_previous - candidate),
                hr_at_adp: hr_candidate + weight * (hr_previous - hr_candidate),
            });
        }

        if sdb > edb {
            return Err(PsychrometricError::SupplyWarmerThanEntering { sdb, edb, step });
        } else if shr > ehr {
            return Err(PsychrometricError::SupplyMoisterThanEntering { shr, ehr, step });
        } else if delta > delta_previous {
            return Err(PsychrometricError::SaturationNotApproached { step });
        }
    }

    Err(PsychrometricError::MarchExhausted {
        step: ADP_MAX_STEPS - 1,
    })
}

pub fn bypass_factor(edb: f64, sdb: f64, adp: f64) -> f64 {
    (sdb - adp) / (edb - adp)
}

/// Supply state and apparatus dew point for a coil delivering the given capacity and S/T.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoilProcess {
    pub supply: SupplyConditions,
    pub dew_point: ApparatusDewPoint,
}

pub fn coil_process(
    total_capacity_btuh: f64,
    st_ratio: f64,
    cfm: f64,
    edb: f64,
    ehr: f64,
    bp: f64,
) -> Result<CoilProcess, PsychrometricError> {
    let supply = SupplyConditions::solve_checked(total_capacity_btuh, st_ratio, cfm, edb, ehr, bp)?;
    let dew_point = apparatus_dew_point(supply.sdb, supply.shr, edb, ehr, bp)?;
    Ok(CoilProcess { supply, dew_point })
}

/// Bypass factor implied by a coil capacity and S/T ratio at an entering state
pub fn bypass_factor_from_capacity(
    total_capacity_btuh: f64,
    st_ratio: f64,
    cfm: f64,
    edb: f64,
    ehr: f64,
    bp: f64,
) -> Result<f64, PsychrometricError> {
    let process = coil_process(total_capacity_btuh, st_ratio, cfm, edb, ehr, bp)?;
    Ok(bypass_factor(edb, process.supply.sdb, process.dew_point.adp))
}

/// Mass-flow-normalised bypass exponent from a bypass factor measured at rating conditions
/// (80 °F / 67 °F entering, standard pressure), so that `BPF = exp(-A0 / m)`.
pub fn a0_from_bypass_factor(bypass_factor_rated: f64, cfm_rated: f64) -> f64 {
    let ehr = hr_from_wb(80., 67., STANDARD_PRESSURE_INHG);
    let mass_flow = dry_air_mass_flow_per_hour(cfm_rated, 80., ehr, STANDARD_PRESSURE_INHG);

    -mass_flow * bypass_factor_rated.ln()
}

pub fn bypass_factor_from_a0(a0: f64, edb: f64, ewb: f64, bp: f64, cfm: f64) -> f64 {
    let ehr = hr_from_wb(edb, ewb, STANDARD_PRESSURE_INHG);
    let mass_flow = dry_air_mass_flow_per_hour(cfm, edb, ehr, bp);

    (-a0 / mass_flow).exp()
}

/// Sensible-to-total ratio of a coil with the given bypass factor, clamped to [0, 1].
pub fn st_ratio_from_bypass_factor(
    bypass_factor: f64,
    gross_capacity_btuh: f64,
    cfm: f64,
    ehr: f64,
    edb: f64,
    bp: f64,
) -> f64 {
    let mass_flow = dry_air_mass_flow_per_hour(cfm, edb, ehr, bp);

    let h_entering = enthalpy_from_hr(edb, ehr);
    let h_adp = h_entering - (gross_capacity_btuh / mass_flow) / (1. - bypass_factor);

    let adp = dew_point_from_enthalpy(edb, h_adp, bp);
    let h_elbow = enthalpy_from_hr(edb, saturation_hr(adp, bp));

    ((h_elbow - h_adp) / (h_entering - h_adp)).clamp(0., 1.)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensibleSplit {
    pub st_ratio: f64,
    pub bypass_factor: f64,
}

/// S/T ratio at a stage airflow, adjusting the rated bypass factor through A0
pub fn st_ratio_from_a0(
    a0: f64,
    gross_capacity_btuh: f64,
    cfm: f64,
    ehr: f64,
    edb: f64,
    bp: f64,
) -> SensibleSplit {
    let ewb = wb_from_hr(edb, ehr, bp).unwrap_or(f64::NAN);
    let bypass_factor = bypass_factor_from_a0(a0, edb, ewb, bp, cfm);

    SensibleSplit {
        st_ratio: st_ratio_from_bypass_factor(bypass_factor, gross_capacity_btuh, cfm, ehr, edb, bp),
        bypass_factor,
    }
}
