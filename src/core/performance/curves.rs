use crate::core::equipment::{CurveSet, SpecificRtu};
use crate::core::performance::staging::StageState;
use crate::core::units::fahrenheit_to_celsius;
use serde::Serialize;
use tracing::warn;

/// Rated net capacity (kBtuh) at and above which the DOE-2 packaged single-zone curves apply;
/// smaller units use the residential curves.
const DOE2_LARGE_UNIT_THRESHOLD_KBTUH: f64 = 60.;

const EFFICIENCY_CORRECTION_FLOOR: f64 = 0.01;

type Biquadratic = [f64; 6];

/// c0 + c1·ewb + c2·ewb² + c3·odb + c4·odb² + c5·ewb·odb
fn biquadratic(c: &Biquadratic, ewb: f64, odb: f64) -> f64 {
    c[0] + c[1] * ewb + c[2] * ewb.powi(2) + c[3] * odb + c[4] * odb.powi(2) + c[5] * ewb * odb
}

const DOE2_LARGE_CAPACITY: Biquadratic = [
    0.87403018, -0.0011416, 0.00017110, -0.00295700, 0.00001018, -0.00005917,
];
const DOE2_SMALL_CAPACITY: Biquadratic = [
    0.60034040, 0.00228726, -0.00001280, 0.00138975, -0.00008060, 0.00014125,
];
const DOE2_LARGE_EFFICIENCY: Biquadratic = [
    -1.06393100, 0.03065843, -0.00012690, 0.01542130, 0.00004973, -0.00020960,
];
const DOE2_SMALL_EFFICIENCY: Biquadratic = [
    -0.96177870, 0.04817751, -0.00023110, 0.00324392, 0.00014876, -0.00029520,
];
const DOE2_LARGE_SENSIBLE: Biquadratic = [
    4.83529620, -0.05753070, 0.00006155, -0.00526830, 0.00000317, 0.00003375,
];
const DOE2_SMALL_SENSIBLE: Biquadratic = [
    6.52756980, -0.12613750, 0.00056879, 0.00907575, -0.00004830, -0.00000875,
];

// Celsius
const CARRIER_CAPACITY: Biquadratic = [
    0.75030980, 0.01611210, 0.00081690, -0.00357190, -0.00018740, -0.00001780,
];
const CARRIER_EFFICIENCY: Biquadratic = [
    0.4152146633,
    0.0093230741,
    0.0002407406,
    0.0150246809,
    0.0008229240,
    -0.0018007980,
];

/// Capacity levels of the three-stage unit with their capacity and efficiency curves
const THREE_STAGE_CURVES: [(f64, Biquadratic, Biquadratic); 3] = [
    (
        1.0,
        [
            2.16908023, -0.04741753, 0.00054899, 0.00394090, -0.00001554, -0.00010878,
        ],
        [
            -1.01155368, 0.05389628, -0.00033881, -0.00389377, 0.00019559, -0.00023034,
        ],
    ),
    (
        0.6,
        [
            2.62596194, -0.05969721, 0.00064792, 0.00367327, -0.00001356, -0.00011917,
        ],
        [
            -1.43280192, 0.06809725, -0.00044252, -0.00527563, 0.00020666, -0.00023623,
        ],
    ),
    (
        0.4,
        [
            2.68873560, -0.06470293, 0.00067946, 0.00676853, -0.00001991, -0.00013382,
        ],
        [
            -1.65119376, 0.07413652, -0.00049982, -0.00567775, 0.00019535, -0.00020417,
        ],
    ),
];

const VARIABLE_SPEED_CAPACITY: Biquadratic = [
    -2.39099158422236,
    0.0517875312429516,
    -0.000262093586694283,
    0.0298244056511833,
    -0.000184849593859541,
    -7.40270588964858E-06,
];
/// Celsius; terms in supply, entering and outdoor temperatures
const VARIABLE_SPEED_EFFICIENCY: [f64; 11] = [
    -0.5966663,
    0.24754897,
    -0.0088454,
    -0.0036095,
    -0.0085282,
    0.00072631,
    0.01271645,
    -0.0018991,
    -0.0024883,
    -0.0008663,
    0.00250916,
];

/// Performance curves applied to a unit, fixed when its profile is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum CurveFamily {
    /// DOE-2 curves; flow fraction enters the correction only for units with advanced controls
    Doe2 { flow_dependent: bool },
    /// Carrier substitute for the DOE-2 curves
    Carrier,
    /// One curve per capacity level of a three-stage unit
    ThreeStage,
    /// Variable-speed compressor
    VariableSpeed,
}

impl CurveFamily {
    pub fn resolve(specific_rtu: SpecificRtu, curve_set: CurveSet) -> Self {
        match (specific_rtu, curve_set) {
            (SpecificRtu::VariableSpeedCompressor, _) => Self::VariableSpeed,
            (SpecificRtu::ThreeStages, _) => Self::ThreeStage,
            (SpecificRtu::None, CurveSet::Doe2) => Self::Doe2 {
                flow_dependent: false,
            },
            (SpecificRtu::AdvancedControls, CurveSet::Doe2) => Self::Doe2 {
                flow_dependent: true,
            },
            (SpecificRtu::None | SpecificRtu::AdvancedControls, CurveSet::Carrier) => {
                Self::Carrier
            }
        }
    }

    fn three_stage_curves(
        capacity_fraction: f64,
    ) -> Option<&'static (f64, Biquadratic, Biquadratic)> {
        THREE_STAGE_CURVES
            .iter()
            .find(|(level, _, _)| is_close!(*level, capacity_fraction, rel_tol = 1e-9))
    }

    /// Total capacity correction at the operating point.
    ///
    /// Arguments:
    /// * `net_capacity_kbtuh` - rated net capacity, which selects between the DOE-2 curve sets
    /// * `stage` - the stage being evaluated (capacity and flow fractions)
    pub fn total_capacity_correction(
        &self,
        net_capacity_kbtuh: f64,
        stage: &StageState,
        odb: f64,
        ewb: f64,
    ) -> f64 {
        match self {
            Self::Doe2 { flow_dependent } => {
                let ff = if *flow_dependent {
                    stage.flow_fraction
                } else {
                    1.
                };
                if net_capacity_kbtuh >= DOE2_LARGE_UNIT_THRESHOLD_KBTUH {
                    biquadratic(&DOE2_LARGE_CAPACITY, ewb, odb)
                        * (0.47278589 + 1.24334150 * ff - 1.03870550 * ff.powi(2)
                            + 0.32257813 * ff.powi(3))
                } else {
                    biquadratic(&DOE2_SMALL_CAPACITY, ewb, odb) * (0.80 + 0.20 * ff)
                }
            }
            Self::Carrier => biquadratic(
                &CARRIER_CAPACITY,
                fahrenheit_to_celsius(ewb),
                fahrenheit_to_celsius(odb),
            ),
            Self::ThreeStage => match Self::three_stage_curves(stage.capacity_fraction) {
                Some((_, capacity, _)) => biquadratic(capacity, ewb, odb),
                None => {
                    warn!(
                        capacity_fraction = stage.capacity_fraction,
                        "No three-stage capacity curve for this capacity fraction, using 1.0"
                    );
                    1.
                }
            },
            Self::VariableSpeed => biquadratic(&VARIABLE_SPEED_CAPACITY, ewb, odb),
        }
    }

    /// Efficiency (EIR) correction at the operating point, floored at 0.01 to keep the curves
    /// usable as the entering dry bulb approaches freezing.
    pub fn efficiency_correction(
        &self,
        net_capacity_kbtuh: f64,
        stage: &StageState,
        odb: f64,
        ewb: f64,
        edb: f64,
    ) -> f64 {
        let correction = match self {
            Self::Doe2 { flow_dependent } => {
                let ff = if *flow_dependent {
                    stage.flow_fraction
                } else {
                    1.
                };
                if net_capacity_kbtuh >= DOE2_LARGE_UNIT_THRESHOLD_KBTUH {
                    biquadratic(&DOE2_LARGE_EFFICIENCY, ewb, odb)
                        * (1.00794840 + 0.34544129 * ff - 0.69228910 * ff.powi(2)
                            + 0.33889943 * ff.powi(3))
                } else {
                    biquadratic(&DOE2_SMALL_EFFICIENCY, ewb, odb)
                        * (1.156 - 0.1816 * ff + 0.0256 * ff.powi(2))
                }
            }
            Self::Carrier => biquadratic(
                &CARRIER_EFFICIENCY,
                fahrenheit_to_celsius(ewb),
                fahrenheit_to_celsius(odb),
            ),
            Self::ThreeStage => match Self::three_stage_curves(stage.capacity_fraction) {
                Some((_, _, efficiency)) => biquadratic(efficiency, ewb, odb),
                None => {
                    warn!(
                        capacity_fraction = stage.capacity_fraction,
                        "No three-stage efficiency curve for this capacity fraction, using 1.0"
                    );
                    return 1.;
                }
            },
            Self::VariableSpeed => {
                let c = &VARIABLE_SPEED_EFFICIENCY;
                let sdb = fahrenheit_to_celsius(stage.supply_dry_bulb);
                let ewb = fahrenheit_to_celsius(ewb);
                let edb = fahrenheit_to_celsius(edb);
                let odb = fahrenheit_to_celsius(odb);
                c[0] + c[1] * sdb
                    + c[2] * ewb.powi(2)
                    + c[3] * edb.powi(2)
                    + c[4] * sdb.powi(2)
                    + c[5] * odb.powi(2)
                    + c[6] * ewb * edb
                    + c[7] * ewb * odb
                    + c[8] * edb * sdb
                    + c[9] * edb * odb
                    + c[10] * sdb * odb
            }
        };

        correction.max(EFFICIENCY_CORRECTION_FLOOR)
    }

    /// Scaling of gross capacity with capacity fraction
    pub fn part_load_capacity_factor(&self, capacity_fraction: f64) -> f64 {
        match self {
            Self::VariableSpeed => variable_speed_capacity_factor(capacity_fraction),
            _ => capacity_fraction,
        }
    }
}

/// DOE-2 sensible capacity correction. Only reported: the sensible split itself comes from the
/// bypass factor.
pub fn sensible_capacity_correction(net_capacity_kbtuh: f64, odb: f64, ewb: f64) -> f64 {
    if net_capacity_kbtuh >= DOE2_LARGE_UNIT_THRESHOLD_KBTUH {
        biquadratic(&DOE2_LARGE_SENSIBLE, ewb, odb)
    } else {
        biquadratic(&DOE2_SMALL_SENSIBLE, ewb, odb)
    }
}

pub fn variable_speed_capacity_factor(capacity_fraction: f64) -> f64 {
    let cf = capacity_fraction;
    -0.036240442 + 1.275963118 * cf - 0.288191485 * cf.powi(2) + 0.048967033 * cf.powi(3)
}

pub fn variable_speed_eir_factor(capacity_fraction: f64) -> f64 {
    let cf = capacity_fraction;
    -0.120651751 + 9.026346984 * cf - 15.86922715 * cf.powi(2) + 7.966206349 * cf.powi(3)
}

/// The fitted factors do not reach zero at zero capacity, so zero is forced there.
pub fn variable_speed_power_factor(capacity_fraction: f64) -> f64 {
    if capacity_fraction > 0. {
        variable_speed_capacity_factor(capacity_fraction)
            * variable_speed_eir_factor(capacity_fraction)
    } else {
        0.
    }
}
