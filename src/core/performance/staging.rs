use crate::core::equipment::EquipmentProfile;
use crate::core::performance::capacity::net_sensible_capacity;
use crate::core::performance::flow_fraction::{flow_fraction, CompressorMode};
use crate::core::solvers::{Convergence, ForwardNewton};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

const CAPACITY_FRACTION_SOLVER: ForwardNewton = ForwardNewton {
    step: 0.001,
    tolerance: 0.001,
    max_steps: 10,
    convergence: Convergence::ResidualBeforeStep,
    bounds: Some((0., 1.)),
};

/// Operating state of one stage slot for a single bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StageState {
    pub capacity_fraction: f64,
    /// Capacity added by the upper stage over the lower one; only used by the B-A slot
    pub capacity_fraction_difference: f64,
    pub flow_fraction: f64,
    /// `None` where a load fraction does not apply; the cycling penalty then treats it as 1.0
    pub load_fraction: Option<f64>,
    /// Above 1.0 when the unit cannot meet the load
    pub runtime: f64,
    pub sensible_capacity_kbtuh: f64,
    pub st_ratio: f64,
    pub supply_dry_bulb: f64,
    pub total_capacity_correction: f64,
    pub efficiency_correction: f64,
    pub condenser_power_correction: f64,
}

impl StageState {
    fn at(capacity_fraction: f64, flow_fraction: f64) -> Self {
        Self {
            capacity_fraction,
            flow_fraction,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum StageRole {
    A,
    B,
    BMinusA,
}

/// Which stage slots carry the load in a bin
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum PairMode {
    #[default]
    #[serde(rename = "A_only")]
    AOnly,
    #[serde(rename = "A_and_BmA")]
    AAndBMinusA,
    #[serde(rename = "B_only")]
    BOnly,
}

impl fmt::Display for PairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PairMode::AOnly => "A_only",
                PairMode::AAndBMinusA => "A_and_BmA",
                PairMode::BOnly => "B_only",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum IntegratedState {
    #[default]
    NotAttempted,
    Attempting,
    Failed,
}

/// Air conditions the coil works against in a bin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoilConditions {
    pub odb: f64,
    pub ewb: f64,
    pub edb: f64,
    pub bp: f64,
}

/// Outcome of staging a unit against the sensible load of one bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StagingDecision {
    pub a: StageState,
    pub b: StageState,
    pub b_minus_a: StageState,
    pub mode: PairMode,
    pub economizer_running: bool,
    pub integrated: IntegratedState,
    /// Stage index plus runtime of the top running stage, as reported per bin
    pub stage_level: f64,
}

struct Stager<'a> {
    profile: &'a EquipmentProfile,
    conditions: &'a CoilConditions,
    economizer_running: bool,
    integrated: IntegratedState,
}

impl Stager<'_> {
    fn flow_fraction(&self, capacity_fraction: f64, mode: CompressorMode) -> f64 {
        flow_fraction(
            self.profile,
            capacity_fraction,
            mode,
            self.economizer_running,
            self.integrated,
            self.conditions.odb,
        )
    }

    fn sensible_capacity(&self, stage: &mut StageState) -> f64 {
        let CoilConditions { odb, ewb, edb, bp } = *self.conditions;
        let sensible = net_sensible_capacity(self.profile, stage, odb, ewb, edb, bp);
        stage.sensible_capacity_kbtuh = sensible;
        sensible
    }

    /// Stage at `capacity_fraction` with compressor-on airflow, its sensible capacity evaluated
    fn evaluated(&self, capacity_fraction: f64) -> StageState {
        let mut stage = StageState::at(
            capacity_fraction,
            self.flow_fraction(capacity_fraction, CompressorMode::On),
        );
        self.sensible_capacity(&mut stage);
        stage
    }

    fn decision(&self, a: StageState, stage_level: f64) -> StagingDecision {
        StagingDecision {
            a,
            mode: PairMode::AOnly,
            economizer_running: self.economizer_running,
            integrated: self.integrated,
            stage_level,
            ..Default::default()
        }
    }

    fn idle(&self) -> StagingDecision {
        let a = StageState {
            load_fraction: Some(0.),
            ..StageState::at(0., self.flow_fraction(0., CompressorMode::Off))
        };
        self.decision(a, 0.)
    }

    /// Modulating capacity; `None` when the unit has no usable full-load capacity in this bin.
    fn variable_capacity(&self, load: f64) -> Option<StagingDecision> {
        if !(load > 0.) {
            return Some(self.idle());
        }

        let mut full = StageState::at(1., 1.);
        let full_sensible = self.sensible_capacity(&mut full);
        if !(full_sensible.is_finite() && full_sensible > 0.) {
            return None;
        }

        if load >= full_sensible {
            let runtime = load / full_sensible;
            let a = StageState {
                runtime,
                load_fraction: None,
                ..full
            };
            return Some(self.decision(a, runtime));
        }

        let outcome = CAPACITY_FRACTION_SOLVER.solve(
            |capacity_fraction| {
                let sensible = self.evaluated(capacity_fraction).sensible_capacity_kbtuh;
                load - if sensible.is_finite() { sensible } else { 0. }
            },
            load / full_sensible,
        );

        let minimum = self.profile.min_capacity_fraction;
        let solved = outcome.estimate.clamp(0., 1.);
        let (capacity_fraction, runtime) = if minimum > 0. && solved < minimum {
            (minimum, (solved / minimum).clamp(0., 1.))
        } else {
            (solved, 1.)
        };

        let mut a = self.evaluated(capacity_fraction);
        a.sensible_capacity_kbtuh = load;
        a.load_fraction = None;
        a.runtime = runtime;

        Some(self.decision(a, runtime))
    }

    fn discrete(&self, load: f64, lowest: StageState) -> StagingDecision {
        let stages = &self.profile.stages;
        let mut a = lowest;

        if load < a.sensible_capacity_kbtuh || stages.len() == 1 {
            let runtime = load / a.sensible_capacity_kbtuh;
            a.load_fraction = Some(runtime);
            a.runtime = runtime;
            return self.decision(a, runtime);
        }

        let mut b = StageState::default();
        for (index, (lower, upper)) in stages.iter().copied().tuple_windows().enumerate() {
            a = self.evaluated(lower);
            b = self.evaluated(upper);

            if load >= a.sensible_capacity_kbtuh && load < b.sensible_capacity_kbtuh {
                let mut b_minus_a = StageState {
                    capacity_fraction: upper,
                    capacity_fraction_difference: upper - lower,
                    flow_fraction: b.flow_fraction,
                    sensible_capacity_kbtuh: b.sensible_capacity_kbtuh
                        - a.sensible_capacity_kbtuh,
                    ..Default::default()
                };
                let runtime = (load - a.sensible_capacity_kbtuh) / b_minus_a.sensible_capacity_kbtuh;
                b_minus_a.load_fraction = Some(runtime);
                b_minus_a.runtime = runtime;

                b.load_fraction = None;
                b.runtime = runtime;

                a.load_fraction = Some(1.);
                a.runtime = 1. - runtime;

                return StagingDecision {
                    a,
                    b,
                    b_minus_a,
                    mode: PairMode::AAndBMinusA,
                    economizer_running: self.economizer_running,
                    integrated: self.integrated,
                    stage_level: (index + 1) as f64 + runtime,
                };
            }
        }

        if load >= b.sensible_capacity_kbtuh {
            let runtime = load / b.sensible_capacity_kbtuh;
            b.runtime = runtime;
            b.load_fraction = Some(runtime.min(1.));
            return StagingDecision {
                b,
                mode: PairMode::BOnly,
                economizer_running: self.economizer_running,
                integrated: self.integrated,
                stage_level: (stages.len() - 1) as f64 + runtime,
                ..Default::default()
            };
        }

        self.decision(a, 0.)
    }
}

/// Stage a unit against `sensible_load` (kBtuh) at the given coil conditions.
///
/// Variable-capacity units modulate their capacity fraction to meet the load, cycling only below
/// their minimum turndown. Staged units run the lowest stage alone, blend two adjacent stages, or
/// run the top stage alone, whichever brackets the load.
pub fn decide_staging(
    profile: &EquipmentProfile,
    conditions: &CoilConditions,
    sensible_load: f64,
    economizer_running: bool,
    integrated: IntegratedState,
) -> StagingDecision {
    let stager = Stager {
        profile,
        conditions,
        economizer_running,
        integrated,
    };

    let lowest = stager.evaluated(profile.lowest_stage());

    if profile.is_variable_capacity() {
        if let Some(decision) = stager.variable_capacity(sensible_load) {
            return decision;
        }
    }

    stager.discrete(sensible_load, lowest)
}
