use crate::core::equipment::{EquipmentProfile, UnitRole};
use crate::core::load_line::LoadLine;
use crate::core::performance::air::{
    mix_entering_air, sensible_ventilation_load, EnteringConditions, InsideHumidity,
};
use crate::core::performance::economizer::{
    attempt_integrated_economizer, IntegratedOutcome, OutdoorConditions,
};
use crate::core::performance::flow_fraction::{flow_fraction, CompressorMode};
use crate::core::performance::power::{condenser_power_kw, fan_power_kw};
use crate::core::performance::staging::{
    decide_staging, CoilConditions, IntegratedState, PairMode, StageRole, StagingDecision,
};
use crate::core::psychrometrics::{hr_from_wb, rh_from_hr};
use crate::input::TemperatureBin;
use serde::Serialize;
use tracing::{info, instrument};

/// Bins this close below the setpoint are run even when the load line says there is no load
const RUN_BELOW_SETPOINT_F: f64 = 5.;

/// Settings the bin loop needs beyond the unit and the load line
#[derive(Clone, Copy, Debug)]
pub struct SimulationSettings {
    pub indoor_setpoint: f64,
    /// Rise in setpoint outside occupied hours; no unoccupied pass is made when it is zero
    pub setback: f64,
    pub inside_humidity: InsideHumidity,
    /// Number of identical units; scales energy but not demand
    pub units: u32,
}

/// Operation of a unit over the hours of one temperature bin.
///
/// Energies are kWh over the bin's hours for all units, loads are kBtuh, demand is kW for a
/// single unit. Correction factors, S/T and fractions are those of the lead stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinRecord {
    pub odb: f64,
    pub owb: f64,
    pub ohr: f64,
    pub ihr: f64,
    pub irh: f64,
    pub hours: f64,
    pub condenser_kwh: f64,
    pub fan_kwh: f64,
    pub aux_kwh: f64,
    pub non_ventilation_load: f64,
    pub ventilation_load: f64,
    pub total_sensible_load: f64,
    pub economizer_load: f64,
    pub economizer_running: bool,
    pub integrated_runtime: f64,
    pub remaining_load: f64,
    pub mode: PairMode,
    pub runtime_a: f64,
    pub runtime_b: f64,
    pub load_fraction_a: f64,
    pub flow_fraction_a: f64,
    pub capacity_fraction_a: f64,
    pub capacity_fraction_b: f64,
    pub sensible_capacity_a: f64,
    pub sensible_capacity_b: f64,
    pub edb: f64,
    pub ewb: f64,
    pub ehr: f64,
    pub erh: f64,
    pub condenser_kw: f64,
    pub power_correction: f64,
    pub efficiency_correction: f64,
    pub inverse_efficiency_correction: f64,
    pub capacity_correction: f64,
    pub st_ratio: f64,
    pub stage_level: f64,
    pub operating_correction: f64,
    pub latent_load: f64,
    pub demand_kw: f64,
}

/// Totals over the bins of one occupancy pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PassTotals {
    pub condenser_kwh: f64,
    pub fan_kwh: f64,
    pub aux_kwh: f64,
    /// Hours of the bins the unit ran in
    pub run_hours: f64,
    pub economizer_hours: f64,
    pub peak_demand_kw: f64,
}

impl PassTotals {
    fn add(&mut self, record: &BinRecord) {
        self.condenser_kwh += record.condenser_kwh;
        self.fan_kwh += record.fan_kwh;
        self.aux_kwh += record.aux_kwh;
        self.run_hours += record.hours;
        if record.economizer_running {
            self.economizer_hours += record.hours;
        }
        self.peak_demand_kw = self.peak_demand_kw.max(record.demand_kw);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResults {
    pub unit: UnitRole,
    pub annual_condenser_kwh: f64,
    pub annual_fan_kwh: f64,
    pub annual_aux_kwh: f64,
    pub annual_total_kwh: f64,
    pub peak_demand_kw: f64,
    pub cooling_hours: f64,
    pub occupied: PassTotals,
    pub unoccupied: PassTotals,
    #[serde(skip)]
    pub occupied_bins: Vec<BinRecord>,
    #[serde(skip)]
    pub unoccupied_bins: Vec<BinRecord>,
}

/// Highest power drawn by each part of the unit within a bin
#[derive(Clone, Copy, Debug, Default)]
struct BinPeaks {
    condenser_a: f64,
    condenser_b_minus_a: f64,
    condenser_b: f64,
    fan: f64,
}

struct Pass<'a> {
    profile: &'a EquipmentProfile,
    load_line: &'a LoadLine,
    idb: f64,
    inside_humidity: InsideHumidity,
    units: f64,
}

impl Pass<'_> {
    fn run(
        &self,
        bins: &[TemperatureBin],
        hours: impl Fn(&TemperatureBin) -> f64,
    ) -> (PassTotals, Vec<BinRecord>) {
        let mut totals = PassTotals::default();
        let records = bins
            .iter()
            .filter_map(|bin| self.simulate(bin.odb, bin.owb, hours(bin)))
            .inspect(|record| totals.add(record))
            .collect();
        (totals, records)
    }

    /// Economizer cooling is on a temperature switch; variable-capacity units also need the
    /// outdoor air well below the setpoint.
    fn economizer_available(&self, odb: f64, total_load: f64) -> bool {
        let profile = self.profile;
        profile.economizer
            && odb < self.idb
            && total_load > 0.
            && !(profile.is_variable_capacity() && self.idb - odb <= RUN_BELOW_SETPOINT_F)
    }

    fn mix(&self, odb: f64, ohr: f64, ihr: f64, outdoor_cfm: f64) -> EnteringConditions {
        mix_entering_air(
            self.profile.blower_kw,
            self.idb,
            ihr,
            odb,
            ohr,
            self.load_line.design.pressure,
            outdoor_cfm,
            self.profile.airflow_cfm,
        )
    }

    fn simulate(&self, odb: f64, owb: f64, hours: f64) -> Option<BinRecord> {
        if !(hours > 0.) || !owb.is_finite() {
            return None;
        }

        let profile = self.profile;
        let idb = self.idb;
        let bp = self.load_line.design.pressure;

        let ohr = hr_from_wb(odb, owb, bp);
        let irh = self.inside_humidity.relative_humidity(ohr, idb, bp);
        let ihr = self.inside_humidity.humidity_ratio(ohr, idb, bp);

        let non_ventilation_load = self.load_line.non_ventilation_load(odb, idb);
        let ventilation_load =
            sensible_ventilation_load(profile.ventilation_cfm, ohr, odb, idb, bp);
        let total_load = non_ventilation_load + ventilation_load;

        if !(total_load > 0. || idb - odb <= RUN_BELOW_SETPOINT_F) {
            return None;
        }

        let mut economizer_running = self.economizer_available(odb, total_load);

        // negative: outdoor air beyond ventilation cools the space
        let economizer_load =
            if economizer_running && profile.airflow_cfm > profile.ventilation_cfm {
                let economizer_flow_fraction = flow_fraction(
                    profile,
                    0.,
                    CompressorMode::Off,
                    true,
                    IntegratedState::NotAttempted,
                    odb,
                );
                sensible_ventilation_load(
                    profile.airflow_cfm * economizer_flow_fraction - profile.ventilation_cfm,
                    ohr,
                    odb,
                    idb,
                    bp,
                )
            } else {
                0.
            };
        let mut remaining_load = (total_load + economizer_load).max(0.);

        let mut entering = self.mix(
            odb,
            ohr,
            ihr,
            if economizer_running {
                profile.airflow_cfm
            } else {
                profile.ventilation_cfm
            },
        );
        let coil = |entering: &EnteringConditions| CoilConditions {
            odb,
            ewb: entering.ewb,
            edb: entering.edb,
            bp,
        };

        let mut integrated_runtime = 0.;
        let mut decision = if economizer_running
            && remaining_load > 0.
            && !profile.fan_control.is_variable_speed()
        {
            let outdoor = OutdoorConditions { odb, owb, ohr, bp };
            match attempt_integrated_economizer(profile, &outdoor, non_ventilation_load, idb) {
                IntegratedOutcome::Satisfied(decision) => {
                    integrated_runtime = decision.a.runtime;
                    decision
                }
                IntegratedOutcome::Failed => {
                    economizer_running = false;
                    remaining_load = total_load;
                    entering = self.mix(odb, ohr, ihr, profile.ventilation_cfm);
                    decide_staging(
                        profile,
                        &coil(&entering),
                        remaining_load.max(0.),
                        false,
                        IntegratedState::Failed,
                    )
                }
            }
        } else {
            decide_staging(
                profile,
                &coil(&entering),
                remaining_load,
                economizer_running,
                IntegratedState::NotAttempted,
            )
        };

        let mut peaks = BinPeaks::default();
        let (condenser_kw, condenser_average_kw) =
            condenser_duty(profile, &mut decision, &coil(&entering), &mut peaks);

        let off_flow_fraction = flow_fraction(
            profile,
            0.,
            CompressorMode::Off,
            economizer_running,
            decision.integrated,
            odb,
        );
        let fan_average_kw = fan_duty(profile, &decision, off_flow_fraction, &mut peaks);

        let lead = match decision.mode {
            PairMode::BOnly => decision.b,
            PairMode::AOnly | PairMode::AAndBMinusA => decision.a,
        };
        let st_ratio = lead.st_ratio;
        let operating_correction = if lead.total_capacity_correction != 0.
            && profile.st_ratio_at_test != 0.
            && st_ratio != 0.
        {
            lead.condenser_power_correction
                / (lead.total_capacity_correction * (st_ratio / profile.st_ratio_at_test))
        } else {
            0.
        };
        let latent_load = if st_ratio > 0. && remaining_load > 0. {
            (remaining_load / st_ratio) * (1. - st_ratio)
        } else {
            0.
        };
        let erh = if entering.edb.is_normal() && entering.ehr.is_normal() {
            rh_from_hr(entering.edb, entering.ehr, bp)
        } else {
            0.
        };
        let inverse_efficiency_correction = if lead.efficiency_correction != 0. {
            1. / lead.efficiency_correction
        } else {
            0.
        };

        let demand_kw = peaks.condenser_a
            + peaks.condenser_b_minus_a
            + peaks.condenser_b
            + peaks.fan
            + profile.auxiliary_kw;

        Some(BinRecord {
            odb,
            owb,
            ohr,
            ihr,
            irh,
            hours,
            condenser_kwh: hours * condenser_average_kw * self.units,
            fan_kwh: hours * fan_average_kw * self.units,
            aux_kwh: hours * profile.auxiliary_kw * self.units,
            non_ventilation_load,
            ventilation_load,
            total_sensible_load: total_load,
            economizer_load,
            economizer_running,
            integrated_runtime,
            remaining_load,
            mode: decision.mode,
            runtime_a: decision.a.runtime,
            runtime_b: decision.b_minus_a.runtime,
            load_fraction_a: decision.a.load_fraction.unwrap_or(0.),
            flow_fraction_a: decision.a.flow_fraction,
            capacity_fraction_a: decision.a.capacity_fraction,
            capacity_fraction_b: decision.b.capacity_fraction,
            sensible_capacity_a: decision.a.sensible_capacity_kbtuh,
            sensible_capacity_b: decision.b.sensible_capacity_kbtuh,
            edb: entering.edb,
            ewb: entering.ewb,
            ehr: entering.ehr,
            erh,
            condenser_kw,
            power_correction: lead.condenser_power_correction,
            efficiency_correction: lead.efficiency_correction,
            inverse_efficiency_correction,
            capacity_correction: lead.total_capacity_correction,
            st_ratio,
            stage_level: decision.stage_level,
            operating_correction,
            latent_load,
            demand_kw,
        })
    }
}

/// Condenser power for the staging decision: the reported kW and the kW averaged over the bin.
fn condenser_duty(
    profile: &EquipmentProfile,
    decision: &mut StagingDecision,
    coil: &CoilConditions,
    peaks: &mut BinPeaks,
) -> (f64, f64) {
    let CoilConditions { odb, ewb, edb, .. } = *coil;
    match decision.mode {
        PairMode::AOnly => {
            let kw = condenser_power_kw(profile, &mut decision.a, StageRole::A, odb, ewb, edb);
            peaks.condenser_a = if decision.a.runtime == 0. {
                0.
            } else {
                kw.max(0.)
            };
            (kw, kw * decision.a.runtime)
        }
        PairMode::AAndBMinusA => {
            let a = condenser_power_kw(profile, &mut decision.a, StageRole::A, odb, ewb, edb);
            let b_minus_a = condenser_power_kw(
                profile,
                &mut decision.b_minus_a,
                StageRole::BMinusA,
                odb,
                ewb,
                edb,
            );
            peaks.condenser_a = a.max(0.);
            peaks.condenser_b_minus_a = b_minus_a.max(0.);
            let kw = a + b_minus_a * decision.b_minus_a.runtime;
            (kw, kw)
        }
        PairMode::BOnly => {
            let kw = condenser_power_kw(profile, &mut decision.b, StageRole::B, odb, ewb, edb);
            peaks.condenser_b = kw.max(0.);
            (kw, kw * decision.b.runtime)
        }
    }
}

/// Blower power averaged over the bin. Between compressor cycles the fan runs at the
/// compressor-off flow fraction, which is zero for fans cycling with the compressor.
fn fan_duty(
    profile: &EquipmentProfile,
    decision: &StagingDecision,
    off_flow_fraction: f64,
    peaks: &mut BinPeaks,
) -> f64 {
    let mut fan = |flow_fraction: f64| {
        let kw = fan_power_kw(profile, flow_fraction);
        peaks.fan = peaks.fan.max(kw);
        kw
    };

    match decision.mode {
        PairMode::AOnly => {
            let runtime = decision.a.runtime.max(0.);
            if profile.fan_control.is_always_on() && runtime >= 1. {
                fan(decision.a.flow_fraction) * runtime
            } else {
                let runtime = runtime.min(1.);
                fan(decision.a.flow_fraction) * runtime + fan(off_flow_fraction) * (1. - runtime)
            }
        }
        PairMode::AAndBMinusA => {
            let runtime_b = decision.b.runtime.clamp(0., 1.);
            fan(decision.a.flow_fraction) * (1. - runtime_b)
                + fan(decision.b.flow_fraction) * runtime_b
        }
        PairMode::BOnly => fan(decision.b.flow_fraction) * decision.b.runtime.max(0.),
    }
}

/// Run a unit through the bin table, once for occupied hours and, when there is a setback,
/// again for unoccupied hours at the raised setpoint.
#[instrument(skip_all, fields(unit = %profile.role))]
pub fn run_bin_simulation(
    profile: &EquipmentProfile,
    load_line: &LoadLine,
    bins: &[TemperatureBin],
    settings: &SimulationSettings,
) -> SimulationResults {
    let units = f64::from(settings.units);

    let (occupied, occupied_bins) = Pass {
        profile,
        load_line,
        idb: settings.indoor_setpoint,
        inside_humidity: settings.inside_humidity,
        units,
    }
    .run(bins, |bin| bin.occupied_hours);

    let (unoccupied, unoccupied_bins) = if settings.setback > 0. {
        let unoccupied_profile = profile.for_unoccupied_hours();
        Pass {
            profile: &unoccupied_profile,
            load_line,
            idb: settings.indoor_setpoint + settings.setback,
            inside_humidity: settings.inside_humidity,
            units,
        }
        .run(bins, |bin| bin.unoccupied_hours)
    } else {
        Default::default()
    };

    let annual_condenser_kwh = occupied.condenser_kwh + unoccupied.condenser_kwh;
    let annual_fan_kwh = occupied.fan_kwh + unoccupied.fan_kwh;
    let annual_aux_kwh = occupied.aux_kwh + unoccupied.aux_kwh;
    let annual_total_kwh = annual_condenser_kwh + annual_fan_kwh + annual_aux_kwh;
    let peak_demand_kw = occupied.peak_demand_kw.max(unoccupied.peak_demand_kw);

    info!(
        annual_total_kwh,
        peak_demand_kw,
        occupied_bins = occupied_bins.len(),
        unoccupied_bins = unoccupied_bins.len(),
        "bin simulation complete"
    );

    SimulationResults {
        unit: profile.role,
        annual_condenser_kwh,
        annual_fan_kwh,
        annual_aux_kwh,
        annual_total_kwh,
        peak_demand_kw,
        cooling_hours: occupied.run_hours,
        occupied,
        unoccupied,
        occupied_bins,
        unoccupied_bins,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::design_conditions::DesignConditions;
    use crate::core::equipment::FanControl;
    use crate::core::load_line::{compute_load_line, LoadLineInputs};
    use crate::core::units::STANDARD_PRESSURE_INHG;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn bin(odb: f64, owb: f64, occupied_hours: f64, unoccupied_hours: f64) -> TemperatureBin {
        TemperatureBin {
            odb,
            owb,
            occupied_hours,
            unoccupied_hours,
        }
    }

    #[fixture]
    fn bins() -> Vec<TemperatureBin> {
        vec![
            bin(45., 40., 300., 500.),
            bin(55., 49., 350., 450.),
            bin(62., 55., 300., 300.),
            bin(67., 59., 280., 250.),
            bin(72., 63., 260., 200.),
            bin(77., 66., 230., 150.),
            bin(82., 68., 180., 90.),
            bin(87., 70., 120., 40.),
            bin(92., 72., 60., 10.),
            bin(105., 77., 15., 0.),
        ]
    }

    #[fixture]
    fn settings() -> SimulationSettings {
        SimulationSettings {
            indoor_setpoint: 75.,
            setback: 0.,
            inside_humidity: InsideHumidity::default(),
            units: 1,
        }
    }

    fn load_line_for(profile: &EquipmentProfile) -> LoadLine {
        compute_load_line(
            profile,
            &LoadLineInputs {
                design: DesignConditions {
                    odb: 95.,
                    owb: 75.,
                    ohr: hr_from_wb(95., 75., STANDARD_PRESSURE_INHG),
                    pressure: STANDARD_PRESSURE_INHG,
                    elevation_ft: 0.,
                    requested_odb: None,
                },
                indoor_setpoint: 75.,
                inside_humidity: InsideHumidity::default(),
                oversizing_percent: 0.,
                internal_load_fraction: 0.5,
                locked: None,
            },
        )
        .unwrap()
    }

    fn simulate(
        profile: &EquipmentProfile,
        bins: &[TemperatureBin],
        settings: &SimulationSettings,
    ) -> SimulationResults {
        run_bin_simulation(profile, &load_line_for(profile), bins, settings)
    }

    #[rstest]
    fn test_annual_totals_are_sums_over_bins(
        bins: Vec<TemperatureBin>,
        settings: SimulationSettings,
    ) {
        let profile = EquipmentProfile {
            economizer: true,
            ..EquipmentProfile::example()
        };
        let results = simulate(
            &profile,
            &bins,
            &SimulationSettings {
                setback: 5.,
                ..settings
            },
        );

        let records = || results.occupied_bins.iter().chain(&results.unoccupied_bins);
        assert_relative_eq!(
            results.annual_condenser_kwh,
            records().map(|record| record.condenser_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            results.annual_fan_kwh,
            records().map(|record| record.fan_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            results.annual_aux_kwh,
            records().map(|record| record.aux_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            results.annual_total_kwh,
            results.annual_condenser_kwh + results.annual_fan_kwh + results.annual_aux_kwh
        );
        assert_eq!(
            results.peak_demand_kw,
            records().map(|record| record.demand_kw).fold(0., f64::max)
        );
        assert!(results.annual_condenser_kwh > 0.);
        assert!(!results.unoccupied_bins.is_empty());
    }

    #[rstest]
    fn test_cold_bins_without_load_do_not_run(
        bins: Vec<TemperatureBin>,
        settings: SimulationSettings,
    ) {
        let results = simulate(&EquipmentProfile::example(), &bins, &settings);
        assert!(results.occupied_bins.iter().all(|record| record.odb > 45.));
        assert!(results.cooling_hours < bins.iter().map(|bin| bin.occupied_hours).sum());
    }

    #[rstest]
    fn test_bins_without_hours_are_skipped(settings: SimulationSettings) {
        let results = simulate(
            &EquipmentProfile::example(),
            &[bin(85., 68., 0., 0.), bin(90., 71., 10., 0.)],
            &settings,
        );
        assert_eq!(results.occupied_bins.len(), 1);
        assert_eq!(results.occupied_bins[0].odb, 90.);
        assert_eq!(results.cooling_hours, 10.);
    }

    #[rstest]
    fn test_economizer_is_off_at_the_setpoint(settings: SimulationSettings) {
        let profile = EquipmentProfile {
            economizer: true,
            ..EquipmentProfile::example()
        };
        let results = simulate(&profile, &[bin(75., 64., 100., 0.)], &settings);
        let record = &results.occupied_bins[0];
        assert!(!record.economizer_running);
        assert_eq!(record.economizer_load, 0.);
        assert_eq!(results.occupied.economizer_hours, 0.);
    }

    #[rstest]
    fn test_economizer_cools_below_the_setpoint(settings: SimulationSettings) {
        let without = EquipmentProfile::example();
        let with = EquipmentProfile {
            economizer: true,
            ..EquipmentProfile::example()
        };
        let cool_bin = [bin(62., 55., 100., 0.)];

        let economizing = simulate(&with, &cool_bin, &settings);
        let record = &economizing.occupied_bins[0];
        assert!(record.economizer_load < 0.);
        assert!(record.remaining_load < record.total_sensible_load);

        let compressor_only = simulate(&without, &cool_bin, &settings);
        assert!(economizing.annual_condenser_kwh < compressor_only.annual_condenser_kwh);
    }

    #[rstest]
    fn test_units_scale_energy_not_demand(
        bins: Vec<TemperatureBin>,
        settings: SimulationSettings,
    ) {
        let profile = EquipmentProfile::example();
        let one = simulate(&profile, &bins, &settings);
        let three = simulate(
            &profile,
            &bins,
            &SimulationSettings {
                units: 3,
                ..settings
            },
        );
        assert_relative_eq!(
            three.annual_total_kwh,
            3. * one.annual_total_kwh,
            max_relative = 1e-12
        );
        assert_eq!(three.peak_demand_kw, one.peak_demand_kw);
    }

    #[rstest]
    fn test_no_unoccupied_pass_without_setback(
        bins: Vec<TemperatureBin>,
        settings: SimulationSettings,
    ) {
        let results = simulate(&EquipmentProfile::example(), &bins, &settings);
        assert!(results.unoccupied_bins.is_empty());
        assert_eq!(results.unoccupied, PassTotals::default());
    }

    #[rstest]
    fn test_unoccupied_fan_cycles_with_compressor(settings: SimulationSettings) {
        let profile = EquipmentProfile::example();
        let warm_bin = [bin(85., 68., 0., 100.)];
        let results = simulate(
            &profile,
            &warm_bin,
            &SimulationSettings {
                setback: 5.,
                ..settings
            },
        );
        let record = &results.unoccupied_bins[0];
        assert!(record.runtime_a < 1.);
        // the fan only runs alongside the compressor
        assert_relative_eq!(
            record.fan_kwh,
            100. * profile.blower_kw * record.runtime_a,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn test_always_on_fan_runs_between_cycles(settings: SimulationSettings) {
        let profile = EquipmentProfile::example();
        assert_eq!(profile.fan_control, FanControl::SingleSpeedAlwaysOn);
        let results = simulate(&profile, &[bin(85., 68., 100., 0.)], &settings);
        let record = &results.occupied_bins[0];
        assert!(record.runtime_a < 1.);
        assert_relative_eq!(record.fan_kwh, 100. * profile.blower_kw, max_relative = 1e-9);
    }

    #[rstest]
    fn test_stage_level_rises_with_outdoor_temperature(
        bins: Vec<TemperatureBin>,
        settings: SimulationSettings,
    ) {
        let profile = EquipmentProfile {
            fan_control: FanControl::MultiSpeedAlwaysOn,
            stages: vec![0.5, 1.],
            ..EquipmentProfile::example()
        };
        let results = simulate(&profile, &bins, &settings);
        let levels: Vec<f64> = results
            .occupied_bins
            .iter()
            .map(|record| record.stage_level)
            .collect();

        assert!(levels.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(levels.last().unwrap() > &1.);
    }

    #[rstest]
    fn test_record_carries_lead_stage_corrections(settings: SimulationSettings) {
        let results = simulate(
            &EquipmentProfile::example(),
            &[bin(90., 71., 10., 0.)],
            &settings,
        );
        let record = &results.occupied_bins[0];
        assert!(record.capacity_correction > 0.);
        assert!(record.power_correction > 0.);
        assert_relative_eq!(
            record.inverse_efficiency_correction,
            1. / record.efficiency_correction
        );
        assert!(record.st_ratio > 0. && record.st_ratio < 1.);
        assert!(record.latent_load > 0.);
        assert!(record.erh > 0. && record.erh < 1.);
    }
}
