use crate::core::equipment::UnitRole;
use crate::core::performance::staging::PairMode;
use crate::errors::RtuError;
use crate::output::{FileOutput, SinkOutput};
use crate::read_bin_file::bins_from_csv;
use crate::{run_project, RunResults};
use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use rstest::*;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const STRIP_MALL: &str = "./demos/input/strip_mall_two_stage.json";
const GROCERY: &str = "./demos/input/grocery_variable_speed.json";

fn run_demo(path: &str) -> RunResults {
    run_project(File::open(path).unwrap(), SinkOutput, None).unwrap()
}

fn assert_totals_match_bins(results: &RunResults) {
    for unit in results.units.values() {
        let records = || unit.occupied_bins.iter().chain(&unit.unoccupied_bins);
        assert_relative_eq!(
            unit.annual_condenser_kwh,
            records().map(|record| record.condenser_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            unit.annual_fan_kwh,
            records().map(|record| record.fan_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            unit.annual_aux_kwh,
            records().map(|record| record.aux_kwh).sum::<f64>(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            unit.annual_total_kwh,
            unit.annual_condenser_kwh + unit.annual_fan_kwh + unit.annual_aux_kwh,
            max_relative = 1e-12
        );
        assert_eq!(
            unit.peak_demand_kw,
            records().map(|record| record.demand_kw).fold(0., f64::max)
        );
    }
}

#[rstest]
fn test_all_demos_run() {
    for entry in WalkDir::new("./demos/input")
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            !e.file_type().is_dir() && e.file_name().to_str().unwrap().ends_with("json")
        })
    {
        let result = run_project(File::open(entry.path()).unwrap(), SinkOutput, None);
        assert!(
            result.is_ok(),
            "error was {:?} when running file {}",
            result.err().unwrap(),
            entry.file_name().to_str().unwrap()
        );
        let results = result.unwrap();
        assert_totals_match_bins(&results);
        for unit in results.units.values() {
            assert!(unit.annual_total_kwh > 0.);
            assert!(unit.peak_demand_kw > 0.);
        }
    }
}

#[rstest]
fn test_units_are_reported_in_order() {
    let results = run_demo(STRIP_MALL);
    assert_eq!(
        results.units.keys().copied().collect::<Vec<_>>(),
        vec![UnitRole::Candidate, UnitRole::Standard]
    );
}

#[rstest]
fn test_efficient_candidate_saves_energy() {
    let results = run_demo(STRIP_MALL);
    assert!(results.annual_savings_kwh().unwrap() > 0.);
}

#[rstest]
fn test_setback_runs_unoccupied_pass() {
    let with_setback = run_demo(STRIP_MALL);
    let candidate = with_setback.unit(UnitRole::Candidate).unwrap();
    assert!(!candidate.unoccupied_bins.is_empty());
    assert!(candidate.unoccupied.run_hours > 0.);
    assert_eq!(candidate.cooling_hours, candidate.occupied.run_hours);

    let without_setback = run_demo(GROCERY);
    assert!(without_setback
        .units
        .values()
        .all(|unit| unit.unoccupied_bins.is_empty()));
}

#[rstest]
fn test_economizer_contributes_nothing_at_or_above_setpoint() {
    let results = run_demo(STRIP_MALL);
    for unit in results.units.values() {
        for record in unit.occupied_bins.iter().filter(|record| record.odb >= 75.) {
            assert!(!record.economizer_running);
            assert_eq!(record.economizer_load, 0.);
        }
    }
}

#[rstest]
fn test_staged_unit_moves_up_through_stages() {
    let results = run_demo(STRIP_MALL);
    let candidate = results.unit(UnitRole::Candidate).unwrap();
    let hottest = candidate.occupied_bins.last().unwrap();
    assert_ne!(hottest.mode, PairMode::AOnly);
    assert!(hottest.stage_level > 1.);
}

#[rstest]
fn test_bins_from_file_replace_input_bins() {
    let bins =
        bins_from_csv(File::open("./demos/bins/humid_subtropical.csv").unwrap()).unwrap();
    let results = run_project(File::open(STRIP_MALL).unwrap(), SinkOutput, Some(bins)).unwrap();

    let candidate = results.unit(UnitRole::Candidate).unwrap();
    assert!(candidate.occupied_bins.iter().all(|record| record.odb <= 97.));
    assert_totals_match_bins(&results);
}

#[rstest]
fn test_missing_bins_are_an_invalid_request() {
    let input = r#"{
        "project": {"total_capacity_kbtuh": 60, "indoor_setpoint": 75},
        "design": {"dry_bulb": 95},
        "candidate": {"eer": 12},
        "standard": {"eer": 10}
    }"#;
    let result = run_project(input.as_bytes(), SinkOutput, None);
    assert!(matches!(result, Err(RtuError::InvalidRequest(_))));
}

#[rstest]
fn test_design_below_setpoint_fails_the_calculation() {
    let input = r#"{
        "project": {"total_capacity_kbtuh": 60, "indoor_setpoint": 75},
        "design": {"dry_bulb": 70},
        "bins": [
            {"odb": 65, "owb": 58, "occupied_hours": 100},
            {"odb": 72, "owb": 62, "occupied_hours": 100}
        ],
        "candidate": {"eer": 12},
        "standard": {"eer": 10}
    }"#;
    let result = run_project(input.as_bytes(), SinkOutput, None);
    match result {
        Err(RtuError::FailureInCalculation(error)) => assert_eq!(
            error.to_string(),
            "Outside design temperature (70) is lower than the set point (75)."
        ),
        other => panic!("expected a calculation failure, got {other:?}"),
    }
}

#[rstest]
fn test_unsupported_stage_count_is_an_invalid_request() {
    let input = r#"{
        "project": {"total_capacity_kbtuh": 60, "indoor_setpoint": 75},
        "design": {"dry_bulb": 95},
        "bins": [{"odb": 95, "owb": 75, "occupied_hours": 12}],
        "candidate": {"eer": 12, "stages": 4},
        "standard": {"eer": 10}
    }"#;
    let result = run_project(input.as_bytes(), SinkOutput, None);
    match result {
        Err(RtuError::InvalidRequest(error)) => {
            assert!(error.to_string().starts_with("candidate unit:"))
        }
        other => panic!("expected an invalid request, got {other:?}"),
    }
}

fn scratch_directory(name: &str) -> PathBuf {
    let directory = std::env::temp_dir().join(format!("rtu-bin-{name}-{}", std::process::id()));
    fs::create_dir_all(&directory).unwrap();
    directory
}

fn read_csv_header(path: &Path) -> Vec<String> {
    csv::Reader::from_path(path)
        .unwrap()
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect()
}

#[rstest]
fn test_results_are_written_per_unit_and_occupancy() {
    let directory = scratch_directory("output");
    let output = FileOutput::new(directory.clone(), "strip_mall__{}.{}".to_string());
    let results = run_project(File::open(STRIP_MALL).unwrap(), &output, None).unwrap();

    for key in [
        "candidate_occupied",
        "candidate_unoccupied",
        "standard_occupied",
        "standard_unoccupied",
    ] {
        let path = directory.join(format!("strip_mall__{key}.csv"));
        assert!(path.exists(), "{key} bin table was not written");
        let header = read_csv_header(&path);
        assert_eq!(header[0], "odb");
        assert!(header.contains(&"demand_kw".to_string()));
    }

    let summary: serde_json::Value = serde_json::from_reader(
        File::open(directory.join("strip_mall__summary.json")).unwrap(),
    )
    .unwrap();
    assert_relative_eq!(
        summary["units"]["candidate"]["annual_total_kwh"]
            .as_f64()
            .unwrap(),
        results.unit(UnitRole::Candidate).unwrap().annual_total_kwh,
        max_relative = 1e-12
    );
    assert!(summary["load_line"]["slope"].as_f64().unwrap() > 0.);

    fs::remove_dir_all(directory).unwrap();
}
