extern crate rtu_bin;

use anyhow::Context;
use clap::Parser;
use rtu_bin::output::FileOutput;
use rtu_bin::read_bin_file::bins_from_csv;
use rtu_bin::run_project;
use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct RtuArgs {
    input_file: String,
    #[arg(
        long,
        short,
        help = "Path to a temperature bin table in .csv format, used instead of any bins in the input"
    )]
    bins_file: Option<String>,
    #[arg(long, short, default_value_t = false, help = "Log debug events")]
    verbose: bool,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
}

fn main() -> anyhow::Result<()> {
    let args = RtuArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let level = if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)
        .context("setting tracing subscriber failed")?;

    let input_path = Path::new(args.input_file.as_str());
    let input_file_stem = input_path
        .file_stem()
        .and_then(OsStr::to_str)
        .context("Input file name could not be read")?;

    let output_path = input_path.with_file_name(format!("{input_file_stem}__results"));
    fs::create_dir_all(&output_path)?;
    let file_output = FileOutput::new(output_path, format!("{input_file_stem}__{{}}.{{}}"));

    let bins = match args.bins_file {
        Some(ref file) => Some(
            bins_from_csv(BufReader::new(File::open(file)?))
                .with_context(|| format!("Could not parse the bin file {file}"))?,
        ),
        None => None,
    };

    let results = run_project(BufReader::new(File::open(input_path)?), &file_output, bins)?;

    for (role, unit) in &results.units {
        info!(
            "{role}: {:.0} kWh per year ({:.0} condenser, {:.0} fan, {:.0} aux), peak demand {:.2} kW",
            unit.annual_total_kwh,
            unit.annual_condenser_kwh,
            unit.annual_fan_kwh,
            unit.annual_aux_kwh,
            unit.peak_demand_kw
        );
    }

    Ok(())
}
