use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{command, Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use eurolens::charts;
use eurolens::config::Config;
use eurolens::formatters::{CsvFormatter, JsonRecordsFormatter, OutputFormatter, OutputGenerator};
use eurolens::{metadata, report, Eurolens};
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use crate::display::display_summary;
use crate::error::EurolensCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const DEFAULT_SUMMARY_ROWS: usize = 50;

/// Defines the output formats we are able to produce the dataset in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl From<&OutputFormat> for OutputFormatter {
    fn from(value: &OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CsvFormatter),
            OutputFormat::Json => OutputFormatter::Json(JsonRecordsFormatter),
        }
    }
}

fn write_output<T, U>(output_generator: T, mut data: DataFrame, output_file: U) -> EurolensCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    let mut f = File::create(&output_file).context("Failed to write output")?;
    output_generator.save(&mut f, &mut data)?;
    Ok(())
}

fn read_dataset<P: AsRef<Path>>(path: P) -> EurolensCliResult<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn start_spinner(quiet: bool, message: &str) -> Option<Spinner> {
    (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    })
}

fn stop_spinner(spinner: Option<Spinner>) {
    if let Some(mut s) = spinner {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> EurolensCliResult<()>;
}

/// The `build` command fetches the three Eurostat sources, runs the pipeline and writes the
/// dataset together with its FAIR metadata document.
#[derive(Args, Debug)]
pub struct BuildCommand {
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Output format for the dataset",
        default_value = "csv"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Directory to place the dataset and metadata")]
    output_dir: Option<PathBuf>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for BuildCommand {
    async fn run(&self, config: Config) -> EurolensCliResult<()> {
        info!("Running `build` subcommand");
        let eurolens = Eurolens::with_config(config);

        let sp = start_spinner(self.quiet, "Downloading and joining Eurostat sources");
        let data = eurolens.build_dataset().await?;
        stop_spinner(sp);
        println!("Built {} country/year/sex row(s).", data.height());

        let out_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| eurolens.config.output.data_dir.clone());
        std::fs::create_dir_all(&out_dir).context("Failed to create output directory")?;

        let dataset_path = match self.output_format {
            OutputFormat::Csv => out_dir.join(&eurolens.config.output.csv_file),
            OutputFormat::Json => out_dir
                .join(&eurolens.config.output.csv_file)
                .with_extension("json"),
        };
        let formatter: OutputFormatter = (&self.output_format).into();
        write_output(formatter, data.clone(), &dataset_path)?;
        println!("Dataset written to {}", dataset_path.display());

        let metadata_path = out_dir.join(&eurolens.config.output.metadata_file);
        metadata::write(&eurolens.metadata_for(&data), &metadata_path)?;
        println!("Metadata written to {}", metadata_path.display());
        Ok(())
    }
}

/// The `charts` command renders the chart PNGs from a previously built dataset.
#[derive(Args, Debug)]
pub struct ChartsCommand {
    #[arg(short, long, help = "Dataset CSV produced by the `build` subcommand")]
    input: Option<PathBuf>,
    #[arg(short, long, help = "Directory to place the rendered charts")]
    output_dir: Option<PathBuf>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for ChartsCommand {
    async fn run(&self, config: Config) -> EurolensCliResult<()> {
        info!("Running `charts` subcommand");
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| config.output.data_dir.join(&config.output.csv_file));
        let out_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.charts_dir.clone());

        let data = read_dataset(&input)?;
        debug!("{data:#?}");
        let sp = start_spinner(self.quiet, "Rendering charts");
        let rendered = charts::render_all(&data, &out_dir, &config)?;
        stop_spinner(sp);
        for chart in &rendered {
            println!("Chart written to {}", chart.path.display());
        }
        Ok(())
    }
}

/// The `report` command renders the charts and assembles them into a paginated PDF.
#[derive(Args, Debug)]
pub struct ReportCommand {
    #[arg(short, long, help = "Dataset CSV produced by the `build` subcommand")]
    input: Option<PathBuf>,
    #[arg(long, help = "Directory to place the rendered charts")]
    charts_dir: Option<PathBuf>,
    #[arg(short, long, help = "Output file for the PDF report")]
    output_file: Option<PathBuf>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for ReportCommand {
    async fn run(&self, config: Config) -> EurolensCliResult<()> {
        info!("Running `report` subcommand");
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| config.output.data_dir.join(&config.output.csv_file));
        let charts_dir = self
            .charts_dir
            .clone()
            .unwrap_or_else(|| config.output.charts_dir.clone());
        let output_file = self
            .output_file
            .clone()
            .unwrap_or_else(|| config.output.data_dir.join(&config.output.report_file));

        let data = read_dataset(&input)?;
        let sp = start_spinner(self.quiet, "Rendering charts and assembling the report");
        let rendered = charts::render_all(&data, &charts_dir, &config)?;
        report::build(&rendered, &config.report, &output_file)?;
        stop_spinner(sp);
        println!("Report written to {}", output_file.display());
        Ok(())
    }
}

/// The `summary` command prints a tabular preview of a previously built dataset.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[arg(short, long, help = "Dataset CSV produced by the `build` subcommand")]
    input: Option<PathBuf>,
    #[arg(long, help = "Show all rows even if there are a large number")]
    full: bool,
}

impl RunCommand for SummaryCommand {
    async fn run(&self, config: Config) -> EurolensCliResult<()> {
        info!("Running `summary` subcommand");
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| config.output.data_dir.join(&config.output.csv_file));
        let data = read_dataset(&input)?;
        let max_results = (!self.full).then_some(DEFAULT_SUMMARY_ROWS);
        display_summary(data, max_results)?;
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Eurolens builds a cross-indicator Eurostat dataset with charts and a PDF report", long_about = None, name="eurolens")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress spinners to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Fetch the sources and build the dataset with its metadata
    Build(BuildCommand),
    /// Render chart images from a built dataset
    Charts(ChartsCommand),
    /// Assemble the chart images into a paginated PDF report
    Report(ReportCommand),
    /// Preview a built dataset as a table
    Summary(SummaryCommand),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn output_type_should_deserialize_properly() {
        let output_format = OutputFormat::from_str("csv");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Csv,
            "csv format should be parsed correctly"
        );
        let output_format = OutputFormat::from_str("Json");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Json,
            "parsing should be case insensitive"
        );
        let output_format = OutputFormat::from_str("parquet");
        assert!(output_format.is_err(), "non listed formats should fail");
    }

    #[test]
    fn read_dataset_roundtrips_a_written_csv() {
        use eurolens::COL;

        let df = DataFrame::new(vec![
            Series::new(COL::GEO, ["DE", "FR"]),
            Series::new(COL::TIME, ["2019", "2019"]),
            Series::new(COL::SEX, ["Total", "Total"]),
            Series::new(COL::GDP_PER_CAPITA, [Some(40000.0), None]),
        ])
        .unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        write_output(CsvFormatter, df.clone(), file.path()).unwrap();
        let read_back = read_dataset(file.path()).unwrap();

        assert_eq!(read_back.shape(), df.shape());
        let gdp: Vec<Option<f64>> = read_back
            .column(COL::GDP_PER_CAPITA)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(gdp, vec![Some(40000.0), None]);
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
