// Entry point and high-level CLI flow.
//
// Two ways in:
// - Interactive: option [1] loads the dataset and prints load diagnostics,
//   option [2] asks for a major category and up to three minor categories,
//   then prints and exports the five tables.
// - One-shot: `--major` plus one or more `--minor` flags run a single
//   report and exit.
mod buckets;
mod error;
mod loader;
mod output;
mod pipeline;
mod selection;
mod settings;
mod types;
mod util;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use buckets::HourBandMapping;
use loader::DatasetCache;
use pipeline::PipelineOptions;
use selection::{Selection, MAX_MINOR_SELECTIONS};
use settings::Settings;
use types::RecordPreviewRow;

#[derive(Parser)]
#[command(
    name = "card_report",
    about = "Compare sales of up to three sub-categories within an industry category."
)]
struct Cli {
    /// Settings file (default: ./card_report.json if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dataset CSV to load
    #[arg(long)]
    data: Option<PathBuf>,
    /// Directory for exported tables
    #[arg(long = "output-dir")]
    output_dir: Option<PathBuf>,
    /// How hours of day map onto time bands
    #[arg(long = "hour-mapping", value_enum)]
    hour_mapping: Option<HourBandMapping>,
    /// Major category; runs one report without the menu
    #[arg(long)]
    major: Option<String>,
    /// Minor category under --major (repeat up to 3 times)
    #[arg(long = "minor", requires = "major")]
    minors: Vec<String>,
    /// Print tables without writing CSV/JSON files
    #[arg(long = "no-export")]
    no_export: bool,
}

struct App {
    settings: Settings,
    cache: DatasetCache,
    options: PipelineOptions,
}

impl App {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = settings::load_settings(cli.config.as_deref())?;
        if let Some(data) = &cli.data {
            settings.data_path = data.clone();
        }
        if let Some(dir) = &cli.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(mapping) = cli.hour_mapping {
            settings.hour_band_mapping = mapping;
        }
        if cli.no_export {
            settings.write_outputs = false;
        }
        Ok(Self {
            cache: DatasetCache::new(settings.data_path.clone()),
            options: PipelineOptions { hour_mapping: settings.hour_band_mapping },
            settings,
        })
    }
}

/// Read a single trimmed line after printing `prompt`. `None` on end of
/// input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt_back_to_menu() -> bool {
    loop {
        let Some(resp) = read_line("Back to Report Selection (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_numbered(items: &[String]) {
    for (idx, item) in items.iter().enumerate() {
        println!("[{}] {}", idx + 1, item);
    }
}

/// Option [1]: load the dataset (once) and summarize what happened.
fn handle_load(app: &App) -> anyhow::Result<()> {
    let (data, report) = app
        .cache
        .get_or_load()
        .with_context(|| format!("failed to load {}", app.cache.path().display()))?;
    println!(
        "Processing dataset... ({} rows read, {} loaded)",
        util::format_int(report.total_rows),
        util::format_int(report.loaded_rows)
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            util::format_int(report.parse_errors)
        );
    }
    if report.invalid_ages > 0 {
        println!("Note: {} unreadable ages treated as missing.", util::format_int(report.invalid_ages));
    }
    let columns: Vec<String> = loader::column_presence(data)
        .into_iter()
        .map(|(name, found)| format!("{name} ({})", if found { "found" } else { "not found" }))
        .collect();
    println!("Columns: {}", columns.join(", "));
    if !data.has_age {
        println!("Note: no age column; the age table will be skipped.");
    }
    if data.has_time_band {
        println!("Info: time-of-day bands read from the dataset's band column.");
    }
    let preview: Vec<RecordPreviewRow> =
        data.records.iter().take(app.settings.preview_rows).map(RecordPreviewRow::from).collect();
    output::preview_table("First records", &preview, app.settings.preview_rows);
    println!(
        "{} major categories available.\n",
        util::format_int(selection::major_categories(data).len())
    );
    Ok(())
}

/// Ask for a major category and up to three minors. `None` when the user
/// picked nothing usable.
fn prompt_selection(app: &App) -> anyhow::Result<Option<Selection>> {
    let data = app.cache.dataset()?;
    let majors = selection::major_categories(data);
    println!("Major categories:");
    print_numbered(&majors);
    let Some(major) = read_line("Enter choice: ")
        .and_then(|s| s.parse::<usize>().ok())
        .and_then(|n| majors.get(n.checked_sub(1)?))
    else {
        println!("Invalid choice.\n");
        return Ok(None);
    };

    let minors = selection::minor_categories(data, major);
    println!("\nMinor categories under {major} (pick up to {MAX_MINOR_SELECTIONS}, comma separated):");
    print_numbered(&minors);
    let Some(raw) = read_line("Enter choices [1]: ") else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(Selection::default_for(data, major));
    }
    let mut picked = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>().ok().and_then(|n| minors.get(n.checked_sub(1)?)) {
            Some(m) => picked.push(m.clone()),
            None => {
                println!("Invalid choice: {part}\n");
                return Ok(None);
            }
        }
    }
    Ok(Some(Selection::new(major.clone(), picked)))
}

/// Option [2]: run the pipeline for one selection, preview and export.
fn handle_generate_reports(app: &App, selection: &Selection) -> anyhow::Result<()> {
    let data = app.cache.dataset()?;
    selection.validate(data)?;

    let report = pipeline::aggregate(data, selection, &app.options);
    let rows = app.settings.preview_rows;

    println!("Selected major category: {}", selection.major);
    println!("Selected minor categories: {}\n", selection.minors.join(", "));
    output::preview_table("Monthly sales by minor category", &report.monthly, rows);
    output::preview_table("Sales by sex", &report.gender, rows);
    match &report.age {
        Some(age) => output::preview_table("Sales by age group", age, rows),
        None => println!("Sales by age group\n(skipped: no age column)\n"),
    }
    output::preview_table("Sales by weekday", &report.weekday, rows);
    output::preview_table("Sales by time of day", &report.hour, rows);

    for warning in report.warnings() {
        println!("Note: {warning}");
    }

    if app.settings.write_outputs {
        let filtered_amount: f64 = pipeline::filter_records(data, selection).iter().map(|r| r.amount).sum();
        let summary = report.summary(selection, filtered_amount);
        let files = output::write_report(&app.settings.output_dir, &report, &summary)
            .with_context(|| format!("failed to write {}", app.settings.output_dir.display()))?;
        println!("\nOutputs saved to {}:", app.settings.output_dir.display());
        for f in files {
            println!("  {}", f.display());
        }
        println!(
            "Summary: {} rows, total amount {}",
            util::format_int(summary.filtered_rows),
            util::format_number(summary.total_amount, 0)
        );
    }
    println!();
    Ok(())
}

fn run_interactive(app: &App) {
    loop {
        println!("Select an option:");
        println!("[1] Load the file");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_line("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                if let Err(e) = handle_load(app) {
                    eprintln!("Error: {e:#}\n");
                }
            }
            "2" => {
                if !app.cache.is_loaded() {
                    println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
                    continue;
                }
                println!();
                match prompt_selection(app) {
                    Ok(Some(sel)) => {
                        if let Err(e) = handle_generate_reports(app, &sel) {
                            eprintln!("Error: {e:#}\n");
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => eprintln!("Error: {e:#}\n"),
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::from_cli(&cli)?;
    let Some(major) = &cli.major else {
        run_interactive(&app);
        return Ok(());
    };
    let data = app.cache.dataset()?;
    let selection = if cli.minors.is_empty() {
        Selection::default_for(data, major)
            .ok_or_else(|| error::ReportError::InvalidSelection(format!("unknown major category '{major}'")))?
    } else {
        Selection::new(major.clone(), cli.minors.iter().cloned())
    };
    handle_generate_reports(&app, &selection)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
