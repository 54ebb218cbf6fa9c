use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fundcorr::{
    align::{align, align_all, AlignedFrame, DateRange},
    catalog::Catalog,
    correlation::correlate,
    error::AnalysisError,
    export::write_parquet,
    features::{country_index, feature_series, instrument_pair, ValueField},
    heatmap::render_heatmaps,
    process::{date_parser::parse_partial_date, Timeframe},
    prompt::prompt_until,
    series::Series,
    store::DataStore,
};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_HEATMAP_DIR: &str = "heatmaps";

#[derive(Parser, Debug)]
#[command(author, version, about = "Correlate historical prices of financial instruments")]
struct Cli {
    /// Directory holding one `<identifier>.csv` per instrument
    #[arg(long, global = true, default_value = "investing_data")]
    data_dir: PathBuf,

    /// YAML catalog used instead of the built-in instrument list
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Defaults to an interactive `correlate`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correlate one field of two instruments over a date window
    Correlate(CorrelateArgs),
    /// List catalog instruments and whether their data is present
    List,
    /// Build the aligned feature table of a currency
    Features(FeaturesArgs),
}

#[derive(clap::Args, Debug, Default)]
struct CorrelateArgs {
    /// Display name of the first instrument (prompted when absent)
    #[arg(long)]
    first: Option<String>,

    /// Display name of the second instrument (prompted when absent)
    #[arg(long)]
    second: Option<String>,

    /// Field to correlate: open, high, low, close, mean or diff
    #[arg(long)]
    column: Option<ValueField>,

    /// Window start, YYYY[-MM[-DD]]
    #[arg(long)]
    start: Option<String>,

    /// Window end, YYYY[-MM[-DD]]
    #[arg(long)]
    end: Option<String>,

    /// Bar size, 1d or 1w
    #[arg(long, default_value = "1d")]
    timeframe: Timeframe,

    /// Where the SVG heatmaps go
    #[arg(long)]
    heatmap_dir: Option<PathBuf>,

    /// Skip heatmap rendering
    #[arg(long)]
    no_heatmap: bool,

    /// Print the coefficients as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct FeaturesArgs {
    /// Currency code, e.g. USD or EUR
    #[arg(long)]
    country: String,

    #[arg(long, default_value = "close")]
    column: ValueField,

    #[arg(long, default_value = "1d")]
    timeframe: Timeframe,

    #[arg(long, default_value = "2010-01-01")]
    start: String,

    #[arg(long, default_value = "2020-01-01")]
    end: String,

    /// Append the currency's synthetic index as a column
    #[arg(long)]
    with_index: bool,

    /// Write the aligned table to this Parquet file
    #[arg(long)]
    parquet: Option<PathBuf>,

    /// Where the SVG heatmaps go
    #[arg(long, default_value = DEFAULT_HEATMAP_DIR)]
    heatmap_dir: PathBuf,

    /// Skip heatmap rendering
    #[arg(long)]
    no_heatmap: bool,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) configuration ────────────────────────────────────────────
    let cli = Cli::parse();
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_yaml_file(path)?,
        None => Catalog::builtin().clone(),
    };
    let store = DataStore::new(&cli.data_dir);
    info!(data_dir = %cli.data_dir.display(), instruments = catalog.instruments.len(), "startup");

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match cli.command.unwrap_or(Command::Correlate(CorrelateArgs::default())) {
        Command::Correlate(args) => run_correlate(&store, &catalog, args),
        Command::List => run_list(&store, &catalog),
        Command::Features(args) => run_features(&store, &catalog, args),
    }
}

fn parse_bound(s: &str) -> Result<NaiveDate, AnalysisError> {
    parse_partial_date(s).ok_or_else(|| AnalysisError::InvalidDate(s.to_string()))
}

/// Flag value if given, otherwise the interactive answer.
fn flag_or_prompt<T, R: BufRead, W: Write>(
    flag: Option<&str>,
    input: &mut R,
    output: &mut W,
    question: &str,
    default: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T> {
    match flag {
        Some(value) => parse(value).map_err(anyhow::Error::msg),
        None => prompt_until(input, output, question, default, parse),
    }
}

fn run_correlate(store: &DataStore, catalog: &Catalog, args: CorrelateArgs) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    if args.first.is_none() || args.second.is_none() {
        writeln!(output, "Available features:")?;
        for name in catalog.names() {
            writeln!(output, "  {}", name)?;
        }
    }

    // 1) gather the request
    let resolve = |s: &str| {
        catalog
            .resolve(s)
            .map(str::to_string)
            .map_err(|e| e.to_string())
    };
    let first = flag_or_prompt(
        args.first.as_deref(),
        &mut input,
        &mut output,
        "Please select the first feature",
        "usd index",
        &resolve,
    )?;
    let second = flag_or_prompt(
        args.second.as_deref(),
        &mut input,
        &mut output,
        "Please select the second feature",
        "us wheat",
        &resolve,
    )?;
    let field = match args.column {
        Some(field) => field,
        None => prompt_until(
            &mut input,
            &mut output,
            "Which column should be correlated (open, high, low, close)",
            "high",
            |s| s.parse::<ValueField>(),
        )?,
    };
    let bound = |s: &str| parse_bound(s).map_err(|e| e.to_string());
    let start = flag_or_prompt(
        args.start.as_deref(),
        &mut input,
        &mut output,
        "Start date (YYYY-MM-DD)",
        "2010-01-01",
        &bound,
    )?;
    let end = flag_or_prompt(
        args.end.as_deref(),
        &mut input,
        &mut output,
        "End date (YYYY-MM-DD)",
        "2020-01-01",
        &bound,
    )?;
    let range = DateRange::new(start, end);

    // 2) load and align
    let (a, b) = instrument_pair(store, &first, &second, field, args.timeframe)?;
    let frame = match align(&a, &b, range) {
        Ok(frame) => frame,
        Err(e) if e.is_recoverable() => {
            writeln!(output, "{}", e)?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(rows = frame.len(), range = %frame.range(), "aligned");

    // 3) correlate; each side is a single-column series
    let col_a = a.column_names().concat();
    let col_b = b.column_names().concat();
    match correlate(&frame, &col_a, &col_b) {
        Ok(result) if args.json => writeln!(output, "{}", serde_json::to_string_pretty(&result)?)?,
        Ok(result) => writeln!(output, "{}", result)?,
        Err(e) if e.is_recoverable() => writeln!(output, "{}", e)?,
        Err(e) => return Err(e.into()),
    }

    // 4) heatmaps
    if !args.no_heatmap {
        let dir = args
            .heatmap_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HEATMAP_DIR));
        report_heatmaps(&frame, &dir, &mut output)?;
    }
    Ok(())
}

fn report_heatmaps<W: Write>(
    frame: &AlignedFrame,
    dir: &Path,
    output: &mut W,
) -> Result<()> {
    for (_, path) in render_heatmaps(frame, dir)? {
        writeln!(output, "heatmap written to {}", path.display())?;
    }
    Ok(())
}

fn run_list(store: &DataStore, catalog: &Catalog) -> Result<()> {
    let available = store.available()?;
    if available.is_empty() {
        warn!(dir = %store.dir().display(), "no instrument data found");
    }
    for (name, id) in &catalog.instruments {
        let status = if available.contains(id) { "" } else { "  (missing)" };
        println!("{:<20} {}{}", name, id, status);
    }
    Ok(())
}

fn run_features(store: &DataStore, catalog: &Catalog, args: FeaturesArgs) -> Result<()> {
    let range = DateRange::parse(&args.start, &args.end)?;
    let code = args.country.trim().to_uppercase();

    let mut series = feature_series(store, catalog, &code, args.column, args.timeframe)?;
    if args.with_index {
        let index = country_index(store, &code, args.timeframe)?
            .select(&[args.column.header()], "country index")?
            .with_suffix(&format!("{} index", code));
        series.push(index);
    }

    let refs: Vec<&Series> = series.iter().collect();
    let frame = match align_all(&refs, range) {
        Ok(frame) => frame,
        Err(e) if e.is_recoverable() => {
            println!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "{} feature table: {} rows x {} columns over {}",
        code,
        frame.len(),
        frame.columns().len(),
        frame.range()
    );

    if let Some(path) = &args.parquet {
        let bytes = write_parquet(frame.as_series(), path)?;
        println!("wrote {} ({} bytes)", path.display(), bytes);
    }
    if !args.no_heatmap {
        report_heatmaps(&frame, &args.heatmap_dir, &mut io::stdout())?;
    }
    Ok(())
}
