mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use common::{parse_seeds, split_csv};
use logic::{CheckResult, PlaythroughPlan, price_build, run_playthrough, validate_catalogue};
use sigilbuild_engine::{BoostRelease, BuildDocument, Catalogue, CommandPolicy, from_json_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    /// Check catalogue content for data errors
    Validate,
    /// Price saved build documents
    Balance,
    /// Seeded random playthroughs checking engine invariants
    Playthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReleaseMode {
    /// Keep over-cap picks when a boost is switched off
    Retain,
    /// Trim over-cap picks when a boost is switched off
    Trim,
}

impl From<ReleaseMode> for BoostRelease {
    fn from(mode: ReleaseMode) -> Self {
        match mode {
            ReleaseMode::Retain => Self::Retain,
            ReleaseMode::Trim => Self::Trim,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sigilbuild-tester", version = "0.1.0")]
#[command(about = "QA harness for the Sigilbuild configurator engine")]
struct Args {
    /// What to check
    #[arg(long, value_enum, default_value_t = TestMode::Validate)]
    mode: TestMode,

    /// Catalogue JSON to load instead of the builtin catalogue
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Build documents to price (comma-separated paths, balance mode)
    #[arg(long)]
    build: Option<String>,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Commands per playthrough
    #[arg(long, default_value_t = 200)]
    steps: usize,

    /// Boost release policy used by playthroughs
    #[arg(long, value_enum, default_value_t = ReleaseMode::Retain)]
    boost_release: ReleaseMode,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == "console" {
        announce_banner();
    }

    let start_time = Instant::now();
    let catalogue = load_catalogue(args.catalogue.as_deref())?;
    let results = match args.mode {
        TestMode::Validate => vec![validate_catalogue(&catalogue)],
        TestMode::Balance => run_balance(&args, &catalogue)?,
        TestMode::Playthrough => run_playthroughs(&args, &catalogue)?,
    };

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn announce_banner() {
    println!("{}", "🔮 Sigilbuild Tester".bright_cyan().bold());
    println!("{}", "====================".cyan());
}

fn load_catalogue(path: Option<&Path>) -> Result<Catalogue> {
    let Some(path) = path else {
        return Ok(Catalogue::builtin().clone());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalogue {}", path.display()))?;
    Catalogue::from_json(&text)
        .with_context(|| format!("failed to parse catalogue {}", path.display()))
}

fn load_document(path: &Path) -> Result<BuildDocument> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read build {}", path.display()))?;
    from_json_str(&text).with_context(|| format!("failed to parse build {}", path.display()))
}

fn run_balance(args: &Args, catalogue: &Catalogue) -> Result<Vec<CheckResult>> {
    let paths = args.build.as_deref().map(split_csv).unwrap_or_default();
    if paths.is_empty() {
        anyhow::bail!("balance mode needs --build <path>[,<path>...]");
    }
    paths
        .iter()
        .map(|raw| {
            let path = PathBuf::from(raw);
            let document = load_document(&path)?;
            let name = path
                .file_stem()
                .map_or_else(|| raw.clone(), |stem| stem.to_string_lossy().into_owned());
            Ok(price_build(&name, &document, catalogue, args.verbose))
        })
        .collect()
}

fn run_playthroughs(args: &Args, catalogue: &Catalogue) -> Result<Vec<CheckResult>> {
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    // Playthroughs import weapons from the first build's saved sub-builds.
    let reference = match args.build.as_deref().map(split_csv).unwrap_or_default().first() {
        Some(path) => load_document(Path::new(path))?.reference,
        None => sigilbuild_engine::ReferenceCatalogue::default(),
    };
    let policy = CommandPolicy {
        boost_release: args.boost_release.into(),
    };

    let mut results = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if args.verbose {
            println!("🧪 Playthrough seed {seed} ({} steps)", args.steps);
        }
        let plan = PlaythroughPlan {
            seed,
            steps: args.steps,
            policy,
        };
        results.push(run_playthrough(catalogue, &reference, plan, args.verbose));
    }
    Ok(results)
}

fn write_reports(args: &Args, results: &[CheckResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => logic::reports::generate_markdown_report(&mut output_target, results)?,
        _ => {
            logic::reports::generate_console_report(
                &mut output_target,
                results,
                start_time.elapsed(),
            )?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
