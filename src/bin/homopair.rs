use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use homopair::align::{AffineAligner, ProfileName};
use homopair::batch::{AlignReport, ResolveReport, align_batch, resolve_batch};
use homopair::config::{ConfigLoader, ResolvedConfig, ScoringSettings};
use homopair::dataset::{LocalDataset, read_fasta_sequences};
use homopair::domain::{Identifier, PairKey, ResourceKind};
use homopair::error::HomopairError;
use homopair::mirbase::MirbaseHttpClient;
use homopair::ncbi::NcbiHttpClient;
use homopair::output::{JsonOutput, LogSink, OutputMode};
use homopair::ratelimit::RateLimited;
use homopair::resolver::{Resolution, Resolver};
use homopair::scorer::{AlignmentScorer, lookup_alignment};
use homopair::store::Store;
use homopair::tair::TairHttpClient;

#[derive(Parser)]
#[command(name = "homopair")]
#[command(about = "Resolve gene and miRNA sequences and score human/Arabidopsis homolog pairs")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to ./homopair.json when present)")]
    config: Option<String>,

    #[arg(long, global = true, help = "Store directory, overrides the config file")]
    store: Option<Utf8PathBuf>,

    #[arg(long, global = true, help = "Print machine-readable JSON reports")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve sequences or names for a list of identifiers")]
    Resolve(ResolveArgs),
    #[command(about = "Score every reference gene against every comparison gene")]
    Align(AlignArgs),
    #[command(about = "Show the stored record for an identifier or a pair")]
    Show(ShowArgs),
    #[command(about = "Count stored records per namespace")]
    Status,
}

#[derive(Args)]
struct ResolveArgs {
    kind: ResourceKind,

    #[arg(long, help = "File with one identifier per line")]
    input: Utf8PathBuf,

    #[arg(long = "dataset", help = "Local dataset (FASTA or TSV, optionally gzipped); consulted in the given order")]
    datasets: Vec<Utf8PathBuf>,

    #[arg(long, help = "Keep only FASTA records whose name starts with this prefix, e.g. `ath-`")]
    organism_prefix: Option<String>,
}

#[derive(Args)]
struct AlignArgs {
    #[arg(long, help = "FASTA of reference-organism (human) genes")]
    reference: Utf8PathBuf,

    #[arg(long, help = "FASTA of comparison-organism (plant) genes")]
    comparison: Utf8PathBuf,

    #[arg(long)]
    profile: Option<ProfileName>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct ShowArgs {
    kind: ResourceKind,
    id: String,
    #[arg(help = "Comparison gene, for alignments")]
    other: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HomopairError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HomopairError) -> u8 {
    match error {
        err if err.is_config() => 2,
        HomopairError::InvalidIdentifier(_)
        | HomopairError::UnsupportedKind(_)
        | HomopairError::Dataset { .. } => 2,
        HomopairError::MirbaseHttp(_)
        | HomopairError::MirbaseStatus { .. }
        | HomopairError::TairHttp(_)
        | HomopairError::TairStatus { .. }
        | HomopairError::NcbiHttp(_)
        | HomopairError::NcbiStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    // Configuration errors stop here, before any item is processed.
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = match cli.store.as_ref().or(config.store_root.as_ref()) {
        Some(root) => Store::open(root)?,
        None => Store::new()?,
    };

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, store, &config, output_mode),
        Commands::Align(args) => run_align(args, store, &config, output_mode),
        Commands::Show(args) => run_show(args, &store, output_mode),
        Commands::Status => {
            let counts = store.counts()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_status(&counts).into_diagnostic(),
                OutputMode::Human => {
                    if let Some(root) = store.root() {
                        println!("store: {root}");
                    }
                    for (kind, count) in counts {
                        println!("{:<18} {count}", kind.namespace());
                    }
                    Ok(())
                }
            }
        }
    }
}

fn run_resolve(
    args: ResolveArgs,
    store: Store,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let ids = read_identifiers(&args.input)?;
    let datasets = args
        .datasets
        .iter()
        .map(|path| LocalDataset::load(path, args.organism_prefix.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;
    let dataset_refs: Vec<&LocalDataset> = datasets.iter().collect();

    let timeout = config.fetch_timeout;
    let window = config.rate_limit;
    let resolver = Resolver::new(store).with_tie_break(config.tie_break);
    let resolver = match args.kind {
        ResourceKind::MirnaSequence => resolver.with_fetcher(
            args.kind,
            RateLimited::new(MirbaseHttpClient::new(timeout)?, window),
        ),
        ResourceKind::TargetName => resolver.with_fetcher(
            args.kind,
            RateLimited::new(TairHttpClient::new(timeout)?, window),
        ),
        ResourceKind::TargetSequence => resolver.with_fetcher(
            args.kind,
            RateLimited::new(NcbiHttpClient::new(timeout)?, window),
        ),
        ResourceKind::Alignment => {
            return Err(HomopairError::UnsupportedKind(args.kind).into());
        }
    };

    let report = resolve_batch(&resolver, args.kind, &ids, &dataset_refs, &LogSink);
    match output_mode {
        OutputMode::Json => JsonOutput::print_resolve(&report).into_diagnostic(),
        OutputMode::Human => {
            print_resolve_summary(&report);
            Ok(())
        }
    }
}

fn run_align(
    args: AlignArgs,
    store: Store,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut scoring = match args.profile {
        Some(name) => ScoringSettings::named(name),
        None => config.scoring.clone(),
    };
    if let Some(threshold) = args.threshold {
        scoring = scoring.with_threshold(threshold)?;
    }
    let workers = args.workers.unwrap_or(config.workers).max(1);

    let reference = read_fasta_sequences(&args.reference)?;
    let comparison = read_fasta_sequences(&args.comparison)?;

    let mut aligner = AffineAligner::new(scoring.profile);
    if let Some(cells) = config.max_alignment_cells {
        aligner = aligner.with_max_cells(cells);
    }
    let scorer = AlignmentScorer::new(store, aligner, scoring.threshold)?;
    let profile_label = scoring
        .name
        .map(|name| name.to_string())
        .unwrap_or_else(|| "custom".to_string());
    tracing::info!(
        profile = %profile_label,
        threshold = scoring.threshold,
        workers,
        "aligning {} x {} genes",
        reference.len(),
        comparison.len()
    );

    let report = align_batch(&scorer, &reference, &comparison, workers, &LogSink);
    match output_mode {
        OutputMode::Json => JsonOutput::print_align(&report).into_diagnostic(),
        OutputMode::Human => {
            print_align_summary(&report);
            Ok(())
        }
    }
}

fn run_show(args: ShowArgs, store: &Store, output_mode: OutputMode) -> miette::Result<()> {
    let id: Identifier = args.id.parse()?;
    if args.kind == ResourceKind::Alignment {
        let other: Identifier = args
            .other
            .ok_or_else(|| miette::Report::msg("alignment lookups need two identifiers"))?
            .parse()?;
        let record = lookup_alignment(store, &PairKey::new(id, other))?;
        return match output_mode {
            OutputMode::Json => JsonOutput::print_alignment(&record).into_diagnostic(),
            OutputMode::Human => {
                match record {
                    None => println!("not scored yet"),
                    Some(record) => {
                        println!("latency: {:.3}s", record.latency_seconds);
                        match record.normalized_score {
                            Some(score) => println!("accepted, normalized score {score:.4}"),
                            None => println!("rejected"),
                        }
                    }
                }
                Ok(())
            }
        };
    }

    let record = Resolver::new(store.clone()).cached(&id, args.kind)?;
    match (output_mode, record) {
        (OutputMode::Json, record) => {
            JsonOutput::print_record(&record.map(Resolution::Cached)).into_diagnostic()
        }
        (OutputMode::Human, Some(value)) => {
            println!("{value}");
            Ok(())
        }
        (OutputMode::Human, None) => {
            println!("not resolved yet");
            Ok(())
        }
    }
}

fn read_identifiers(path: &Utf8PathBuf) -> miette::Result<Vec<Identifier>> {
    let content = std::fs::read_to_string(path.as_std_path())
        .map_err(|err| HomopairError::Filesystem(format!("read {path}: {err}")))?;
    let ids = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse::<Identifier>)
        .collect::<Result<Vec<Identifier>, _>>()?;
    Ok(ids)
}

fn print_resolve_summary(report: &ResolveReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}homopair resolve {} summary{reset}", report.kind);
    println!("{green}requested: {}{reset}", report.requested);
    for (tier, count) in &report.tiers {
        println!("{green}  {tier}: {count}{reset}");
    }
    println!("{yellow}failures: {}{reset}", report.failures.len());
    for failure in &report.failures {
        println!("{yellow}  {}: {}{reset}", failure.item, failure.error);
    }
}

fn print_align_summary(report: &AlignReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}homopair align summary{reset}");
    println!(
        "{green}pairs: {}  scored: {}  accepted: {}  already scored: {}{reset}",
        report.pairs, report.scored, report.accepted, report.already_scored
    );
    for pair in &report.accepted_pairs {
        println!(
            "{green}  {} ~ {}  {:.4}{reset}",
            pair.reference, pair.comparison, pair.normalized_score
        );
    }
    println!(
        "{yellow}failures: {} ({} out of memory){reset}",
        report.failures.len(),
        report.exhausted
    );
    for failure in &report.failures {
        println!("{yellow}  {}: {}{reset}", failure.item, failure.error);
    }
}
