mod apportion;
mod config;
mod error;
mod manifest;
mod materialize;
mod progress;
mod report;
mod verify;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{bytes_to_mb, BudgetConfig, FailurePolicy, Policy};
use indicatif::HumanBytes;
use progress::{
    format_duration, format_rate, MaterializeSummary, ProgressConfig, ProgressMode, ProgressReporter,
    VerifySummary,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dsbudget",
    version,
    about = "Sample a class-per-folder image dataset down to a target disk size"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select files per class to fit a size budget and copy them to the output folder
    Budget {
        source_dir: PathBuf,
        output_dir: PathBuf,

        /// Target dataset size in MB (1 MB = 1024*1024 bytes)
        #[arg(long)]
        target_mb: f64,

        /// Apportionment policy: proportional to class size, or equal per class
        #[arg(long, value_enum, default_value_t = Policy::Proportional)]
        policy: Policy,

        /// Shuffle seed for a reproducible selection. Default: random.
        #[arg(long)]
        seed: Option<u64>,

        /// On a failed copy: abort the run, or skip the file and continue
        #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
        on_error: FailurePolicy,

        /// Compute and print the selection without copying anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Write the selection as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Progress display mode: auto (TTY-aware), rich, plain, quiet.
        #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
        progress: ProgressMode,
    },

    /// List classes with their file counts and sizes
    Inspect { source_dir: PathBuf },

    /// Check that every file in the output has a same-sized source counterpart
    Verify {
        source_dir: PathBuf,
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Budget {
            source_dir,
            output_dir,
            target_mb,
            policy,
            seed,
            on_error,
            dry_run,
            report,
            progress,
        } => {
            let cfg = BudgetConfig::new(source_dir, output_dir, target_mb, policy)?
                .with_seed(seed)
                .with_failure_policy(on_error);
            run_budget(&cfg, dry_run, report, ProgressConfig::new(progress))?;
        }

        Commands::Inspect { source_dir } => {
            let manifest = manifest::build_manifest(&source_dir)
                .with_context(|| format!("failed to scan {:?}", source_dir))?;
            println!(
                "Source: {} classes={}",
                manifest.root.display(),
                manifest.num_classes()
            );
            for (name, files) in manifest.classes() {
                let bytes = manifest::class_bytes(files);
                println!(
                    "  {}: {} files, {:.2} MB",
                    name,
                    files.len(),
                    bytes_to_mb(bytes)
                );
            }
            println!(
                "Total: {} files, {:.2} MB ({})",
                manifest.file_count(),
                bytes_to_mb(manifest.total_bytes()),
                HumanBytes(manifest.total_bytes())
            );
            for skipped in &manifest.skipped {
                println!("  skipped: {} ({})", skipped.name, skipped.reason);
            }
        }

        Commands::Verify {
            source_dir,
            output_dir,
        } => {
            let summary = verify::verify_output(&source_dir, &output_dir)?;
            println!("Verify: OK");
            print_verify_summary(&summary);
        }
    }

    Ok(())
}

fn run_budget(
    cfg: &BudgetConfig,
    dry_run: bool,
    report_path: Option<PathBuf>,
    progress: ProgressConfig,
) -> Result<()> {
    let mut plan = ProgressReporter::new("plan", 0, progress);
    plan.set_stage("scan");
    let manifest = manifest::build_manifest(&cfg.source_dir)
        .with_context(|| format!("failed to scan {:?}", cfg.source_dir))?;
    for skipped in &manifest.skipped {
        plan.warn(format!("class {} skipped: {}", skipped.name, skipped.reason));
    }
    if manifest.is_empty() {
        plan.warn(format!(
            "no non-empty class directories under {:?}",
            cfg.source_dir
        ));
    }
    plan.log(format!(
        "policy={} target={} source={} classes={} files={}",
        cfg.policy.as_str(),
        HumanBytes(cfg.target_bytes),
        HumanBytes(manifest.total_bytes()),
        manifest.num_classes(),
        manifest.file_count()
    ));

    let mut rng = apportion::rng_from_seed(cfg.seed);
    let selection = apportion::apportion(&manifest, cfg.target_bytes, cfg.policy, &mut rng)
        .context("failed to apportion budget")?;
    plan.finish(format!("{} files selected", selection.total_files()));

    if let Some(path) = report_path {
        report::SelectionReport::new(&selection, &cfg.source_dir, &cfg.output_dir, cfg.seed, dry_run)
            .write(&path)?;
    }

    if dry_run {
        println!("Dry run: {} files selected, nothing copied", selection.total_files());
    } else {
        let summary = materialize::materialize(
            &selection,
            &cfg.output_dir,
            materialize::MaterializeOptions {
                on_error: cfg.on_error,
                progress,
            },
        )
        .with_context(|| format!("failed to copy selection into {:?}", cfg.output_dir))?;
        println!("Final dataset created at: {}", cfg.output_dir.display());
        print_materialize_summary(&summary);
    }

    for line in report::summary_lines(&selection) {
        println!("{}", line);
    }
    Ok(())
}

fn print_materialize_summary(summary: &MaterializeSummary) {
    println!(
        "Copy summary: output={} duration={} throughput={} bytes={} / {} files={} failed={} classes={} warnings={}",
        summary.output_dir.display(),
        format_duration(summary.elapsed),
        format_rate(summary.avg_bytes_per_sec),
        HumanBytes(summary.copied_bytes),
        HumanBytes(summary.total_bytes),
        summary.copied_files,
        summary.failed_files,
        summary.class_count,
        summary.warning_count,
    );
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
}

fn print_verify_summary(summary: &VerifySummary) {
    println!(
        "Verify summary: duration={} throughput={} checked_classes={} checked_files={} checked_bytes={}",
        format_duration(summary.elapsed),
        format_rate(summary.avg_bytes_per_sec),
        summary.checked_classes,
        summary.checked_files,
        HumanBytes(summary.checked_bytes),
    );
}
