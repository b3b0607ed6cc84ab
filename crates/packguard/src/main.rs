//! packguard CLI: resolve a plan against checklists, simulate the install
//! of the given package descriptors, and report check violations.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use packguard_core::checks::register_builtins;
use packguard_core::{CheckRegistry, CheckWrapper, ScanEngine, StagedPackages};
use packguard_types::{InstallHookPolicy, PlanFile, Severity};

mod loader;
mod package_file;
mod render;

use loader::{load_checklists, load_plan, plan_scan, resolve_package_source, LoadedPlan};
use package_file::JsonArchiveOpener;

#[derive(Parser)]
#[command(name = "packguard")]
#[command(about = "Simulated content-package install scanning", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan package descriptors against the plan's effective checks.
    Scan(ScanArgs),

    /// Print the effective check list resolved from the plan.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct ScanArgs {
    /// Path to a plan file. When omitted, an empty plan is used.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Checklist file to make discoverable (repeatable). The plan's
    /// `checklists` patterns decide which of these actually activate.
    #[arg(long = "checklist", action = clap::ArgAction::Append)]
    checklists: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print violation-free reports too.
    #[arg(long)]
    all: bool,

    /// Lowest severity that fails the scan.
    #[arg(long, value_enum, default_value_t = FailOnArg::Major)]
    fail_on: FailOnArg,

    /// Override the plan's install hook policy.
    #[arg(long, value_enum)]
    hook_policy: Option<HookPolicyArg>,

    /// Package descriptor files to scan, in order. Use '-' to read one
    /// descriptor from stdin.
    #[arg(required = true)]
    packages: Vec<String>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Path to a plan file. When omitted, an empty plan is used.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Checklist file to make discoverable (repeatable).
    #[arg(long = "checklist", action = clap::ArgAction::Append)]
    checklists: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailOnArg {
    Minor,
    Major,
    Severe,
    Never,
}

impl FailOnArg {
    fn threshold(self) -> Option<Severity> {
        match self {
            FailOnArg::Minor => Some(Severity::Minor),
            FailOnArg::Major => Some(Severity::Major),
            FailOnArg::Severe => Some(Severity::Severe),
            FailOnArg::Never => None,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HookPolicyArg {
    Prohibit,
    Report,
    Abort,
    Skip,
}

impl From<HookPolicyArg> for InstallHookPolicy {
    fn from(value: HookPolicyArg) -> Self {
        match value {
            HookPolicyArg::Prohibit => InstallHookPolicy::Prohibit,
            HookPolicyArg::Report => InstallHookPolicy::Report,
            HookPolicyArg::Abort => InstallHookPolicy::Abort,
            HookPolicyArg::Skip => InstallHookPolicy::Skip,
        }
    }
}

fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(2)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<u8>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Scan(args) => cmd_scan(args),
        Commands::Plan(args) => {
            cmd_plan(args)?;
            Ok(0)
        }
    }
}

fn load_plan_or_default(path: Option<&PathBuf>) -> Result<LoadedPlan> {
    match path {
        Some(path) => load_plan(path),
        None => Ok(LoadedPlan {
            plan: PlanFile::default(),
            base_dir: PathBuf::from("."),
        }),
    }
}

fn cmd_scan(args: ScanArgs) -> Result<u8> {
    let LoadedPlan { plan, base_dir } = load_plan_or_default(args.plan.as_ref())?;
    let checklists = load_checklists(&args.checklists)?;
    let (planner, init_stages) = plan_scan(&plan, checklists)?;
    let effective = planner.effective_checks(&plan.checks)?;
    info!(checks = effective.len(), "resolved effective check list");

    let mut registry = CheckRegistry::new();
    register_builtins(&mut registry);
    let wrappers: Vec<CheckWrapper> = effective
        .iter()
        .map(|spec| registry.create(spec))
        .collect::<Result<_>>()?;

    let pre_install: Vec<PathBuf> = plan
        .pre_install_urls
        .iter()
        .map(|source| resolve_package_source(&base_dir, source))
        .collect();

    // stdin input is staged as a scoped temp file for the scan's duration
    let staged = if args.packages.iter().any(|p| p == "-") {
        Some(
            StagedPackages::stage(vec![("stdin.json".to_string(), std::io::stdin().lock())])
                .context("stage package descriptor from stdin")?,
        )
    } else {
        None
    };
    let packages: Vec<PathBuf> = args
        .packages
        .iter()
        .map(|source| match (source.as_str(), &staged) {
            ("-", Some(staged)) => staged.paths()[0].clone(),
            _ => PathBuf::from(source),
        })
        .collect();

    let hook_policy = args
        .hook_policy
        .map(InstallHookPolicy::from)
        .or(plan.install_hook_policy)
        .unwrap_or_default();

    let mut engine = ScanEngine::builder(Box::new(JsonArchiveOpener))
        .with_wrapped_checks(wrappers)
        .with_init_stages(init_stages)
        .with_pre_install_packages(pre_install)
        .with_hook_policy(hook_policy)
        .with_pre_install_hooks_enabled(plan.enable_pre_install_hooks)
        .build();

    let reports = match engine.scan(&packages) {
        Ok(reports) => reports,
        Err(error) => {
            eprintln!("scan aborted: {error}");
            if let Some(package) = error.package() {
                eprintln!("  offending package: {}", package.display());
            }
            return Ok(2);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => {
            out.write_all(render::render_text(&reports, args.all).as_bytes())?
        }
        OutputFormat::Json => {
            out.write_all(render::render_json(&reports)?.as_bytes())?;
            out.write_all(b"\n")?;
        }
    }

    let failed = match args.fail_on.threshold() {
        Some(threshold) => render::worst_severity(&reports)
            .is_some_and(|worst| worst.at_least(threshold)),
        None => false,
    };
    Ok(if failed { 1 } else { 0 })
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let LoadedPlan { plan, .. } = load_plan_or_default(args.plan.as_ref())?;
    let checklists = load_checklists(&args.checklists)?;
    let (planner, _) = plan_scan(&plan, checklists)?;
    let effective = planner.effective_checks(&plan.checks)?;

    println!("{}", serde_json::to_string_pretty(&effective)?);
    Ok(())
}

/// Initialize tracing/logging based on CLI flags.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("packguard={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_on_threshold_mapping() {
        assert_eq!(FailOnArg::Minor.threshold(), Some(Severity::Minor));
        assert_eq!(FailOnArg::Never.threshold(), None);
    }

    #[test]
    fn cli_parses_scan_invocation() {
        let cli = Cli::parse_from([
            "packguard",
            "scan",
            "--plan",
            "plan.json",
            "--checklist",
            "basic.json",
            "--fail-on",
            "severe",
            "pkg.json",
        ]);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.plan.as_deref(), Some(std::path::Path::new("plan.json")));
                assert_eq!(args.checklists.len(), 1);
                assert!(matches!(args.fail_on, FailOnArg::Severe));
                assert_eq!(args.packages, vec!["pkg.json".to_string()]);
            }
            _ => panic!("expected scan command"),
        }
    }
}
