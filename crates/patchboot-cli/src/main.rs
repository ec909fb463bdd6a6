use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use patchboot_core::{
    config, pipeline, pipeline_error_of, ComposePolicy, LaunchOptions, MappingSource,
    MismatchPolicy, PipelineRequest,
};
use serde_json::json;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PatchbootCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let code = dispatch(&cli);
    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("patchboot={level},patchboot_core={level},patchboot_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn dispatch(cli: &PatchbootCli) -> i32 {
    match &cli.command {
        Command::Run(args) => run_pipeline(cli, args),
        Command::Cache(args) => run_cache(cli, &args.command),
    }
}

fn run_pipeline(cli: &PatchbootCli, args: &RunArgs) -> i32 {
    let request = match build_request(args) {
        Ok(request) => request,
        Err(message) => {
            emit_failure(cli, "usage", &message);
            return 1;
        }
    };

    match pipeline::run(&request) {
        Ok(outcome) => {
            let child_code = outcome.exit_code;
            if cli.json {
                let payload = json!({
                    "status": "ok",
                    "derived": outcome.derived,
                    "derived_digest": outcome.derived_digest.to_hex(),
                    "cache_hit": outcome.cache_hit,
                    "exit_code": child_code,
                });
                println!("{payload}");
            } else if !cli.quiet && child_code.is_none() {
                let origin = if outcome.cache_hit { "cached" } else { "derived" };
                println!("{} ({origin})", outcome.derived.display());
            }
            child_code.unwrap_or(0)
        }
        Err(err) => {
            let (code, kind) = match pipeline_error_of(&err) {
                Some(pipeline) => (pipeline.exit_code(), pipeline.code()),
                None => (2, "failure"),
            };
            emit_failure(cli, kind, &format!("{err:#}"));
            code
        }
    }
}

fn emit_failure(cli: &PatchbootCli, kind: &str, message: &str) {
    if cli.json {
        let payload = json!({
            "status": "error",
            "code": kind,
            "message": message,
        });
        println!("{payload}");
    } else {
        eprintln!("error: {message}");
    }
}

fn build_request(args: &RunArgs) -> Result<PipelineRequest, String> {
    if args.manifest.is_none() && args.base.is_none() {
        return Err("either --manifest or --base is required".to_string());
    }

    let mut mappings = Vec::with_capacity(args.mappings.len());
    for spec in &args.mappings {
        mappings.push(parse_mapping_spec(spec)?);
    }

    let mut request = PipelineRequest::new(args.patch.clone());
    request.manifest_path = args.manifest.clone();
    request.base_path = args.base.clone();
    request.mappings = mappings;
    request.compose_policy = if args.strict_compose {
        ComposePolicy::Strict
    } else {
        ComposePolicy::IdentityPreserve
    };
    request.strict_remap = args.strict_remap;
    request.mismatch_policy = args.mismatch_policy.into();
    request.force = args.force;
    request.no_cache = args.no_cache;
    request.timeout = Duration::from_secs(args.timeout_secs);
    if !args.patch_only {
        request.launch = Some(LaunchOptions {
            java: args.java.clone(),
            main_class: args.main_class.clone(),
            args: args.args.clone(),
        });
    }
    Ok(request)
}

/// `PATH` for tiny tables (spaces come from the header), or `PATH:FROM:TO`
/// for formats that do not name their spaces.
fn parse_mapping_spec(spec: &str) -> Result<MappingSource, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [path] => Ok(MappingSource {
            path: PathBuf::from(path),
            spaces: None,
        }),
        [path, from, to] if !from.is_empty() && !to.is_empty() => Ok(MappingSource {
            path: PathBuf::from(path),
            spaces: Some(((*from).to_string(), (*to).to_string())),
        }),
        _ => Err(format!(
            "invalid mapping spec {spec:?}: expected PATH or PATH:FROM:TO"
        )),
    }
}

fn run_cache(cli: &PatchbootCli, command: &CacheSubcommand) -> i32 {
    let result = match command {
        CacheSubcommand::Path => cache_path(cli),
        CacheSubcommand::Stats => cache_stats(cli),
        CacheSubcommand::Prune(args) => cache_prune(cli, args),
    };
    match result {
        Ok(()) => 0,
        Err(err) => {
            emit_failure(cli, "failure", &format!("{err:#}"));
            2
        }
    }
}

fn cache_path(cli: &PatchbootCli) -> anyhow::Result<()> {
    let location = config::resolve_cache_root()?;
    if cli.json {
        println!(
            "{}",
            json!({ "status": "ok", "path": location.path, "source": location.source })
        );
    } else {
        println!("{}", location.path.display());
    }
    Ok(())
}

fn cache_stats(cli: &PatchbootCli) -> anyhow::Result<()> {
    let location = config::resolve_cache_root()?;
    let usage = config::compute_cache_usage(&location.path)?;
    if cli.json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "path": location.path,
                "exists": usage.exists,
                "entries": usage.total_entries,
                "bytes": usage.total_size_bytes,
            })
        );
    } else {
        println!("path:    {}", location.path.display());
        println!("entries: {}", usage.total_entries);
        println!("bytes:   {}", usage.total_size_bytes);
    }
    Ok(())
}

fn cache_prune(cli: &PatchbootCli, args: &PruneArgs) -> anyhow::Result<()> {
    let location = config::resolve_cache_root()?;
    if !args.all {
        anyhow::bail!("cache prune requires --all to confirm removing every entry");
    }
    if args.dry_run {
        let usage = config::compute_cache_usage(&location.path)?;
        if cli.json {
            println!(
                "{}",
                json!({ "status": "ok", "would_delete": usage.total_entries })
            );
        } else {
            println!("would delete {} files", usage.total_entries);
        }
        return Ok(());
    }
    let deleted = config::prune_cache(&location.path)?;
    if cli.json {
        println!("{}", json!({ "status": "ok", "deleted": deleted }));
    } else if !cli.quiet {
        println!("deleted {deleted} files");
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Patch, remap, and launch distributor-supplied server artifacts",
    after_help = "Examples:\n  patchboot run --manifest version.json --patch update.pbpb -m obf-to-named.tiny\n  patchboot run --base server.jar --patch update.pbpb --patch-only\n  patchboot cache stats"
)]
struct PatchbootCli {
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress human output (errors still print to stderr)"
    )]
    quiet: bool,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "Increase logging (-vvv reaches trace)")]
    verbose: u8,
    #[arg(long, global = true, help = "Force trace logging regardless of -v/-q")]
    trace: bool,
    #[arg(long, global = true, help = "Emit machine-readable JSON on stdout")]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(
        about = "Derive the patched, remapped artifact and hand off to it.",
        override_usage = "patchboot run --patch BUNDLE (--manifest FILE | --base JAR) [OPTIONS] [-- <ARG>...]"
    )]
    Run(RunArgs),
    #[command(about = "Inspect the patchboot cache path, stats, or prune contents.")]
    Cache(CacheArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, value_name = "BUNDLE", help = "Patch bundle to apply")]
    patch: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        help = "Version manifest describing the base artifact"
    )]
    manifest: Option<PathBuf>,
    #[arg(
        long,
        value_name = "JAR",
        help = "Explicit base artifact (skips manifest resolution)"
    )]
    base: Option<PathBuf>,
    #[arg(
        short = 'm',
        long = "mapping",
        value_name = "SPEC",
        help = "Mapping table, PATH or PATH:FROM:TO; repeat to compose in order"
    )]
    mappings: Vec<String>,
    #[arg(long, help = "Fail on unmapped members of mapped classes")]
    strict_remap: bool,
    #[arg(long, help = "Fail composition on symbols known to only one table")]
    strict_compose: bool,
    #[arg(
        long,
        value_enum,
        default_value_t = MismatchPolicyArg::Redownload,
        help = "What to do when a cached base artifact no longer verifies"
    )]
    mismatch_policy: MismatchPolicyArg,
    #[arg(long, help = "Re-derive even when a cached artifact exists")]
    force: bool,
    #[arg(long, help = "Derive to a throwaway location and publish nothing")]
    no_cache: bool,
    #[arg(long, help = "Stop after derivation instead of launching")]
    patch_only: bool,
    #[arg(long, value_name = "SECONDS", default_value_t = 120)]
    timeout_secs: u64,
    #[arg(long, value_name = "PATH", help = "Java executable for the hand-off")]
    java: Option<PathBuf>,
    #[arg(
        long,
        value_name = "CLASS",
        help = "Entry point override (dotted binary name)"
    )]
    main_class: Option<String>,
    #[arg(
        last = true,
        value_name = "ARG",
        help = "Arguments forwarded to the launched program"
    )]
    args: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum MismatchPolicyArg {
    Redownload,
    Fail,
}

impl From<MismatchPolicyArg> for MismatchPolicy {
    fn from(value: MismatchPolicyArg) -> Self {
        match value {
            MismatchPolicyArg::Redownload => Self::Redownload,
            MismatchPolicyArg::Fail => Self::Fail,
        }
    }
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    #[command(about = "Print the resolved cache directory.")]
    Path,
    #[command(about = "Report cache entry counts and total bytes.")]
    Stats,
    #[command(about = "Prune cache files (pair with --dry-run to preview).")]
    Prune(PruneArgs),
}

#[derive(Args, Debug)]
struct PruneArgs {
    #[arg(long, help = "Confirm pruning the entire cache directory")]
    all: bool,
    #[arg(long, help = "Show what would be removed without deleting files")]
    dry_run: bool,
}
