use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info};

use covup::coveralls::{CiEnv, Client, Job, JobSettings, DEFAULT_ENDPOINT};
use covup::project::SourceNamer;
use covup::resolve::FileResolver;
use covup::{cli, ingest};

/// Merge Go coverage profiles and upload them to Coveralls.
#[derive(Parser)]
#[command(name = "covup", version, about)]
struct Cli {
    /// Comma-separated list of Go coverage profiles to merge.
    #[arg(long, required_unless_present = "parallel_finish")]
    coverprofile: Option<String>,

    /// Coveralls repo token.
    #[arg(long, env = "COVERALLS_TOKEN", hide_env_values = true)]
    repotoken: Option<String>,

    /// Read the repo token from a file (takes precedence over --repotoken).
    #[arg(long)]
    repotokenfile: Option<PathBuf>,

    /// Coveralls API endpoint.
    #[arg(long, env = "COVERALLS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// CI service name (default: detected from the environment).
    #[arg(long)]
    service: Option<String>,

    /// CI job ID (default: detected from the environment).
    #[arg(long)]
    jobid: Option<String>,

    /// Pull request number (default: detected from the environment).
    #[arg(long)]
    pullrequest: Option<String>,

    /// Mark this job as one of several parallel uploads.
    #[arg(long)]
    parallel: bool,

    /// Tell Coveralls all parallel jobs of this build are done, then exit.
    #[arg(long)]
    parallel_finish: bool,

    /// Flag name shown for this job in the Coveralls UI.
    #[arg(long, env = "COVERALLS_FLAG_NAME")]
    flagname: Option<String>,

    /// Prefix prepended to every reported source file name.
    #[arg(long)]
    source_prefix: Option<String>,

    /// Print the job JSON instead of uploading it.
    #[arg(long)]
    dry_run: bool,

    /// Log debug output (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Cli) -> Result<()> {
    let repo_token = match &args.repotokenfile {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read token file {}", path.display()))?
                .trim()
                .to_string(),
        ),
        None => args.repotoken.clone(),
    };

    let ci = CiEnv::from_env();
    let client = Client::new(&args.endpoint);

    if args.parallel_finish {
        let build_num = args.jobid.as_deref().or(ci.job_id.as_deref());
        print!(
            "{}",
            cli::cmd_parallel_finish(&client, repo_token.as_deref(), build_num)?
        );
        return Ok(());
    }

    let coverprofile = args
        .coverprofile
        .as_deref()
        .context("--coverprofile is required")?;

    let resolver = FileResolver::from_current_dir().context("Failed to get current directory")?;
    let namer = SourceNamer::new(resolver.work_dir().to_path_buf(), args.source_prefix.clone());
    let source_files = ingest::load_source_files(coverprofile, &resolver, &namer)?;

    let settings = JobSettings {
        repo_token,
        service_name: args.service.clone(),
        job_id: args.jobid.clone(),
        pull_request: args.pullrequest.clone(),
        parallel: args.parallel,
        flag_name: args.flagname.clone(),
    };
    let job = Job::build(&settings, &ci, source_files, Utc::now());

    if args.dry_run {
        print!("{}", cli::cmd_dry_run(&job)?);
    } else {
        info!("Uploading to {}", args.endpoint);
        print!("{}", cli::cmd_upload(&client, &job)?);
    }
    Ok(())
}
