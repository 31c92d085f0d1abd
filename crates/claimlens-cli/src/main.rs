//! ClaimLens CLI - property damage assessment pipeline
//!
//! The `claimlens` command drives assessment jobs through the pipeline and
//! inspects their persisted records.
//!
//! ## Commands
//!
//! - `run`: Run the pipeline for a new job from an input file
//! - `resume`: Re-run a stored job from its persisted input
//! - `show`: Print a job record
//! - `list`: List stored jobs
//! - `policy`: Print the effective policy as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use claimlens_core::{
    obs, AssessmentPipeline, HttpDescriptionProvider, PhotoDescriptionProvider, PipelineInput,
    PipelineResult, PolicyConfig, StaticDescriptionProvider,
};
use claimlens_state::{EstimateTier, JobId, JobStore, SurrealJobStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "claimlens")]
#[command(author = "ClaimLens Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Property damage assessment pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Policy file overriding the built-in thresholds
    #[arg(long, global = true, env = "CLAIMLENS_POLICY")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a new job
    Run {
        /// Pipeline input JSON (jobId, photos, propertyData, estimateTier)
        #[arg(short, long)]
        input: PathBuf,

        /// Replay a recorded provider response instead of calling the provider
        #[arg(long)]
        provider_fixture: Option<PathBuf>,

        /// Override the estimate tier from the input file
        #[arg(long)]
        tier: Option<EstimateTier>,

        /// Write the full pipeline result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-run a stored job from its persisted input
    Resume {
        /// Job ID to resume
        job_id: String,

        /// Replay a recorded provider response instead of calling the provider
        #[arg(long)]
        provider_fixture: Option<PathBuf>,

        /// Write the full pipeline result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a stored job record
    Show {
        /// Job ID to show
        job_id: String,

        /// Print only the final assessment
        #[arg(long)]
        final_only: bool,
    },

    /// List stored jobs
    List {
        /// Number of jobs to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Print the effective policy as TOML
    Policy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    claimlens_core::init_tracing(cli.json, level);

    let policy = load_policy(cli.config.as_deref())?;

    if let Commands::Policy = cli.command {
        return cmd_policy(&policy);
    }

    let store: Arc<dyn JobStore> = Arc::new(
        SurrealJobStore::from_env()
            .await
            .context("Failed to connect to ClaimLens database")?,
    );

    match cli.command {
        Commands::Run {
            input,
            provider_fixture,
            tier,
            output,
        } => {
            let provider = build_provider(provider_fixture.as_deref())?;
            cmd_run(store, provider, policy, &input, tier, output.as_deref()).await
        }
        Commands::Resume {
            job_id,
            provider_fixture,
            output,
        } => {
            let provider = build_provider(provider_fixture.as_deref())?;
            cmd_resume(store, provider, policy, &job_id, output.as_deref()).await
        }
        Commands::Show { job_id, final_only } => cmd_show(store.as_ref(), &job_id, final_only).await,
        Commands::List { limit } => cmd_list(store.as_ref(), limit).await,
        Commands::Policy => cmd_policy(&policy),
    }
}

fn load_policy(path: Option<&Path>) -> Result<PolicyConfig> {
    match path {
        Some(path) => PolicyConfig::load(path)
            .with_context(|| format!("Failed to load policy from {}", path.display())),
        None => Ok(PolicyConfig::default()),
    }
}

fn build_provider(fixture: Option<&Path>) -> Result<Arc<dyn PhotoDescriptionProvider>> {
    match fixture {
        Some(path) => {
            let provider = StaticDescriptionProvider::from_file(path)
                .with_context(|| format!("Failed to load provider fixture {}", path.display()))?;
            Ok(Arc::new(provider))
        }
        None => {
            let provider = HttpDescriptionProvider::from_env()
                .context("Provider not configured; set CLAIMLENS_PROVIDER_URL or pass --provider-fixture")?;
            Ok(Arc::new(provider))
        }
    }
}

/// Read a pipeline input file, assigning a fresh job ID when none is given.
fn read_input(path: &Path, tier: Option<EstimateTier>) -> Result<PipelineInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let mut value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Input file {} is not valid JSON", path.display()))?;

    if let Some(obj) = value.as_object_mut() {
        obj.entry("jobId")
            .or_insert_with(|| Value::String(JobId::new().0));
    }

    let mut input: PipelineInput =
        serde_json::from_value(value).context("Input file does not describe a pipeline input")?;
    if tier.is_some() {
        input.estimate_tier = tier;
    }
    Ok(input)
}

/// Run the pipeline for a new job
async fn cmd_run(
    store: Arc<dyn JobStore>,
    provider: Arc<dyn PhotoDescriptionProvider>,
    policy: PolicyConfig,
    input_path: &Path,
    tier: Option<EstimateTier>,
    output: Option<&Path>,
) -> Result<()> {
    let input = read_input(input_path, tier)?;
    info!(job_id = %input.job_id, "Starting assessment job");

    let pipeline = AssessmentPipeline::new(store, provider, policy);
    let result = pipeline.run(input).await.context("Pipeline run failed")?;
    report(&result, output)
}

/// Re-run a stored job from its persisted input
async fn cmd_resume(
    store: Arc<dyn JobStore>,
    provider: Arc<dyn PhotoDescriptionProvider>,
    policy: PolicyConfig,
    job_id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let job_id = JobId::from(job_id);
    info!(job_id = %job_id, "Resuming assessment job");

    let pipeline = AssessmentPipeline::new(store, provider, policy);
    let result = pipeline
        .resume(&job_id)
        .await
        .with_context(|| format!("Failed to resume job {}", job_id))?;
    report(&result, output)
}

fn report(result: &PipelineResult, output: Option<&Path>) -> Result<()> {
    let _span = obs::JobSpan::enter(result.job_id.as_str());
    if let Some(path) = output {
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write result to {}", path.display()))?;
        println!("Result written to {}", path.display());
    }

    println!("Job:        {}", result.job_id);
    println!("Stages run: {}", result.stage_outputs.len());
    println!("Time:       {} ms", result.processing_time_ms);

    if !result.is_complete() {
        let message = result.error.as_deref().unwrap_or("unknown error");
        println!("Status:     FAILED");
        bail!("Job {} failed: {}", result.job_id, message);
    }

    println!("Status:     COMPLETE");
    if let Some(confidence) = result.confidence_score {
        println!("Confidence: {:.2}", confidence);
    }
    if let Some(total) = result
        .final_assessment
        .as_ref()
        .and_then(|f| f.grand_total())
    {
        println!("Total:      ${:.2}", total);
    }
    Ok(())
}

/// Print a stored job record
async fn cmd_show(store: &dyn JobStore, job_id: &str, final_only: bool) -> Result<()> {
    let record = store
        .get_job(&JobId::from(job_id))
        .await
        .with_context(|| format!("Failed to load job {}", job_id))?;

    let json = if final_only {
        match &record.final_assessment {
            Some(value) => serde_json::to_string_pretty(value)?,
            None => bail!("Job {} has no final assessment ({})", job_id, record.status),
        }
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{}", json);
    Ok(())
}

/// List stored jobs, most recently updated first
async fn cmd_list(store: &dyn JobStore, limit: usize) -> Result<()> {
    let mut jobs = store.list_jobs().await.context("Failed to list jobs")?;
    jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!(
        "{:<38} {:<18} {:<9} {:>10}  UPDATED",
        "JOB", "STATUS", "TIER", "CONFIDENCE"
    );
    for job in jobs.iter().take(limit) {
        let confidence = job
            .confidence_score
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<18} {:<9} {:>10}  {}",
            job.job_id.as_str(),
            job.status.as_str(),
            job.estimate_tier.as_str(),
            confidence,
            job.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Print the effective policy as TOML
fn cmd_policy(policy: &PolicyConfig) -> Result<()> {
    let text = policy
        .to_toml_string()
        .context("Failed to render policy")?;
    print!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimlens_state::fakes::MemoryJobStore;
    use claimlens_state::JobStatus;
    use serde_json::json;

    const PROVIDER_FIXTURE: &str =
        include_str!("../../claimlens-core/tests/fixtures/assessment.json");

    fn write_inputs(dir: &Path, input: Value) -> (PathBuf, PathBuf) {
        let input_path = dir.join("input.json");
        std::fs::write(&input_path, input.to_string()).unwrap();
        let fixture_path = dir.join("provider.json");
        std::fs::write(&fixture_path, PROVIDER_FIXTURE).unwrap();
        (input_path, fixture_path)
    }

    fn input_json(job_id: &str) -> Value {
        json!({
            "jobId": job_id,
            "photos": [
                {"id": "p1", "url": "https://blob/p1.jpg", "fileName": "p1.jpg"},
                {"id": "p2", "url": "https://blob/p2.jpg", "fileName": "p2.jpg"},
                {"id": "p3", "url": "https://blob/p3.jpg", "fileName": "p3.jpg"}
            ],
            "propertyData": {"address": "1420 Westheimer Rd", "type": "single_family", "zipCode": "77002"}
        })
    }

    #[tokio::test]
    async fn test_run_with_fixture_completes_job() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (input, fixture) = write_inputs(temp_dir.path(), input_json("cli-job-1"));
        let output = temp_dir.path().join("result.json");

        let store = Arc::new(MemoryJobStore::new());
        let provider = build_provider(Some(&fixture)).unwrap();
        let result = cmd_run(
            store.clone(),
            provider,
            PolicyConfig::default(),
            &input,
            Some(EstimateTier::Premium),
            Some(&output),
        )
        .await;
        assert!(result.is_ok(), "Run failed: {:?}", result.err());

        let record = store.get_job(&JobId::from("cli-job-1")).await.unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.estimate_tier, EstimateTier::Premium);
        assert!(record.final_assessment.is_some());

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["jobId"], "cli-job-1");
        assert_eq!(written["status"], "complete");
    }

    #[tokio::test]
    async fn test_run_assigns_job_id_when_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut input = input_json("unused");
        input.as_object_mut().unwrap().remove("jobId");
        let (input, fixture) = write_inputs(temp_dir.path(), input);

        let store = Arc::new(MemoryJobStore::new());
        let provider = build_provider(Some(&fixture)).unwrap();
        cmd_run(store.clone(), provider, PolicyConfig::default(), &input, None, None)
            .await
            .unwrap();

        let jobs = store.list_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(!jobs[0].job_id.as_str().is_empty());
        assert_eq!(jobs[0].estimate_tier, EstimateTier::Standard);
    }

    #[tokio::test]
    async fn test_failed_run_returns_error_and_records_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (input, _) = write_inputs(temp_dir.path(), input_json("cli-job-2"));

        let store = Arc::new(MemoryJobStore::new());
        let provider: Arc<dyn PhotoDescriptionProvider> =
            Arc::new(StaticDescriptionProvider::failing("provider offline"));
        let result = cmd_run(
            store.clone(),
            provider,
            PolicyConfig::default(),
            &input,
            None,
            None,
        )
        .await;
        assert!(result.is_err());

        let record = store.get_job(&JobId::from("cli-job-2")).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error_message.is_some());
    }

    #[tokio::test]
    async fn test_resume_reruns_stored_job() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (input, fixture) = write_inputs(temp_dir.path(), input_json("cli-job-3"));

        let store = Arc::new(MemoryJobStore::new());
        let failing: Arc<dyn PhotoDescriptionProvider> =
            Arc::new(StaticDescriptionProvider::failing("timeout"));
        assert!(
            cmd_run(store.clone(), failing, PolicyConfig::default(), &input, None, None)
                .await
                .is_err()
        );

        let provider = build_provider(Some(&fixture)).unwrap();
        cmd_resume(store.clone(), provider, PolicyConfig::default(), "cli-job-3", None)
            .await
            .unwrap();

        let record = store.get_job(&JobId::from("cli-job-3")).await.unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn test_show_and_list_missing_job() {
        let store = MemoryJobStore::new();
        assert!(cmd_show(&store, "nope", false).await.is_err());
        assert!(cmd_list(&store, 10).await.is_ok());
    }

    #[test]
    fn test_read_input_rejects_non_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("input.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_input(&path, None).is_err());
    }

    #[test]
    fn test_load_policy_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("policy.toml");
        std::fs::write(
            &path,
            "fallback_zip_code = \"90001\"\n\n[costing]\ntier_comparison = \"recompute\"\n",
        )
        .unwrap();

        let policy = load_policy(Some(&path)).unwrap();
        assert_eq!(policy.fallback_zip_code, "90001");
        assert!(cmd_policy(&policy).is_ok());
        assert_eq!(load_policy(None).unwrap(), PolicyConfig::default());
    }

    #[test]
    fn test_demo_policy_is_valid() {
        let policy = PolicyConfig::from_toml_str(include_str!("../../../demos/policy.toml")).unwrap();
        assert_eq!(policy.fraud.severe_ratio_points, 20.0);
        assert_eq!(
            policy.costing.tier_comparison,
            claimlens_core::TierComparisonMode::Recompute
        );
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "claimlens",
            "--json",
            "run",
            "--input",
            "job.json",
            "--tier",
            "economy",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run { tier, input, .. } => {
                assert_eq!(tier, Some(EstimateTier::Economy));
                assert_eq!(input, PathBuf::from("job.json"));
            }
            _ => panic!("expected run command"),
        }
    }
}
