use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wan_orchestrator::config::{GenerationConfig, OrchestratorConfig, PromptExtendConfig};
use wan_orchestrator::dashboard::{run_dashboard, DashboardState};
use wan_orchestrator::generation::{
    run_generation, GenerationCommand, GenerationRequest, PerfTier, PreprocessOptions,
    SampleSolver, TaskKind,
};
use wan_orchestrator::gpu::{discover_gpu_count, query_gpu_info};
use wan_orchestrator::scheduler::{GpuStrategy, JobCoordinator, JobResult};
use wan_orchestrator::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "wan-orchestrator")]
#[command(version)]
#[command(about = "GPU queue and process orchestrator for Wan2.2 video generation")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the GPUs visible to nvidia-smi
    Gpus {
        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },

    /// Run one generation through the GPU queue
    Run(RunArgs),

    /// Serve the HTTP job API
    Serve(ServeArgs),
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Shared Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct GenerationArgs {
    /// Wan2.2 repository root (contains generate.py)
    #[arg(long, env = "WAN2_2_REPO", default_value = "./Wan2.2")]
    repo: PathBuf,

    /// Directory holding the model checkpoints
    #[arg(long, env = "MODELS_PATH", default_value = "/opt/huggingface")]
    models_path: PathBuf,

    /// Where generated videos are written
    #[arg(long, env = "OUTPUT_PATH", default_value = "./output")]
    output_path: PathBuf,

    /// Interpreter for single-GPU runs
    #[arg(long, default_value = "python3")]
    python: String,

    /// Distributed launcher for multi-GPU runs
    #[arg(long, default_value = "torchrun")]
    launcher: String,

    /// Prompt extension method
    #[arg(long, env = "PROMPT_EXTEND_METHOD", default_value = "openai")]
    prompt_extend_method: String,

    /// Prompt extension target language
    #[arg(long, env = "PROMPT_EXTEND_LANG", default_value = "en")]
    prompt_extend_lang: String,

    /// Prompt extension model; extension is disabled when unset
    #[arg(long, env = "PROMPT_EXTEND_MODEL")]
    prompt_extend_model: Option<String>,
}

impl GenerationArgs {
    fn into_config(self) -> std::io::Result<GenerationConfig> {
        let config = GenerationConfig {
            repo_root: self.repo,
            models_path: self.models_path,
            output_root: self.output_path,
            python: self.python,
            launcher: self.launcher,
            prompt_extend: PromptExtendConfig {
                method: self.prompt_extend_method,
                target_lang: self.prompt_extend_lang,
                model: self.prompt_extend_model,
            },
        };
        Ok(config.resolved_against(&std::env::current_dir()?))
    }
}

#[derive(Parser, Debug)]
struct QueueArgs {
    /// Override the discovered GPU count
    #[arg(long, env = "WAN_TOTAL_GPUS")]
    total_gpus: Option<u32>,

    /// Interval between process checks, in milliseconds
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,

    /// Seconds a process gets to exit after SIGTERM
    #[arg(long, default_value = "10")]
    grace_period_secs: u64,
}

impl QueueArgs {
    fn config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_grace_period(Duration::from_secs(self.grace_period_secs));
        config.total_gpus = self.total_gpus;
        config
    }
}

async fn build_coordinator(config: &OrchestratorConfig) -> JobCoordinator {
    let total = match config.total_gpus {
        Some(total) => total,
        None => discover_gpu_count().await,
    };
    tracing::info!(total_gpus = total, "GPU pool ready");
    JobCoordinator::new(total, config)
}

// =============================================================================
// Run Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct RunArgs {
    /// Generation task
    #[arg(long, short = 't')]
    task: TaskKind,

    /// Text prompt
    #[arg(long, short = 'p')]
    prompt: String,

    /// Number of GPUs to request
    #[arg(long, short = 'g', default_value = "1")]
    gpus: u32,

    /// GPU allocation strategy
    #[arg(long, default_value = "auto")]
    strategy: GpuStrategy,

    /// Timeout in seconds
    #[arg(long, default_value = "7200")]
    timeout: u64,

    /// Output resolution, e.g. 1280*720
    #[arg(long)]
    size: Option<String>,

    /// Sampling steps
    #[arg(long)]
    steps: Option<u32>,

    #[arg(long, default_value = "unipc")]
    solver: SampleSolver,

    /// Seed; negative picks one at random
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    seed: i64,

    /// Clip length in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Reference image (i2v, s2v, animate)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Driving audio (s2v)
    #[arg(long)]
    audio: Option<PathBuf>,

    #[arg(long, default_value = "quality")]
    perf_tier: PerfTier,

    /// TeaCache threshold for the speed tier (default 0.25)
    #[arg(long)]
    teacache_threshold: Option<f64>,

    /// Already preprocessed animate inputs
    #[arg(long, conflicts_with = "video")]
    src_root_path: Option<PathBuf>,

    /// Driving video to preprocess before an animate run
    #[arg(long)]
    video: Option<PathBuf>,

    /// Animate: replace the performer instead of animating the reference
    #[arg(long)]
    replace: bool,

    /// Animate preprocessing: retarget the pose onto the reference
    #[arg(long)]
    retarget: bool,

    /// Extend the prompt with the configured LLM
    #[arg(long)]
    prompt_extend: bool,

    /// Output video path
    #[arg(long)]
    output_file: Option<PathBuf>,

    #[command(flatten)]
    generation: GenerationArgs,

    #[command(flatten)]
    queue: QueueArgs,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

impl RunArgs {
    fn request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.task, self.prompt.clone());
        request.size = self.size.clone();
        request.sample_steps = self.steps;
        request.sample_solver = self.solver;
        request.seed = self.seed;
        request.duration_secs = self.duration;
        request.image = self.image.clone();
        request.audio = self.audio.clone();
        request.perf_tier = self.perf_tier;
        request.teacache_threshold = self.teacache_threshold;
        request.use_prompt_extend = self.prompt_extend;
        request.output_file = self.output_file.clone();
        request.animate.src_root_path = self.src_root_path.clone();
        request.animate.replace = self.replace;
        request.animate.preprocess = self.video.as_ref().map(|video| {
            let mut options = PreprocessOptions::new(video);
            options.retarget = self.retarget;
            options
        });
        request
    }
}

// =============================================================================
// Serve Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Port for the HTTP API
    #[arg(long, default_value = "7860")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Finished jobs kept for the job list before the oldest are dropped
    #[arg(long, default_value = "500")]
    max_finished_jobs: usize,

    #[command(flatten)]
    generation: GenerationArgs,

    #[command(flatten)]
    queue: QueueArgs,
}

// =============================================================================
// Output Types
// =============================================================================

#[derive(Serialize)]
struct RunOutput {
    job_id: String,
    model: &'static str,
    strategy: &'static str,
    perf_tier: &'static str,
    output_file: String,
    #[serde(flatten)]
    result: JobResult,
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_gpus(output_format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let gpus = match query_gpu_info().await {
        Ok(gpus) => gpus,
        Err(e) => {
            tracing::warn!(error = %e, "Could not query GPUs");
            Vec::new()
        }
    };

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&gpus)?);
        }
        OutputFormat::Table => {
            if gpus.is_empty() {
                println!("No GPUs found.");
            } else {
                println!(
                    "{:<6} {:<32} {:>12} {:>12} {:>12} {:>7}",
                    "INDEX", "NAME", "TOTAL MiB", "USED MiB", "FREE MiB", "USED %"
                );
                println!("{}", "-".repeat(86));
                for gpu in &gpus {
                    let name = if gpu.name.chars().count() > 32 {
                        format!("{}...", gpu.name.chars().take(29).collect::<String>())
                    } else {
                        gpu.name.clone()
                    };
                    println!(
                        "{:<6} {:<32} {:>12} {:>12} {:>12} {:>6.1}%",
                        gpu.index,
                        name,
                        gpu.memory_total_mib,
                        gpu.memory_used_mib,
                        gpu.memory_free_mib,
                        gpu.utilization_percent()
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_run(args: RunArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let config = args.queue.config();
    let request = args.request();
    let output_format = args.output.clone();
    let timeout = Duration::from_secs(args.timeout);
    let strategy = args.strategy;
    let gpus = args.gpus;
    let generation = args.generation.into_config()?;

    let command = GenerationCommand::new(generation, request);
    command.validate()?;
    command.validate_gpu_count(gpus)?;

    let coordinator = build_coordinator(&config).await;
    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone());

    let job_id = uuid::Uuid::new_v4().to_string();
    let num_heads = command.request().task.spec().num_heads;
    let resources = coordinator.resolve_request(strategy, gpus, num_heads);
    let task = command.request().task;
    let perf_tier = command.request().perf_tier;
    tracing::info!(
        job_id = %job_id,
        task = %task,
        strategy = %strategy,
        prompt = %command.request().prompt_preview(),
        request = %resources,
        "Starting generation"
    );

    let result = run_generation(&coordinator, &job_id, &command, resources, &cancel, timeout).await;

    let output_file = command.output_file().display().to_string();
    match output_format {
        OutputFormat::Json => {
            let output = RunOutput {
                job_id,
                model: task.spec().name,
                strategy: strategy.label(),
                perf_tier: perf_tier.label(),
                output_file,
                result: result.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Job ID:   {}", job_id);
            println!("Model:    {} ({})", task.spec().name, task);
            println!("Strategy: {} ({})", strategy.label(), strategy.description());
            println!("Tier:     {} ({})", perf_tier.label(), perf_tier.description());
            println!("Status:   {}", result.status);
            println!("Elapsed:  {:.1}s", result.elapsed_seconds);
            if result.is_success() {
                println!("Output:   {}", output_file);
            }
            if !result.message.is_empty() {
                println!("Message:");
                for line in result.message.lines() {
                    println!("  {}", line);
                }
            }
        }
    }
    Ok(result.is_success())
}

async fn handle_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.queue.config().with_max_finished_jobs(args.max_finished_jobs);
    let generation = args.generation.into_config()?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    tracing::info!(
        addr = %addr,
        repo = %generation.repo_root.display(),
        models = %generation.models_path.display(),
        output = %generation.output_root.display(),
        prompt_extend = generation.prompt_extend.is_enabled(),
        "Starting wan-orchestrator"
    );

    let coordinator = build_coordinator(&config).await;
    let shutdown = CancellationToken::new();
    install_shutdown_handler(shutdown.clone());

    let state = DashboardState::new(coordinator, generation, config);
    run_dashboard(addr, state, shutdown).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let outcome = match args.command {
        Commands::Gpus { output } => handle_gpus(&output).await.map(|_| true),
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Serve(serve_args) => handle_serve(serve_args).await.map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
