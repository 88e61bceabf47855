use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simple_llm::llm::{combine, run_many, Completion, LlmClient, LlmError};
use simple_llm::llm::{PromptBuilder, PromptOptions, Schema};
use simple_llm::parallel::{ExecutionMode, ExecutorConfig, Outcome};
use simple_llm::timeout::ChannelObserver;
use simple_llm::Settings;

/// Checkpoint records buffered before new ones are dropped.
const CHECKPOINT_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "simple-llm")]
#[command(version, about = "Run chat completion prompts in bounded-concurrency batches")]
struct Cli {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the prompt(s) for a task, schema and input as a JSON array
    Prompts {
        /// What the model should do with the input
        #[arg(long)]
        task: String,
        /// JSON object describing the attributes to return
        #[arg(long)]
        schema: PathBuf,
        /// Input file; used as a string when it is not valid JSON
        #[arg(long)]
        input: PathBuf,
        /// One prompt per parallelKey group instead of a single prompt
        #[arg(long)]
        split: bool,
        /// Extra rule appended to the prompt (repeatable)
        #[arg(long = "law")]
        laws: Vec<String>,
    },
    /// Run a JSON array of prompts against the configured provider
    Run {
        /// JSON array of prompt strings
        #[arg(long)]
        prompts: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Requests in flight at once (overrides settings)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Deadline window per request in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Extra deadline windows after the first timeout
        #[arg(long)]
        max_checkpoints: Option<u32>,
        /// Print one merged object instead of per-prompt outcomes
        #[arg(long)]
        combine: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Series,
    Parallel,
    Limit,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose {
        "simple_llm=debug"
    } else {
        "simple_llm=info"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_input(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn outcome_json(outcome: &Outcome<Completion, LlmError>) -> Result<Value> {
    Ok(match outcome {
        Outcome::Fulfilled(completion) => json!({
            "status": outcome.status(),
            "value": serde_json::to_value(completion)?,
        }),
        Outcome::Rejected(reason) => json!({
            "status": outcome.status(),
            "reason": reason.to_string(),
        }),
    })
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn prompts_command(
    task: &str,
    schema: &Path,
    input: &Path,
    split: bool,
    laws: Vec<String>,
) -> Result<()> {
    let schema_text =
        fs::read_to_string(schema).with_context(|| format!("reading {}", schema.display()))?;
    let schema = Schema::from_json(&schema_text)
        .with_context(|| format!("parsing schema {}", schema.display()))?;
    let input = read_input(input)?;
    let options = PromptOptions {
        additional_laws: laws,
    };

    let builder = PromptBuilder::new();
    let prompts = if split {
        builder.create_prompts(task, &schema, &input, &options)
    } else {
        vec![builder.create_prompt(task, &schema, &input, &options)]
    };

    if prompts.is_empty() {
        warn!("no schema field has a parallelKey; nothing to split");
    }
    print_json(&json!(prompts))
}

async fn run_command(
    settings: Settings,
    prompts: &Path,
    mode: Option<ModeArg>,
    concurrency: Option<usize>,
    deadline_ms: Option<u64>,
    max_checkpoints: Option<u32>,
    combine_results: bool,
) -> Result<()> {
    let mut executor_settings = settings.executor.clone();
    if let Some(concurrency) = concurrency {
        executor_settings.concurrency = concurrency;
    }
    if let Some(deadline_ms) = deadline_ms {
        executor_settings.deadline_ms = Some(deadline_ms);
    }
    if let Some(max_checkpoints) = max_checkpoints {
        executor_settings.max_checkpoints = max_checkpoints;
    }

    let mut config = ExecutorConfig::from(&executor_settings);
    config = match mode {
        Some(ModeArg::Series) => config.with_mode(ExecutionMode::Series),
        Some(ModeArg::Parallel) => config.with_mode(ExecutionMode::Parallel),
        Some(ModeArg::Limit) | None => config,
    };
    config.validate().context("invalid executor configuration")?;

    let prompts: Vec<String> = serde_json::from_value(read_json(prompts)?)
        .context("prompts file must be a JSON array of strings")?;

    let (observer, mut checkpoints) = ChannelObserver::new(CHECKPOINT_BUFFER);
    let config = config.with_observer(Arc::new(observer));
    let checkpoint_log = tokio::spawn(async move {
        while let Some(record) = checkpoints.recv().await {
            info!(
                task_index = record.task_index,
                attempt = record.attempt,
                fired_at = %record.fired_at,
                "checkpoint"
            );
        }
    });

    let client = LlmClient::new(settings.provider).context("creating chat completion client")?;
    info!(prompts = prompts.len(), concurrency = config.concurrency, "running prompts");
    let outcomes = run_many(&client, prompts.as_slice(), config).await?;
    checkpoint_log.await?;

    if combine_results {
        return print_json(&serde_json::to_value(combine(&outcomes))?);
    }

    let rendered = outcomes
        .iter()
        .map(outcome_json)
        .collect::<Result<Vec<_>>>()?;
    print_json(&Value::Array(rendered))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Prompts {
            task,
            schema,
            input,
            split,
            laws,
        } => prompts_command(&task, &schema, &input, split, laws),
        Commands::Run {
            prompts,
            mode,
            concurrency,
            deadline_ms,
            max_checkpoints,
            combine,
        } => {
            let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
            run_command(
                settings,
                &prompts,
                mode,
                concurrency,
                deadline_ms,
                max_checkpoints,
                combine,
            )
            .await
        }
    }
}
