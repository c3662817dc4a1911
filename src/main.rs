use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adaptok::config::PipelineConfig;
use adaptok::frame::Frame;
use adaptok::inference::{
    EchoBackend, GenerationBackend, InferenceRequest, ModelMode, Orchestrator, OutputFormat,
};
use adaptok_scale::presets::DetailPreset;
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Local deterministic stub
    Echo,
    /// Remote generation server over HTTP
    Http,
}

/// Adaptive visual tokenization and cached inference.
#[derive(Parser, Debug)]
#[command(name = "adaptok")]
#[command(about = "Tokenize frames by visual complexity and run a prompt against them")]
#[command(long_about = "Load image files as an ordered frame sequence, size each frame's token budget to its
visual complexity, drop frames redundant with the last kept one, and send the reduced
token sequence plus the prompt to a generation backend. Prints the response as JSON.")]
struct Args {
    /// Image files, in frame order
    #[arg(help = "Image files used as frames, in order (optional)")]
    frames: Vec<PathBuf>,

    /// Prompt text
    #[arg(short, long)]
    prompt: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prompt framing
    #[arg(long, value_enum)]
    mode: Option<ModelMode>,

    /// Result payload shape
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Clamp frames to a detail preset before tokenization
    #[arg(long, value_enum)]
    detail: Option<DetailPreset>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long)]
    max_length: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    top_k: Option<u32>,

    #[arg(long)]
    top_p: Option<f32>,

    #[arg(long)]
    repetition_penalty: Option<f32>,

    #[arg(long)]
    num_return_sequences: Option<u32>,

    /// Greedy decoding instead of sampling
    #[arg(long)]
    greedy: bool,

    /// Generation backend
    #[arg(long, value_enum, default_value = "echo")]
    backend: BackendKind,

    /// Endpoint URL for the http backend
    #[arg(long)]
    endpoint: Option<String>,

    /// Request timeout
    #[arg(short, long, default_value = "30s",
          help = "How long to wait: 30s (30 seconds), 2m (2 minutes), 1h (1 hour)")]
    timeout: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the metrics report to stderr after the response
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    adaptok::logging::init_tracing(args.json_logs)?;

    let timeout = parse_duration(&args.timeout)?;
    let config = build_config(&args)?;
    let backend = build_backend(&args, timeout)?;

    let orchestrator = Orchestrator::builder(config).backend(backend).build()?;
    info!(info = ?orchestrator.model_info(), "pipeline built");

    let frames = args
        .frames
        .iter()
        .map(|path| Frame::open(path).with_context(|| format!("loading frame {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let request = InferenceRequest::multimodal(args.prompt.clone(), frames);
    let response = orchestrator.process_with_timeout(request, timeout).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if args.metrics {
        eprintln!("{}", orchestrator.metrics().report());
    }

    // Joins the worker threads and drops the blocking http client.
    tokio::task::block_in_place(move || drop(orchestrator));
    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(detail) = args.detail {
        config.preprocessing.max_long_side = Some(detail.max_long_side());
    }
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }

    let generation = &mut config.generation;
    if let Some(v) = args.max_length {
        generation.max_length = v;
    }
    if let Some(v) = args.temperature {
        generation.temperature = v;
    }
    if let Some(v) = args.top_k {
        generation.top_k = v;
    }
    if let Some(v) = args.top_p {
        generation.top_p = v;
    }
    if let Some(v) = args.repetition_penalty {
        generation.repetition_penalty = v;
    }
    if let Some(v) = args.num_return_sequences {
        generation.num_return_sequences = v;
    }
    if args.greedy {
        generation.do_sample = false;
    }

    config.validate()?;
    Ok(config)
}

fn build_backend(args: &Args, timeout: Duration) -> Result<Arc<dyn GenerationBackend>> {
    match args.backend {
        BackendKind::Echo => Ok(Arc::new(EchoBackend::new())),
        BackendKind::Http => {
            let Some(endpoint) = args.endpoint.clone() else {
                bail!("--endpoint is required with --backend http");
            };
            http_backend(endpoint, timeout)
        }
    }
}

#[cfg(feature = "http-backend")]
fn http_backend(endpoint: String, timeout: Duration) -> Result<Arc<dyn GenerationBackend>> {
    Ok(Arc::new(
        adaptok::inference::HttpBackend::new(endpoint).with_timeout(timeout),
    ))
}

#[cfg(not(feature = "http-backend"))]
fn http_backend(_endpoint: String, _timeout: Duration) -> Result<Arc<dyn GenerationBackend>> {
    bail!("this build has no http backend; rebuild with --features http-backend")
}

/// Parse duration string like "30s", "2m", "1h"
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(Duration::from_secs(num)),
        "m" => Ok(Duration::from_secs(num * 60)),
        "h" => Ok(Duration::from_secs(num * 3600)),
        _ => Err(anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn overrides_apply() {
        let args = Args::parse_from([
            "adaptok",
            "--prompt",
            "hi",
            "--mode",
            "coding",
            "--format",
            "raw",
            "--detail",
            "low",
            "--temperature",
            "0.3",
            "--greedy",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.mode, ModelMode::Coding);
        assert_eq!(config.output.format, OutputFormat::Raw);
        assert_eq!(config.preprocessing.max_long_side, Some(448));
        assert_eq!(config.generation.temperature, 0.3);
        assert!(!config.generation.do_sample);
    }

    #[test]
    fn invalid_override_rejected() {
        let args = Args::parse_from(["adaptok", "-p", "hi", "--top-p", "1.5"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn http_needs_endpoint() {
        let args = Args::parse_from(["adaptok", "-p", "hi", "--backend", "http"]);
        assert!(build_backend(&args, Duration::from_secs(1)).is_err());
    }
}
