//! API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dcast_api::{create_router, ApiConfig, AppState};
use dcast_gen::{LlmClient, RecorderClient, TtsClient, VeoClient};
use dcast_pipeline::adapters::{
    BrowserDemoRecorder, FfmpegAssembler, GeminiSpeechSynthesizer, LlmGoalGenerator, LlmNarrator,
    LlmScriptGenerator, VeoClipSynthesizer,
};
use dcast_pipeline::{Orchestrator, PipelineConfig, PipelineDeps, Scheduler};
use dcast_store::{MemoryCommitStore, MemoryJobStore, MemoryRepoStore, R2Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dcast=debug"));
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    }

    info!("starting dcast-api");

    let pipeline_config = PipelineConfig::from_env();
    let llm = LlmClient::from_env().context("LLM client")?;
    let jobs = Arc::new(MemoryJobStore::new());
    let deps = PipelineDeps {
        jobs: jobs.clone(),
        commits: Arc::new(MemoryCommitStore::new()),
        repos: Arc::new(MemoryRepoStore::new()),
        storage: Arc::new(R2Storage::from_env().await.context("R2 storage")?),
        goal: Arc::new(LlmGoalGenerator::new(llm.clone())),
        script: Arc::new(LlmScriptGenerator::new(llm.clone())),
        narrator: Arc::new(LlmNarrator::new(llm)),
        recorder: Arc::new(BrowserDemoRecorder::new(
            RecorderClient::from_env().context("recorder client")?,
        )),
        clips: Arc::new(VeoClipSynthesizer::new(
            VeoClient::from_env().context("Veo client")?,
        )),
        tts: Arc::new(GeminiSpeechSynthesizer::new(
            TtsClient::from_env().context("TTS client")?,
        )),
        assembler: Arc::new(FfmpegAssembler::new()),
    };
    let max_workers = pipeline_config.max_workers;
    let orchestrator = Arc::new(Orchestrator::new(deps, pipeline_config));
    let scheduler = Arc::new(Scheduler::new(orchestrator, max_workers));
    let state = AppState::new(scheduler, jobs);

    let config = ApiConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let app = create_router(state);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
