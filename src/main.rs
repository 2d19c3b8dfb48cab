mod app;
mod cli;
mod config;
mod documents;
mod images;
mod ooxml;
mod paths;
mod provider;
mod server;
mod session;
mod stream;
mod submit;

use anyhow::Context;
use clap::Parser;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();

    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => paths::config_dir()?.join("config.toml"),
    };
    let mut cfg = config::Config::load_optional(&config_path)?.unwrap_or_default();
    if let Some(model) = args.model.clone() {
        cfg.models.text = model;
    }
    tracing::debug!(?config_path, ?cfg, "resolved config");

    // No overall timeout: long answers stream for as long as the model writes.
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let provider_name = args
        .provider
        .clone()
        .or_else(|| cfg.provider.clone())
        .unwrap_or_else(|| "google".to_string());
    let provider = app::build_provider(&http, &cfg, &provider_name)?;

    match args.cmd.unwrap_or(cli::Command::Serve {
        bind: None,
        no_stream: false,
    }) {
        cli::Command::Serve { bind, no_stream } => {
            app::cmd_serve(provider, &cfg, bind, no_stream).await
        }
        cli::Command::Ask { prompt } => app::cmd_ask(provider, &cfg, &prompt.join(" ")).await,
        cli::Command::Summarize { file } => app::cmd_summarize(provider, &cfg, &file).await,
        cli::Command::Describe { image } => app::cmd_describe(provider, &cfg, &image).await,
        cli::Command::Generate { prompt, image } => {
            app::cmd_generate(provider, &cfg, &prompt.join(" "), image.as_deref()).await
        }
    }
}
