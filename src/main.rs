use anyhow::{bail, Context};
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use vivica::config::ConfigLoader;
use vivica::{ChatMessage, ChatRequest, ChatService, CompletionResponse, RoutingProfile};

#[derive(Parser)]
#[command(
    name = "vivica",
    version,
    about = "Chat with an OpenRouter-compatible model, rotating API keys on failure"
)]
struct Cli {
    /// Message to send
    #[arg(value_name = "PROMPT")]
    prompt: Vec<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "VIVICA_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Model for ordinary requests
    #[arg(short, long, default_value = "openrouter/auto")]
    model: String,

    /// Model used when the prompt looks like code
    #[arg(long)]
    code_model: Option<String>,

    /// Model tried once if the primary model fails on every key
    #[arg(long)]
    fallback_model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    system: Option<String>,

    #[arg(short, long, default_value_t = 0.7)]
    temperature: f32,

    #[arg(long, default_value_t = 2000)]
    max_tokens: u32,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Print per-key usage counters and exit
    #[arg(long)]
    stats: bool,
}

impl Cli {
    fn request(&self) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(self.prompt.join(" ")));

        let mut request = ChatRequest::new(self.model.as_str(), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        if self.code_model.is_some() || self.fallback_model.is_some() {
            request = request.with_profile(RoutingProfile {
                model: self.model.clone(),
                code_model: self.code_model.clone().unwrap_or_default(),
                fallback_model: self.fallback_model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            });
        }

        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vivica::init_tracing();
    let cli = Cli::parse();

    let mut builder = ChatService::builder();
    if let Some(path) = &cli.config {
        let config = ConfigLoader::from_path(path)
            .and_then(|loader| loader.into_config())
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        builder = builder.config(config);
    }
    let service = builder.build().context("Failed to create chat service")?;
    debug!(?service, "Service created");

    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&service.key_stats())?);
        return Ok(());
    }

    if cli.prompt.is_empty() {
        bail!("Nothing to send: pass a prompt");
    }

    let request = cli.request();
    let mut stdout = std::io::stdout();

    if cli.no_stream {
        let completion: CompletionResponse = service.send_message_json(&request).await?;
        writeln!(stdout, "{}", completion.content().unwrap_or_default())?;
        return Ok(());
    }

    let request = request.with_stream(true);
    let response = service.send_message(&request).await?;
    let events = ChatService::stream_response(response, Some(&request));
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        if let Some(text) = event?.content() {
            write!(stdout, "{}", text)?;
            stdout.flush()?;
        }
    }
    writeln!(stdout)?;

    Ok(())
}
