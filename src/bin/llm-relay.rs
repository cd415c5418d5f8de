//! Command-line front end: stream one prompt through a provider to stdout.
//!
//! ```text
//! llm-relay --provider anthropic --model claude_3_sonnet --prompt "A todo app"
//! llm-relay --provider bedrock --model claude-3-opus-20240229 --passes 2 \
//!     --image screenshot.png --prompt "Recreate this page"
//! ```

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::Parser;
use llm_relay::config::RelayConfig;
use llm_relay::debug::{DebugCapture, FileDebugCapture, NoopDebugCapture};
use llm_relay::llm::models::Llm;
use llm_relay::llm::streaming::StdoutSink;
use llm_relay::llm::traits::{ProviderType, StreamingProvider};
use llm_relay::llm::ProviderRegistry;
use llm_relay::multipass::MultiPassOrchestrator;
use llm_relay::types::{ContentPart, Message};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream LLM output from OpenAI, Anthropic or Bedrock", long_about = None)]
struct Cli {
    /// Provider to use: openai, anthropic or bedrock
    #[arg(long, default_value = "anthropic")]
    provider: ProviderType,

    /// Model name, e.g. gpt_4_vision, claude_3_sonnet or a full model id
    #[arg(long)]
    model: String,

    /// System prompt
    #[arg(long, default_value = "You are a helpful assistant.")]
    system: String,

    /// User prompt
    #[arg(long)]
    prompt: String,

    /// Image file sent along with the prompt
    #[arg(long)]
    image: Option<PathBuf>,

    /// Run the draft-then-refine protocol with this many passes (Claude providers only)
    #[arg(long)]
    passes: Option<u32>,

    /// Prefill each multi-pass request with an assistant <thinking> turn
    #[arg(long)]
    include_thinking: bool,

    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn image_data_url(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let media_type = match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => bail!("Unsupported image type: {}", path.display()),
    };
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

fn load_config(cli: &Cli) -> Result<RelayConfig> {
    let config = match &cli.config {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RelayConfig::default(),
    };
    let mut config = config.merge_with_env()?;

    if let Some(passes) = cli.passes {
        config.multipass.passes = passes;
    }
    if cli.include_thinking {
        config.multipass.include_thinking = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    llm_relay::utils::logging::init_logging("warn")?;

    // Reject unknown models before touching configuration or the network
    let model = Llm::from_frontend_str(&cli.model)?;
    if cli.passes.is_some() && !model.is_claude() {
        bail!("Multi-pass mode needs a Claude model, got {}", model);
    }

    let config = load_config(&cli)?;
    let registry = ProviderRegistry::from_config(&config).await;
    let provider = registry.get_provider(cli.provider).await?;

    let user = match &cli.image {
        Some(path) => Message::user_parts(vec![
            ContentPart::image(image_data_url(path)?),
            ContentPart::text(cli.prompt.clone()),
        ]),
        None => Message::user(cli.prompt.clone()),
    };

    if cli.passes.is_some() {
        let capture: Arc<dyn DebugCapture> = if config.debug.enabled {
            Arc::new(FileDebugCapture::new(&config.debug.directory)?)
        } else {
            Arc::new(NoopDebugCapture)
        };
        let orchestrator = MultiPassOrchestrator::new(provider, model)
            .with_config(config.multipass)
            .with_debug(config.debug.clone(), capture);
        eprintln!(
            "Refining with {} via {} over {} passes",
            model.display_name(),
            cli.provider,
            orchestrator.config().passes
        );

        let mut conversation = vec![user];
        let result = orchestrator
            .run(&cli.system, &mut conversation, &StdoutSink)
            .await?;
        println!();
        eprintln!(
            "{} passes, {} chars in final pass",
            result.passes.len(),
            result.content.len()
        );
        if let Some(usage) = result.total_usage() {
            eprintln!(
                "Token usage: Input Tokens: {}, Output Tokens: {}",
                usage.input_tokens, usage.output_tokens
            );
        }
    } else {
        let messages = vec![Message::system(cli.system.clone()), user];
        eprintln!("Streaming {} via {}", model.display_name(), cli.provider);
        let response = provider
            .stream_messages(model, &messages, &StdoutSink)
            .await?;
        println!();
        if let Some(usage) = response.usage {
            eprintln!(
                "Token usage: Input Tokens: {}, Output Tokens: {}",
                usage.input_tokens, usage.output_tokens
            );
        }
    }

    Ok(())
}
