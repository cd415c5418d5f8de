//! Streaming contract across all three adapters using fake transports.
//!
//! Concatenated sink increments must equal the returned text, delivered in
//! arrival order, and the multi-pass protocol must behave the same over any
//! Claude provider.

use async_trait::async_trait;
use futures::stream::StreamExt;
use llm_relay::config::{DebugConfig, MultiPassConfig};
use llm_relay::debug::MemoryDebugCapture;
use llm_relay::error::RelayError;
use llm_relay::llm::models::Llm;
use llm_relay::llm::providers::anthropic::{MessagesStream, MessagesTransport, SseMessagesStream};
use llm_relay::llm::providers::bedrock::{ChunkByteStream, InvokeStreamTransport};
use llm_relay::llm::providers::openai::{ChatCompletionChunk, ChatCompletionTransport, ChunkStream};
use llm_relay::llm::providers::{AnthropicProvider, BedrockProvider, OpenAIProvider};
use llm_relay::llm::sse::SseEvent;
use llm_relay::llm::streaming::{CollectingSink, FnSink};
use llm_relay::llm::traits::StreamingProvider;
use llm_relay::multipass::{MultiPassOrchestrator, REFINE_INSTRUCTION};
use llm_relay::types::{ContentPart, Message};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const PIECES: [&str; 4] = ["<html>", "<body>", "Hello", "</body></html>"];

#[derive(Debug)]
struct FakeChatCompletions(Vec<&'static str>);

#[async_trait]
impl ChatCompletionTransport for FakeChatCompletions {
    async fn open_stream(&self, _body: &Value) -> Result<ChunkStream, RelayError> {
        let chunks: Vec<Result<ChatCompletionChunk, RelayError>> = self
            .0
            .iter()
            .map(|text| Ok(ChatCompletionChunk::text(*text)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Serves one scripted Messages API response per call
#[derive(Debug)]
struct FakeMessages {
    scripts: Mutex<Vec<Vec<&'static str>>>,
}

impl FakeMessages {
    fn new(scripts: Vec<Vec<&'static str>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().rev().collect()),
        }
    }
}

#[async_trait]
impl MessagesTransport for FakeMessages {
    async fn open_stream(&self, _body: &Value) -> Result<Box<dyn MessagesStream>, RelayError> {
        let texts = self.scripts.lock().unwrap().pop().unwrap_or_default();
        let mut events = vec![json!({"type": "message_start", "message": {"usage": {"input_tokens": 7, "output_tokens": 1}}})];
        for text in texts {
            events.push(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}));
        }
        events.push(json!({"type": "message_stop"}));

        let events: Vec<Result<SseEvent, std::io::Error>> = events
            .into_iter()
            .map(|data| {
                Ok(SseEvent {
                    event: None,
                    data: data.to_string(),
                })
            })
            .collect();
        Ok(Box::new(SseMessagesStream::new(futures::stream::iter(events).boxed())))
    }
}

/// Serves one scripted Bedrock response per call and records request bodies
#[derive(Debug)]
struct FakeBedrock {
    scripts: Mutex<Vec<Vec<&'static str>>>,
    bodies: Mutex<Vec<Value>>,
}

impl FakeBedrock {
    fn new(scripts: Vec<Vec<&'static str>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().rev().collect()),
            bodies: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl InvokeStreamTransport for FakeBedrock {
    async fn invoke(&self, _model_id: &str, body: Vec<u8>) -> Result<ChunkByteStream, RelayError> {
        self.bodies.lock().unwrap().push(serde_json::from_slice(&body)?);
        let texts = self.scripts.lock().unwrap().pop().unwrap_or_default();

        let mut events = vec![json!({"type": "message_start"})];
        for text in texts {
            events.push(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}));
        }
        events.push(json!({"type": "message_stop", "amazon-bedrock-invocationMetrics": {"inputTokenCount": 9, "outputTokenCount": 4}}));

        let chunks: Vec<Result<Vec<u8>, RelayError>> = events
            .into_iter()
            .map(|event| Ok(event.to_string().into_bytes()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

fn conversation() -> Vec<Message> {
    vec![
        Message::system("You are an expert web developer."),
        Message::user_parts(vec![
            ContentPart::image("data:image/png;base64,iVBORw0KGgo="),
            ContentPart::text("Recreate this screenshot"),
        ]),
    ]
}

async fn assert_contract(provider: &dyn StreamingProvider, model: Llm) {
    let sink = CollectingSink::new();

    let response = provider
        .stream_messages(model, &conversation(), &sink)
        .await
        .unwrap();

    assert_eq!(sink.text(), response.content, "{}", provider.provider_type());
    assert_eq!(sink.increments(), PIECES.to_vec());
    assert_eq!(response.increments, PIECES.len());
}

#[tokio::test]
async fn concatenated_increments_equal_final_text_for_every_adapter() {
    let openai = OpenAIProvider::with_transport(Arc::new(FakeChatCompletions(PIECES.to_vec())));
    let anthropic = AnthropicProvider::with_transport(Arc::new(FakeMessages::new(vec![PIECES.to_vec()])));
    let bedrock = BedrockProvider::with_transport(Arc::new(FakeBedrock::new(vec![PIECES.to_vec()])));

    assert_contract(&openai, Llm::Gpt4Turbo20240409).await;
    assert_contract(&anthropic, Llm::Claude3Opus).await;
    assert_contract(&bedrock, Llm::Claude3Sonnet).await;
}

/// Serves PIECES to every adapter, logging each text-bearing item as it is pulled
#[derive(Debug, Clone)]
struct PacedTransport {
    log: Arc<Mutex<Vec<String>>>,
}

impl PacedTransport {
    fn logged<T: Send + 'static>(
        &self,
        items: Vec<(Option<&'static str>, T)>,
    ) -> futures::stream::BoxStream<'static, T> {
        let log = self.log.clone();
        futures::stream::iter(items)
            .map(move |(piece, item)| {
                if let Some(piece) = piece {
                    log.lock().unwrap().push(format!("pull {}", piece));
                }
                item
            })
            .boxed()
    }

    fn claude_events(with_metrics: bool) -> Vec<(Option<&'static str>, Value)> {
        let mut events = vec![(None, json!({"type": "message_start", "message": {"usage": {}}}))];
        for piece in PIECES {
            events.push((
                Some(piece),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": piece}}),
            ));
        }
        let mut stop = json!({"type": "message_stop"});
        if with_metrics {
            stop["amazon-bedrock-invocationMetrics"] = json!({"inputTokenCount": 1, "outputTokenCount": 1});
        }
        events.push((None, stop));
        events
    }
}

#[async_trait]
impl ChatCompletionTransport for PacedTransport {
    async fn open_stream(&self, _body: &Value) -> Result<ChunkStream, RelayError> {
        let items: Vec<(Option<&'static str>, Result<ChatCompletionChunk, RelayError>)> = PIECES
            .iter()
            .map(|piece| (Some(*piece), Ok(ChatCompletionChunk::text(*piece))))
            .collect();
        Ok(self.logged(items))
    }
}

#[async_trait]
impl MessagesTransport for PacedTransport {
    async fn open_stream(&self, _body: &Value) -> Result<Box<dyn MessagesStream>, RelayError> {
        let items: Vec<(Option<&'static str>, Result<SseEvent, std::io::Error>)> = Self::claude_events(false)
            .into_iter()
            .map(|(piece, data)| {
                let event = SseEvent {
                    event: None,
                    data: data.to_string(),
                };
                (piece, Ok(event))
            })
            .collect();
        Ok(Box::new(SseMessagesStream::new(self.logged(items))))
    }
}

#[async_trait]
impl InvokeStreamTransport for PacedTransport {
    async fn invoke(&self, _model_id: &str, _body: Vec<u8>) -> Result<ChunkByteStream, RelayError> {
        let items: Vec<(Option<&'static str>, Result<Vec<u8>, RelayError>)> = Self::claude_events(true)
            .into_iter()
            .map(|(piece, event)| (piece, Ok(event.to_string().into_bytes())))
            .collect();
        Ok(self.logged(items))
    }
}

async fn assert_sink_runs_before_next_pull(provider: &dyn StreamingProvider, model: Llm, log: Arc<Mutex<Vec<String>>>) {
    let sink_log = log.clone();
    let sink = FnSink::new(move |text: String| {
        let log = sink_log.clone();
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(format!("sink {}", text));
        }
    });

    let response = provider
        .stream_messages(model, &conversation(), &sink)
        .await
        .unwrap();

    let expected: Vec<String> = PIECES
        .iter()
        .flat_map(|piece| [format!("pull {}", piece), format!("sink {}", piece)])
        .collect();
    assert_eq!(*log.lock().unwrap(), expected, "{}", provider.provider_type());
    assert_eq!(response.content, PIECES.concat());
}

#[tokio::test]
async fn sink_sees_each_increment_before_the_next_is_read() {
    let transport = |log: &Arc<Mutex<Vec<String>>>| Arc::new(PacedTransport { log: log.clone() });

    let log = Arc::new(Mutex::new(Vec::new()));
    let openai = OpenAIProvider::with_transport(transport(&log));
    assert_sink_runs_before_next_pull(&openai, Llm::Gpt4Vision, log).await;

    let log = Arc::new(Mutex::new(Vec::new()));
    let anthropic = AnthropicProvider::with_transport(transport(&log));
    assert_sink_runs_before_next_pull(&anthropic, Llm::Claude3Sonnet, log).await;

    let log = Arc::new(Mutex::new(Vec::new()));
    let bedrock = BedrockProvider::with_transport(transport(&log));
    assert_sink_runs_before_next_pull(&bedrock, Llm::Claude3Haiku, log).await;
}

#[tokio::test]
async fn multipass_over_bedrock_returns_last_pass() {
    let transport = Arc::new(FakeBedrock::new(vec![vec!["A"], vec!["B"]]));
    let provider = Arc::new(BedrockProvider::with_transport(transport.clone()));
    let orchestrator = MultiPassOrchestrator::new(provider, Llm::Claude3Sonnet);
    let mut turns = vec![Message::user("Build a calculator")];
    let sink = CollectingSink::new();

    let result = orchestrator
        .run("You are an expert web developer.", &mut turns, &sink)
        .await
        .unwrap();

    assert_eq!(result.content, "B");
    assert_eq!(result.full_stream, "AB");
    assert_eq!(
        turns,
        vec![
            Message::user("Build a calculator"),
            Message::assistant("<thinking>A"),
            Message::user(REFINE_INSTRUCTION),
        ]
    );

    let bodies = transport.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["system"], "You are an expert web developer.");
    assert_eq!(bodies[1]["messages"][1], json!({"role": "assistant", "content": "<thinking>A"}));
    assert_eq!(bodies[1]["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn multipass_over_anthropic_captures_debug_files() {
    let provider = Arc::new(AnthropicProvider::with_transport(Arc::new(FakeMessages::new(vec![
        vec!["draft</thinking>", "<html>v1</html>"],
        vec!["<html>v2</html>"],
        vec!["<html>v3</html>"],
    ]))));
    let capture = Arc::new(MemoryDebugCapture::new());
    let orchestrator = MultiPassOrchestrator::new(provider, Llm::Claude3Opus)
        .with_config(MultiPassConfig {
            passes: 3,
            include_thinking: false,
        })
        .with_debug(
            DebugConfig {
                enabled: true,
                directory: "debug".into(),
            },
            capture.clone(),
        );
    let mut turns = vec![Message::user("Build it")];

    let result = orchestrator
        .run("sys", &mut turns, &CollectingSink::new())
        .await
        .unwrap();

    assert_eq!(result.content, "<html>v3</html>");
    assert_eq!(turns.len(), 5);
    assert_eq!(capture.get("pass_1.html").as_deref(), Some("<html>v1</html>"));
    assert_eq!(capture.get("thinking_pass_1.txt").as_deref(), Some("draft"));
    assert_eq!(capture.get("pass_3.html").as_deref(), Some("<html>v3</html>"));
    assert_eq!(capture.get("full_stream.txt"), Some(result.full_stream.clone()));
}
