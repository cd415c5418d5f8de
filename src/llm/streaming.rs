//! Sink contract and call-local accumulation for streamed text.
//!
//! A streaming call owns one [`StreamAccumulator`]. Each decoded increment is
//! appended to it and then handed to the caller's [`TextSink`]; the sink call
//! is awaited before the next network chunk is read, so a slow sink throttles
//! the stream instead of buffering it.
//!
//! ```rust,no_run
//! use llm_relay::llm::streaming::FnSink;
//!
//! let sink = FnSink::new(|text: String| async move {
//!     print!("{}", text);
//! });
//! ```

use async_trait::async_trait;
use futures::Future;
use std::io::Write;
use std::sync::Mutex;

/// Receiver of text increments
#[async_trait]
pub trait TextSink: Send + Sync {
    /// Called once per increment, in arrival order
    async fn on_text(&self, text: &str);
}

/// Sink backed by an async closure taking the increment by value
pub struct FnSink<F> {
    callback: F,
}

impl<F, Fut> FnSink<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F, Fut> TextSink for FnSink<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn on_text(&self, text: &str) {
        (self.callback)(text.to_string()).await
    }
}

/// Sink that records every increment
#[derive(Debug, Default)]
pub struct CollectingSink {
    increments: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All increments received so far
    pub fn increments(&self) -> Vec<String> {
        self.increments
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of sink invocations so far
    pub fn count(&self) -> usize {
        self.increments.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Concatenation of all increments
    pub fn text(&self) -> String {
        self.increments().concat()
    }
}

#[async_trait]
impl TextSink for CollectingSink {
    async fn on_text(&self, text: &str) {
        if let Ok(mut increments) = self.increments.lock() {
            increments.push(text.to_string());
        }
    }
}

/// Sink that writes increments to stdout as they arrive
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl TextSink for StdoutSink {
    async fn on_text(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::warn!("Failed to write increment to stdout: {}", e);
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl TextSink for NullSink {
    async fn on_text(&self, _text: &str) {}
}

/// Append-only text buffer owned by one in-flight streaming call
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    increments: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an increment, then deliver it to the sink
    pub async fn forward(&mut self, text: &str, sink: &dyn TextSink) {
        self.text.push_str(text);
        self.increments += 1;
        tracing::trace!("🌊 Increment #{}: {} chars", self.increments, text.len());
        sink.on_text(text).await;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of increments forwarded
    pub fn increments(&self) -> usize {
        self.increments
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_accumulator_forwards_in_order() {
        let sink = CollectingSink::new();
        let mut acc = StreamAccumulator::new();

        for piece in ["Hel", "lo", "", " world"] {
            acc.forward(piece, &sink).await;
        }

        assert_eq!(acc.as_str(), "Hello world");
        assert_eq!(acc.increments(), 4);
        assert_eq!(sink.increments(), vec!["Hel", "lo", "", " world"]);
        assert_eq!(sink.text(), acc.into_string());
    }

    #[tokio::test]
    async fn test_fn_sink_receives_owned_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = FnSink::new(move |text: String| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().unwrap().push(text);
            }
        });

        sink.on_text("a").await;
        sink.on_text("b").await;

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_sink_is_awaited_before_returning() {
        let sink = FnSink::new(|_text: String| async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        });
        let mut acc = StreamAccumulator::new();

        let start = std::time::Instant::now();
        acc.forward("x", &sink).await;
        acc.forward("y", &sink).await;

        assert!(start.elapsed() >= std::time::Duration::from_millis(40));
    }
}
