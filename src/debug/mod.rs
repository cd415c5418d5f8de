//! Debug capture of multi-pass output.
//!
//! When enabled by [`DebugConfig`](crate::config::DebugConfig), the
//! orchestrator hands labeled text to a [`DebugCapture`] implementation.
//! Capture is a side channel: its failures are logged and never change what
//! the caller receives.

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Destination for labeled debug text
pub trait DebugCapture: Send + Sync + std::fmt::Debug {
    fn write(&self, filename: &str, content: &str) -> io::Result<()>;
}

/// Extract the HTML document from free-form model output.
///
/// Returns the first complete `<html ...>...</html>` span. If the document
/// was never closed, returns everything from the last `<html` onward. Text
/// without any `<html` tag is returned unchanged.
///
/// ```rust
/// use llm_relay::debug::extract_html_content;
///
/// let text = "<thinking>plan</thinking>\n<html lang=\"en\"><body>hi</body></html>\nDone.";
/// assert_eq!(extract_html_content(text), "<html lang=\"en\"><body>hi</body></html>");
/// ```
pub fn extract_html_content(text: &str) -> String {
    static HTML_DOCUMENT: OnceLock<Option<Regex>> = OnceLock::new();
    let document = HTML_DOCUMENT.get_or_init(|| Regex::new(r"(?is)<html(?:\s[^>]*)?>.*?</html>").ok());

    if let Some(found) = document.as_ref().and_then(|re| re.find(text)) {
        return found.as_str().to_string();
    }

    match text.rfind("<html") {
        Some(start) => text[start..].to_string(),
        None => text.to_string(),
    }
}

/// Text before the first `</thinking>` marker, or the whole text
pub fn thinking_section(text: &str) -> &str {
    text.split("</thinking>").next().unwrap_or(text)
}

/// Writes files into a per-run directory `<root>/<timestamp>_<id>/`
#[derive(Debug, Clone)]
pub struct FileDebugCapture {
    run_dir: PathBuf,
}

impl FileDebugCapture {
    /// Create a fresh run directory under `root`
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = root.as_ref().join(format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        ));
        fs::create_dir_all(&run_dir)?;
        tracing::info!("🐛 Debug capture enabled: {}", run_dir.display());
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl DebugCapture for FileDebugCapture {
    fn write(&self, filename: &str, content: &str) -> io::Result<()> {
        if filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("debug filename must be a plain file name: {}", filename),
            ));
        }
        let path = self.run_dir.join(filename);
        fs::write(&path, content)?;
        tracing::debug!("🐛 Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }
}

/// Keeps captured files in memory
#[derive(Debug, Default)]
pub struct MemoryDebugCapture {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryDebugCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<String> {
        self.files.lock().ok()?.get(filename).cloned()
    }

    /// Captured file names in sorted order
    pub fn filenames(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl DebugCapture for MemoryDebugCapture {
    fn write(&self, filename: &str, content: &str) -> io::Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "debug capture lock poisoned"))?;
        files.insert(filename.to_string(), content.to_string());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebugCapture;

impl DebugCapture for NoopDebugCapture {
    fn write(&self, _filename: &str, _content: &str) -> io::Result<()> {
        Ok(())
    }
}
