//! Lexical signal of a file: its name parts, plus a content sample for text files.

use std::io::Read;

use crate::types::FileEvent;

/// Builds routing signals. Holds only configuration; safe to share.
#[derive(Clone, Debug)]
pub struct SignalBuilder {
    text_extensions: Vec<String>,
    max_bytes: usize,
}

impl SignalBuilder {
    pub fn new(text_extensions: Vec<String>, max_bytes: usize) -> Self {
        Self {
            text_extensions,
            max_bytes,
        }
    }

    /// Lowercased `name stem extension`, followed by the first `max_bytes` of
    /// content when the extension is text-like. Unreadable content is skipped.
    pub fn build(&self, file: &FileEvent) -> String {
        let mut signal = name_signal(file);
        if file.has_extension_in(&self.text_extensions) {
            match read_sample(file, self.max_bytes) {
                Ok(sample) if !sample.is_empty() => {
                    signal.push(' ');
                    signal.push_str(&sample.to_lowercase());
                    signal = signal.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(file = %file.name, "signal degraded to name only: {}", e);
                }
            }
        }
        signal
    }
}

fn name_signal(file: &FileEvent) -> String {
    [&file.name, &file.stem, &file.extension]
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_sample(file: &FileEvent, max_bytes: usize) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
    std::fs::File::open(&file.path)?
        .take(max_bytes as u64)
        .read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
