//! The loop's single long-lived state file.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

const MAX_STATE_BYTES: usize = 16 * 1024;
const TRUNCATION_MARKER: &str = "\n...[truncated]";
const MIN_UPDATE_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("read state file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write state file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state content must be at least {MIN_UPDATE_LEN} characters, got {0}")]
    TooShort(usize),
}

/// Reads the state file, capped at 16 KiB. "Does not
/// exist" is treated as empty content; any other read error propagates.
pub fn read_capped(path: &Path) -> Result<String, StateFileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => {
            return Err(StateFileError::Read {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    if content.len() <= MAX_STATE_BYTES {
        return Ok(content);
    }

    let mut truncated = truncate_at_char_boundary(&content, MAX_STATE_BYTES).to_string();
    truncated.push_str(TRUNCATION_MARKER);
    Ok(truncated)
}

/// Slices `content` to at most `max_bytes` bytes, backing off to the
/// nearest preceding UTF-8 character boundary so multibyte content is never
/// split mid-codepoint.
fn truncate_at_char_boundary(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }
    let mut end = max_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// `update_metacognitive_state(content)`. Copies any existing state file to `<state>.prev`, then writes
/// `content` followed by an HTML-comment footer.
pub fn update(path: &Path, content: &str, conversation_id: &str, now: DateTime<Utc>) -> Result<(), StateFileError> {
    let char_len = content.chars().count();
    if char_len < MIN_UPDATE_LEN {
        return Err(StateFileError::TooShort(char_len));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StateFileError::Write {
                path: path.display().to_string(),
                source: e,
            })?;
        }
    }

    if path.exists() {
        let prev_path = prev_path(path);
        std::fs::copy(path, &prev_path).map_err(|e| StateFileError::Write {
            path: prev_path.display().to_string(),
            source: e,
        })?;
    }

    let footer = format!(
        "\n<!-- metacognitive: iteration={conversation_id} updated={} -->\n",
        now.to_rfc3339()
    );
    let full = format!("{content}{footer}");
    std::fs::write(path, full).map_err(|e| StateFileError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

fn prev_path(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".prev");
    std::path::PathBuf::from(s)
}
