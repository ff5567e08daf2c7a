//! Wake-phrase detection and persona binding

use crate::config::{WakeConfig, WakePhrase};

/// Result of a successful wake-phrase match, scoped to one routing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    /// Assistant identity bound by the matched phrase
    pub persona: String,
    /// Transcript with the matched phrase removed, case preserved
    pub residual: String,
}

/// Ordered table of wake phrases
///
/// Phrases are checked in table order with a case-insensitive substring
/// test; the first match wins. No match means the transcript is ambient
/// noise and is discarded by the caller.
#[derive(Debug, Clone)]
pub struct PhraseTable {
    phrases: Vec<WakePhrase>,
}

impl PhraseTable {
    pub fn new(phrases: Vec<WakePhrase>) -> Self {
        Self { phrases }
    }

    pub fn from_config(cfg: &WakeConfig) -> Self {
        Self::new(cfg.phrases.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Scan the transcript for a configured wake phrase
    pub fn matches(&self, transcript: &str) -> Option<WakeMatch> {
        for entry in &self.phrases {
            if let Some((start, end)) = find_ascii_ci(transcript, &entry.phrase) {
                // Cut the matched span out of the original text so the
                // residual keeps its casing
                let mut residual = String::with_capacity(transcript.len());
                residual.push_str(&transcript[..start]);
                residual.push_str(&transcript[end..]);

                return Some(WakeMatch {
                    persona: entry.persona.clone(),
                    residual: residual.trim().to_string(),
                });
            }
        }
        None
    }
}

/// ASCII-case-insensitive substring search returning the byte range of the
/// first occurrence in `haystack`
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();

    for start in 0..=(hay.len() - nee.len()) {
        // Stay on char boundaries so the residual slices are valid UTF-8
        if !haystack.is_char_boundary(start) || !haystack.is_char_boundary(start + nee.len()) {
            continue;
        }
        if hay[start..start + nee.len()].eq_ignore_ascii_case(nee) {
            return Some((start, start + nee.len()));
        }
    }
    None
}
