//! Code-block transformation: locate fenced blocks in a body document and
//! replace each with rendered markup, either locally (syntect) or through the
//! remote highlighting service.
//!
//! The body is scanned once, front to back, collecting every fence span and
//! transforming each exactly once — already-transformed output is never
//! rescanned, so cost stays linear in the number of fences.

pub mod local;
pub mod remote;

use crate::config::HighlightConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;

pub use local::LocalHighlighter;
pub use remote::RemoteHighlighter;

// Language-tagged fences and bare fences in one pattern: the language capture
// is allowed to be empty.
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(\S*)\n((?s:.*?))\n```").unwrap());

/// Code-block transformation strategy for one run.
pub enum Highlighter {
    /// Fences pass through untouched.
    Off,
    Local(LocalHighlighter),
    Remote(RemoteHighlighter),
}

impl Highlighter {
    /// Build the strategy selected by configuration.
    pub fn from_config(config: &HighlightConfig) -> Self {
        match config.mode.as_str() {
            "local" => Highlighter::Local(LocalHighlighter::new()),
            "remote" => Highlighter::Remote(RemoteHighlighter::new(
                config.api_url.clone(),
                config.max_retries,
                config.timeout_secs,
            )),
            _ => Highlighter::Off,
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Highlighter::Off)
    }

    /// Rewrite every fenced code block in `body`. A highlighting failure is
    /// returned to the caller and fails only that document.
    pub async fn transform(&self, body: &str) -> Result<String> {
        if self.is_off() {
            return Ok(body.to_string());
        }

        let mut out = String::with_capacity(body.len());
        let mut last_end = 0;

        for caps in RE_FENCE.captures_iter(body) {
            let whole = caps.get(0).unwrap();
            let lang_raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let lang = if lang_raw.is_empty() { None } else { Some(lang_raw) };
            let code = caps.get(2).map(|m| m.as_str()).unwrap_or("");

            let markup = match self {
                Highlighter::Off => unreachable!(),
                Highlighter::Local(hl) => hl.highlight(code, lang),
                Highlighter::Remote(hl) => hl.highlight(code, lang).await?,
            };

            out.push_str(&body[last_end..whole.start()]);
            out.push_str("{{<crayonCode>}}\n");
            out.push_str(&markup);
            out.push_str("\n{{</crayonCode>}}");
            last_end = whole.end();
        }

        out.push_str(&body[last_end..]);
        Ok(out)
    }
}
