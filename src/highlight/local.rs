//! Local syntax highlighting via syntect.

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME: Lazy<Theme> = Lazy::new(|| {
    let theme_set = ThemeSet::load_defaults();
    theme_set
        .themes
        .get("InspiredGitHub")
        .or_else(|| theme_set.themes.get("base16-ocean.light"))
        .expect("syntect default themes missing")
        .clone()
});

/// Best-effort language-aware highlighter
pub struct LocalHighlighter;

impl LocalHighlighter {
    pub fn new() -> Self {
        Self
    }

    /// Highlight one fenced block. Unknown languages fall back to first-line
    /// detection, then plain text. Each output line is wrapped in an
    /// alternating striping marker for rendering.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let ss = &*SYNTAX_SET;
        let syntax = lang
            .and_then(|l| {
                ss.find_syntax_by_token(l)
                    .or_else(|| ss.find_syntax_by_extension(l))
            })
            .or_else(|| ss.find_syntax_by_first_line(code.lines().next().unwrap_or("")))
            .unwrap_or_else(|| ss.find_syntax_plain_text());

        let mut highlighter = HighlightLines::new(syntax, &THEME);
        let mut out = String::new();

        for (idx, line) in LinesWithEndings::from(code).enumerate() {
            let html = highlighter
                .highlight_line(line, ss)
                .ok()
                .and_then(|regions| {
                    styled_line_to_highlighted_html(&regions, IncludeBackground::No).ok()
                })
                .unwrap_or_else(|| html_escape(line));

            let stripe = if idx % 2 == 0 {
                "crayon-line"
            } else {
                "crayon-line crayon-striped-line"
            };
            out.push_str(&format!("<div class=\"{stripe}\">{}</div>\n", html.trim_end_matches('\n')));
        }

        out
    }
}

impl Default for LocalHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
