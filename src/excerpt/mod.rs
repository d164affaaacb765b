//! Excerpt extraction: derive a short summary from a body document's leading
//! prose when the sidecar metadata carries no explicit description.
//!
//! One forward pass over the lines. Structural lines (code fences, lists,
//! tables, blockquotes, a second heading) terminate the scan; blank lines are
//! skipped; everything else is prose, stripped of inline markup and
//! accumulated. At most the first three accumulated lines survive, the last
//! one corrected for dangling punctuation.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#+\s*\S").unwrap());
static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`{3}").unwrap());
static RE_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").unwrap());
static RE_QUOTED_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>\s+\*").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[*-]\s+").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+").unwrap());
static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|.+\|").unwrap());
static RE_BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>.*\]").unwrap());

static RE_LINKED_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[!\[.+\]\(.+\)").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([\s\S]+?)\]\(.*?\)").unwrap());
static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*\]\(.*\)").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.+?)`").unwrap());
static RE_LEADING_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>\s+").unwrap());
static RE_BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\*(.*?)\*\*\*").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_INS_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<ins\s\S+>(.+?)</ins>").unwrap());
// Slash-delimited substrings trip up the downstream templating engine, so
// anything regex-looking is swapped for a placeholder word. Known-overbroad
// heuristic carried over as-is.
static RE_REGEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\W+)/.*/\w+(\W+)").unwrap());

/// Per-extraction scan state: accumulated prose plus the first-heading flag.
#[derive(Debug, Default)]
struct ExcerptState {
    lines: Vec<String>,
    seen_heading: bool,
}

/// Extract an excerpt from a body document.
///
/// Deterministic and pure: the result is the stripped prose between the first
/// heading and the first structural element after it (or from the very start
/// when there is no heading), capped at three lines.
pub fn extract(body: &str) -> String {
    let mut state = ExcerptState::default();

    for line in body.lines() {
        if RE_HEADING.is_match(line) {
            // The excerpt ends where the section after the first heading ends.
            if state.seen_heading {
                return finalize(state.lines);
            }
            state.seen_heading = true;
        } else if RE_FENCE.is_match(line) {
            return finalize(state.lines);
        } else if RE_BLANK.is_match(line) {
            // skipped, does not terminate
        } else if RE_QUOTED_EMPHASIS.is_match(line)
            || RE_BULLET.is_match(line)
            || RE_NUMBERED.is_match(line)
            || RE_TABLE_ROW.is_match(line)
            || RE_BLOCKQUOTE.is_match(line)
        {
            return finalize(state.lines);
        } else {
            let stripped = strip_prose_line(line);
            if !stripped.is_empty() {
                state.lines.push(stripped);
            }
        }
    }

    finalize(state.lines)
}

/// Reduce one prose line to plain text.
fn strip_prose_line(line: &str) -> String {
    let mut out = line.trim().to_string();
    out = RE_LINKED_IMAGE.replace_all(&out, "").into_owned();
    out = RE_LINK.replace_all(&out, "[${1}]").into_owned();
    out = RE_IMAGE.replace_all(&out, "").into_owned();
    out = RE_INLINE_CODE.replace_all(&out, "${1}").into_owned();
    out = RE_LEADING_QUOTE.replace(&out, "").into_owned();
    out = RE_BOLD_ITALIC.replace_all(&out, "${1}").into_owned();
    out = RE_BOLD.replace_all(&out, "${1}").into_owned();
    out = RE_INS_TAG.replace(&out, "${1}").into_owned();

    if !line.contains("http://") {
        out = RE_REGEX_LITERAL.replace(&out, "${1}正则${2}").into_owned();
    }

    out
}

/// Correct the final accumulated line so the excerpt does not end mid-thought.
fn fix_last_line(lines: &mut [String]) {
    let last = match lines.last_mut() {
        Some(last) => last,
        None => return,
    };

    if last.ends_with("诸如:") || last.ends_with("诸如：") {
        // Cut the dangling "such as" idiom entirely.
        if let Some(idx) = last.rfind("诸如") {
            last.truncate(idx);
        }
    } else if last.ends_with(':') || last.ends_with('：') {
        // A trailing colon promises content the excerpt cannot show.
        let trailing = last.chars().last().map(char::len_utf8).unwrap_or(0);
        last.truncate(last.len() - trailing);
        last.push_str("...");
    } else if let Some(idx) = last.rfind('。') {
        let end = idx + '。'.len_utf8();
        if end < last.len() {
            // Trailing fragment after the last full stop is discarded.
            last.truncate(end);
        }
    }
}

fn finalize(mut lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }

    fix_last_line(&mut lines);

    let keep = lines.len().min(3);
    let joined: String = lines[..keep].concat();

    joined
        .replace("<em>", "")
        .replace("</em>", "")
        .replace("<strong>", "")
        .replace("</strong>", "")
}
