//! Reduces raw wikitext to plain paragraph text plus the page's categories.
//!
//! Only the subset an article lead needs is handled: templates, tables,
//! references, comments and tags are dropped; links collapse to their labels;
//! headings survive as `== Title ==` lines so callers can cut at sections.

use std::sync::LazyLock;

use regex::Regex;

static SELF_CLOSING_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<ref[^>]*/>").expect("valid ref regex"));
static PAIRED_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<ref[^>/]*>.*?</ref\s*>").expect("valid ref regex"));
static DROPPED_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(gallery|math|nowiki|syntaxhighlight|tabber)[^>]*>.*?</(gallery|math|nowiki|syntaxhighlight|tabber)\s*>")
        .expect("valid block regex")
});
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid tag regex"));
static MAGIC_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__[A-Z]+__").expect("valid magic word regex"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'{2,}").expect("valid quote regex"));
static LANGUAGE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z]+)?$").expect("valid language regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedWikitext {
    pub plain_text: String,
    pub categories: Vec<String>,
}

pub fn normalize(raw: &str) -> NormalizedWikitext {
    let mut categories = Vec::new();

    let text = strip_balanced(raw, "<!--", "-->");
    let text = SELF_CLOSING_REF.replace_all(&text, "");
    let text = PAIRED_REF.replace_all(&text, "");
    let text = DROPPED_BLOCKS.replace_all(&text, "");
    let text = strip_balanced(&text, "{{", "}}");
    let text = strip_balanced(&text, "{|", "|}");
    let text = replace_wikilinks(&text, &mut categories);
    let text = replace_external_links(&text);
    let text = HTML_TAG.replace_all(&text, "");
    let text = MAGIC_WORD.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = decode_entities(&text);

    NormalizedWikitext {
        plain_text: normalize_lines(&text),
        categories,
    }
}

/// Remove every `open ... close` span, honouring nesting. An unclosed span is
/// kept verbatim.
fn strip_balanced(text: &str, open: &str, close: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut span_start = 0usize;
    let mut index = 0usize;

    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with(open) {
            if depth == 0 {
                span_start = index;
            }
            depth += 1;
            index += open.len();
            continue;
        }
        if depth > 0 && rest.starts_with(close) {
            depth -= 1;
            index += close.len();
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        if depth == 0 {
            output.push(ch);
        }
        index += ch.len_utf8();
    }

    if depth > 0 {
        output.push_str(&text[span_start..]);
    }
    output
}

fn replace_wikilinks(text: &str, categories: &mut Vec<String>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut index = 0usize;

    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with("[[")
            && let Some(end) = find_link_end(rest)
        {
            output.push_str(&render_wikilink(&rest[2..end], categories));
            index += end + 2;
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        output.push(ch);
        index += ch.len_utf8();
    }
    output
}

// Offset of the `]]` that closes the link opening at the start of `rest`.
// Links never span lines.
fn find_link_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut index = 0usize;
    while index < rest.len() {
        let tail = &rest[index..];
        if tail.starts_with('\n') {
            return None;
        }
        if tail.starts_with("[[") {
            depth += 1;
            index += 2;
            continue;
        }
        if tail.starts_with("]]") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(index);
            }
            index += 2;
            continue;
        }
        index += tail.chars().next()?.len_utf8();
    }
    None
}

fn render_wikilink(inner: &str, categories: &mut Vec<String>) -> String {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target.trim(), Some(label.trim())),
        None => (inner.trim(), None),
    };

    let leading_colon = target.starts_with(':');
    let target = target.trim_start_matches(':').trim();
    if target.is_empty() {
        return String::new();
    }

    if let Some((prefix, rest)) = target.split_once(':') {
        let prefix = prefix.trim();
        if prefix.eq_ignore_ascii_case("Category") && !leading_colon {
            push_category(categories, rest);
            return String::new();
        }
        if ["File", "Image", "Media"]
            .iter()
            .any(|namespace| prefix.eq_ignore_ascii_case(namespace))
        {
            return String::new();
        }
        if !leading_colon && LANGUAGE_PREFIX.is_match(prefix) {
            return String::new();
        }
    }

    match label {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => target.to_string(),
    }
}

fn push_category(categories: &mut Vec<String>, raw: &str) {
    let name = raw.split('|').next().unwrap_or("");
    let name = normalize_spaces(&name.replace('_', " "));
    if !name.is_empty() && !categories.contains(&name) {
        categories.push(name);
    }
}

fn replace_external_links(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut index = 0usize;

    while index < text.len() {
        let rest = &text[index..];
        let is_external = rest.starts_with("[http://")
            || rest.starts_with("[https://")
            || rest.starts_with("[//");
        if is_external && let Some(end) = rest.find(']') {
            let inner = &rest[1..end];
            if let Some((_, label)) = inner.split_once(char::is_whitespace) {
                output.push_str(label.trim());
            }
            index += end + 1;
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        output.push(ch);
        index += ch.len_utf8();
    }
    output
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn normalize_lines(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let line = match convert_heading(trimmed) {
            Some(heading) => heading,
            None => normalize_spaces(trimmed.trim_start_matches(['*', '#', ':', ';'])),
        };
        let previous_blank = lines.last().is_none_or(|last| last.is_empty());
        if line.is_empty() && previous_blank {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn convert_heading(line: &str) -> Option<String> {
    if !line.starts_with("==") || !line.ends_with("==") || line.len() < 5 {
        return None;
    }
    let start_equals = line.chars().take_while(|ch| *ch == '=').count();
    let end_equals = line.chars().rev().take_while(|ch| *ch == '=').count();
    if start_equals != end_equals || start_equals + end_equals >= line.len() {
        return None;
    }
    let content = line[start_equals..line.len() - end_equals].trim();
    if content.is_empty() {
        return None;
    }
    let marker = "=".repeat(start_equals);
    Some(format!("{marker} {content} {marker}"))
}

fn normalize_spaces(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_was_space = false;

    for ch in value.chars() {
        if ch.is_whitespace() {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }

    output.trim().to_string()
}
