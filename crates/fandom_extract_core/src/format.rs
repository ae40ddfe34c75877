use regex::RegexBuilder;
use tracing::warn;

use crate::config::Settings;
use crate::fetch::Extract;
use crate::wikitext;

/// Render an extract into the text inserted at the cursor.
pub fn format_extract(extract: &Extract, search_term: &str, settings: &Settings) -> String {
    let normalized = wikitext::normalize(&extract.text);
    let lead = lead_section(&normalized.plain_text);

    let mut body = if settings.should_use_paragraph_template {
        wrap_paragraphs(lead, &settings.paragraph_template)
    } else {
        lead.trim().to_string()
    };
    if settings.should_bold_search_term {
        body = bold_first_match(&body, search_term, settings.search_term_is_pattern);
    }

    let category_links = settings
        .should_link_categories
        .then(|| link_categories(&normalized.categories));
    if let Some(links) = &category_links {
        body = render_template(&body, &[("categories", links.as_str())]);
    }

    let mut values = vec![
        ("text", body.as_str()),
        ("searchTerm", search_term),
        ("url", extract.url.as_str()),
    ];
    if let Some(links) = &category_links {
        values.push(("categories", links.as_str()));
    }
    render_template(&settings.template, &values)
}

/// Everything before the first section header.
pub fn lead_section(plain_text: &str) -> &str {
    plain_text.split("==").next().unwrap_or("")
}

pub fn wrap_paragraphs(text: &str, paragraph_template: &str) -> String {
    let mut output = String::new();
    for paragraph in text.trim().lines() {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        output.push_str(&render_template(
            paragraph_template,
            &[("paragraphText", paragraph)],
        ));
    }
    output.trim_end().to_string()
}

/// Wrap the first case-insensitive occurrence of `search_term` in `**`.
///
/// The term is matched literally unless `as_pattern` is set, in which case it
/// is compiled as a regular expression; a pattern that fails to compile leaves
/// the text untouched.
pub fn bold_first_match(text: &str, search_term: &str, as_pattern: bool) -> String {
    let search_term = search_term.trim();
    if search_term.is_empty() {
        return text.to_string();
    }
    let pattern = if as_pattern {
        search_term.to_string()
    } else {
        regex::escape(search_term)
    };
    let matcher = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(matcher) => matcher,
        Err(error) => {
            warn!(search_term, %error, "search term is not a valid pattern; skipping bold");
            return text.to_string();
        }
    };

    match matcher.find(text) {
        Some(found) if !found.as_str().is_empty() => format!(
            "{}**{}**{}",
            &text[..found.start()],
            found.as_str(),
            &text[found.end()..]
        ),
        _ => text.to_string(),
    }
}

pub fn link_categories(categories: &[String]) -> String {
    categories
        .iter()
        .map(|category| format!("[[{category}]]"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Substitute `{{name}}` placeholders in one pass.
///
/// Substituted values are never rescanned, and unknown placeholders are left
/// as written.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                output.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                output.push_str("{{");
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}
