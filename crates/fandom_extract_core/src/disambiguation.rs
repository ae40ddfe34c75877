use std::fmt;

use crate::fetch::Extract;

pub const DISAMBIGUATION_MARKER: &str = "may refer to:";

/// Why no alternative title could be pulled out of a disambiguation page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    MissingMarker,
    EmptyCandidate,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMarker => write!(f, "page has no \"{DISAMBIGUATION_MARKER}\" marker"),
            Self::EmptyCandidate => write!(f, "no alternative listed after the marker"),
        }
    }
}

impl std::error::Error for ResolutionFailure {}

pub fn is_disambiguation(extract: &Extract) -> bool {
    extract.text.contains(DISAMBIGUATION_MARKER)
}

/// First listed alternative on a disambiguation page.
///
/// Takes the text after the marker, cuts it at the first section header, and
/// keeps the first comma-separated entry of the first non-blank line. A leading list bullet is dropped and
/// a wikilink entry resolves to its target.
pub fn resolve(extract: &Extract) -> Result<String, ResolutionFailure> {
    let (_, after_marker) = extract
        .text
        .split_once(DISAMBIGUATION_MARKER)
        .ok_or(ResolutionFailure::MissingMarker)?;
    let lead = after_marker.split("==").next().unwrap_or("");
    let line = lead
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    let entry = line.split(',').next().unwrap_or("").trim();
    let entry = entry.trim_start_matches(['*', '#', ':', ';']).trim();
    let candidate = link_target(entry).unwrap_or(entry).trim();

    if candidate.is_empty() {
        return Err(ResolutionFailure::EmptyCandidate);
    }
    Ok(candidate.to_string())
}

fn link_target(entry: &str) -> Option<&str> {
    let inner = entry.strip_prefix("[[")?;
    let end = inner.find("]]").unwrap_or(inner.len());
    let target = inner[..end].split('|').next().unwrap_or("");
    Some(target.trim_start_matches(':'))
}

#[cfg(test)]
mod tests {
    use super::{ResolutionFailure, is_disambiguation, resolve};
    use crate::fetch::Extract;

    fn extract(text: &str) -> Extract {
        Extract {
            title: "Light".to_string(),
            text: text.to_string(),
            url: "https://example.fandom.com/wiki/Light".to_string(),
        }
    }

    #[test]
    fn detection_requires_literal_marker() {
        assert!(is_disambiguation(&extract("Light may refer to:\n\nA, B")));
        assert!(!is_disambiguation(&extract("Light may refer to the sun.")));
        assert!(!is_disambiguation(&extract("Light MAY REFER TO: A")));
    }

    #[test]
    fn resolve_takes_first_entry_before_section() {
        assert_eq!(
            resolve(&extract("X may refer to:\n\nY, Z, ==See also==")),
            Ok("Y".to_string())
        );
        assert_eq!(
            resolve(&extract(
                "Light may refer to:\n\nLight (disambiguation page), Light (novel), ==See also=="
            )),
            Ok("Light (disambiguation page)".to_string())
        );
    }

    #[test]
    fn resolve_unwraps_bulleted_wikilinks() {
        let text = "'''Anakin''' may refer to:\n*[[Anakin Skywalker|Anakin]], a Jedi Knight\n*[[Anakin Solo]]\n==See also==";
        assert_eq!(resolve(&extract(text)), Ok("Anakin Skywalker".to_string()));
    }

    #[test]
    fn resolve_stops_at_end_of_first_bullet() {
        let text = "Light may refer to:\n*Light Yagami\n*Light (novel)\n==See also==";
        assert_eq!(resolve(&extract(text)), Ok("Light Yagami".to_string()));
        let text = "Light may refer to:\n\n# Light (film)\n# Light (novel)";
        assert_eq!(resolve(&extract(text)), Ok("Light (film)".to_string()));
    }

    #[test]
    fn resolve_fails_without_marker_or_candidate() {
        assert_eq!(
            resolve(&extract("Nothing ambiguous here.")),
            Err(ResolutionFailure::MissingMarker)
        );
        assert_eq!(
            resolve(&extract("X may refer to:\n==See also==\n* Y")),
            Err(ResolutionFailure::EmptyCandidate)
        );
    }
}
