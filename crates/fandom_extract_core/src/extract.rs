use anyhow::Result;
use tracing::{debug, info};

use crate::config::Settings;
use crate::disambiguation;
use crate::fetch::{ArticleFetcher, Extract};
use crate::format::format_extract;
use crate::host::{EditorSink, HttpTransport, Notifier, SearchPrompt};

pub const DISAMBIGUATION_UNRESOLVED_NOTICE: &str =
    "Could not automatically resolve disambiguation.";
pub const SEARCH_PROMPT_MESSAGE: &str = "Enter Search Term:";

pub fn not_found_notice(search_term: &str) -> String {
    format!("{search_term} not found on Fandom.")
}

pub fn disambiguation_notice(search_term: &str) -> String {
    format!("Disambiguation found for {search_term}. Choosing first result.")
}

/// Terminal state of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Formatted { extract: Extract, text: String },
    NotFound,
    DisambiguationUnresolved,
}

impl ExtractionOutcome {
    pub fn formatted_text(&self) -> Option<&str> {
        match self {
            Self::Formatted { text, .. } => Some(text.as_str()),
            Self::NotFound | Self::DisambiguationUnresolved => None,
        }
    }
}

/// Runs fetch, disambiguation and formatting against one settings snapshot.
pub struct Extractor<'a> {
    fetcher: ArticleFetcher<'a>,
    notifier: &'a dyn Notifier,
    settings: &'a Settings,
}

impl<'a> Extractor<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        notifier: &'a dyn Notifier,
        settings: &'a Settings,
    ) -> Self {
        Self {
            fetcher: ArticleFetcher::new(transport, notifier),
            notifier,
            settings,
        }
    }

    /// Resolve `search_term` to formatted text. Every failing path emits
    /// exactly one notice of its own.
    pub fn extract_for_term(&self, search_term: &str) -> ExtractionOutcome {
        let wikis = self.settings.wikis();
        let Some(extract) = self.fetcher.fetch_across_wikis(&wikis, search_term) else {
            self.notifier.notify(&not_found_notice(search_term));
            return ExtractionOutcome::NotFound;
        };

        let extract = if disambiguation::is_disambiguation(&extract) {
            self.notifier.notify(&disambiguation_notice(search_term));
            let candidate = match disambiguation::resolve(&extract) {
                Ok(candidate) => candidate,
                Err(failure) => {
                    debug!(search_term, %failure, "disambiguation could not be parsed");
                    self.notifier.notify(DISAMBIGUATION_UNRESOLVED_NOTICE);
                    return ExtractionOutcome::DisambiguationUnresolved;
                }
            };
            info!(search_term, %candidate, "resolving disambiguation");
            match self.fetcher.fetch_across_wikis(&wikis, &candidate) {
                Some(resolved) => resolved,
                None => {
                    self.notifier.notify(DISAMBIGUATION_UNRESOLVED_NOTICE);
                    return ExtractionOutcome::DisambiguationUnresolved;
                }
            }
        } else {
            extract
        };

        let text = format_extract(&extract, search_term, self.settings);
        ExtractionOutcome::Formatted { extract, text }
    }

    /// Run the pipeline and insert the result; nothing is inserted on failure.
    pub fn paste_into_editor(
        &self,
        editor: &mut dyn EditorSink,
        search_term: &str,
    ) -> Result<ExtractionOutcome> {
        let outcome = self.extract_for_term(search_term);
        if let Some(text) = outcome.formatted_text() {
            editor.insert_at_cursor(text)?;
        }
        Ok(outcome)
    }

    /// Use the active document's title as the search term. A missing or blank
    /// title does nothing.
    pub fn fetch_for_active_title(
        &self,
        editor: &mut dyn EditorSink,
        title: Option<&str>,
    ) -> Result<Option<ExtractionOutcome>> {
        match title.map(str::trim).filter(|title| !title.is_empty()) {
            Some(title) => self.paste_into_editor(editor, title).map(Some),
            None => Ok(None),
        }
    }

    /// Ask the user for a search term. A dismissed or blank prompt does nothing.
    pub fn fetch_for_prompted_term(
        &self,
        editor: &mut dyn EditorSink,
        prompt: &mut dyn SearchPrompt,
    ) -> Result<Option<ExtractionOutcome>> {
        let answer = prompt.prompt(SEARCH_PROMPT_MESSAGE);
        self.fetch_for_active_title(editor, answer.as_deref())
    }
}
