use std::thread;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::host::{HttpTransport, Notifier};

const QUERY_PARAMS: &str =
    "action=query&prop=revisions&rvslots=*&rvprop=content&format=json&formatversion=2";

pub const WIKI_NOT_CONFIGURED_NOTICE: &str =
    "A Wiki has not been set. Please set your Fandom Wikis in the settings.";

/// One fetched article: canonical title, raw wikitext and viewable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extract {
    pub title: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Extract),
    NotFound,
    NetworkError(String),
}

impl FetchOutcome {
    pub fn into_extract(self) -> Option<Extract> {
        match self {
            Self::Found(extract) => Some(extract),
            Self::NotFound | Self::NetworkError(_) => None,
        }
    }
}

pub fn api_url(wiki: &str, title: &str) -> String {
    format!(
        "https://{wiki}.fandom.com/api.php?{QUERY_PARAMS}&titles={}",
        urlencoding::encode(title)
    )
}

pub fn article_url(wiki: &str, title: &str) -> String {
    format!(
        "https://{wiki}.fandom.com/wiki/{}",
        urlencoding::encode(title)
    )
}

pub fn network_error_notice(wiki: &str) -> String {
    format!(
        "Failed to get Fandom. Check your internet connection or verify if wiki prefix \"{wiki}\" is correct."
    )
}

/// Fetches article wikitext from Fandom wikis through the host transport.
#[derive(Clone, Copy)]
pub struct ArticleFetcher<'a> {
    transport: &'a dyn HttpTransport,
    notifier: &'a dyn Notifier,
}

impl<'a> ArticleFetcher<'a> {
    pub fn new(transport: &'a dyn HttpTransport, notifier: &'a dyn Notifier) -> Self {
        Self {
            transport,
            notifier,
        }
    }

    /// Single attempt against one wiki. Failures become notices, never errors.
    pub fn fetch(&self, wiki: &str, title: &str) -> FetchOutcome {
        let wiki = wiki.trim();
        if wiki.is_empty() {
            self.notifier.notify(WIKI_NOT_CONFIGURED_NOTICE);
            return FetchOutcome::NotFound;
        }

        let url = api_url(wiki, title);
        debug!(wiki, %url, "querying fandom api");
        let result = self
            .transport
            .get_text(&url)
            .and_then(|body| parse_query_response(wiki, &body));
        match result {
            Ok(Some(extract)) => FetchOutcome::Found(extract),
            Ok(None) => {
                debug!(wiki, title, "no page returned");
                FetchOutcome::NotFound
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(wiki, title, error = %message, "fandom fetch failed");
                self.notifier.notify(&network_error_notice(wiki));
                FetchOutcome::NetworkError(message)
            }
        }
    }

    /// Queries every wiki concurrently and keeps the first hit in configured order.
    ///
    /// All requests run to completion; later hits are discarded.
    pub fn fetch_across_wikis(&self, wikis: &[String], title: &str) -> Option<Extract> {
        let outcomes = match wikis {
            [] => return None,
            [wiki] => vec![self.fetch(wiki, title)],
            _ => thread::scope(|scope| {
                let handles = wikis
                    .iter()
                    .map(|wiki| scope.spawn(move || self.fetch(wiki, title)))
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            FetchOutcome::NetworkError("fetch worker panicked".to_string())
                        })
                    })
                    .collect::<Vec<_>>()
            }),
        };

        let found = outcomes.into_iter().find_map(FetchOutcome::into_extract);
        if let Some(extract) = &found {
            debug!(title, url = %extract.url, "selected extract");
        }
        found
    }
}

/// Pull the first page out of a `formatversion=2` revisions query.
pub fn parse_query_response(wiki: &str, body: &str) -> Result<Option<Extract>> {
    let payload: QueryResponse =
        serde_json::from_str(body).context("failed to decode Fandom API JSON response")?;
    if let Some(error) = payload.error {
        bail!("Fandom API error [{}]: {}", error.code, error.info);
    }

    let Some(page) = payload.query.pages.into_iter().next() else {
        return Ok(None);
    };
    if page.missing {
        return Ok(None);
    }
    let content = page
        .revisions
        .into_iter()
        .next()
        .and_then(|revision| revision.slots)
        .and_then(|slots| slots.main)
        .map(|slot| slot.content)
        .filter(|content| !content.is_empty());
    let Some(text) = content else {
        return Ok(None);
    };

    Ok(Some(Extract {
        url: article_url(wiki, &page.title),
        title: page.title,
        text,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    error: Option<ApiErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    pages: Vec<PageQueryItem>,
}

#[derive(Debug, Deserialize)]
struct PageQueryItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<RevisionQueryItem>,
}

#[derive(Debug, Deserialize)]
struct RevisionQueryItem {
    slots: Option<RevisionSlotContainer>,
}

#[derive(Debug, Deserialize)]
struct RevisionSlotContainer {
    main: Option<RevisionMainSlot>,
}

#[derive(Debug, Deserialize)]
struct RevisionMainSlot {
    #[serde(default)]
    content: String,
}
