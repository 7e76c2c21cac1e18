use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::config::{SEARCH_MAX_QUERY_LEN, SEARCH_MAX_RESULTS};
use crate::types::SECTORS;

/// A visible company as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub id: i64,
    pub ticker: String,
    pub uri: String,
    pub name: String,
    /// `"<ticker> <name>"`, lower-cased, for prefix search.
    #[serde(skip)]
    combined: String,
}

/// One search hit: display text and page URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub n: String,
    pub u: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum UriResolution {
    Sector(String),
    /// Canonical URI the request should be redirected to.
    Redirect(String),
    Company(DirectoryEntry),
    NotFound,
}

/// Process-wide ticker -> company lookup, loaded once at startup.
///
/// Dashed tickers (`BRK-B`) are also reachable by their class-less form (`BRK`).
pub struct CompanyDirectory {
    entries: DashMap<String, DirectoryEntry>,
}

impl CompanyDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new() })
    }

    pub fn add_company(&self, id: i64, ticker: &str, uri: &str, name: &str) {
        let entry = DirectoryEntry {
            id,
            ticker: ticker.to_string(),
            uri: uri.to_string(),
            name: name.to_string(),
            combined: format!("{} {}", ticker.to_lowercase(), name.to_lowercase()),
        };
        if let Some((class_less, _)) = ticker.split_once('-').filter(|(head, _)| !head.is_empty()) {
            self.entries.insert(class_less.to_string(), entry.clone());
        }
        self.entries.insert(ticker.to_string(), entry);
    }

    pub fn get(&self, ticker: &str) -> Option<DirectoryEntry> {
        self.entries.get(ticker).map(|e| e.clone())
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.entries.contains_key(ticker)
    }

    /// Number of lookup keys, class-less aliases included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prefix search over ticker and name. An exact ticker match is listed first.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let q = sanitize_query(query);
        if q.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(String, DirectoryEntry)> = self
            .entries
            .iter()
            .filter(|e| matches_prefix(e.value(), &q))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        // Stable: exact ticker first, everything else keeps ticker order.
        hits.sort_by_key(|(key, _)| key.to_lowercase() != q);

        hits.into_iter()
            .take(SEARCH_MAX_RESULTS)
            .map(|(key, entry)| SearchHit {
                n: format!("{key} {}", entry.name),
                u: entry.uri,
            })
            .collect()
    }

    /// Works out what a page URI refers to. Anything after a comma is ignored.
    pub fn resolve_uri(&self, uri: &str) -> UriResolution {
        let uri = uri.split(',').next().unwrap_or_default();

        if uri.chars().count() > 3 {
            let name = uri.replacen('-', " ", 1);
            if SECTORS.contains(&name.as_str()) {
                return UriResolution::Sector(name);
            }
            let titled = title_case(&name);
            if SECTORS.contains(&titled.as_str()) {
                return UriResolution::Redirect(titled.replacen(' ', "-", 1));
            }
        }

        let Some(ticker) = self.ticker_from_uri(uri) else {
            debug!(uri, "URI does not look like a ticker");
            return UriResolution::NotFound;
        };
        match self.get(&ticker.to_uppercase()) {
            None => {
                debug!(uri, ticker, "Invalid URI");
                UriResolution::NotFound
            }
            Some(entry) if entry.uri != uri => UriResolution::Redirect(entry.uri),
            Some(entry) => UriResolution::Company(entry),
        }
    }

    /// `AAPL-Apple` -> `AAPL`, `BRK-B-Berkshire` -> `BRK-B`, `JW-A` -> `JW-A`, `MSFT` -> `MSFT`.
    fn ticker_from_uri<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let first_dash = uri.find('-');

        if let Some(with_class) = find_ticker_with_class(uri) {
            if self.contains(&with_class.to_uppercase()) {
                return Some(with_class);
            }
            // e.g. TROW-T-Rowe-Price, where the ticker itself has no class
            return first_dash.map(|i| &uri[..i]);
        }

        match first_dash {
            Some(i) if (1..=6).contains(&i) => {
                if uri.len() < 6 && self.contains(&uri.to_uppercase()) {
                    Some(uri)
                } else {
                    Some(&uri[..i])
                }
            }
            _ if uri.len() <= 5 => Some(uri),
            _ => None,
        }
    }
}

fn sanitize_query(query: &str) -> String {
    query
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || matches!(c, ' ' | '-' | '\''))
        .take(SEARCH_MAX_QUERY_LEN)
        .collect()
}

fn matches_prefix(entry: &DirectoryEntry, q: &str) -> bool {
    entry.combined.starts_with(q)
        || entry
            .combined
            .get(entry.ticker.len() + 1..)
            .is_some_and(|name| name.starts_with(q))
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Leftmost `XX-Y-` .. `XXXX-Y-` pattern, returned without the trailing dash.
fn find_ticker_with_class(uri: &str) -> Option<&str> {
    let bytes = uri.as_bytes();
    for start in 0..bytes.len() {
        for len in (2..=4).rev() {
            let end = start + len;
            if end + 3 > bytes.len() {
                continue;
            }
            if bytes[start..end].iter().all(|b| is_word(*b))
                && bytes[end] == b'-'
                && is_word(bytes[end + 1])
                && bytes[end + 2] == b'-'
            {
                return uri.get(start..end + 2);
            }
        }
    }
    None
}

/// `consumer-staples` -> `Consumer Staples`
pub fn title_case(input: &str) -> String {
    input
        .to_lowercase()
        .split([' ', '-'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
        .replacen("And", "and", 1)
}
