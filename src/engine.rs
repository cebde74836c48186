//! Query handlers and the JSON method dispatcher.

use std::sync::Arc;

use ahash::AHashSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::corpus::{Corpus, CorpusStats};
use crate::error::{Error, Result};
use crate::fuzzy;
use crate::grammar::Grammar;
use crate::prune::prune;
use crate::tree::LinkTree;
use crate::variants::url_variants;

pub const DEFAULT_COUNT_LIMIT: usize = 8;
pub const LINK_SET_PREFIX_LIMIT: usize = 16;
/// Exclusive upper bound of a search `limit`.
pub const SEARCH_LIMIT_BOUND: i64 = 100;

const METHOD_PREFIXES: &[&str] = &["burl.", "linkremark."];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionsOptions {
    #[serde(rename = "countLimit")]
    pub count_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionsRequest {
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<MentionsOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, alias = "tolerance", skip_serializing_if = "Option::is_none")]
    pub tol: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSetRequest {
    #[serde(default)]
    pub prefix: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSetResponse {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelloResponse {
    pub capabilities: Vec<&'static str>,
}

/// Link lookup over the configured documents.
///
/// Cheap to share between threads; the corpus is built by the first query
/// that needs it.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    corpus: Corpus,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let grammar = Arc::new(Grammar::new(&config.extra_schemes)?);
        let corpus = Corpus::new(grammar, config.sources.clone());
        Ok(Self { config, corpus })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut capabilities = vec!["urlMentions", "search"];
        if !self.config.disable_link_set {
            capabilities.push("linkSet");
        }
        capabilities
    }

    /// Where the given URLs are mentioned, as a pruned tree.
    pub fn url_mentions(&self, request: &MentionsRequest) -> Result<LinkTree> {
        let variants: AHashSet<String> = request
            .variants
            .iter()
            .filter(|url| !url.is_empty())
            .flat_map(|url| url_variants(url))
            .collect();
        if variants.is_empty() {
            log::debug!("urlMentions without URLs");
            return Err(Error::NoUrls);
        }
        let count_limit = request
            .options
            .as_ref()
            .and_then(|o| o.count_limit)
            .unwrap_or(DEFAULT_COUNT_LIMIT);

        let tree = self.corpus.get_or_build()?;
        let pruned = prune(&tree, &|link| variants.contains(&link.url), count_limit);
        log::debug!(
            "urlMentions: {} variant(s), {} link(s) kept",
            variants.len(),
            pruned.link_count()
        );
        Ok(pruned)
    }

    /// Corpus URLs closest to the query words, best first.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let limit = match request.limit {
            None => fuzzy::DEFAULT_LIMIT,
            Some(n) if n > 0 && n < SEARCH_LIMIT_BOUND => n as usize,
            Some(n) => {
                log::debug!("search limit {n} rejected");
                return Err(Error::LimitOutOfRange(n));
            }
        };
        let tolerance = match request.tol {
            None => fuzzy::DEFAULT_TOLERANCE,
            Some(n) if n >= 0 => n as usize,
            Some(n) => {
                log::debug!("search tolerance {n} rejected");
                return Err(Error::NegativeTolerance(n));
            }
        };

        let tree = self.corpus.get_or_build()?;
        let words: Vec<&str> = request.q.split_whitespace().collect();
        let urls = tree.links().map(|link| link.url.as_str());
        Ok(fuzzy::search(&words, urls, limit, tolerance)
            .into_iter()
            .map(|ranked| SearchHit {
                url: ranked.text.to_string(),
            })
            .collect())
    }

    /// Every distinct link starting with one of the request's prefixes.
    pub fn link_set(&self, request: &LinkSetRequest) -> Result<LinkSetResponse> {
        if self.config.disable_link_set {
            return Err(Error::MethodDisabled("linkSet"));
        }
        if request.prefix.len() > LINK_SET_PREFIX_LIMIT {
            log::debug!("linkSet prefixes {:?}", request.prefix);
            return Err(Error::TooManyPrefixes {
                count: request.prefix.len(),
                max: LINK_SET_PREFIX_LIMIT,
            });
        }
        let mut urls: Vec<String> = self.corpus.link_set(&request.prefix)?.into_iter().collect();
        urls.sort();
        Ok(LinkSetResponse { urls })
    }

    pub fn stats(&self) -> Result<CorpusStats> {
        let tree = self.corpus.get_or_build()?;
        Ok(CorpusStats::of(&tree))
    }

    /// Run a method by name with JSON parameters.
    ///
    /// Method names may carry a `burl.` or `linkremark.` namespace. `params`
    /// is the request object, a one-element array holding it, or `null`.
    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        let name = METHOD_PREFIXES
            .iter()
            .find_map(|prefix| method.strip_prefix(prefix))
            .unwrap_or(method);
        let params = unwrap_params(params);
        match name {
            "urlMentions" => encode(&self.url_mentions(&decode::<MentionsRequest>(params)?)?),
            "search" => encode(&self.search(&decode::<SearchRequest>(params)?)?),
            "linkSet" => encode(&self.link_set(&decode::<LinkSetRequest>(params)?)?),
            "hello" => encode(&HelloResponse {
                capabilities: self.capabilities(),
            }),
            _ => {
                log::debug!("unknown method {method}");
                Err(Error::UnknownMethod(method.to_string()))
            }
        }
    }
}

fn unwrap_params(params: Value) -> Value {
    match params {
        Value::Null => Value::Object(Default::default()),
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::InvalidRequest(e.to_string()))
}

fn encode<T: Serialize>(reply: &T) -> Result<Value> {
    serde_json::to_value(reply).map_err(|e| Error::Encode(e.to_string()))
}
