//! Hypermedia links.
//!
//! Every link the kernel emits goes through [`build_link`], which switches
//! over a closed set of [`LinkKind`] variants. Each variant carries only
//! the context its URL needs.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;

use super::filter::PAGE_PARAM;

/// Builds absolute URLs for collection routes.
pub trait UrlBuilder: Send + Sync {
    /// Absolute URL of a collection display with the given query pairs.
    fn collection_url(&self, collection: &str, display: &str, params: &[(String, String)])
    -> String;
}

/// URL builder rooted at the public site URL and the collections base path.
#[derive(Debug, Clone)]
pub struct BaseUrlBuilder {
    site_url: String,
    base_path: String,
}

impl BaseUrlBuilder {
    /// Create a builder. `site_url` must be an absolute URL.
    pub fn new(site_url: &str, base_path: &str) -> Result<Self> {
        let parsed =
            Url::parse(site_url).with_context(|| format!("invalid site URL '{site_url}'"))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("site URL '{site_url}' cannot be a base URL");
        }

        Ok(Self {
            site_url: parsed.as_str().trim_end_matches('/').to_string(),
            base_path: normalize_base_path(base_path),
        })
    }
}

impl UrlBuilder for BaseUrlBuilder {
    fn collection_url(
        &self,
        collection: &str,
        display: &str,
        params: &[(String, String)],
    ) -> String {
        let mut url = format!(
            "{}{}/{}/{}",
            self.site_url,
            self.base_path,
            urlencoding::encode(collection),
            urlencoding::encode(display)
        );

        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(params));
        }

        url
    }
}

/// Normalize a base path to `/segment[/segment...]` with no trailing slash.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Encode query pairs in order. Brackets in keys are left readable so
/// `filter[status]` survives as written.
fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let key = urlencoding::encode(key)
                .replace("%5B", "[")
                .replace("%5D", "]");
            format!("{key}={}", urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// A single link object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

/// Named links attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LinkSet(BTreeMap<String, Link>);

impl LinkSet {
    pub fn insert(&mut self, key: String, link: Link) {
        self.0.insert(key, link);
    }

    pub fn get(&self, key: &str) -> Option<&Link> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Direction of a page link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRelation {
    Prev,
    Next,
}

/// Kinds of links, each with the context its URL needs.
#[derive(Debug, Clone, Copy)]
pub enum LinkKind<'a> {
    /// Entry-point pointer at a collection display.
    Items {
        collection: &'a str,
        display: &'a str,
    },

    /// Navigation to another page of the current request. The request's
    /// query pairs are carried so only the page value changes.
    Page {
        relation: PageRelation,
        collection: &'a str,
        display: &'a str,
        params: &'a [(String, String)],
        page: u32,
    },
}

/// Build the key and link for a link kind.
pub fn build_link(kind: &LinkKind<'_>, urls: &dyn UrlBuilder) -> (String, Link) {
    match *kind {
        LinkKind::Items {
            collection,
            display,
        } => (
            format!("collections--{collection}-{display}"),
            Link {
                href: urls.collection_url(collection, display, &[]),
            },
        ),
        LinkKind::Page {
            relation,
            collection,
            display,
            params,
            page,
        } => {
            let key = match relation {
                PageRelation::Prev => "prev",
                PageRelation::Next => "next",
            };
            let params = with_page(params, page);
            (
                key.to_string(),
                Link {
                    href: urls.collection_url(collection, display, &params),
                },
            )
        }
    }
}

/// Clone query pairs, overwriting only the page value.
///
/// The first page pair keeps its position, later duplicates are dropped,
/// and the page is appended when the request had none.
pub fn with_page(params: &[(String, String)], page: u32) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(params.len() + 1);
    let mut placed = false;

    for (key, value) in params {
        if key == PAGE_PARAM {
            if !placed {
                out.push((key.clone(), page.to_string()));
                placed = true;
            }
        } else {
            out.push((key.clone(), value.clone()));
        }
    }

    if !placed {
        out.push((PAGE_PARAM.to_string(), page.to_string()));
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn builder() -> BaseUrlBuilder {
        BaseUrlBuilder::new("http://localhost:3000/", "/collections/").unwrap()
    }

    #[test]
    fn collection_url_without_params() {
        assert_eq!(
            builder().collection_url("rooms", "page", &[]),
            "http://localhost:3000/collections/rooms/page"
        );
    }

    #[test]
    fn collection_url_keeps_brackets_and_encodes_values() {
        let url = builder().collection_url(
            "rooms",
            "page",
            &pairs(&[("filter[title]", "blue room"), ("page", "1")]),
        );
        assert_eq!(
            url,
            "http://localhost:3000/collections/rooms/page?filter[title]=blue%20room&page=1"
        );
    }

    #[test]
    fn invalid_site_url_rejected() {
        assert!(BaseUrlBuilder::new("not a url", "/collections").is_err());
    }

    #[test]
    fn base_path_normalization() {
        assert_eq!(normalize_base_path("collections"), "/collections");
        assert_eq!(normalize_base_path("/api/collections/"), "/api/collections");
        assert_eq!(normalize_base_path("/"), "");
    }

    #[test]
    fn with_page_overwrites_in_place() {
        let params = pairs(&[("page", "1"), ("status", "1"), ("page", "7")]);
        assert_eq!(
            with_page(&params, 2),
            pairs(&[("page", "2"), ("status", "1")])
        );
    }

    #[test]
    fn with_page_appends_when_absent() {
        let params = pairs(&[("status", "1")]);
        assert_eq!(
            with_page(&params, 0),
            pairs(&[("status", "1"), ("page", "0")])
        );
    }

    #[test]
    fn page_links_preserve_other_params() {
        let params = pairs(&[("status", "1"), ("page", "1")]);
        let urls = builder();

        for relation in [PageRelation::Prev, PageRelation::Next] {
            let (key, link) = build_link(
                &LinkKind::Page {
                    relation,
                    collection: "rooms",
                    display: "page",
                    params: &params,
                    page: 5,
                },
                &urls,
            );
            assert!(key == "prev" || key == "next");
            assert!(link.href.contains("status=1"));
            assert!(link.href.contains("page=5"));
        }
    }

    #[test]
    fn items_link_key() {
        let (key, link) = build_link(
            &LinkKind::Items {
                collection: "rooms",
                display: "block",
            },
            &builder(),
        );
        assert_eq!(key, "collections--rooms-block");
        assert_eq!(link.href, "http://localhost:3000/collections/rooms/block");
    }

    #[test]
    fn link_set_serializes_as_object() {
        let mut links = LinkSet::default();
        links.insert(
            "next".to_string(),
            Link {
                href: "http://x/next".to_string(),
            },
        );
        let json = serde_json::to_value(&links).unwrap();
        assert_eq!(json, serde_json::json!({"next": {"href": "http://x/next"}}));
    }
}
