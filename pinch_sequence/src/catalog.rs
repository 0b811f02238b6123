//! Catalog listing wire format, ordering and search.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::CatalogError;

/// Shown in place of a missing composer.
pub const UNKNOWN_COMPOSER: &str = "Unknown composer";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CatalogItem {
    /// Servers send this as either a number or a string.
    #[serde(deserialize_with = "id_string")]
    pub id:       String,
    /// `null` reads as an empty title; the item still lists.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title:    String,
    #[serde(default)]
    pub composer: Option<String>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, composer: Option<&str>) -> Self {
        CatalogItem {
            id:       id.into(),
            title:    title.into(),
            composer: composer.map(str::to_string),
        }
    }

    pub fn composer_or_unknown(&self) -> &str {
        self.composer.as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNKNOWN_COMPOSER)
    }

    fn matches(&self, keyword: &str) -> bool {
        self.title.to_lowercase().contains(keyword)
            || self.composer.as_deref().is_some_and(|c| c.to_lowercase().contains(keyword))
    }
}

fn id_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id {other}"))),
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

// ════════════════════════════════════════════════════════════════════════════
// CatalogPage
// ════════════════════════════════════════════════════════════════════════════

/// One page of the listing.  An empty page means the listing is exhausted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
}

impl CatalogPage {
    /// A page whose `items` is missing or not an array is empty; entries
    /// without an id are dropped.
    pub fn from_json(body: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(body)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let items = value.get("items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|v| CatalogItem::deserialize(v).ok())
            .collect();
        CatalogPage { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Ordering / search
// ════════════════════════════════════════════════════════════════════════════

fn title_order(a: &CatalogItem, b: &CatalogItem) -> Ordering {
    a.title.to_uppercase().cmp(&b.title.to_uppercase())
}

/// Case-insensitive title order; ties keep their listing order.
pub fn sort_by_title(items: &mut [CatalogItem]) {
    items.sort_by(title_order);
}

/// Items whose title or composer contains `keyword`, ignoring case and
/// surrounding whitespace.  A blank keyword keeps everything.
pub fn filter_items<'a>(items: &'a [CatalogItem], keyword: &str) -> Vec<&'a CatalogItem> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|item| item.matches(&keyword)).collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_may_be_numbers_or_strings() {
        let page = CatalogPage::from_json(
            r#"{"items":[{"id":7,"title":"A"},{"id":"x9","title":"B","composer":"Bach"},{"title":"no id"}]}"#,
        ).unwrap();
        assert_eq!(page.items, vec![
            CatalogItem::new("7", "A", None),
            CatalogItem::new("x9", "B", Some("Bach")),
        ]);
    }

    #[test]
    fn null_title_or_composer_keeps_the_item() {
        let page = CatalogPage::from_json(
            r#"{"items":[{"id":1,"title":null,"composer":"X"},{"id":2,"title":"B","composer":null}]}"#,
        ).unwrap();
        assert_eq!(page.items, vec![
            CatalogItem::new("1", "", Some("X")),
            CatalogItem::new("2", "B", None),
        ]);
        let mut items = page.items;
        sort_by_title(&mut items);
        assert_eq!(items[0].id, "1");
    }

    #[test]
    fn missing_items_is_an_empty_page() {
        assert!(CatalogPage::from_json(r#"{"total":0}"#).unwrap().is_empty());
        assert!(CatalogPage::from_json(r#"{"items":null}"#).unwrap().is_empty());
        assert!(CatalogPage::from_json("not json").is_err());
    }

    #[test]
    fn sorts_ignoring_case() {
        let mut items = vec![
            CatalogItem::new("1", "banana", None),
            CatalogItem::new("2", "Apple", None),
            CatalogItem::new("3", "cherry", None),
            CatalogItem::new("4", "", None),
        ];
        sort_by_title(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["", "Apple", "banana", "cherry"]);
    }

    #[test]
    fn filter_matches_title_or_composer() {
        let items = vec![
            CatalogItem::new("1", "Moonlight Sonata", Some("Beethoven")),
            CatalogItem::new("2", "Air", Some("Bach")),
            CatalogItem::new("3", "Untitled", None),
        ];
        let ids = |hits: Vec<&CatalogItem>| hits.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(filter_items(&items, "  MOON ")), vec!["1"]);
        assert_eq!(ids(filter_items(&items, "bach")), vec!["2"]);
        assert_eq!(ids(filter_items(&items, "")), vec!["1", "2", "3"]);
        assert!(filter_items(&items, "mozart").is_empty());
    }

    #[test]
    fn composer_placeholder() {
        assert_eq!(CatalogItem::new("1", "t", None).composer_or_unknown(), UNKNOWN_COMPOSER);
        assert_eq!(CatalogItem::new("1", "t", Some(" ")).composer_or_unknown(), UNKNOWN_COMPOSER);
        assert_eq!(CatalogItem::new("1", "t", Some("Satie")).composer_or_unknown(), "Satie");
    }
}
