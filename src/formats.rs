use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One candidate listing found in the result feed. `href` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLink {
    pub name: String,
    #[serde(default)]
    pub class: String,
    pub href: String,
}

/// What one visit to a listing page produced. Absent fields were missing on
/// the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListingRecord {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_rates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<DetailSection>>,
    /// Markers whose label could not be classified, plus any keys written by
    /// other tools.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawListingRecord {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A titled group of bullet items from the details panel.
///
/// On disk a section is a single-entry object: `{"<title>": ["item", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSection {
    pub title: String,
    pub items: Vec<String>,
}

impl Serialize for DetailSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.title, &self.items)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for DetailSection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionVisitor;

        impl<'de> Visitor<'de> for SectionVisitor {
            type Value = DetailSection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one `title: [items]` entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let Some((title, items)) = map.next_entry::<String, Vec<String>>()? else {
                    return Err(de::Error::invalid_length(0, &self));
                };
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(DetailSection { title, items })
            }
        }

        deserializer.deserialize_map(SectionVisitor)
    }
}

/// Canonical output shape. Field order here is the emitted key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    pub address: Value,
    pub authority: Value,
    pub phone: Value,
    pub rating: String,
    pub number_of_rates: Value,
    pub details: Vec<Value>,
}
