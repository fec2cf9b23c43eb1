//! Interpretation of semantically unlabeled page content.

use std::sync::LazyLock;

use regex::Regex;

static LEADING_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\w\d]+").expect("leading symbol pattern is valid"));

/// Which contact field a marker element carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLabel {
    Address,
    Phone,
    Authority,
    Unknown,
}

impl FieldLabel {
    pub fn from_marker(marker: &str) -> Self {
        if marker.starts_with("address") {
            Self::Address
        } else if marker.starts_with("phone") {
            Self::Phone
        } else if marker.starts_with("authority") {
            Self::Authority
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Authority => "authority",
            Self::Unknown => "unknown",
        }
    }
}

/// Phone markers look like `phone:tel:0522000000`; the number is the third
/// `:`-separated segment.
pub fn phone_from_marker(marker: &str) -> Option<&str> {
    marker.split(':').nth(2)
}

pub fn strip_leading_symbols(text: &str) -> String {
    LEADING_SYMBOLS.replace(text.trim(), "").into_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingFields {
    pub rating: Option<String>,
    pub number_of_rates: Option<String>,
}

/// Turns the flattened list of non-empty body-text spans into rating fields.
pub trait SpanInterpreter: Send + Sync {
    fn interpret(&self, spans: &[String]) -> RatingFields;
}

/// The layout where the rating is the first span and the review count the
/// third.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalSpans {
    pub rating_index: usize,
    pub count_index: usize,
}

impl Default for PositionalSpans {
    fn default() -> Self {
        Self {
            rating_index: 0,
            count_index: 2,
        }
    }
}

impl SpanInterpreter for PositionalSpans {
    fn interpret(&self, spans: &[String]) -> RatingFields {
        RatingFields {
            rating: spans.get(self.rating_index).cloned(),
            number_of_rates: spans.get(self.count_index).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_marker_prefix() {
        assert_eq!(FieldLabel::from_marker("address"), FieldLabel::Address);
        assert_eq!(FieldLabel::from_marker("phone:tel:0522"), FieldLabel::Phone);
        assert_eq!(FieldLabel::from_marker("authority"), FieldLabel::Authority);
        assert_eq!(FieldLabel::from_marker("oloc"), FieldLabel::Unknown);
    }

    #[test]
    fn phone_marker_third_segment() {
        assert_eq!(phone_from_marker("phone:tel:0522334455"), Some("0522334455"));
        assert_eq!(phone_from_marker("phone:tel"), None);
    }

    #[test]
    fn leading_symbols_are_removed() {
        assert_eq!(strip_leading_symbols("  Wi-Fi"), "Wi-Fi");
        assert_eq!(strip_leading_symbols("\u{e5ca}Accepte les cartes"), "Accepte les cartes");
        assert_eq!(strip_leading_symbols("· Terrasse"), "Terrasse");
        assert_eq!(strip_leading_symbols("24h/24"), "24h/24");
    }

    #[test]
    fn positional_spans_take_first_and_third() {
        let spans = ["4,5", "(120)", "120"].map(str::to_owned);
        let fields = PositionalSpans::default().interpret(&spans);
        assert_eq!(fields.rating.as_deref(), Some("4,5"));
        assert_eq!(fields.number_of_rates.as_deref(), Some("120"));

        let short = PositionalSpans::default().interpret(&["Café".to_owned()]);
        assert_eq!(short.rating.as_deref(), Some("Café"));
        assert_eq!(short.number_of_rates, None);
    }
}
