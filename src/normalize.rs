use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Last whitespace-delimited token of a street name, trailing period included.
static STREET_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\S+\.?$").unwrap());

static ZIP_PLUS_FOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{5})-\d{4}$").unwrap());

/// Street suffixes considered already clean. The numeric and single-letter
/// entries are route names and designators found in the Berkeley extract.
pub const EXPECTED_SUFFIXES: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane", "Road",
    "Trail", "Parkway", "Commons", "Alameda", "Broadway", "Circle", "Freeway", "Hall",
    "Highway", "Loma", "Path", "Plaza", "Steps", "Terrace", "View", "Walk", "Way", "Cut",
    "10675", "155", "411", "E", "H", "M",
];

pub const SUFFIX_ABBREVIATIONS: &[(&str, &str)] =
    &[("St", "Street"), ("Ave", "Avenue"), ("Blvd", "Boulevard")];

/// Rewrites abbreviated street suffixes to their full form.
#[derive(Debug, Clone)]
pub struct StreetNormalizer {
    expected: Vec<String>,
    mapping: FxHashMap<String, String>,
    strip_trailing_period: bool,
}

impl Default for StreetNormalizer {
    fn default() -> Self {
        Self::new(
            EXPECTED_SUFFIXES.iter().copied(),
            SUFFIX_ABBREVIATIONS.iter().copied(),
        )
    }
}

impl StreetNormalizer {
    pub fn new<'a>(
        expected: impl IntoIterator<Item = &'a str>,
        mapping: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            expected: expected.into_iter().map(str::to_string).collect(),
            mapping: mapping
                .into_iter()
                .map(|(abbr, full)| (abbr.to_string(), full.to_string()))
                .collect(),
            strip_trailing_period: false,
        }
    }

    /// When enabled, `"St."` is looked up as `"St"`. Off by default, so a
    /// period-suffixed abbreviation is left alone and only shows up in the audit.
    pub fn with_period_stripping(mut self, enabled: bool) -> Self {
        self.strip_trailing_period = enabled;
        self
    }

    pub fn suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        STREET_TYPE.find(name).map(|m| m.as_str())
    }

    pub fn is_expected(&self, suffix: &str) -> bool {
        self.expected.iter().any(|e| e == suffix)
    }

    /// Suffix of `name` when it is missing from the expected list.
    pub fn unrecognized_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.suffix(name).filter(|s| !self.is_expected(s))
    }

    fn full_form(&self, suffix: &str) -> Option<&str> {
        if let Some(full) = self.mapping.get(suffix) {
            return Some(full.as_str());
        }
        if self.strip_trailing_period {
            if let Some(bare) = suffix.strip_suffix('.') {
                return self.mapping.get(bare).map(String::as_str);
            }
        }
        None
    }

    /// Replaces only the trailing token; earlier occurrences of the same text stay intact.
    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        let Some(m) = STREET_TYPE.find(name) else {
            return Cow::Borrowed(name);
        };
        if self.is_expected(m.as_str()) {
            return Cow::Borrowed(name);
        }
        match self.full_form(m.as_str()) {
            Some(full) => Cow::Owned(format!("{}{}", &name[..m.start()], full)),
            None => Cow::Borrowed(name),
        }
    }
}

/// Truncates ZIP+4 codes (`94720-1234`) to their five-digit form.
pub fn normalize_postcode(code: &str) -> Cow<'_, str> {
    match ZIP_PLUS_FOUR.captures(code).and_then(|c| c.get(1)) {
        Some(five) => Cow::Borrowed(five.as_str()),
        None => Cow::Borrowed(code),
    }
}

/// Audit check: a code conforms when it is the locality prefix followed by
/// enough digits to make five in total.
#[derive(Debug, Clone)]
pub struct PostcodeRule {
    pattern: Regex,
}

impl PostcodeRule {
    pub fn for_prefix(prefix: &str) -> Result<Self, regex::Error> {
        let remaining = 5usize.saturating_sub(prefix.chars().count());
        let pattern = Regex::new(&format!(r"^{}\d{{{}}}$", regex::escape(prefix), remaining))?;
        Ok(Self { pattern })
    }

    pub fn conforms(&self, code: &str) -> bool {
        self.pattern.is_match(code)
    }
}

/// Outcome of running one tag value through the cleaning rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleaned {
    Unchanged,
    Street,
    Postcode,
}

/// The cleaning rules applied while shaping, keyed by `(type, key)` of a tag.
#[derive(Debug, Clone, Default)]
pub struct ValueNormalizer {
    pub streets: StreetNormalizer,
    pub clean_postcodes: bool,
}

impl ValueNormalizer {
    pub fn new(streets: StreetNormalizer, clean_postcodes: bool) -> Self {
        Self {
            streets,
            clean_postcodes,
        }
    }

    pub fn apply(&self, tag_type: &str, key: &str, value: &str) -> (String, Cleaned) {
        let (cleaned, rule) = match (tag_type, key) {
            ("addr", "street") => (self.streets.normalize(value), Cleaned::Street),
            ("addr", "postcode") if self.clean_postcodes => {
                (normalize_postcode(value), Cleaned::Postcode)
            }
            _ => (Cow::Borrowed(value), Cleaned::Unchanged),
        };
        if cleaned != value {
            (cleaned.into_owned(), rule)
        } else {
            (value.to_string(), Cleaned::Unchanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn expands_abbreviated_suffix() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize("123 Main St"), "123 Main Street");
        assert_eq!(streets.normalize("Telegraph Ave"), "Telegraph Avenue");
        assert_eq!(streets.normalize("Shattuck Blvd"), "Shattuck Boulevard");
    }

    #[test]
    fn leaves_expected_suffix_alone() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize("Bancroft Way"), "Bancroft Way");
        assert_eq!(streets.normalize("Highway 155"), "Highway 155");
    }

    #[test]
    fn unknown_suffix_is_unchanged() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize("Euclid Ln"), "Euclid Ln");
        assert_eq!(streets.unrecognized_suffix("Euclid Ln"), Some("Ln"));
        assert_eq!(streets.unrecognized_suffix("Euclid Lane"), None);
    }

    #[test]
    fn only_trailing_token_is_replaced() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize("Stanford St"), "Stanford Street");
        assert_eq!(streets.normalize("St Marys St"), "St Marys Street");
    }

    #[test]
    fn period_suffix_is_kept_by_default() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize("456 Mission Blvd."), "456 Mission Blvd.");
        assert_eq!(streets.unrecognized_suffix("456 Mission Blvd."), Some("Blvd."));
    }

    #[test]
    fn period_suffix_expands_when_stripping() {
        let streets = StreetNormalizer::default().with_period_stripping(true);
        assert_eq!(streets.normalize("456 Mission Blvd."), "456 Mission Boulevard");
    }

    #[test]
    fn empty_name_is_unchanged() {
        let streets = StreetNormalizer::default();
        assert_eq!(streets.normalize(""), "");
        assert_eq!(streets.suffix(""), None);
    }

    #[test]
    fn postcode_truncation() {
        assert_eq!(normalize_postcode("94720-1234"), "94720");
        assert_eq!(normalize_postcode("94704"), "94704");
        assert_eq!(normalize_postcode("9470"), "9470");
        assert_eq!(normalize_postcode("CA 94704"), "CA 94704");
    }

    #[test]
    fn postcode_rule_uses_prefix() {
        let rule = PostcodeRule::for_prefix("947").unwrap();
        assert!(rule.conforms("94704"));
        assert!(!rule.conforms("94720-1234"));
        assert!(!rule.conforms("94608"));
        assert!(!rule.conforms("9470"));

        let other = PostcodeRule::for_prefix("946").unwrap();
        assert!(other.conforms("94608"));
    }

    #[test]
    fn value_normalizer_routes_by_key() {
        let normalizer = ValueNormalizer::default();
        assert_eq!(
            normalizer.apply("addr", "street", "123 Main St"),
            ("123 Main Street".to_string(), Cleaned::Street)
        );
        assert_eq!(
            normalizer.apply("regular", "street", "123 Main St"),
            ("123 Main St".to_string(), Cleaned::Unchanged)
        );
        assert_eq!(
            normalizer.apply("addr", "postcode", "94720-1234"),
            ("94720-1234".to_string(), Cleaned::Unchanged)
        );
    }

    #[test]
    fn postcode_cleaning_is_opt_in() {
        let normalizer = ValueNormalizer::new(StreetNormalizer::default(), true);
        assert_eq!(
            normalizer.apply("addr", "postcode", "94720-1234"),
            ("94720".to_string(), Cleaned::Postcode)
        );
    }

    proptest! {
        #[test]
        fn street_normalization_is_idempotent(name in "[A-Za-z0-9 .]{0,24}") {
            let streets = StreetNormalizer::default();
            let once = streets.normalize(&name).into_owned();
            let twice = streets.normalize(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn idempotent_with_period_stripping(name in "[A-Za-z0-9 .]{0,24}") {
            let streets = StreetNormalizer::default().with_period_stripping(true);
            let once = streets.normalize(&name).into_owned();
            let twice = streets.normalize(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn postcode_normalization_is_idempotent(code in "[0-9-]{0,11}") {
            let once = normalize_postcode(&code).into_owned();
            prop_assert_eq!(normalize_postcode(&once).into_owned(), once);
        }
    }
}
