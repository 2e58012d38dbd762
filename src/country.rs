use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::format;

/// Shown for any optional field that is absent or empty.
pub const NOT_AVAILABLE: &str = "N/A";

/// Stable handle for a record: its position in the loaded list, which is
/// never mutated once populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryKey(pub usize);

impl CountryKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One entry of the upstream country list. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryRecord {
    pub name: CountryName,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub cca3: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub capital: Option<Vec<String>>,
    #[serde(default)]
    pub timezones: Option<Vec<String>>,
    #[serde(default)]
    pub currencies: Option<OrderedMap<Currency>>,
    #[serde(default)]
    pub languages: Option<OrderedMap<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryName {
    pub common: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Flags {
    #[serde(default)]
    pub png: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Currency {
    #[serde(default)]
    pub name: String,
}

/// JSON object kept in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, value)| value)
    }
}

impl<'de, V> Deserialize<'de> for OrderedMap<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V> Visitor<'de> for OrderedVisitor<V>
        where
            V: Deserialize<'de>,
        {
            type Value = OrderedMap<V>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// A labelled line of the detail overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLine {
    pub label: &'static str,
    pub value: String,
}

impl DetailLine {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

impl CountryRecord {
    pub fn common_name(&self) -> &str {
        &self.name.common
    }

    pub fn flag_url(&self) -> Option<&str> {
        non_empty(Some(self.flags.png.as_str()))
    }

    pub fn flag_emoji(&self) -> &str {
        non_empty(self.flag.as_deref()).unwrap_or("  ")
    }

    pub fn region_text(&self) -> &str {
        non_empty(self.region.as_deref()).unwrap_or(NOT_AVAILABLE)
    }

    pub fn subregion_text(&self) -> &str {
        non_empty(self.subregion.as_deref()).unwrap_or(NOT_AVAILABLE)
    }

    pub fn population_text(&self) -> String {
        format::grouped(self.population)
    }

    pub fn area_text(&self) -> String {
        format!("{} km²", format::grouped_decimal(self.area))
    }

    /// First listed capital.
    pub fn capital_text(&self) -> &str {
        self.capital
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|first| non_empty(Some(first.as_str())))
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn timezones_text(&self) -> String {
        join_or_placeholder(
            self.timezones
                .iter()
                .flatten()
                .map(String::as_str),
        )
    }

    pub fn currencies_text(&self) -> String {
        join_or_placeholder(
            self.currencies
                .iter()
                .flat_map(|map| map.values())
                .map(|currency| currency.name.as_str()),
        )
    }

    pub fn languages_text(&self) -> String {
        join_or_placeholder(
            self.languages
                .iter()
                .flat_map(|map| map.values())
                .map(String::as_str),
        )
    }

    /// Title for the overlay, with the ISO code when the record carries one.
    pub fn title(&self) -> String {
        match non_empty(self.cca3.as_deref()) {
            Some(code) => format!("{} ({})", self.name.common, code),
            None => self.name.common.clone(),
        }
    }

    /// Lines shown in the detail overlay, in display order.
    pub fn detail_lines(&self) -> Vec<DetailLine> {
        vec![
            DetailLine::new("Country", self.name.common.clone()),
            DetailLine::new("Region", self.region_text()),
            DetailLine::new("Population", self.population_text()),
            DetailLine::new("Capital", self.capital_text()),
            DetailLine::new("Area", self.area_text()),
            DetailLine::new("Subregion", self.subregion_text()),
            DetailLine::new("Timezones", self.timezones_text()),
            DetailLine::new("Currencies", self.currencies_text()),
            DetailLine::new("Languages", self.languages_text()),
        ]
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn join_or_placeholder<'a, I>(items: I) -> String
where
    I: Iterator<Item = &'a str>,
{
    let parts: Vec<&str> = items.filter(|item| !item.trim().is_empty()).collect();
    if parts.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UZBEKISTAN: &str = r#"{
        "name": {"common": "Uzbekistan", "official": "Republic of Uzbekistan"},
        "flags": {"png": "https://flagcdn.com/w320/uz.png"},
        "flag": "🇺🇿",
        "cca3": "UZB",
        "region": "Asia",
        "subregion": "Central Asia",
        "population": 34000000,
        "area": 447400.0,
        "capital": ["Tashkent"],
        "timezones": ["UTC+05:00"],
        "currencies": {"UZS": {"name": "Uzbekistani soʻm", "symbol": "so'm"}},
        "languages": {"rus": "Russian", "uzb": "Uzbek"},
        "car": {"side": "right"}
    }"#;

    fn value_of(lines: &[DetailLine], label: &str) -> String {
        lines
            .iter()
            .find(|line| line.label == label)
            .map(|line| line.value.clone())
            .unwrap()
    }

    #[test]
    fn test_full_record_detail_lines() {
        let record: CountryRecord = serde_json::from_str(UZBEKISTAN).unwrap();
        let lines = record.detail_lines();

        assert_eq!(value_of(&lines, "Country"), "Uzbekistan");
        assert_eq!(value_of(&lines, "Region"), "Asia");
        assert_eq!(value_of(&lines, "Population"), "34,000,000");
        assert_eq!(value_of(&lines, "Capital"), "Tashkent");
        assert_eq!(value_of(&lines, "Area"), "447,400 km²");
        assert_eq!(value_of(&lines, "Subregion"), "Central Asia");
        assert_eq!(value_of(&lines, "Timezones"), "UTC+05:00");
        assert_eq!(value_of(&lines, "Currencies"), "Uzbekistani soʻm");
        // Document order, not sorted
        assert_eq!(value_of(&lines, "Languages"), "Russian, Uzbek");
        assert_eq!(record.title(), "Uzbekistan (UZB)");
    }

    #[test]
    fn test_missing_optional_fields_render_placeholder() {
        let record: CountryRecord = serde_json::from_str(
            r#"{"name": {"common": "Antarctica"}, "flags": {"png": ""}, "population": 1000, "area": 14000000}"#,
        )
        .unwrap();
        let lines = record.detail_lines();

        for label in ["Region", "Capital", "Subregion", "Timezones", "Currencies", "Languages"] {
            assert_eq!(value_of(&lines, label), NOT_AVAILABLE, "label {label}");
        }
        assert_eq!(record.flag_url(), None);
        assert_eq!(record.title(), "Antarctica");
    }

    #[test]
    fn test_empty_collections_render_placeholder() {
        let record: CountryRecord = serde_json::from_str(
            r#"{"name": {"common": "Nowhere"}, "capital": [], "timezones": [], "currencies": {}, "languages": {}, "subregion": ""}"#,
        )
        .unwrap();

        assert_eq!(record.capital_text(), NOT_AVAILABLE);
        assert_eq!(record.timezones_text(), NOT_AVAILABLE);
        assert_eq!(record.currencies_text(), NOT_AVAILABLE);
        assert_eq!(record.languages_text(), NOT_AVAILABLE);
        assert_eq!(record.subregion_text(), NOT_AVAILABLE);
    }

    #[test]
    fn test_multiple_values_are_comma_joined() {
        let record: CountryRecord = serde_json::from_str(
            r#"{
                "name": {"common": "Switzerland"},
                "capital": ["Bern", "Zurich"],
                "timezones": ["UTC+01:00", "UTC+02:00"],
                "currencies": {"CHF": {"name": "Swiss franc", "symbol": "Fr."}, "EUR": {"name": "Euro"}},
                "languages": {"fra": "French", "gsw": "Swiss German", "ita": "Italian", "roh": "Romansh"}
            }"#,
        )
        .unwrap();

        assert_eq!(record.capital_text(), "Bern");
        assert_eq!(record.timezones_text(), "UTC+01:00, UTC+02:00");
        assert_eq!(record.currencies_text(), "Swiss franc, Euro");
        assert_eq!(record.languages_text(), "French, Swiss German, Italian, Romansh");
    }
}
