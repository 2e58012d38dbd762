use crate::country::{CountryKey, CountryRecord};

/// Case-fold a string for matching. The query is not trimmed: whitespace is
/// part of the substring being looked for.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

fn matches(record: &CountryRecord, needle: &str) -> bool {
    needle.is_empty() || normalize(record.common_name()).contains(needle)
}

/// Keys of every record whose common name contains `query`, case-insensitively,
/// in list order. An empty query matches everything.
pub fn filter(list: &[CountryRecord], query: &str) -> Vec<CountryKey> {
    let needle = normalize(query);
    list.iter()
        .enumerate()
        .filter(|(_, record)| matches(record, &needle))
        .map(|(idx, _)| CountryKey(idx))
        .collect()
}

pub fn filter_records<'a>(list: &'a [CountryRecord], query: &str) -> Vec<&'a CountryRecord> {
    let needle = normalize(query);
    list.iter().filter(|record| matches(record, &needle)).collect()
}

/// First record whose common name equals `name`, ignoring case.
pub fn find_by_name<'a>(list: &'a [CountryRecord], name: &str) -> Option<&'a CountryRecord> {
    let needle = normalize(name.trim());
    list.iter()
        .find(|record| normalize(record.common_name()) == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> CountryRecord {
        serde_json::from_value(serde_json::json!({ "name": { "common": name } })).unwrap()
    }

    fn sample() -> Vec<CountryRecord> {
        ["Uzbekistan", "Kazakhstan", "Germany", "South Georgia", "Niger", "Nigeria"]
            .into_iter()
            .map(record)
            .collect()
    }

    fn names(records: &[&CountryRecord]) -> Vec<String> {
        records.iter().map(|r| r.common_name().to_string()).collect()
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let list = sample();
        let keys = filter(&list, "");
        assert_eq!(keys.len(), list.len());
        assert!(keys.iter().enumerate().all(|(idx, key)| key.index() == idx));
    }

    #[test]
    fn test_case_insensitive_substring() {
        let list = vec![
            serde_json::from_value::<CountryRecord>(serde_json::json!({
                "name": {"common": "Uzbekistan"}, "population": 34000000, "region": "Asia"
            }))
            .unwrap(),
            record("France"),
            record("Brazil"),
        ];

        let keys = filter(&list, "uzb");
        assert_eq!(keys, vec![CountryKey(0)]);
        assert_eq!(filter(&list, "UZB"), keys);
        assert_eq!(filter(&list, "bEkIs"), keys);
    }

    #[test]
    fn test_results_keep_list_order() {
        let list = sample();
        let found = filter_records(&list, "stan");
        assert_eq!(names(&found), vec!["Uzbekistan", "Kazakhstan"]);

        let found = filter_records(&list, "ger");
        assert_eq!(names(&found), vec!["Germany", "Niger", "Nigeria"]);
    }

    #[test]
    fn test_only_matching_names_are_returned() {
        let list = sample();
        for query in ["a", "GE", "ia", "x", " ", "south g"] {
            let needle = query.to_lowercase();
            for found in filter_records(&list, query) {
                assert!(found.common_name().to_lowercase().contains(&needle));
            }
            let expected = list
                .iter()
                .filter(|r| r.common_name().to_lowercase().contains(&needle))
                .count();
            assert_eq!(filter(&list, query).len(), expected, "query {query:?}");
        }
    }

    #[test]
    fn test_filter_is_idempotent() {
        let list = sample();
        for query in ["", "stan", "NIG", "zzz"] {
            let once: Vec<CountryRecord> =
                filter_records(&list, query).into_iter().cloned().collect();
            let twice = filter_records(&once, query);
            assert_eq!(names(&twice), names(&once.iter().collect::<Vec<_>>()));
        }
    }

    #[test]
    fn test_query_is_not_trimmed() {
        let list = sample();
        assert_eq!(names(&filter_records(&list, "south ")), vec!["South Georgia"]);
        assert!(filter_records(&list, " germany").is_empty());
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(filter(&sample(), "atlantis").is_empty());
        assert!(filter(&[], "").is_empty());
    }

    #[test]
    fn test_find_by_name_exact_ignoring_case() {
        let list = sample();
        assert_eq!(
            find_by_name(&list, "nigeria").map(|r| r.common_name()),
            Some("Nigeria")
        );
        assert_eq!(
            find_by_name(&list, " NIGER ").map(|r| r.common_name()),
            Some("Niger")
        );
        assert!(find_by_name(&list, "Nige").is_none());
    }
}
