//! Pincode aggregation and advisor-assisted selection.
//!
//! The advisor only ever narrows the candidate set. Every reply is parsed
//! leniently, checked against the pincodes actually present, and any failure
//! or empty answer falls back to keeping all pincodes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::advisor::PincodeAdvisor;
use crate::core::geo::RouteSpec;
use crate::core::loaders::GeoRecord;

/// Mean position of all records sharing a pincode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PincodeAggregate {
    pub pincode: String,
    pub mean_lat: f64,
    pub mean_lon: f64,
    pub count: usize,
}

/// How the final pincode set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// No advisor configured, or nothing to ask about.
    AllPincodes,
    /// The advisor's validated answer.
    Advisor,
    /// The advisor was asked but failed or returned nothing usable.
    Fallback,
}

/// Output of the selection stage.
#[derive(Debug, Clone)]
pub struct PincodeSelection {
    /// Selected pincodes, sorted.
    pub pincodes: BTreeSet<String>,
    /// Records whose pincode was selected, in input order.
    pub records: Vec<GeoRecord>,
    /// Distinct pincodes seen in the input.
    pub candidate_count: usize,
    pub source: SelectionSource,
}

/// Group records by pincode, sorted by pincode.
pub fn aggregate_pincodes(records: &[GeoRecord]) -> Vec<PincodeAggregate> {
    let mut sums: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.pincode.as_str()).or_insert((0.0, 0.0, 0));
        entry.0 += r.latitude;
        entry.1 += r.longitude;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(pincode, (lat, lon, count))| PincodeAggregate {
            pincode: pincode.to_string(),
            mean_lat: lat / count as f64,
            mean_lon: lon / count as f64,
            count,
        })
        .collect()
}

fn json_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid JSON array pattern"))
}

fn numeric_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{3,}\b").expect("valid numeric token pattern"))
}

fn try_parse_json_array(text: &str) -> Option<Vec<String>> {
    let m = json_array_pattern().find(text)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(m.as_str()).ok()?;

    Some(
        values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    )
}

/// Extract candidate pincodes from a free-text advisor reply.
///
/// The widest `[...]` span is parsed as a JSON array first (strings and
/// integers accepted); if there is none, or it is not valid JSON, every bare
/// run of three or more digits is taken instead.
pub fn parse_advisor_reply(text: &str) -> Vec<String> {
    if let Some(list) = try_parse_json_array(text) {
        log::debug!("Parsed JSON pincodes: {:?}", list);
        return list;
    }

    let tokens: Vec<String> = numeric_token_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    log::debug!("Regex extracted pincodes: {:?}", tokens);
    tokens
}

/// Ask the advisor and validate its answer against the known candidates.
///
/// Returns `None` on any advisor error or when no returned pincode is known.
pub fn consult_advisor(
    advisor: &dyn PincodeAdvisor,
    route: &RouteSpec,
    aggregates: &[PincodeAggregate],
    max_listing: usize,
) -> Option<BTreeSet<String>> {
    let listing = &aggregates[..aggregates.len().min(max_listing)];

    let reply = match advisor.advise(route, listing) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Pincode advisor failed: {}", e);
            return None;
        }
    };
    log::info!(
        "Advisor response: {}",
        reply.chars().take(200).collect::<String>()
    );

    let known: BTreeSet<&str> = aggregates.iter().map(|a| a.pincode.as_str()).collect();
    let valid: BTreeSet<String> = parse_advisor_reply(&reply)
        .into_iter()
        .filter(|p| known.contains(p.as_str()))
        .collect();

    if valid.is_empty() {
        log::warn!("Advisor returned no known pincodes");
        None
    } else {
        log::info!("Advisor kept {} of {} pincodes", valid.len(), known.len());
        Some(valid)
    }
}

/// Choose the pincodes to cluster and keep only their records.
pub fn select_pincodes(
    records: &[GeoRecord],
    route: &RouteSpec,
    advisor: Option<&dyn PincodeAdvisor>,
    max_listing: usize,
) -> PincodeSelection {
    let aggregates = aggregate_pincodes(records);
    log::info!("Unique pincodes found: {}", aggregates.len());

    let all = || -> BTreeSet<String> { aggregates.iter().map(|a| a.pincode.clone()).collect() };

    let (pincodes, source) = match advisor {
        Some(advisor) if !aggregates.is_empty() => {
            match consult_advisor(advisor, route, &aggregates, max_listing) {
                Some(selected) => (selected, SelectionSource::Advisor),
                None => {
                    log::info!("Falling back to all unique pincodes");
                    (all(), SelectionSource::Fallback)
                }
            }
        }
        _ => (all(), SelectionSource::AllPincodes),
    };

    let kept: Vec<GeoRecord> = records
        .iter()
        .filter(|r| pincodes.contains(&r.pincode))
        .cloned()
        .collect();
    log::info!("After pincode filtering: {} records", kept.len());

    PincodeSelection {
        pincodes,
        records: kept,
        candidate_count: aggregates.len(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{AdvisorError, Result as AdvisorResult};
    use std::sync::Mutex;

    fn route() -> RouteSpec {
        RouteSpec::new(28.7041, 77.1025, 28.4595, 77.0266)
    }

    fn records() -> Vec<GeoRecord> {
        vec![
            GeoRecord::new(28.60, 77.05, "110001"),
            GeoRecord::new(28.55, 77.06, "110001"),
            GeoRecord::new(28.50, 77.04, "122001"),
            GeoRecord::new(28.65, 77.08, "110010"),
        ]
    }

    struct FixedAdvisor(String);

    impl PincodeAdvisor for FixedAdvisor {
        fn complete(&self, _prompt: &str) -> AdvisorResult<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingAdvisor;

    impl PincodeAdvisor for FailingAdvisor {
        fn complete(&self, _prompt: &str) -> AdvisorResult<String> {
            Err(AdvisorError::EmptyResponse)
        }
    }

    struct RecordingAdvisor {
        seen: Mutex<usize>,
    }

    impl PincodeAdvisor for RecordingAdvisor {
        fn complete(&self, _prompt: &str) -> AdvisorResult<String> {
            Ok("[]".to_string())
        }

        fn advise(
            &self,
            _route: &RouteSpec,
            candidates: &[PincodeAggregate],
        ) -> AdvisorResult<String> {
            *self.seen.lock().unwrap() = candidates.len();
            Ok("[]".to_string())
        }
    }

    #[test]
    fn test_aggregate_pincodes_means() {
        let aggs = aggregate_pincodes(&records());
        assert_eq!(aggs.len(), 3);
        assert_eq!(aggs[0].pincode, "110001");
        assert_eq!(aggs[0].count, 2);
        assert!((aggs[0].mean_lat - 28.575).abs() < 1e-9);
        assert!((aggs[0].mean_lon - 77.055).abs() < 1e-9);
        assert_eq!(aggs[1].pincode, "110010");
        assert_eq!(aggs[2].pincode, "122001");
    }

    #[test]
    fn test_parse_json_array() {
        let text = "Sure! Here you go:\n```json\n[\"110001\", \"122001\"]\n```";
        assert_eq!(parse_advisor_reply(text), vec!["110001", "122001"]);
    }

    #[test]
    fn test_parse_json_array_with_numbers() {
        assert_eq!(parse_advisor_reply("[110001, \" 122001 \"]"), vec!["110001", "122001"]);
    }

    #[test]
    fn test_parse_falls_back_to_numeric_tokens() {
        let text = "The pincodes 110001 and 122001 are on the way; 42 is not a pincode.";
        assert_eq!(parse_advisor_reply(text), vec!["110001", "122001"]);
    }

    #[test]
    fn test_parse_invalid_json_uses_tokens() {
        let text = "[110001, 122001,, oops]";
        assert_eq!(parse_advisor_reply(text), vec!["110001", "122001"]);
    }

    #[test]
    fn test_parse_nothing_useful() {
        assert!(parse_advisor_reply("I cannot help with that.").is_empty());
    }

    #[test]
    fn test_select_without_advisor_keeps_all() {
        let sel = select_pincodes(&records(), &route(), None, 200);
        assert_eq!(sel.source, SelectionSource::AllPincodes);
        assert_eq!(sel.pincodes.len(), 3);
        assert_eq!(sel.records.len(), 4);
        assert_eq!(sel.candidate_count, 3);
    }

    #[test]
    fn test_select_with_advisor_subset() {
        let advisor = FixedAdvisor("[\"110001\"]".to_string());
        let sel = select_pincodes(&records(), &route(), Some(&advisor), 200);

        assert_eq!(sel.source, SelectionSource::Advisor);
        assert_eq!(sel.pincodes.iter().collect::<Vec<_>>(), vec!["110001"]);
        assert_eq!(sel.records.len(), 2);
        assert!(sel.records.iter().all(|r| r.pincode == "110001"));
    }

    #[test]
    fn test_select_rejects_invented_pincodes() {
        let advisor = FixedAdvisor("[\"999999\", \"122001\"]".to_string());
        let sel = select_pincodes(&records(), &route(), Some(&advisor), 200);

        assert_eq!(sel.pincodes.iter().collect::<Vec<_>>(), vec!["122001"]);
        assert_eq!(sel.records.len(), 1);
    }

    #[test]
    fn test_select_hallucinated_only_falls_back() {
        let advisor = FixedAdvisor("[\"999999\"]".to_string());
        let sel = select_pincodes(&records(), &route(), Some(&advisor), 200);

        assert_eq!(sel.source, SelectionSource::Fallback);
        assert_eq!(sel.pincodes.len(), 3);
        assert_eq!(sel.records.len(), 4);
    }

    #[test]
    fn test_select_advisor_error_falls_back() {
        let sel = select_pincodes(&records(), &route(), Some(&FailingAdvisor), 200);
        assert_eq!(sel.source, SelectionSource::Fallback);
        assert_eq!(sel.pincodes.len(), 3);
    }

    #[test]
    fn test_select_empty_input_skips_advisor() {
        let sel = select_pincodes(&[], &route(), Some(&FailingAdvisor), 200);
        assert_eq!(sel.source, SelectionSource::AllPincodes);
        assert!(sel.pincodes.is_empty());
        assert!(sel.records.is_empty());
    }

    #[test]
    fn test_listing_is_capped() {
        let many: Vec<GeoRecord> = (0..300)
            .map(|i| GeoRecord::new(28.5, 77.05, format!("{}", 100000 + i)))
            .collect();
        let advisor = RecordingAdvisor {
            seen: Mutex::new(0),
        };
        let sel = select_pincodes(&many, &route(), Some(&advisor), 200);

        assert_eq!(*advisor.seen.lock().unwrap(), 200);
        assert_eq!(sel.source, SelectionSource::Fallback);
        assert_eq!(sel.pincodes.len(), 300);
    }
}
