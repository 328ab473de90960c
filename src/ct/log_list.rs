// CT log catalog
//
// Google v3 log-list schema and the startup eligibility filter. Only the
// fields the filter consumes are modeled.

use crate::error::CertStreamError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// Catalog of CT log operators and their logs
#[derive(Debug, Deserialize)]
pub struct LogList {
    pub operators: Vec<Operator>,
}

#[derive(Debug, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default)]
    pub logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<LogState>,
    #[serde(default)]
    pub temporal_interval: Option<TemporalInterval>,
}

#[derive(Debug, Deserialize)]
pub struct LogState {
    pub usable: Option<UsableState>,
}

/// Presence of the `usable` key marks the log usable
#[derive(Debug, Deserialize)]
pub struct UsableState {}

#[derive(Debug, Deserialize)]
pub struct TemporalInterval {
    #[serde(default)]
    pub start_inclusive: Option<DateTime<Utc>>,
    pub end_exclusive: DateTime<Utc>,
}

/// One log that passed the eligibility filter
#[derive(Debug, Clone)]
pub struct EligibleLog {
    pub url: String,
    pub name: String,
}

/// Fetch the catalog. Failure here is fatal to the run.
pub async fn fetch_log_list(http: &reqwest::Client, url: &str) -> Result<LogList> {
    info!(url, "fetching ct log catalog");
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(CertStreamError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.json().await?)
}

impl LogList {
    /// Logs that carry the usable marker and whose temporal interval has
    /// not ended, evaluated once at startup. The catalog is not
    /// deduplicated: a log listed under several operators is followed once
    /// per listing.
    pub fn eligible_logs(&self, now: DateTime<Utc>) -> Vec<EligibleLog> {
        let mut eligible = Vec::new();
        for operator in &self.operators {
            for log in &operator.logs {
                let name = log.description.clone().unwrap_or_else(|| log.url.clone());
                let usable = log.state.as_ref().is_some_and(|s| s.usable.is_some());
                if !usable {
                    info!(log = %name, reason = "not_usable", "skipping log");
                    continue;
                }
                if let Some(interval) = &log.temporal_interval {
                    if interval.end_exclusive < now {
                        info!(log = %name, reason = "temporal_interval", "skipping log");
                        continue;
                    }
                }
                eligible.push(EligibleLog {
                    url: log.url.clone(),
                    name,
                });
            }
        }
        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "operators": [
            {
                "name": "Alpha",
                "logs": [
                    {
                        "log_id": "one",
                        "url": "https://ct.alpha.example.com/2026/",
                        "description": "Alpha 2026",
                        "state": {"usable": {"timestamp": "2025-01-01T00:00:00Z"}}
                    },
                    {
                        "log_id": "two",
                        "url": "https://ct.alpha.example.com/2020/",
                        "description": "Alpha 2020",
                        "state": {"usable": {"timestamp": "2019-01-01T00:00:00Z"}},
                        "temporal_interval": {
                            "start_inclusive": "2020-01-01T00:00:00Z",
                            "end_exclusive": "2021-01-01T00:00:00Z"
                        }
                    }
                ]
            },
            {
                "name": "Beta",
                "logs": [
                    {
                        "log_id": "three",
                        "url": "https://ct.beta.example.com/",
                        "description": "Beta",
                        "state": {"retired": {"timestamp": "2024-01-01T00:00:00Z"}}
                    }
                ]
            }
        ]
    }"#;

    fn now() -> DateTime<Utc> {
        "2026-08-01T00:00:00Z".parse().expect("fixed test time")
    }

    #[test]
    fn test_eligibility_filter() {
        let list: LogList = serde_json::from_str(FIXTURE).expect("fixture parses");
        let eligible = list.eligible_logs(now());

        // Usable without interval passes; an expired interval and a
        // non-usable state are both skipped
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "https://ct.alpha.example.com/2026/");
        assert_eq!(eligible[0].name, "Alpha 2026");
    }

    #[test]
    fn test_future_interval_is_eligible() {
        let json = r#"{
            "operators": [{
                "name": "Gamma",
                "logs": [{
                    "url": "https://ct.gamma.example.com/",
                    "state": {"usable": {}},
                    "temporal_interval": {
                        "start_inclusive": "2026-01-01T00:00:00Z",
                        "end_exclusive": "2027-01-01T00:00:00Z"
                    }
                }]
            }]
        }"#;
        let list: LogList = serde_json::from_str(json).expect("fixture parses");
        let eligible = list.eligible_logs(now());
        assert_eq!(eligible.len(), 1);
        // No description: the URL doubles as the name
        assert_eq!(eligible[0].name, "https://ct.gamma.example.com/");
    }

    #[test]
    fn test_missing_state_is_not_usable() {
        let json = r#"{
            "operators": [{
                "name": "Delta",
                "logs": [{"url": "https://ct.delta.example.com/"}]
            }]
        }"#;
        let list: LogList = serde_json::from_str(json).expect("fixture parses");
        assert!(list.eligible_logs(now()).is_empty());
    }

    #[test]
    fn test_duplicate_listings_are_kept() {
        let json = r#"{
            "operators": [
                {"name": "A", "logs": [{"url": "https://ct.dup.example.com/", "state": {"usable": {}}}]},
                {"name": "B", "logs": [{"url": "https://ct.dup.example.com/", "state": {"usable": {}}}]}
            ]
        }"#;
        let list: LogList = serde_json::from_str(json).expect("fixture parses");
        assert_eq!(list.eligible_logs(now()).len(), 2);
    }
}
