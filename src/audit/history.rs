// Cadence — Usage Audit Log
//
// A bounded, per-owner, append-only record of tool invocations. Each owner's
// history is a FIFO capped at the retention limit; once an entry is evicted it
// is gone for good, so `summarize` only ever reflects retained entries.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::redact::ParamRedactor;
use super::AuditError;

/// Default number of entries retained per owner.
pub const DEFAULT_RETENTION_CAP: usize = 100;

/// One sanitized tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub owner_id: String,
    pub tool_name: String,
    pub sanitized_params: Value,
    pub scopes: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub usage_id: Uuid,
}

/// Aggregate over an owner's retained entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_usage: usize,
    pub per_tool_counts: BTreeMap<String, usize>,
    pub last_used_at: Option<DateTime<Utc>>,
}

type OwnerHistory = Arc<Mutex<VecDeque<AuditEntry>>>;

pub struct UsageAuditLog {
    cap: usize,
    redactor: ParamRedactor,
    histories: RwLock<HashMap<String, OwnerHistory>>,
}

impl UsageAuditLog {
    pub fn new(cap: usize, redactor: ParamRedactor) -> Result<Self, AuditError> {
        if cap == 0 {
            return Err(AuditError::Validation(
                "retention cap must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            cap,
            redactor,
            histories: RwLock::new(HashMap::new()),
        })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    fn history(&self, owner_id: &str) -> Option<OwnerHistory> {
        self.histories.read().get(owner_id).cloned()
    }

    fn history_or_create(&self, owner_id: &str) -> OwnerHistory {
        if let Some(history) = self.history(owner_id) {
            return history;
        }
        self.histories
            .write()
            .entry(owner_id.to_string())
            .or_default()
            .clone()
    }

    /// Sanitize and append one invocation. Returns the generated usage id.
    pub fn record(
        &self,
        owner_id: &str,
        tool_name: &str,
        params: &Value,
        scopes: &[String],
    ) -> Result<Uuid, AuditError> {
        crate::store::validate_owner(owner_id).map_err(AuditError::Validation)?;
        if tool_name.trim().is_empty() {
            return Err(AuditError::Validation(
                "tool name must not be empty".to_string(),
            ));
        }

        let entry = AuditEntry {
            owner_id: owner_id.to_string(),
            tool_name: tool_name.to_string(),
            sanitized_params: self.redactor.sanitize(params),
            scopes: scopes.to_vec(),
            timestamp: Utc::now(),
            usage_id: Uuid::new_v4(),
        };
        let usage_id = entry.usage_id;

        let history = self.history_or_create(owner_id);
        let mut entries = history.lock();
        entries.push_back(entry);
        while entries.len() > self.cap {
            entries.pop_front();
        }

        tracing::debug!(
            owner = %owner_id,
            tool = %tool_name,
            usage_id = %usage_id,
            "Usage recorded"
        );
        Ok(usage_id)
    }

    /// The most recent `n` entries (or fewer), ordered oldest first.
    pub fn recent(&self, owner_id: &str, n: usize) -> Vec<AuditEntry> {
        let Some(history) = self.history(owner_id) else {
            return Vec::new();
        };
        let entries = history.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Count retained entries in total and per tool.
    pub fn summarize(&self, owner_id: &str) -> UsageSummary {
        let Some(history) = self.history(owner_id) else {
            return UsageSummary::default();
        };
        let entries = history.lock();

        let mut summary = UsageSummary {
            total_usage: entries.len(),
            ..UsageSummary::default()
        };
        for entry in entries.iter() {
            *summary
                .per_tool_counts
                .entry(entry.tool_name.clone())
                .or_insert(0) += 1;
            summary.last_used_at = summary.last_used_at.max(Some(entry.timestamp));
        }
        summary
    }
}

impl Default for UsageAuditLog {
    fn default() -> Self {
        Self {
            cap: DEFAULT_RETENTION_CAP,
            redactor: ParamRedactor::default(),
            histories: RwLock::new(HashMap::new()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes() -> Vec<String> {
        vec!["student".to_string()]
    }

    #[test]
    fn test_record_returns_unique_ids() {
        let log = UsageAuditLog::default();
        let a = log.record("u", "knowledge.search", &json!({}), &scopes()).unwrap();
        let b = log.record("u", "knowledge.search", &json!({}), &scopes()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn test_record_sanitizes_params() {
        let log = UsageAuditLog::default();
        log.record(
            "u",
            "vault.store",
            &json!({ "name": "llm-api", "secret": "sk-123", "apiKey": "k" }),
            &scopes(),
        )
        .unwrap();

        let entry = &log.recent("u", 1)[0];
        assert_eq!(entry.sanitized_params, json!({ "name": "llm-api" }));
        assert_eq!(entry.scopes, scopes());
        assert!(!serde_json::to_string(entry).unwrap().contains("sk-123"));
    }

    #[test]
    fn test_cap_keeps_most_recent_entries() {
        let log = UsageAuditLog::new(100, ParamRedactor::default()).unwrap();
        for i in 0..150 {
            log.record("owner", "tool", &json!({ "seq": i }), &[]).unwrap();
        }

        let retained = log.recent("owner", 1000);
        assert_eq!(retained.len(), 100);
        let seqs: Vec<i64> = retained
            .iter()
            .map(|e| e.sanitized_params["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, (50..150).collect::<Vec<i64>>());
    }

    #[test]
    fn test_recent_is_oldest_first_and_bounded() {
        let log = UsageAuditLog::default();
        for i in 0..5 {
            log.record("u", "tool", &json!({ "seq": i }), &[]).unwrap();
        }
        let last_two = log.recent("u", 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].sanitized_params["seq"], 3);
        assert_eq!(last_two[1].sanitized_params["seq"], 4);
        assert!(log.recent("u", 0).is_empty());
        assert!(log.recent("nobody", 10).is_empty());
    }

    #[test]
    fn test_histories_are_per_owner() {
        let log = UsageAuditLog::new(3, ParamRedactor::default()).unwrap();
        for _ in 0..5 {
            log.record("a", "tool", &json!({}), &[]).unwrap();
        }
        log.record("b", "tool", &json!({}), &[]).unwrap();
        assert_eq!(log.recent("a", 10).len(), 3);
        assert_eq!(log.recent("b", 10).len(), 1);
    }

    #[test]
    fn test_summarize_counts_retained_only() {
        let log = UsageAuditLog::new(4, ParamRedactor::default()).unwrap();
        log.record("u", "evicted.tool", &json!({}), &[]).unwrap();
        log.record("u", "knowledge.search", &json!({}), &[]).unwrap();
        log.record("u", "knowledge.search", &json!({}), &[]).unwrap();
        log.record("u", "knowledge.answer", &json!({}), &[]).unwrap();
        log.record("u", "knowledge.answer", &json!({}), &[]).unwrap();

        let summary = log.summarize("u");
        assert_eq!(summary.total_usage, 4);
        assert_eq!(summary.per_tool_counts.get("knowledge.search"), Some(&2));
        assert_eq!(summary.per_tool_counts.get("knowledge.answer"), Some(&2));
        assert!(!summary.per_tool_counts.contains_key("evicted.tool"));
        assert_eq!(
            summary.last_used_at,
            log.recent("u", 1).first().map(|e| e.timestamp)
        );
    }

    #[test]
    fn test_summarize_unknown_owner_is_empty() {
        let summary = UsageAuditLog::default().summarize("ghost");
        assert_eq!(summary, UsageSummary::default());
        assert!(summary.last_used_at.is_none());
    }

    #[test]
    fn test_validation() {
        let log = UsageAuditLog::default();
        assert!(matches!(
            log.record("", "tool", &json!({}), &[]),
            Err(AuditError::Validation(_))
        ));
        assert!(matches!(
            log.record("u", "  ", &json!({}), &[]),
            Err(AuditError::Validation(_))
        ));
        assert!(UsageAuditLog::new(0, ParamRedactor::default()).is_err());
    }

    #[test]
    fn test_concurrent_records_respect_cap() {
        let log = Arc::new(UsageAuditLog::new(50, ParamRedactor::default()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        log.record("shared", "tool", &json!({}), &[]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.recent("shared", 1000).len(), 50);
    }
}
