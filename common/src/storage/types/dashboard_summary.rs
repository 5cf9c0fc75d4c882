use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{error::AppError, storage::db::SurrealDbClient};

use super::document_record::DocumentRecord;

/// Days per comparison window; also the fixed divisor for daily averages.
const WINDOW_DAYS: i64 = 7;

/// How the stored analyzer payload of a record reads for dashboard purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingsOutcome {
    HasFindings(usize),
    NoFindings,
    Unparsable(String),
}

impl FindingsOutcome {
    /// Reads the `analysis` array out of a raw analyzer payload.
    pub fn classify(payload: Option<&str>) -> Self {
        let Some(payload) = payload.filter(|p| !p.trim().is_empty()) else {
            return Self::NoFindings;
        };

        let root: Value = match serde_json::from_str(payload) {
            Ok(root) => root,
            Err(err) => return Self::Unparsable(err.to_string()),
        };

        match root.get("analysis") {
            None | Some(Value::Null) => Self::NoFindings,
            Some(Value::Array(findings)) if findings.is_empty() => Self::NoFindings,
            Some(Value::Array(findings)) => Self::HasFindings(findings.len()),
            Some(other) => Self::Unparsable(format!("analysis is not an array: {other}")),
        }
    }

    /// Unparsable payloads are counted as clean.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::HasFindings(_))
    }

    pub fn findings(&self) -> usize {
        match self {
            Self::HasFindings(count) => *count,
            Self::NoFindings | Self::Unparsable(_) => 0,
        }
    }
}

/// Dashboard numbers for one owner.
///
/// The `*_delta` fields are differences of rolling averages between the last
/// seven days and the seven days before them, rounded half-up. `scans_delta`,
/// `findings_delta` and `clean_delta` compare per-day averages (window total
/// divided by 7). `avg_scan_time_delta` compares per-scan averages instead.
/// None of them are percentages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub total_scans: u64,
    pub findings_detected: u64,
    pub clean_documents: u64,
    pub avg_scan_time: f64,
    pub scans_delta: i64,
    pub findings_delta: i64,
    pub clean_delta: i64,
    pub avg_scan_time_delta: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct WindowTotals {
    scans: u64,
    findings: u64,
    clean: u64,
    scan_time: f64,
}

impl WindowTotals {
    fn add(&mut self, outcome: &FindingsOutcome, response_time: f64) {
        self.scans = self.scans.saturating_add(1);
        self.findings = self.findings.saturating_add(outcome.findings() as u64);
        if outcome.is_clean() {
            self.clean = self.clean.saturating_add(1);
        }
        self.scan_time += response_time;
    }

    fn daily_average(count: u64) -> f64 {
        count as f64 / WINDOW_DAYS as f64
    }

    fn per_scan_average(&self) -> f64 {
        if self.scans == 0 {
            0.0
        } else {
            self.scan_time / self.scans as f64
        }
    }
}

enum Window {
    Recent,
    Prior,
}

fn window_for(updated: NaiveDate, today: NaiveDate) -> Option<Window> {
    let days_ago = today.signed_duration_since(updated).num_days();
    match days_ago {
        0..=6 => Some(Window::Recent),
        7..=13 => Some(Window::Prior),
        _ => None,
    }
}

/// Half-up rounding: ties go towards positive infinity.
#[allow(clippy::cast_possible_truncation)]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

impl DashboardSummary {
    /// Reduces a snapshot of one owner's records in a single pass.
    #[allow(clippy::cast_precision_loss)]
    pub fn summarize(records: &[DocumentRecord], today: NaiveDate) -> Self {
        let mut lifetime = WindowTotals::default();
        let mut recent = WindowTotals::default();
        let mut prior = WindowTotals::default();

        for record in records {
            let outcome = FindingsOutcome::classify(record.analysis_payload.as_deref());
            if let FindingsOutcome::Unparsable(reason) = &outcome {
                debug!(
                    document_id = %record.id,
                    reason = %reason,
                    "analysis payload unreadable; counting document as clean"
                );
            }

            lifetime.add(&outcome, record.response_time);
            match window_for(record.updated_date(), today) {
                Some(Window::Recent) => recent.add(&outcome, record.response_time),
                Some(Window::Prior) => prior.add(&outcome, record.response_time),
                None => {}
            }
        }

        let daily_delta = |recent_count: u64, prior_count: u64| {
            round_half_up(
                WindowTotals::daily_average(recent_count) - WindowTotals::daily_average(prior_count),
            )
        };

        Self {
            total_scans: lifetime.scans,
            findings_detected: lifetime.findings,
            clean_documents: lifetime.clean,
            avg_scan_time: lifetime.per_scan_average(),
            scans_delta: daily_delta(recent.scans, prior.scans),
            findings_delta: daily_delta(recent.findings, prior.findings),
            clean_delta: daily_delta(recent.clean, prior.clean),
            avg_scan_time_delta: round_half_up(
                recent.per_scan_average() - prior.per_scan_average(),
            ),
        }
    }

    /// Fetches the owner's records once and summarizes them.
    pub async fn for_owner(
        owner_id: &str,
        today: NaiveDate,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let records = DocumentRecord::find_all_by_owner(owner_id, db).await?;
        Ok(Self::summarize(&records, today))
    }
}
