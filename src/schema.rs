use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One purchase order as emitted by the upstream extraction layer.
///
/// Every field is optional and loosely typed: amounts arrive as numbers or
/// strings, dates as `DD-MM-YYYY` strings, and `payment_schedule` changes
/// shape with the payment type (a list of entries, a `{payment_frequency}`
/// object, or a legacy `"date:$amount;..."` string). The normalizer is the
/// only code that probes these values.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct RawPoRecord {
    #[schemars(description = "Purchase order number, the unique key for this record")]
    #[serde(default)]
    pub po_id: Option<Value>,

    #[schemars(description = "Legal name of the client the PO was issued by")]
    #[serde(default)]
    pub client_name: Option<Value>,

    #[schemars(description = "Name of the internal owner responsible for the project")]
    #[serde(default)]
    pub project_owner: Option<Value>,

    #[schemars(description = "Total contract value in USD. Must be a positive number")]
    #[serde(default)]
    pub amount: Option<Value>,

    #[schemars(description = "Free-text confirmation status, e.g. 'Confirmed' or 'unconfirmed'")]
    #[serde(default)]
    pub status: Option<Value>,

    #[schemars(description = "Payment delay in days applied to every scheduled date")]
    #[serde(default)]
    pub payment_terms: Option<Value>,

    #[schemars(
        description = "Payment structuring scheme: distributed, milestone, fixed, even, or periodic"
    )]
    #[serde(default)]
    pub payment_type: Option<Value>,

    #[schemars(description = "Project start date in DD-MM-YYYY format")]
    #[serde(default)]
    pub start_date: Option<Value>,

    #[schemars(description = "Project end date in DD-MM-YYYY format")]
    #[serde(default)]
    pub end_date: Option<Value>,

    #[schemars(description = "Contract duration in months. Informational; not used by the engine")]
    #[serde(default)]
    pub duration_months: Option<Value>,

    #[schemars(
        description = "Payment schedule. A list of {payment_date, payment_amount|payment_percent} entries for distributed/fixed POs, a {payment_frequency} object for periodic POs, or a legacy 'DD-MM-YYYY:$amount;...' string for fixed POs"
    )]
    #[serde(default)]
    pub payment_schedule: Option<Value>,

    #[schemars(
        description = "Milestone list for milestone POs: {milestone_name, milestone_description, milestone_due_date, milestone_percentage} entries"
    )]
    #[serde(default)]
    pub milestones: Option<Value>,
}

impl RawPoRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RawPoRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Confirmation status, normalized case-insensitively from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoStatus {
    Confirmed,
    Unconfirmed,
    Unspecified,
}

impl PoStatus {
    pub fn from_free_text(text: Option<&str>) -> Self {
        match text {
            Some(s) if s.trim().eq_ignore_ascii_case("confirmed") => PoStatus::Confirmed,
            Some(s) if s.trim().eq_ignore_ascii_case("unconfirmed") => PoStatus::Unconfirmed,
            _ => PoStatus::Unspecified,
        }
    }
}

impl fmt::Display for PoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoStatus::Confirmed => "Confirmed",
            PoStatus::Unconfirmed => "Unconfirmed",
            PoStatus::Unspecified => "unspecified",
        };
        write!(f, "{}", s)
    }
}

/// How one schedule entry states its value: an explicit dollar amount or a
/// percentage of the PO total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaymentAmount {
    Explicit(f64),
    Percent(f64),
}

impl PaymentAmount {
    /// Resolves against the PO's total contract value.
    pub fn resolve(&self, total: f64) -> f64 {
        match self {
            PaymentAmount::Explicit(amount) => *amount,
            PaymentAmount::Percent(percent) => total * percent / 100.0,
        }
    }
}

/// One dated payment within a distributed or fixed schedule. `date` is
/// `None` when the source date was absent or unparseable; the expander
/// skips such entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub date: Option<NaiveDate>,
    pub amount: PaymentAmount,
}

/// One milestone with a usable percentage. `due_date` is `None` when the
/// source date was absent or unparseable; the expander infers a date from
/// the project range instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEntry {
    pub name: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub percentage: f64,
}

/// The payment-structuring scheme, carrying exactly the payload its
/// expansion rule needs. Constructed only by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaymentPlan {
    Distributed(Vec<ScheduledPayment>),
    Milestone(Vec<MilestoneEntry>),
    Fixed(Vec<ScheduledPayment>),
    Even,
    Periodic { frequency_months: i64 },
}

impl PaymentPlan {
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentPlan::Distributed(_) => "distributed",
            PaymentPlan::Milestone(_) => "milestone",
            PaymentPlan::Fixed(_) => "fixed",
            PaymentPlan::Even => "even",
            PaymentPlan::Periodic { .. } => "periodic",
        }
    }
}

/// A purchase order that passed validation. All fields are trimmed, typed,
/// and safe to expand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPo {
    pub po_id: String,
    pub client_name: String,
    pub project_owner: Option<String>,
    pub amount: f64,
    pub status: PoStatus,
    /// Payment delay in days, applied uniformly to every scheduled date.
    pub payment_terms_days: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub plan: PaymentPlan,
    /// Sub-entries dropped while cleaning this record (for the batch audit).
    pub skipped_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_generation() {
        let schema_json = RawPoRecord::schema_as_json().unwrap();
        assert!(schema_json.contains("po_id"));
        assert!(schema_json.contains("payment_schedule"));
        assert!(schema_json.contains("milestones"));
    }

    #[test]
    fn test_raw_record_deserializes_mixed_types() {
        let record: RawPoRecord = serde_json::from_value(json!({
            "po_id": "PO-100",
            "client_name": "Acme Corp",
            "amount": "12000.50",
            "payment_terms": 45,
            "payment_type": "even",
            "start_date": "01-01-2024",
            "end_date": "01-06-2024",
            "unknown_field": "ignored"
        }))
        .unwrap();

        assert_eq!(record.po_id, Some(json!("PO-100")));
        assert_eq!(record.amount, Some(json!("12000.50")));
        assert_eq!(record.payment_terms, Some(json!(45)));
        assert!(record.milestones.is_none());
    }

    #[test]
    fn test_status_from_free_text() {
        assert_eq!(PoStatus::from_free_text(Some("CONFIRMED")), PoStatus::Confirmed);
        assert_eq!(PoStatus::from_free_text(Some(" unconfirmed ")), PoStatus::Unconfirmed);
        assert_eq!(PoStatus::from_free_text(Some("pending")), PoStatus::Unspecified);
        assert_eq!(PoStatus::from_free_text(None), PoStatus::Unspecified);
        assert_eq!(PoStatus::Unspecified.to_string(), "unspecified");
    }

    #[test]
    fn test_payment_amount_resolution() {
        assert_eq!(PaymentAmount::Explicit(5000.0).resolve(20_000.0), 5000.0);
        assert_eq!(PaymentAmount::Percent(25.0).resolve(20_000.0), 5000.0);
    }
}
