use crate::schema::{
    MilestoneEntry, NormalizedPo, PaymentAmount, PaymentPlan, PoStatus, RawPoRecord,
    ScheduledPayment,
};
use crate::utils::{
    coerce_f64, coerce_i64, coerce_percent, coerce_string, parse_date,
};
use chrono::NaiveDate;
use log::warn;
use serde_json::Value;

/// Why a record was dropped from the batch. Rejections are collected, not
/// raised; the rest of the batch keeps processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub po_id: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.po_id {
            Some(id) => write!(f, "{}: {}", id, self.reason),
            None => write!(f, "<unknown PO>: {}", self.reason),
        }
    }
}

/// Validates and normalizes one raw record into a typed purchase order,
/// or explains why the whole record must be dropped.
pub fn normalize(raw: &RawPoRecord) -> Result<NormalizedPo, Rejection> {
    let po_id = required_string(&raw.po_id, "po_id", None)?;
    let client_name = required_string(&raw.client_name, "client_name", Some(po_id.as_str()))?;

    let amount = match &raw.amount {
        Some(value) => match coerce_f64(value) {
            Some(a) if a > 0.0 => a,
            _ if is_absent(value) => {
                return Err(reject(Some(po_id.as_str()), "missing required field amount"));
            }
            _ => {
                return Err(reject(
                    Some(po_id.as_str()),
                    format!("amount {} is not a positive number", value),
                ));
            }
        },
        None => return Err(reject(Some(po_id.as_str()), "missing required field amount")),
    };

    let payment_type = required_string(&raw.payment_type, "payment_type", Some(po_id.as_str()))?
        .to_lowercase();

    let payment_terms_days = match &raw.payment_terms {
        None => 0,
        Some(value) => match coerce_i64(value) {
            Some(days) if days >= 0 => days,
            Some(days) => {
                warn!("{}: negative payment_terms {} coerced to 0", po_id, days);
                0
            }
            None => {
                if !is_absent(value) {
                    warn!("{}: unparsable payment_terms {} coerced to 0", po_id, value);
                }
                0
            }
        },
    };

    let status = PoStatus::from_free_text(
        raw.status.as_ref().and_then(coerce_string).as_deref(),
    );
    let project_owner = raw.project_owner.as_ref().and_then(coerce_string);
    let start_date = optional_date(&raw.start_date, "start_date", &po_id);
    let end_date = optional_date(&raw.end_date, "end_date", &po_id);

    let mut skipped_entries = 0usize;
    let plan = match payment_type.as_str() {
        "distributed" => {
            let schedule =
                clean_schedule_entries(raw.payment_schedule.as_ref(), &po_id, &mut skipped_entries);
            if schedule.is_empty() {
                return Err(reject(
                    Some(po_id.as_str()),
                    "distributed payment plan has no usable schedule entries",
                ));
            }
            PaymentPlan::Distributed(schedule)
        }
        "milestone" => {
            let milestones =
                clean_milestones(raw.milestones.as_ref(), &po_id, &mut skipped_entries);
            if milestones.is_empty() {
                return Err(reject(
                    Some(po_id.as_str()),
                    "milestone payment plan has no usable milestones",
                ));
            }
            PaymentPlan::Milestone(milestones)
        }
        "fixed" => PaymentPlan::Fixed(clean_fixed_schedule(
            raw.payment_schedule.as_ref(),
            &po_id,
            &mut skipped_entries,
        )),
        "even" => PaymentPlan::Even,
        "periodic" => PaymentPlan::Periodic {
            frequency_months: periodic_frequency(raw.payment_schedule.as_ref(), &po_id),
        },
        other => {
            return Err(reject(
                Some(po_id.as_str()),
                format!("unsupported payment type '{}'", other),
            ));
        }
    };

    Ok(NormalizedPo {
        po_id,
        client_name,
        project_owner,
        amount,
        status,
        payment_terms_days,
        start_date,
        end_date,
        plan,
        skipped_entries,
    })
}

fn reject(po_id: Option<&str>, reason: impl Into<String>) -> Rejection {
    Rejection {
        po_id: po_id.map(str::to_string),
        reason: reason.into(),
    }
}

/// Absent for required-field purposes: missing, null, or a stringified
/// placeholder like "None"/"nan"/"".
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(_) => coerce_string(value).is_none(),
        _ => false,
    }
}

fn required_string(
    value: &Option<Value>,
    field: &str,
    po_id: Option<&str>,
) -> Result<String, Rejection> {
    value
        .as_ref()
        .and_then(coerce_string)
        .ok_or_else(|| reject(po_id, format!("missing required field {}", field)))
}

fn optional_date(value: &Option<Value>, field: &str, po_id: &str) -> Option<NaiveDate> {
    let text = value.as_ref().and_then(coerce_string)?;
    let parsed = parse_date(&text);
    if parsed.is_none() {
        warn!("{}: could not parse {} '{}'", po_id, field, text);
    }
    parsed
}

/// Keeps schedule entries with a parseable positive amount or percent.
/// Dates stay optional; entries with bad dates survive here and are
/// skipped at expansion time.
fn clean_schedule_entries(
    schedule: Option<&Value>,
    po_id: &str,
    skipped: &mut usize,
) -> Vec<ScheduledPayment> {
    let entries = match schedule {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(
                "{}: expected a list for payment_schedule, got {}",
                po_id, other
            );
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut cleaned = Vec::new();
    for entry in entries {
        let obj = match entry.as_object() {
            Some(obj) => obj,
            None => {
                warn!("{}: skipping non-object schedule entry {}", po_id, entry);
                *skipped += 1;
                continue;
            }
        };

        let amount = obj
            .get("payment_amount")
            .and_then(coerce_f64)
            .filter(|a| *a > 0.0)
            .map(PaymentAmount::Explicit)
            .or_else(|| {
                obj.get("payment_percent")
                    .and_then(coerce_percent)
                    .filter(|p| *p > 0.0)
                    .map(PaymentAmount::Percent)
            });

        let amount = match amount {
            Some(amount) => amount,
            None => {
                warn!(
                    "{}: skipping schedule entry with no usable amount or percent",
                    po_id
                );
                *skipped += 1;
                continue;
            }
        };

        let date = obj.get("payment_date").and_then(|v| {
            let text = coerce_string(v)?;
            let parsed = parse_date(&text);
            if parsed.is_none() {
                warn!("{}: could not parse payment date '{}'", po_id, text);
            }
            parsed
        });

        cleaned.push(ScheduledPayment { date, amount });
    }

    cleaned
}

/// Keeps milestones with a parseable positive percentage. Due dates stay
/// optional; the expander infers missing ones from the project range.
fn clean_milestones(
    milestones: Option<&Value>,
    po_id: &str,
    skipped: &mut usize,
) -> Vec<MilestoneEntry> {
    let entries = match milestones {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!("{}: expected a list for milestones, got {}", po_id, other);
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut cleaned = Vec::new();
    for entry in entries {
        let obj = match entry.as_object() {
            Some(obj) => obj,
            None => {
                warn!("{}: skipping non-object milestone {}", po_id, entry);
                *skipped += 1;
                continue;
            }
        };

        let name = obj.get("milestone_name").and_then(coerce_string);

        let percentage = match obj
            .get("milestone_percentage")
            .and_then(coerce_percent)
            .filter(|p| *p > 0.0)
        {
            Some(p) => p,
            None => {
                warn!(
                    "{}: skipping milestone '{}' with no usable percentage",
                    po_id,
                    name.as_deref().unwrap_or("Unnamed")
                );
                *skipped += 1;
                continue;
            }
        };

        let due_date = obj.get("milestone_due_date").and_then(|v| {
            let text = coerce_string(v)?;
            let parsed = parse_date(&text);
            if parsed.is_none() {
                warn!(
                    "{}: could not parse due date '{}' for milestone '{}', will infer one",
                    po_id,
                    text,
                    name.as_deref().unwrap_or("Unnamed")
                );
            }
            parsed
        });

        cleaned.push(MilestoneEntry {
            name,
            due_date,
            percentage,
        });
    }

    cleaned
}

/// Fixed POs accept two shapes: the legacy `"DD-MM-YYYY:$amount;..."`
/// string, or the same entry list distributed POs use.
fn clean_fixed_schedule(
    schedule: Option<&Value>,
    po_id: &str,
    skipped: &mut usize,
) -> Vec<ScheduledPayment> {
    match schedule {
        Some(Value::String(legacy)) => parse_legacy_fixed(legacy, po_id, skipped),
        Some(Value::Array(_)) => clean_schedule_entries(schedule, po_id, skipped),
        Some(other) => {
            warn!(
                "{}: expected a string or list for fixed payment_schedule, got {}",
                po_id, other
            );
            Vec::new()
        }
        None => {
            warn!("{}: fixed payment type with no payment_schedule", po_id);
            Vec::new()
        }
    }
}

fn parse_legacy_fixed(legacy: &str, po_id: &str, skipped: &mut usize) -> Vec<ScheduledPayment> {
    let mut cleaned = Vec::new();
    for segment in legacy.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let parsed = segment.split_once(":$").and_then(|(date_str, amount_str)| {
            let date = parse_date(date_str)?;
            let amount = amount_str.trim().replace(',', "").parse::<f64>().ok()?;
            Some(ScheduledPayment {
                date: Some(date),
                amount: PaymentAmount::Explicit(amount),
            })
        });

        match parsed {
            Some(entry) => cleaned.push(entry),
            None => {
                warn!("{}: could not parse fixed payment entry '{}'", po_id, segment);
                *skipped += 1;
            }
        }
    }
    cleaned
}

/// Months between periodic payments. Absent or unparsable values default
/// to 1; an explicit non-positive value is preserved so the expander can
/// report it.
fn periodic_frequency(schedule: Option<&Value>, po_id: &str) -> i64 {
    match schedule {
        Some(Value::Object(obj)) => match obj.get("payment_frequency") {
            Some(value) => match coerce_i64(value) {
                Some(frequency) => frequency,
                None => {
                    if !is_absent(value) {
                        warn!(
                            "{}: unparsable payment_frequency {}, defaulting to 1",
                            po_id, value
                        );
                    }
                    1
                }
            },
            None => 1,
        },
        Some(other) => {
            warn!(
                "{}: expected an object for periodic payment_schedule, got {}",
                po_id, other
            );
            1
        }
        None => 1,
    }
}
