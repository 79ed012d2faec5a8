use crate::schema::{MilestoneEntry, NormalizedPo, PaymentPlan, ScheduledPayment};
use crate::utils::{add_months, evenly_spaced_dates, month_key, month_start, month_starts_between};
use chrono::{Datelike, Duration, NaiveDate};
use log::warn;
use std::collections::BTreeMap;

/// Aggregated inflow keyed by `"YYYY-MM"`. Months with zero inflow are
/// omitted; the pivot builder fills gaps later.
pub type MonthlyInflow = BTreeMap<String, f64>;

/// Day-of-month at which a periodic payment slips into the next
/// accounting month. Payments landing on or after this day are treated
/// as arriving too late for the current billing cycle.
pub const MONTH_SHIFT_DAY: u32 = 25;

/// Result of expanding one purchase order.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub monthly: MonthlyInflow,
    /// Schedule entries or milestones that had to be skipped because no
    /// usable date could be resolved.
    pub skipped_entries: usize,
}

/// Expands a normalized purchase order into its monthly inflow map.
///
/// Infallible by construction: the payment plan is a closed union built
/// only by the normalizer, so there is no unsupported-type branch left to
/// fail on. Records whose dates cannot be resolved yield an empty map.
pub fn expand(po: &NormalizedPo) -> Expansion {
    let (monthly, skipped_entries) = match &po.plan {
        PaymentPlan::Distributed(schedule) | PaymentPlan::Fixed(schedule) => {
            expand_scheduled(schedule, po.amount, po.payment_terms_days, &po.po_id)
        }
        PaymentPlan::Milestone(milestones) => expand_milestones(po, milestones),
        PaymentPlan::Even => expand_even(po),
        PaymentPlan::Periodic { frequency_months } => expand_periodic(po, *frequency_months),
    };

    Expansion {
        monthly,
        skipped_entries,
    }
}

/// `effective = scheduled + payment_terms`; bucketed by the effective
/// date's month. Shared by every payment type except the periodic
/// cutoff override.
fn bucket(inflow: &mut MonthlyInflow, scheduled: NaiveDate, delay_days: i64, amount: f64) {
    let effective = scheduled + Duration::days(delay_days);
    *inflow.entry(month_key(month_start(effective))).or_insert(0.0) += amount;
}

fn expand_scheduled(
    schedule: &[ScheduledPayment],
    total: f64,
    delay_days: i64,
    po_id: &str,
) -> (MonthlyInflow, usize) {
    let mut inflow = MonthlyInflow::new();
    let mut skipped = 0;

    for entry in schedule {
        match entry.date {
            Some(date) => bucket(&mut inflow, date, delay_days, entry.amount.resolve(total)),
            None => {
                warn!("{}: schedule entry has no usable date, skipping", po_id);
                skipped += 1;
            }
        }
    }

    (inflow, skipped)
}

fn expand_milestones(po: &NormalizedPo, milestones: &[MilestoneEntry]) -> (MonthlyInflow, usize) {
    let inferred = infer_milestone_dates(po.start_date, po.end_date, milestones.len());

    let mut inflow = MonthlyInflow::new();
    let mut skipped = 0;

    for (i, milestone) in milestones.iter().enumerate() {
        let date = milestone
            .due_date
            .or_else(|| inferred.get(i).copied().flatten());

        match date {
            Some(date) => {
                let amount = po.amount * milestone.percentage / 100.0;
                bucket(&mut inflow, date, po.payment_terms_days, amount);
            }
            None => {
                warn!(
                    "{}: no valid date for milestone '{}', skipping",
                    po.po_id,
                    milestone.name.as_deref().unwrap_or("Unnamed")
                );
                skipped += 1;
            }
        }
    }

    (inflow, skipped)
}

/// Fallback dates for milestones that carry no usable due date.
///
/// With both project dates, milestones spread evenly across the range.
/// With only a start date, they step in `12 / n` month strides (30-day
/// strides once the count exceeds a year's worth). With neither, nothing
/// can be inferred.
fn infer_milestone_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    n: usize,
) -> Vec<Option<NaiveDate>> {
    if n == 0 {
        return Vec::new();
    }
    match (start, end) {
        (Some(start), Some(end)) => evenly_spaced_dates(start, end, n)
            .into_iter()
            .map(Some)
            .collect(),
        (Some(start), None) => {
            if n <= 12 {
                let stride_months = (12 / n) as u32;
                (0..n)
                    .map(|i| add_months(start, stride_months * i as u32))
                    .collect()
            } else {
                (0..n)
                    .map(|i| start.checked_add_signed(Duration::days(30 * i as i64)))
                    .collect()
            }
        }
        _ => vec![None; n],
    }
}

fn expand_even(po: &NormalizedPo) -> (MonthlyInflow, usize) {
    let (start, end) = match (po.start_date, po.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            warn!(
                "{}: even payment type requires valid start_date and end_date, skipping",
                po.po_id
            );
            return (MonthlyInflow::new(), 0);
        }
    };

    let months = month_starts_between(start, end);
    if months.is_empty() {
        warn!(
            "{}: even payment dates span no whole months, inflow will be empty",
            po.po_id
        );
        return (MonthlyInflow::new(), 0);
    }

    let monthly_amount = po.amount / months.len() as f64;
    let mut inflow = MonthlyInflow::new();
    for date in months {
        bucket(&mut inflow, date, po.payment_terms_days, monthly_amount);
    }

    (inflow, 0)
}

fn expand_periodic(po: &NormalizedPo, frequency_months: i64) -> (MonthlyInflow, usize) {
    let (start, end) = match (po.start_date, po.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            warn!(
                "{}: periodic payment type requires valid start_date and end_date, skipping",
                po.po_id
            );
            return (MonthlyInflow::new(), 0);
        }
    };

    if frequency_months <= 0 {
        warn!(
            "{}: periodic payment_frequency must be positive, got {}",
            po.po_id, frequency_months
        );
        return (MonthlyInflow::new(), 0);
    }

    let mut scheduled_dates = Vec::new();
    let mut current = start;
    while current <= end {
        scheduled_dates.push(current);
        current = match add_months(current, frequency_months as u32) {
            Some(next) => next,
            None => break,
        };
    }

    if scheduled_dates.is_empty() {
        warn!("{}: no scheduled dates generated for periodic payment", po.po_id);
        return (MonthlyInflow::new(), 0);
    }

    let amount_per_period = po.amount / scheduled_dates.len() as f64;
    let mut inflow = MonthlyInflow::new();

    for scheduled in scheduled_dates {
        let effective = scheduled + Duration::days(po.payment_terms_days);

        // Billing-cycle cutoff: day 24 stays in its own month, day 25
        // rolls into the next.
        let bucket_month = if effective.day() >= MONTH_SHIFT_DAY {
            match add_months(month_start(effective), 1) {
                Some(next) => next,
                None => month_start(effective),
            }
        } else {
            month_start(effective)
        };

        *inflow.entry(month_key(bucket_month)).or_insert(0.0) += amount_per_period;
    }

    (inflow, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PaymentAmount, PoStatus};

    fn base_po(plan: PaymentPlan) -> NormalizedPo {
        NormalizedPo {
            po_id: "PO-1".to_string(),
            client_name: "Acme".to_string(),
            project_owner: None,
            amount: 300.0,
            status: PoStatus::Confirmed,
            payment_terms_days: 0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            plan,
            skipped_entries: 0,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_even_split_over_three_months() {
        let result = expand(&base_po(PaymentPlan::Even));
        assert_eq!(result.monthly.len(), 3);
        assert_eq!(result.monthly["2024-01"], 100.0);
        assert_eq!(result.monthly["2024-02"], 100.0);
        assert_eq!(result.monthly["2024-03"], 100.0);
    }

    #[test]
    fn test_even_delay_shifts_bucket_month() {
        let mut po = base_po(PaymentPlan::Even);
        po.payment_terms_days = 31;
        let result = expand(&po);
        // Every slice lands one month later once the offset crosses the
        // month boundary.
        assert_eq!(result.monthly["2024-02"], 100.0);
        assert_eq!(result.monthly["2024-03"], 100.0);
        assert_eq!(result.monthly["2024-04"], 100.0);
        assert!(!result.monthly.contains_key("2024-01"));
    }

    #[test]
    fn test_even_requires_both_dates() {
        let mut po = base_po(PaymentPlan::Even);
        po.end_date = None;
        let result = expand(&po);
        assert!(result.monthly.is_empty());
    }

    #[test]
    fn test_periodic_month_shift_boundary() {
        let mut po = base_po(PaymentPlan::Periodic { frequency_months: 1 });
        po.amount = 600.0;
        po.end_date = NaiveDate::from_ymd_opt(2024, 6, 1);

        // Day 25: every payment rolls into the following month.
        po.payment_terms_days = 24;
        let shifted = expand(&po);
        assert!(shifted.monthly.contains_key("2024-02"));
        assert!(!shifted.monthly.contains_key("2024-01"));
        assert_eq!(shifted.monthly["2024-02"], 100.0);

        // Day 24: every payment stays in its own month.
        po.payment_terms_days = 23;
        let unshifted = expand(&po);
        assert!(unshifted.monthly.contains_key("2024-01"));
        assert_eq!(unshifted.monthly["2024-01"], 100.0);
    }

    #[test]
    fn test_periodic_conservation() {
        let mut po = base_po(PaymentPlan::Periodic { frequency_months: 2 });
        po.amount = 900.0;
        po.end_date = NaiveDate::from_ymd_opt(2024, 12, 1);
        let result = expand(&po);
        // Jan, Mar, May, Jul, Sep, Nov.
        assert_eq!(result.monthly.len(), 6);
        let total: f64 = result.monthly.values().sum();
        assert!((total - 900.0).abs() < 0.01, "expected 900, got {}", total);
    }

    #[test]
    fn test_periodic_zero_frequency_yields_empty_map() {
        let po = base_po(PaymentPlan::Periodic { frequency_months: 0 });
        let result = expand(&po);
        assert!(result.monthly.is_empty());
    }

    #[test]
    fn test_distributed_mixes_amounts_and_percents() {
        let mut po = base_po(PaymentPlan::Distributed(vec![
            ScheduledPayment {
                date: Some(ymd(2024, 1, 10)),
                amount: PaymentAmount::Explicit(120.0),
            },
            ScheduledPayment {
                date: Some(ymd(2024, 1, 20)),
                amount: PaymentAmount::Percent(50.0),
            },
            ScheduledPayment {
                date: None,
                amount: PaymentAmount::Explicit(999.0),
            },
        ]));
        po.amount = 300.0;

        let result = expand(&po);
        assert_eq!(result.monthly["2024-01"], 120.0 + 150.0);
        assert_eq!(result.skipped_entries, 1);
        assert_eq!(result.monthly.len(), 1);
    }

    #[test]
    fn test_distributed_delay_offsets_dates() {
        let po = NormalizedPo {
            payment_terms_days: 30,
            ..base_po(PaymentPlan::Distributed(vec![ScheduledPayment {
                date: Some(ymd(2024, 1, 15)),
                amount: PaymentAmount::Explicit(100.0),
            }]))
        };
        let result = expand(&po);
        assert_eq!(result.monthly["2024-02"], 100.0);
    }

    #[test]
    fn test_milestones_interpolate_between_project_dates() {
        let mut po = base_po(PaymentPlan::Milestone(vec![
            MilestoneEntry {
                name: Some("Kickoff".to_string()),
                due_date: None,
                percentage: 20.0,
            },
            MilestoneEntry {
                name: Some("Midpoint".to_string()),
                due_date: None,
                percentage: 30.0,
            },
            MilestoneEntry {
                name: Some("Delivery".to_string()),
                due_date: None,
                percentage: 50.0,
            },
        ]));
        po.amount = 1000.0;

        let result = expand(&po);
        // Jan 1, Jan 31, Mar 1 over the 60-day range.
        assert_eq!(result.monthly["2024-01"], 200.0 + 300.0);
        assert_eq!(result.monthly["2024-03"], 500.0);
    }

    #[test]
    fn test_milestone_explicit_due_date_overrides_inference() {
        let mut po = base_po(PaymentPlan::Milestone(vec![
            MilestoneEntry {
                name: None,
                due_date: Some(ymd(2024, 6, 15)),
                percentage: 60.0,
            },
            MilestoneEntry {
                name: None,
                due_date: None,
                percentage: 40.0,
            },
        ]));
        po.amount = 1000.0;

        let result = expand(&po);
        assert_eq!(result.monthly["2024-06"], 600.0);
        // The undated milestone falls back to the interpolated end date.
        assert_eq!(result.monthly["2024-03"], 400.0);
    }

    #[test]
    fn test_milestone_start_only_uses_month_strides() {
        let mut po = base_po(PaymentPlan::Milestone(vec![
            MilestoneEntry {
                name: None,
                due_date: None,
                percentage: 50.0,
            },
            MilestoneEntry {
                name: None,
                due_date: None,
                percentage: 50.0,
            },
        ]));
        po.end_date = None;
        po.amount = 1000.0;

        // Two milestones, start-only: strides of 12 / 2 = 6 months.
        let result = expand(&po);
        assert_eq!(result.monthly["2024-01"], 500.0);
        assert_eq!(result.monthly["2024-07"], 500.0);
    }

    #[test]
    fn test_milestones_without_any_dates_yield_empty_map() {
        let mut po = base_po(PaymentPlan::Milestone(vec![MilestoneEntry {
            name: None,
            due_date: None,
            percentage: 100.0,
        }]));
        po.start_date = None;
        po.end_date = None;

        let result = expand(&po);
        assert!(result.monthly.is_empty());
        assert_eq!(result.skipped_entries, 1);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let po = base_po(PaymentPlan::Even);
        assert_eq!(expand(&po), expand(&po));

        let mut periodic = base_po(PaymentPlan::Periodic { frequency_months: 1 });
        periodic.payment_terms_days = 24;
        assert_eq!(expand(&periodic), expand(&periodic));
    }

    #[test]
    fn test_fixed_buckets_like_distributed() {
        let po = base_po(PaymentPlan::Fixed(vec![
            ScheduledPayment {
                date: Some(ymd(2024, 2, 1)),
                amount: PaymentAmount::Explicit(500.0),
            },
            ScheduledPayment {
                date: Some(ymd(2024, 2, 20)),
                amount: PaymentAmount::Explicit(250.5),
            },
        ]));
        let result = expand(&po);
        assert_eq!(result.monthly["2024-02"], 750.5);
    }
}
