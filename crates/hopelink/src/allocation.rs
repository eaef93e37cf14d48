//! Pure allocation arithmetic: urgency ranking and proportional splitting.
//!
//! Nothing here performs I/O. Workflow handlers fetch candidates through the
//! read boundary, rank them, and hand the ranked slice to [`allocate`].

use hopelink_protocol::{AllocationLine, Beneficiary, Orphanage};

/// Anything that can be ranked by urgency.
pub trait Ranked {
    fn urgency_score(&self) -> f64;
    /// Stable identifier used to break urgency ties deterministically.
    fn rank_id(&self) -> &str;
}

impl Ranked for Beneficiary {
    fn urgency_score(&self) -> f64 {
        self.urgency_score
    }

    fn rank_id(&self) -> &str {
        &self.id
    }
}

impl Ranked for Orphanage {
    fn urgency_score(&self) -> f64 {
        self.urgency_score
    }

    fn rank_id(&self) -> &str {
        &self.id
    }
}

/// Sort highest urgency first. Equal scores fall back to id order so the
/// ranking (and therefore which recipient absorbs rounding remainders) is
/// identical across retries.
pub fn rank_by_urgency<T: Ranked>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(|a, b| {
        b.urgency_score()
            .partial_cmp(&a.urgency_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.rank_id().cmp(b.rank_id()))
    });
    items
}

/// Keep only recipients with urgency at or above `threshold`.
pub fn filter_emergency_cases(children: &[Beneficiary], threshold: f64) -> Vec<Beneficiary> {
    children
        .iter()
        .filter(|child| child.urgency_score >= threshold)
        .cloned()
        .collect()
}

/// Split `amount` across `recipients` proportionally to outstanding need.
///
/// Rules:
/// - recipients with no outstanding need are skipped;
/// - no recipient receives more than their outstanding need;
/// - every share except the final recipient's is the proportional amount
///   rounded to 2 digits; the final recipient absorbs whatever remains
///   (capped at their own need) so the total adds up exactly;
/// - iteration stops once the amount is exhausted.
///
/// Returns an empty plan when the amount is non-positive, the recipient
/// list is empty, or nobody has outstanding need.
pub fn allocate(amount: f64, recipients: &[Beneficiary]) -> Vec<AllocationLine> {
    if recipients.is_empty() || amount <= 0.0 {
        return Vec::new();
    }

    let total_needed: f64 = recipients.iter().map(|r| r.outstanding_need()).sum();
    if total_needed <= 0.0 {
        return Vec::new();
    }

    let mut allocations = Vec::new();
    let mut remaining = amount;

    for (index, recipient) in recipients.iter().enumerate() {
        let needed = recipient.outstanding_need();
        if needed <= 0.0 {
            continue;
        }

        let allocated = if index == recipients.len() - 1 {
            remaining.min(needed)
        } else {
            round2((amount * needed / total_needed).min(needed))
        };
        remaining -= allocated;

        allocations.push(AllocationLine {
            beneficiary_id: recipient.id.clone(),
            beneficiary_name: recipient.name.clone(),
            allocated_amount: allocated,
            funding_needed: needed,
            funding_received: recipient.funding_received,
            percentage: round1(allocated / amount * 100.0),
            story: recipient.story.clone(),
            location: recipient.location.clone(),
            items_needed: recipient.items_needed.clone(),
        });

        if remaining <= 0.0 {
            break;
        }
    }

    allocations
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
