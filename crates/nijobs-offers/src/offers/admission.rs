use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::domain::{CompanyId, OfferId, PublishWindow, ValidationError};
use super::overlap::peak_concurrency;
use super::repository::{OfferRepository, RepositoryError};

/// Average month length used by the marketplace's lifetime rule.
const MONTH_IN_MS: f64 = 1000.0 * 3600.0 * 24.0 * 30.42;

/// Largest lifetime, in months, a deployment may configure.
pub const MAX_LIFETIME_MONTHS: u32 = 1200;

/// Deployment limits for company offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferPolicy {
    max_concurrent: usize,
    max_lifetime_months: u32,
}

impl OfferPolicy {
    pub const fn new(max_concurrent: usize, max_lifetime_months: u32) -> Self {
        Self {
            max_concurrent,
            max_lifetime_months,
        }
    }

    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub const fn max_lifetime_months(&self) -> u32 {
        self.max_lifetime_months
    }

    /// Saturates at [`chrono::Duration::MAX`] for lifetimes chrono cannot represent.
    pub fn max_lifetime(&self) -> chrono::Duration {
        let millis = MONTH_IN_MS * f64::from(self.max_lifetime_months);
        chrono::Duration::try_milliseconds(millis as i64).unwrap_or(chrono::Duration::MAX)
    }

    /// End of a window starting at `start` that spans the whole lifetime.
    pub fn lifetime_end(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        start
            .checked_add_signed(self.max_lifetime())
            .ok_or(ValidationError::WindowOutOfRange { start })
    }

    /// Rejects windows longer than the configured lifetime.
    pub fn check_lifetime(&self, window: &PublishWindow) -> Result<(), ValidationError> {
        if window.span() > self.max_lifetime() {
            return Err(ValidationError::LifetimeExceeded {
                max_months: self.max_lifetime_months,
            });
        }
        Ok(())
    }
}

/// How an admission decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPath {
    /// Fewer overlapping offers than the cap; no sweep needed.
    ShortCircuit,
    Sweep,
}

impl AdmissionPath {
    pub const fn label(self) -> &'static str {
        match self {
            AdmissionPath::ShortCircuit => "short_circuit",
            AdmissionPath::Sweep => "sweep",
        }
    }
}

/// Outcome of an admission check with enough context to explain a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub cap: usize,
    pub window: PublishWindow,
    /// Non-hidden, non-archived offers of the owner overlapping the window.
    pub overlapping: usize,
    /// Peak concurrency among the overlapping offers; `None` when the sweep was skipped.
    pub peak: Option<usize>,
    pub path: AdmissionPath,
}

/// Accepts or rejects a candidate offer window against the concurrency cap.
///
/// The check reads a snapshot and does not lock: two concurrent admissions for the
/// same owner can both pass. Callers needing a hard guarantee must serialize
/// admit-then-write per owner.
pub struct AdmissionControl<R> {
    repository: Arc<R>,
    max_concurrent: usize,
}

impl<R> AdmissionControl<R>
where
    R: OfferRepository,
{
    pub fn new(repository: Arc<R>, policy: OfferPolicy) -> Self {
        Self {
            repository,
            max_concurrent: policy.max_concurrent(),
        }
    }

    pub fn can_admit(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<bool, RepositoryError> {
        Ok(self.evaluate(owner, window, exclude)?.admitted)
    }

    pub fn evaluate(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<AdmissionDecision, RepositoryError> {
        let overlapping = self
            .repository
            .active_offers_overlapping(owner, window, exclude)?;
        let cap = self.max_concurrent;

        // With n < cap existing offers, even all of them plus the candidate fit.
        let decision = if overlapping.len() < cap {
            AdmissionDecision {
                admitted: true,
                cap,
                window: *window,
                overlapping: overlapping.len(),
                peak: None,
                path: AdmissionPath::ShortCircuit,
            }
        } else {
            let peak = peak_concurrency(overlapping.iter().map(|offer| &offer.window));
            AdmissionDecision {
                admitted: peak < cap,
                cap,
                window: *window,
                overlapping: overlapping.len(),
                peak: Some(peak),
                path: AdmissionPath::Sweep,
            }
        };

        let outcome = if decision.admitted {
            "admitted"
        } else {
            "rejected"
        };
        metrics::counter!(
            "offer_admission_decisions_total",
            "outcome" => outcome,
            "path" => decision.path.label()
        )
        .increment(1);
        debug!(
            %owner,
            %window,
            overlapping = decision.overlapping,
            peak = ?decision.peak,
            cap,
            outcome,
            "admission evaluated"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers::domain::{ApprovalStatus, Company, Offer, Visibility};
    use crate::offers::memory::InMemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    fn window(from: u32, to: u32) -> PublishWindow {
        PublishWindow::new(jan(from), jan(to)).expect("valid window")
    }

    fn acme() -> CompanyId {
        CompanyId("acme".to_string())
    }

    fn store_with(windows: &[(u32, u32)]) -> Arc<InMemoryStore> {
        let offers = windows.iter().enumerate().map(|(index, (from, to))| Offer {
            id: OfferId(format!("offer-{index}")),
            owner: acme(),
            window: window(*from, *to),
            is_pending: index % 2 == 0,
            visibility: Visibility::Visible,
            is_archived: false,
        });
        let company = Company {
            id: acme(),
            name: "Acme".to_string(),
            is_blocked: false,
            admin_reason: None,
            is_disabled: false,
            approval: ApprovalStatus::Approved,
        };
        Arc::new(InMemoryStore::with_records([company], offers))
    }

    #[test]
    fn short_circuits_below_cap() {
        let control = AdmissionControl::new(store_with(&[(1, 10), (5, 20)]), OfferPolicy::new(3, 6));
        let decision = control
            .evaluate(&acme(), &window(8, 15), None)
            .expect("evaluates");

        assert!(decision.admitted);
        assert_eq!(decision.overlapping, 2);
        assert_eq!(decision.peak, None);
        assert_eq!(decision.path, AdmissionPath::ShortCircuit);
    }

    #[test]
    fn sweep_rejects_when_existing_peak_reaches_cap() {
        let control = AdmissionControl::new(store_with(&[(1, 10), (5, 20)]), OfferPolicy::new(2, 6));
        let decision = control
            .evaluate(&acme(), &window(8, 9), None)
            .expect("evaluates");

        assert!(!decision.admitted);
        assert_eq!(decision.peak, Some(2));
        assert_eq!(decision.path, AdmissionPath::Sweep);
    }

    #[test]
    fn sweep_admits_when_overlapping_offers_never_coincide() {
        // Both existing offers overlap the candidate but not each other.
        let control = AdmissionControl::new(store_with(&[(1, 5), (10, 20)]), OfferPolicy::new(2, 6));
        let decision = control
            .evaluate(&acme(), &window(4, 12), None)
            .expect("evaluates");

        assert!(decision.admitted);
        assert_eq!(decision.overlapping, 2);
        assert_eq!(decision.peak, Some(1));
    }

    #[test]
    fn excluded_offer_does_not_count_against_itself() {
        let control = AdmissionControl::new(store_with(&[(1, 10), (5, 20)]), OfferPolicy::new(2, 6));
        let admitted = control
            .can_admit(&acme(), &window(8, 9), Some(&OfferId("offer-1".to_string())))
            .expect("evaluates");
        assert!(admitted);
    }

    #[test]
    fn lifetime_bound_uses_average_month_length() {
        let policy = OfferPolicy::new(5, 6);
        let start = jan(1);
        let within = PublishWindow::new(start, start + chrono::Duration::days(182)).expect("valid");
        let beyond = PublishWindow::new(start, start + chrono::Duration::days(183)).expect("valid");

        assert!(policy.check_lifetime(&within).is_ok());
        assert_eq!(
            policy.check_lifetime(&beyond),
            Err(ValidationError::LifetimeExceeded { max_months: 6 })
        );
    }

    #[test]
    fn lifetime_end_reports_windows_past_the_calendar() {
        let policy = OfferPolicy::new(5, 6);
        let start = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(10);

        assert_eq!(
            policy.lifetime_end(start),
            Err(ValidationError::WindowOutOfRange { start })
        );
        assert_eq!(
            policy.lifetime_end(jan(1)),
            Ok(jan(1) + policy.max_lifetime())
        );
    }

    #[test]
    fn oversized_lifetime_saturates_instead_of_wrapping() {
        let policy = OfferPolicy::new(5, u32::MAX);
        let window = PublishWindow::new(jan(1), DateTime::<Utc>::MAX_UTC).expect("valid");

        assert!(policy.max_lifetime() > chrono::Duration::days(365 * 1000));
        assert!(policy.check_lifetime(&window).is_ok());
        assert!(policy.lifetime_end(jan(1)).is_err());
    }
}
