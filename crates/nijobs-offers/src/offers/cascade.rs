use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{CompanyEvent, CompanyId, HiddenReason, HiddenReasonKind, Visibility};
use super::repository::{BulkUpdateError, ConditionalUpdate, OfferRepository, VisibilityMatch};

/// The single conditional update a company event maps to.
///
/// Blocking or disabling hides only currently visible offers, so an earlier hide
/// reason is never overwritten. Lifting the restriction only reveals offers hidden
/// for that same reason.
pub fn update_for(company: &CompanyId, event: CompanyEvent) -> ConditionalUpdate {
    let (matching, set) = match event {
        CompanyEvent::Blocked => (
            VisibilityMatch::Visible,
            Visibility::Hidden(HiddenReason::CompanyBlocked),
        ),
        CompanyEvent::Unblocked => (
            VisibilityMatch::HiddenFor(HiddenReasonKind::CompanyBlocked),
            Visibility::Visible,
        ),
        CompanyEvent::Disabled => (
            VisibilityMatch::Visible,
            Visibility::Hidden(HiddenReason::CompanyDisabled),
        ),
        CompanyEvent::Enabled => (
            VisibilityMatch::HiddenFor(HiddenReasonKind::CompanyDisabled),
            Visibility::Visible,
        ),
    };

    ConditionalUpdate {
        owner: company.clone(),
        matching,
        set,
    }
}

/// Propagates company moderation events to the company's offers.
///
/// Cascades are filter-based and idempotent: after a partial failure, running the same
/// event again only touches offers that still match.
pub struct CompanyCascade<R> {
    repository: Arc<R>,
}

impl<R> CompanyCascade<R>
where
    R: OfferRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn run(&self, company: &CompanyId, event: CompanyEvent) -> Result<usize, BulkUpdateError> {
        let update = update_for(company, event);
        match self.repository.update_offers_where(&update) {
            Ok(affected) => {
                record(event, affected);
                info!(%company, %event, affected, "company cascade applied");
                Ok(affected)
            }
            Err(err) => {
                record(event, err.applied);
                warn!(
                    %company,
                    %event,
                    applied = err.applied,
                    error = %err.source,
                    "company cascade interrupted"
                );
                Err(err)
            }
        }
    }
}

fn record(event: CompanyEvent, affected: usize) {
    metrics::counter!("offer_cascade_updates_total", "event" => event.label())
        .increment(affected as u64);
}
