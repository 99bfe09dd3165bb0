use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::admission::{AdmissionControl, AdmissionDecision, OfferPolicy};
use super::cascade::CompanyCascade;
use super::domain::{
    Action, ActorCapabilities, Company, CompanyEvent, CompanyId, HiddenReason, HiddenReasonKind,
    ModerationAction, Offer, OfferAction, OfferId, OfferStatus, PublishWindow, ValidationError,
    Visibility,
};
use super::repository::{
    CompanyRepository, Notification, NotificationPublisher, NotificationTemplate,
    OfferRepository, RepositoryError,
};
use super::visibility::{self, Capability, ForbiddenReason, HideRequest, TransitionError};

static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Coordinates admission, visibility transitions, and company moderation.
///
/// Single-offer operations validate everything before the one document write they
/// perform. Notifications go out after the write commits and never undo it.
pub struct OfferService<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    admission: AdmissionControl<S>,
    cascade: CompanyCascade<S>,
    policy: OfferPolicy,
}

impl<S, N> OfferService<S, N>
where
    S: OfferRepository + CompanyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, policy: OfferPolicy) -> Self {
        Self {
            admission: AdmissionControl::new(store.clone(), policy),
            cascade: CompanyCascade::new(store.clone()),
            store,
            notifications,
            policy,
        }
    }

    pub fn policy(&self) -> OfferPolicy {
        self.policy
    }

    pub fn can_admit(
        &self,
        owner: &CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&OfferId>,
    ) -> Result<bool, OfferServiceError> {
        let window = PublishWindow::new(start, end)?;
        Ok(self.admission.can_admit(owner, &window, exclude)?)
    }

    /// Full admission outcome, for callers that report why a window was rejected.
    pub fn admission_decision(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<AdmissionDecision, OfferServiceError> {
        Ok(self.admission.evaluate(owner, window, exclude)?)
    }

    /// Whether `owner` is already at the cap for the given window.
    ///
    /// `start` defaults to `now` and `end` to `start` plus the maximum offer lifetime.
    pub fn has_reached_max_concurrent(
        &self,
        owner: &CompanyId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, OfferServiceError> {
        self.load_company(owner)?;
        let start = start.unwrap_or(now);
        let end = match end {
            Some(end) => end,
            None => self.policy.lifetime_end(start)?,
        };
        Ok(!self.can_admit(owner, start, end, None)?)
    }

    /// Admits and stores a new visible offer.
    ///
    /// The offer is pending when the caller says so or the company is not yet approved;
    /// pending offers still count toward the cap.
    pub fn create_offer(
        &self,
        owner: &CompanyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        pending_hint: bool,
    ) -> Result<Offer, OfferServiceError> {
        let window = PublishWindow::new(start, end)?;
        self.policy.check_lifetime(&window)?;

        let company = self.load_company(owner)?;
        if let Some(reason) = visibility::restriction(&company) {
            return Err(OfferServiceError::Forbidden {
                action: OfferAction::Create.into(),
                reason,
            });
        }
        self.ensure_admitted(owner, &window, None)?;

        let offer = Offer {
            id: next_offer_id(),
            owner: owner.clone(),
            window,
            is_pending: pending_hint || !company.is_approved(),
            visibility: Visibility::Visible,
            is_archived: false,
        };
        let offer = self.store.insert_offer(offer)?;

        record_transition(OfferAction::Create);
        info!(offer = %offer.id, %owner, %window, pending = offer.is_pending, "offer created");
        Ok(offer)
    }

    /// Moves an offer's publication window, re-running admission while the offer counts.
    pub fn edit_offer_window(
        &self,
        offer_id: &OfferId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor: &ActorCapabilities,
    ) -> Result<Offer, OfferServiceError> {
        let window = PublishWindow::new(start, end)?;
        let offer = self.load_offer(offer_id)?;
        let company = self.load_company(&offer.owner)?;

        let next = visibility::edit_window(&offer, &company, window, actor)
            .map_err(|err| OfferServiceError::from_transition(&offer.id, err))?;
        self.policy.check_lifetime(&window)?;
        if next.is_counted() {
            self.ensure_admitted(&next.owner, &window, Some(&next.id))?;
        }

        self.store.save_offer(&next)?;
        record_transition(OfferAction::EditWindow);
        info!(offer = %next.id, from = %offer.window, to = %window, "offer window edited");
        Ok(next)
    }

    pub fn hide_offer(
        &self,
        offer_id: &OfferId,
        request: HideRequest,
        actor: &ActorCapabilities,
    ) -> Result<Offer, OfferServiceError> {
        let action = request.action();
        let offer = self.load_offer(offer_id)?;
        let company = self.load_company(&offer.owner)?;

        let next = visibility::hide(&offer, &company, request, actor)
            .map_err(|err| OfferServiceError::from_transition(&offer.id, err))?;
        self.store.save_offer(&next)?;

        record_transition(action);
        info!(offer = %next.id, status = %next.status(), "offer hidden");

        if let Some(reason) = next.admin_reason() {
            let mut details = BTreeMap::new();
            details.insert("adminReason".to_string(), reason.to_string());
            self.notify(Notification {
                template: NotificationTemplate::OfferDisabled,
                company: next.owner.clone(),
                offer: Some(next.id.clone()),
                details,
            });
        }
        Ok(next)
    }

    /// Makes a hidden offer visible again once it still fits under the cap.
    pub fn enable_offer(
        &self,
        offer_id: &OfferId,
        actor: &ActorCapabilities,
    ) -> Result<Offer, OfferServiceError> {
        let offer = self.load_offer(offer_id)?;
        let company = self.load_company(&offer.owner)?;

        let next = visibility::enable(&offer, &company, actor)
            .map_err(|err| OfferServiceError::from_transition(&offer.id, err))?;
        // Other offers may have been admitted while this one was hidden.
        self.ensure_admitted(&next.owner, &next.window, Some(&next.id))?;
        self.store.save_offer(&next)?;

        record_transition(OfferAction::Enable);
        info!(offer = %next.id, from = %offer.status(), "offer enabled");
        Ok(next)
    }

    pub fn archive_offer(
        &self,
        offer_id: &OfferId,
        actor: &ActorCapabilities,
    ) -> Result<Offer, OfferServiceError> {
        let offer = self.load_offer(offer_id)?;
        let company = self.load_company(&offer.owner)?;

        let next = visibility::archive(&offer, &company, actor)
            .map_err(|err| OfferServiceError::from_transition(&offer.id, err))?;
        self.store.save_offer(&next)?;

        record_transition(OfferAction::Archive);
        info!(offer = %next.id, "offer archived");
        Ok(next)
    }

    /// Applies one company event to the company's offers.
    pub fn cascade(
        &self,
        company: &CompanyId,
        event: CompanyEvent,
    ) -> Result<usize, OfferServiceError> {
        self.cascade
            .run(company, event)
            .map_err(|err| OfferServiceError::CascadeInterrupted {
                company: company.clone(),
                event,
                applied: err.applied,
                source: err.source,
            })
    }

    pub fn block_company(
        &self,
        company_id: &CompanyId,
        admin_reason: &str,
        actor: &ActorCapabilities,
    ) -> Result<CompanyModeration, OfferServiceError> {
        const ACTION: ModerationAction = ModerationAction::BlockCompany;
        require_company_capability(Capability::Admin, actor, ACTION)?;
        let admin_reason = admin_reason.trim();
        if admin_reason.is_empty() {
            return Err(ValidationError::MissingAdminReason {
                action: ACTION.label(),
            }
            .into());
        }

        let mut company = self.load_company(company_id)?;
        company.is_blocked = true;
        company.admin_reason = Some(admin_reason.to_string());
        self.store.save_company(&company)?;

        let affected = self.cascade(company_id, CompanyEvent::Blocked)?;
        self.notify_company(NotificationTemplate::CompanyBlocked, &company);
        Ok(CompanyModeration { company, affected })
    }

    /// Lifts a block. Only offers hidden by the block are revealed.
    pub fn unblock_company(
        &self,
        company_id: &CompanyId,
        actor: &ActorCapabilities,
    ) -> Result<CompanyModeration, OfferServiceError> {
        require_company_capability(Capability::Admin, actor, ModerationAction::UnblockCompany)?;

        let mut company = self.load_company(company_id)?;
        company.is_blocked = false;
        company.admin_reason = None;
        self.store.save_company(&company)?;

        let affected = self.cascade(company_id, CompanyEvent::Unblocked)?;
        self.notify_company(NotificationTemplate::CompanyUnblocked, &company);
        Ok(CompanyModeration { company, affected })
    }

    /// Disabling is the company's own decision; plain admins block instead.
    pub fn disable_company(
        &self,
        company_id: &CompanyId,
        actor: &ActorCapabilities,
    ) -> Result<CompanyModeration, OfferServiceError> {
        require_company_capability(
            Capability::OwnerOrGod,
            actor,
            ModerationAction::DisableCompany,
        )?;

        let mut company = self.load_company(company_id)?;
        company.is_disabled = true;
        self.store.save_company(&company)?;

        let affected = self.cascade(company_id, CompanyEvent::Disabled)?;
        self.notify_company(NotificationTemplate::CompanyDisabled, &company);
        Ok(CompanyModeration { company, affected })
    }

    pub fn enable_company(
        &self,
        company_id: &CompanyId,
        actor: &ActorCapabilities,
    ) -> Result<CompanyModeration, OfferServiceError> {
        require_company_capability(
            Capability::OwnerOrAdmin,
            actor,
            ModerationAction::EnableCompany,
        )?;

        let mut company = self.load_company(company_id)?;
        company.is_disabled = false;
        self.store.save_company(&company)?;

        let affected = self.cascade(company_id, CompanyEvent::Enabled)?;
        self.notify_company(NotificationTemplate::CompanyEnabled, &company);
        Ok(CompanyModeration { company, affected })
    }

    /// Public projection of an offer for the given caller.
    pub fn offer_view(
        &self,
        offer_id: &OfferId,
        actor: &ActorCapabilities,
    ) -> Result<OfferView, OfferServiceError> {
        let offer = self.load_offer(offer_id)?;
        if offer.is_hidden() && !actor.is_owner_or_admin() {
            return Err(OfferServiceError::NotFound(MissingRecord::Offer(offer.id)));
        }
        Ok(OfferView::project(&offer, actor))
    }

    pub fn offers_of(&self, owner: &CompanyId) -> Result<Vec<Offer>, OfferServiceError> {
        Ok(self.store.offers_of(owner)?)
    }

    fn ensure_admitted(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<(), OfferServiceError> {
        let decision = self.admission.evaluate(owner, window, exclude)?;
        if decision.admitted {
            return Ok(());
        }
        warn!(
            %owner,
            %window,
            cap = decision.cap,
            overlapping = decision.overlapping,
            "offer rejected by concurrency cap"
        );
        Err(OfferServiceError::ConcurrencyLimitExceeded {
            cap: decision.cap,
            window: decision.window,
            overlapping: decision.overlapping,
        })
    }

    fn load_offer(&self, id: &OfferId) -> Result<Offer, OfferServiceError> {
        self.store
            .fetch_offer(id)?
            .ok_or_else(|| OfferServiceError::NotFound(MissingRecord::Offer(id.clone())))
    }

    fn load_company(&self, id: &CompanyId) -> Result<Company, OfferServiceError> {
        self.store
            .fetch_company(id)?
            .ok_or_else(|| OfferServiceError::NotFound(MissingRecord::Company(id.clone())))
    }

    fn notify_company(&self, template: NotificationTemplate, company: &Company) {
        let mut details = BTreeMap::new();
        details.insert("companyName".to_string(), company.name.clone());
        if let Some(reason) = &company.admin_reason {
            details.insert("adminReason".to_string(), reason.clone());
        }
        self.notify(Notification {
            template,
            company: company.id.clone(),
            offer: None,
            details,
        });
    }

    fn notify(&self, notification: Notification) {
        let template = notification.template;
        let company = notification.company.clone();
        if let Err(err) = self.notifications.publish(notification) {
            warn!(?template, %company, error = %err, "notification dispatch failed");
        }
    }
}

fn next_offer_id() -> OfferId {
    let id = OFFER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OfferId(format!("offer-{id:06}"))
}

fn record_transition(action: OfferAction) {
    metrics::counter!("offer_transitions_total", "action" => action.label()).increment(1);
}

fn require_company_capability(
    capability: Capability,
    actor: &ActorCapabilities,
    action: ModerationAction,
) -> Result<(), OfferServiceError> {
    if capability.granted_by(actor) {
        return Ok(());
    }
    Err(OfferServiceError::Forbidden {
        action: action.into(),
        reason: ForbiddenReason::MissingCapability(capability),
    })
}

/// Company after a moderation change and the number of offers the cascade touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyModeration {
    pub company: Company,
    pub affected: usize,
}

/// Offer as shown to a caller; the admin reason is only disclosed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    pub id: OfferId,
    pub owner: CompanyId,
    pub publish_date: DateTime<Utc>,
    pub publish_end_date: DateTime<Utc>,
    pub is_pending: bool,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_reason: Option<HiddenReasonKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_reason: Option<String>,
    pub is_archived: bool,
}

impl OfferView {
    fn project(offer: &Offer, actor: &ActorCapabilities) -> Self {
        Self {
            id: offer.id.clone(),
            owner: offer.owner.clone(),
            publish_date: offer.window.start(),
            publish_end_date: offer.window.end(),
            is_pending: offer.is_pending,
            is_hidden: offer.is_hidden(),
            hidden_reason: offer.hidden_reason().map(HiddenReason::kind),
            admin_reason: offer
                .admin_reason()
                .filter(|_| actor.is_admin())
                .map(str::to_string),
            is_archived: offer.is_archived,
        }
    }
}

/// Record an operation referred to that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingRecord {
    Offer(OfferId),
    Company(CompanyId),
}

impl std::fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingRecord::Offer(id) => write!(f, "offer {id}"),
            MissingRecord::Company(id) => write!(f, "company {id}"),
        }
    }
}

/// Errors surfaced by [`OfferService`].
#[derive(Debug, Error)]
pub enum OfferServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(
        "concurrency limit of {cap} offers reached for window {window} \
         ({overlapping} overlapping offers)"
    )]
    ConcurrencyLimitExceeded {
        cap: usize,
        window: PublishWindow,
        overlapping: usize,
    },
    #[error("{0} not found")]
    NotFound(MissingRecord),
    #[error("cannot {action} offer {offer} while it is {state}")]
    InvalidStateTransition {
        offer: OfferId,
        state: OfferStatus,
        action: OfferAction,
    },
    #[error("not allowed to {action}: {reason}")]
    Forbidden {
        action: Action,
        reason: ForbiddenReason,
    },
    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),
    #[error("{event} cascade for company {company} interrupted after {applied} offers")]
    CascadeInterrupted {
        company: CompanyId,
        event: CompanyEvent,
        applied: usize,
        source: RepositoryError,
    },
}

impl OfferServiceError {
    fn from_transition(offer: &OfferId, err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { state, action } => Self::InvalidStateTransition {
                offer: offer.clone(),
                state,
                action,
            },
            TransitionError::Forbidden { action, reason } => Self::Forbidden {
                action: action.into(),
                reason,
            },
            TransitionError::Validation(err) => Self::Validation(err),
        }
    }
}
