use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::offers::domain::{
    ApprovalStatus, Company, CompanyId, HiddenReason, Offer, OfferId, PublishWindow, Visibility,
};
use crate::offers::memory::{InMemoryNotifications, InMemoryStore};
use crate::offers::repository::{
    BulkUpdateError, CompanyRepository, ConditionalUpdate, Notification, NotificationError,
    NotificationPublisher, OfferRepository, RepositoryError,
};
use crate::offers::{OfferPolicy, OfferService};

pub(super) fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0)
        .single()
        .expect("valid date")
}

pub(super) fn window(from: u32, to: u32) -> PublishWindow {
    PublishWindow::new(jan(from), jan(to)).expect("valid window")
}

pub(super) fn acme() -> CompanyId {
    CompanyId("acme".to_string())
}

pub(super) fn offer_id(id: &str) -> OfferId {
    OfferId(id.to_string())
}

pub(super) fn company(approval: ApprovalStatus) -> Company {
    Company {
        id: acme(),
        name: "Acme Corp".to_string(),
        is_blocked: false,
        admin_reason: None,
        is_disabled: false,
        approval,
    }
}

pub(super) fn offer(id: &str, from: u32, to: u32) -> Offer {
    Offer {
        id: offer_id(id),
        owner: acme(),
        window: window(from, to),
        is_pending: false,
        visibility: Visibility::Visible,
        is_archived: false,
    }
}

pub(super) fn hidden(id: &str, from: u32, to: u32, reason: HiddenReason) -> Offer {
    Offer {
        visibility: Visibility::Hidden(reason),
        ..offer(id, from, to)
    }
}

pub(super) fn admin_block(reason: &str) -> HiddenReason {
    HiddenReason::AdminBlock {
        reason: reason.to_string(),
    }
}

pub(super) type MemoryService = OfferService<InMemoryStore, InMemoryNotifications>;

pub(super) fn build_service(
    max_concurrent: usize,
    company: Company,
    offers: Vec<Offer>,
) -> (MemoryService, Arc<InMemoryStore>, Arc<InMemoryNotifications>) {
    let store = Arc::new(InMemoryStore::with_records([company], offers));
    let notifications = Arc::new(InMemoryNotifications::default());
    let service = OfferService::new(
        store.clone(),
        notifications.clone(),
        OfferPolicy::new(max_concurrent, 6),
    );
    (service, store, notifications)
}

pub(super) fn stored(store: &InMemoryStore, id: &str) -> Offer {
    store
        .fetch_offer(&offer_id(id))
        .expect("store readable")
        .expect("offer stored")
}

pub(super) struct UnavailableStore;

impl OfferRepository for UnavailableStore {
    fn insert_offer(&self, _offer: Offer) -> Result<Offer, RepositoryError> {
        Err(unavailable())
    }

    fn fetch_offer(&self, _id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Err(unavailable())
    }

    fn save_offer(&self, _offer: &Offer) -> Result<(), RepositoryError> {
        Err(unavailable())
    }

    fn offers_of(&self, _owner: &CompanyId) -> Result<Vec<Offer>, RepositoryError> {
        Err(unavailable())
    }

    fn active_offers_overlapping(
        &self,
        _owner: &CompanyId,
        _window: &PublishWindow,
        _exclude: Option<&OfferId>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        Err(unavailable())
    }

    fn update_offers_where(&self, _update: &ConditionalUpdate) -> Result<usize, BulkUpdateError> {
        Err(unavailable().into())
    }
}

impl CompanyRepository for UnavailableStore {
    fn fetch_company(&self, _id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Err(unavailable())
    }

    fn save_company(&self, _company: &Company) -> Result<(), RepositoryError> {
        Err(unavailable())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("connection refused".to_string())
}

/// Store whose next bulk update stops after writing `fail_after` documents.
pub(super) struct InterruptingStore {
    inner: InMemoryStore,
    fail_after: Mutex<Option<usize>>,
}

impl InterruptingStore {
    pub(super) fn new(inner: InMemoryStore, fail_after: usize) -> Self {
        Self {
            inner,
            fail_after: Mutex::new(Some(fail_after)),
        }
    }
}

impl OfferRepository for InterruptingStore {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError> {
        self.inner.insert_offer(offer)
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.inner.fetch_offer(id)
    }

    fn save_offer(&self, offer: &Offer) -> Result<(), RepositoryError> {
        self.inner.save_offer(offer)
    }

    fn offers_of(&self, owner: &CompanyId) -> Result<Vec<Offer>, RepositoryError> {
        self.inner.offers_of(owner)
    }

    fn active_offers_overlapping(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        self.inner.active_offers_overlapping(owner, window, exclude)
    }

    fn update_offers_where(&self, update: &ConditionalUpdate) -> Result<usize, BulkUpdateError> {
        let limit = self.fail_after.lock().expect("limit lock").take();
        let Some(limit) = limit else {
            return self.inner.update_offers_where(update);
        };

        let mut applied = 0;
        for mut offer in self.inner.offers_of(&update.owner)? {
            if !update.matches(&offer) {
                continue;
            }
            if applied == limit {
                return Err(BulkUpdateError {
                    applied,
                    source: RepositoryError::Unavailable("primary stepped down".to_string()),
                });
            }
            offer.visibility = update.set.clone();
            self.inner.save_offer(&offer)?;
            applied += 1;
        }
        Ok(applied)
    }
}

impl CompanyRepository for InterruptingStore {
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch_company(id)
    }

    fn save_company(&self, company: &Company) -> Result<(), RepositoryError> {
        self.inner.save_company(company)
    }
}

#[derive(Default)]
pub(super) struct FailingNotifications {
    attempts: Mutex<usize>,
}

impl FailingNotifications {
    pub(super) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("attempts lock")
    }
}

impl NotificationPublisher for FailingNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        *self.attempts.lock().expect("attempts lock") += 1;
        Err(NotificationError::Transport("smtp timeout".to_string()))
    }
}
