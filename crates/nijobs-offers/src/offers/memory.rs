//! Mutex-backed store used by the operator binary and the test suites.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Company, CompanyId, Offer, OfferId, PublishWindow};
use super::repository::{
    BulkUpdateError, CompanyRepository, ConditionalUpdate, Notification, NotificationError,
    NotificationPublisher, OfferRepository, RepositoryError,
};

#[derive(Debug, Default)]
struct Tables {
    offers: BTreeMap<OfferId, Offer>,
    companies: BTreeMap<CompanyId, Company>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn with_records(
        companies: impl IntoIterator<Item = Company>,
        offers: impl IntoIterator<Item = Offer>,
    ) -> Self {
        let store = Self::default();
        {
            let mut tables = store.tables.lock().unwrap_or_else(|err| err.into_inner());
            tables.companies = companies
                .into_iter()
                .map(|company| (company.id.clone(), company))
                .collect();
            tables.offers = offers
                .into_iter()
                .map(|offer| (offer.id.clone(), offer))
                .collect();
        }
        store
    }

    pub fn offers(&self) -> Result<Vec<Offer>, RepositoryError> {
        Ok(self.lock()?.offers.values().cloned().collect())
    }

    pub fn companies(&self) -> Result<Vec<Company>, RepositoryError> {
        Ok(self.lock()?.companies.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl OfferRepository for InMemoryStore {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.offers.contains_key(&offer.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.offers.insert(offer.id.clone(), offer.clone());
        Ok(offer)
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.lock()?.offers.get(id).cloned())
    }

    fn save_offer(&self, offer: &Offer) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.offers.get_mut(&offer.id) {
            Some(stored) => {
                *stored = offer.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn offers_of(&self, owner: &CompanyId) -> Result<Vec<Offer>, RepositoryError> {
        Ok(self
            .lock()?
            .offers
            .values()
            .filter(|offer| &offer.owner == owner)
            .cloned()
            .collect())
    }

    fn active_offers_overlapping(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<Vec<Offer>, RepositoryError> {
        Ok(self
            .lock()?
            .offers
            .values()
            .filter(|offer| &offer.owner == owner)
            .filter(|offer| offer.is_counted())
            .filter(|offer| Some(&offer.id) != exclude)
            .filter(|offer| offer.window.overlaps(window))
            .cloned()
            .collect())
    }

    fn update_offers_where(&self, update: &ConditionalUpdate) -> Result<usize, BulkUpdateError> {
        let mut tables = self.lock()?;
        let mut applied = 0;
        for offer in tables.offers.values_mut() {
            if update.matches(offer) {
                offer.visibility = update.set.clone();
                applied += 1;
            }
        }
        Ok(applied)
    }
}

impl CompanyRepository for InMemoryStore {
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    fn save_company(&self, company: &Company) -> Result<(), RepositoryError> {
        self.lock()?
            .companies
            .insert(company.id.clone(), company.clone());
        Ok(())
    }
}

/// Publisher that records every notification it receives.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifications {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for InMemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
