use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    Company, CompanyId, HiddenReasonKind, Offer, OfferId, PublishWindow, Visibility,
};

/// Offer storage used by admission, transitions, and cascades.
pub trait OfferRepository: Send + Sync {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError>;
    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    /// Replaces a stored offer as a single document write.
    fn save_offer(&self, offer: &Offer) -> Result<(), RepositoryError>;
    fn offers_of(&self, owner: &CompanyId) -> Result<Vec<Offer>, RepositoryError>;

    /// Offers of `owner` that are neither hidden nor archived and whose window
    /// overlaps `window`, skipping `exclude`. Pending offers are included.
    fn active_offers_overlapping(
        &self,
        owner: &CompanyId,
        window: &PublishWindow,
        exclude: Option<&OfferId>,
    ) -> Result<Vec<Offer>, RepositoryError>;

    /// Applies `update` to every matching offer, returning how many changed.
    fn update_offers_where(&self, update: &ConditionalUpdate) -> Result<usize, BulkUpdateError>;
}

/// Company storage; the engine only reads moderation flags and writes them back.
pub trait CompanyRepository: Send + Sync {
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn save_company(&self, company: &Company) -> Result<(), RepositoryError>;
}

/// Which offers of a company a conditional update selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMatch {
    Visible,
    HiddenFor(HiddenReasonKind),
}

/// Bulk "match on current visibility, set new visibility" update.
///
/// Archived offers never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalUpdate {
    pub owner: CompanyId,
    pub matching: VisibilityMatch,
    pub set: Visibility,
}

impl ConditionalUpdate {
    pub fn matches(&self, offer: &Offer) -> bool {
        if offer.owner != self.owner || offer.is_archived {
            return false;
        }
        match (self.matching, &offer.visibility) {
            (VisibilityMatch::Visible, Visibility::Visible) => true,
            (VisibilityMatch::HiddenFor(kind), Visibility::Hidden(reason)) => reason.kind() == kind,
            _ => false,
        }
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// A bulk update that stopped early; `applied` documents were already written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bulk update interrupted after {applied} documents: {source}")]
pub struct BulkUpdateError {
    pub applied: usize,
    pub source: RepositoryError,
}

impl From<RepositoryError> for BulkUpdateError {
    fn from(source: RepositoryError) -> Self {
        Self { applied: 0, source }
    }
}

/// Outbound notification hook (e-mail adapters and the like).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Templates the marketplace mails on moderation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    OfferDisabled,
    CompanyBlocked,
    CompanyUnblocked,
    CompanyDisabled,
    CompanyEnabled,
}

/// Notification payload handed to the publisher after a change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub company: CompanyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<OfferId>,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
