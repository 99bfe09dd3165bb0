//! Offer admission, visibility, and company cascade.
//!
//! `overlap` and `admission` decide whether a company may keep another offer active
//! during a window; `visibility` validates per-offer transitions; `cascade` propagates
//! company moderation events. `service` ties them to the repositories and the
//! notification hook.

pub mod admission;
pub mod cascade;
pub mod domain;
pub mod memory;
pub mod overlap;
pub mod repository;
pub mod service;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use admission::{AdmissionControl, AdmissionDecision, AdmissionPath, OfferPolicy};
pub use cascade::CompanyCascade;
pub use domain::{
    Action, ActorCapabilities, ApprovalStatus, Company, CompanyEvent, CompanyId, DocumentError,
    HiddenReason, HiddenReasonKind, ModerationAction, Offer, OfferAction, OfferDocument, OfferId,
    OfferStatus, PublishWindow, ValidationError, Visibility,
};
pub use memory::{InMemoryNotifications, InMemoryStore};
pub use overlap::{peak_concurrency, peak_overlap};
pub use repository::{
    BulkUpdateError, CompanyRepository, ConditionalUpdate, Notification, NotificationError,
    NotificationPublisher, NotificationTemplate, OfferRepository, RepositoryError,
    VisibilityMatch,
};
pub use service::{CompanyModeration, MissingRecord, OfferService, OfferServiceError, OfferView};
pub use visibility::{Capability, ForbiddenReason, HideRequest, TransitionError};
