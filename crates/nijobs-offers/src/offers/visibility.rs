//! Offer visibility lifecycle.
//!
//! Visibility (`Visible` / `Hidden(reason)`) is orthogonal to pendingness, and
//! `Archived` absorbs both: nothing governed here changes once an offer is archived.
//! Each function validates a transition for an actor and returns the offer as it would
//! look afterwards; persisting it (and any admission re-check) is the caller's job.

use super::domain::{
    ActorCapabilities, Company, HiddenReason, Offer, OfferAction, OfferStatus, PublishWindow,
    ValidationError, Visibility,
};

/// A direct hide request. Cascade reasons are only ever set by company events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideRequest {
    /// The owning company takes its offer down.
    CompanyRequest,
    /// An administrator disables the offer with a justification.
    AdminBlock { reason: String },
}

impl HideRequest {
    pub fn action(&self) -> OfferAction {
        match self {
            HideRequest::CompanyRequest => OfferAction::Hide,
            HideRequest::AdminBlock { .. } => OfferAction::Disable,
        }
    }
}

/// Capability the actor was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Owner,
    Admin,
    OwnerOrAdmin,
    OwnerOrGod,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Capability::Owner => "owner",
            Capability::Admin => "admin",
            Capability::OwnerOrAdmin => "owner or admin",
            Capability::OwnerOrGod => "owner or god",
        }
    }

    pub const fn granted_by(self, actor: &ActorCapabilities) -> bool {
        match self {
            Capability::Owner => actor.owner,
            Capability::Admin => actor.is_admin(),
            Capability::OwnerOrAdmin => actor.is_owner_or_admin(),
            Capability::OwnerOrGod => actor.owner || actor.god,
        }
    }
}

/// Why an actor may not perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    MissingCapability(Capability),
    /// The owning company is blocked or disabled.
    CompanyRestricted { blocked: bool, disabled: bool },
}

impl std::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForbiddenReason::MissingCapability(capability) => {
                write!(f, "requires {} capability", capability.label())
            }
            ForbiddenReason::CompanyRestricted { blocked, disabled } => match (blocked, disabled) {
                (true, true) => f.write_str("company is blocked and disabled"),
                (true, false) => f.write_str("company is blocked"),
                _ => f.write_str("company is disabled"),
            },
        }
    }
}

/// Rejected transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    Invalid {
        state: OfferStatus,
        action: OfferAction,
    },
    Forbidden {
        action: OfferAction,
        reason: ForbiddenReason,
    },
    Validation(ValidationError),
}

fn require(
    capability: Capability,
    actor: &ActorCapabilities,
    action: OfferAction,
) -> Result<(), TransitionError> {
    if capability.granted_by(actor) {
        Ok(())
    } else {
        Err(TransitionError::Forbidden {
            action,
            reason: ForbiddenReason::MissingCapability(capability),
        })
    }
}

/// The restriction preventing `company` from acting on its offers, if any.
pub fn restriction(company: &Company) -> Option<ForbiddenReason> {
    company
        .is_restricted()
        .then_some(ForbiddenReason::CompanyRestricted {
            blocked: company.is_blocked,
            disabled: company.is_disabled,
        })
}

/// Fails when `company` is blocked or disabled.
pub fn require_unrestricted(company: &Company, action: OfferAction) -> Result<(), TransitionError> {
    match restriction(company) {
        Some(reason) => Err(TransitionError::Forbidden { action, reason }),
        None => Ok(()),
    }
}

fn reject_archived(offer: &Offer, action: OfferAction) -> Result<(), TransitionError> {
    if offer.is_archived {
        return Err(TransitionError::Invalid {
            state: OfferStatus::Archived,
            action,
        });
    }
    Ok(())
}

/// `Visible -> Hidden(COMPANY_REQUEST)` for the owner, `Visible -> Hidden(ADMIN_BLOCK)`
/// for an admin with a non-empty reason.
pub fn hide(
    offer: &Offer,
    company: &Company,
    request: HideRequest,
    actor: &ActorCapabilities,
) -> Result<Offer, TransitionError> {
    let action = request.action();
    reject_archived(offer, action)?;

    let reason = match request {
        HideRequest::CompanyRequest => {
            require(Capability::Owner, actor, action)?;
            require_unrestricted(company, action)?;
            HiddenReason::CompanyRequest
        }
        HideRequest::AdminBlock { reason } => {
            require(Capability::Admin, actor, action)?;
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(TransitionError::Validation(
                    ValidationError::MissingAdminReason {
                        action: action.label(),
                    },
                ));
            }
            HiddenReason::AdminBlock {
                reason: reason.to_string(),
            }
        }
    };

    if offer.is_hidden() {
        return Err(TransitionError::Invalid {
            state: offer.status(),
            action,
        });
    }

    let mut next = offer.clone();
    next.visibility = Visibility::Hidden(reason);
    Ok(next)
}

/// `Hidden(any) -> Visible`, subject to who set the reason.
///
/// Clearing `ADMIN_BLOCK` needs an admin. Any other reason can be cleared by the owner
/// or an admin, but only while the owning company is neither blocked nor disabled.
pub fn enable(
    offer: &Offer,
    company: &Company,
    actor: &ActorCapabilities,
) -> Result<Offer, TransitionError> {
    let action = OfferAction::Enable;
    reject_archived(offer, action)?;

    let reason = match &offer.visibility {
        Visibility::Visible => {
            return Err(TransitionError::Invalid {
                state: offer.status(),
                action,
            })
        }
        Visibility::Hidden(reason) => reason,
    };

    match reason {
        HiddenReason::AdminBlock { .. } => require(Capability::Admin, actor, action)?,
        HiddenReason::CompanyRequest
        | HiddenReason::CompanyBlocked
        | HiddenReason::CompanyDisabled => require(Capability::OwnerOrAdmin, actor, action)?,
    }

    if company.is_restricted() {
        return Err(TransitionError::Invalid {
            state: offer.status(),
            action,
        });
    }

    let mut next = offer.clone();
    next.visibility = Visibility::Visible;
    Ok(next)
}

/// `Visible | Hidden(any) -> Archived`. Irreversible.
pub fn archive(
    offer: &Offer,
    company: &Company,
    actor: &ActorCapabilities,
) -> Result<Offer, TransitionError> {
    let action = OfferAction::Archive;
    reject_archived(offer, action)?;
    require(Capability::OwnerOrAdmin, actor, action)?;
    require_unrestricted(company, action)?;

    let mut next = offer.clone();
    next.is_archived = true;
    Ok(next)
}

/// Moves the publication window of a live offer. The caller validates the window and
/// re-runs admission.
pub fn edit_window(
    offer: &Offer,
    company: &Company,
    window: PublishWindow,
    actor: &ActorCapabilities,
) -> Result<Offer, TransitionError> {
    let action = OfferAction::EditWindow;
    reject_archived(offer, action)?;
    require(Capability::OwnerOrAdmin, actor, action)?;
    require_unrestricted(company, action)?;

    let mut next = offer.clone();
    next.window = window;
    Ok(next)
}
