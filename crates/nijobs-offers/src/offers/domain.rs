use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for companies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for offers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed publication window `[start, end]` of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PublishWindow {
    #[serde(rename = "publishDate")]
    start: DateTime<Utc>,
    #[serde(rename = "publishEndDate")]
    end: DateTime<Utc>,
}

impl PublishWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Two closed windows overlap when they share at least one instant.
    pub fn overlaps(&self, other: &PublishWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn span(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for PublishWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Malformed input rejected before any repository access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("publish date {start} is after publish end date {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("publish end date must not be more than {max_months} months after publish date")]
    LifetimeExceeded { max_months: u32 },
    #[error("a window starting at {start} cannot span the maximum lifetime")]
    WindowOutOfRange { start: DateTime<Utc> },
    #[error("an admin reason is required for {action}")]
    MissingAdminReason { action: &'static str },
}

/// Why an offer is hidden. At most one cause is recorded per hide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HiddenReason {
    CompanyRequest,
    AdminBlock { reason: String },
    CompanyBlocked,
    CompanyDisabled,
}

impl HiddenReason {
    pub fn kind(&self) -> HiddenReasonKind {
        match self {
            HiddenReason::CompanyRequest => HiddenReasonKind::CompanyRequest,
            HiddenReason::AdminBlock { .. } => HiddenReasonKind::AdminBlock,
            HiddenReason::CompanyBlocked => HiddenReasonKind::CompanyBlocked,
            HiddenReason::CompanyDisabled => HiddenReasonKind::CompanyDisabled,
        }
    }

    pub fn admin_reason(&self) -> Option<&str> {
        match self {
            HiddenReason::AdminBlock { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Payload-free discriminant of [`HiddenReason`], used for filters and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HiddenReasonKind {
    #[serde(rename = "COMPANY_REQUEST")]
    CompanyRequest,
    #[serde(rename = "ADMIN_REQUEST")]
    AdminBlock,
    #[serde(rename = "COMPANY_BLOCKED")]
    CompanyBlocked,
    #[serde(rename = "COMPANY_DISABLED")]
    CompanyDisabled,
}

impl HiddenReasonKind {
    pub const fn label(self) -> &'static str {
        match self {
            HiddenReasonKind::CompanyRequest => "COMPANY_REQUEST",
            HiddenReasonKind::AdminBlock => "ADMIN_REQUEST",
            HiddenReasonKind::CompanyBlocked => "COMPANY_BLOCKED",
            HiddenReasonKind::CompanyDisabled => "COMPANY_DISABLED",
        }
    }
}

/// Public visibility of an offer. `Hidden` always carries its cause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Visible,
    Hidden(HiddenReason),
}

impl Visibility {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Visibility::Hidden(_))
    }

    pub fn hidden_reason(&self) -> Option<&HiddenReason> {
        match self {
            Visibility::Visible => None,
            Visibility::Hidden(reason) => Some(reason),
        }
    }
}

/// Job offer as seen by the engine. Fields outside the engine's concern (title,
/// description, contacts, ...) live with the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OfferDocument", into = "OfferDocument")]
pub struct Offer {
    pub id: OfferId,
    pub owner: CompanyId,
    pub window: PublishWindow,
    pub is_pending: bool,
    pub visibility: Visibility,
    pub is_archived: bool,
}

impl Offer {
    pub fn is_hidden(&self) -> bool {
        self.visibility.is_hidden()
    }

    pub fn hidden_reason(&self) -> Option<&HiddenReason> {
        self.visibility.hidden_reason()
    }

    pub fn admin_reason(&self) -> Option<&str> {
        self.hidden_reason().and_then(HiddenReason::admin_reason)
    }

    /// Whether the offer counts against its owner's concurrency cap.
    pub fn is_counted(&self) -> bool {
        !self.is_hidden() && !self.is_archived
    }

    pub fn status(&self) -> OfferStatus {
        if self.is_archived {
            return OfferStatus::Archived;
        }
        match &self.visibility {
            Visibility::Visible => OfferStatus::Visible,
            Visibility::Hidden(reason) => OfferStatus::Hidden(reason.kind()),
        }
    }
}

/// Flat persisted shape of an offer, matching the marketplace's document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDocument {
    #[serde(rename = "_id")]
    pub id: OfferId,
    pub owner: CompanyId,
    pub publish_date: DateTime<Utc>,
    pub publish_end_date: DateTime<Utc>,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_reason: Option<HiddenReasonKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_reason: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
}

/// Inconsistent document rejected when loading an [`Offer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Window(#[from] ValidationError),
    #[error("offer {0} is hidden without a hidden reason")]
    HiddenWithoutReason(OfferId),
    #[error("offer {0} has a hidden reason but is not hidden")]
    ReasonWithoutHide(OfferId),
    #[error("offer {0} carries an admin reason without an admin block")]
    StrayAdminReason(OfferId),
}

impl TryFrom<OfferDocument> for Offer {
    type Error = DocumentError;

    fn try_from(document: OfferDocument) -> Result<Self, Self::Error> {
        let window = PublishWindow::new(document.publish_date, document.publish_end_date)?;

        let visibility = match (document.is_hidden, document.hidden_reason) {
            (false, None) => Visibility::Visible,
            (false, Some(_)) => return Err(DocumentError::ReasonWithoutHide(document.id)),
            (true, None) => return Err(DocumentError::HiddenWithoutReason(document.id)),
            (true, Some(kind)) => Visibility::Hidden(match kind {
                HiddenReasonKind::CompanyRequest => HiddenReason::CompanyRequest,
                HiddenReasonKind::CompanyBlocked => HiddenReason::CompanyBlocked,
                HiddenReasonKind::CompanyDisabled => HiddenReason::CompanyDisabled,
                HiddenReasonKind::AdminBlock => HiddenReason::AdminBlock {
                    reason: document.admin_reason.clone().unwrap_or_default(),
                },
            }),
        };

        if document.admin_reason.is_some()
            && document.hidden_reason != Some(HiddenReasonKind::AdminBlock)
        {
            return Err(DocumentError::StrayAdminReason(document.id));
        }

        Ok(Offer {
            id: document.id,
            owner: document.owner,
            window,
            is_pending: document.is_pending,
            visibility,
            is_archived: document.is_archived,
        })
    }
}

impl From<Offer> for OfferDocument {
    fn from(offer: Offer) -> Self {
        let hidden_reason = offer.hidden_reason().map(HiddenReason::kind);
        let admin_reason = offer.admin_reason().map(str::to_string);
        OfferDocument {
            is_hidden: offer.is_hidden(),
            hidden_reason,
            admin_reason,
            publish_date: offer.window.start(),
            publish_end_date: offer.window.end(),
            id: offer.id,
            owner: offer.owner,
            is_pending: offer.is_pending,
            is_archived: offer.is_archived,
        }
    }
}

/// Company approval state, decided by the application review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Aggregate root owning offers; the fields here drive cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(rename = "_id")]
    pub id: CompanyId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_reason: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
    pub approval: ApprovalStatus,
}

impl Company {
    pub fn is_approved(&self) -> bool {
        self.approval == ApprovalStatus::Approved
    }

    /// Blocked or disabled companies cannot act on their offers.
    pub fn is_restricted(&self) -> bool {
        self.is_blocked || self.is_disabled
    }
}

/// Capabilities of the acting principal, decided by the caller's authorization layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorCapabilities {
    /// Acting on behalf of the owning company.
    pub owner: bool,
    pub admin: bool,
    /// Trusted service token; implies every admin capability.
    pub god: bool,
}

impl ActorCapabilities {
    pub const fn owner() -> Self {
        Self {
            owner: true,
            admin: false,
            god: false,
        }
    }

    pub const fn admin() -> Self {
        Self {
            owner: false,
            admin: true,
            god: false,
        }
    }

    pub const fn god() -> Self {
        Self {
            owner: false,
            admin: false,
            god: true,
        }
    }

    pub const fn anonymous() -> Self {
        Self {
            owner: false,
            admin: false,
            god: false,
        }
    }

    pub const fn is_admin(&self) -> bool {
        self.admin || self.god
    }

    pub const fn is_owner_or_admin(&self) -> bool {
        self.owner || self.is_admin()
    }
}

/// Company moderation events propagated to offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyEvent {
    Blocked,
    Unblocked,
    Disabled,
    Enabled,
}

impl CompanyEvent {
    pub const fn label(self) -> &'static str {
        match self {
            CompanyEvent::Blocked => "blocked",
            CompanyEvent::Unblocked => "unblocked",
            CompanyEvent::Disabled => "disabled",
            CompanyEvent::Enabled => "enabled",
        }
    }
}

impl fmt::Display for CompanyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle position of an offer, reported when a transition is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OfferStatus {
    Visible,
    Hidden(HiddenReasonKind),
    Archived,
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferStatus::Visible => f.write_str("visible"),
            OfferStatus::Hidden(kind) => write!(f, "hidden ({})", kind.label()),
            OfferStatus::Archived => f.write_str("archived"),
        }
    }
}

/// Actions the visibility state machine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OfferAction {
    Hide,
    Disable,
    Enable,
    Archive,
    EditWindow,
    Create,
}

impl OfferAction {
    pub const fn label(self) -> &'static str {
        match self {
            OfferAction::Hide => "hide",
            OfferAction::Disable => "disable",
            OfferAction::Enable => "enable",
            OfferAction::Archive => "archive",
            OfferAction::EditWindow => "edit_window",
            OfferAction::Create => "create",
        }
    }
}

impl fmt::Display for OfferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Company-level moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModerationAction {
    BlockCompany,
    UnblockCompany,
    DisableCompany,
    EnableCompany,
}

impl ModerationAction {
    pub const fn label(self) -> &'static str {
        match self {
            ModerationAction::BlockCompany => "block_company",
            ModerationAction::UnblockCompany => "unblock_company",
            ModerationAction::DisableCompany => "disable_company",
            ModerationAction::EnableCompany => "enable_company",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An action a caller can be refused, on an offer or on a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Action {
    Offer(OfferAction),
    Company(ModerationAction),
}

impl From<OfferAction> for Action {
    fn from(action: OfferAction) -> Self {
        Action::Offer(action)
    }
}

impl From<ModerationAction> for Action {
    fn from(action: ModerationAction) -> Self {
        Action::Company(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Offer(action) => action.fmt(f),
            Action::Company(action) => action.fmt(f),
        }
    }
}
