use crate::infra::{parse_instant, Snapshot};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use nijobs_offers::error::AppError;
use nijobs_offers::offers::{
    AdmissionDecision, CompanyEvent, CompanyId, InMemoryNotifications, OfferDocument, OfferId,
    OfferPolicy, OfferService, PublishWindow,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CheckWindowArgs {
    /// JSON snapshot with `companies` and `offers`
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Owning company id
    #[arg(long)]
    pub(crate) company: String,
    /// Window start (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_instant)]
    pub(crate) start: DateTime<Utc>,
    /// Window end (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_instant)]
    pub(crate) end: DateTime<Utc>,
    /// Offer to leave out of the count, for window edits
    #[arg(long)]
    pub(crate) exclude: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct CascadeArgs {
    /// JSON snapshot with `companies` and `offers`
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Company whose offers the event applies to
    #[arg(long)]
    pub(crate) company: String,
    #[arg(long, value_enum)]
    pub(crate) event: EventArg,
    /// Write the updated snapshot back to the input file
    #[arg(long)]
    pub(crate) write: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EventArg {
    Blocked,
    Unblocked,
    Disabled,
    Enabled,
}

impl From<EventArg> for CompanyEvent {
    fn from(value: EventArg) -> Self {
        match value {
            EventArg::Blocked => CompanyEvent::Blocked,
            EventArg::Unblocked => CompanyEvent::Unblocked,
            EventArg::Disabled => CompanyEvent::Disabled,
            EventArg::Enabled => CompanyEvent::Enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CascadeReport {
    pub(crate) company: CompanyId,
    pub(crate) event: CompanyEvent,
    pub(crate) affected: usize,
    pub(crate) offers: Vec<OfferDocument>,
}

pub(crate) fn run_check_window(args: CheckWindowArgs, policy: OfferPolicy) -> Result<(), AppError> {
    let decision = check_window(&args, policy)?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

pub(crate) fn run_cascade(args: CascadeArgs, policy: OfferPolicy) -> Result<(), AppError> {
    let report = cascade_snapshot(&args, policy)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) fn check_window(
    args: &CheckWindowArgs,
    policy: OfferPolicy,
) -> Result<AdmissionDecision, AppError> {
    let store = Arc::new(Snapshot::load(&args.snapshot)?.into_store());
    let service = OfferService::new(store, Arc::new(InMemoryNotifications::default()), policy);

    let window =
        PublishWindow::new(args.start, args.end).map_err(|err| AppError::Offers(err.into()))?;
    let exclude = args.exclude.clone().map(OfferId);
    Ok(service.admission_decision(&CompanyId(args.company.clone()), &window, exclude.as_ref())?)
}

pub(crate) fn cascade_snapshot(
    args: &CascadeArgs,
    policy: OfferPolicy,
) -> Result<CascadeReport, AppError> {
    let store = Arc::new(Snapshot::load(&args.snapshot)?.into_store());
    let service = OfferService::new(
        store.clone(),
        Arc::new(InMemoryNotifications::default()),
        policy,
    );

    let company = CompanyId(args.company.clone());
    let event = CompanyEvent::from(args.event);
    let affected = service.cascade(&company, event)?;

    if args.write {
        Snapshot::from_store(&store)?.write(&args.snapshot)?;
    }

    let offers = service
        .offers_of(&company)?
        .into_iter()
        .map(OfferDocument::from)
        .collect();
    Ok(CascadeReport {
        company,
        event,
        affected,
        offers,
    })
}
