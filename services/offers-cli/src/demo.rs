use crate::infra::{install_metrics, parse_instant};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use nijobs_offers::error::AppError;
use nijobs_offers::offers::{
    ActorCapabilities, ApprovalStatus, Company, CompanyId, HideRequest, InMemoryNotifications,
    InMemoryStore, Offer, OfferPolicy, OfferService, OfferServiceError,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference instant for the scripted offers (defaults to now)
    #[arg(long, value_parser = parse_instant)]
    pub(crate) today: Option<DateTime<Utc>>,
    /// Print the Prometheus exposition of the counters recorded during the demo
    #[arg(long)]
    pub(crate) metrics: bool,
}

type DemoService = OfferService<InMemoryStore, InMemoryNotifications>;

pub(crate) fn run_demo(args: DemoArgs, policy: OfferPolicy) -> Result<(), AppError> {
    let DemoArgs { today, metrics } = args;
    let metrics = if metrics {
        Some(install_metrics()?)
    } else {
        None
    };
    let today = today.unwrap_or_else(Utc::now);

    let company = demo_company();
    let store = Arc::new(InMemoryStore::with_records([company.clone()], Vec::new()));
    let notifications = Arc::new(InMemoryNotifications::default());
    let service = OfferService::new(store, notifications.clone(), policy);

    println!("Offer admission demo for {} (cap {})", company.name, policy.max_concurrent());
    let offers = fill_to_cap(&service, &company.id, today)?;

    println!("\nVisibility transitions");
    let owner = ActorCapabilities::owner();
    let admin = ActorCapabilities::admin();
    let (Some(paused), Some(flagged), Some(retired)) =
        (offers.first(), offers.get(1), offers.get(2))
    else {
        println!("- cap too small for the visibility walkthrough");
        return Ok(());
    };

    let paused = service.hide_offer(&paused.id, HideRequest::CompanyRequest, &owner)?;
    println!("- {} hidden by its company -> {}", paused.id, paused.status());

    let flagged = service.hide_offer(
        &flagged.id,
        HideRequest::AdminBlock {
            reason: "salary range missing".to_string(),
        },
        &admin,
    )?;
    println!("- {} disabled by an admin -> {}", flagged.id, flagged.status());
    report("owner re-enables the admin block", service.enable_offer(&flagged.id, &owner));
    report("admin re-enables it", service.enable_offer(&flagged.id, &admin));

    println!("\nCompany moderation");
    let blocked = service.block_company(&company.id, "pending identity review", &admin)?;
    println!("- blocked {}: {} offers hidden", blocked.company.id, blocked.affected);
    let unblocked = service.unblock_company(&company.id, &admin)?;
    println!("- unblocked: {} offers restored", unblocked.affected);
    let view = service.offer_view(&paused.id, &owner)?;
    println!(
        "- {} still hidden by company request: {}",
        view.id, view.is_hidden
    );

    println!("\nArchiving");
    let retired = service.archive_offer(&retired.id, &owner)?;
    println!("- {} archived", retired.id);
    report("enable an archived offer", service.enable_offer(&retired.id, &admin));

    println!("\nNotifications dispatched: {}", notifications.events().len());
    for event in notifications.events() {
        println!("- {:?} for {}", event.template, event.company);
    }

    if let Some(handle) = metrics {
        println!("\nMetrics\n{}", handle.render());
    }
    Ok(())
}

fn demo_company() -> Company {
    Company {
        id: CompanyId("acme".to_string()),
        name: "Acme Corp".to_string(),
        is_blocked: false,
        admin_reason: None,
        is_disabled: false,
        approval: ApprovalStatus::Approved,
    }
}

/// Creates overlapping offers until admission refuses one.
fn fill_to_cap(
    service: &DemoService,
    owner: &CompanyId,
    today: DateTime<Utc>,
) -> Result<Vec<Offer>, AppError> {
    let mut admitted = Vec::new();
    for index in 0..=service.policy().max_concurrent() {
        let start = today + Duration::days(index as i64);
        let end = start + Duration::days(30);
        match service.create_offer(owner, start, end, false) {
            Ok(offer) => {
                println!("- admitted {} for {}", offer.id, offer.window);
                admitted.push(offer);
            }
            Err(err @ OfferServiceError::ConcurrencyLimitExceeded { .. }) => {
                println!("- rejected: {err}");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(admitted)
}

fn report(label: &str, outcome: Result<Offer, OfferServiceError>) {
    match outcome {
        Ok(offer) => println!("- {label}: ok -> {}", offer.status()),
        Err(err) => println!("- {label}: refused ({err})"),
    }
}
