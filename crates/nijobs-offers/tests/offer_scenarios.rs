use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use nijobs_offers::offers::{
    ActorCapabilities, AdmissionPath, ApprovalStatus, Capability, Company, CompanyEvent,
    CompanyId, ForbiddenReason, HiddenReason, HiddenReasonKind, InMemoryNotifications,
    InMemoryStore, Offer, OfferId, OfferPolicy, OfferRepository, OfferService, OfferServiceError,
    PublishWindow, Visibility,
};

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0)
        .single()
        .expect("valid date")
}

fn acme() -> CompanyId {
    CompanyId("acme".to_string())
}

fn company() -> Company {
    Company {
        id: acme(),
        name: "Acme Corp".to_string(),
        is_blocked: false,
        admin_reason: None,
        is_disabled: false,
        approval: ApprovalStatus::Approved,
    }
}

fn offer(id: &str, from: u32, to: u32, visibility: Visibility) -> Offer {
    Offer {
        id: OfferId(id.to_string()),
        owner: acme(),
        window: PublishWindow::new(jan(from), jan(to)).expect("valid window"),
        is_pending: false,
        visibility,
        is_archived: false,
    }
}

fn service_with(
    max_concurrent: usize,
    offers: Vec<Offer>,
) -> (
    OfferService<InMemoryStore, InMemoryNotifications>,
    Arc<InMemoryStore>,
) {
    let store = Arc::new(InMemoryStore::with_records([company()], offers));
    let service = OfferService::new(
        store.clone(),
        Arc::new(InMemoryNotifications::default()),
        OfferPolicy::new(max_concurrent, 6),
    );
    (service, store)
}

#[test]
fn overlapping_offers_below_cap_are_admitted_without_sweep() {
    let (service, _) = service_with(
        3,
        vec![
            offer("first", 1, 10, Visibility::Visible),
            offer("second", 5, 20, Visibility::Visible),
        ],
    );

    assert!(service
        .can_admit(&acme(), jan(8), jan(15), None)
        .expect("admission evaluates"));

    let window = PublishWindow::new(jan(8), jan(15)).expect("valid window");
    let decision = service
        .admission_decision(&acme(), &window, None)
        .expect("admission evaluates");
    assert_eq!(decision.overlapping, 2);
    assert_eq!(decision.path, AdmissionPath::ShortCircuit);
}

#[test]
fn candidate_is_rejected_when_existing_peak_reaches_cap() {
    let (service, _) = service_with(
        2,
        vec![
            offer("first", 1, 10, Visibility::Visible),
            offer("second", 5, 20, Visibility::Visible),
        ],
    );

    assert!(!service
        .can_admit(&acme(), jan(8), jan(9), None)
        .expect("admission evaluates"));

    let window = PublishWindow::new(jan(8), jan(9)).expect("valid window");
    let decision = service
        .admission_decision(&acme(), &window, None)
        .expect("admission evaluates");
    assert_eq!(decision.path, AdmissionPath::Sweep);
    assert_eq!(decision.peak, Some(2));
}

#[test]
fn admin_block_is_cleared_by_admin_only() {
    let (service, store) = service_with(
        1,
        vec![offer(
            "flagged",
            1,
            10,
            Visibility::Hidden(HiddenReason::AdminBlock {
                reason: "spam".to_string(),
            }),
        )],
    );
    let id = OfferId("flagged".to_string());

    match service.enable_offer(&id, &ActorCapabilities::owner()) {
        Err(OfferServiceError::Forbidden {
            reason: ForbiddenReason::MissingCapability(Capability::Admin),
            ..
        }) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    let enabled = service
        .enable_offer(&id, &ActorCapabilities::admin())
        .expect("admin enables");
    assert_eq!(enabled.visibility, Visibility::Visible);
    assert_eq!(
        enabled.window,
        PublishWindow::new(jan(1), jan(10)).expect("valid window")
    );
    assert_eq!(
        store.fetch_offer(&id).expect("store readable"),
        Some(enabled)
    );
}

#[test]
fn admin_enable_fails_when_window_no_longer_fits() {
    let (service, _) = service_with(
        1,
        vec![
            offer(
                "flagged",
                1,
                10,
                Visibility::Hidden(HiddenReason::AdminBlock {
                    reason: "spam".to_string(),
                }),
            ),
            offer("newer", 3, 4, Visibility::Visible),
        ],
    );

    match service.enable_offer(&OfferId("flagged".to_string()), &ActorCapabilities::admin()) {
        Err(OfferServiceError::ConcurrencyLimitExceeded { cap: 1, .. }) => {}
        other => panic!("expected concurrency limit, got {other:?}"),
    }
}

#[test]
fn company_requested_hide_survives_block_and_unblock() {
    let (service, store) = service_with(
        5,
        vec![
            offer("live", 1, 10, Visibility::Visible),
            offer(
                "requested",
                1,
                10,
                Visibility::Hidden(HiddenReason::CompanyRequest),
            ),
        ],
    );

    assert_eq!(
        service
            .cascade(&acme(), CompanyEvent::Blocked)
            .expect("block cascade"),
        1
    );
    assert_eq!(
        service
            .cascade(&acme(), CompanyEvent::Unblocked)
            .expect("unblock cascade"),
        1
    );

    let requested = store
        .fetch_offer(&OfferId("requested".to_string()))
        .expect("store readable")
        .expect("offer stored");
    assert_eq!(
        requested.hidden_reason().map(HiddenReason::kind),
        Some(HiddenReasonKind::CompanyRequest)
    );
    let live = store
        .fetch_offer(&OfferId("live".to_string()))
        .expect("store readable")
        .expect("offer stored");
    assert_eq!(live.visibility, Visibility::Visible);
}
