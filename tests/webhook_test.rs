mod support;

use mentorbook::{
    domain::{BookingStatus, PaymentStatus},
    error::AppError,
    notifications::NotificationKind,
    service::WebhookOutcome,
};
use support::{
    intent_failed, intent_succeeded, session_completed, session_expired, tagged_intent_failed,
    tagged_intent_succeeded, Harness,
};

#[tokio::test]
async fn test_completed_then_succeeded_materializes_booking() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");

    let outcome = h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);
    assert_eq!(payment.provider_intent_id.as_deref(), Some("pi_1"));
    assert!(payment.booking_id.is_none());

    let outcome = h.deliver(intent_succeeded("evt_2", "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.paid_at.is_some());

    let booking_id = payment.booking_id.expect("booking linked");
    let booking = h.services.booking_repo.find_by_id(booking_id).await?.unwrap();
    assert_eq!(booking.payment_id, payment.id);
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.scheduled_at, payment.metadata.scheduled_at);
    assert_eq!(booking.notes.as_deref(), Some("Focus on system design"));

    assert_eq!(h.sink.count(h.seller_id, NotificationKind::NewPaidBooking), 1);
    assert_eq!(h.sink.count(h.buyer.id, NotificationKind::BookingConfirmed), 1);

    Ok(())
}

#[tokio::test]
async fn test_redelivered_event_is_short_circuited() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");

    h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    assert_eq!(h.deliver(intent_succeeded("evt_2", "pi_1")).await?, WebhookOutcome::Applied);
    assert_eq!(h.deliver(intent_succeeded("evt_2", "pi_1")).await?, WebhookOutcome::Duplicate);

    assert_eq!(h.booking_count().await?, 1);
    assert_eq!(h.sink.count(h.seller_id, NotificationKind::NewPaidBooking), 1);

    Ok(())
}

#[tokio::test]
async fn test_second_success_event_is_discarded() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");

    h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    h.deliver(intent_succeeded("evt_2", "pi_1")).await?;

    // Same fact, different event id: the ledger lets it through, the
    // conditional transition does not.
    let outcome = h.deliver(intent_succeeded("evt_3", "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Discarded);

    assert_eq!(h.booking_count().await?, 1);
    assert_eq!(h.sink.count(h.seller_id, NotificationKind::NewPaidBooking), 1);
    assert_eq!(h.sink.count(h.buyer.id, NotificationKind::BookingConfirmed), 1);

    Ok(())
}

#[tokio::test]
async fn test_success_before_completion_matches_by_payment_tag() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");

    let outcome = h
        .deliver(tagged_intent_succeeded("evt_2", "pi_1", session.payment_id))
        .await?;
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.provider_intent_id.as_deref(), Some("pi_1"));
    assert!(payment.booking_id.is_some());

    let outcome = h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Discarded);
    assert_eq!(h.booking_count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_foreign_intent_is_acknowledged() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    let outcome = h.deliver(intent_succeeded("evt_foreign", "pi_from_invoice_product")).await?;
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let outcome = h.deliver(intent_succeeded("evt_foreign", "pi_from_invoice_product")).await?;
    assert_eq!(outcome, WebhookOutcome::Duplicate);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.provider_intent_id.is_none());
    assert_eq!(h.booking_count().await?, 0);
    assert_eq!(h.sink.total(), 0);

    Ok(())
}

#[tokio::test]
async fn test_intent_tagged_with_other_linked_payment_is_ignored() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;

    let outcome = h
        .deliver(tagged_intent_succeeded("evt_2", "pi_other", session.payment_id))
        .await?;
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);
    assert_eq!(payment.provider_intent_id.as_deref(), Some("pi_1"));

    Ok(())
}

#[tokio::test]
async fn test_declined_attempt_on_open_session_is_discarded() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    let outcome = h
        .deliver(tagged_intent_failed("evt_1", "pi_declined", session.payment_id))
        .await?;
    assert_eq!(outcome, WebhookOutcome::Discarded);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(h.sink.total(), 0);

    Ok(())
}

#[tokio::test]
async fn test_late_completion_does_not_regress_succeeded_payment() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");

    // Verifier gets there first.
    h.services.verifier.verify(&session.session_id, h.buyer).await?;

    let outcome = h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Discarded);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.booking_id.is_some());

    Ok(())
}

#[tokio::test]
async fn test_expired_session_cancels_pending_payment() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.expire(&session.session_id);

    let outcome = h.deliver(session_expired("evt_1", &session.session_id)).await?;
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
    assert_eq!(h.booking_count().await?, 0);
    assert_eq!(h.sink.total(), 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_intent_marks_processing_payment_failed() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;
    let outcome = h.deliver(intent_failed("evt_2", "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Applied);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(h.sink.count(h.buyer.id, NotificationKind::PaymentFailed), 1);

    // Failed is terminal.
    let outcome = h.deliver(intent_succeeded("evt_3", "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Discarded);
    assert_eq!(h.booking_count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_unlinked_failure_is_ignored() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    let outcome = h.deliver(intent_failed("evt_1", "pi_declined")).await?;
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_unknown_event_type_is_acknowledged() -> anyhow::Result<()> {
    let h = Harness::new().await?;

    let payload = serde_json::json!({ "id": "evt_9", "type": "customer.created" }).to_string();
    assert_eq!(h.deliver(payload.clone()).await?, WebhookOutcome::Ignored);
    assert_eq!(h.deliver(payload).await?, WebhookOutcome::Duplicate);

    let session = h.checkout().await?;
    let outcome = h.deliver(session_completed("evt_10", "cs_unknown", "pi_1")).await?;
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_bad_signature_changes_nothing() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    let payload = session_completed("evt_1", &session.session_id, "pi_1");
    let result = h.services.webhooks.handle(&payload, "t=1,v1=forged").await;
    assert!(matches!(result, Err(AppError::InvalidSignature)));

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.provider_intent_id.is_none());

    let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events")
        .fetch_one(&h.pool)
        .await?;
    assert_eq!(recorded, 0);

    Ok(())
}
