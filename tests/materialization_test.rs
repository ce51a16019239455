mod support;

use futures_util::future::join_all;

use mentorbook::{
    domain::{PaymentStatus, Transition},
    error::AppError,
    notifications::NotificationKind,
};
use support::{intent_succeeded, session_completed, Harness};

#[tokio::test]
async fn test_concurrent_materialization_creates_one_booking() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    // Succeeded without a booking, as after a crash between the two steps.
    assert!(h.services.payment_repo
        .transition(session.payment_id, Transition::Succeed, Some("pi_1"))
        .await?);

    let results = join_all(
        (0..8).map(|_| h.services.materializer.materialize(session.payment_id)),
    )
    .await;

    let materializations = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(materializations.iter().filter(|m| m.created).count(), 1);

    let booking_id = materializations[0].booking_id;
    assert!(materializations.iter().all(|m| m.booking_id == booking_id));

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.booking_id, Some(booking_id));
    assert_eq!(h.booking_count().await?, 1);
    assert_eq!(h.sink.count(h.seller_id, NotificationKind::NewPaidBooking), 1);
    assert_eq!(h.sink.count(h.buyer.id, NotificationKind::BookingConfirmed), 1);

    Ok(())
}

#[tokio::test]
async fn test_materialize_rejects_unpaid_payment() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;

    let result = h.services.materializer.materialize(session.payment_id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(h.booking_count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_webhook_and_verifier_race_converges() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let session = h.checkout().await?;
    h.gateway.pay(&session.session_id, "pi_1");
    h.deliver(session_completed("evt_1", &session.session_id, "pi_1")).await?;

    let (webhook, verified) = tokio::join!(
        h.deliver(intent_succeeded("evt_2", "pi_1")),
        h.services.verifier.verify(&session.session_id, h.buyer),
    );
    webhook?;
    let verified = verified?;

    let payment = h.services.payment_repo.find_by_id(session.payment_id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.booking_id.is_some());
    assert_eq!(verified.payment.status, PaymentStatus::Succeeded);
    assert_eq!(verified.payment.booking_id, payment.booking_id);

    assert_eq!(h.booking_count().await?, 1);
    assert_eq!(h.sink.count(h.seller_id, NotificationKind::NewPaidBooking), 1);
    assert_eq!(h.sink.count(h.buyer.id, NotificationKind::BookingConfirmed), 1);

    Ok(())
}
