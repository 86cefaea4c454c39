mod common;

use common::{create_user, notifications_for, try_setup_state};

#[tokio::test]
async fn publish_persists_first_and_fans_out_to_every_session() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;

    let mut first = state.bus.join(user.user_id).await;
    let mut second = state.bus.join(user.user_id).await;

    let published = state
        .bus
        .publish(&state.pool, user.user_id, "Your order shipped")
        .await?;
    assert!(!published.is_read);

    // Both live sessions of the same owner see the event.
    assert_eq!(first.recv().await?.id, published.id);
    assert_eq!(second.recv().await?.id, published.id);

    // And the durable record exists regardless of delivery.
    let stored = notifications_for(&state, user.user_id, "Your order shipped").await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, published.id);
    Ok(())
}

#[tokio::test]
async fn publish_with_no_sessions_still_persists_but_never_redelivers() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;

    state
        .bus
        .publish(&state.pool, user.user_id, "Missed while offline")
        .await?;

    let stored = notifications_for(&state, user.user_id, "Missed while offline").await?;
    assert_eq!(stored.len(), 1);

    // A session joining later gets nothing: the live channel does not
    // replay missed notifications.
    let mut late = state.bus.join(user.user_id).await;
    assert!(late.try_recv().is_err());
    Ok(())
}
