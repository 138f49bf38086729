use crate::feed::ChangeEvent;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;

/// Postgres channel raised by the notifications table trigger.
pub const CHANGE_CHANNEL: &str = "notifications_changed";

/// Forward row-change events from Postgres into the process-wide broadcast
/// channel. Runs for the life of the process; if the listening connection
/// drops it reconnects with a fixed backoff, and subscribers simply miss
/// events in between (their next refresh covers the gap).
pub async fn run_change_listener(pool: PgPool, change_tx: broadcast::Sender<ChangeEvent>) {
    loop {
        if let Err(e) = listen(&pool, &change_tx).await {
            tracing::warn!("Change listener disconnected: {}. Reconnecting in 5s", e);
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn listen(
    pool: &PgPool,
    change_tx: &broadcast::Sender<ChangeEvent>,
) -> anyhow::Result<()> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    tracing::info!("Listening on {}", CHANGE_CHANNEL);

    loop {
        let msg = listener.recv().await?;
        match serde_json::from_str::<ChangeEvent>(msg.payload()) {
            Ok(event) => {
                tracing::debug!("Notification change: {:?} id={}", event.op, event.id);
                // Send fails only when nobody is subscribed, which is fine.
                let _ = change_tx.send(event);
            }
            Err(e) => {
                tracing::warn!("Ignoring unparseable change payload {:?}: {}", msg.payload(), e);
            }
        }
    }
}
