use crate::state::AppState;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Start the background sweep that deactivates notifications whose end date
/// has passed. The resulting row updates raise the change trigger, so
/// connected feeds drop expired entries without any extra plumbing.
pub async fn start_expiry_service(state: AppState) -> anyhow::Result<()> {
    let scheduler = JobScheduler::new().await?;

    // Run every five minutes; date windows are day-granular in practice
    let job = Job::new_async("0 */5 * * * *", move |_uuid, _l| {
        let state = state.clone();

        Box::pin(async move {
            if let Err(e) = sweep_expired(state).await {
                error!("Error sweeping expired notifications: {:?}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Expiry service started");
    Ok(())
}

async fn sweep_expired(state: AppState) -> anyhow::Result<()> {
    let swept = state.notifications.deactivate_expired(Utc::now()).await?;

    if swept > 0 {
        info!("Deactivated {} expired notifications", swept);
    }

    Ok(())
}
