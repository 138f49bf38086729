use super::notification_models::{NotificationCategory, NotificationStatus};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub category: NotificationCategory,
    /// `"all"` or a department/group code. Defaults to `"all"`.
    #[validate(length(min = 1, max = 64))]
    pub audience: Option<String>,
    /// Defaults to now.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNotificationStatusRequest {
    pub status: NotificationStatus,
}
