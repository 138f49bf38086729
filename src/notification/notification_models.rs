use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Audience value targeting every user regardless of group.
pub const AUDIENCE_ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Academic,
    General,
    Event,
    Urgent,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationCategory::Academic => write!(f, "academic"),
            NotificationCategory::General => write!(f, "general"),
            NotificationCategory::Event => write!(f, "event"),
            NotificationCategory::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Active => write!(f, "active"),
            NotificationStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// An announcement row. Created by an admin; only its status ever changes
/// afterwards (or the row is deleted outright).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    /// Either `"all"` or a department/group code.
    pub audience: String,
    pub status: NotificationStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The identity facts visibility is decided against.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: Uuid,
    /// Department/group code. Matched exactly against `Notification::audience`.
    pub group: String,
}

impl Notification {
    /// A notification is visible when it is active, targeted at the viewer's
    /// group (or everyone), and `now` falls inside its date window.
    pub fn is_visible_to(&self, viewer: &Viewer, now: DateTime<Utc>) -> bool {
        if self.status != NotificationStatus::Active {
            return false;
        }
        if self.audience != AUDIENCE_ALL && self.audience != viewer.group {
            return false;
        }
        if now < self.start_date {
            return false;
        }
        match self.end_date {
            Some(end) => now <= end,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn viewer(group: &str) -> Viewer {
        Viewer {
            user_id: Uuid::new_v4(),
            group: group.to_string(),
        }
    }

    fn notification(audience: &str, status: NotificationStatus) -> Notification {
        let now = Utc::now();
        Notification {
            id: 1,
            title: "Midterm schedule posted".to_string(),
            message: "Check the registrar page".to_string(),
            category: NotificationCategory::Academic,
            audience: audience.to_string(),
            status,
            start_date: now - Duration::hours(1),
            end_date: None,
            created_at: now - Duration::hours(1),
        }
    }

    #[test]
    fn test_inactive_never_visible() {
        let n = notification(AUDIENCE_ALL, NotificationStatus::Inactive);
        assert!(!n.is_visible_to(&viewer("CS"), Utc::now()));
    }

    #[test]
    fn test_audience_all_visible_to_any_group() {
        let n = notification(AUDIENCE_ALL, NotificationStatus::Active);
        assert!(n.is_visible_to(&viewer("CS"), Utc::now()));
        assert!(n.is_visible_to(&viewer("MATH"), Utc::now()));
    }

    #[test]
    fn test_group_audience_requires_exact_match() {
        let n = notification("CS", NotificationStatus::Active);
        assert!(n.is_visible_to(&viewer("CS"), Utc::now()));
        assert!(!n.is_visible_to(&viewer("MATH"), Utc::now()));
        assert!(!n.is_visible_to(&viewer("cs"), Utc::now()));
    }

    #[test]
    fn test_future_start_date_hidden_until_reached() {
        let mut n = notification(AUDIENCE_ALL, NotificationStatus::Active);
        let now = Utc::now();
        n.start_date = now + Duration::hours(2);
        assert!(!n.is_visible_to(&viewer("CS"), now));
        // Same row once the clock has moved past the start.
        assert!(n.is_visible_to(&viewer("CS"), now + Duration::hours(3)));
    }

    #[test]
    fn test_past_end_date_hidden() {
        let mut n = notification(AUDIENCE_ALL, NotificationStatus::Active);
        let now = Utc::now();
        n.end_date = Some(now - Duration::minutes(5));
        assert!(!n.is_visible_to(&viewer("CS"), now));
    }

    #[test]
    fn test_missing_end_date_is_open_ended() {
        let n = notification(AUDIENCE_ALL, NotificationStatus::Active);
        assert!(n.is_visible_to(&viewer("CS"), Utc::now() + Duration::days(365)));
    }
}
