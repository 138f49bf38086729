pub mod expiry_service;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;

pub use expiry_service::start_expiry_service;
pub use notification_dto::{CreateNotificationRequest, UpdateNotificationStatusRequest};
pub use notification_handlers::{
    create_notification, delete_notification, get_notifications, list_all_notifications,
    mark_all_notifications_read, mark_notification_read, notification_stream,
    update_notification_status,
};
pub use notification_models::{
    Notification, NotificationCategory, NotificationStatus, Viewer, AUDIENCE_ALL,
};
pub use notification_repository::NotificationRepository;
