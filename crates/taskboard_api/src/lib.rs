//! Typed Taskboard API client crate used by the sync layer.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{BoardClient, FieldPatch, ImageUpload, ItemDraft, StatusUpdate};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use models::{
    AuthSession, Item, ItemId, PushKind, PushMessage, Status, TimelineEvent, UserProfile,
};
