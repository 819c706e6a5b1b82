//! Data models for change notifications and release documents

pub mod document;
pub mod notification;

pub use document::{is_draft_id, ReleaseDocument, Track};
pub use notification::{
    ChangeNotification, Operation, ValidationError, OPERATION_HEADER, TRANSACTION_ID_HEADER,
};
