mod activity;
mod asset;
mod issue;
mod lab;
mod notification;
mod profile;
mod transfer;

pub use activity::{ActionType, ActivityLog, ActivityStats, NewActivity, Severity, UserCount};
pub use asset::{Asset, AssetStatus};
pub use issue::{AssetIssue, IssuePriority, IssueRecord, IssueStatus, LabIssue};
pub use lab::Lab;
pub use notification::{Notification, NotificationKind};
pub use profile::Profile;
pub use transfer::{AssetTransfer, TransferStatus};
