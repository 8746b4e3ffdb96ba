use std::collections::BTreeSet;

use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, Role, ServiceError};
use labtrack_store::{ChangeOp, Query};

use crate::model::{Notification, NotificationKind, Profile};
use super::LabService;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilters {
    /// Only unread (`true`) or only read (`false`) notifications.
    pub unread: Option<bool>,
    pub kind: Option<NotificationKind>,
}

/// Content of a notification before it is addressed to users.
pub(crate) struct Draft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: &'static str,
    pub entity_id: String,
}

impl LabService {
    /// Deliver a notification to each recipient once, skipping `except`.
    ///
    /// Delivery failures are logged and never fail the calling operation.
    pub(crate) fn notify<I>(&self, recipients: I, except: Option<&str>, draft: &Draft)
    where
        I: IntoIterator<Item = String>,
    {
        let unique: BTreeSet<String> = recipients
            .into_iter()
            .filter(|r| Some(r.as_str()) != except)
            .collect();

        for user_id in unique {
            let n = Notification {
                id: new_id(),
                user_id,
                title: draft.title.clone(),
                message: draft.message.clone(),
                kind: draft.kind,
                entity_type: Some(draft.entity_type.to_string()),
                entity_id: Some(draft.entity_id.clone()),
                read: false,
                read_at: None,
                created_at: now_rfc3339(),
            };
            if let Err(e) = self.notifications.insert(&n) {
                tracing::warn!(user = %n.user_id, kind = ?n.kind, "notification not delivered: {}", e);
            }
        }
    }

    /// Profile ids of the lab's incharge(s): the lab's designated incharge
    /// plus every `lab_incharge` profile assigned to it.
    pub(crate) fn lab_incharges(&self, lab_id: &str) -> Vec<String> {
        let q = Query::new()
            .eq("role", Role::LabIncharge.as_str())
            .eq("lab_id", lab_id);
        let mut ids: Vec<String> = match self.profiles.find_all(&q) {
            Ok(ps) => ps.into_iter().map(|p: Profile| p.id).collect(),
            Err(e) => {
                tracing::warn!(lab = lab_id, "failed to look up lab incharges: {}", e);
                Vec::new()
            }
        };
        if let Ok(Some(lab)) = self.labs.get(lab_id) {
            ids.extend(lab.incharge_id);
        }
        ids
    }

    pub(crate) fn hods(&self) -> Vec<String> {
        match self.profiles.find_all(&Query::new().eq("role", Role::Hod.as_str())) {
            Ok(ps) => ps.into_iter().map(|p| p.id).collect(),
            Err(e) => {
                tracing::warn!("failed to look up HODs: {}", e);
                Vec::new()
            }
        }
    }

    fn owned_notification(&self, actor: &Actor, id: &str) -> Result<Notification, ServiceError> {
        let n = self.notifications.get_or_err(id)?;
        if n.user_id != actor.id {
            return Err(ServiceError::PermissionDenied(
                "notification belongs to another user".into(),
            ));
        }
        Ok(n)
    }

    pub fn list_notifications(
        &self,
        actor: &Actor,
        params: &ListParams,
        filters: &NotificationFilters,
    ) -> Result<ListResult<Notification>, ServiceError> {
        let q = Query::new()
            .eq("user_id", actor.id.as_str())
            .eq_opt("read", filters.unread.map(|u| !u))
            .eq_opt("kind", filters.kind.map(kind_str))
            .page(params);
        self.notifications.find(&q)
    }

    pub fn get_notification(&self, actor: &Actor, id: &str) -> Result<Notification, ServiceError> {
        self.owned_notification(actor, id)
    }

    pub fn unread_count(&self, actor: &Actor) -> Result<usize, ServiceError> {
        self.notifications.count(
            &Query::new()
                .eq("user_id", actor.id.as_str())
                .eq("read", false),
        )
    }

    /// Set or clear the read flag.
    pub fn mark_read(
        &self,
        actor: &Actor,
        id: &str,
        read: bool,
    ) -> Result<Notification, ServiceError> {
        let mut n = self.owned_notification(actor, id)?;
        if n.read == read {
            return Ok(n);
        }
        n.read = read;
        n.read_at = read.then(now_rfc3339);
        self.notifications.update(&n)?;
        Ok(n)
    }

    /// Mark every unread notification of the caller as read, atomically.
    pub fn mark_all_read(&self, actor: &Actor) -> Result<usize, ServiceError> {
        let unread = self.notifications.find_all(
            &Query::new()
                .eq("user_id", actor.id.as_str())
                .eq("read", false),
        )?;
        if unread.is_empty() {
            return Ok(0);
        }

        let now = now_rfc3339();
        let mut stmts = Vec::with_capacity(unread.len());
        for mut n in unread.iter().cloned() {
            n.read = true;
            n.read_at = Some(now.clone());
            stmts.push(self.notifications.update_statement(&n)?);
        }
        self.notifications.exec_batch(&stmts)?;
        for n in &unread {
            self.notifications.publish(ChangeOp::Update, &n.id);
        }
        Ok(unread.len())
    }

    pub fn delete_notification(&self, actor: &Actor, id: &str) -> Result<(), ServiceError> {
        self.owned_notification(actor, id)?;
        self.notifications.delete(id)
    }
}

fn kind_str(kind: NotificationKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}
