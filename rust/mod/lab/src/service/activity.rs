use std::collections::HashMap;

use serde::Deserialize;

use labtrack_core::{new_id, now_rfc3339, Actor, ListParams, ListResult, Role, ServiceError};
use labtrack_store::Query;

use crate::model::{ActionType, ActivityLog, ActivityStats, NewActivity, Severity, UserCount};
use super::LabService;

const DEFAULT_STATS_DAYS: u32 = 30;
const MAX_STATS_DAYS: u32 = 3650;
const TOP_USERS: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilters {
    pub user_id: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action_type: Option<ActionType>,
    pub severity: Option<Severity>,
    pub success: Option<bool>,
    /// Inclusive lower bound on `createdAt`.
    pub from: Option<String>,
    /// Inclusive upper bound on `createdAt`. A bare `YYYY-MM-DD` covers
    /// the whole of that UTC day.
    pub to: Option<String>,
}

/// Widen a date-only upper bound to the last instant of that day, so it
/// sorts after every RFC 3339 timestamp written on it.
fn end_of_day(to: &str) -> String {
    match chrono::NaiveDate::parse_from_str(to, "%Y-%m-%d") {
        Ok(_) => format!("{to}T23:59:59.999999999+00:00"),
        Err(_) => to.to_string(),
    }
}

impl NewActivity {
    /// A successful, info-level entry attributed to `actor`.
    pub fn by(actor: &Actor, action: ActionType, entity_type: &str, entity_id: &str) -> Self {
        Self {
            user_id: actor.id.clone(),
            user_email: Some(actor.email.clone()),
            action_type: action,
            entity_type: entity_type.to_string(),
            entity_id: Some(entity_id.to_string()),
            description: None,
            old_values: None,
            new_values: None,
            severity: Severity::Info,
            success: true,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn values(
        mut self,
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    ) -> Self {
        self.old_values = old;
        self.new_values = new;
        self
    }

    /// Mark as a rejected attempt.
    pub fn denied(mut self) -> Self {
        self.success = false;
        self.severity = Severity::Warning;
        self
    }
}

impl LabService {
    /// Append one activity entry.
    pub fn log_activity(&self, entry: NewActivity) -> Result<ActivityLog, ServiceError> {
        if entry.user_id.trim().is_empty() {
            return Err(ServiceError::Validation("userId is required".into()));
        }
        if entry.entity_type.trim().is_empty() {
            return Err(ServiceError::Validation("entityType is required".into()));
        }
        let log = ActivityLog {
            id: new_id(),
            user_id: entry.user_id,
            user_email: entry.user_email,
            action_type: entry.action_type,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            description: entry.description,
            old_values: entry.old_values,
            new_values: entry.new_values,
            severity: entry.severity,
            success: entry.success,
            created_at: now_rfc3339(),
        };
        self.activity.insert(&log)?;
        Ok(log)
    }

    /// Log as a side effect; a failure here never fails the caller.
    pub(crate) fn record(&self, entry: NewActivity) {
        let action = entry.action_type;
        if let Err(e) = self.log_activity(entry) {
            tracing::warn!(action = action.as_str(), "failed to write activity log: {}", e);
        }
    }

    pub fn get_activity(&self, actor: &Actor, id: &str) -> Result<ActivityLog, ServiceError> {
        let log = self.activity.get_or_err(id)?;
        if !can_see_all_activity(actor) && log.user_id != actor.id {
            return Err(ServiceError::PermissionDenied(
                "activity of other users is not visible to this role".into(),
            ));
        }
        Ok(log)
    }

    /// Admins and HODs see everyone's activity; other roles only their own.
    pub fn list_activity(
        &self,
        actor: &Actor,
        params: &ListParams,
        filters: &ActivityFilters,
    ) -> Result<ListResult<ActivityLog>, ServiceError> {
        let user_id = if can_see_all_activity(actor) {
            filters.user_id.clone()
        } else {
            Some(actor.id.clone())
        };
        let q = Query::new()
            .eq_opt("user_id", user_id)
            .eq_opt("entity_type", filters.entity_type.clone())
            .eq_opt("entity_id", filters.entity_id.clone())
            .eq_opt("action_type", filters.action_type.map(|a| a.as_str()))
            .eq_opt("severity", filters.severity.map(|s| s.as_str()))
            .eq_opt("success", filters.success)
            .gte_opt("created_at", filters.from.clone())
            .lte_opt("created_at", filters.to.as_deref().map(end_of_day))
            .search(&["entity_type", "entity_id"], params.search_term())
            .page(params);
        self.activity.find(&q)
    }

    /// Aggregate activity over the last `days` (default 30).
    pub fn get_activity_stats(
        &self,
        actor: &Actor,
        days: Option<u32>,
    ) -> Result<ActivityStats, ServiceError> {
        self.require_manager(actor)?;
        let days = days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS);
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();

        let logs = self
            .activity
            .find_all(&Query::new().gte_opt("created_at", Some(cutoff)))?;
        Ok(summarize(days, &logs))
    }
}

fn can_see_all_activity(actor: &Actor) -> bool {
    matches!(actor.role, Role::Admin | Role::Hod)
}

fn summarize(days: u32, logs: &[ActivityLog]) -> ActivityStats {
    let mut stats = ActivityStats {
        days,
        total: logs.len(),
        ..Default::default()
    };
    let mut users: HashMap<&str, (Option<&str>, usize)> = HashMap::new();

    for log in logs {
        if !log.success {
            stats.failed += 1;
        }
        *stats.by_action.entry(log.action_type.as_str().to_string()).or_default() += 1;
        *stats.by_severity.entry(log.severity.as_str().to_string()).or_default() += 1;
        *stats.by_entity_type.entry(log.entity_type.clone()).or_default() += 1;
        let day = log.created_at.get(..10).unwrap_or(&log.created_at).to_string();
        *stats.daily.entry(day).or_default() += 1;

        let entry = users
            .entry(log.user_id.as_str())
            .or_insert((log.user_email.as_deref(), 0));
        entry.1 += 1;
    }

    let mut top: Vec<UserCount> = users
        .into_iter()
        .map(|(user_id, (email, count))| UserCount {
            user_id: user_id.to_string(),
            user_email: email.map(String::from),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
    top.truncate(TOP_USERS);
    stats.top_users = top;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    fn entry(user: &str, action: ActionType, success: bool) -> NewActivity {
        NewActivity {
            user_id: user.into(),
            user_email: Some(format!("{user}@college.edu")),
            action_type: action,
            entity_type: "assets".into(),
            entity_id: Some("a1".into()),
            description: None,
            old_values: None,
            new_values: None,
            severity: if success { Severity::Info } else { Severity::Warning },
            success,
        }
    }

    #[test]
    fn stats_aggregate_recent_entries() {
        let svc = testing::service();
        for _ in 0..3 {
            svc.log_activity(entry("u1", ActionType::Create, true)).unwrap();
        }
        svc.log_activity(entry("u2", ActionType::Approve, false)).unwrap();

        let stats = svc.get_activity_stats(&testing::root(), None).unwrap();
        assert_eq!(stats.days, 30);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_action.get("create"), Some(&3));
        assert_eq!(stats.by_severity.get("warning"), Some(&1));
        assert_eq!(stats.by_entity_type.get("assets"), Some(&4));
        assert_eq!(stats.top_users[0].user_id, "u1");
        assert_eq!(stats.top_users[0].count, 3);
        assert_eq!(stats.daily.values().sum::<usize>(), 4);
    }

    #[test]
    fn stats_require_manager() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "PHY-1");
        let inc = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&lab.id));
        let err = svc.get_activity_stats(&inc, Some(7)).unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
    }

    #[test]
    fn non_managers_only_see_their_own_activity() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "PHY-1");
        let inc = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&lab.id));
        svc.log_activity(entry(&inc.id, ActionType::Update, true)).unwrap();
        svc.log_activity(entry("someone-else", ActionType::Update, true)).unwrap();

        let filters = ActivityFilters {
            user_id: Some("someone-else".into()),
            ..Default::default()
        };
        let mine = svc.list_activity(&inc, &ListParams::default(), &filters).unwrap();
        assert!(mine.items.iter().all(|l| l.user_id == inc.id));
        assert_eq!(mine.total, 1);

        let all = svc
            .list_activity(&testing::root(), &ListParams::default(), &ActivityFilters::default())
            .unwrap();
        // Setup writes (lab + profile creation) are logged too.
        assert!(all.total >= 4);
    }

    #[test]
    fn failed_filter() {
        let svc = testing::service();
        svc.log_activity(entry("u1", ActionType::Receive, false)).unwrap();
        svc.log_activity(entry("u1", ActionType::Receive, true)).unwrap();
        let filters = ActivityFilters {
            success: Some(false),
            action_type: Some(ActionType::Receive),
            ..Default::default()
        };
        let page = svc
            .list_activity(&testing::root(), &ListParams::default(), &filters)
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(!page.items[0].success);
    }

    #[test]
    fn date_only_upper_bound_covers_the_whole_day() {
        let svc = testing::service();
        svc.log_activity(entry("u1", ActionType::Create, true)).unwrap();

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let filters = ActivityFilters {
            user_id: Some("u1".into()),
            from: Some(today.clone()),
            to: Some(today),
            ..Default::default()
        };
        let page = svc
            .list_activity(&testing::root(), &ListParams::default(), &filters)
            .unwrap();
        assert_eq!(page.total, 1);

        let before = ActivityFilters {
            user_id: Some("u1".into()),
            to: Some("2000-01-01".into()),
            ..Default::default()
        };
        let page = svc
            .list_activity(&testing::root(), &ListParams::default(), &before)
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn full_timestamps_pass_through() {
        assert_eq!(end_of_day("2026-01-31"), "2026-01-31T23:59:59.999999999+00:00");
        assert_eq!(end_of_day("2026-01-31T10:00:00+00:00"), "2026-01-31T10:00:00+00:00");
    }
}
