pub mod activity;
pub mod asset;
pub mod issue;
pub mod lab;
pub mod notification;
pub mod permission;
pub mod profile;
pub mod transfer;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use labtrack_core::{merge_patch, now_rfc3339, ServiceError};
use labtrack_sql::SQLStore;
use labtrack_store::{ChangeFeed, Table};

use crate::model::{
    ActivityLog, Asset, AssetIssue, AssetTransfer, Lab, LabIssue, Notification, Profile,
};

/// Lab service: every entity table plus the workflows spanning them.
pub struct LabService {
    pub(crate) feed: Arc<ChangeFeed>,
    pub(crate) profiles: Table<Profile>,
    pub(crate) labs: Table<Lab>,
    pub(crate) assets: Table<Asset>,
    pub(crate) transfers: Table<AssetTransfer>,
    pub(crate) lab_issues: Table<LabIssue>,
    pub(crate) asset_issues: Table<AssetIssue>,
    pub(crate) activity: Table<ActivityLog>,
    pub(crate) notifications: Table<Notification>,
    /// Held by every read-check-write on labs, assets, transfers and issues.
    /// Not reentrant: a guarded method must not call another guarded one.
    workflow: Mutex<()>,
}

impl LabService {
    pub fn new(sql: Arc<dyn SQLStore>, feed: Arc<ChangeFeed>) -> Result<Self, ServiceError> {
        let svc = Self {
            profiles: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            labs: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            assets: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            transfers: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            lab_issues: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            asset_issues: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            activity: Table::new(Arc::clone(&sql), Arc::clone(&feed)),
            notifications: Table::new(sql, Arc::clone(&feed)),
            feed,
            workflow: Mutex::new(()),
        };
        svc.init_schema()?;
        Ok(svc)
    }

    fn init_schema(&self) -> Result<(), ServiceError> {
        self.profiles.ensure_table()?;
        self.labs.ensure_table()?;
        self.assets.ensure_table()?;
        self.transfers.ensure_table()?;
        self.lab_issues.ensure_table()?;
        self.asset_issues.ensure_table()?;
        self.activity.ensure_table()?;
        self.notifications.ensure_table()?;
        tracing::info!("lab schema initialized");
        Ok(())
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub(crate) fn lock_workflow(&self) -> MutexGuard<'_, ()> {
        match self.workflow.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a JSON merge-patch to a record.
    ///
    /// `id`, `createdAt` and `updatedAt` are silently dropped from the
    /// patch; any key in `protected` is rejected.
    pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
        current: &T,
        patch: serde_json::Value,
        protected: &[&str],
    ) -> Result<T, ServiceError> {
        let mut patch = patch;
        let obj = patch
            .as_object_mut()
            .ok_or_else(|| ServiceError::Validation("patch must be a JSON object".into()))?;

        if let Some(field) = protected.iter().find(|f| obj.contains_key(**f)) {
            return Err(ServiceError::Validation(format!(
                "field '{}' cannot be changed by update",
                field
            )));
        }
        obj.remove("id");
        obj.remove("createdAt");
        obj.insert("updatedAt".into(), serde_json::json!(now_rfc3339()));

        let mut json = serde_json::to_value(current)?;
        merge_patch(&mut json, &patch);
        serde_json::from_value(json).map_err(|e| ServiceError::Validation(e.to_string()))
    }
}

/// Trim an optional string, mapping blank to `None`.
pub(crate) fn clean(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Require a non-blank string field.
pub(crate) fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(v.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;
    use std::time::Duration;

    use labtrack_core::{Actor, Role};
    use labtrack_sql::{Row, SQLError, SQLStore, SqliteStore, Statement, Value};
    use labtrack_store::ChangeFeed;

    use super::asset::CreateAsset;
    use super::lab::CreateLab;
    use super::profile::CreateProfile;
    use super::LabService;
    use crate::model::{Asset, Lab, Profile};

    pub fn service() -> LabService {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        LabService::new(sql, Arc::new(ChangeFeed::new(256))).unwrap()
    }

    /// SQLite store whose reads stall on one chosen thread, to widen
    /// read-modify-write windows.
    pub struct SlowReads {
        inner: SqliteStore,
        slow: Mutex<Option<ThreadId>>,
    }

    impl SlowReads {
        pub fn slow_down_current_thread(&self) {
            *self.slow.lock().unwrap() = Some(std::thread::current().id());
        }
    }

    impl SQLStore for SlowReads {
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
            let slow = *self.slow.lock().unwrap() == Some(std::thread::current().id());
            if slow {
                std::thread::sleep(Duration::from_millis(50));
            }
            self.inner.query(sql, params)
        }

        fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
            self.inner.exec(sql, params)
        }

        fn exec_batch(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError> {
            self.inner.exec_batch(statements)
        }
    }

    pub fn slow_service() -> (Arc<LabService>, Arc<SlowReads>) {
        let store = Arc::new(SlowReads {
            inner: SqliteStore::open_in_memory().unwrap(),
            slow: Mutex::new(None),
        });
        let sql: Arc<dyn SQLStore> = store.clone();
        let svc = LabService::new(sql, Arc::new(ChangeFeed::new(256))).unwrap();
        (Arc::new(svc), store)
    }

    pub fn root() -> Actor {
        Actor {
            id: "root".into(),
            email: "root".into(),
            role: Role::Admin,
            lab_id: None,
        }
    }

    pub fn actor_of(p: &Profile) -> Actor {
        Actor {
            id: p.id.clone(),
            email: p.email.clone(),
            role: p.role,
            lab_id: p.lab_id.clone(),
        }
    }

    pub fn lab(svc: &LabService, code: &str) -> Lab {
        svc.create_lab(
            &root(),
            CreateLab {
                lab_identifier: code.into(),
                name: format!("Lab {code}"),
                department: Some("CSE".into()),
                location: None,
                capacity: Some(30),
                incharge_id: None,
                description: None,
            },
        )
        .unwrap()
    }

    /// Two workstations at 42000 each, created by root.
    pub fn asset(svc: &LabService, lab_id: &str, code: &str) -> Asset {
        svc.create_asset(
            &root(),
            CreateAsset {
                asset_id: code.into(),
                name: format!("Workstation {code}"),
                description: None,
                category: Some("computer".into()),
                make: Some("Dell".into()),
                model: Some("OptiPlex 7010".into()),
                serial_number: None,
                allocated_lab: lab_id.into(),
                consumable: false,
                quantity: Some(2),
                rate: 42000.0,
                bill_number: None,
                supplier: None,
                purchase_date: None,
                status: None,
            },
        )
        .unwrap()
    }

    pub fn user(svc: &LabService, email: &str, role: Role, lab_id: Option<&str>) -> Actor {
        let p = svc
            .create_profile(
                &root(),
                CreateProfile {
                    email: email.into(),
                    full_name: None,
                    role,
                    lab_id: lab_id.map(String::from),
                    password: "secret-pass".into(),
                },
            )
            .unwrap();
        actor_of(&p)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use labtrack_core::Role;

    use super::*;
    use super::issue::{CreateLabIssue, StatusChange};
    use super::transfer::CreateTransfer;
    use crate::model::{AssetStatus, IssueStatus, TransferStatus};

    #[test]
    fn apply_patch_rejects_protected_fields() {
        let lab = serde_json::json!({"a": 1});
        let err = LabService::apply_patch::<serde_json::Value>(
            &lab,
            serde_json::json!({"approved": true}),
            &["approved"],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn apply_patch_drops_id_and_stamps_update() {
        let current = serde_json::json!({"id": "x", "status": "active", "updatedAt": "old"});
        let out: serde_json::Value = LabService::apply_patch(
            &current,
            serde_json::json!({"id": "y", "status": "damaged"}),
            &[],
        )
        .unwrap();
        assert_eq!(out["id"], "x");
        assert_eq!(out["status"], "damaged");
        assert_ne!(out["updatedAt"], "old");
    }

    #[test]
    fn apply_patch_type_errors_are_validation() {
        let svc = testing::service();
        let lab = testing::lab(&svc, "L1");
        let asset = testing::asset(&svc, &lab.id, "PC-1");
        assert_eq!(asset.status, AssetStatus::Active);
        let err = LabService::apply_patch::<Asset>(
            &asset,
            serde_json::json!({"quantity": "lots"}),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn non_object_patch_is_rejected() {
        let err = LabService::apply_patch::<serde_json::Value>(
            &serde_json::json!({}),
            serde_json::json!([1, 2]),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    /// Runs `edit` on a thread whose reads stall, then `workflow` on this
    /// thread while the edit is still in flight.
    fn race(edit: impl FnOnce() + Send + 'static, workflow: impl FnOnce()) {
        let editor = thread::spawn(edit);
        thread::sleep(Duration::from_millis(10));
        workflow();
        editor.join().unwrap();
    }

    #[test]
    fn concurrent_edit_keeps_approval() {
        let (svc, store) = testing::slow_service();
        let lab = testing::lab(&svc, "L1");
        let asset = testing::asset(&svc, &lab.id, "PC-1");
        let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);

        let (s, st, id) = (Arc::clone(&svc), Arc::clone(&store), asset.id.clone());
        race(
            move || {
                st.slow_down_current_thread();
                s.update_asset(&testing::root(), &id, serde_json::json!({"description": "re-imaged"}))
                    .unwrap();
            },
            || {
                svc.approve_asset(&hod, &asset.id, None).unwrap();
            },
        );

        let stored = svc.get_asset(&asset.id).unwrap();
        assert_eq!(stored.approved_by.as_deref(), Some(hod.id.as_str()));
        assert_eq!(stored.description.as_deref(), Some("re-imaged"));
    }

    #[test]
    fn concurrent_edit_keeps_received_asset_in_destination() {
        let (svc, store) = testing::slow_service();
        let from = testing::lab(&svc, "SRC");
        let to = testing::lab(&svc, "DST");
        let asset = testing::asset(&svc, &from.id, "PC-1");
        let transfer = svc
            .create_transfer(
                &testing::root(),
                CreateTransfer {
                    asset_id: asset.id.clone(),
                    from_lab: None,
                    to_lab: to.id.clone(),
                    reason: None,
                },
            )
            .unwrap();

        let (s, st, id) = (Arc::clone(&svc), Arc::clone(&store), asset.id.clone());
        race(
            move || {
                st.slow_down_current_thread();
                s.update_asset(&testing::root(), &id, serde_json::json!({"description": "boxed"}))
                    .unwrap();
            },
            || {
                svc.receive_transfer(&testing::root(), &transfer.id).unwrap();
            },
        );

        assert_eq!(svc.get_transfer(&transfer.id).unwrap().status, TransferStatus::Received);
        let stored = svc.get_asset(&asset.id).unwrap();
        assert_eq!(stored.allocated_lab, to.id);
        assert_eq!(stored.description.as_deref(), Some("boxed"));
    }

    #[test]
    fn concurrent_edit_keeps_issue_status() {
        let (svc, store) = testing::slow_service();
        let lab = testing::lab(&svc, "L1");
        let issue = svc
            .create_lab_issue(
                &testing::root(),
                CreateLabIssue {
                    lab_id: lab.id.clone(),
                    title: "Projector flickers".into(),
                    description: None,
                    priority: None,
                    assigned_to: None,
                },
            )
            .unwrap();

        let (s, st, id) = (Arc::clone(&svc), Arc::clone(&store), issue.id.clone());
        race(
            move || {
                st.slow_down_current_thread();
                s.update_lab_issue(&testing::root(), &id, serde_json::json!({"description": "HDMI port"}))
                    .unwrap();
            },
            || {
                svc.set_lab_issue_status(
                    &testing::root(),
                    &issue.id,
                    StatusChange {
                        status: IssueStatus::Resolved,
                        resolution: Some("cable replaced".into()),
                    },
                )
                .unwrap();
            },
        );

        let stored = svc.get_lab_issue(&issue.id).unwrap();
        assert_eq!(stored.status, IssueStatus::Resolved);
        assert_eq!(stored.description.as_deref(), Some("HDMI port"));
    }
}
