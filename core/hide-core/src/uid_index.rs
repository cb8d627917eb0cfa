//! App ID → hidden packages index.
//!
//! A full rescan walks every package of every user, so it only runs when the
//! package registry fingerprint changes. Single add/remove operations patch
//! one mapping instead.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::hide_list::HideList;
use crate::scanner::PackageScanner;
use crate::types::{to_app_id, UNRESOLVED_APP_ID};

#[derive(Debug, Default)]
pub struct UidIndex {
    app_ids: HashMap<i32, BTreeSet<String>>,
    fingerprint: u64,
    scans: usize,
    manager_app_id: Option<i32>,
}

impl UidIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index when the registry fingerprint changed.
    ///
    /// Returns true when a rescan ran.
    pub fn rescan_if_stale(&mut self, scanner: &dyn PackageScanner, list: &HideList) -> bool {
        let fingerprint = scanner.fingerprint();
        if fingerprint == self.fingerprint {
            return false;
        }
        self.fingerprint = fingerprint;
        self.scans += 1;

        debug!(fingerprint, "hide_list: rescanning apps");
        self.app_ids.clear();
        self.manager_app_id = None;

        for owner in scanner.owners() {
            if !list.contains_package(&owner.package) {
                continue;
            }
            let app_id = match owner.uid {
                Some(uid) => to_app_id(uid),
                None => UNRESOLVED_APP_ID,
            };
            // App IDs are shared across users; the first resolution wins.
            if app_id != UNRESOLVED_APP_ID && self.app_ids.contains_key(&app_id) {
                continue;
            }
            self.app_ids.entry(app_id).or_default().insert(owner.package);
        }
        true
    }

    /// Inserts or removes the mapping of a single package.
    ///
    /// Removal drops the package from every bucket, including the unresolved
    /// one, so no lookup is needed.
    pub fn patch_one(&mut self, scanner: &dyn PackageScanner, package: &str, removed: bool) {
        if removed {
            self.app_ids.retain(|_, packages| {
                packages.remove(package);
                !packages.is_empty()
            });
            return;
        }
        let app_id = scanner
            .find_owner(package)
            .map_or(UNRESOLVED_APP_ID, to_app_id);
        self.app_ids
            .entry(app_id)
            .or_default()
            .insert(package.to_string());
    }

    pub fn packages(&self, app_id: i32) -> Option<&BTreeSet<String>> {
        self.app_ids.get(&app_id)
    }

    /// Number of full rescans since this index was created.
    pub fn scan_count(&self) -> usize {
        self.scans
    }

    /// App ID of the package-manager app, cached until the next rescan.
    pub fn manager_app_id(
        &mut self,
        scanner: &dyn PackageScanner,
        manager_package: &str,
    ) -> Option<i32> {
        if self.manager_app_id.is_none() {
            self.manager_app_id = scanner.find_owner(manager_package).map(to_app_id);
        }
        self.manager_app_id
    }
}
