//! The hide list: package → process names.
//!
//! Inserting an entry also kills any already-running process it covers, so a
//! rule added after the target launched still takes effect on the next start.
//! Cold-start loading goes through the same insert path.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::error::{HideError, Result};
use crate::matcher::KillPolicy;
use crate::persistence::Persistence;
use crate::procfs::{kill_matching, ProcessTable};
use crate::types::{AddOutcome, HideEntry, ISOLATED_MAGIC};

/// What a successful removal took out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removed {
    Process,
    /// The package is gone from the list.
    Package,
}

#[derive(Debug, Default)]
pub struct HideList {
    packages: BTreeMap<String, BTreeSet<String>>,
}

impl HideList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the list from every persisted row.
    ///
    /// On a storage error the partial list is dropped.
    pub fn load(persistence: &dyn Persistence, procs: &mut dyn ProcessTable) -> Result<Self> {
        info!("hide_list: initializing internal data structures");
        let mut list = Self::new();
        persistence
            .for_each_entry(&mut |package, process| {
                list.insert(package, process, &mut *procs);
                true
            })
            .map_err(HideError::Storage)?;
        Ok(list)
    }

    pub fn insert(
        &mut self,
        package: &str,
        process: &str,
        procs: &mut dyn ProcessTable,
    ) -> AddOutcome {
        let inserted = self
            .packages
            .entry(package.to_string())
            .or_default()
            .insert(process.to_string());
        if !inserted {
            return AddOutcome::AlreadyExists;
        }

        info!(package, process, "hide_list add");
        if package == ISOLATED_MAGIC {
            kill_matching(procs, process, KillPolicy::Prefix, true);
        } else {
            kill_matching(procs, process, KillPolicy::Exact, false);
        }
        AddOutcome::Inserted
    }

    /// Removes one process, or the whole package when `process` is `None`.
    pub fn remove(&mut self, package: &str, process: Option<&str>) -> Option<Removed> {
        let processes = self.packages.get_mut(package)?;
        match process {
            None => {
                self.packages.remove(package);
                info!(package, "hide_list rm");
                Some(Removed::Package)
            }
            Some(process) => {
                if !processes.remove(process) {
                    return None;
                }
                info!(package, process, "hide_list rm");
                if processes.is_empty() {
                    self.packages.remove(package);
                    Some(Removed::Package)
                } else {
                    Some(Removed::Process)
                }
            }
        }
    }

    pub fn contains_package(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    pub fn processes(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(package)
    }

    /// All entries ordered by package, then process.
    pub fn entries(&self) -> Vec<HideEntry> {
        self.packages
            .iter()
            .flat_map(|(package, processes)| {
                processes
                    .iter()
                    .map(move |process| HideEntry::new(package.as_str(), process.as_str()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
