//! App-data layout scanning.
//!
//! Layout: `<app_data_dir>/<user id>/<package>/`, where the owner UID of each
//! package directory is the app's UID for that user. The package registry
//! file (`packages.xml`) is rewritten on every install/uninstall, so its inode
//! is a cheap change fingerprint.

use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use fs_err as fs;
use tracing::debug;
use walkdir::WalkDir;

/// A package directory found under some user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOwner {
    pub package: String,
    /// `None` when the directory could not be stat'ed.
    pub uid: Option<u32>,
}

pub trait PackageScanner: Send {
    /// Inode of the package registry, or 0 when it cannot be read.
    fn fingerprint(&self) -> u64;

    /// Every package directory of every user, user by user.
    fn owners(&self) -> Vec<PackageOwner>;

    /// Owner UID of `package` under the first user that has it.
    fn find_owner(&self, package: &str) -> Option<u32>;
}

pub struct AppDataScanner {
    app_data_dir: PathBuf,
    packages_xml: PathBuf,
}

impl AppDataScanner {
    pub fn new(app_data_dir: impl Into<PathBuf>, packages_xml: impl Into<PathBuf>) -> Self {
        Self {
            app_data_dir: app_data_dir.into(),
            packages_xml: packages_xml.into(),
        }
    }
}

impl PackageScanner for AppDataScanner {
    fn fingerprint(&self) -> u64 {
        fs::metadata(&self.packages_xml)
            .map(|meta| meta.ino())
            .unwrap_or(0)
    }

    fn owners(&self) -> Vec<PackageOwner> {
        let mut owners = Vec::new();
        for entry in WalkDir::new(&self.app_data_dir).min_depth(2).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "Skipping unreadable app-data entry");
                    continue;
                }
            };
            let Some(package) = entry.file_name().to_str() else {
                continue;
            };
            let uid = match fs::metadata(entry.path()) {
                Ok(meta) => Some(meta.uid()),
                Err(err) => {
                    debug!(error = %err, package, "Failed to stat package directory");
                    None
                }
            };
            owners.push(PackageOwner {
                package: package.to_string(),
                uid,
            });
        }
        owners
    }

    fn find_owner(&self, package: &str) -> Option<u32> {
        let users = match fs::read_dir(&self.app_data_dir) {
            Ok(users) => users,
            Err(err) => {
                debug!(error = %err, "App-data root unreadable");
                return None;
            }
        };
        users
            .filter_map(|user| user.ok())
            .find_map(|user| fs::metadata(user.path().join(package)).ok())
            .map(|meta| meta.uid())
    }
}
