//! Collaborator traits for durable storage and system-property hiding.
//!
//! The daemon provides the SQLite implementation; tests use in-memory fakes.

/// Durable storage for the hide list and the enabled flag.
pub trait Persistence: Send + Sync {
    /// Calls `row` for every stored `(package, process)` pair until it returns false.
    fn for_each_entry(&self, row: &mut dyn FnMut(&str, &str) -> bool) -> Result<(), String>;

    fn insert_entry(&self, package: &str, process: &str) -> Result<(), String>;

    /// Deletes one pair, or every pair of `package` when `process` is `None`.
    fn delete_entry(&self, package: &str, process: Option<&str>) -> Result<(), String>;

    fn hide_enabled(&self) -> Result<bool, String>;

    fn set_hide_enabled(&self, enabled: bool) -> Result<(), String>;
}

/// Hides system properties that reveal a modified device.
pub trait PropertyHider: Send + Sync {
    fn hide_sensitive(&self);

    /// Properties that only become available late in boot.
    fn hide_late_sensitive(&self);
}
