//! Name validation and process matching.
//!
//! Everything here is pure. Two rule sets exist:
//!
//! - **Isolated prefix**: isolated process names are generated at runtime by
//!   appending a suffix to a declared prefix, so a candidate matches when it
//!   starts with the configured target.
//! - **Package name**: the package name doubles as the default process name,
//!   so a candidate matches only on equality.
//!
//! Both accept a truncated candidate: the kernel may report at most `max_len`
//! bytes, so when target and candidate are both longer than that, a target
//! starting with the candidate counts as a hit.

use crate::patterns::{RE_ISOLATED_PROCESS, RE_PACKAGE, RE_PROCESS};
use crate::types::{ISOLATED_MAGIC, WEBVIEW_ZYGOTE};

/// Returns true when `(package, process)` may be stored in the hide list.
pub fn validate(package: &str, process: &str) -> bool {
    if package == ISOLATED_MAGIC {
        RE_ISOLATED_PROCESS.is_match(process)
    } else {
        RE_PACKAGE.is_match(package) && RE_PROCESS.is_match(process)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    IsolatedPrefix,
    PackageName,
}

/// Checks `candidate` against every target under `rule`.
pub fn is_match<'a, I>(targets: I, candidate: &str, max_len: usize, rule: MatchRule) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if candidate == WEBVIEW_ZYGOTE {
        return false;
    }

    targets.into_iter().any(|target| {
        if truncated_prefix(target, candidate, max_len) {
            return true;
        }
        match rule {
            MatchRule::IsolatedPrefix => candidate.starts_with(target),
            MatchRule::PackageName => candidate == target,
        }
    })
}

fn truncated_prefix(target: &str, candidate: &str, max_len: usize) -> bool {
    target.len() > max_len && candidate.len() > max_len && target.starts_with(candidate)
}

/// How a process command line is compared when looking for processes to kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillPolicy {
    Exact,
    Prefix,
    Suffix,
}

impl KillPolicy {
    pub fn matches(self, cmdline: &str, name: &str) -> bool {
        if cmdline == WEBVIEW_ZYGOTE {
            return false;
        }
        match self {
            KillPolicy::Exact => cmdline == name,
            KillPolicy::Prefix => cmdline.starts_with(name),
            KillPolicy::Suffix => cmdline.ends_with(name),
        }
    }
}
