//! Compiled regex patterns for validating hide list names.
//!
//! Names are ASCII only. Update these together with the validation tests.

use once_cell::sync::Lazy;
use regex::Regex;

/// A real package: word characters and dots, with at least one dot.
pub static RE_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]*\.[A-Za-z0-9_.]*$").unwrap());

/// A process of a real package: `name` or `name:suffix`.
pub static RE_PROCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_:.]*$").unwrap());

/// An isolated process prefix. Anything after the first colon is a runtime
/// suffix and is not checked.
pub static RE_ISOLATED_PROCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^[A-Za-z0-9_.]*(?::.*)?$").unwrap());
