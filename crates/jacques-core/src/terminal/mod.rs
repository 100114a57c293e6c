//! Terminal identity handling.
//!
//! Agents, the process scanner, and statusline hooks each describe "which
//! terminal pane is this" differently. The key module collapses all of them
//! into one canonical string so every other component can compare terminals
//! without caring about the source.

pub mod key;

pub use key::{build_key, extract_iterm_uuid, extract_pid, matches, parse_key, KeyPrefix, ParsedKey};
