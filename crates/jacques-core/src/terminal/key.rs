//! Terminal key parsing, construction, and canonical matching.
//!
//! A terminal key is a single opaque string naming a specific terminal
//! pane/tab across processes: `PREFIX:value`, with a second form
//! `DISCOVERED:PREFIX:value` for keys synthesized by the process scanner
//! rather than declared by the owning process.

use jacques_protocol::TerminalIdentity;

/// Recognized key prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Iterm,
    Kitty,
    Wezterm,
    Wt,
    Term,
    Tty,
    Pid,
    Auto,
    Unknown,
}

impl KeyPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPrefix::Iterm => "ITERM",
            KeyPrefix::Kitty => "KITTY",
            KeyPrefix::Wezterm => "WEZTERM",
            KeyPrefix::Wt => "WT",
            KeyPrefix::Term => "TERM",
            KeyPrefix::Tty => "TTY",
            KeyPrefix::Pid => "PID",
            KeyPrefix::Auto => "AUTO",
            KeyPrefix::Unknown => "UNKNOWN",
        }
    }

    /// Normalize a raw prefix token. Case-insensitive; recognizes the
    /// emulator aliases that show up in the wild (`ITERM2`,
    /// `WindowsTerminal`).
    fn from_token(token: &str) -> KeyPrefix {
        match token.to_ascii_uppercase().as_str() {
            "ITERM" | "ITERM2" => KeyPrefix::Iterm,
            "KITTY" => KeyPrefix::Kitty,
            "WEZTERM" => KeyPrefix::Wezterm,
            "WT" | "WINDOWSTERMINAL" => KeyPrefix::Wt,
            "TERM" => KeyPrefix::Term,
            "TTY" => KeyPrefix::Tty,
            "PID" => KeyPrefix::Pid,
            "AUTO" => KeyPrefix::Auto,
            _ => KeyPrefix::Unknown,
        }
    }
}

/// Structured view of a terminal key.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedKey {
    pub prefix: KeyPrefix,
    pub value: String,
    pub pid: Option<u32>,
    pub uuid: Option<String>,
    pub tty: Option<String>,
    pub is_discovered: bool,
    /// For `DISCOVERED:PREFIX:value`, the unwrapped `PREFIX:value`.
    pub inner_key: Option<String>,
}

/// Parse a terminal key into its components.
pub fn parse_key(key: &str) -> ParsedKey {
    let (is_discovered, rest) = match strip_prefix_token(key, "DISCOVERED") {
        Some(inner) => (true, inner),
        None => (false, key),
    };

    let (prefix_token, value) = match rest.split_once(':') {
        Some((p, v)) => (p, v.to_string()),
        None => (rest, String::new()),
    };
    let prefix = KeyPrefix::from_token(prefix_token);

    let pid = match prefix {
        KeyPrefix::Pid => value.parse::<u32>().ok(),
        KeyPrefix::Tty => tty_pid_suffix(&value),
        _ => None,
    };
    let uuid = match prefix {
        KeyPrefix::Iterm => Some(extract_iterm_uuid(&value)),
        _ => None,
    };
    let tty = match prefix {
        KeyPrefix::Tty => Some(tty_base(&value).to_string()),
        _ => None,
    };

    ParsedKey {
        prefix,
        inner_key: if is_discovered {
            Some(format!("{}:{}", prefix.as_str(), value))
        } else {
            None
        },
        value,
        pid,
        uuid,
        tty,
        is_discovered,
    }
}

/// Case-insensitive `TOKEN:`-prefix strip.
fn strip_prefix_token<'a>(key: &'a str, token: &str) -> Option<&'a str> {
    let (head, rest) = key.split_once(':')?;
    if head.eq_ignore_ascii_case(token) {
        Some(rest)
    } else {
        None
    }
}

/// Build a key from a structured terminal identity.
///
/// Priority order when multiple identity fields are set: iTerm session id,
/// Kitty window id, WezTerm pane id, WT session, TERM session id, TTY,
/// PID > 0. Empty identity yields `None`.
pub fn build_key(identity: &TerminalIdentity) -> Option<String> {
    if let Some(id) = non_empty(&identity.iterm_session_id) {
        return Some(format!("ITERM:{}", id));
    }
    if let Some(id) = non_empty(&identity.kitty_window_id) {
        return Some(format!("KITTY:{}", id));
    }
    if let Some(id) = non_empty(&identity.wezterm_pane) {
        return Some(format!("WEZTERM:{}", id));
    }
    if let Some(id) = non_empty(&identity.wt_session) {
        return Some(format!("WT:{}", id));
    }
    if let Some(id) = non_empty(&identity.term_session_id) {
        return Some(format!("TERM:{}", id));
    }
    if let Some(tty) = non_empty(&identity.tty) {
        return Some(format!("TTY:{}", tty));
    }
    match identity.pid {
        Some(pid) if pid > 0 => Some(format!("PID:{}", pid)),
        _ => None,
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Extract a pid from a key, if one is encoded.
///
/// Handles `PID:n`, `DISCOVERED:PID:n`, and `DISCOVERED:TTY:<tty>:<pid>`.
pub fn extract_pid(key: &str) -> Option<u32> {
    let parsed = parse_key(key);
    parsed.pid
}

/// Extract the UUID from an iTerm session id value.
///
/// `ITERM_SESSION_ID` has shape `w<n>t<n>p<n>:UUID`; the UUID is everything
/// after the last `:`, or the whole value when there is no colon. Tolerates
/// a leading `ITERM:` prefix.
pub fn extract_iterm_uuid(value: &str) -> String {
    let value = strip_prefix_token(value, "ITERM")
        .or_else(|| strip_prefix_token(value, "ITERM2"))
        .unwrap_or(value);
    match value.rsplit_once(':') {
        Some((_, uuid)) => uuid.to_string(),
        None => value.to_string(),
    }
}

/// TTY value with an optional `/dev/` prefix stripped and an optional
/// numeric `:pid` suffix stripped.
fn tty_base(value: &str) -> &str {
    let value = value.strip_prefix("/dev/").unwrap_or(value);
    match value.rsplit_once(':') {
        Some((base, suffix)) if suffix.parse::<u32>().is_ok() => base,
        _ => value,
    }
}

/// Numeric `:pid` suffix of a TTY value, if present.
fn tty_pid_suffix(value: &str) -> Option<u32> {
    let (_, suffix) = value.rsplit_once(':')?;
    suffix.parse::<u32>().ok()
}

/// Canonical key equality.
///
/// (i) exact string match; else (ii) unwrap `DISCOVERED:`; (iii) both
/// `ITERM` → compare UUIDs; (iv) both `TTY` → compare base paths; (v) both
/// `PID` → compare pids; (vi) otherwise exact value match. Empty key on
/// either side never matches.
pub fn matches(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let pa = parse_key(a);
    let pb = parse_key(b);

    if pa.prefix != pb.prefix {
        return false;
    }
    match pa.prefix {
        KeyPrefix::Iterm => match (&pa.uuid, &pb.uuid) {
            (Some(ua), Some(ub)) => !ua.is_empty() && ua == ub,
            _ => false,
        },
        KeyPrefix::Tty => match (&pa.tty, &pb.tty) {
            (Some(ta), Some(tb)) => !ta.is_empty() && ta == tb,
            _ => false,
        },
        KeyPrefix::Pid => match (pa.pid, pb.pid) {
            (Some(na), Some(nb)) => na == nb,
            _ => false,
        },
        _ => !pa.value.is_empty() && pa.value == pb.value,
    }
}
