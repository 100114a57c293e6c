//! Plan-mode and plan-reference detection over transcripts.
//!
//! Two strategies run in order. A raw byte scan finds the last
//! `EnterPlanMode`/`ExitPlanMode` tool names in the file — the parsed view
//! only retains the first tool-use block per assistant message, and
//! `ExitPlanMode` is often bundled with real edits and dropped, so raw text
//! is the authority for "currently planning". Everything else (execution
//! trigger, plan refs, completions) runs over parsed entries.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use jacques_protocol::SessionMode;

use super::transcript::{read_entries, TranscriptEntry};

/// Phrases that mark a plan-execution kickoff message.
const EXECUTION_TRIGGERS: &[&str] = &[
    "implement the following plan:",
    "here is the plan:",
    "follow this plan:",
];

/// Minimum plan-body length after a trigger phrase.
const MIN_PLAN_BODY_LEN: usize = 100;

/// Extensions that disqualify a `Write` target from being a plan document.
const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "rs", "go", "java", "c", "h", "cpp", "json", "yaml", "yml",
    "toml", "sh", "css", "html", "sql", "rb", "swift", "kt",
];

static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let phrases = EXECUTION_TRIGGERS
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){}", phrases)).expect("trigger regex is valid")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6} ").expect("heading regex is valid"));

/// Mode derived from parsed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedMode {
    /// An `EnterPlanMode` interval is still open.
    Planning,
    /// The conversation is executing a previously produced plan.
    Execution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRefSource {
    Embedded,
    Write,
    Agent,
}

/// A plan document referenced by the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRef {
    pub title: String,
    pub path: Option<PathBuf>,
    pub source: PlanRefSource,
    pub agent_id: Option<String>,
}

/// One closed `EnterPlanMode` → `ExitPlanMode` interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCompletion {
    pub title: String,
}

/// Aggregate result of parsed-entry detection.
#[derive(Debug, Clone, Default)]
pub struct ModeDetection {
    pub mode: Option<DetectedMode>,
    pub plan_refs: Vec<PlanRef>,
    pub plan_mode_completions: Vec<PlanCompletion>,
    /// Whether any Enter→Exit cycle closed.
    pub had_plan_cycle: bool,
}

/// Last byte offset of any spacing variant of `"name":"<tool>"`.
fn last_tool_name_offset(raw: &str, tool: &str) -> Option<usize> {
    let tight = format!("\"name\":\"{}\"", tool);
    let spaced = format!("\"name\": \"{}\"", tool);
    match (raw.rfind(&tight), raw.rfind(&spaced)) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Raw-text planning check: the last `EnterPlanMode` wins over the last
/// `ExitPlanMode`.
pub fn raw_scan_is_planning(raw: &str) -> bool {
    let last_enter = last_tool_name_offset(raw, "EnterPlanMode");
    let last_exit = last_tool_name_offset(raw, "ExitPlanMode");
    match (last_enter, last_exit) {
        (Some(enter), Some(exit)) => enter > exit,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Recompute a session's mode from its transcript file.
///
/// Returns `None` when nothing conclusive was found (mode unchanged).
pub fn detect_mode_from_file(path: &Path) -> Option<SessionMode> {
    let raw = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(
                event = "core.mode.transcript_unreadable",
                path = %path.display(),
                error = %e,
            );
            return None;
        }
    };

    if raw_scan_is_planning(&raw) {
        return Some(SessionMode::Planning);
    }

    let entries = read_entries(path).ok()?;
    let detection = detect_mode_and_plans(&entries);
    match detection.mode {
        Some(DetectedMode::Planning) => Some(SessionMode::Planning),
        // Execution is interval metadata for plan tracking, not a stored
        // session mode; a closed plan cycle clears stale `planning`.
        _ if detection.had_plan_cycle => Some(SessionMode::Default),
        _ => None,
    }
}

/// Parsed-entry detection: in-plan-mode flag, execution trigger, plan refs
/// from three sources, and completion titling.
pub fn detect_mode_and_plans(entries: &[TranscriptEntry]) -> ModeDetection {
    let mut detection = ModeDetection::default();
    let mut in_plan_mode = false;
    // Refs observed inside the currently open plan interval.
    let mut interval_write_title: Option<String> = None;
    let mut interval_agent_title: Option<String> = None;
    let mut seen_agent_ids: Vec<String> = Vec::new();
    let mut execution_seen = false;
    let mut real_user_message_seen = false;

    for entry in entries {
        // Agent-progress plan references, deduped by agent id.
        if entry.entry_type.as_deref() == Some("agent_progress")
            && entry.agent_type.as_deref() == Some("Plan")
        {
            let agent_id = entry.agent_id.clone().unwrap_or_default();
            if !seen_agent_ids.contains(&agent_id) {
                seen_agent_ids.push(agent_id.clone());
                let title = entry
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Plan".to_string());
                if in_plan_mode && interval_agent_title.is_none() {
                    interval_agent_title = Some(title.clone());
                }
                detection.plan_refs.push(PlanRef {
                    title,
                    path: None,
                    source: PlanRefSource::Agent,
                    agent_id: Some(agent_id),
                });
            }
        }

        // Tool-use driven state.
        for block in entry.tool_uses() {
            match block.name.as_deref() {
                Some("EnterPlanMode") => {
                    in_plan_mode = true;
                    interval_write_title = None;
                    interval_agent_title = None;
                }
                Some("ExitPlanMode") => {
                    if in_plan_mode {
                        in_plan_mode = false;
                        detection.had_plan_cycle = true;
                        let title = interval_write_title
                            .take()
                            .or_else(|| interval_agent_title.take())
                            .unwrap_or_else(|| "Plan Ready".to_string());
                        detection.plan_mode_completions.push(PlanCompletion { title });
                    }
                }
                Some("Write") => {
                    if let Some(plan_ref) = write_plan_ref(block.input.as_ref()) {
                        if in_plan_mode && interval_write_title.is_none() {
                            interval_write_title = Some(plan_ref.title.clone());
                        }
                        detection.plan_refs.push(plan_ref);
                    }
                }
                _ => {}
            }
        }

        // Execution trigger: the first user message past internal command
        // echoes decides.
        if !execution_seen
            && !real_user_message_seen
            && let Some(text) = entry.user_text()
        {
            let trimmed = text.trim_start();
            if trimmed.starts_with("<command-") || trimmed.starts_with("<local-command") {
                continue;
            }
            real_user_message_seen = true;
            if let Some(found) = TRIGGER_RE.find(&text) {
                let body = &text[found.end()..];
                if body.len() >= MIN_PLAN_BODY_LEN && HEADING_RE.is_match(body) {
                    execution_seen = true;
                    detection.plan_refs.push(PlanRef {
                        title: embedded_plan_title(body),
                        path: None,
                        source: PlanRefSource::Embedded,
                        agent_id: None,
                    });
                }
            }
        }
    }

    detection.mode = if in_plan_mode {
        Some(DetectedMode::Planning)
    } else if execution_seen {
        Some(DetectedMode::Execution)
    } else {
        None
    };
    detection
}

/// Title of an embedded plan body: its first heading line, else a stub.
fn embedded_plan_title(body: &str) -> String {
    body.lines()
        .find(|line| HEADING_RE.is_match(line))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "Plan".to_string())
}

/// Classify a `Write` tool input as a plan document reference.
fn write_plan_ref(input: Option<&serde_json::Value>) -> Option<PlanRef> {
    let input = input?;
    let file_path = input.get("file_path")?.as_str()?;
    if !is_plan_document(file_path) {
        return None;
    }
    let path = PathBuf::from(file_path);
    let content = input.get("content").and_then(|c| c.as_str()).unwrap_or("");
    let title = content
        .lines()
        .find(|line| HEADING_RE.is_match(line))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "Plan".to_string())
        });
    Some(PlanRef {
        title,
        path: Some(path),
        source: PlanRefSource::Write,
        agent_id: None,
    })
}

/// Whether a written file path looks like a plan document.
///
/// Markdown only; either under `.jacques/plans/` or carrying `plan` in the
/// file name. Code source files never qualify.
pub fn is_plan_document(file_path: &str) -> bool {
    let path = Path::new(file_path);
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    if CODE_EXTENSIONS
        .iter()
        .any(|code| extension.as_deref() == Some(code))
    {
        return false;
    }
    if extension.as_deref() != Some("md") {
        return false;
    }
    if file_path.contains(".jacques/plans/") {
        return true;
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase().contains("plan"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use_entry(tool: &str) -> TranscriptEntry {
        serde_json::from_str(&format!(
            r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","name":"{}","input":{{}}}}]}}}}"#,
            tool
        ))
        .unwrap()
    }

    fn write_entry(file_path: &str, content: &str) -> TranscriptEntry {
        serde_json::from_str(
            &serde_json::json!({
                "type": "assistant",
                "message": {"content": [
                    {"type": "tool_use", "name": "Write",
                     "input": {"file_path": file_path, "content": content}}
                ]}
            })
            .to_string(),
        )
        .unwrap()
    }

    fn user_entry(text: &str) -> TranscriptEntry {
        serde_json::from_str(
            &serde_json::json!({
                "type": "user",
                "message": {"role": "user", "content": text}
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_raw_scan_enter_after_exit_is_planning() {
        let raw = r#"... "name":"EnterPlanMode" ... "name":"ExitPlanMode" ... "name":"EnterPlanMode" ..."#;
        assert!(raw_scan_is_planning(raw));
    }

    #[test]
    fn test_raw_scan_exit_after_enter_is_not_planning() {
        let raw = r#"... "name":"EnterPlanMode" ... "name":"ExitPlanMode" ..."#;
        assert!(!raw_scan_is_planning(raw));
    }

    #[test]
    fn test_raw_scan_tolerates_space_after_colon() {
        let raw = r#"... "name": "EnterPlanMode" ..."#;
        assert!(raw_scan_is_planning(raw));
    }

    #[test]
    fn test_detect_mode_from_file_scenarios() {
        let tmp = tempfile::TempDir::new().unwrap();

        // Enter then Exit, no later Enter: default (stale planning cleared).
        let closed = tmp.path().join("closed.jsonl");
        std::fs::write(
            &closed,
            concat!(
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"EnterPlanMode","input":{}}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"ExitPlanMode","input":{}}]}}"#,
                "\n",
            ),
        )
        .unwrap();
        assert_eq!(detect_mode_from_file(&closed), Some(SessionMode::Default));

        // A later Enter with no following Exit: planning.
        let open = tmp.path().join("open.jsonl");
        std::fs::write(
            &open,
            concat!(
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"EnterPlanMode","input":{}}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"ExitPlanMode","input":{}}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"EnterPlanMode","input":{}}]}}"#,
                "\n",
            ),
        )
        .unwrap();
        assert_eq!(detect_mode_from_file(&open), Some(SessionMode::Planning));

        // No plan markers at all: inconclusive.
        let plain = tmp.path().join("plain.jsonl");
        std::fs::write(&plain, "{\"type\":\"user\",\"message\":{\"content\":\"hi\"}}\n").unwrap();
        assert_eq!(detect_mode_from_file(&plain), None);
    }

    #[test]
    fn test_open_interval_is_planning() {
        let entries = vec![tool_use_entry("EnterPlanMode")];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.mode, Some(DetectedMode::Planning));
        assert!(!detection.had_plan_cycle);
    }

    #[test]
    fn test_completion_titled_by_write_ref() {
        let entries = vec![
            tool_use_entry("EnterPlanMode"),
            write_entry("/w/.jacques/plans/auth.md", "# Auth Plan\n\ndetails"),
            tool_use_entry("ExitPlanMode"),
        ];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.plan_mode_completions.len(), 1);
        assert_eq!(detection.plan_mode_completions[0].title, "Auth Plan");
        assert!(detection.had_plan_cycle);
    }

    #[test]
    fn test_completion_falls_back_to_plan_ready() {
        let entries = vec![tool_use_entry("EnterPlanMode"), tool_use_entry("ExitPlanMode")];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.plan_mode_completions[0].title, "Plan Ready");
    }

    #[test]
    fn test_agent_refs_deduped_by_agent_id() {
        let agent: TranscriptEntry = serde_json::from_str(
            r#"{"type":"agent_progress","agentType":"Plan","agentId":"a1","title":"Refactor Plan"}"#,
        )
        .unwrap();
        let entries = vec![agent.clone(), agent];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.plan_refs.len(), 1);
        assert_eq!(detection.plan_refs[0].title, "Refactor Plan");
        assert_eq!(detection.plan_refs[0].source, PlanRefSource::Agent);
    }

    #[test]
    fn test_execution_trigger_requires_heading_and_length() {
        let plan_body = format!("\n# The Plan\n{}", "x".repeat(120));
        let entries = vec![user_entry(&format!(
            "Implement the following plan:{}",
            plan_body
        ))];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.mode, Some(DetectedMode::Execution));
        assert_eq!(detection.plan_refs[0].title, "The Plan");
        assert_eq!(detection.plan_refs[0].source, PlanRefSource::Embedded);

        // Too short: no trigger.
        let entries = vec![user_entry("implement the following plan:\n# Hi")];
        assert_eq!(detect_mode_and_plans(&entries).mode, None);

        // No heading: no trigger.
        let entries = vec![user_entry(&format!(
            "implement the following plan: {}",
            "y".repeat(200)
        ))];
        assert_eq!(detect_mode_and_plans(&entries).mode, None);
    }

    #[test]
    fn test_execution_trigger_skips_command_echoes() {
        let plan_body = format!("\n# The Plan\n{}", "x".repeat(120));
        let entries = vec![
            user_entry("<command-name>/clear</command-name>"),
            user_entry(&format!("here is the plan:{}", plan_body)),
        ];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.mode, Some(DetectedMode::Execution));
    }

    #[test]
    fn test_execution_trigger_only_first_real_message_counts() {
        let plan_body = format!("\n# The Plan\n{}", "x".repeat(120));
        let entries = vec![
            user_entry("just chatting"),
            user_entry(&format!("follow this plan:{}", plan_body)),
        ];
        assert_eq!(detect_mode_and_plans(&entries).mode, None);
    }

    #[test]
    fn test_is_plan_document_rules() {
        assert!(is_plan_document("/w/.jacques/plans/anything.md"));
        assert!(is_plan_document("/w/docs/migration-plan.md"));
        assert!(!is_plan_document("/w/docs/notes.md"));
        assert!(!is_plan_document("/w/src/planner.ts"));
        assert!(!is_plan_document("/w/.jacques/plans/script.sh"));
    }

    #[test]
    fn test_write_ref_title_falls_back_to_stem() {
        let entries = vec![
            tool_use_entry("EnterPlanMode"),
            write_entry("/w/.jacques/plans/rollout-plan.md", "no heading here"),
            tool_use_entry("ExitPlanMode"),
        ];
        let detection = detect_mode_and_plans(&entries);
        assert_eq!(detection.plan_mode_completions[0].title, "rollout-plan");
    }
}
