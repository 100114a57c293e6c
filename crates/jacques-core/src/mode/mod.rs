//! Session mode detection from transcripts.

pub mod detect;
pub mod transcript;

pub use detect::{
    detect_mode_and_plans, detect_mode_from_file, is_plan_document, raw_scan_is_planning,
    DetectedMode, ModeDetection, PlanCompletion, PlanRef, PlanRefSource,
};
pub use transcript::{read_entries, ContentBlock, MessageContent, TranscriptEntry};
