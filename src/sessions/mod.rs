//! Discovery and parsing of Claude Code session logs.
//!
//! Sessions live as JSONL files under `~/.claude/projects/<encoded-path>/`.
//! Parsing is deliberately lenient: a transcript is a stream of
//! independently-decoded lines, and any line (or content block) that does
//! not match a known shape is skipped, never fatal.

use crate::checker::INTERNAL_PROMPT_PREFIXES;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ===================================================================
// Line shapes — the subset of the transcript format this tool reads
// ===================================================================

#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(rename = "type", default)]
    entry_type: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<LogMessage>,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
}

/// `message.content` is a plain string for user text and an array of
/// content blocks for everything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<Block>),
}

/// Known block shapes get a typed variant; anything else (thinking,
/// images, future block types) falls through to raw JSON and is ignored
/// at render time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Block {
    Known(ContentBlock),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        content: Value,
    },
}

// ===================================================================
// Session
// ===================================================================

#[derive(Debug, Clone)]
pub struct Message {
    pub role: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub path: PathBuf,
    /// Derived from the encoded project directory name.
    pub project: String,
    pub cwd: String,
    pub timestamp: String,
    pub messages: Vec<Message>,
}

impl Session {
    /// Human-readable label for the session picker:
    /// `2026-01-05 14:02 | home/user/repo | "first prompt..."` with
    /// graceful fallbacks when pieces are missing.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();

        if !self.timestamp.is_empty() {
            parts.push(format_timestamp(&self.timestamp));
        }

        let project = self.project.replace('-', "/");
        let project = project.trim_start_matches('/');
        if !project.is_empty() {
            parts.push(project.to_string());
        }

        if let Some(first) = self.messages.first() {
            let mut snippet: String =
                first.text.chars().take(60).collect::<String>().replace('\n', " ");
            if first.text.chars().count() > 60 {
                snippet.push_str("...");
            }
            parts.push(format!("\"{snippet}\""));
        }

        if parts.is_empty() {
            self.session_id.chars().take(8).collect()
        } else {
            parts.join(" | ")
        }
    }

    /// Parse this session's JSONL file and populate `messages`, `cwd`,
    /// and the start timestamp. Caps at `max_messages`.
    pub fn parse(&mut self, max_messages: usize) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading session {}", self.path.display()))?;

        let mut messages = Vec::new();
        let mut first_timestamp: Option<String> = None;
        let mut cwd = String::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<LogLine>(line) else {
                continue;
            };

            if cwd.is_empty()
                && let Some(c) = &entry.cwd
                && !c.is_empty()
            {
                cwd = c.clone();
            }

            if !matches!(entry.entry_type.as_deref(), Some("user" | "assistant")) {
                continue;
            }
            let Some(message) = entry.message else {
                continue;
            };
            let (Some(role), Some(content)) = (message.role, message.content) else {
                continue;
            };
            if role.is_empty() {
                continue;
            }
            // Pure tool-result messages are echoes of earlier tool calls.
            if is_pure_tool_result(&content) {
                continue;
            }
            let text = extract_text(&content);
            if text.trim().is_empty() {
                continue;
            }

            let timestamp = entry.timestamp.unwrap_or_default();
            if first_timestamp.is_none() {
                first_timestamp = Some(timestamp.clone());
            }
            messages.push(Message { role, text, timestamp });

            if messages.len() >= max_messages {
                break;
            }
        }

        self.messages = messages;
        self.cwd = cwd;
        self.timestamp = first_timestamp.unwrap_or_default();
        Ok(())
    }
}

fn format_timestamp(ts: &str) -> String {
    match OffsetDateTime::parse(ts, &Rfc3339) {
        Ok(dt) => {
            let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
            dt.format(&fmt)
                .unwrap_or_else(|_| ts.chars().take(16).collect())
        }
        Err(_) => ts.chars().take(16).collect(),
    }
}

fn is_pure_tool_result(content: &MessageContent) -> bool {
    match content {
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .all(|b| matches!(b, Block::Known(ContentBlock::ToolResult { .. }))),
        MessageContent::Text(_) => false,
    }
}

fn extract_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(render_block)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_block(block: &Block) -> Option<String> {
    let block = match block {
        Block::Known(block) => block,
        // Some older transcript lines carry bare strings in content arrays.
        Block::Other(Value::String(s)) => return Some(s.clone()),
        Block::Other(_) => return None,
    };
    match block {
        ContentBlock::Text { text } => Some(text.clone()),
        ContentBlock::ToolUse { name, input } => Some(summarize_tool_use(name, input)),
        ContentBlock::ToolResult { content } => match content.as_str() {
            Some(s) if !s.is_empty() => Some(format!("[Tool Result] {}", truncate(s))),
            _ => None,
        },
    }
}

/// One-line rendering of a tool call, keeping the argument a reader would
/// want to audit (command, path, or pattern).
fn summarize_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or_default();
    match name {
        "Bash" => format!("[Tool: Bash] {}", field("command")),
        "Read" | "Write" | "Edit" => format!("[Tool: {name}] {}", field("file_path")),
        "Grep" => format!("[Tool: Grep] pattern={}", field("pattern")),
        "Glob" => format!("[Tool: Glob] {}", field("pattern")),
        _ => format!("[Tool: {name}]"),
    }
}

fn truncate(s: &str) -> String {
    const LIMIT: usize = 500;
    if s.chars().count() <= LIMIT {
        s.to_string()
    } else {
        let head: String = s.chars().take(LIMIT).collect();
        format!("{head}... (truncated)")
    }
}

// ===================================================================
// Discovery
// ===================================================================

/// Find all session JSONL files under the projects directory, newest
/// first. Skips subagent transcripts and sesslint's own analysis calls.
pub fn discover(projects_dir: &Path) -> Vec<Session> {
    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    collect_jsonl(projects_dir, &mut files);
    files.sort_by_key(|(_, mtime)| Reverse(*mtime));

    files
        .into_iter()
        .filter(|(path, _)| !is_internal_session(path))
        .map(|(path, _)| {
            let project = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let session_id = path
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            Session {
                session_id,
                path,
                project,
                cwd: String::new(),
                timestamp: String::new(),
                messages: Vec::new(),
            }
        })
        .collect()
}

fn collect_jsonl(dir: &Path, out: &mut Vec<(PathBuf, SystemTime)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some("subagents") {
                continue;
            }
            collect_jsonl(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH);
            out.push((path, mtime));
        }
    }
}

/// Whether a JSONL file records one of sesslint's own `claude -p` calls.
/// Decided from the first user message only.
fn is_internal_session(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    for line in io::BufReader::new(file).lines() {
        let Ok(line) = line else {
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<LogLine>(line) else {
            continue;
        };
        if entry.entry_type.as_deref() != Some("user") {
            continue;
        }
        let Some(content) = entry.message.and_then(|m| m.content) else {
            return false;
        };
        let text = match &content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => {
                match blocks.iter().find_map(|b| match b {
                    Block::Known(ContentBlock::Text { text }) => Some(text.clone()),
                    _ => None,
                }) {
                    Some(t) => t,
                    None => return false,
                }
            }
        };
        return INTERNAL_PROMPT_PREFIXES.iter().any(|p| text.starts_with(p));
    }
    false
}

// ===================================================================
// Transcript rendering
// ===================================================================

/// Render a parsed session into the plain-text transcript the analysis
/// prompt consumes.
pub fn format_transcript(session: &Session) -> String {
    let mut lines = Vec::new();
    lines.push(format!("# Session: {}", session.session_id));
    lines.push(format!("Project: {}", session.project));
    if !session.cwd.is_empty() {
        lines.push(format!("Working directory: {}", session.cwd));
    }
    if !session.timestamp.is_empty() {
        lines.push(format!("Started: {}", session.timestamp));
    }
    lines.push(format!("Messages: {}", session.messages.len()));
    lines.push(String::new());

    for msg in &session.messages {
        let role_label = if msg.role == "user" { "USER" } else { "ASSISTANT" };
        lines.push(format!("--- {role_label} ---"));
        lines.push(msg.text.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}
