use crate::config::Config;
use crate::recover::{self, RecoverError};
use crate::report::{CheckResult, InsightReport};
use anyhow::{Context, Result};
use minijinja::{Environment, context};
use std::env;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

// ===================================================================
// Instruction templates
// ===================================================================

/// Compliance-auditor instructions. The response shape described here is
/// what `recover` + `CheckResult::from_value` expect back.
const AUDITOR_INSTRUCTIONS: &str = r#"You are a compliance auditor for AI coding sessions. You will receive a session transcript and a policy document organized into sections (e.g., Security, Developer Engagement, Process Discipline).

Evaluate each section INDEPENDENTLY. A violation in one section must not influence your judgment in another. For each rule, base your verdict only on what is visible in the transcript.

Evaluation guidance:
- For pattern-based rules (credential exposure, destructive commands): scan for specific indicators in user messages, assistant messages, and tool_use blocks (Bash, Write, Edit, Read).
- For behavioral rules (engagement, review discipline): assess the overall conversational pattern across the session, including who drives the work and how the developer responds to AI output.
- For process rules (scope, testing): look at the session arc. Does it have structure, does it stay focused, are there checkpoints?

Return ONLY valid JSON. No markdown fences, no commentary outside the JSON.

Response format:
{
  "verdicts": [
    {
      "category": "Section name",
      "rule": "Rule name",
      "verdict": "PASS" | "FAIL" | "SKIP",
      "reasoning": "One sentence explanation"
    }
  ],
  "summary": "One paragraph overall assessment"
}

Verdict meanings:
- PASS: The session clearly complies with this rule.
- FAIL: The session clearly violates this rule.
- SKIP: The rule is not applicable to this session (e.g., no code was written, so testing rules don't apply).

You MUST evaluate every rule in the policy. Be fair but firm."#;

/// Development-coach instructions for the insights mode.
const COACH_INSTRUCTIONS: &str = r#"You are a development coach reviewing an AI coding session transcript. Your goal is to provide actionable, evidence-based feedback on how the session went.

Focus on:
- Interaction patterns: How did the developer and AI collaborate?
- Decision quality: Were good choices made about scope, approach, and delegation?
- Efficiency: Was time spent well? Were there unnecessary detours?
- Process: Was there testing, review, or structured thinking?

Every insight MUST cite specific evidence from the transcript.

Return ONLY valid JSON. No markdown fences, no commentary outside the JSON.

Response format:
{
  "what_went_well": [
    {"pattern": "Short description of positive pattern", "evidence": "Specific quote or reference from transcript"}
  ],
  "what_to_improve": [
    {"pattern": "Short description of improvement area", "evidence": "Specific quote or reference from transcript"}
  ],
  "notable": [
    {"observation": "Interesting observation", "evidence": "Specific quote or reference from transcript"}
  ]
}

Guidelines:
- Provide 1-3 items per section. Empty sections are fine if nothing applies.
- Be specific and constructive, not generic.
- Base everything on what actually happened in the transcript."#;

/// Opening lines of the two templates above. Sessions whose first user
/// message starts with one of these are sesslint's own analysis calls and
/// must be excluded from discovery.
pub const INTERNAL_PROMPT_PREFIXES: [&str; 2] = [
    "You are a compliance auditor for AI coding sessions.",
    "You are a development coach reviewing an AI coding session transcript.",
];

const PROMPT_TEMPLATE: &str = "{{ instructions }}\n\n---\n{{ policy_heading }}:\n{{ policy }}\n\n---\nTRANSCRIPT:\n{{ transcript }}";

/// Assemble one request prompt: instructions, then the policy under its
/// heading, then the transcript.
fn build_prompt(
    instructions: &str,
    policy_heading: &str,
    policy: &str,
    transcript: &str,
) -> Result<String> {
    let env = Environment::new();
    let tmpl = env
        .template_from_str(PROMPT_TEMPLATE)
        .context("parsing prompt template")?;
    tmpl.render(context! { instructions, policy_heading, policy, transcript })
        .context("rendering prompt template")
}

// ===================================================================
// Error taxonomy — one variant per distinguishable failure
// ===================================================================

#[derive(Debug)]
pub enum CheckError {
    /// The external CLI is not on PATH. A setup problem, not a transient
    /// one; callers print install guidance instead of a generic failure.
    CliNotFound { binary: String },
    /// The call exceeded its bound. Never retried.
    Timeout { secs: u64 },
    /// The external process exited non-zero.
    Failed { stderr: String },
    /// All recovery steps over the process output failed.
    Unparseable(RecoverError),
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::CliNotFound { binary } => write!(
                f,
                "'{binary}' CLI not found. Install Claude Code: https://claude.ai/install.sh"
            ),
            CheckError::Timeout { secs } => {
                write!(f, "analysis call timed out after {secs} seconds")
            }
            CheckError::Failed { stderr } => write!(f, "analysis call failed:\n{stderr}"),
            CheckError::Unparseable(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckError::Unparseable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RecoverError> for CheckError {
    fn from(e: RecoverError) -> Self {
        CheckError::Unparseable(e)
    }
}

// ===================================================================
// Checker — one request/response cycle per call, no state between calls
// ===================================================================

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Checker {
    binary: String,
    model: String,
    timeout: Duration,
}

impl Checker {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Whether the external CLI can be located at all.
    pub fn available(&self) -> bool {
        locate_on_path(&self.binary).is_some()
    }

    /// Run the compliance check for one (transcript, policy) pair.
    pub fn run_check(&self, transcript: &str, policy: &str) -> Result<CheckResult> {
        let prompt = build_prompt(AUDITOR_INSTRUCTIONS, "POLICY", policy, transcript)?;
        let value = self.call(&prompt)?;
        Ok(CheckResult::from_value(&value))
    }

    /// Run the insight extraction for one (transcript, policy) pair.
    /// Shape problems in the reply degrade to an empty report; only
    /// invocation and recovery failures surface as errors.
    pub fn extract_insights(&self, transcript: &str, policy: &str) -> Result<InsightReport> {
        let prompt = build_prompt(
            COACH_INSTRUCTIONS,
            "POLICY (for context on what the team values)",
            policy,
            transcript,
        )?;
        let value = self.call(&prompt)?;
        Ok(InsightReport::from_value(&value))
    }

    /// One full request/response cycle: invoke, then recover JSON.
    fn call(&self, prompt: &str) -> Result<serde_json::Value, CheckError> {
        let raw = self.invoke(prompt)?;
        Ok(recover::recover(&raw)?)
    }

    /// Invoke the external CLI once. The prompt travels on stdin (never
    /// argv), the reply on stdout; a deadline bounds the whole call.
    fn invoke(&self, prompt: &str) -> Result<String, CheckError> {
        if locate_on_path(&self.binary).is_none() {
            return Err(CheckError::CliNotFound {
                binary: self.binary.clone(),
            });
        }

        let mut child = Command::new(&self.binary)
            .arg("-p")
            .args(["--model", &self.model])
            .args(["--output-format", "json"])
            .arg("--no-session-persistence")
            .args(["--settings", r#"{"disableAllHooks": true}"#])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CheckError::CliNotFound {
                    binary: self.binary.clone(),
                },
                _ => CheckError::Failed {
                    stderr: e.to_string(),
                },
            })?;

        // Drain both streams on threads first so a chatty child can't
        // fill a pipe while we're still feeding it the prompt.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            // A broken pipe here means the child died early; the exit
            // status below carries the real error.
            let _ = stdin.write_all(prompt.as_bytes());
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CheckError::Timeout {
                            secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(CheckError::Failed {
                        stderr: e.to_string(),
                    });
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(CheckError::Failed { stderr });
        }
        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut r) = stream {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    })
}

/// Minimal PATH probe. A name containing a separator is treated as a path;
/// a bare name must resolve to a file in some PATH entry.
fn locate_on_path(binary: &str) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests;
