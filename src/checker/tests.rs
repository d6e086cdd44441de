use super::*;
use crate::config::Config;
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

/// Write an executable shell script standing in for the external CLI.
fn fake_cli(dir: &Path, body: &str) -> String {
    let path = dir.join("claude-fake");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn checker_with(binary: String, timeout_secs: u64) -> Checker {
    let config = Config {
        binary,
        timeout_secs,
        ..Config::default()
    };
    Checker::new(&config)
}

/// A canned reply file the fake CLI cats back, wrapped in the CLI's
/// result envelope the way the real tool wraps its answers.
fn write_enveloped_reply(dir: &Path, inner: &serde_json::Value) -> std::path::PathBuf {
    let envelope = json!({
        "type": "result",
        "result": serde_json::to_string(inner).unwrap(),
        "session_id": "fixture"
    });
    let path = dir.join("reply.json");
    fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();
    path
}

// -------------------------------------------------------------------
// Prompt assembly
// -------------------------------------------------------------------

#[test]
fn prompt_orders_instructions_policy_transcript() {
    let prompt = build_prompt(AUDITOR_INSTRUCTIONS, "POLICY", "the policy", "the transcript")
        .unwrap();
    let instructions = prompt.find("compliance auditor").unwrap();
    let policy = prompt.find("---\nPOLICY:\nthe policy").unwrap();
    let transcript = prompt.find("---\nTRANSCRIPT:\nthe transcript").unwrap();
    assert!(instructions < policy && policy < transcript);
}

#[test]
fn insight_prompt_uses_context_heading() {
    let prompt = build_prompt(
        COACH_INSTRUCTIONS,
        "POLICY (for context on what the team values)",
        "p",
        "t",
    )
    .unwrap();
    assert!(prompt.contains("POLICY (for context on what the team values):\np"));
}

#[test]
fn templates_start_with_their_discovery_prefixes() {
    // sessions::discover matches these prefixes to filter out sesslint's
    // own calls; they must stay in lockstep with the templates.
    assert!(AUDITOR_INSTRUCTIONS.starts_with(INTERNAL_PROMPT_PREFIXES[0]));
    assert!(COACH_INSTRUCTIONS.starts_with(INTERNAL_PROMPT_PREFIXES[1]));
}

// -------------------------------------------------------------------
// Invocation
// -------------------------------------------------------------------

#[test]
fn run_check_recovers_enveloped_reply() {
    let dir = TempDir::new().unwrap();
    let reply = write_enveloped_reply(
        dir.path(),
        &json!({
            "verdicts": [
                { "category": "Security", "rule": "No secrets", "verdict": "PASS",
                  "reasoning": "clean" }
            ],
            "summary": "fine"
        }),
    );
    let bin = fake_cli(
        dir.path(),
        &format!("cat >/dev/null\ncat '{}'", reply.display()),
    );

    let result = checker_with(bin, 30).run_check("transcript", "policy").unwrap();
    assert_eq!(result.verdicts.len(), 1);
    assert_eq!(result.verdicts[0].verdict, "PASS");
    assert_eq!(result.summary, "fine");
}

#[test]
fn prompt_is_delivered_on_stdin() {
    let dir = TempDir::new().unwrap();
    let reply = write_enveloped_reply(dir.path(), &json!({ "verdicts": [], "summary": "ok" }));
    // Only answer if the policy text actually arrived on stdin.
    let bin = fake_cli(
        dir.path(),
        &format!(
            "if grep -q 'rule-text-marker'; then cat '{}'; else echo missing >&2; exit 9; fi",
            reply.display()
        ),
    );

    let result = checker_with(bin, 30)
        .run_check("some transcript", "rule-text-marker")
        .unwrap();
    assert_eq!(result.summary, "ok");
}

#[test]
fn missing_binary_is_distinguished() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("not-there").to_string_lossy().into_owned();
    let err = checker_with(missing, 30)
        .run_check("t", "p")
        .unwrap_err();
    match err.downcast_ref::<CheckError>() {
        Some(CheckError::CliNotFound { .. }) => {}
        other => panic!("expected CliNotFound, got {other:?}"),
    }
}

#[test]
fn available_reflects_binary_presence() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(dir.path(), "exit 0");
    assert!(checker_with(bin, 30).available());

    let missing = dir.path().join("gone").to_string_lossy().into_owned();
    assert!(!checker_with(missing, 30).available());
}

#[test]
fn nonzero_exit_surfaces_stderr() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(dir.path(), "cat >/dev/null\necho 'rate limited' >&2\nexit 3");
    let err = checker_with(bin, 30).run_check("t", "p").unwrap_err();
    match err.downcast_ref::<CheckError>() {
        Some(CheckError::Failed { stderr }) => assert!(stderr.contains("rate limited")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn overrunning_call_times_out() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(dir.path(), "cat >/dev/null\nsleep 10");
    let err = checker_with(bin, 1).run_check("t", "p").unwrap_err();
    match err.downcast_ref::<CheckError>() {
        Some(CheckError::Timeout { secs: 1 }) => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn unrecoverable_output_carries_the_text() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(dir.path(), "cat >/dev/null\necho 'I refuse to answer.'");
    let err = checker_with(bin, 30).run_check("t", "p").unwrap_err();
    match err.downcast_ref::<CheckError>() {
        Some(CheckError::Unparseable(inner)) => {
            assert!(inner.raw.contains("I refuse to answer."));
        }
        other => panic!("expected Unparseable, got {other:?}"),
    }
}

// -------------------------------------------------------------------
// Insights mode
// -------------------------------------------------------------------

#[test]
fn insights_are_validated_and_filtered() {
    let dir = TempDir::new().unwrap();
    let reply = write_enveloped_reply(
        dir.path(),
        &json!({
            "what_went_well": [
                { "pattern": "clear prompts", "evidence": "asked for a plan" },
                { "pattern": "dropped: no evidence" }
            ],
            "what_to_improve": [],
            "notable": [{ "observation": "long session", "evidence": "timestamps" }]
        }),
    );
    let bin = fake_cli(
        dir.path(),
        &format!("cat >/dev/null\ncat '{}'", reply.display()),
    );

    let report = checker_with(bin, 30).extract_insights("t", "p").unwrap();
    assert_eq!(report.what_went_well.len(), 1);
    assert!(report.what_to_improve.is_empty());
    assert_eq!(report.notable.len(), 1);
}

#[test]
fn insight_shape_problems_degrade_to_empty_report() {
    let dir = TempDir::new().unwrap();
    // Valid JSON, wrong shape entirely: still Ok, just empty.
    let bin = fake_cli(dir.path(), "cat >/dev/null\necho '{\"what_went_well\": \"nope\"}'");
    let report = checker_with(bin, 30).extract_insights("t", "p").unwrap();
    assert!(report.is_empty());
}
