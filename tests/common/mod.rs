use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run the sesslint binary with `$HOME` pointed at a fixture directory.
/// Returns (exit code, stdout, stderr).
pub fn run_sesslint(home: &Path, args: &[&str]) -> (i32, String, String) {
    run_sesslint_with_path(home, args, None)
}

/// Same, with an extra directory prepended to `$PATH` (for fake CLIs).
pub fn run_sesslint_with_path(
    home: &Path,
    args: &[&str],
    extra_path: Option<&Path>,
) -> (i32, String, String) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sesslint"));
    cmd.args(args).env("HOME", home).current_dir(home);
    if let Some(dir) = extra_path {
        let path = format!(
            "{}:{}",
            dir.display(),
            std::env::var("PATH").unwrap_or_default()
        );
        cmd.env("PATH", path);
    }
    let output = cmd.output().expect("failed to run binary");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Drop a minimal policy into `<home>/.sesslint/policy.md`.
pub fn install_policy(home: &Path) {
    let dir = home.join(".sesslint");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("policy.md"),
        "# Policy\n\n## Security\n\n- No credential exposure.\n",
    )
    .unwrap();
}

/// Point the config at a binary that cannot exist, so tool-not-found
/// behavior is deterministic regardless of what's on the host PATH.
pub fn pin_missing_binary(home: &Path) {
    let dir = home.join(".sesslint");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("sesslint.toml"),
        "binary = \"/nonexistent/claude-for-tests\"\n",
    )
    .unwrap();
}

/// Write one session JSONL file under the projects tree.
pub fn write_session(home: &Path, project: &str, name: &str, lines: &[String]) -> PathBuf {
    let dir = home.join(".claude").join("projects").join(project);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

pub fn user_line(text: &str) -> String {
    json!({
        "type": "user",
        "uuid": uuid::Uuid::new_v4().to_string(),
        "timestamp": "2026-01-05T14:02:33Z",
        "cwd": "/home/user/repo",
        "message": { "role": "user", "content": text }
    })
    .to_string()
}

pub fn assistant_text_line(text: &str) -> String {
    json!({
        "type": "assistant",
        "uuid": uuid::Uuid::new_v4().to_string(),
        "timestamp": "2026-01-05T14:02:40Z",
        "cwd": "/home/user/repo",
        "message": { "role": "assistant", "content": [ { "type": "text", "text": text } ] }
    })
    .to_string()
}

/// Install a fake `claude` in `dir` that swallows stdin and answers with
/// `reply` wrapped in the CLI's result envelope.
pub fn fake_claude(dir: &Path, reply: &serde_json::Value) {
    let reply_path = dir.join("reply.json");
    let envelope = json!({
        "type": "result",
        "result": serde_json::to_string(reply).unwrap(),
        "session_id": "fixture"
    });
    fs::write(&reply_path, serde_json::to_string(&envelope).unwrap()).unwrap();

    let script = dir.join("claude");
    fs::write(
        &script,
        format!("#!/bin/sh\ncat >/dev/null\ncat '{}'\n", reply_path.display()),
    )
    .unwrap();
    make_executable(&script);
}

/// Install a fake `claude` in `dir` that fails with the given stderr.
pub fn failing_claude(dir: &Path, stderr: &str) {
    let script = dir.join("claude");
    fs::write(
        &script,
        format!("#!/bin/sh\ncat >/dev/null\necho '{stderr}' >&2\nexit 2\n"),
    )
    .unwrap();
    make_executable(&script);
}

fn make_executable(path: &Path) {
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}
