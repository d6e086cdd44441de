use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::fs;
use std::io;
use std::path::Path;

/// Command registered under the SessionEnd hook. `--quiet` because Claude
/// Code suppresses hook stdout; the one-line outcome goes to stderr.
const HOOK_COMMAND: &str = "sesslint check --last --quiet";

/// Substring identifying a sesslint hook entry of any vintage.
const HOOK_MARKER: &str = "sesslint check";

fn read_settings(path: &Path) -> Result<Value> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(json!({})),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn write_settings(path: &Path, settings: &Value) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("serializing settings")?;
    fs::write(path, json + "\n").with_context(|| format!("writing {}", path.display()))
}

fn is_sesslint_entry(entry: &Value) -> bool {
    entry
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks.iter().any(|h| {
                h.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.contains(HOOK_MARKER))
            })
        })
}

/// Whether the sesslint SessionEnd hook is present in the settings file.
pub fn is_hook_installed(path: &Path) -> Result<bool> {
    let settings = read_settings(path)?;
    Ok(settings
        .pointer("/hooks/SessionEnd")
        .and_then(Value::as_array)
        .is_some_and(|entries| entries.iter().any(is_sesslint_entry)))
}

/// Add the SessionEnd hook, replacing any previous sesslint entry.
/// Unrelated settings and hooks are left untouched. Returns `true` when an
/// older entry was replaced rather than freshly installed.
pub fn install_hook(path: &Path) -> Result<bool> {
    let mut settings = read_settings(path)?;
    let Value::Object(root) = &mut settings else {
        bail!("{} is not a JSON object", path.display());
    };

    let hooks = root.entry("hooks").or_insert_with(|| json!({}));
    let Value::Object(hooks) = hooks else {
        bail!("'hooks' in {} is not a JSON object", path.display());
    };
    let session_end = hooks.entry("SessionEnd").or_insert_with(|| json!([]));
    let Value::Array(entries) = session_end else {
        bail!("'hooks.SessionEnd' in {} is not a JSON array", path.display());
    };

    let before = entries.len();
    entries.retain(|entry| !is_sesslint_entry(entry));
    let replaced = entries.len() != before;

    entries.push(json!({
        "matcher": "",
        "hooks": [ { "type": "command", "command": HOOK_COMMAND } ]
    }));

    write_settings(path, &settings)?;
    Ok(replaced)
}

/// Remove the sesslint SessionEnd hook. Returns `false` when nothing was
/// installed (the settings file is then left untouched).
pub fn uninstall_hook(path: &Path) -> Result<bool> {
    if !is_hook_installed(path)? {
        return Ok(false);
    }
    let mut settings = read_settings(path)?;
    if let Some(entries) = settings
        .pointer_mut("/hooks/SessionEnd")
        .and_then(Value::as_array_mut)
    {
        entries.retain(|entry| !is_sesslint_entry(entry));
    }
    write_settings(path, &settings)?;
    Ok(true)
}
