use crate::config::Dirs;
use anyhow::{Context, Result, bail};
use std::env;
use std::fs;
use std::process::Command;

/// Embedded persona templates installed by `init`.
const PERSONAS: &[(&str, &str)] = &[
    ("self", include_str!("../templates/policy_self.md")),
    ("team", include_str!("../templates/policy_team.md")),
    ("parent", include_str!("../templates/policy_parent.md")),
];

pub fn persona_names() -> Vec<&'static str> {
    PERSONAS.iter().map(|(name, _)| *name).collect()
}

pub fn policy_exists(dirs: &Dirs) -> bool {
    dirs.policy_path().exists()
}

/// Install the template policy for the given persona as `policy.md`,
/// overwriting whatever is there.
pub fn install_policy(dirs: &Dirs, persona: &str) -> Result<()> {
    let Some((_, template)) = PERSONAS.iter().find(|(name, _)| *name == persona) else {
        bail!(
            "unknown persona: {persona}. Choose from: {}",
            persona_names().join(", ")
        );
    };
    dirs.ensure_config_dir()?;
    let path = dirs.policy_path();
    fs::write(&path, template).with_context(|| format!("writing {}", path.display()))
}

/// Read the current policy text.
pub fn read_policy(dirs: &Dirs) -> Result<String> {
    let path = dirs.policy_path();
    match fs::read_to_string(&path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("no policy found. Run 'sesslint init' to create one.")
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Open `policy.md` in the user's editor ($EDITOR, then $VISUAL, then nano).
pub fn open_policy_in_editor(dirs: &Dirs) -> Result<()> {
    let path = dirs.policy_path();
    if !path.exists() {
        bail!("no policy found. Run 'sesslint init' to create one.");
    }
    let editor = env::var("EDITOR")
        .or_else(|_| env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());
    let status = Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("launching editor '{editor}'"))?;
    if !status.success() {
        bail!("editor '{editor}' exited with {status}");
    }
    Ok(())
}
