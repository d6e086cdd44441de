use crate::checker::Checker;
use crate::config::{Config, Dirs};
use crate::report::{self, InsightReport, SessionReport, VerdictCounts};
use crate::sessions::{self, Session};
use crate::{output, policy, settings};
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

pub struct CheckOpts {
    pub last: bool,
    pub quiet: bool,
    pub no_insights: bool,
}

// ===================================================================
// init — setup wizard
// ===================================================================

pub fn init(dirs: &Dirs) -> Result<()> {
    let config = Config::load(&dirs.ensure_config_dir()?)?;
    println!("Welcome to sesslint!\n");

    let checker = Checker::new(&config);
    if checker.available() {
        output::ok("claude CLI found");
    } else {
        output::warn("claude CLI not found");
        output::note("install it: curl -fsSL https://claude.ai/install.sh | bash");
        output::note("sesslint needs the claude CLI to analyze sessions.");
    }
    println!();

    let personas = [
        "self - individual developer checking your own habits",
        "team - team lead enforcing guidelines",
    ];
    let choice = dialoguer::Select::new()
        .with_prompt("Who are you?")
        .items(&personas)
        .default(0)
        .interact()
        .context("reading persona choice")?;
    let persona = if choice == 0 { "self" } else { "team" };

    if policy::policy_exists(dirs) {
        let overwrite = dialoguer::Confirm::new()
            .with_prompt("Policy already exists. Overwrite?")
            .default(false)
            .interact()
            .context("reading overwrite choice")?;
        if overwrite {
            policy::install_policy(dirs, persona)?;
            println!(
                "Installed '{persona}' policy to {}",
                dirs.policy_path().display()
            );
        } else {
            println!("Keeping existing policy.");
        }
    } else {
        policy::install_policy(dirs, persona)?;
        println!(
            "Installed '{persona}' policy to {}",
            dirs.policy_path().display()
        );
    }

    let settings_path = dirs.claude_settings_path();
    if settings::is_hook_installed(&settings_path)? {
        output::ok("SessionEnd hook already installed");
    } else {
        let install = dialoguer::Confirm::new()
            .with_prompt("Install a SessionEnd hook to auto-check after each session?")
            .default(true)
            .interact()
            .context("reading hook choice")?;
        if install {
            settings::install_hook(&settings_path)?;
            println!("Installed SessionEnd hook in {}", settings_path.display());
        } else {
            println!("Skipped hook installation. Add it later with 'sesslint hook install'.");
        }
    }

    println!("\nDone! Run 'sesslint check' to check a session, or 'sesslint policy' to edit your rules.");
    Ok(())
}

// ===================================================================
// check — one session, verdicts plus optional insights
// ===================================================================

pub fn check(dirs: &Dirs, opts: &CheckOpts) -> Result<()> {
    let config = Config::load(&dirs.ensure_config_dir()?)?;
    if !policy::policy_exists(dirs) {
        bail!("no policy found. Run 'sesslint init' first.");
    }

    let mut found = sessions::discover(&dirs.projects_dir());
    if found.is_empty() {
        bail!("no sessions found in {}", dirs.projects_dir().display());
    }

    let mut selected = if opts.last {
        // Already sorted most recent first.
        found.remove(0)
    } else {
        pick_session(&mut found)?
    };

    if !opts.quiet {
        let prefix: String = selected.session_id.chars().take(8).collect();
        output::note(&format!("parsing session {prefix}..."));
    }
    selected.parse(config.max_messages)?;
    if selected.messages.is_empty() {
        println!("Session has no messages.");
        return Ok(());
    }

    let transcript = sessions::format_transcript(&selected);
    let policy_text = policy::read_policy(dirs)?;
    if !opts.quiet {
        output::note(&format!(
            "checking {} messages against policy...",
            selected.messages.len()
        ));
    }

    let checker = Checker::new(&config);
    let want_insights = !opts.quiet && !opts.no_insights;
    let spinner = (!opts.quiet).then(|| analysis_spinner("Analyzing with claude..."));

    // The two calls are independent and equally network-bound; running
    // them on two scoped workers halves the wall-clock wait. They share
    // nothing and fail independently.
    let (verdict_result, insight_result) = if want_insights {
        thread::scope(|scope| {
            let verdicts = scope.spawn(|| checker.run_check(&transcript, &policy_text));
            let insights = scope.spawn(|| checker.extract_insights(&transcript, &policy_text));
            (join_worker(verdicts), Some(join_worker(insights)))
        })
    } else {
        (checker.run_check(&transcript, &policy_text), None)
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    // A verdict failure aborts the check; an insight failure only costs
    // the insights section.
    let result = verdict_result?;
    let insights: Option<InsightReport> = match insight_result {
        Some(Ok(report)) => Some(report),
        Some(Err(e)) => {
            output::note(&format!("insights unavailable: {e}"));
            None
        }
        None => None,
    };

    println!("{}", report::format_verdicts(&result));
    if let Some(insights) = insights
        && !insights.is_empty()
    {
        println!("{}", report::format_insights(&insights));
    }
    Ok(())
}

fn pick_session(found: &mut Vec<Session>) -> Result<Session> {
    let count = found.len().min(20);
    // Shallow parse, just enough for labels.
    for session in &mut found[..count] {
        let _ = session.parse(3);
    }
    let labels: Vec<String> = found[..count].iter().map(Session::label).collect();

    println!("Recent sessions:\n");
    let idx = dialoguer::Select::new()
        .with_prompt("Choose a session")
        .items(&labels)
        .default(0)
        .interact()
        .context("reading session choice")?;
    Ok(found.remove(idx))
}

fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => bail!("analysis worker panicked"),
    }
}

fn analysis_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(st) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(st);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ===================================================================
// report — sequential batch over recent sessions
// ===================================================================

pub fn report(dirs: &Dirs, count: Option<usize>, outfile: Option<PathBuf>) -> Result<()> {
    let config = Config::load(&dirs.ensure_config_dir()?)?;
    if !policy::policy_exists(dirs) {
        bail!("no policy found. Run 'sesslint init' first.");
    }

    let found = sessions::discover(&dirs.projects_dir());
    if found.is_empty() {
        bail!("no sessions found in {}", dirs.projects_dir().display());
    }

    let count = count.unwrap_or(config.report_count);
    let to_check: Vec<Session> = found.into_iter().take(count).collect();
    let total = to_check.len();
    let policy_text = policy::read_policy(dirs)?;
    let checker = Checker::new(&config);

    let mut results: Vec<SessionReport> = Vec::new();

    for (i, mut session) in to_check.into_iter().enumerate() {
        if let Err(e) = session.parse(config.max_messages) {
            eprintln!("  Error: {e:#}");
            continue;
        }
        if session.messages.is_empty() {
            continue;
        }
        let label = session.label();
        let transcript = sessions::format_transcript(&session);

        let spinner = analysis_spinner(&format!("[{}/{total}] Checking {label}...", i + 1));
        let outcome = checker.run_check(&transcript, &policy_text);
        spinner.finish_and_clear();

        // One bad session must not sink the batch.
        match outcome {
            Ok(result) => {
                let counts = VerdictCounts::tally(&result.verdicts);
                println!("  -> {} passed, {} failed", counts.pass, counts.fail);
                results.push(SessionReport { label, result });
            }
            Err(e) => eprintln!("  Error: {e:#}"),
        }
    }

    if results.is_empty() {
        println!("No sessions had messages to check.");
        return Ok(());
    }

    println!("\nChecked {} sessions.", results.len());
    let total_fail: usize = results
        .iter()
        .map(|r| VerdictCounts::tally(&r.result.verdicts).fail)
        .sum();
    if total_fail == 0 {
        println!("All clear: no policy violations found.");
    } else {
        println!("Found {total_fail} total violation(s) across sessions.");
    }

    let md = report::format_report_markdown(&results);
    let outfile = match outfile {
        Some(path) => path,
        None => PathBuf::from(format!("sesslint-report-{}.md", file_stamp()?)),
    };
    fs::write(&outfile, md).with_context(|| format!("writing {}", outfile.display()))?;
    println!("\nReport saved to {}", outfile.display());
    Ok(())
}

fn file_stamp() -> Result<String> {
    let fmt = format_description!("[year][month][day]-[hour][minute][second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .context("formatting report timestamp")
}

// ===================================================================
// policy / hook
// ===================================================================

pub fn edit_policy(dirs: &Dirs) -> Result<()> {
    policy::open_policy_in_editor(dirs)
}

pub fn hook_install(dirs: &Dirs) -> Result<()> {
    let path = dirs.claude_settings_path();
    let replaced = settings::install_hook(&path)?;
    if replaced {
        println!("Updated sesslint SessionEnd hook in {}", path.display());
    } else {
        println!("Installed SessionEnd hook in {}", path.display());
    }
    Ok(())
}

pub fn hook_uninstall(dirs: &Dirs) -> Result<()> {
    if settings::uninstall_hook(&dirs.claude_settings_path())? {
        println!("Removed sesslint SessionEnd hook.");
    } else {
        println!("sesslint hook is not installed.");
    }
    Ok(())
}
