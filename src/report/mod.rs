use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===================================================================
// Verdicts — the compliance half of a check
// ===================================================================

/// One outcome for a single policy rule. The model is asked for
/// PASS/FAIL/SKIP but the token is kept raw so anything else lands in an
/// "unknown" bucket instead of failing the whole check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Verdict {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub reasoning: String,
}

/// The full reply to one compliance check: verdicts in model order plus a
/// one-paragraph summary. Every field is defaulted, so a reply that omits
/// one formats as empty rather than erroring.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckResult {
    #[serde(default)]
    pub verdicts: Vec<Verdict>,
    #[serde(default)]
    pub summary: String,
}

impl CheckResult {
    /// Build a result from an arbitrary decoded value without failing:
    /// a non-object yields the empty result, verdict entries that are not
    /// objects are dropped, and missing fields take their defaults.
    pub fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::default();
        };
        Self {
            verdicts: keep_valid(obj.get("verdicts")),
            summary: obj
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Tallies per verdict token.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerdictCounts {
    pub pass: usize,
    pub fail: usize,
    pub skip: usize,
    pub unknown: usize,
}

impl VerdictCounts {
    pub fn tally(verdicts: &[Verdict]) -> Self {
        let mut counts = Self::default();
        for v in verdicts {
            match v.verdict.as_str() {
                "PASS" => counts.pass += 1,
                "FAIL" => counts.fail += 1,
                "SKIP" => counts.skip += 1,
                _ => counts.unknown += 1,
            }
        }
        counts
    }

    /// Denominator for "N/T passed". Unknown tokens count toward the total
    /// so a malformed verdict cannot silently improve the score.
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.skip + self.unknown
    }
}

/// Group verdicts by category, preserving the order of first appearance.
/// Verdicts without a category land under "General".
pub fn group_by_category(verdicts: &[Verdict]) -> Vec<(&str, Vec<&Verdict>)> {
    let mut groups: Vec<(&str, Vec<&Verdict>)> = Vec::new();
    for v in verdicts {
        let category = v.category.as_deref().unwrap_or("General");
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(v),
            None => groups.push((category, vec![v])),
        }
    }
    groups
}

// ===================================================================
// Insights — the coaching half of a check
// ===================================================================

/// A positive or improvable interaction pattern, with a transcript citation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PatternInsight {
    pub pattern: String,
    pub evidence: String,
}

/// A free-form observation, with a transcript citation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Observation {
    pub observation: String,
    pub evidence: String,
}

/// A validated insight reply. All three lists are always present; the
/// worst malformed input produces the all-empty report, never an error.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InsightReport {
    pub what_went_well: Vec<PatternInsight>,
    pub what_to_improve: Vec<PatternInsight>,
    pub notable: Vec<Observation>,
}

impl InsightReport {
    /// Build a report from an arbitrary decoded value. Items missing a
    /// required field (or that are not objects at all) are dropped;
    /// surviving items keep their original order. Unknown top-level fields
    /// are ignored.
    pub fn from_value(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::default();
        };
        Self {
            what_went_well: keep_valid(obj.get("what_went_well")),
            what_to_improve: keep_valid(obj.get("what_to_improve")),
            notable: keep_valid(obj.get("notable")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.what_went_well.is_empty() && self.what_to_improve.is_empty() && self.notable.is_empty()
    }
}

/// Filter a list field down to the items that deserialize into the slot's
/// required shape. A missing or non-array field is simply empty.
fn keep_valid<T: DeserializeOwned>(field: Option<&Value>) -> Vec<T> {
    field
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

// ===================================================================
// Formatters — pure string builders, no recovery logic
// ===================================================================

fn terminal_icon(token: &str) -> char {
    match token {
        "PASS" => '+',
        "FAIL" => 'x',
        "SKIP" => '-',
        _ => '?',
    }
}

fn markdown_icon(token: &str) -> &'static str {
    match token {
        "PASS" => "\u{2705}",
        "FAIL" => "\u{274c}",
        "SKIP" => "\u{23ed}\u{fe0f}",
        _ => "\u{2753}",
    }
}

/// Compact terminal rendering of one check: one line per verdict (FAIL
/// lines carry the reasoning, others just the rule) and a pass tally.
pub fn format_verdicts(result: &CheckResult) -> String {
    let counts = VerdictCounts::tally(&result.verdicts);
    let mut lines = Vec::new();

    for v in &result.verdicts {
        let icon = terminal_icon(&v.verdict);
        if v.verdict == "FAIL" {
            lines.push(format!("  [{icon}] {}: {} - {}", v.verdict, v.rule, v.reasoning));
        } else {
            lines.push(format!("  [{icon}] {}: {}", v.verdict, v.rule));
        }
    }

    lines.push(String::new());
    lines.push(format!("  {}/{} passed", counts.pass, counts.total()));

    lines.join("\n")
}

/// Terminal rendering of an insight report. Empty sections are omitted.
pub fn format_insights(report: &InsightReport) -> String {
    let mut lines = vec![String::new(), "--- Session Insights ---".to_string(), String::new()];

    if !report.what_went_well.is_empty() {
        lines.push("What went well:".to_string());
        for item in &report.what_went_well {
            lines.push(format!("  - {}", item.pattern));
            lines.push(format!("    Evidence: {}", item.evidence));
        }
        lines.push(String::new());
    }

    if !report.what_to_improve.is_empty() {
        lines.push("What to improve:".to_string());
        for item in &report.what_to_improve {
            lines.push(format!("  - {}", item.pattern));
            lines.push(format!("    Evidence: {}", item.evidence));
        }
        lines.push(String::new());
    }

    if !report.notable.is_empty() {
        lines.push("Notable:".to_string());
        for item in &report.notable {
            lines.push(format!("  - {}", item.observation));
            lines.push(format!("    Evidence: {}", item.evidence));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// One checked session in a multi-session report.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub label: String,
    pub result: CheckResult,
}

/// Markdown report over multiple sessions: per-session category groups,
/// per-session scores, and summed totals at the end.
pub fn format_report_markdown(sessions: &[SessionReport]) -> String {
    let mut lines = vec!["# sesslint Compliance Report".to_string(), String::new()];

    let mut total = VerdictCounts::default();

    for entry in sessions {
        let counts = VerdictCounts::tally(&entry.result.verdicts);

        lines.push(format!("## {}", entry.label));
        lines.push(String::new());

        for (category, members) in group_by_category(&entry.result.verdicts) {
            lines.push(format!("### {category}"));
            lines.push(String::new());
            for v in members {
                let icon = markdown_icon(&v.verdict);
                lines.push(format!("- {icon} **{}**: {}", v.verdict, v.rule));
                lines.push(format!("  - {}", v.reasoning));
            }
            lines.push(String::new());
        }

        total.pass += counts.pass;
        total.fail += counts.fail;
        total.skip += counts.skip;
        total.unknown += counts.unknown;

        lines.push(String::new());
        lines.push(format!(
            "**Score: {} passed, {} failed, {} skipped**",
            counts.pass, counts.fail, counts.skip
        ));
        lines.push(String::new());

        if !entry.result.summary.is_empty() {
            lines.push(format!("> {}", entry.result.summary));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.push("## Overall".to_string());
    lines.push(format!("- Sessions checked: {}", sessions.len()));
    lines.push(format!(
        "- Total: {} passed, {} failed, {} skipped",
        total.pass, total.fail, total.skip
    ));
    lines.push(String::new());

    lines.join("\n")
}
