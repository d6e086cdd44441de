use super::*;
use serde_json::json;

fn sample() -> Value {
    json!({
        "verdicts": [
            { "category": "Security", "rule": "No secrets", "verdict": "PASS",
              "reasoning": "No credentials appear in the transcript." }
        ],
        "summary": "Clean session."
    })
}

#[test]
fn direct_json_decodes_unchanged() {
    let raw = serde_json::to_string(&sample()).unwrap();
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn direct_json_with_surrounding_whitespace() {
    let raw = format!("\n\n  {}  \n", serde_json::to_string(&sample()).unwrap());
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn envelope_round_trip() {
    let inner = serde_json::to_string(&sample()).unwrap();
    let raw = serde_json::to_string(&json!({
        "type": "result",
        "result": inner,
        "session_id": "abc"
    }))
    .unwrap();
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn envelope_with_padded_result() {
    let inner = format!("\n  {}\n", serde_json::to_string(&sample()).unwrap());
    let raw = serde_json::to_string(&json!({ "result": inner })).unwrap();
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn envelope_with_non_string_result_falls_through() {
    // `result` holding the object directly (not a string) is not the
    // envelope shape; the whole text still decodes at the direct step.
    let raw = serde_json::to_string(&json!({ "result": sample() })).unwrap();
    assert_eq!(recover(&raw).unwrap(), json!({ "result": sample() }));
}

#[test]
fn fenced_with_json_tag() {
    let inner = serde_json::to_string_pretty(&sample()).unwrap();
    let raw = format!("```json\n{inner}\n```");
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn fenced_without_tag() {
    let inner = serde_json::to_string(&sample()).unwrap();
    let raw = format!("```\n{inner}\n```");
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn fenced_with_uppercase_tag() {
    let inner = serde_json::to_string(&sample()).unwrap();
    let raw = format!("```JSON\n{inner}\n```");
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn fenced_with_leading_and_trailing_prose() {
    let inner = serde_json::to_string(&sample()).unwrap();
    let raw = format!("Here is my analysis:\n\n```json\n{inner}\n```\n\nLet me know if you need more.");
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn envelope_whose_result_is_fenced_and_prefixed() {
    // Both wrappers at once: an envelope whose result field is prose plus a
    // fenced block. The chain must peel both layers.
    let inner = serde_json::to_string(&sample()).unwrap();
    let fenced = format!("  Sure, here you go:\n```json\n{inner}\n```");
    let raw = serde_json::to_string(&json!({ "result": fenced })).unwrap();
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn brace_rescue_with_prose_and_no_fence() {
    let inner = serde_json::to_string(&sample()).unwrap();
    let raw = format!("The verdicts are as follows: {inner} — end of report.");
    assert_eq!(recover(&raw).unwrap(), sample());
}

#[test]
fn brace_rescue_spans_outermost_pair() {
    // A nested object must not shadow the outer one.
    let raw = r#"noise {"outer": {"inner": 1}, "k": 2} noise"#;
    assert_eq!(
        recover(raw).unwrap(),
        json!({ "outer": { "inner": 1 }, "k": 2 })
    );
}

#[test]
fn unrecoverable_text_raises_with_text_attached() {
    let raw = "I could not produce a verdict for this session.";
    let err = recover(raw).unwrap_err();
    assert_eq!(err.raw, raw);
    assert!(err.to_string().contains(raw));
}

#[test]
fn unbalanced_braces_raise() {
    let err = recover("} nothing useful {").unwrap_err();
    assert!(err.to_string().contains("nothing useful"));
}

#[test]
fn invalid_json_between_braces_raises() {
    assert!(recover("prefix { not json at all } suffix").is_err());
}

#[test]
fn empty_input_raises() {
    assert!(recover("").is_err());
    assert!(recover("   \n  ").is_err());
}

#[test]
fn fence_interior_preserves_embedded_newlines() {
    let raw = "```json\n{\n  \"a\": 1,\n  \"b\": [\n    2,\n    3\n  ]\n}\n```";
    assert_eq!(recover(raw).unwrap(), json!({ "a": 1, "b": [2, 3] }));
}

#[test]
fn scalar_json_decodes_at_direct_step() {
    // Not an object, but valid JSON; the chain does not reject it. Shape
    // enforcement belongs to the caller.
    assert_eq!(recover("[1, 2, 3]").unwrap(), json!([1, 2, 3]));
}
