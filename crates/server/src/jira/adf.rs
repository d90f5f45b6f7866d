//! Atlassian Document Format (ADF) conversion for worklog comments.
//!
//! Only plain text is supported: text is written as one paragraph per line
//! and read back by concatenating text nodes.

use serde_json::{Value, json};

/// Wrap plain text in an ADF document.
#[must_use]
pub fn from_plain_text(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                json!({ "type": "paragraph", "content": [] })
            } else {
                json!({
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": line }]
                })
            }
        })
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": paragraphs,
    })
}

/// Extract plain text from an ADF document.
///
/// Block nodes are separated by newlines. Plain string comments (older API
/// versions) are returned as-is.
#[must_use]
pub fn to_plain_text(doc: &Value) -> String {
    if let Some(text) = doc.as_str() {
        return text.to_string();
    }

    let mut blocks = Vec::new();
    if let Some(content) = doc.get("content").and_then(Value::as_array) {
        for block in content {
            let mut text = String::new();
            collect_text(block, &mut text);
            blocks.push(text);
        }
    }
    blocks.join("\n").trim_end().to_string()
}

fn collect_text(node: &Value, out: &mut String) {
    match node.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("hardBreak") => out.push('\n'),
        _ => {}
    }

    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_text(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_becomes_single_paragraph() {
        let doc = from_plain_text("Deployed hotfix");
        assert_eq!(doc["type"], "doc");
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["content"][0]["type"], "paragraph");
        assert_eq!(doc["content"][0]["content"][0]["text"], "Deployed hotfix");
    }

    #[test]
    fn test_to_plain_text_concatenates_nodes() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Reviewed "},
                    {"type": "text", "text": "PR", "marks": [{"type": "strong"}]}
                ]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "line one"},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "line two"}
                ]}
            ]
        });
        assert_eq!(to_plain_text(&doc), "Reviewed PR\nline one\nline two");
    }

    #[test]
    fn test_multiline_text_reads_back() {
        let doc = from_plain_text("first\nsecond");
        assert_eq!(to_plain_text(&doc), "first\nsecond");
    }

    #[test]
    fn test_legacy_string_comment() {
        assert_eq!(to_plain_text(&json!("plain comment")), "plain comment");
    }
}
