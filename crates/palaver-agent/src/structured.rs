use serde_json::{Value, json};

/// Extracts a structured JSON object from model output that may arrive as a
/// fenced code block, as JSON embedded in prose, or as a bare object. When no
/// object can be recovered the raw text is returned as
/// `{"message": <text>}` so callers always get something usable instead of a
/// parse error.
pub fn parse_structured_reply(content: &str) -> Value {
    let trimmed = content.trim();

    if let Some(block) = extract_fenced_json(trimmed) {
        if let Some(value) = parse_object(block) {
            return value;
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(value) = parse_object(&trimmed[start..=end]) {
                return value;
            }
        }
    }

    if let Some(value) = parse_object(trimmed) {
        return value;
    }

    json!({"message": content})
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

fn extract_fenced_json(content: &str) -> Option<&str> {
    let start = content.find("```json")? + "```json".len();
    let rest = &content[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_block_is_extracted() {
        let reply = "Here you go:\n```json\n{\"answer\": \"42\"}\n```\nDone.";
        assert_eq!(parse_structured_reply(reply), json!({"answer": "42"}));
    }

    #[test]
    fn embedded_object_is_extracted_from_prose() {
        let reply = "The result is {\"answer\": \"42\"} as requested.";
        assert_eq!(parse_structured_reply(reply), json!({"answer": "42"}));
    }

    #[test]
    fn bare_object_parses_whole() {
        assert_eq!(
            parse_structured_reply("{\"a\": 1}"),
            json!({"a": 1})
        );
    }

    #[test]
    fn plain_text_falls_back_to_message_wrapper() {
        assert_eq!(
            parse_structured_reply("I could not find anything."),
            json!({"message": "I could not find anything."})
        );
    }

    #[test]
    fn non_object_json_falls_back_to_message_wrapper() {
        // A bare scalar parses as JSON but is not a structured reply.
        assert_eq!(parse_structured_reply("4"), json!({"message": "4"}));
    }

    #[test]
    fn malformed_fenced_block_falls_through_to_brace_scan() {
        let reply = "```json\nnot json\n``` but later {\"ok\": true}";
        assert_eq!(parse_structured_reply(reply), json!({"ok": true}));
    }
}
