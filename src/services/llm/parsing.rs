/// Recovering JSON from free-form model output
///
/// Models are asked for bare JSON but often wrap it in prose or markdown fences.
/// Extraction runs an ordered chain of strategies and stops at the first candidate
/// that parses as an object carrying the required key.
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole text is JSON
    Direct,
    /// Text between the first `{` and the last `}`
    BraceSlice,
    /// Brace-balanced objects (up to two levels of nesting) found by scanning
    BalancedScan,
}

pub const STRATEGIES: [ExtractionStrategy; 3] = [
    ExtractionStrategy::Direct,
    ExtractionStrategy::BraceSlice,
    ExtractionStrategy::BalancedScan,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found {
        strategy: ExtractionStrategy,
        value: Value,
    },
    NotFound,
}

/// Outcome of asking the model for a list
///
/// `Parsed(vec![])` means the model answered with an empty list; `Unparseable`
/// means no usable JSON was found. Callers that only need items use
/// [`LlmOutcome::into_items`], which maps both to an empty vector.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmOutcome<T> {
    Parsed(Vec<T>),
    Unparseable,
}

impl<T> LlmOutcome<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            LlmOutcome::Parsed(items) => items,
            LlmOutcome::Unparseable => Vec::new(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, LlmOutcome::Parsed(_))
    }
}

fn object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("object pattern is valid")
    })
}

fn candidates(strategy: ExtractionStrategy, content: &str) -> Vec<&str> {
    match strategy {
        ExtractionStrategy::Direct => vec![content.trim()],
        ExtractionStrategy::BraceSlice => match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if end > start => vec![&content[start..=end]],
            _ => Vec::new(),
        },
        ExtractionStrategy::BalancedScan => object_pattern()
            .find_iter(content)
            .map(|m| m.as_str())
            .collect(),
    }
}

/// Finds the first JSON object in `content` that has `required_key`
pub fn extract_object(content: &str, required_key: &str) -> Extraction {
    for strategy in STRATEGIES {
        for candidate in candidates(strategy, content) {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.get(required_key).is_some() {
                    return Extraction::Found { strategy, value };
                }
            }
        }
    }
    Extraction::NotFound
}

/// Extracts the list under `key` and decodes each element with `decode`
///
/// Elements that fail to decode are skipped. A missing key or a non-array value
/// yields `Unparseable`.
pub fn extract_list<T>(
    content: &str,
    key: &str,
    decode: impl Fn(&Value) -> Option<T>,
) -> LlmOutcome<T> {
    match extract_object(content, key) {
        Extraction::Found { strategy, value } => match value.get(key).and_then(Value::as_array) {
            Some(items) => {
                let decoded: Vec<T> = items.iter().filter_map(&decode).collect();
                if decoded.len() < items.len() {
                    tracing::warn!(
                        skipped = items.len() - decoded.len(),
                        key,
                        "Dropped undecodable items from AI response"
                    );
                }
                tracing::debug!(?strategy, key, items = decoded.len(), "AI response parsed");
                LlmOutcome::Parsed(decoded)
            }
            None => {
                tracing::warn!(key, "AI response key is not a list");
                LlmOutcome::Unparseable
            }
        },
        Extraction::NotFound => {
            tracing::warn!(key, content = %content, "Could not extract JSON from AI response");
            LlmOutcome::Unparseable
        }
    }
}

/// Finds a bare JSON array, directly or between the first `[` and the last `]`
pub fn extract_array(content: &str) -> Option<Vec<Value>> {
    let trimmed = content.trim();
    if let Ok(Value::Array(items)) = serde_json::from_str(trimmed) {
        return Some(items);
    }
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Integer ids arrive as numbers, floats with no fraction, or numeric strings
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn value_as_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strategy_of(extraction: &Extraction) -> Option<ExtractionStrategy> {
        match extraction {
            Extraction::Found { strategy, .. } => Some(*strategy),
            Extraction::NotFound => None,
        }
    }

    #[test]
    fn test_direct_json() {
        let extraction = extract_object(r#"{"recommendations": []}"#, "recommendations");
        assert_eq!(strategy_of(&extraction), Some(ExtractionStrategy::Direct));
    }

    #[test]
    fn test_markdown_fenced_json_uses_brace_slice() {
        let content = "```json\n{\"recommendations\": [{\"recipe_id\": 3}]}\n```";
        let extraction = extract_object(content, "recommendations");
        assert_eq!(strategy_of(&extraction), Some(ExtractionStrategy::BraceSlice));
        if let Extraction::Found { value, .. } = extraction {
            assert_eq!(value["recommendations"][0]["recipe_id"], 3);
        }
    }

    #[test]
    fn test_balanced_scan_skips_objects_without_key() {
        let content = r#"Thinking {"note": "draft"} ... final: {"recommendations": [{"recipe_id": 1}]} done {oops"#;
        let extraction = extract_object(content, "recommendations");
        assert_eq!(
            strategy_of(&extraction),
            Some(ExtractionStrategy::BalancedScan)
        );
    }

    #[test]
    fn test_missing_key_is_not_found() {
        assert_eq!(
            extract_object(r#"{"recipes": []}"#, "recommendations"),
            Extraction::NotFound
        );
        assert_eq!(extract_object("no json here", "recommendations"), Extraction::NotFound);
        assert_eq!(extract_object("", "recommendations"), Extraction::NotFound);
    }

    #[test]
    fn test_extract_list_distinguishes_empty_from_unparseable() {
        let decode = |v: &Value| value_as_i64(&v["recipe_id"]);
        assert_eq!(
            extract_list(r#"{"recommendations": []}"#, "recommendations", decode),
            LlmOutcome::Parsed(vec![])
        );
        assert_eq!(
            extract_list("garbage", "recommendations", decode),
            LlmOutcome::Unparseable
        );
        assert_eq!(
            extract_list(r#"{"recommendations": "none"}"#, "recommendations", decode),
            LlmOutcome::Unparseable
        );
        assert!(LlmOutcome::<i64>::Unparseable.into_items().is_empty());
    }

    #[test]
    fn test_extract_list_skips_bad_items() {
        let content = r#"{"recommendations": [{"recipe_id": "7"}, {"title": "x"}, {"recipe_id": 9}]}"#;
        let outcome = extract_list(content, "recommendations", |v| value_as_i64(&v["recipe_id"]));
        assert_eq!(outcome, LlmOutcome::Parsed(vec![7, 9]));
    }

    #[test]
    fn test_extract_array() {
        assert_eq!(
            extract_array(r#"Sure! ["ginger", "thyme"]"#),
            Some(vec![json!("ginger"), json!("thyme")])
        );
        assert_eq!(extract_array("none"), None);
        assert_eq!(extract_array(r#"{"a": 1}"#), None);
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(value_as_i64(&json!(12)), Some(12));
        assert_eq!(value_as_i64(&json!(12.0)), Some(12));
        assert_eq!(value_as_i64(&json!(12.5)), None);
        assert_eq!(value_as_i64(&json!(" 5 ")), Some(5));
        assert_eq!(value_as_i64(&json!(null)), None);
        assert_eq!(value_as_f64(&json!("0.8")), Some(0.8));
        assert_eq!(
            value_as_strings(&json!(["rice", 3, " ", "pepper"])),
            vec!["rice".to_string(), "pepper".to_string()]
        );
    }
}
