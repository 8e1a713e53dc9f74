use std::sync::LazyLock;

use regex::Regex;

/// Pull the payload out of an LLM reply: drop reasoning tag pairs, then take
/// the first fenced code block if there is one, the whole text otherwise
pub fn extract_code_block(s: &str) -> String {
    let stripped = REGEX_TAG_PAIR.replace_all(s, "");

    match REGEX_FENCED_BLOCK.captures(&stripped) {
        Some(caps) => caps[1].trim().to_string(),
        None => stripped.trim().to_string(),
    }
}

static REGEX_FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[^\n]*\n([\s\S]*?)```").expect("FENCED_BLOCK regex is invalid")
});
static REGEX_TAG_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>[\s\S]*?</[^>]+>").expect("TAG_PAIR regex is invalid"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_block() {
        assert_eq!(extract_code_block("600036"), "600036");

        assert_eq!(
            extract_code_block(
                r#"
```
{"prospect": "Bullish"}
```
"#
            ),
            r#"{"prospect": "Bullish"}"#
        );

        let verdict = extract_code_block(
            r#"
<think>
对数据进行推理...
</think>

```json
{
    "prospect": "Neutral",
    "rating": 55
}
```

以上是分析结果。
"#,
        );
        let json: serde_json::Value = serde_json::from_str(&verdict).unwrap();
        assert_eq!(json["rating"].as_u64(), Some(55));
    }
}
