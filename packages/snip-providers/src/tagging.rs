use color_eyre::{Result, eyre};
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You label short text fragments saved from web pages. Reply with a JSON object of the form {\"tags\": [\"...\"]} containing at most the requested number of short, lowercase topical tags. Reply with JSON only.";
const MAX_ATTEMPTS: usize = 3;

pub async fn generate_tags(
	cfg: &snip_config::LlmProviderConfig,
	text: &str,
	max_tags: usize,
) -> Result<Vec<String>> {
	let messages = [
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({
			"role": "user",
			"content": format!("Maximum tags: {max_tags}\n\nText:\n{text}"),
		}),
	];

	for attempt in 1..=MAX_ATTEMPTS {
		let content = crate::chat::complete(cfg, &messages).await?;

		match parse_tags(&content) {
			Ok(mut tags) => {
				tags.truncate(max_tags);

				return Ok(tags);
			},
			Err(err) => {
				tracing::warn!(attempt, error = %err, "Tag response was not usable.");
			},
		}
	}

	Err(eyre::eyre!("Tag provider did not return a JSON tag list."))
}

/// Accepts `{"tags": [...]}` or a bare `[...]`, optionally wrapped in a fenced code block.
fn parse_tags(content: &str) -> Result<Vec<String>> {
	let trimmed = strip_code_fence(content.trim());
	let json: Value = serde_json::from_str(trimmed)
		.map_err(|_| eyre::eyre!("Tag content is not valid JSON."))?;
	let list = match &json {
		Value::Array(items) => items,
		Value::Object(map) => map
			.get("tags")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Tag object is missing tags array."))?,
		_ => return Err(eyre::eyre!("Tag content must be an object or array.")),
	};
	let mut tags = Vec::with_capacity(list.len());

	for item in list {
		let tag = item.as_str().ok_or_else(|| eyre::eyre!("Tags must be strings."))?;

		tags.push(tag.to_string());
	}

	Ok(tags)
}

fn strip_code_fence(content: &str) -> &str {
	let Some(rest) = content.strip_prefix("```") else {
		return content;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);

	rest.strip_suffix("```").unwrap_or(rest).trim()
}
