use color_eyre::Result;

const SYSTEM_PROMPT: &str = "You answer questions using only the user's saved notes. If the notes do not contain the answer, say so plainly.";

pub async fn answer_question(
	cfg: &snip_config::LlmProviderConfig,
	question: &str,
	context: &str,
) -> Result<String> {
	let messages = [
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": render_prompt(question, context) }),
	];
	let answer = crate::chat::complete(cfg, &messages).await?;

	Ok(answer.trim().to_string())
}

fn render_prompt(question: &str, context: &str) -> String {
	format!("Notes:\n{context}\n\nQuestion: {question}")
}
