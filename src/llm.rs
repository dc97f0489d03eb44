//! LLM-backed answer selection for scraped quiz questions.
//!
//! One chat call per question, fixed model and low temperature. The reply
//! is expected to carry `Answer:` / `Reasoning:` / `Confidence:` lines;
//! everything missing or malformed falls back to a safe default, and the
//! selected index is always clamped to the option list.

use std::{future::Future, sync::LazyLock};

use async_openai::{
	Client,
	config::OpenAIConfig,
	types::chat::{ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use color_eyre::{Result, eyre::eyre};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::extract_question_and_options;

const ANSWER_SYSTEM: &str = "You are a knowledgeable assistant specializing in general-knowledge and trivia questions.";
const GUESS_SYSTEM: &str = "You are a helpful assistant making sensible choices based on context.";

const ANSWER_TEMPERATURE: f32 = 0.1;
const GUESS_TEMPERATURE: f32 = 0.3;
const ANSWER_MAX_TOKENS: u32 = 500;
const GUESS_MAX_TOKENS: u32 = 300;

/// Used when the reply has no parsable `Confidence:` line.
const DEFAULT_CONFIDENCE: f64 = 0.7;
/// Fixed confidence of the fallback guess path; the model is not asked for
/// its own certainty there.
const GUESS_CONFIDENCE: f64 = 0.5;

/// The selector's verdict for one question. `answer_index` is zero-based and
/// already clamped; `confidence` is informational only and never gates the
/// click downstream.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnswerDecision {
	pub success: bool,
	pub answer_index: usize,
	pub confidence: f64,
	pub reasoning: String,
	#[serde(default)]
	pub raw_reply: Option<String>,
}

impl AnswerDecision {
	fn failure(reasoning: impl Into<String>) -> Self {
		Self {
			success: false,
			answer_index: 0,
			confidence: 0.0,
			reasoning: reasoning.into(),
			raw_reply: None,
		}
	}
}

/// One chat-completion call. The seam between the decision logic and the
/// OpenAI-compatible gateway; anything that can return a reply string works.
pub trait Completions {
	fn complete(&self, system: &str, prompt: &str, max_tokens: u32, temperature: f32) -> impl Future<Output = Result<String>>;
}

/// Live gateway over the `async-openai` client.
pub struct OpenAiCompletions {
	client: Client<OpenAIConfig>,
	model: String,
}

impl Completions for OpenAiCompletions {
	async fn complete(&self, system: &str, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
		let request = CreateChatCompletionRequestArgs::default()
			.model(&self.model)
			.max_tokens(max_tokens)
			.temperature(temperature)
			.messages(vec![
				ChatCompletionRequestSystemMessageArgs::default().content(system).build()?.into(),
				ChatCompletionRequestUserMessageArgs::default().content(prompt).build()?.into(),
			])
			.build()?;

		let mut response = self.client.chat().create(request).await?;
		let reply = response.choices.first_mut().and_then(|choice| choice.message.content.take()).unwrap_or_default();
		if reply.trim().is_empty() {
			return Err(eyre!("model returned an empty reply"));
		}
		tracing::debug!("model raw reply: {reply}");
		Ok(reply)
	}
}

/// Answer selection over a completions gateway. Never raises past its own
/// boundary: every public method returns an [`AnswerDecision`].
pub struct Solver<C = OpenAiCompletions> {
	completions: C,
}

impl Solver {
	/// Builds the live gateway from the environment. `OPENAI_API_KEY` is read
	/// by the client itself; `OPENAI_API_BASE` switches to a compatible one.
	pub fn from_env(model: &str) -> Self {
		let mut config = OpenAIConfig::new();
		if let Ok(base) = std::env::var("OPENAI_API_BASE") {
			config = config.with_api_base(base);
		}
		Self::new(OpenAiCompletions {
			client: Client::with_config(config),
			model: model.to_string(),
		})
	}
}

impl<C: Completions> Solver<C> {
	pub fn new(completions: C) -> Self {
		Self { completions }
	}

	async fn complete(&self, system: &str, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
		self.completions.complete(system, prompt, max_tokens, temperature).await
	}

	/// Main answering path: a clear question plus a non-empty option list.
	/// Missing either short-circuits with zero confidence, no model call.
	pub async fn solve_question(&self, question: &str, options: &[String]) -> AnswerDecision {
		if question.trim().is_empty() || options.is_empty() {
			return AnswerDecision::failure("no clear question or options found");
		}

		let prompt = build_answer_prompt(question, options);
		match self.complete(ANSWER_SYSTEM, &prompt, ANSWER_MAX_TOKENS, ANSWER_TEMPERATURE).await {
			Ok(reply) => {
				let parsed = parse_answer_reply(&reply, options.len());
				AnswerDecision {
					success: true,
					answer_index: parsed.answer_index,
					confidence: parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE),
					reasoning: parsed.reasoning.unwrap_or_else(|| "answered from general knowledge".to_string()),
					raw_reply: Some(reply),
				}
			}
			Err(e) => {
				tracing::error!("answer model call failed: {e}");
				AnswerDecision::failure(format!("technical error: {e}"))
			}
		}
	}

	/// Fallback guess when no question text could be isolated but candidate
	/// option labels exist. Confidence is fixed at 0.5 on success regardless
	/// of what the model says.
	pub async fn smart_guess(&self, page_text: &str, labels: &[String]) -> AnswerDecision {
		if labels.is_empty() {
			return AnswerDecision::failure("no options available to guess from");
		}

		let prompt = build_guess_prompt(page_text, labels);
		match self.complete(GUESS_SYSTEM, &prompt, GUESS_MAX_TOKENS, GUESS_TEMPERATURE).await {
			Ok(reply) => {
				let parsed = parse_answer_reply(&reply, labels.len());
				AnswerDecision {
					success: true,
					answer_index: parsed.answer_index,
					confidence: GUESS_CONFIDENCE,
					reasoning: parsed.reasoning.unwrap_or_else(|| "best guess from the page context".to_string()),
					raw_reply: Some(reply),
				}
			}
			Err(e) => {
				tracing::error!("guess model call failed: {e}");
				AnswerDecision::failure(format!("technical error while guessing: {e}"))
			}
		}
	}

	/// Entry point for the session controller: extract from page text, fall
	/// back to the supplied button labels for options, route to the main or
	/// guess path. Always returns a decision, never an error.
	pub async fn solve_from_page(&self, page_text: &str, button_labels: &[String]) -> AnswerDecision {
		let mut extracted = extract_question_and_options(page_text);
		if extracted.options.is_empty() && !button_labels.is_empty() {
			extracted.options = button_labels.to_vec();
		}

		match &extracted.question {
			Some(question) if !extracted.options.is_empty() => self.solve_question(question, &extracted.options).await,
			_ => self.smart_guess(page_text, button_labels).await,
		}
	}
}

fn build_answer_prompt(question: &str, options: &[String]) -> String {
	let mut prompt = format!("You are answering a general-knowledge quiz question.\n\nQuestion: {question}\n\nOptions:\n");
	for (i, option) in options.iter().enumerate() {
		prompt.push_str(&format!("{}. {option}\n", i + 1));
	}
	prompt.push_str("\nPick the correct option and explain briefly. Reply in exactly this format:\nAnswer: <option number>\nReasoning: <short explanation>\nConfidence: <value from 0 to 1>\n");
	prompt
}

fn build_guess_prompt(page_text: &str, labels: &[String]) -> String {
	let mut prompt = format!("Given the following page text and the available options, which option is the most plausible choice?\n\nText: {page_text}\n\nOptions:\n");
	for (i, label) in labels.iter().enumerate() {
		prompt.push_str(&format!("{}. {label}\n", i + 1));
	}
	prompt.push_str("\nPick the best option and explain briefly.\nAnswer: <option number>\nReasoning: <short explanation>\n");
	prompt
}

struct ParsedReply {
	answer_index: usize,
	confidence: Option<f64>,
	reasoning: Option<String>,
}

static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)answer:\s*(\d+)").expect("hardcoded pattern"));
static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)reasoning:\s*([^\n]+)").expect("hardcoded pattern"));
static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)confidence:\s*([0-9.]+)").expect("hardcoded pattern"));

/// Pulls the structured lines out of a model reply. The 1-based answer
/// number becomes a 0-based index clamped to `[0, option_count - 1]`, so a
/// wild reply can never point outside the option list. Digits too large for
/// `usize` count as a large number and clamp to the last option.
fn parse_answer_reply(reply: &str, option_count: usize) -> ParsedReply {
	let answer_index = ANSWER_RE
		.captures(reply)
		.map(|c| c[1].parse::<usize>().map_or(usize::MAX, |n| n.saturating_sub(1)))
		.unwrap_or(0)
		.min(option_count.saturating_sub(1));

	let confidence = CONFIDENCE_RE.captures(reply).and_then(|c| c[1].parse::<f64>().ok());
	let reasoning = REASONING_RE.captures(reply).map(|c| c[1].trim().to_string()).filter(|r| !r.is_empty());

	ParsedReply { answer_index, confidence, reasoning }
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Gateway stub returning the same reply for every call.
	struct FixedReply(&'static str);

	impl Completions for FixedReply {
		async fn complete(&self, _system: &str, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
			Ok(self.0.to_string())
		}
	}

	/// Gateway stub failing every call, as a dead network would.
	struct FailingGateway;

	impl Completions for FailingGateway {
		async fn complete(&self, _system: &str, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
			Err(eyre!("connection refused"))
		}
	}

	fn options(labels: &[&str]) -> Vec<String> {
		labels.iter().map(|l| l.to_string()).collect()
	}

	#[test]
	fn parses_a_well_formed_reply() {
		let parsed = parse_answer_reply("Answer: 1\nReasoning: well known\nConfidence: 0.95", 2);
		assert_eq!(parsed.answer_index, 0);
		assert_eq!(parsed.confidence, Some(0.95));
		assert_eq!(parsed.reasoning.as_deref(), Some("well known"));
	}

	#[test]
	fn clamps_out_of_range_answer_numbers() {
		assert_eq!(parse_answer_reply("Answer: 99", 3).answer_index, 2);
		assert_eq!(parse_answer_reply("Answer: 4", 3).answer_index, 2);
		assert_eq!(parse_answer_reply("Answer: 0", 3).answer_index, 0);
		// Even a single option stays in bounds.
		assert_eq!(parse_answer_reply("Answer: 7", 1).answer_index, 0);
	}

	#[test]
	fn defaults_when_lines_are_missing() {
		let parsed = parse_answer_reply("I think the second one.", 4);
		assert_eq!(parsed.answer_index, 0);
		assert_eq!(parsed.confidence, None);
		assert_eq!(parsed.reasoning, None);
	}

	#[test]
	fn ignores_unparsable_confidence() {
		let parsed = parse_answer_reply("Answer: 2\nConfidence: very high", 3);
		assert_eq!(parsed.answer_index, 1);
		assert_eq!(parsed.confidence, None);
	}

	#[test]
	fn reads_lines_case_insensitively() {
		let parsed = parse_answer_reply("ANSWER: 3\nreasoning: because\nCONFIDENCE: 0.5", 5);
		assert_eq!(parsed.answer_index, 2);
		assert_eq!(parsed.confidence, Some(0.5));
		assert_eq!(parsed.reasoning.as_deref(), Some("because"));
	}

	#[test]
	fn clamps_answer_numbers_too_large_for_usize() {
		let parsed = parse_answer_reply("Answer: 99999999999999999999999999", 3);
		assert_eq!(parsed.answer_index, 2);
	}

	#[tokio::test]
	async fn answered_question_carries_the_parsed_reply() {
		let solver = Solver::new(FixedReply("Answer: 2\nReasoning: well known\nConfidence: 0.95"));
		let decision = solver.solve_question("What is the capital of France?", &options(&["Lyon", "Paris"])).await;
		assert!(decision.success);
		assert_eq!(decision.answer_index, 1);
		assert_eq!(decision.confidence, 0.95);
		assert_eq!(decision.reasoning, "well known");
	}

	#[tokio::test]
	async fn guess_confidence_is_half_regardless_of_the_reply() {
		let solver = Solver::new(FixedReply("Answer: 3\nReasoning: sounds right\nConfidence: 0.99"));
		let decision = solver.smart_guess("round two", &options(&["Red", "Blue", "Green"])).await;
		assert!(decision.success);
		assert_eq!(decision.answer_index, 2);
		assert_eq!(decision.confidence, GUESS_CONFIDENCE);
	}

	#[tokio::test]
	async fn failed_model_call_becomes_a_zero_confidence_failure() {
		let solver = Solver::new(FailingGateway);
		let decision = solver.solve_question("What is the capital of France?", &options(&["Paris", "Lyon"])).await;
		assert!(!decision.success);
		assert_eq!(decision.answer_index, 0);
		assert_eq!(decision.confidence, 0.0);
		assert!(decision.reasoning.contains("technical error"), "reasoning was: {}", decision.reasoning);
	}

	#[tokio::test]
	async fn failed_guess_call_becomes_a_zero_confidence_failure() {
		let solver = Solver::new(FailingGateway);
		let decision = solver.smart_guess("round two", &options(&["Red", "Blue"])).await;
		assert!(!decision.success);
		assert_eq!(decision.confidence, 0.0);
		assert!(decision.reasoning.contains("technical error"));
	}

	#[tokio::test]
	async fn missing_question_fails_without_a_model_call() {
		let solver = Solver::from_env("gpt-4");
		let decision = solver.solve_question("", &["Paris".to_string()]).await;
		assert!(!decision.success);
		assert_eq!(decision.confidence, 0.0);
		assert_eq!(decision.answer_index, 0);
	}

	#[tokio::test]
	async fn empty_options_fail_without_a_model_call() {
		let solver = Solver::from_env("gpt-4");
		let decision = solver.solve_question("What is the capital of France?", &[]).await;
		assert!(!decision.success);
		assert_eq!(decision.confidence, 0.0);
	}

	#[tokio::test]
	async fn guess_without_labels_fails_immediately() {
		let solver = Solver::from_env("gpt-4");
		let decision = solver.smart_guess("some page text", &[]).await;
		assert!(!decision.success);
		assert_eq!(decision.confidence, 0.0);
	}

	#[tokio::test]
	async fn page_without_question_or_labels_fails_immediately() {
		let solver = Solver::from_env("gpt-4");
		let decision = solver.solve_from_page("Loading, please wait", &[]).await;
		assert!(!decision.success);
		assert_eq!(decision.confidence, 0.0);
	}

	#[test]
	fn answer_prompt_numbers_options_from_one() {
		let prompt = build_answer_prompt("What is the capital of France?", &["Paris".to_string(), "Lyon".to_string()]);
		assert!(prompt.contains("1. Paris"));
		assert!(prompt.contains("2. Lyon"));
		assert!(prompt.contains("Answer: <option number>"));
	}
}
