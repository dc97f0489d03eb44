//! Best-effort question/option extraction from raw page text.
//!
//! This is a string-heuristic layer, not an NLP layer. First matching
//! pattern wins, option families never merge, and any miss degrades to
//! "nothing found" instead of an error - the answer selector downstream
//! clamps whatever comes out of here.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What could be recovered from one page of text. Recomputed per question,
/// discarded after use.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Extracted {
	pub question: Option<String>,
	pub options: Vec<String>,
	pub raw_text: String,
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("hardcoded pattern"));

/// Interrogative sentence starters, in priority order.
static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		r"(?i)\bwhat is\b[^?]*\?",
		r"(?i)\bwho is\b[^?]*\?",
		r"(?i)\bwhich of\b[^?]*\?",
		r"(?i)\bhow many\b[^?]*\?",
		r"(?i)\bwhen\b[^?]*\?",
		r"(?i)\bwhere\b[^?]*\?",
		r"(?i)\bwhy\b[^?]*\?",
		r"(?i)\bhow\b[^?]*\?",
		r"(?i)\b(?:is|are)\b[^?]*\?",
		r"(?i)\bwhat\b[^?]*\?",
	]
	.iter()
	.map(|p| Regex::new(p).expect("hardcoded pattern"))
	.collect()
});

/// Last resort: anything ending in a question mark, bounded on the left by
/// the previous sentence terminator.
static FALLBACK_QUESTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!]*\?").expect("hardcoded pattern"));

/// Option list markers, one regex per family, in priority order:
/// uppercase-lettered, numbered, lowercase-lettered, bulleted, dashed.
static OPTION_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[r"\b[A-Z]\)", r"\b[1-9]\)", r"\b[a-z]\)", r"•", r"-\s*"].iter().map(|p| Regex::new(p).expect("hardcoded pattern")).collect()
});

/// Pull a question and its option list out of raw page text.
///
/// Pure function of its input; never fails. When nothing matches it returns
/// `question: None` and an empty option list alongside the cleaned text.
pub fn extract_question_and_options(page_text: &str) -> Extracted {
	let cleaned = WHITESPACE.replace_all(page_text, " ").trim().to_string();
	let question = find_question(&cleaned);
	let options = find_options(&cleaned);
	Extracted { question, options, raw_text: cleaned }
}

fn find_question(text: &str) -> Option<String> {
	for pattern in QUESTION_PATTERNS.iter() {
		if let Some(m) = pattern.find(text) {
			return Some(m.as_str().trim().to_string());
		}
	}
	FALLBACK_QUESTION.find(text).map(|m| m.as_str().trim().to_string()).filter(|q| !q.is_empty())
}

/// The first marker family with any hits wins; options are the text runs
/// between consecutive markers of that family. No merging across families.
fn find_options(text: &str) -> Vec<String> {
	for marker in OPTION_MARKERS.iter() {
		let positions: Vec<_> = marker.find_iter(text).collect();
		if positions.is_empty() {
			continue;
		}
		return positions
			.iter()
			.enumerate()
			.map(|(i, m)| {
				let start = m.end();
				let end = positions.get(i + 1).map(|next| next.start()).unwrap_or(text.len());
				text[start..end].trim().to_string()
			})
			.filter(|option| !option.is_empty())
			.collect();
	}
	Vec::new()
}
