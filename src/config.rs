//! Runtime configuration. The target site is an unversioned external
//! collaborator, so everything coupled to its current behavior - labels,
//! timeouts, question count, reward value - is a plain config field here,
//! never derived logic.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
	/// Target site entry point
	#[serde(default = "default_base_url")]
	pub base_url: String,
	/// Model identifier for answer selection (OpenAI-compatible)
	#[serde(default = "default_model")]
	pub model: String,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
	/// Directory step screenshots are written to
	#[serde(default = "default_screenshots_dir")]
	pub screenshots_dir: String,
	/// Bounded wait for a target page element, in seconds
	#[serde(default = "default_element_timeout_secs")]
	pub element_timeout_secs: u64,
	/// Number of quiz questions the game is expected to show (default: 5)
	#[serde(default = "default_max_questions")]
	pub max_questions: u32,
	/// Points awarded when the claim button is found and clicked (default: 500)
	#[serde(default = "default_reward_points")]
	pub reward_points: u32,
	/// Required prefix of a login phone number
	#[serde(default = "default_phone_prefix")]
	pub phone_prefix: String,
	/// Placeholder attribute of the phone number input
	#[serde(default = "default_phone_placeholder")]
	pub phone_placeholder: String,
	/// Placeholder attribute of the password input
	#[serde(default = "default_password_placeholder")]
	pub password_placeholder: String,
	/// Label of the language picker button shown on first visit
	#[serde(default = "default_language_label")]
	pub language_label: String,
	/// Label of the start-game button (its presence confirms login)
	#[serde(default = "default_start_game_label")]
	pub start_game_label: String,
	/// Text fragments marking a login error message
	#[serde(default = "default_error_markers")]
	pub error_markers: Vec<String>,
	/// Text fragments marking the "no attempts left today" screen
	#[serde(default = "default_attempts_exhausted_markers")]
	pub attempts_exhausted_markers: Vec<String>,
	/// Labels of the next-question control
	#[serde(default = "default_next_labels")]
	pub next_labels: Vec<String>,
	/// Labels of navigation buttons that are never answers
	#[serde(default = "default_navigation_labels")]
	pub navigation_labels: Vec<String>,
	/// Text fragments identifying the points claim button
	#[serde(default = "default_claim_markers")]
	pub claim_markers: Vec<String>,
}

fn default_base_url() -> String {
	"http://barnsewc25.com".to_string()
}

fn default_model() -> String {
	"gpt-4".to_string()
}

fn default_screenshots_dir() -> String {
	"/tmp/barns_screenshots".to_string()
}

fn default_element_timeout_secs() -> u64 {
	10
}

fn default_max_questions() -> u32 {
	5
}

fn default_reward_points() -> u32 {
	500
}

fn default_phone_prefix() -> String {
	"05".to_string()
}

fn default_phone_placeholder() -> String {
	"05XXXXXXXX".to_string()
}

// The site runs in Arabic once the language is picked, so the element
// heuristics below match the Arabic UI strings.
fn default_password_placeholder() -> String {
	"كلمة المرور".to_string()
}

fn default_language_label() -> String {
	"عربي".to_string()
}

fn default_start_game_label() -> String {
	"ابدأ اللعبة".to_string()
}

fn default_error_markers() -> Vec<String> {
	vec!["خطأ".to_string(), "غير صحيح".to_string()]
}

fn default_attempts_exhausted_markers() -> Vec<String> {
	vec!["انتهت".to_string(), "غدا".to_string()]
}

fn default_next_labels() -> Vec<String> {
	vec!["التالي".to_string(), "السؤال التالي".to_string()]
}

fn default_navigation_labels() -> Vec<String> {
	vec!["التالي".to_string(), "السابق".to_string()]
}

fn default_claim_markers() -> Vec<String> {
	vec!["استلام".to_string(), "500".to_string(), "نقطة".to_string()]
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			base_url: default_base_url(),
			model: default_model(),
			visible: false,
			screenshots_dir: default_screenshots_dir(),
			element_timeout_secs: default_element_timeout_secs(),
			max_questions: default_max_questions(),
			reward_points: default_reward_points(),
			phone_prefix: default_phone_prefix(),
			phone_placeholder: default_phone_placeholder(),
			password_placeholder: default_password_placeholder(),
			language_label: default_language_label(),
			start_game_label: default_start_game_label(),
			error_markers: default_error_markers(),
			attempts_exhausted_markers: default_attempts_exhausted_markers(),
			next_labels: default_next_labels(),
			navigation_labels: default_navigation_labels(),
			claim_markers: default_claim_markers(),
		}
	}
}

impl AppConfig {
	/// Defaults with environment overrides for the fields that commonly vary
	/// between deployments. API keys stay in the environment and are read by
	/// the LLM client itself.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Ok(base_url) = std::env::var("BARNS_BASE_URL") {
			config.base_url = base_url;
		}
		if let Ok(model) = std::env::var("OPENAI_MODEL") {
			config.model = model;
		}
		if let Ok(dir) = std::env::var("BARNS_SCREENSHOTS_DIR") {
			config.screenshots_dir = dir;
		}
		config
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_the_documented_site_constants() {
		let config = AppConfig::default();
		assert_eq!(config.max_questions, 5);
		assert_eq!(config.reward_points, 500);
		assert_eq!(config.phone_prefix, "05");
		assert!(!config.visible);
	}

	#[test]
	fn deserializes_with_all_fields_defaulted() {
		let config: AppConfig = serde_json::from_str("{}").expect("empty object should deserialize");
		assert_eq!(config.base_url, default_base_url());
		assert_eq!(config.element_timeout_secs, 10);
		assert!(!config.claim_markers.is_empty());
	}
}
