//! Browser session control: one strictly sequential run over the quiz site.
//!
//! Every transition is bounded-wait, act, settle, screenshot. Failures are
//! caught at phase boundaries and turned into a structured [`RunResult`];
//! the browser is closed on every exit path.

use std::{path::PathBuf, time::Duration};

use chromiumoxide::{
	Element, Page,
	browser::{Browser, BrowserConfig},
	cdp::browser_protocol::page::CaptureScreenshotFormat,
	page::ScreenshotParams,
};
use color_eyre::{Result, eyre::eyre};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::{Credentials, RunResult, ScreenshotEvent, Step, config::AppConfig, llm::Solver, login};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// One browser session plus the observer sink for its screenshots.
/// Exclusively owned by a single run; never shared.
pub struct Session {
	page: Page,
	pub config: AppConfig,
	sink: Option<mpsc::UnboundedSender<ScreenshotEvent>>,
}

impl Session {
	pub fn page(&self) -> &Page {
		&self.page
	}

	/// Capture a screenshot for `step` and notify the sink, if any.
	/// Fire-and-forget: failures are logged and swallowed, a missing sink is
	/// a no-op.
	pub async fn capture(&self, step: Step) {
		let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
		let filename = format!("{}_{timestamp}.png", step.id());
		let path = PathBuf::from(&self.config.screenshots_dir).join(filename);

		let params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build();
		match self.page.save_screenshot(params, &path).await {
			Ok(_) => {
				tracing::debug!("captured screenshot {}", path.display());
				if let Some(sink) = &self.sink {
					let _ = sink.send(ScreenshotEvent { path, step });
				}
			}
			Err(e) => tracing::warn!("failed to capture screenshot for {step}: {e}"),
		}
	}
}

/// Run the whole flow for one set of credentials: launch, login, play,
/// claim, tear down. Never returns an error - every failure becomes a
/// structured result for the front end.
pub async fn run_automation(config: AppConfig, credentials: Credentials, sink: Option<mpsc::UnboundedSender<ScreenshotEvent>>) -> RunResult {
	if let Err(e) = tokio::fs::create_dir_all(&config.screenshots_dir).await {
		tracing::warn!("could not create screenshots dir {}: {e}", config.screenshots_dir);
	}

	let (mut browser, handler_task, page) = match launch_browser(&config).await {
		Ok(launched) => launched,
		Err(e) => {
			tracing::error!("failed to set up the browser: {e}");
			return RunResult::failure("failed to set up the browser");
		}
	};
	tracing::info!("browser ready, starting run");

	let solver = Solver::from_env(&config.model);
	let session = Session { page, config, sink };

	let login_outcome = login::login(&session, &credentials).await;
	let result = if login_outcome.success {
		play_game(&session, &solver).await
	} else {
		RunResult::failure(login_outcome.error.unwrap_or_else(|| "unknown login failure".to_string()))
	};

	// The browser is released unconditionally, whatever happened above.
	if let Err(e) = browser.close().await {
		tracing::warn!("failed to close browser: {e}");
	}
	handler_task.abort();

	result
}

async fn launch_browser(config: &AppConfig) -> Result<(Browser, tokio::task::JoinHandle<()>, Page)> {
	let mut builder = BrowserConfig::builder()
		.no_sandbox()
		.window_size(1920, 1080)
		.arg("--disable-dev-shm-usage")
		.arg("--disable-gpu")
		.arg(format!("--user-agent={USER_AGENT}"));
	if config.visible {
		builder = builder.with_head();
	}
	let browser_config = builder.build().map_err(|e| eyre!("failed to build browser config: {e}"))?;

	let (browser, mut handler) = Browser::launch(browser_config).await?;

	// Drain CDP events so the browser doesn't stall.
	let handler_task = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });

	let page = browser.new_page("about:blank").await?;
	Ok((browser, handler_task, page))
}

/// Game phase boundary: any error below is caught here and converted.
async fn play_game(session: &Session, solver: &Solver) -> RunResult {
	match play_game_inner(session, solver).await {
		Ok(result) => result,
		Err(e) => {
			tracing::error!("game phase failed: {e}");
			RunResult::failure(format!("game error: {e}"))
		}
	}
}

async fn play_game_inner(session: &Session, solver: &Solver) -> Result<RunResult> {
	let config = &session.config;
	let page = session.page();

	tracing::info!("starting the game");
	if wait_for_button_with_text(page, &config.start_game_label, config.element_timeout_secs).await? {
		click_button_with_any_text(page, std::slice::from_ref(&config.start_game_label)).await?;
		settle(3).await;
		session.capture(Step::GameStarted).await;
	} else if page_contains_any(page, &config.attempts_exhausted_markers).await? {
		tracing::info!("no attempts remaining for today");
		session.capture(Step::ErrorAttemptsFinished).await;
		return Ok(RunResult::failure("no attempts remaining for today"));
	} else {
		session.capture(Step::ErrorGameStartFailed).await;
		return Ok(RunResult::failure("failed to start the game"));
	}

	let mut questions_solved = 0u32;
	for question_num in 1..=config.max_questions {
		match answer_question(session, solver, question_num).await {
			Ok(QuestionOutcome::Answered { more }) => {
				questions_solved += 1;
				if !more {
					break;
				}
			}
			Ok(QuestionOutcome::NoOptions) => break,
			// Per-question errors end the loop but keep the progress so far.
			Err(e) => {
				tracing::error!("question {question_num} failed: {e}");
				session.capture(Step::ErrorQuestion(question_num)).await;
				break;
			}
		}
	}
	tracing::info!("answered {questions_solved} question(s)");

	let points_received = claim_reward(session).await;

	Ok(RunResult {
		success: true,
		error: None,
		questions_solved,
		points_received,
		status: "completed".to_string(),
	})
}

enum QuestionOutcome {
	Answered { more: bool },
	NoOptions,
}

async fn answer_question(session: &Session, solver: &Solver, question_num: u32) -> Result<QuestionOutcome> {
	let config = &session.config;
	let page = session.page();

	tracing::info!("solving question {question_num}");
	settle(2).await;
	session.capture(Step::QuestionLoaded(question_num)).await;

	let page_text = read_page_text(page).await?;

	let candidates = find_answer_candidates(page, config).await?;
	if candidates.is_empty() {
		tracing::warn!("no answer options found for question {question_num}");
		session.capture(Step::ErrorNoOptions(question_num)).await;
		return Ok(QuestionOutcome::NoOptions);
	}

	let labels: Vec<String> = candidates.iter().map(|(_, label)| label.clone()).collect();
	let decision = solver.solve_from_page(&page_text, &labels).await;

	let index = if decision.success {
		// The model saw a numbered list that may differ from the live
		// buttons; clamp to what is actually clickable.
		let index = decision.answer_index.min(candidates.len() - 1);
		tracing::info!(
			"model picked option {} ({:?}) with confidence {:.2}: {}",
			index + 1,
			labels[index],
			decision.confidence,
			decision.reasoning
		);
		index
	} else {
		tracing::warn!("answer selection failed ({}), falling back to the first option", decision.reasoning);
		0
	};

	candidates[index].0.click().await.map_err(|e| eyre!("failed to click option {}: {e}", index + 1))?;
	settle(2).await;
	session.capture(Step::QuestionAnswered(question_num)).await;

	// Move on - unless this was the final question, which has no next button.
	if click_button_with_any_text(page, &config.next_labels).await? {
		settle(2).await;
		session.capture(Step::NextQuestion(question_num)).await;
		Ok(QuestionOutcome::Answered { more: true })
	} else {
		session.capture(Step::FinalQuestion(question_num)).await;
		Ok(QuestionOutcome::Answered { more: false })
	}
}

/// Candidate answer buttons paired with their visible labels. Site-specific
/// class heuristic first, then any button that isn't plain navigation.
async fn find_answer_candidates(page: &Page, config: &AppConfig) -> Result<Vec<(Element, String)>> {
	let mut candidates = collect_labeled(page, "button[class*='answer']", &[]).await;
	if candidates.is_empty() {
		candidates = collect_labeled(page, "button", &config.navigation_labels).await;
	}
	Ok(candidates)
}

async fn collect_labeled(page: &Page, selector: &str, excluded_labels: &[String]) -> Vec<(Element, String)> {
	let elements = page.find_elements(selector).await.unwrap_or_default();
	let mut out = Vec::new();
	for element in elements {
		let label = element.inner_text().await.ok().flatten().unwrap_or_default().trim().to_string();
		if label.is_empty() || excluded_labels.iter().any(|excluded| label.contains(excluded.as_str())) {
			continue;
		}
		out.push((element, label));
	}
	out
}

/// Reward claim is best-effort: a missing button records zero points, an
/// error is logged with its screenshot, and neither fails the run.
async fn claim_reward(session: &Session) -> u32 {
	match try_claim_reward(session).await {
		Ok(true) => session.config.reward_points,
		Ok(false) => 0,
		Err(e) => {
			tracing::warn!("points claim failed: {e}");
			session.capture(Step::ErrorPointsClaim).await;
			0
		}
	}
}

async fn try_claim_reward(session: &Session) -> Result<bool> {
	let page = session.page();
	if click_button_with_any_text(page, &session.config.claim_markers).await? {
		tracing::info!("points claimed");
		settle(2).await;
		session.capture(Step::PointsClaimed).await;
		Ok(true)
	} else {
		session.capture(Step::NoPointsButton).await;
		Ok(false)
	}
}

// --- browser helpers shared with the login phase ---

pub(crate) async fn settle(secs: u64) {
	tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Poll for a selector until it appears or the timeout elapses.
pub(crate) async fn wait_for_element(page: &Page, selector: &str, timeout_secs: u64) -> Result<Element> {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
	loop {
		match page.find_element(selector).await {
			Ok(element) => return Ok(element),
			Err(_) if tokio::time::Instant::now() < deadline => tokio::time::sleep(Duration::from_millis(100)).await,
			Err(_) => return Err(eyre!("timed out waiting for '{selector}'")),
		}
	}
}

/// Poll for a button carrying the given label until it appears or the
/// timeout elapses. Returns false on timeout rather than erroring - callers
/// decide whether absence is fatal.
pub(crate) async fn wait_for_button_with_text(page: &Page, label: &str, timeout_secs: u64) -> Result<bool> {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
	loop {
		if button_with_any_text_exists(page, &[label]).await? {
			return Ok(true);
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(Duration::from_millis(500)).await;
	}
}

async fn button_with_any_text_exists(page: &Page, labels: &[impl AsRef<str>]) -> Result<bool> {
	run_button_script(page, labels, false).await
}

/// Click the first button whose visible text contains any of the labels.
pub(crate) async fn click_button_with_any_text(page: &Page, labels: &[impl AsRef<str>]) -> Result<bool> {
	run_button_script(page, labels, true).await
}

async fn run_button_script(page: &Page, labels: &[impl AsRef<str>], click: bool) -> Result<bool> {
	let labels: Vec<&str> = labels.iter().map(|l| l.as_ref()).collect();
	let labels_json = serde_json::to_string(&labels)?;
	let script = format!(
		r#"
		(function() {{
			const labels = {labels_json};
			const buttons = Array.from(document.querySelectorAll('button, input[type="button"], input[type="submit"], a[role="button"]'));
			const target = buttons.find(btn => {{
				const text = (btn.textContent || btn.value || '').trim();
				return labels.some(label => text.includes(label));
			}});
			if (!target) return false;
			if ({click}) target.click();
			return true;
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("button lookup failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
}

/// True when the page body contains any of the marker strings.
pub(crate) async fn page_contains_any(page: &Page, markers: &[String]) -> Result<bool> {
	let markers_json = serde_json::to_string(markers)?;
	let script = format!(
		r#"
		(function() {{
			const markers = {markers_json};
			const text = document.body ? document.body.innerText : '';
			return markers.some(marker => text.includes(marker));
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("marker scan failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Set an input's value via JS. More reliable than synthesized keystrokes on
/// this form, and JSON-encoding keeps arbitrary passwords intact.
pub(crate) async fn fill_input(page: &Page, selector: &str, value: &str) -> Result<bool> {
	let selector_json = serde_json::to_string(selector)?;
	let value_json = serde_json::to_string(value)?;
	let script = format!(
		r#"
		(function() {{
			const field = document.querySelector({selector_json});
			if (!field) return false;
			field.value = {value_json};
			field.dispatchEvent(new Event('input', {{ bubbles: true }}));
			return true;
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("failed to fill input: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Click the form's forward button - consistently the last submit-ish input
/// on this site.
pub(crate) async fn click_submit(page: &Page) -> Result<bool> {
	let script = r#"
		(function() {
			const buttons = document.querySelectorAll('input[type="submit"], input[type="button"], button[type="submit"]');
			if (buttons.length === 0) return false;
			buttons[buttons.length - 1].click();
			return true;
		})()
	"#;
	let result = page.evaluate(script).await.map_err(|e| eyre!("failed to click submit: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Visible text of the page, as the extraction heuristics expect it.
pub(crate) async fn read_page_text(page: &Page) -> Result<String> {
	let result = page
		.evaluate("document.body ? document.body.innerText : ''")
		.await
		.map_err(|e| eyre!("failed to read page text: {e}"))?;
	Ok(result.value().and_then(|v| v.as_str()).unwrap_or_default().to_string())
}
