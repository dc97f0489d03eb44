//! Conversational front end: a linear dialogue that collects credentials,
//! kicks off an automation run, relays its screenshots and reports the
//! outcome. Transport-agnostic - anything that can pass text and images
//! through [`ChatTransport`] works.

use std::{future::Future, path::Path};

use color_eyre::Result;
use tokio::sync::mpsc;

use crate::{Credentials, RunResult, ScreenshotEvent, config::AppConfig, phone_number_is_valid};

pub const CANCEL_COMMAND: &str = "/cancel";
pub const HELP_COMMAND: &str = "/help";

/// Message delivery primitives the dialogue needs. User identity, command
/// routing and session bookkeeping stay with the transport's owner.
pub trait ChatTransport {
	/// Next text message from the user; `None` when the conversation closed.
	fn recv(&mut self) -> impl Future<Output = Result<Option<String>>>;
	fn send_text(&mut self, text: &str) -> impl Future<Output = Result<()>>;
	fn send_photo(&mut self, path: &Path, caption: &str) -> impl Future<Output = Result<()>>;
}

/// Conversation phases, one arm per prompt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DialogueState {
	AwaitingPhone,
	AwaitingPassword,
	Processing,
}

/// Drive one full dialogue over `transport`. The automation itself is
/// injected as `runner` so the conversation logic stays testable; the
/// screenshot sender passed to it feeds the photo relay.
pub async fn run_dialogue<T, R, Fut>(transport: &mut T, config: &AppConfig, runner: R) -> Result<()>
where
	T: ChatTransport,
	R: FnOnce(Credentials, mpsc::UnboundedSender<ScreenshotEvent>) -> Fut,
	Fut: Future<Output = RunResult> + Send + 'static,
{
	transport.send_text(&greeting(config)).await?;

	let mut state = DialogueState::AwaitingPhone;
	let mut phone_number = String::new();
	let mut credentials = None;

	while credentials.is_none() {
		let Some(message) = transport.recv().await? else {
			return Ok(());
		};
		let message = message.trim().to_string();

		if message == CANCEL_COMMAND {
			transport.send_text("❌ Cancelled. Send /start to begin a new session.").await?;
			return Ok(());
		}
		// Help answers in place; the current prompt stays pending.
		if message == HELP_COMMAND {
			transport.send_text(&help_text(config)).await?;
			continue;
		}

		state = match state {
			DialogueState::AwaitingPhone =>
				if phone_number_is_valid(&message, &config.phone_prefix) {
					phone_number = message;
					transport
						.send_text(&format!("✅ Phone number saved: {phone_number}\n\nNow send the password:"))
						.await?;
					DialogueState::AwaitingPassword
				} else {
					transport
						.send_text(&format!(
							"❌ That phone number doesn't look right!\nIt must be 10 characters starting with {}. Try again:",
							config.phone_prefix
						))
						.await?;
					DialogueState::AwaitingPhone
				},
			DialogueState::AwaitingPassword => {
				credentials = Some(Credentials {
					phone_number: phone_number.clone(),
					password: message,
				});
				DialogueState::Processing
			}
			// The loop exits as soon as credentials are set.
			DialogueState::Processing => DialogueState::Processing,
		};
	}
	debug_assert_eq!(state, DialogueState::Processing);

	transport
		.send_text("✅ Password saved!\n\n🔄 Logging in and solving the questions...\nPlease wait...")
		.await?;

	let Some(credentials) = credentials.take() else {
		return Ok(());
	};
	let (sender, mut receiver) = mpsc::unbounded_channel();
	let run = tokio::spawn(runner(credentials, sender));

	// Relay screenshots as they arrive; the channel closes when the run is
	// done. Relay failures are logged and skipped, never fatal to the run.
	while let Some(ScreenshotEvent { path, step }) = receiver.recv().await {
		if let Err(e) = transport.send_photo(&path, &step.caption()).await {
			tracing::warn!("failed to relay screenshot {}: {e}", path.display());
		}
	}

	let result = match run.await {
		Ok(result) => result,
		Err(e) => {
			tracing::error!("automation task crashed: {e}");
			RunResult::failure("technical error, please try again later")
		}
	};

	transport.send_text(&summary(&result)).await?;
	Ok(())
}

fn greeting(config: &AppConfig) -> String {
	format!(
		"Hello! 🎮 I'm the Barns EWC 2025 bot.\nI'll log in, solve the questions and claim the points for you.\n\nPlease send the phone number (e.g. {}):",
		config.phone_placeholder
	)
}

fn summary(result: &RunResult) -> String {
	if result.success {
		format!(
			"🎉 Done!\n\n📊 Results:\n• Logged in: ✅\n• Questions solved: {}\n• Points received: {}\n• Status: {}\n\nSend /start to begin a new session.",
			result.questions_solved, result.points_received, result.status
		)
	} else {
		format!(
			"❌ Something went wrong!\n\nReason: {}\n\nTry again later or double-check the credentials.\nSend /start to begin a new session.",
			result.error.as_deref().unwrap_or("unknown error")
		)
	}
}

/// Static help, shown on `/help` at any prompt.
pub fn help_text(config: &AppConfig) -> String {
	format!(
		"🤖 Barns EWC 2025 bot\n\nCommands:\n• /start - begin a new session\n• /help - show this help\n• /cancel - abort the current session\n\nHow to use:\n1. Send /start\n2. Send the phone number (10 characters starting with {})\n3. Send the password\n4. Wait for the run to finish\n\nThe bot will:\n✅ log in to the site\n✅ solve the questions automatically\n✅ claim the points\n✅ send a report with the results",
		config.phone_prefix
	)
}

#[cfg(test)]
mod tests {
	use std::{
		collections::VecDeque,
		path::PathBuf,
		sync::{
			Arc, Mutex,
			atomic::{AtomicBool, Ordering},
		},
	};

	use super::*;
	use crate::Step;

	struct ScriptedTransport {
		incoming: VecDeque<String>,
		sent: Vec<String>,
		photos: Vec<(PathBuf, String)>,
	}

	impl ScriptedTransport {
		fn new(messages: &[&str]) -> Self {
			Self {
				incoming: messages.iter().map(|m| m.to_string()).collect(),
				sent: Vec::new(),
				photos: Vec::new(),
			}
		}
	}

	impl ChatTransport for ScriptedTransport {
		async fn recv(&mut self) -> Result<Option<String>> {
			Ok(self.incoming.pop_front())
		}

		async fn send_text(&mut self, text: &str) -> Result<()> {
			self.sent.push(text.to_string());
			Ok(())
		}

		async fn send_photo(&mut self, path: &Path, caption: &str) -> Result<()> {
			self.photos.push((path.to_path_buf(), caption.to_string()));
			Ok(())
		}
	}

	fn success_result() -> RunResult {
		RunResult {
			success: true,
			error: None,
			questions_solved: 3,
			points_received: 500,
			status: "completed".to_string(),
		}
	}

	#[tokio::test]
	async fn happy_path_relays_screenshots_and_reports() {
		let mut transport = ScriptedTransport::new(&["0576183980", "hunter2"]);
		let config = AppConfig::default();
		let seen = Arc::new(Mutex::new(None));
		let seen_in_runner = Arc::clone(&seen);

		run_dialogue(&mut transport, &config, move |credentials, sender| async move {
			*seen_in_runner.lock().unwrap() = Some(credentials);
			let _ = sender.send(ScreenshotEvent {
				path: PathBuf::from("/tmp/01_website_loaded.png"),
				step: Step::WebsiteLoaded,
			});
			success_result()
		})
		.await
		.unwrap();

		let credentials = seen.lock().unwrap().clone().expect("runner should have been invoked");
		assert_eq!(credentials.phone_number, "0576183980");
		assert_eq!(credentials.password, "hunter2");

		assert_eq!(transport.photos.len(), 1);
		assert_eq!(transport.photos[0].1, Step::WebsiteLoaded.caption());

		let last = transport.sent.last().unwrap();
		assert!(last.contains("Questions solved: 3"), "summary was: {last}");
		assert!(last.contains("Points received: 500"));
	}

	#[tokio::test]
	async fn invalid_phone_number_is_reprompted_without_limit() {
		let mut transport = ScriptedTransport::new(&["123456", "0512345", "0576183980", "pw"]);
		let config = AppConfig::default();

		run_dialogue(&mut transport, &config, |_credentials, _sender| async move { success_result() })
			.await
			.unwrap();

		let reprompts = transport.sent.iter().filter(|m| m.contains("doesn't look right")).count();
		assert_eq!(reprompts, 2);
		assert!(transport.sent.last().unwrap().contains("Done"));
	}

	#[tokio::test]
	async fn help_answers_in_place_and_keeps_the_session_going() {
		let mut transport = ScriptedTransport::new(&["/help", "0576183980", "/help", "pw"]);
		let config = AppConfig::default();

		run_dialogue(&mut transport, &config, |_credentials, _sender| async move { success_result() })
			.await
			.unwrap();

		let help_messages = transport.sent.iter().filter(|m| m.contains("Commands:")).count();
		assert_eq!(help_messages, 2, "help requested at both prompts");
		assert!(transport.sent.last().unwrap().contains("Done"), "run still completes after /help");
	}

	#[tokio::test]
	async fn cancel_aborts_before_the_run_starts() {
		let mut transport = ScriptedTransport::new(&["/cancel"]);
		let config = AppConfig::default();
		let ran = Arc::new(AtomicBool::new(false));
		let ran_in_runner = Arc::clone(&ran);

		run_dialogue(&mut transport, &config, move |_credentials, _sender| async move {
			ran_in_runner.store(true, Ordering::SeqCst);
			success_result()
		})
		.await
		.unwrap();

		assert!(!ran.load(Ordering::SeqCst), "runner must not start after cancel");
		assert!(transport.sent.last().unwrap().contains("Cancelled"));
	}

	#[tokio::test]
	async fn cancel_works_at_the_password_prompt_too() {
		let mut transport = ScriptedTransport::new(&["0576183980", "/cancel"]);
		let config = AppConfig::default();

		run_dialogue(&mut transport, &config, |_credentials, _sender| async move { success_result() })
			.await
			.unwrap();

		assert!(transport.sent.last().unwrap().contains("Cancelled"));
	}

	#[tokio::test]
	async fn failed_run_reports_the_reason() {
		let mut transport = ScriptedTransport::new(&["0576183980", "pw"]);
		let config = AppConfig::default();

		run_dialogue(&mut transport, &config, |_credentials, _sender| async move {
			RunResult::failure("unknown login failure")
		})
		.await
		.unwrap();

		let last = transport.sent.last().unwrap();
		assert!(last.contains("Something went wrong"));
		assert!(last.contains("unknown login failure"));
	}

	#[tokio::test]
	async fn closed_conversation_ends_the_dialogue_quietly() {
		let mut transport = ScriptedTransport::new(&[]);
		let config = AppConfig::default();

		run_dialogue(&mut transport, &config, |_credentials, _sender| async move { success_result() })
			.await
			.unwrap();

		// Only the greeting went out; the runner never started.
		assert_eq!(transport.sent.len(), 1);
	}
}
