//! Login phase: open the site, pick the language, submit the phone number
//! and password, then verify the result. Fatal here short-circuits the run;
//! every sub-step leaves a screenshot behind.

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::{
	Credentials, Step,
	runner::{Session, click_button_with_any_text, click_submit, fill_input, page_contains_any, settle, wait_for_button_with_text, wait_for_element},
};

/// Structured outcome of the login phase.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginOutcome {
	pub success: bool,
	pub error: Option<String>,
}

impl LoginOutcome {
	fn ok() -> Self {
		Self { success: true, error: None }
	}

	fn failure(error: impl Into<String>) -> Self {
		Self {
			success: false,
			error: Some(error.into()),
		}
	}
}

/// Phase boundary: unexpected errors below are caught here and converted
/// into a structured failure, never propagated to the front end.
pub async fn login(session: &Session, credentials: &Credentials) -> LoginOutcome {
	match login_inner(session, credentials).await {
		Ok(outcome) => outcome,
		Err(e) => {
			tracing::error!("login failed unexpectedly: {e}");
			LoginOutcome::failure(format!("login error: {e}"))
		}
	}
}

async fn login_inner(session: &Session, credentials: &Credentials) -> Result<LoginOutcome> {
	let config = &session.config;
	let page = session.page();

	tracing::info!("opening {}", config.base_url);
	page.goto(&config.base_url).await?;
	settle(2).await;
	session.capture(Step::WebsiteLoaded).await;

	// The language picker only shows on the first visit; missing is fine.
	if wait_for_button_with_text(page, &config.language_label, config.element_timeout_secs).await? {
		click_button_with_any_text(page, std::slice::from_ref(&config.language_label)).await?;
		settle(2).await;
		session.capture(Step::LanguageSelected).await;
		tracing::info!("language selected");
	} else {
		tracing::warn!("language button not found, continuing");
	}

	// Phone number.
	let phone_selector = format!(r#"input[placeholder="{}"]"#, config.phone_placeholder);
	match wait_for_element(page, &phone_selector, config.element_timeout_secs).await {
		Ok(_) => {
			fill_input(page, &phone_selector, &credentials.phone_number).await?;
			tracing::info!("phone number entered");
			session.capture(Step::PhoneEntered).await;

			click_submit(page).await?;
			settle(2).await;
			session.capture(Step::PhoneSubmitted).await;
		}
		Err(e) => {
			tracing::error!("phone input not found: {e}");
			session.capture(Step::ErrorPhoneInput).await;
			return Ok(LoginOutcome::failure("failed to enter the phone number"));
		}
	}

	// Password.
	let password_selector = format!(r#"input[placeholder="{}"], input[type="password"]"#, config.password_placeholder);
	match wait_for_element(page, &password_selector, config.element_timeout_secs).await {
		Ok(_) => {
			fill_input(page, &password_selector, &credentials.password).await?;
			tracing::info!("password entered");
			session.capture(Step::PasswordEntered).await;

			click_submit(page).await?;
			settle(3).await;
			session.capture(Step::LoginSubmitted).await;
		}
		Err(e) => {
			tracing::error!("password input not found: {e}");
			session.capture(Step::ErrorPasswordInput).await;
			return Ok(LoginOutcome::failure("failed to enter the password"));
		}
	}

	// Verify: the start-game button means we're in; an error banner means bad
	// credentials; neither within the timeout is an unknown failure.
	if wait_for_button_with_text(page, &config.start_game_label, config.element_timeout_secs).await? {
		tracing::info!("login verified");
		session.capture(Step::LoginSuccess).await;
		return Ok(LoginOutcome::ok());
	}

	let outcome = if page_contains_any(page, &config.error_markers).await? {
		LoginOutcome::failure("incorrect login credentials")
	} else {
		LoginOutcome::failure("unknown login failure")
	};
	tracing::error!("login failed: {:?}", outcome.error);
	session.capture(Step::ErrorLoginFailed).await;
	Ok(outcome)
}
