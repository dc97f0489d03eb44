use std::path::Path;

use barns_headless::{
	config::AppConfig,
	dialogue::{self, ChatTransport},
	runner,
};
use clap::Parser;
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "barns_headless")]
#[command(about = "Automated Barns EWC quiz login, answering and reward claiming", long_about = None)]
struct Args {
	/// Run with visible browser window (non-headless mode)
	#[arg(long)]
	visible: bool,

	/// Override the target site URL
	#[arg(long)]
	base_url: Option<String>,

	/// Override the model used for answer selection
	#[arg(long)]
	model: Option<String>,

	/// Override the directory step screenshots are written to
	#[arg(long)]
	screenshots_dir: Option<String>,
}

/// Plain stdin/stdout transport for driving the dialogue from a terminal.
/// Photos are reported as saved-file lines instead of inline images.
struct ConsoleTransport {
	lines: Lines<BufReader<Stdin>>,
}

impl ConsoleTransport {
	fn new() -> Self {
		Self {
			lines: BufReader::new(tokio::io::stdin()).lines(),
		}
	}
}

impl ChatTransport for ConsoleTransport {
	async fn recv(&mut self) -> Result<Option<String>> {
		Ok(self.lines.next_line().await?)
	}

	async fn send_text(&mut self, text: &str) -> Result<()> {
		println!("{text}\n");
		Ok(())
	}

	async fn send_photo(&mut self, path: &Path, caption: &str) -> Result<()> {
		println!("{caption} [screenshot: {}]", path.display());
		Ok(())
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let mut config = AppConfig::from_env();
	config.visible = args.visible;
	if let Some(base_url) = args.base_url {
		config.base_url = base_url;
	}
	if let Some(model) = args.model {
		config.model = model;
	}
	if let Some(screenshots_dir) = args.screenshots_dir {
		config.screenshots_dir = screenshots_dir;
	}

	let mut transport = ConsoleTransport::new();
	let run_config = config.clone();
	dialogue::run_dialogue(&mut transport, &config, move |credentials, sender| {
		runner::run_automation(run_config, credentials, Some(sender))
	})
	.await
}
