use std::process::ExitCode;

use client::Client;
use client::ClientError;
use client::config::Cli;
use client::config::Parser;
use client::config::setup;
use client::format::format_reply;
use resp::Command;
use resp::PipelineError;
use resp::Response;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> ExitCode {
	let args = Cli::parse();
	match run(args).await {
		Ok(code) => code,
		Err(e) => {
			eprintln!("{}", e);
			ExitCode::FAILURE
		}
	}
}

async fn run(args: Cli) -> Result<ExitCode, ClientError> {
	let config = setup(&args)?;
	let client = Client::connect(&config).await?;

	if let Some((name, rest)) = args.command.split_first() {
		let command = Command::new(name.clone()).args(rest.iter().cloned());
		let reply = client.send(command).await?;
		println!("{}", format_reply(&reply));
		return Ok(ExitCode::SUCCESS);
	}

	// Pipeline every line from stdin, then print the replies in order
	let mut submitted: Vec<Result<Response, PipelineError>> = Vec::new();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = lines.next_line().await? {
		match Command::parse_line(&line) {
			Ok(Some(command)) => submitted.push(Ok(client.send(command))),
			Ok(None) => {}
			Err(e) => submitted.push(Err(e)),
		}
	}
	drop(client);

	let mut code = ExitCode::SUCCESS;
	for entry in submitted {
		let result = match entry {
			Ok(response) => response.await,
			Err(e) => Err(e),
		};
		match result {
			Ok(reply) => println!("{}", format_reply(&reply)),
			Err(e) => {
				eprintln!("(error) {}", e);
				code = ExitCode::FAILURE;
			}
		}
	}
	Ok(code)
}
