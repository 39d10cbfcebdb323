use anyhow::{Context as _, Result};

use gptrepl::config::{api_key_help_lines, load_initial_context, resolve_api_key};
use gptrepl::logging::init_logging;
use gptrepl::providers::{provider_for_id, requires_api_key, DEFAULT_PROVIDER_ID};
use gptrepl::{
    Cli, CompletionClient, ConsolePrinter, EnvConfig, ExternalEditor, Printer, RustylineReader,
    Session,
};

fn main() {
    init_logging();

    let code = match run() {
        Ok(code) => code,
        Err(error) => {
            ConsolePrinter.error(&format!("{error:#}"));
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse_normalized();
    let env = EnvConfig::from_env();
    let provider_id = env.provider.as_deref().unwrap_or(DEFAULT_PROVIDER_ID).trim();

    let home = dirs::home_dir();
    let api_key = resolve_api_key(cli.apikey.as_deref(), env.api_key.as_deref(), home.as_deref());
    if api_key.is_none() && requires_api_key(provider_id) {
        let mut printer = ConsolePrinter;
        for line in api_key_help_lines(home.as_deref()) {
            printer.error(&line);
        }
        return Ok(1);
    }

    let context = load_initial_context(&cli).context("failed to load startup context")?;
    let provider = provider_for_id(provider_id, api_key.as_deref(), &env)
        .map_err(anyhow::Error::msg)?;
    tracing::debug!(provider = provider_id, model = %cli.model, "starting session");

    let client = CompletionClient::new(provider, cli.maxretries);
    let editor = ExternalEditor::from_setting(env.text_editor.as_deref());
    let mut session = Session::new(
        cli.session_options(),
        context,
        client,
        Box::new(ConsolePrinter),
        Box::new(editor),
    );

    let mut reader = RustylineReader::new().context("failed to initialize readline")?;
    Ok(session.run(&mut reader))
}
