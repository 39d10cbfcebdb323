use std::fs;
use std::path::PathBuf;

use clap::Parser;
use context_store::write_context_file;
use gptrepl::config::{
    load_initial_context, normalize_legacy_flags, resolve_api_key, DEFAULT_MAX_RETRIES,
    DEFAULT_MODEL,
};
use gptrepl::{Cli, Message};
use pretty_assertions::assert_eq;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["gptrepl"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(normalize_legacy_flags(argv)).expect("arguments parse")
}

#[test]
fn defaults_match_the_documented_flag_surface() {
    let cli = parse(&[]);

    assert_eq!(cli.model, DEFAULT_MODEL);
    assert_eq!(cli.maxretries, DEFAULT_MAX_RETRIES);
    assert!(cli.ctx.is_empty());
    assert!(cli.apikey.is_none());
    assert!(!cli.nocommands && !cli.quiet && !cli.forgetful);
    assert!(cli.autosave.is_none());
    assert!(!cli.autosave_prevent_load);

    let options = cli.session_options();
    assert!(options.commands_enabled);
    assert_eq!(options.model, "gpt-4");
}

#[test]
fn single_dash_flags_are_accepted() {
    let cli = parse(&[
        "-ctx",
        "a.json",
        "-ctx=b.json",
        "-model",
        "gpt-3.5-turbo",
        "-maxretries",
        "0",
        "-nocommands",
        "-quiet",
        "-forgetful",
        "-autosave",
        "auto.json",
        "-autosave-prevent-load",
        "-apikey",
        "sk-flag",
    ]);

    assert_eq!(cli.ctx, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    assert_eq!(cli.model, "gpt-3.5-turbo");
    assert_eq!(cli.maxretries, 0);
    assert_eq!(cli.apikey.as_deref(), Some("sk-flag"));
    assert!(cli.autosave_prevent_load);

    let options = cli.session_options();
    assert!(!options.commands_enabled);
    assert!(options.quiet);
    assert!(options.forgetful);
    assert_eq!(options.autosave_path, Some(PathBuf::from("auto.json")));
}

#[test]
fn negative_retry_count_is_rejected() {
    let argv = normalize_legacy_flags(["gptrepl", "-maxretries", "-1"]);
    assert!(Cli::try_parse_from(argv).is_err());
}

#[test]
fn api_key_sources_are_tried_in_order() {
    let home = tempfile::tempdir().expect("tempdir");
    fs::write(home.path().join(".gptrepl-key"), "  sk-file \n").expect("key file");

    assert_eq!(
        resolve_api_key(Some("sk-flag"), Some("sk-env"), Some(home.path())).as_deref(),
        Some("sk-flag")
    );
    assert_eq!(
        resolve_api_key(None, Some("sk-env"), Some(home.path())).as_deref(),
        Some("sk-env")
    );
    assert_eq!(
        resolve_api_key(Some(""), None, Some(home.path())).as_deref(),
        Some("sk-file")
    );
}

#[test]
fn missing_or_blank_key_file_yields_no_key() {
    let home = tempfile::tempdir().expect("tempdir");
    assert_eq!(resolve_api_key(None, None, Some(home.path())), None);
    assert_eq!(resolve_api_key(None, None, None), None);

    fs::write(home.path().join(".gptrepl-key"), " \n").expect("key file");
    assert_eq!(resolve_api_key(None, None, Some(home.path())), None);
}

#[test]
fn startup_context_loads_ctx_files_in_order_then_autosave_last() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    let autosave = dir.path().join("auto.json");
    write_context_file(&first, &[Message::system("one")]).expect("first");
    write_context_file(&second, &[Message::user("two")]).expect("second");
    write_context_file(&autosave, &[Message::assistant("three")]).expect("autosave");

    let cli = parse(&[
        "--autosave",
        autosave.to_str().expect("utf-8 path"),
        "--ctx",
        first.to_str().expect("utf-8 path"),
        "--ctx",
        second.to_str().expect("utf-8 path"),
    ]);
    let context = load_initial_context(&cli).expect("context loads");

    assert_eq!(
        context.messages(),
        &[
            Message::system("one"),
            Message::user("two"),
            Message::assistant("three"),
        ]
    );
}

#[test]
fn autosave_is_skipped_when_prevented_or_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let autosave = dir.path().join("auto.json");
    let autosave_arg = autosave.to_str().expect("utf-8 path");

    let missing = parse(&["--autosave", autosave_arg]);
    assert!(load_initial_context(&missing).expect("missing file is fine").is_empty());

    write_context_file(&autosave, &[Message::user("saved")]).expect("autosave");
    let prevented = parse(&["--autosave", autosave_arg, "--autosave-prevent-load"]);
    assert!(load_initial_context(&prevented).expect("prevented").is_empty());
}

#[test]
fn unreadable_startup_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").expect("fixture");

    let cli = parse(&["--ctx", broken.to_str().expect("utf-8 path")]);
    let error = load_initial_context(&cli).expect_err("parse failure");

    assert!(error.to_string().starts_with("failed to parse context file"));
}
