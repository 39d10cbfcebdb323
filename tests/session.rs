mod support;

use std::time::Duration;

use completion_provider_mock::MockOutcome;
use context_store::read_context_file;
use gptrepl::{Message, SessionOptions};
use pretty_assertions::assert_eq;

use support::{harness, ScriptedLineReader};

#[test]
fn send_records_streamed_reply_and_mirrors_autosave() {
    let dir = tempfile::tempdir().expect("tempdir");
    let autosave = dir.path().join("session.json");
    let mut h = harness()
        .options(SessionOptions {
            autosave_path: Some(autosave.clone()),
            ..SessionOptions::default()
        })
        .outcomes([MockOutcome::respond(["abc ", "def"])])
        .build();

    h.session.handle_line("/append user b");
    h.session.handle_line("/send");

    let expected = vec![Message::user("b"), Message::assistant("abc def")];
    assert_eq!(h.messages(), expected);
    assert_eq!(read_context_file(&autosave).expect("autosave readable"), expected);
    assert_eq!(h.output().stdout(), "abc def\n");
    assert!(h.output().errors.is_empty());
}

#[test]
fn every_mutating_command_rewrites_autosave() {
    let dir = tempfile::tempdir().expect("tempdir");
    let autosave = dir.path().join("session.json");
    let mut h = harness()
        .options(SessionOptions {
            autosave_path: Some(autosave.clone()),
            ..SessionOptions::default()
        })
        .messages([Message::system("s")])
        .build();

    h.session.handle_line("/append user x");
    assert_eq!(
        read_context_file(&autosave).expect("written after append"),
        vec![Message::system("s"), Message::user("x")]
    );

    h.session.handle_line("/pop 1");
    assert_eq!(
        read_context_file(&autosave).expect("written after pop"),
        vec![Message::system("s")]
    );
    assert_eq!(h.messages(), vec![Message::system("s")]);
    assert!(h.output().errors.is_empty());
}

#[test]
fn plain_input_asks_and_records_both_sides() {
    let mut h = harness()
        .messages([Message::system("be brief")])
        .outcomes([MockOutcome::respond(["hi ", "there"])])
        .build();

    h.session.handle_line("  hello  ");

    assert_eq!(
        h.messages(),
        vec![
            Message::system("be brief"),
            Message::user("hello"),
            Message::assistant("hi there"),
        ]
    );
    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model_id, "gpt-4");
    assert_eq!(
        requests[0].messages,
        vec![Message::system("be brief"), Message::user("hello")]
    );
}

#[test]
fn blank_lines_are_ignored() {
    let mut h = harness().build();

    h.session.handle_line("   \t ");

    assert!(h.messages().is_empty());
    assert_eq!(h.provider.request_count(), 0);
}

#[test]
fn forgetful_mode_leaves_context_untouched_after_success() {
    let mut h = harness()
        .options(SessionOptions {
            forgetful: true,
            ..SessionOptions::default()
        })
        .messages([Message::system("a")])
        .outcomes([MockOutcome::respond(["abc ", "def"])])
        .build();

    h.session.handle_line("b");

    assert_eq!(h.messages(), vec![Message::system("a")]);
    assert_eq!(
        h.provider.requests()[0].messages,
        vec![Message::system("a"), Message::user("b")]
    );
    assert_eq!(h.output().stdout(), "abc def\n");
    assert!(h.output().errors.is_empty());
}

#[test]
fn failed_exchange_is_retried_then_retracted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let autosave = dir.path().join("session.json");
    let mut h = harness()
        .options(SessionOptions {
            autosave_path: Some(autosave.clone()),
            ..SessionOptions::default()
        })
        .messages([Message::system("s")])
        .max_retries(2)
        .outcomes([
            MockOutcome::fail_to_connect("down"),
            MockOutcome::fail_to_connect("down"),
            MockOutcome::fail_to_connect("down"),
        ])
        .build();

    h.session.handle_line("hello");

    assert_eq!(h.messages(), vec![Message::system("s")]);
    assert_eq!(
        h.output().errors,
        vec!["failed to send context after 3 attempts: down (no changes done to context)"]
    );
    assert_eq!(h.provider.request_count(), 3);
    assert_eq!(h.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    assert_eq!(
        read_context_file(&autosave).expect("autosave readable"),
        vec![Message::system("s")]
    );
}

#[test]
fn mid_stream_failure_keeps_partial_output_but_not_the_exchange() {
    let mut h = harness()
        .outcomes([MockOutcome::RespondThenFail(
            vec!["par".to_string()],
            "reset".to_string(),
        )])
        .build();

    h.session.handle_line("question");

    assert!(h.messages().is_empty());
    assert_eq!(h.output().stdout(), "par\n");
    assert_eq!(
        h.output().errors,
        vec!["stream error: reset (no changes done to context)"]
    );
    assert_eq!(h.provider.request_count(), 1);
    assert!(h.sleeps().is_empty());
}

#[test]
fn unknown_command_never_reaches_the_provider() {
    let mut h = harness().messages([Message::user("keep")]).build();

    h.session.handle_line("/frobnicate now");

    assert_eq!(h.output().errors, vec!["unknown command: frobnicate"]);
    assert_eq!(h.provider.request_count(), 0);
    assert_eq!(h.messages(), vec![Message::user("keep")]);
}

#[test]
fn disabled_commands_are_sent_as_plain_text() {
    let mut h = harness()
        .options(SessionOptions {
            commands_enabled: false,
            ..SessionOptions::default()
        })
        .build();

    h.session.handle_line("/help");

    assert_eq!(
        h.messages(),
        vec![Message::user("/help"), Message::assistant("You said: /help")]
    );
}

#[test]
fn autosave_write_failure_is_reported_without_rollback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let autosave = dir.path().join("missing").join("session.json");
    let mut h = harness()
        .options(SessionOptions {
            autosave_path: Some(autosave.clone()),
            ..SessionOptions::default()
        })
        .build();

    h.session.handle_line("/append user kept");

    assert_eq!(h.messages(), vec![Message::user("kept")]);
    let errors = h.output().errors.clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with(&format!(
        "failed to write to file \"{}\": ",
        autosave.display()
    )));
}

#[test]
fn run_prints_banner_and_prompt_until_end_of_input() {
    let mut h = harness().build();
    let (mut reader, prompts) = ScriptedLineReader::new(["ping"]);

    let code = h.session.run(&mut reader);

    assert_eq!(code, 0);
    assert_eq!(
        h.output().stdout(),
        "Enter \"/help\" for a list of commands.\nYou said: ping\n"
    );
    assert_eq!(
        *prompts.lock().expect("prompts"),
        vec!["(gpt-4)> ".to_string(), "(gpt-4)> ".to_string()]
    );
}

#[test]
fn quiet_run_has_no_banner_and_empty_prompt() {
    let mut h = harness()
        .options(SessionOptions {
            quiet: true,
            ..SessionOptions::default()
        })
        .build();
    let (mut reader, prompts) = ScriptedLineReader::new(["ping"]);

    h.session.run(&mut reader);

    assert_eq!(h.output().stdout(), "You said: ping\n");
    assert_eq!(
        *prompts.lock().expect("prompts"),
        vec![String::new(), String::new()]
    );
}

#[test]
fn exit_command_stops_the_loop_with_its_status() {
    let mut h = harness().build();
    let (mut reader, _) = ScriptedLineReader::new(["/exit 3", "never sent"]);

    let code = h.session.run(&mut reader);

    assert_eq!(code, 3);
    assert_eq!(h.session.exit_code(), Some(3));
    assert_eq!(h.provider.request_count(), 0);
}

#[test]
fn exit_defaults_to_success() {
    let mut h = harness().build();
    let (mut reader, _) = ScriptedLineReader::new(["/exit"]);

    assert_eq!(h.session.run(&mut reader), 0);
}

#[test]
fn model_switch_applies_to_prompt_and_requests() {
    let mut h = harness().build();

    h.session.handle_line("/model gpt-3.5-turbo");
    h.session.handle_line("hello");

    assert_eq!(h.session.model(), "gpt-3.5-turbo");
    assert_eq!(h.session.prompt(), "(gpt-3.5-turbo)> ");
    assert_eq!(h.provider.requests()[0].model_id, "gpt-3.5-turbo");
}
