//! Slash command registry, dispatcher, and the built-in command handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use colored::Colorize;
use completion_provider::{Message, Role};
use context_store::{read_context_file, write_context_file};

use crate::error::ReplError;
use crate::session::Session;
use crate::text::{render_transcript, text_wrap};

pub const COMMAND_PREFIX: char = '/';

/// Width used when wrapping command descriptions in `/help`.
pub const HELP_WRAP_WIDTH: usize = 50;

/// Receives the live session and the trimmed argument string.
pub type CommandHandler = fn(&mut Session, &str) -> Result<(), ReplError>;

const ROLE_CHOICES: &[&str] = &["user", "assistant", "system"];
const PATH_ARGUMENT_REQUIRED: &str = "exactly one argument required (path to JSON file)";

const NO_ARGUMENTS: &[ArgumentSpec] = &[];
const PATH: &[ArgumentSpec] = &[ArgumentSpec::required(&["path"])];
const ROLE_AND_MESSAGE: &[ArgumentSpec] = &[
    ArgumentSpec::required(ROLE_CHOICES),
    ArgumentSpec::required(&["message"]),
];
const ROLE: &[ArgumentSpec] = &[ArgumentSpec::required(ROLE_CHOICES)];
const OPTIONAL_ROLE: &[ArgumentSpec] = &[ArgumentSpec::optional(ROLE_CHOICES)];
const MODEL_NAME: &[ArgumentSpec] = &[ArgumentSpec::required(&["model-name"])];
const OPTIONAL_COUNT: &[ArgumentSpec] = &[ArgumentSpec::optional(&["N"])];
const TEXT: &[ArgumentSpec] = &[ArgumentSpec::required(&["text"])];
const OPTIONAL_PATH: &[ArgumentSpec] = &[ArgumentSpec::optional(&["path"])];
const OPTIONAL_STATUS_CODE: &[ArgumentSpec] = &[ArgumentSpec::optional(&["status-code"])];

/// Help metadata for one positional argument. Handlers do their own parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub choices: &'static [&'static str],
    pub optional: bool,
}

impl ArgumentSpec {
    pub const fn required(choices: &'static [&'static str]) -> Self {
        Self {
            choices,
            optional: false,
        }
    }

    pub const fn optional(choices: &'static [&'static str]) -> Self {
        Self {
            choices,
            optional: true,
        }
    }

    /// `<a|b|c>`, with a `?` after each choice when optional.
    pub fn placeholder(&self) -> String {
        let marker = if self.optional { "?" } else { "" };
        let choices: Vec<String> = self
            .choices
            .iter()
            .map(|choice| format!("{choice}{marker}").magenta().to_string())
            .collect();
        format!("<{}>", choices.join("|"))
    }
}

#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub handler: CommandHandler,
    pub description: &'static str,
    pub arguments: &'static [ArgumentSpec],
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Commands keyed by name. Iteration is in name order.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for command in builtin_commands() {
            registry.register(command);
        }
        registry
    }

    /// Adds `command`, returning any command it replaced.
    pub fn register(&mut self, command: Command) -> Option<Command> {
        self.commands.insert(command.name, command)
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Splits a prefixed line into the command name and its trimmed arguments.
/// Returns `None` when the line is not a command.
pub fn split_command_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(COMMAND_PREFIX)?;
    let (name, arguments) = rest.split_once(' ').unwrap_or((rest, ""));
    Some((name.trim(), arguments.trim()))
}

/// Runs the command named on `line` and reports any failure through the
/// session printer. Unknown names never touch the context.
pub fn dispatch(session: &mut Session, line: &str) {
    let Some((name, arguments)) = split_command_line(line) else {
        return;
    };

    let Some(handler) = session.registry().get(name).map(|command| command.handler) else {
        session.error(&ReplError::UnknownCommand(name.to_string()).to_string());
        return;
    };

    tracing::debug!(command = name, "dispatching command");
    if let Err(error) = handler(session, arguments) {
        tracing::debug!(command = name, %error, "command failed");
        session.error(&format!("{name}: {error}"));
    }
}

/// Renders the `/help` listing.
pub fn render_help(registry: &CommandRegistry) -> String {
    let mut help = String::new();
    for command in registry.iter() {
        help.push_str(&format!("{COMMAND_PREFIX}{}", command.name.cyan()));
        for argument in command.arguments {
            help.push(' ');
            help.push_str(&argument.placeholder());
        }
        help.push('\n');
        for line in text_wrap(command.description, HELP_WRAP_WIDTH) {
            help.push_str(&format!("  {line}\n"));
        }
    }
    help
}

/// Parses `<role> <text>`. The text is trimmed and may be empty.
pub fn parse_role_and_text(arguments: &str) -> Result<(Role, String), ReplError> {
    if arguments.is_empty() {
        return Err(ReplError::InvalidArgumentCount("expected two arguments"));
    }
    let (role, text) = arguments.split_once(' ').unwrap_or((arguments, ""));
    Ok((parse_role(role)?, text.trim().to_string()))
}

pub fn parse_role(value: &str) -> Result<Role, ReplError> {
    Role::parse(value).ok_or_else(|| ReplError::InvalidRole(value.to_string()))
}

/// Parses a base-10 integer, or returns `default` for an empty string.
pub fn parse_optional_integer(arguments: &str, default: i32) -> Result<i32, ReplError> {
    if arguments.is_empty() {
        return Ok(default);
    }
    arguments
        .parse::<i32>()
        .map_err(|source| ReplError::ParseInteger {
            input: arguments.to_string(),
            source,
        })
}

pub fn require_path(arguments: &str) -> Result<&Path, ReplError> {
    if arguments.is_empty() {
        return Err(ReplError::MissingArgument(PATH_ARGUMENT_REQUIRED));
    }
    Ok(Path::new(arguments))
}

fn builtin_commands() -> Vec<Command> {
    vec![
        Command {
            name: "help",
            handler: help_command,
            description: "Shows this help page.",
            arguments: NO_ARGUMENTS,
        },
        Command {
            name: "save",
            handler: save_command,
            description: "Saves current conversation context in a JSON file.",
            arguments: PATH,
        },
        Command {
            name: "replacefrom",
            handler: replace_from_command,
            description: "Replaces the current conversation context from JSON file in the same format as created by /save.",
            arguments: PATH,
        },
        Command {
            name: "appendfrom",
            handler: append_from_command,
            description: "Appends the context from the JSON file to the current context.",
            arguments: PATH,
        },
        Command {
            name: "prependfrom",
            handler: prepend_from_command,
            description: "Adds the context from the JSON file to the beginning of the current context.",
            arguments: PATH,
        },
        Command {
            name: "clear",
            handler: clear_command,
            description: "Clears the current conversation context.",
            arguments: NO_ARGUMENTS,
        },
        Command {
            name: "print",
            handler: print_command,
            description: "Prints the current conversation context.",
            arguments: NO_ARGUMENTS,
        },
        Command {
            name: "append",
            handler: append_command,
            description: "Appends a message to the current conversation context.",
            arguments: ROLE_AND_MESSAGE,
        },
        Command {
            name: "prepend",
            handler: prepend_command,
            description: "Adds a message to the beginning of the current conversation context.",
            arguments: ROLE_AND_MESSAGE,
        },
        Command {
            name: "model",
            handler: model_command,
            description: "Switches the current model (e.g. gpt-3.5-turbo), keeping the conversation context.",
            arguments: MODEL_NAME,
        },
        Command {
            name: "pop",
            handler: pop_command,
            description: "Removes the last N messages from the context. N defaults to 2, as to pop the last answer given by the model and the question that led to it.",
            arguments: OPTIONAL_COUNT,
        },
        Command {
            name: "escape",
            handler: escape_command,
            description: "Appends the following text and sends the context to the model, storing its response in the context. Useful for sending empty strings or messages beginning with the slash \"/\" character.",
            arguments: TEXT,
        },
        Command {
            name: "nano",
            handler: nano_command,
            description: "Opens a nano (by default) text editor instance. You can write a multi-line prompt in it, which will be appended to the context (without sending it) once saved and closed. To use a different text editor, specify its path in the GPTREPL_TEXT_EDITOR environment variable. See also /ns, which may be more useful for interactive sessions in most cases.",
            arguments: ROLE,
        },
        Command {
            name: "ns",
            handler: nano_send_command,
            description: "The same as running /nano and then /send. Role is set to \"user\" by default. Also prints the message when not in quiet mode.",
            arguments: OPTIONAL_ROLE,
        },
        Command {
            name: "send",
            handler: send_command,
            description: "Sends the current context as-is to the model and stores its response in the context.",
            arguments: NO_ARGUMENTS,
        },
        Command {
            name: "autosave",
            handler: autosave_command,
            description: "Changes the autosave file path. Every time the context changes, it is automatically saved to this file. Run with no arguments to disable this feature. WARNING: The file will be overwritten. You may want to load it first with /replacefrom, /appendfrom or /prependfrom.",
            arguments: OPTIONAL_PATH,
        },
        Command {
            name: "exit",
            handler: exit_command,
            description: "Exits the program.",
            arguments: OPTIONAL_STATUS_CODE,
        },
    ]
}

fn help_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    if !arguments.is_empty() {
        session.warn("This command takes no arguments. Showing help anyways");
    }
    let help = render_help(session.registry());
    session.print(&help);
    Ok(())
}

fn save_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let path = require_path(arguments)?;
    write_context_file(path, session.context().messages())?;
    Ok(())
}

fn replace_from_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let messages = read_context_file(require_path(arguments)?)?;
    session.replace_messages(messages);
    Ok(())
}

fn append_from_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let messages = read_context_file(require_path(arguments)?)?;
    session.append_messages(messages);
    Ok(())
}

fn prepend_from_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let messages = read_context_file(require_path(arguments)?)?;
    session.prepend_messages(messages);
    Ok(())
}

fn clear_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    if !arguments.is_empty() {
        return Err(ReplError::UnexpectedArguments);
    }
    session.clear_messages();
    Ok(())
}

fn print_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    if !arguments.is_empty() {
        session.warn("this command takes no arguments. Printing context anyways");
    }
    let transcript = render_transcript(session.context().messages());
    session.print(&transcript);
    Ok(())
}

fn append_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let (role, text) = parse_role_and_text(arguments)?;
    if text.is_empty() {
        session.warn("appending empty string to context");
    }
    session.push_message(Message::new(role, text));
    Ok(())
}

fn prepend_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let (role, text) = parse_role_and_text(arguments)?;
    if text.is_empty() {
        session.warn("prepending empty string to context");
    }
    session.prepend_messages(vec![Message::new(role, text)]);
    Ok(())
}

fn model_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    if arguments.is_empty() {
        return Err(ReplError::InvalidArgumentCount(
            "expected exactly one argument (the identifier of the model)",
        ));
    }
    session.set_model(arguments);
    Ok(())
}

fn pop_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let count = parse_optional_integer(arguments, 2)?;
    session.pop_messages(i64::from(count))?;
    Ok(())
}

fn escape_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    session.push_message(Message::user(arguments));
    session.exchange_and_record_or_retract()
}

fn nano_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let role = parse_role(arguments)?;
    let content = edited_content(session)?;
    session.push_message(Message::new(role, content));
    Ok(())
}

fn nano_send_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let role = if arguments.is_empty() {
        Role::User
    } else {
        parse_role(arguments)?
    };
    let content = edited_content(session)?;
    if !session.is_quiet() {
        session.print(&format!("{content}\n"));
    }
    session.push_message(Message::new(role, content));
    session.exchange_and_record_or_retract()
}

fn send_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    if !arguments.is_empty() {
        return Err(ReplError::UnexpectedArguments);
    }
    let response = session.exchange()?;
    session.push_message(Message::assistant(response));
    Ok(())
}

fn autosave_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let path = (!arguments.is_empty()).then(|| arguments.into());
    session.set_autosave_path(path);
    Ok(())
}

fn exit_command(session: &mut Session, arguments: &str) -> Result<(), ReplError> {
    let code = parse_optional_integer(arguments, 0)?;
    session.request_exit(code);
    Ok(())
}

fn edited_content(session: &mut Session) -> Result<String, ReplError> {
    let content = session.edit_text()?;
    let content = content.trim();
    if content.is_empty() {
        return Err(ReplError::NoContent);
    }
    Ok(content.to_string())
}
