use colored::Colorize;
use completion_provider::Message;
use unicode_width::UnicodeWidthStr;

/// Greedy word wrap. Whitespace runs collapse to a single space; a word wider
/// than `max_width` gets a line of its own.
pub fn text_wrap(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.width() + 1 + word.width() > max_width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Renders the transcript as `[role]` headers, each followed by the content
/// and a blank line.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut rendered = String::new();
    for message in messages {
        rendered.push_str(&format!(
            "{}{}{}\n{}\n\n",
            "[".cyan(),
            message.role.as_str().white().bold(),
            "]".cyan(),
            message.content
        ));
    }
    rendered
}
