// ─── Message Levels ───
// Severity of a log line coming from the launcher, a step or the game process.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::core::pattern::cached_regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageLevel {
    Unknown,
    StdOut,
    StdErr,
    Launcher,
    Debug,
    Info,
    Message,
    Warning,
    Error,
    Fatal,
}

static LOG4J_PATTERN: OnceLock<Regex> = OnceLock::new();
static STACK_FRAME: OnceLock<Regex> = OnceLock::new();
static CAUSED_BY: OnceLock<Regex> = OnceLock::new();
static EXCEPTION_NAME: OnceLock<Regex> = OnceLock::new();
static MORE_FRAMES: OnceLock<Regex> = OnceLock::new();

impl MessageLevel {
    /// Names accepted inside a `!![Level]!` prefix.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Launcher" => MessageLevel::Launcher,
            "Debug" => MessageLevel::Debug,
            "Info" => MessageLevel::Info,
            "Message" => MessageLevel::Message,
            "Warning" => MessageLevel::Warning,
            "Error" => MessageLevel::Error,
            "Fatal" => MessageLevel::Fatal,
            _ => MessageLevel::Unknown,
        }
    }

    /// Strip an explicit `!![Level]!` prefix from `line`, returning the level it named.
    pub fn from_line(line: &mut String) -> Self {
        if !line.starts_with("!![") {
            return MessageLevel::Unknown;
        }
        let Some(end) = line.find("]!") else {
            return MessageLevel::Unknown;
        };
        let level = MessageLevel::from_name(&line[3..end]);
        line.replace_range(..end + 2, "");
        level
    }

    pub fn is_undetermined(self) -> bool {
        matches!(self, MessageLevel::Unknown | MessageLevel::StdOut | MessageLevel::StdErr)
    }
}

/// Guess the level of a game output line from log4j or legacy Forge markers.
pub fn guess_level(line: &str, level: MessageLevel) -> MessageLevel {
    let mut level = level;

    let log4j = cached_regex(&LOG4J_PATTERN, r"\[(?P<timestamp>[0-9:]+)\] \[[^/]+/(?P<level>[^\]]+)\]");
    match log4j.ok().and_then(|re| re.captures(line)) {
        Some(caps) => {
            level = match caps.name("level").map(|m| m.as_str()) {
                Some("INFO") => MessageLevel::Message,
                Some("WARN") => MessageLevel::Warning,
                Some("ERROR") => MessageLevel::Error,
                Some("FATAL") => MessageLevel::Fatal,
                Some("TRACE") | Some("DEBUG") => MessageLevel::Debug,
                _ => level,
            };
        }
        None => {
            if ["[INFO]", "[CONFIG]", "[FINE]", "[FINER]", "[FINEST]"]
                .iter()
                .any(|marker| line.contains(marker))
            {
                level = MessageLevel::Message;
            }
            if line.contains("[SEVERE]") || line.contains("[STDERR]") {
                level = MessageLevel::Error;
            }
            if line.contains("[WARNING]") {
                level = MessageLevel::Warning;
            }
            if line.contains("[DEBUG]") {
                level = MessageLevel::Debug;
            }
        }
    }

    if line.contains("overwriting existing") {
        return MessageLevel::Fatal;
    }
    if line.contains("Exception in thread") || looks_like_stack_trace(line) {
        return MessageLevel::Error;
    }
    level
}

fn looks_like_stack_trace(line: &str) -> bool {
    const JAVA_SYMBOL: &str = r"([a-zA-Z_$][a-zA-Z\d_$]*\.)+[a-zA-Z_$][a-zA-Z\d_$]*";
    let patterns = [
        cached_regex(&STACK_FRAME, &format!(r"\s+at {}", JAVA_SYMBOL)),
        cached_regex(&CAUSED_BY, &format!("Caused by: {}", JAVA_SYMBOL)),
        cached_regex(
            &EXCEPTION_NAME,
            r"([a-zA-Z_$][a-zA-Z\d_$]*\.)+[a-zA-Z_$]?[a-zA-Z\d_$]*(Exception|Error|Throwable)",
        ),
        cached_regex(&MORE_FRAMES, r"\.\.\. \d+ more$"),
    ];
    patterns
        .into_iter()
        .filter_map(Result::ok)
        .any(|re| re.is_match(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_prefix_is_stripped() {
        let mut line = "!![Warning]!low memory".to_string();
        assert_eq!(MessageLevel::from_line(&mut line), MessageLevel::Warning);
        assert_eq!(line, "low memory");

        let mut plain = "hello".to_string();
        assert_eq!(MessageLevel::from_line(&mut plain), MessageLevel::Unknown);
        assert_eq!(plain, "hello");
    }

    #[test]
    fn log4j_levels_are_guessed() {
        let line = "[12:01:02] [Render thread/WARN]: Missing sound";
        assert_eq!(guess_level(line, MessageLevel::StdOut), MessageLevel::Warning);
        let info = "[12:01:02] [main/INFO]: Setting user: Steve";
        assert_eq!(guess_level(info, MessageLevel::StdOut), MessageLevel::Message);
    }

    #[test]
    fn stack_traces_are_errors() {
        assert_eq!(
            guess_level("\tat net.minecraft.client.Main.main(Main.java:1)", MessageLevel::StdErr),
            MessageLevel::Error
        );
        assert_eq!(
            guess_level("java.lang.NullPointerException", MessageLevel::StdOut),
            MessageLevel::Error
        );
        assert_eq!(guess_level("plain output", MessageLevel::StdOut), MessageLevel::StdOut);
    }
}
