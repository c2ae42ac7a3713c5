//! Console command parsing.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a task; fields are validated by the scheduler.
    Add { priority: String, time: String },
    List,
    Run,
    Status,
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help' for a list)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

const ADD_USAGE: &str = "add <priority> <time>";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "add" | "a" => match rest.as_slice() {
            [priority, time] => Command::Add {
                priority: (*priority).to_string(),
                time: (*time).to_string(),
            },
            [spec] => {
                let (priority, time) = split_task_spec(spec).ok_or(CommandError::Usage(ADD_USAGE))?;
                Command::Add {
                    priority: priority.to_string(),
                    time: time.to_string(),
                }
            }
            _ => return Err(CommandError::Usage(ADD_USAGE)),
        },
        "list" | "ls" => Command::List,
        "run" | "schedule" => Command::Run,
        "status" => Command::Status,
        "reset" | "clear" => Command::Reset,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Split a `PRIORITY:TIME` pair. Fields are not validated here.
pub fn split_task_spec(spec: &str) -> Option<(&str, &str)> {
    spec.split_once(':')
        .map(|(priority, time)| (priority.trim(), time.trim()))
}

pub const HELP: &[(&str, &str)] = &[
    ("add <priority> <time>", "queue a task (lower priority runs first)"),
    ("list", "show queued tasks"),
    ("run", "schedule all queued tasks"),
    ("status", "show CPU status and session counters"),
    ("reset", "clear the task queue"),
    ("help", "show this help"),
    ("quit", "exit"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn add(priority: &str, time: &str) -> Command {
        Command::Add {
            priority: priority.into(),
            time: time.into(),
        }
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_add_forms() {
        assert_eq!(parse("add 3 5"), Ok(Some(add("3", "5"))));
        assert_eq!(parse("ADD 3:5"), Ok(Some(add("3", "5"))));
        // Field validation is the scheduler's job.
        assert_eq!(parse("add x -1"), Ok(Some(add("x", "-1"))));
    }

    #[test]
    fn test_add_usage_errors() {
        assert_eq!(parse("add"), Err(CommandError::Usage(ADD_USAGE)));
        assert_eq!(parse("add 1 2 3"), Err(CommandError::Usage(ADD_USAGE)));
        assert_eq!(parse("add 12"), Err(CommandError::Usage(ADD_USAGE)));
    }

    #[test]
    fn test_keywords_and_aliases() {
        assert_eq!(parse("run"), Ok(Some(Command::Run)));
        assert_eq!(parse("ls"), Ok(Some(Command::List)));
        assert_eq!(parse(" status "), Ok(Some(Command::Status)));
        assert_eq!(parse("clear"), Ok(Some(Command::Reset)));
        assert_eq!(parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(parse("?"), Ok(Some(Command::Help)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("launch now"),
            Err(CommandError::Unknown("launch".into()))
        );
    }

    #[test]
    fn test_split_task_spec() {
        assert_eq!(split_task_spec("2:4"), Some(("2", "4")));
        assert_eq!(split_task_spec(" 2 : 4 "), Some(("2", "4")));
        assert_eq!(split_task_spec("2:"), Some(("2", "")));
        assert_eq!(split_task_spec("24"), None);
    }
}
