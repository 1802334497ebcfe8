//! Typed console input parsed into UI commands.

use shared::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Opens the add-user modal, submitting at once when a name is given.
    Add { name: Option<String> },
    Edit { id: UserId },
    Save { name: String },
    Delete { id: UserId },
    Confirm,
    Cancel,
    Dismiss,
    Reload,
    List,
    Help,
    Quit,
}

impl UiCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UiCommand::Add { .. } => "add",
            UiCommand::Edit { .. } => "edit",
            UiCommand::Save { .. } => "save",
            UiCommand::Delete { .. } => "delete",
            UiCommand::Confirm => "confirm",
            UiCommand::Cancel => "cancel",
            UiCommand::Dismiss => "dismiss",
            UiCommand::Reload => "reload",
            UiCommand::List => "list",
            UiCommand::Help => "help",
            UiCommand::Quit => "quit",
        }
    }
}

pub const HELP: &str = "\
commands:
  add [name]     open the add-user modal (submits when a name is given)
  edit <id>      open the edit overlay for a user
  save <name>    submit the open add modal or edit overlay
  delete <id>    ask to delete a user
  confirm        confirm the pending deletion
  cancel         close the open modal or overlay
  dismiss        clear the banner
  reload         fetch the user list again
  list           redraw
  quit           exit";

pub fn parse_command(line: &str) -> Result<UiCommand, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" | "new" => UiCommand::Add {
            name: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "edit" => UiCommand::Edit {
            id: parse_id(verb, rest)?,
        },
        // Blank names are rejected by the core, not here.
        "save" => UiCommand::Save {
            name: rest.to_string(),
        },
        "delete" | "rm" => UiCommand::Delete {
            id: parse_id(verb, rest)?,
        },
        "confirm" | "yes" => UiCommand::Confirm,
        "cancel" | "no" => UiCommand::Cancel,
        "dismiss" => UiCommand::Dismiss,
        "reload" | "refresh" => UiCommand::Reload,
        "list" | "ls" | "" => UiCommand::List,
        "help" | "?" => UiCommand::Help,
        "quit" | "exit" | "q" => UiCommand::Quit,
        other => return Err(format!("unknown command '{other}'; type 'help'")),
    };
    Ok(command)
}

fn parse_id(verb: &str, raw: &str) -> Result<UserId, String> {
    raw.parse::<i64>()
        .map(UserId)
        .map_err(|_| format!("usage: {verb} <id>"))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
