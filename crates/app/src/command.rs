use std::num::ParseIntError;

use snafu::{OptionExt, ResultExt, Snafu};

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    /// Starts editing; without text the draft starts from the current question.
    Edit {
        index: usize,
        text: Option<String>,
    },
    Draft(String),
    Save(usize),
    Cancel,
    Regenerate(usize),
    Clear(usize),
    Reset,
    Copy(usize),
    /// Exports one turn, or the whole transcript when no index is given.
    Export(Option<usize>),
    Documents,
    KnowledgeBaseStatus,
    ClearKnowledgeBase,
    /// Signs in and persists the identity to the settings file.
    Login {
        user_id: String,
        username: Option<String>,
    },
    Logout,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("`{command}` needs a turn index"))]
    MissingIndex {
        stage: &'static str,
        command: &'static str,
    },
    #[snafu(display("`{command}`: `{raw}` is not a turn index: {source}"))]
    InvalidIndex {
        stage: &'static str,
        command: &'static str,
        raw: String,
        source: ParseIntError,
    },
    #[snafu(display("`login` needs a user id"))]
    MissingUserId { stage: &'static str },
    #[snafu(display("unknown `{command}` subcommand `{raw}`"))]
    UnknownSubcommand {
        stage: &'static str,
        command: &'static str,
        raw: String,
    },
}

pub const HELP: &str = "\
commands:
  ask <text>        ask a question (bare text works too)
  edit <i> [text]   start editing the question at turn i
  draft <text>      replace the draft of the current edit
  save <i>          save the edit of turn i and ask again
  cancel            discard the current edit
  regen <i>         ask the question at turn i again
  clear <i>         remove the pair containing turn i
  reset             clear the whole session
  copy <i>          print the text of turn i
  export [i]        write turn i, or the whole transcript, to the export file
  docs              list your documents
  kb                show knowledge base status
  kb clear          clear your knowledge base
  login <id> [name] sign in as user id
  logout            sign out and clear the session
  show              print the transcript
  help              show this help
  quit              exit";

impl Command {
    /// Parses a line; blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "ask" => Self::Ask(rest.to_string()),
            "edit" => {
                let (raw_index, text) = match rest.split_once(char::is_whitespace) {
                    Some((raw_index, text)) => (raw_index, Some(text.trim().to_string())),
                    None => (rest, None),
                };
                Self::Edit {
                    index: parse_index("edit", raw_index)?,
                    text,
                }
            }
            "draft" => Self::Draft(rest.to_string()),
            "save" => Self::Save(parse_index("save", rest)?),
            "cancel" => Self::Cancel,
            "regen" | "regenerate" => Self::Regenerate(parse_index("regen", rest)?),
            "clear" => Self::Clear(parse_index("clear", rest)?),
            "reset" => Self::Reset,
            "copy" => Self::Copy(parse_index("copy", rest)?),
            "export" if rest.is_empty() => Self::Export(None),
            "export" => Self::Export(Some(parse_index("export", rest)?)),
            "docs" => Self::Documents,
            "kb" => match rest {
                "" | "status" => Self::KnowledgeBaseStatus,
                "clear" => Self::ClearKnowledgeBase,
                other => {
                    return UnknownSubcommandSnafu {
                        stage: "parse-command",
                        command: "kb",
                        raw: other,
                    }
                    .fail();
                }
            },
            "login" => {
                let (user_id, username) = match rest.split_once(char::is_whitespace) {
                    Some((user_id, username)) => (user_id, Some(username.trim().to_string())),
                    None => (rest, None),
                };
                let user_id = Some(user_id)
                    .filter(|user_id| !user_id.is_empty())
                    .context(MissingUserIdSnafu {
                        stage: "parse-command",
                    })?;
                Self::Login {
                    user_id: user_id.to_string(),
                    username,
                }
            }
            "logout" => Self::Logout,
            "show" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Ask(line.to_string()),
        };
        Ok(Some(command))
    }
}

fn parse_index(command: &'static str, raw: &str) -> Result<usize, CommandError> {
    let raw = Some(raw.trim())
        .filter(|raw| !raw.is_empty())
        .context(MissingIndexSnafu {
            stage: "parse-command",
            command,
        })?;
    raw.parse::<usize>().context(InvalidIndexSnafu {
        stage: "parse-command",
        command,
        raw,
    })
}
