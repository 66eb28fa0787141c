//! Slash commands understood by the REPL

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    New,
    Sessions,
    Switch(String),
    Delete(String),
    Open(Option<String>),
    Changes,
    Accept(String),
    Reject(String),
    AcceptAll,
    RejectAll,
    Toggle(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /new                 start a new chat
  /sessions            list chats
  /switch <id>         switch to a chat
  /delete <id>         delete a chat
  /open [doc]          set (or clear) the active document
  /changes             list proposed changes
  /accept <id>         accept a change
  /reject <id>         reject a change
  /accept-all          accept every pending change
  /reject-all          reject every pending change
  /toggle <id>         show or hide a change's content
  /quit                exit
Anything else is sent to the model. Ctrl-C stops a reply in progress.";

impl Command {
    /// Parses a line. Unknown or incomplete slash commands yield the usage text as `Err`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if !line.starts_with('/') {
            return Ok(Command::Chat(line.to_string()));
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|s| !s.is_empty())),
            None => (line, None),
        };
        let required = |usage: &str| {
            arg.map(str::to_string)
                .ok_or_else(|| format!("Usage: {}", usage))
        };

        match name {
            "/new" => Ok(Command::New),
            "/sessions" => Ok(Command::Sessions),
            "/switch" => required("/switch <id>").map(Command::Switch),
            "/delete" => required("/delete <id>").map(Command::Delete),
            "/open" => Ok(Command::Open(arg.map(str::to_string))),
            "/changes" => Ok(Command::Changes),
            "/accept" => required("/accept <id>").map(Command::Accept),
            "/reject" => required("/reject <id>").map(Command::Reject),
            "/accept-all" => Ok(Command::AcceptAll),
            "/reject-all" => Ok(Command::RejectAll),
            "/toggle" => required("/toggle <id>").map(Command::Toggle),
            "/help" => Ok(Command::Help),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command {}\n{}", other, HELP)),
        }
    }
}
