//! Line protocol of the interactive host
//!
//! ```text
//! train <query> => <response>
//! ask <query>            (a bare line is a question too)
//! good | bad             feedback on the last answer
//! decay | save | stats | export <path> | help | quit
//! ```

/// A parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Train { query: String, response: String },
    Ask(String),
    Good,
    Bad,
    Decay,
    Save,
    Stats,
    Export(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
train <query> => <response>   teach a pair
ask <query>                   ask (a bare line works too)
good | bad                    feedback on the last answer
decay                         run a decay pass now
save                          write the snapshot
stats                         print statistics as JSON
export <path>                 dump the snapshot as JSON
quit                          save and exit";

impl Command {
    /// Parse one line; `None` for a blank line
    pub fn parse(line: &str) -> Option<Result<Command, String>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_lowercase().as_str() {
            "train" => match rest.split_once("=>") {
                Some((query, response)) if !query.trim().is_empty() && !response.trim().is_empty() => {
                    Ok(Command::Train {
                        query: query.trim().to_string(),
                        response: response.trim().to_string(),
                    })
                }
                _ => Err("usage: train <query> => <response>".to_string()),
            },
            "ask" if rest.is_empty() => Err("usage: ask <query>".to_string()),
            "ask" => Ok(Command::Ask(rest.to_string())),
            "export" if rest.is_empty() => Err("usage: export <path>".to_string()),
            "export" => Ok(Command::Export(rest.to_string())),
            "good" if rest.is_empty() => Ok(Command::Good),
            "bad" if rest.is_empty() => Ok(Command::Bad),
            "decay" if rest.is_empty() => Ok(Command::Decay),
            "save" if rest.is_empty() => Ok(Command::Save),
            "stats" if rest.is_empty() => Ok(Command::Stats),
            "help" if rest.is_empty() => Ok(Command::Help),
            "quit" | "exit" if rest.is_empty() => Ok(Command::Quit),
            _ => Ok(Command::Ask(line.to_string())),
        };
        Some(command)
    }
}
