//! Command Parser
//!
//! Parses the interactive command language. Anything that is not one of the
//! built-in commands is handed to the module manager as a module command.

/// Interactive command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Show help
    Help,
    /// List modules and their state
    Modules,
    /// Set a parameter
    Set { name: String, value: String },
    /// Show a parameter, or every parameter when no name is given
    Get { name: Option<String> },
    /// Name a MAC address
    Alias { name: String, mac: String },
    /// A module command such as `arp.spoof on`
    Module(String),
    /// Stop every module and exit
    Quit,
}

/// Command parser
pub struct CommandParser;

impl CommandParser {
    /// Parse a command line
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        if line.is_empty() {
            return Err("Empty command".to_string());
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "help" | "?" => Ok(Command::Help),
            "modules" | "list" => Ok(Command::Modules),
            "set" => {
                if parts.len() < 2 {
                    return Err("Usage: set <name> <value>".to_string());
                }
                // the value may contain spaces, e.g. "10.0.0.5, 10.0.0.6"
                let value = line[3..]
                    .trim_start()
                    .strip_prefix(parts[1])
                    .unwrap_or_default()
                    .trim();
                Ok(Command::Set {
                    name: parts[1].to_string(),
                    value: value.to_string(),
                })
            }
            "get" => Ok(Command::Get {
                name: parts.get(1).map(|name| name.to_string()),
            }),
            "alias" => {
                if parts.len() != 3 {
                    Err("Usage: alias <name> <mac>".to_string())
                } else {
                    Ok(Command::Alias {
                        name: parts[1].to_string(),
                        mac: parts[2].to_string(),
                    })
                }
            }
            "exit" | "quit" | "q" => Ok(Command::Quit),
            _ => Ok(Command::Module(parts.join(" "))),
        }
    }

    /// Get help text
    pub fn help_text() -> &'static str {
        r#"
Available Commands:
==================

Modules:
  modules, list                       - List modules, their state and commands
  <module command>                    - Run a module command
                                        Example: arp.spoof on

Parameters:
  set <name> <value>                  - Set a parameter
                                        Example: set arp.spoof.targets 10.0.0.5,10.0.0.6
  get [name]                          - Show one parameter, or all of them
  alias <name> <mac>                  - Name a MAC address for target lists

General:
  help, ?                             - Show this help message
  exit, quit, q                       - Stop every module and exit
"#
    }
}
