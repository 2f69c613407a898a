//! CLI argument parsing

use clap::Parser;
use netspoof_core::MacAddr;

#[derive(Parser, Debug)]
#[command(name = "netspoof")]
#[command(version, about = "ARP, NDP and DNS spoofing toolkit", long_about = None)]
pub struct Cli {
    /// Network interface to use
    #[arg(short = 'I', long)]
    pub interface: Option<String>,

    /// Module parameters (key=value pairs)
    #[arg(short = 'M', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Commands to run before the interactive prompt, separated by ';'
    #[arg(short = 'e', long = "eval", value_name = "COMMANDS")]
    pub eval: Option<String>,

    /// Name a MAC address for use in target lists (name=MAC)
    #[arg(long = "alias", value_name = "NAME=MAC")]
    pub aliases: Vec<String>,

    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// `-M` values as (key, value), rejecting items without `=`
    pub fn parse_params(&self) -> Result<Vec<(String, String)>, String> {
        self.params
            .iter()
            .map(|param| {
                param
                    .split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .ok_or_else(|| format!("Invalid parameter format: {}. Expected key=value", param))
            })
            .collect()
    }

    /// `--alias` values as (name, MAC)
    pub fn parse_aliases(&self) -> Result<Vec<(String, MacAddr)>, String> {
        self.aliases
            .iter()
            .map(|alias| {
                let (name, mac) = alias
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid alias format: {}. Expected name=MAC", alias))?;
                let mac = mac
                    .parse::<MacAddr>()
                    .map_err(|e| format!("Invalid alias {}: {}", name, e))?;
                Ok((name.trim().to_string(), mac))
            })
            .collect()
    }

    /// `-e` commands split on ';', blanks dropped
    pub fn eval_commands(&self) -> Vec<String> {
        self.eval
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Default log filter for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
