use std::path::PathBuf;

use clap::{ ArgAction, Command, CommandFactory, FromArgMatches, Parser };

use crate::Tool;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Path to the JSON / YAML document
    pub path: PathBuf,

    /// Path to the JSON Schema document
    #[arg(long, value_name = "/path/to/schema.json")]
    pub schema: PathBuf,

    /// Print the result instead of persisting it back to the original file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// JSON indent size
    #[arg(long, default_value_t = 4)]
    pub indent: usize,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Also write a debug log into this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Parses the process arguments under `tool`'s name and description, exiting on error.
    pub fn parse_for(tool: Tool) -> Self {
        let matches = Self::command_for(tool).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }

    pub fn command_for(tool: Tool) -> Command {
        Self::command()
            .name(tool.name())
            .bin_name(tool.name())
            .about(tool.about())
            .long_about(tool.long_about())
    }
}
