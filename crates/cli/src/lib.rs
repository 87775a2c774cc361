//! Shared front end of the `schema-sort` and `schema-remove-additional-props` binaries.

use color_eyre::eyre::Result;
use schema_sort::Options;
use tracing::debug;

pub mod args;
pub mod logger;
pub mod run;

pub use args::Args;

/// Which of the two binaries is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Sort,
    RemoveAdditionalProps,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Sort => "schema-sort",
            Tool::RemoveAdditionalProps => "schema-remove-additional-props",
        }
    }

    pub fn about(self) -> &'static str {
        match self {
            Tool::Sort => "Sorts a JSON or YAML document to match a JSON Schema's order of properties",
            Tool::RemoveAdditionalProps =>
                "Processes a JSON or YAML document to remove additional properties not defined in the schema",
        }
    }

    /// `about` plus what rewriting does to the file's formatting.
    pub fn long_about(self) -> String {
        format!(
            "{}\n\nThe document is rewritten from its parsed value: YAML comments, anchors and \
             custom indentation are not preserved, and JSON is indented by --indent spaces.",
            self.about()
        )
    }

    pub fn options(self) -> Options {
        match self {
            Tool::Sort => Options { sort: true, ..Options::default() },
            Tool::RemoveAdditionalProps => Options { remove_additional_props: true, ..Options::default() },
        }
    }
}

/// Entry point of both binaries.
pub fn main(tool: Tool) -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse_for(tool);
    logger::setup(args.verbose, args.log_dir.as_deref())?;

    debug!(?args, "starting");
    run::run(tool, &args)
}
