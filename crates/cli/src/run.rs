use std::io::{ self, Write };

use color_eyre::eyre::{ Result, WrapErr };
use schema_eval::Evaluator;
use tracing::info;

use crate::{ Tool, args::Args };

/// Processes `args.path` against `args.schema` and persists or prints the result.
///
/// The document file is only written once processing has succeeded.
pub fn run(tool: Tool, args: &Args) -> Result<()> {
    let loaded = document::load(&args.path)
        .wrap_err_with(|| format!("failed to read document {}", args.path.display()))?;
    let schema = document::load(&args.schema)
        .wrap_err_with(|| format!("failed to read schema {}", args.schema.display()))?.value;

    info!(document = %args.path.display(), schema = %args.schema.display(), tool = tool.name(), "processing");
    let processed = schema_sort::process(&Evaluator::new(), &loaded.value, &schema, tool.options())
        .wrap_err_with(|| format!("failed to process {}", args.path.display()))?;

    if args.dry_run {
        let mut text = document::render(&processed, loaded.format, args.indent)?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        io::stdout().lock().write_all(text.as_bytes())?;
        return Ok(());
    }

    document::save(&args.path, &processed, loaded.format, args.indent)?;
    info!(document = %args.path.display(), format = %loaded.format, "saved");
    Ok(())
}
