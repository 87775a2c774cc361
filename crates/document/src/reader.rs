use std::{ fs, path::Path };

use serde_json::Value;
use tracing::debug;

use crate::{ error::Error, types::{ Format, Loaded } };

/// Reads and parses the document at `path`, in the format its extension names.
pub fn load(path: impl AsRef<Path>) -> Result<Loaded, Error> {
    let path = path.as_ref();
    let format = Format::from_path(path);
    let text = fs::read_to_string(path)?;
    debug!(path = %path.display(), %format, bytes = text.len(), "loaded document");

    Ok(Loaded { value: parse(&text, format)?, format })
}

/// Parses `text`. Object members keep the order they are written in.
pub fn parse(text: &str, format: Format) -> Result<Value, Error> {
    match format {
        Format::Json => Ok(serde_json::from_str(text)?),
        Format::Yaml => Ok(serde_yaml::from_str(text)?),
    }
}
