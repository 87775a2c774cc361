use std::{ fs, path::Path };

use serde::Serialize;
use serde_json::{ Serializer, Value, ser::PrettyFormatter };
use tracing::debug;

use crate::{ error::Error, types::Format };

/// Renders `value` as text.
///
/// JSON is indented by `indent` spaces and has no trailing newline. YAML is
/// written in block style with serde_yaml's fixed indentation.
pub fn render(value: &Value, format: Format, indent: usize) -> Result<String, Error> {
    match format {
        Format::Json => {
            let indent = " ".repeat(indent);
            let mut buffer = Vec::new();
            let mut serializer = Serializer::with_formatter(
                &mut buffer,
                PrettyFormatter::with_indent(indent.as_bytes())
            );
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8(buffer)?)
        }
        Format::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

/// Renders `value` and replaces the contents of `path` with it.
pub fn save(path: impl AsRef<Path>, value: &Value, format: Format, indent: usize) -> Result<(), Error> {
    let path = path.as_ref();
    let text = render(value, format, indent)?;
    fs::write(path, &text)?;
    debug!(path = %path.display(), %format, bytes = text.len(), "saved document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::load;
    use serde_json::json;

    #[test]
    fn test_render_json() -> Result<(), Error> {
        let value = json!({ "range": { "start": 10, "end": 20, "zero": null } });
        assert_eq!(
            render(&value, Format::Json, 4)?,
            "{\n    \"range\": {\n        \"start\": 10,\n        \"end\": 20,\n        \"zero\": null\n    }\n}"
        );
        assert_eq!(render(&json!({ "a": [1] }), Format::Json, 2)?, "{\n  \"a\": [\n    1\n  ]\n}");
        Ok(())
    }

    #[test]
    fn test_render_json_keeps_non_ascii() -> Result<(), Error> {
        let value = json!({ "名前": "日本語", "emoji": "🦀" });
        assert_eq!(render(&value, Format::Json, 2)?, "{\n  \"名前\": \"日本語\",\n  \"emoji\": \"🦀\"\n}");
        Ok(())
    }

    #[test]
    fn test_render_yaml() -> Result<(), Error> {
        let value = json!({ "range": { "start": 10, "end": 20, "zero": null } });
        assert_eq!(render(&value, Format::Yaml, 4)?, "range:\n  start: 10\n  end: 20\n  zero: null\n");
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let value = json!({ "b": 1, "a": [{ "d": "x", "c": false }] });

        for name in ["doc.json", "doc.yaml"] {
            let path = dir.path().join(name);
            let format = Format::from_path(&path);
            save(&path, &value, format, 4)?;
            assert_eq!(load(&path)?.value, value);
        }
        Ok(())
    }
}
