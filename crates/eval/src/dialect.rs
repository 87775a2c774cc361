use std::fmt;

use serde_json::Value;

use crate::{ error::Error, location::Location };

/// The dialect injected into schemas that declare none, or one we do not speak.
pub const DEFAULT_DIALECT_URI: &str = "https://json-schema.org/draft/2020-12/schema";

const DRAFT_2019_09_URI: &str = "https://json-schema.org/draft/2019-09/schema";

/// A JSON Schema dialect this evaluator understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Draft2020_12,
    Draft2019_09,
}

impl Dialect {
    /// Reads the dialect a schema declares through `$schema`.
    ///
    /// Boolean schemas cannot declare one and are taken as the default dialect.
    pub fn detect(schema: &Value) -> Result<Self, Error> {
        match schema {
            Value::Bool(_) => Ok(Dialect::Draft2020_12),
            Value::Object(obj) =>
                match obj.get("$schema") {
                    None => Err(Error::MissingDialect),
                    Some(Value::String(uri)) =>
                        Self::from_uri(uri).ok_or_else(|| Error::UnknownDialect {
                            uri: uri.clone(),
                        }),
                    Some(_) =>
                        Err(Error::invalid(&Location::root().join("$schema"), "must be a string")),
                }
            _ => Err(Error::invalid(&Location::root(), "a schema must be an object or a boolean")),
        }
    }

    /// Matches a metaschema URI, ignoring the scheme and an empty fragment.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let normalized = uri
            .trim_end_matches('#')
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        match normalized {
            "json-schema.org/draft/2020-12/schema" => Some(Dialect::Draft2020_12),
            "json-schema.org/draft/2019-09/schema" => Some(Dialect::Draft2019_09),
            _ => None,
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            Dialect::Draft2020_12 => DEFAULT_DIALECT_URI,
            Dialect::Draft2019_09 => DRAFT_2019_09_URI,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}
