use derive_more::{ Display, Error };

use crate::location::Location;

#[derive(Error, Debug, Display)]
pub enum Error {
    #[display("schema does not declare a `$schema` dialect")]
    MissingDialect,
    #[display("unsupported schema dialect `{uri}`")]
    UnknownDialect {
        uri: String,
    },
    #[display("invalid schema at `{location}`: {reason}")]
    InvalidSchema {
        location: Location,
        reason: String,
    },
    #[display("unresolved reference `{reference}`")]
    UnresolvedReference {
        reference: String,
    },
    #[display("invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        source: fancy_regex::Error,
    },
    #[display("pattern `{pattern}` could not be matched")]
    PatternMatch {
        pattern: String,
        source: fancy_regex::Error,
    },
    #[display("reference `{reference}` recurses without consuming the instance")]
    RecursionLimit {
        reference: String,
    },
}

impl Error {
    /// Whether the schema was rejected only because of its `$schema` declaration.
    pub fn is_dialect(&self) -> bool {
        matches!(self, Error::MissingDialect | Error::UnknownDialect { .. })
    }

    pub(crate) fn invalid(location: &Location, reason: impl Into<String>) -> Self {
        Error::InvalidSchema { location: location.clone(), reason: reason.into() }
    }
}
