use derive_more::{ Display, Error };
use schema_eval::{ Location, OutputUnit };
use itertools::Itertools;

#[derive(Error, Debug, Display)]
pub enum Error {
    #[display("schema could not be compiled: {source}")]
    SchemaCompilation {
        source: schema_eval::Error,
    },
    #[display("document failed schema validation:\n{}", errors.iter().join("\n"))]
    ValidationFailure {
        errors: Vec<OutputUnit>,
    },
    #[display(
        "schema applied at `{schema_location}` to `{instance_location}` has no canonical identity"
    )]
    MissingCanonicalIdentity {
        schema_location: Location,
        instance_location: Location,
    },
    #[display("schema `{canonical_uri}` has no location `{schema_location}`")]
    SchemaLocationNotFound {
        canonical_uri: String,
        schema_location: Location,
    },
}

impl From<schema_eval::Error> for Error {
    fn from(source: schema_eval::Error) -> Self {
        Error::SchemaCompilation { source }
    }
}
