//! Canonical, schema-guided property ordering for JSON documents.
//!
//! A document is evaluated against a JSON Schema, every document location the
//! evaluation visited is given the position of the schema location that
//! visited it, and the document is rebuilt with each object's members in that
//! order. Members no schema location claimed go last, by name, or are removed.

use schema_eval::{ DEFAULT_DIALECT_URI, Evaluation, Evaluator, Validator };
use serde_json::Value;
use tracing::debug;

pub mod error;
pub mod indexer;
pub mod projector;
pub mod rewriter;
pub mod sort_key;

pub use error::Error;
pub use indexer::{ SchemaKeys, index_schema };
pub use projector::{ DocumentKeys, SchemaKeysCache, project };
pub use rewriter::rewrite;
pub use sort_key::SortKey;

/// What [`process`] does to a valid document. Both may be combined; with
/// neither set the result is a plain copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Order object members the way the schema declares them.
    pub sort: bool,
    /// Drop object members the schema does not map.
    pub remove_additional_props: bool,
}

/// Evaluates `document` against `schema` and rewrites it according to `options`.
///
/// A schema rejected for its `$schema` declaration is retried once with the
/// default dialect declared. A document that fails validation is reported as
/// [`Error::ValidationFailure`] and nothing is rewritten.
pub fn process(
    validator: &impl Validator,
    document: &Value,
    schema: &Value,
    options: Options
) -> Result<Value, Error> {
    process_with_cache(validator, &mut SchemaKeysCache::new(), document, schema, options)
}

/// [`process`], indexing schemas through `cache`.
///
/// Cached keys are looked up by canonical URI and checked against the content
/// they were indexed from, so reusing a cache across edits of a schema that
/// keeps its `$id` is safe.
pub fn process_with_cache(
    validator: &impl Validator,
    cache: &mut SchemaKeysCache,
    document: &Value,
    schema: &Value,
    options: Options
) -> Result<Value, Error> {
    let fallback;
    let evaluation: Evaluation<'_> = match validator.evaluate(schema, document) {
        Err(error) if error.is_dialect() => {
            let Some(with_dialect) = with_default_dialect(schema) else {
                return Err(error.into());
            };
            debug!(%error, dialect = DEFAULT_DIALECT_URI, "retrying with the default dialect");
            fallback = with_dialect;
            validator.evaluate(&fallback, document)?
        }
        evaluation => evaluation?,
    };

    if !evaluation.valid {
        return Err(Error::ValidationFailure { errors: evaluation.errors() });
    }

    let keys = project(&evaluation.root, cache)?;
    Ok(rewrite(document, &keys, options))
}

/// A copy of `schema` declaring the default dialect. Only object schemas can declare one.
fn with_default_dialect(schema: &Value) -> Option<Value> {
    let mut schema = schema.clone();
    schema
        .as_object_mut()?
        .insert("$schema".to_owned(), Value::String(DEFAULT_DIALECT_URI.to_owned()));
    Some(schema)
}

/// Orders `document` like `schema` declares its properties.
pub fn sort_doc_by_schema(document: &Value, schema: &Value) -> Result<Value, Error> {
    process(&Evaluator::new(), document, schema, Options { sort: true, ..Options::default() })
}

/// Removes the properties of `document` that `schema` does not map, keeping document order.
pub fn remove_additional_props(document: &Value, schema: &Value) -> Result<Value, Error> {
    process(&Evaluator::new(), document, schema, Options {
        remove_additional_props: true,
        ..Options::default()
    })
}
