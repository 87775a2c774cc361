//! JSON Schema evaluation that records what it did.
//!
//! [`Evaluator`] checks an instance against a schema document and keeps the
//! full tree of schema and keyword applications as a [`TraceNode`] tree,
//! including the branches that failed. Consumers that need to know *which*
//! part of a schema looked at *which* part of a document read that tree.

use serde_json::Value;

pub mod dialect;
pub mod error;
pub mod location;
pub mod trace;

mod assertions;
mod evaluator;
mod resolve;

pub use dialect::{ DEFAULT_DIALECT_URI, Dialect };
pub use error::Error;
pub use evaluator::Evaluator;
pub use location::{ Location, Segment };
pub use trace::{ Evaluation, OutputUnit, SubSchema, TraceNode };

/// Evaluates instances against schema documents.
pub trait Validator {
    /// Evaluates `instance` against `schema`.
    ///
    /// An instance that does not satisfy the schema is still `Ok`, with
    /// [`Evaluation::valid`] unset. `Err` means the schema itself could not be
    /// used.
    fn evaluate<'s>(&self, schema: &'s Value, instance: &Value) -> Result<Evaluation<'s>, Error>;
}

impl<V: Validator + ?Sized> Validator for &V {
    fn evaluate<'s>(&self, schema: &'s Value, instance: &Value) -> Result<Evaluation<'s>, Error> {
        (**self).evaluate(schema, instance)
    }
}
