use fxhash::FxHashMap;
use itertools::Itertools;
use serde_json::{ Map, Value };

use crate::{ error::Error, location::Location };

/// What a non-applicator keyword concluded about an instance.
pub(crate) enum Assertion {
    /// The keyword carries no assertion (annotations, unknown keywords).
    Ignored,
    Pass,
    Fail(String),
}

fn verdict(holds: bool, message: impl FnOnce() -> String) -> Assertion {
    if holds { Assertion::Pass } else { Assertion::Fail(message()) }
}

enum Compiled {
    Plain(regex::Regex),
    /// Lookaround and backreferences, which `regex` does not support.
    Fancy(fancy_regex::Regex),
}

/// Compiled `pattern` and `patternProperties` expressions, keyed by their source.
#[derive(Default)]
pub(crate) struct Patterns(FxHashMap<String, Compiled>);

impl Patterns {
    pub fn is_match(&mut self, pattern: &str, text: &str) -> Result<bool, Error> {
        if !self.0.contains_key(pattern) {
            let compiled = compile(pattern)?;
            self.0.insert(pattern.to_owned(), compiled);
        }
        match &self.0[pattern] {
            Compiled::Plain(regex) => Ok(regex.is_match(text)),
            Compiled::Fancy(regex) =>
                regex.is_match(text).map_err(|source| Error::PatternMatch {
                    pattern: pattern.to_owned(),
                    source,
                }),
        }
    }
}

fn compile(pattern: &str) -> Result<Compiled, Error> {
    if let Ok(regex) = regex::Regex::new(pattern) {
        return Ok(Compiled::Plain(regex));
    }
    let regex = fancy_regex::Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_owned(),
        source,
    })?;
    Ok(Compiled::Fancy(regex))
}

/// Checks one assertion keyword. `location` is the keyword's own schema location.
pub(crate) fn check(
    keyword: &str,
    expected: &Value,
    instance: &Value,
    location: &Location,
    patterns: &mut Patterns
) -> Result<Assertion, Error> {
    let assertion = match keyword {
        "type" => {
            let holds = match expected {
                Value::String(name) => is_type(name, instance, location)?,
                Value::Array(names) => {
                    let mut holds = false;
                    for name in names {
                        let name = name
                            .as_str()
                            .ok_or_else(|| Error::invalid(location, "type names must be strings"))?;
                        holds |= is_type(name, instance, location)?;
                    }
                    holds
                }
                _ => {
                    return Err(Error::invalid(location, "must be a string or an array of strings"));
                }
            };
            verdict(holds, || format!("expected {expected}, found {}", type_name(instance)))
        }
        "enum" => {
            let options = as_array(expected, location)?;
            verdict(options.iter().any(|option| json_equal(option, instance)), || {
                format!("{instance} is not one of {expected}")
            })
        }
        "const" => verdict(json_equal(expected, instance), || format!("expected {expected}")),
        "multipleOf" => {
            let divisor = as_number(expected, location)?;
            if divisor <= 0.0 {
                return Err(Error::invalid(location, "must be greater than 0"));
            }
            match instance.as_f64() {
                Some(x) =>
                    verdict(is_multiple(instance, expected, x, divisor), || {
                        format!("{instance} is not a multiple of {expected}")
                    }),
                None => Assertion::Pass,
            }
        }
        "maximum" => bound(expected, instance, location, |x, limit| x <= limit, "at most")?,
        "exclusiveMaximum" => bound(expected, instance, location, |x, limit| x < limit, "less than")?,
        "minimum" => bound(expected, instance, location, |x, limit| x >= limit, "at least")?,
        "exclusiveMinimum" =>
            bound(expected, instance, location, |x, limit| x > limit, "greater than")?,
        "maxLength" | "minLength" => {
            let limit = as_count(expected, location)?;
            match instance.as_str() {
                Some(s) => {
                    let length = s.chars().count();
                    if keyword == "maxLength" {
                        verdict(length <= limit, || format!("longer than {limit} characters"))
                    } else {
                        verdict(length >= limit, || format!("shorter than {limit} characters"))
                    }
                }
                None => Assertion::Pass,
            }
        }
        "pattern" => {
            let pattern = expected
                .as_str()
                .ok_or_else(|| Error::invalid(location, "must be a string"))?;
            match instance.as_str() {
                Some(s) =>
                    verdict(patterns.is_match(pattern, s)?, || format!("does not match `{pattern}`")),
                None => Assertion::Pass,
            }
        }
        "maxItems" | "minItems" => {
            let limit = as_count(expected, location)?;
            match instance.as_array() {
                Some(items) if keyword == "maxItems" =>
                    verdict(items.len() <= limit, || format!("more than {limit} items")),
                Some(items) => verdict(items.len() >= limit, || format!("fewer than {limit} items")),
                None => Assertion::Pass,
            }
        }
        "uniqueItems" =>
            match (expected, instance) {
                (Value::Bool(true), Value::Array(items)) => {
                    let duplicated = items
                        .iter()
                        .tuple_combinations()
                        .any(|(a, b)| json_equal(a, b));
                    verdict(!duplicated, || "items are not unique".to_owned())
                }
                (Value::Bool(_), _) => Assertion::Pass,
                _ => {
                    return Err(Error::invalid(location, "must be a boolean"));
                }
            }
        "maxProperties" | "minProperties" => {
            let limit = as_count(expected, location)?;
            match instance.as_object() {
                Some(obj) if keyword == "maxProperties" =>
                    verdict(obj.len() <= limit, || format!("more than {limit} properties")),
                Some(obj) => verdict(obj.len() >= limit, || format!("fewer than {limit} properties")),
                None => Assertion::Pass,
            }
        }
        "required" =>
            match instance.as_object() {
                Some(obj) => {
                    let missing = missing_properties(expected, obj, location)?;
                    verdict(missing.is_empty(), || {
                        format!("missing required properties {}", missing.iter().join(", "))
                    })
                }
                None => Assertion::Pass,
            }
        "dependentRequired" => {
            let dependencies = expected
                .as_object()
                .ok_or_else(|| Error::invalid(location, "must be an object"))?;
            match instance.as_object() {
                Some(obj) => {
                    let mut missing = Vec::new();
                    for (name, required) in dependencies {
                        if obj.contains_key(name) {
                            missing.extend(missing_properties(required, obj, location)?);
                        }
                    }
                    verdict(missing.is_empty(), || {
                        format!("missing dependent properties {}", missing.iter().join(", "))
                    })
                }
                None => Assertion::Pass,
            }
        }
        _ => Assertion::Ignored,
    };

    Ok(assertion)
}

/// Names listed in `required` that `object` lacks.
pub(crate) fn missing_properties<'v>(
    required: &'v Value,
    object: &Map<String, Value>,
    location: &Location
) -> Result<Vec<&'v str>, Error> {
    let mut missing = Vec::new();
    for name in as_array(required, location)? {
        let name = name
            .as_str()
            .ok_or_else(|| Error::invalid(location, "property names must be strings"))?;
        if !object.contains_key(name) {
            missing.push(name);
        }
    }
    Ok(missing)
}

/// JSON equality, where `1` and `1.0` are the same number.
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) =>
            match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
                (Some(x), Some(y), _, _) => x == y,
                (_, _, Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            }
        (Value::Array(x), Value::Array(y)) =>
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b)),
        (Value::Object(x), Value::Object(y)) =>
            x.len() == y.len() &&
                x.iter().all(|(key, a)| y.get(key).is_some_and(|b| json_equal(a, b))),
        _ => a == b,
    }
}

fn is_type(name: &str, instance: &Value, location: &Location) -> Result<bool, Error> {
    let holds = match name {
        "null" => instance.is_null(),
        "boolean" => instance.is_boolean(),
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => is_integer(instance),
        _ => {
            return Err(Error::invalid(location, format!("unknown type `{name}`")));
        }
    };
    Ok(holds)
}

fn is_integer(instance: &Value) -> bool {
    match instance {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) if is_integer(instance) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_multiple(instance: &Value, expected: &Value, x: f64, divisor: f64) -> bool {
    match (instance.as_i64(), expected.as_i64()) {
        (Some(a), Some(b)) => a % b == 0,
        _ => {
            let quotient = x / divisor;
            quotient.is_finite() && (quotient - quotient.round()).abs() < 1e-9
        }
    }
}

fn bound(
    expected: &Value,
    instance: &Value,
    location: &Location,
    holds: impl FnOnce(f64, f64) -> bool,
    relation: &str
) -> Result<Assertion, Error> {
    // draft-04 spelled exclusive bounds as booleans beside `maximum`/`minimum`
    if expected.is_boolean() {
        return Ok(Assertion::Ignored);
    }
    let limit = as_number(expected, location)?;
    Ok(match instance.as_f64() {
        Some(x) => verdict(holds(x, limit), || format!("{instance} is not {relation} {expected}")),
        None => Assertion::Pass,
    })
}

fn as_array<'v>(value: &'v Value, location: &Location) -> Result<&'v Vec<Value>, Error> {
    value.as_array().ok_or_else(|| Error::invalid(location, "must be an array"))
}

fn as_number(value: &Value, location: &Location) -> Result<f64, Error> {
    value.as_f64().ok_or_else(|| Error::invalid(location, "must be a number"))
}

fn as_count(value: &Value, location: &Location) -> Result<usize, Error> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
        .map(|n| n as usize)
        .ok_or_else(|| Error::invalid(location, "must be a non-negative integer"))
}
