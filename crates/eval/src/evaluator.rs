use std::rc::Rc;

use fxhash::FxHashSet;
use itertools::Itertools;
use serde_json::{ Map, Value };
use tracing::{ debug, trace };

use crate::{
    Validator,
    assertions::{ self, Assertion, Patterns },
    dialect::Dialect,
    error::Error,
    location::{ Location, Segment },
    resolve::{ Registry, Target, join_uri, strip_fragment },
    trace::{ Evaluation, SubSchema, TraceNode },
};

/// The built-in [`Validator`]: evaluates a schema document against an instance
/// and records every schema and keyword application it makes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for Evaluator {
    fn evaluate<'s>(&self, schema: &'s Value, instance: &Value) -> Result<Evaluation<'s>, Error> {
        let dialect = Dialect::detect(schema)?;
        let registry = Registry::build(schema);
        debug!(%dialect, root = %registry.root_uri(), "evaluating instance");

        let mut scope = Scope {
            registry: &registry,
            dialect,
            patterns: Patterns::default(),
            active: Vec::new(),
            dynamic: vec![registry.root_uri().clone()],
        };
        let root = scope.apply(
            &registry.root(),
            registry.root_uri(),
            Location::root(),
            schema,
            instance,
            &Location::root()
        )?;

        Ok(Evaluation { dialect, valid: root.valid, root })
    }
}

/// The schema object currently being applied, and the instance it is applied to.
struct Frame<'f, 's> {
    schema: &'f SubSchema<'s>,
    base: &'f Rc<str>,
    object: &'s Map<String, Value>,
    location: &'f Location,
    instance: &'f Value,
    instance_location: &'f Location,
    /// Whether this object's `if` held, when it has one.
    condition: Option<bool>,
}

struct Scope<'r, 's> {
    registry: &'r Registry<'s>,
    dialect: Dialect,
    patterns: Patterns,
    /// References being followed, with the instance location they were followed at.
    active: Vec<(String, Location)>,
    /// Resources entered so far, outermost first.
    dynamic: Vec<Rc<str>>,
}

impl<'s> Scope<'_, 's> {
    /// Applies the schema found at `location` inside `schema` to `instance`.
    fn apply(
        &mut self,
        schema: &SubSchema<'s>,
        base: &Rc<str>,
        location: Location,
        value: &'s Value,
        instance: &Value,
        instance_location: &Location
    ) -> Result<TraceNode<'s>, Error> {
        trace!(schema = %location, instance = %instance_location, "applying schema");
        let mut node = TraceNode::new(schema, location, instance_location, None);

        let object = match value {
            Value::Bool(true) => {
                return Ok(node);
            }
            Value::Bool(false) => {
                node.fail("no value is allowed here");
                return Ok(node);
            }
            Value::Object(object) => object,
            _ => {
                return Err(
                    Error::invalid(&node.schema_location, "a schema must be an object or a boolean")
                );
            }
        };

        let base: Rc<str> = match object.get("$id").and_then(Value::as_str) {
            Some(id) => {
                let id = strip_fragment(id);
                join_uri(base, id).unwrap_or_else(|| id.to_owned()).into()
            }
            None => base.clone(),
        };

        // references push the resources they enter themselves
        let entered = object.contains_key("$id") && self.dynamic.last() != Some(&base);
        if entered {
            self.dynamic.push(base.clone());
        }
        let children = self.keywords(
            schema,
            &base,
            object,
            &node.schema_location,
            instance,
            instance_location
        );
        if entered {
            self.dynamic.pop();
        }

        let children = children?;
        node.valid = children.iter().all(|child| child.valid);
        node.children = children;
        Ok(node)
    }

    /// Applies every keyword of `object`, in document order except for the
    /// `unevaluated*` keywords, which need the others' results and run last.
    fn keywords(
        &mut self,
        schema: &SubSchema<'s>,
        base: &Rc<str>,
        object: &'s Map<String, Value>,
        location: &Location,
        instance: &Value,
        instance_location: &Location
    ) -> Result<Vec<TraceNode<'s>>, Error> {
        let mut condition = match object.get("if") {
            Some(value) =>
                Some(self.apply(schema, base, location.join("if"), value, instance, instance_location)?),
            None => None,
        };

        let frame = Frame {
            schema,
            base,
            object,
            location,
            instance,
            instance_location,
            condition: condition.as_ref().map(|outcome| outcome.valid),
        };
        let mut children = Vec::with_capacity(object.len());
        let mut deferred = Vec::new();
        for (keyword, value) in object {
            match keyword.as_str() {
                // the condition only selects `then` or `else`; it never fails on its own
                "if" => {
                    let mut node = TraceNode::new(schema, location.join("if"), instance_location, Some("if"));
                    node.children.extend(condition.take());
                    children.push(node);
                }
                "unevaluatedProperties" | "unevaluatedItems" => deferred.push((keyword.as_str(), value)),
                _ => {
                    if let Some(child) = self.keyword(&frame, keyword, value)? {
                        children.push(child);
                    }
                }
            }
        }

        for (keyword, value) in deferred {
            let child = self.unevaluated(&frame, keyword, value, &children)?;
            children.push(child);
        }
        Ok(children)
    }

    fn keyword(
        &mut self,
        frame: &Frame<'_, 's>,
        keyword: &'s str,
        value: &'s Value
    ) -> Result<Option<TraceNode<'s>>, Error> {
        let location = frame.location.join(keyword);
        let mut node = TraceNode::new(frame.schema, location, frame.instance_location, Some(keyword));

        match keyword {
            "properties" => self.properties(frame, value, &mut node)?,
            "patternProperties" => self.pattern_properties(frame, value, &mut node)?,
            "additionalProperties" => self.additional_properties(frame, value, &mut node)?,
            "propertyNames" => self.property_names(frame, value, &mut node)?,
            "dependentSchemas" | "dependencies" => self.dependencies(frame, value, &mut node)?,
            "prefixItems" => self.prefix_items(frame, value, &mut node)?,
            "items" => self.items(frame, value, &mut node)?,
            "additionalItems" => self.additional_items(frame, value, &mut node)?,
            "contains" => self.contains(frame, value, &mut node)?,
            "allOf" | "anyOf" | "oneOf" => self.combinator(frame, keyword, value, &mut node)?,
            "not" => {
                if self.descend(frame, &mut node, None, value, frame.instance, frame.instance_location)? {
                    node.fail("value matches a schema it must not match");
                }
            }
            "then" | "else" => {
                let Some(holds) = frame.condition else {
                    return Ok(None);
                };
                if holds == (keyword == "then") {
                    if !self.descend(frame, &mut node, None, value, frame.instance, frame.instance_location)? {
                        node.valid = false;
                    }
                }
            }
            "$ref" | "$dynamicRef" => self.reference(frame, keyword, value, &mut node)?,
            "$recursiveRef" if self.dialect == Dialect::Draft2019_09 => {
                self.reference(frame, keyword, value, &mut node)?
            }
            _ =>
                match
                    assertions::check(
                        keyword,
                        value,
                        frame.instance,
                        &node.schema_location,
                        &mut self.patterns
                    )?
                {
                    Assertion::Ignored => {
                        return Ok(None);
                    }
                    Assertion::Pass => {}
                    Assertion::Fail(message) => node.fail(message),
                }
        }

        Ok(Some(node))
    }

    /// Applies `subschema`, found at `at` below the keyword, and records it under `node`.
    fn descend(
        &mut self,
        frame: &Frame<'_, 's>,
        node: &mut TraceNode<'s>,
        at: Option<Segment>,
        subschema: &'s Value,
        instance: &Value,
        instance_location: &Location
    ) -> Result<bool, Error> {
        let mut location = node.schema_location.clone();
        location.extend(at);
        let child = self.apply(frame.schema, frame.base, location, subschema, instance, instance_location)?;
        let valid = child.valid;
        node.children.push(child);
        Ok(valid)
    }

    fn properties(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let schemas = as_object(value, &node.schema_location)?;
        let Value::Object(instance) = frame.instance else {
            return Ok(());
        };

        let mut valid = true;
        for (name, item) in instance {
            if let Some(subschema) = schemas.get(name) {
                let at = frame.instance_location.join(name.as_str());
                valid &= self.descend(frame, node, Some(name.as_str().into()), subschema, item, &at)?;
            }
        }
        node.valid &= valid;
        Ok(())
    }

    fn pattern_properties(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let schemas = as_object(value, &node.schema_location)?;
        let Value::Object(instance) = frame.instance else {
            return Ok(());
        };

        let mut valid = true;
        for (name, item) in instance {
            for (pattern, subschema) in schemas {
                if self.patterns.is_match(pattern, name)? {
                    let at = frame.instance_location.join(name.as_str());
                    valid &= self.descend(frame, node, Some(pattern.as_str().into()), subschema, item, &at)?;
                }
            }
        }
        node.valid &= valid;
        Ok(())
    }

    /// Properties matched by neither `properties` nor `patternProperties`.
    ///
    /// A schema that accepts anything (`true` or `{}`) is not applied, so such
    /// properties leave no trace.
    fn additional_properties(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let Value::Object(instance) = frame.instance else {
            return Ok(());
        };
        if is_trivially_true(value) {
            return Ok(());
        }

        let declared = frame.object.get("properties").and_then(Value::as_object);
        let patterns = frame.object.get("patternProperties").and_then(Value::as_object);

        let mut valid = true;
        for (name, item) in instance {
            if declared.is_some_and(|declared| declared.contains_key(name)) {
                continue;
            }
            if let Some(patterns) = patterns {
                let mut matched = false;
                for pattern in patterns.keys() {
                    if self.patterns.is_match(pattern, name)? {
                        matched = true;
                        break;
                    }
                }
                if matched {
                    continue;
                }
            }
            let at = frame.instance_location.join(name.as_str());
            valid &= self.descend(frame, node, None, value, item, &at)?;
        }
        node.valid &= valid;
        Ok(())
    }

    /// Property names are not document nodes, so their evaluation is not recorded.
    fn property_names(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let Value::Object(instance) = frame.instance else {
            return Ok(());
        };

        let mut rejected = Vec::new();
        for name in instance.keys() {
            let as_instance = Value::String(name.clone());
            let outcome = self.apply(
                frame.schema,
                frame.base,
                node.schema_location.clone(),
                value,
                &as_instance,
                frame.instance_location
            )?;
            if !outcome.valid {
                rejected.push(name.as_str());
            }
        }
        if !rejected.is_empty() {
            node.fail(format!("property names {} are not allowed", rejected.iter().join(", ")));
        }
        Ok(())
    }

    /// `dependentSchemas`, and draft-07 `dependencies` in both of its forms.
    fn dependencies(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let dependencies = as_object(value, &node.schema_location)?;
        let Value::Object(instance) = frame.instance else {
            return Ok(());
        };

        let mut valid = true;
        let mut missing = Vec::new();
        for (name, dependency) in dependencies {
            if !instance.contains_key(name) {
                continue;
            }
            if dependency.is_array() {
                let location = node.schema_location.join(name.as_str());
                missing.extend(assertions::missing_properties(dependency, instance, &location)?);
            } else {
                valid &= self.descend(
                    frame,
                    node,
                    Some(name.as_str().into()),
                    dependency,
                    frame.instance,
                    frame.instance_location
                )?;
            }
        }
        if !missing.is_empty() {
            node.fail(format!("missing dependent properties {}", missing.iter().join(", ")));
        }
        node.valid &= valid;
        Ok(())
    }

    fn prefix_items(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let schemas = as_array(value, &node.schema_location)?;
        self.tuple(frame, schemas, node)
    }

    /// Applies `schemas[i]` to the i-th item, for as many items as both sides have.
    fn tuple(
        &mut self,
        frame: &Frame<'_, 's>,
        schemas: &'s [Value],
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let Value::Array(items) = frame.instance else {
            return Ok(());
        };

        let mut valid = true;
        for (index, (subschema, item)) in schemas.iter().zip(items).enumerate() {
            let at = frame.instance_location.join(index);
            valid &= self.descend(frame, node, Some(index.into()), subschema, item, &at)?;
        }
        node.valid &= valid;
        Ok(())
    }

    /// Applies `value` to every item from `skip` onwards.
    fn rest(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        skip: usize,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let Value::Array(items) = frame.instance else {
            return Ok(());
        };

        let mut valid = true;
        for (index, item) in items.iter().enumerate().skip(skip) {
            let at = frame.instance_location.join(index);
            valid &= self.descend(frame, node, None, value, item, &at)?;
        }
        node.valid &= valid;
        Ok(())
    }

    fn items(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        match value {
            // draft-07 tuple form
            Value::Array(schemas) => self.tuple(frame, schemas, node),
            _ => {
                let skip = frame.object
                    .get("prefixItems")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                self.rest(frame, value, skip, node)
            }
        }
    }

    fn additional_items(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        match frame.object.get("items").and_then(Value::as_array) {
            Some(schemas) => self.rest(frame, value, schemas.len(), node),
            None => Ok(()),
        }
    }

    fn contains(
        &mut self,
        frame: &Frame<'_, 's>,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let Value::Array(items) = frame.instance else {
            return Ok(());
        };

        let mut matched: u64 = 0;
        for (index, item) in items.iter().enumerate() {
            let at = frame.instance_location.join(index);
            if self.descend(frame, node, None, value, item, &at)? {
                matched += 1;
            }
        }

        let min = frame.object.get("minContains").and_then(Value::as_u64).unwrap_or(1);
        let max = frame.object.get("maxContains").and_then(Value::as_u64);
        if matched < min {
            node.fail(format!("expected at least {min} items to match `contains`, found {matched}"));
        } else if let Some(max) = max.filter(|max| matched > *max) {
            node.fail(format!("expected at most {max} items to match `contains`, found {matched}"));
        }
        Ok(())
    }

    /// `allOf`, `anyOf` and `oneOf`. Every branch is applied and recorded,
    /// including the ones that fail.
    fn combinator(
        &mut self,
        frame: &Frame<'_, 's>,
        keyword: &str,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let schemas = as_array(value, &node.schema_location)?;

        let mut passed = 0;
        for (index, subschema) in schemas.iter().enumerate() {
            if self.descend(frame, node, Some(index.into()), subschema, frame.instance, frame.instance_location)? {
                passed += 1;
            }
        }

        match keyword {
            "allOf" if passed < schemas.len() => {
                node.valid = false;
            }
            "anyOf" if passed == 0 => {
                node.valid = false;
            }
            "oneOf" if passed != 1 => {
                node.fail(format!("expected exactly one `oneOf` branch to match, {passed} did"));
            }
            _ => {}
        }
        Ok(())
    }

    /// `unevaluatedProperties` and `unevaluatedItems`: applies `value` to the
    /// members that no sibling keyword evaluated, looking through the in-place
    /// sub-schemas that passed.
    fn unevaluated(
        &mut self,
        frame: &Frame<'_, 's>,
        keyword: &'s str,
        value: &'s Value,
        siblings: &[TraceNode<'s>]
    ) -> Result<TraceNode<'s>, Error> {
        let location = frame.location.join(keyword);
        let mut node = TraceNode::new(frame.schema, location, frame.instance_location, Some(keyword));
        if is_trivially_true(value) {
            return Ok(node);
        }

        let mut evaluated = Evaluated::default();
        evaluated.collect(siblings);

        let mut valid = true;
        match frame.instance {
            Value::Object(instance) if keyword == "unevaluatedProperties" && !evaluated.all_properties => {
                for (name, item) in instance {
                    if !evaluated.properties.contains(name.as_str()) {
                        let at = frame.instance_location.join(name.as_str());
                        valid &= self.descend(frame, &mut node, None, value, item, &at)?;
                    }
                }
            }
            Value::Array(items) if keyword == "unevaluatedItems" && !evaluated.all_items => {
                for (index, item) in items.iter().enumerate() {
                    if !evaluated.items.contains(&index) {
                        let at = frame.instance_location.join(index);
                        valid &= self.descend(frame, &mut node, None, value, item, &at)?;
                    }
                }
            }
            _ => {}
        }
        node.valid &= valid;
        Ok(node)
    }

    fn reference(
        &mut self,
        frame: &Frame<'_, 's>,
        keyword: &str,
        value: &'s Value,
        node: &mut TraceNode<'s>
    ) -> Result<(), Error> {
        let reference = value
            .as_str()
            .ok_or_else(|| Error::invalid(&node.schema_location, "must be a string"))?;
        let target = match keyword {
            "$dynamicRef" => self.dynamic_target(frame.base, reference)?,
            "$recursiveRef" => self.recursive_target(frame.base, reference)?,
            _ => self.registry.resolve(frame.base, reference)?,
        };

        let identity = (
            target.schema.canonical_uri().unwrap_or_default().to_owned(),
            frame.instance_location.clone(),
        );
        if self.active.contains(&identity) {
            return Err(Error::RecursionLimit { reference: reference.to_owned() });
        }

        self.active.push(identity);
        self.dynamic.push(target.base.clone());
        let child = self.apply(
            &target.schema,
            &target.base,
            Location::root(),
            target.schema.root(),
            frame.instance,
            frame.instance_location
        );
        self.dynamic.pop();
        self.active.pop();

        let child = child?;
        node.valid &= child.valid;
        node.children.push(child);
        Ok(())
    }

    /// A `$dynamicRef` whose static target is a `$dynamicAnchor` resolves to the
    /// outermost resource in the dynamic scope declaring the same anchor.
    fn dynamic_target(&self, base: &str, reference: &str) -> Result<Target<'s>, Error> {
        let target = self.registry.resolve(base, reference)?;
        let anchor = match reference.split_once('#') {
            Some((_, anchor)) if !anchor.is_empty() && !anchor.starts_with('/') => anchor,
            _ => {
                return Ok(target);
            }
        };
        if !self.registry.has_dynamic_anchor(&target.base, anchor) {
            return Ok(target);
        }

        let outermost = self.dynamic
            .iter()
            .find(|uri| self.registry.has_dynamic_anchor(uri, anchor));
        match outermost {
            Some(uri) => self.registry.resolve(uri, &format!("#{anchor}")),
            None => Ok(target),
        }
    }

    /// A `$recursiveRef` whose static target sets `$recursiveAnchor` resolves to
    /// the outermost resource in the dynamic scope that sets it too.
    fn recursive_target(&self, base: &str, reference: &str) -> Result<Target<'s>, Error> {
        let target = self.registry.resolve(base, reference)?;
        if !is_recursive_anchor(target.schema.root()) {
            return Ok(target);
        }

        let outermost = self.dynamic
            .iter()
            .find(|uri| self.registry.resource(uri).is_some_and(is_recursive_anchor));
        match outermost {
            Some(uri) => self.registry.resolve(uri, "#"),
            None => Ok(target),
        }
    }
}

/// Instance members evaluated by the keywords of one schema object, or by the
/// passing in-place sub-schemas below them.
#[derive(Default)]
struct Evaluated<'t> {
    all_properties: bool,
    all_items: bool,
    properties: FxHashSet<&'t str>,
    items: FxHashSet<usize>,
}

impl<'t> Evaluated<'t> {
    fn collect(&mut self, keywords: &'t [TraceNode<'_>]) {
        for node in keywords {
            match node.keyword.unwrap_or_default() {
                "properties" | "patternProperties" => {
                    self.properties.extend(
                        members(node).filter_map(|segment| match segment {
                            Segment::Property(name) => Some(name.as_str()),
                            Segment::Index(_) => None,
                        })
                    );
                }
                "prefixItems" | "items" | "additionalItems" => {
                    self.items.extend(members(node).filter_map(as_index));
                }
                "contains" => {
                    let matched = node.children
                        .iter()
                        .filter(|child| child.valid)
                        .filter_map(|child| child.instance_location.segments().last());
                    self.items.extend(matched.filter_map(as_index));
                }
                "additionalProperties" | "unevaluatedProperties" => {
                    self.all_properties = true;
                }
                "unevaluatedItems" => {
                    self.all_items = true;
                }
                "allOf" | "anyOf" | "oneOf" | "if" | "then" | "else" | "dependentSchemas"
                | "dependencies" | "$ref" | "$dynamicRef" | "$recursiveRef" => {
                    for child in node.children.iter().filter(|child| child.valid) {
                        self.collect(&child.children);
                    }
                }
                _ => {}
            }
        }
    }
}

/// The last instance segment of each sub-schema application below `node`.
fn members<'t>(node: &'t TraceNode<'_>) -> impl Iterator<Item = &'t Segment> {
    node.children.iter().filter_map(|child| child.instance_location.segments().last())
}

fn as_index(segment: &Segment) -> Option<usize> {
    match segment {
        Segment::Index(index) => Some(*index),
        Segment::Property(_) => None,
    }
}

fn is_recursive_anchor(schema: &Value) -> bool {
    schema.get("$recursiveAnchor").and_then(Value::as_bool) == Some(true)
}

fn is_trivially_true(schema: &Value) -> bool {
    match schema {
        Value::Bool(accepts) => *accepts,
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

fn as_object<'v>(value: &'v Value, location: &Location) -> Result<&'v Map<String, Value>, Error> {
    value.as_object().ok_or_else(|| Error::invalid(location, "must be an object"))
}

fn as_array<'v>(value: &'v Value, location: &Location) -> Result<&'v Vec<Value>, Error> {
    value.as_array().ok_or_else(|| Error::invalid(location, "must be an array"))
}
