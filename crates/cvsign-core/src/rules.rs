//! # Exclusion Rules — What Part of a Descriptor Is Signed
//!
//! An [`ExcludeRules`] tree mirrors the shape of the document it is applied
//! to. The normalization engine consults it top-down: for every object field
//! it calls [`ExcludeRules::field()`], for every array element
//! [`ExcludeRules::element()`]. Each call either drops the value or keeps it
//! (possibly renamed and mapped) together with the rule set to apply below
//! it.
//!
//! Map rules only accept objects and array rules only accept arrays. Calling
//! the wrong operation yields [`NormalizationError::RuleShape`] carrying the
//! path of the value, so a rule tree that does not fit the document fails
//! loudly instead of silently signing too much or too little.
//!
//! Rule trees are immutable once built and are `Send + Sync`; the
//! descriptor rule set is built once per normalization call but user rule
//! sets can be shared freely.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::NormalizationError;

/// Predicate over a field or element value.
pub type ValueChecker = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Transformation applied to a kept value before recursing into it.
pub type ValueMapper = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

static NO_EXCLUDES: ExcludeRules = ExcludeRules::NoExcludes;

/// Exclusion/inclusion rule tree.
#[derive(Clone, Default)]
pub enum ExcludeRules {
    /// Keep everything below this point.
    #[default]
    NoExcludes,
    /// Deny-list: listed fields with `None` are dropped, listed fields with
    /// `Some` recurse into those rules, unlisted fields are kept.
    MapExcludes(BTreeMap<String, Option<ExcludeRules>>),
    /// Allow-list: only listed fields are kept (`None` keeps everything
    /// below the field).
    MapIncludes(BTreeMap<String, Option<ExcludeRules>>),
    /// Deny-list with value predicates, mappers and renames.
    DynamicMapExcludes(BTreeMap<String, Option<DynamicEntry>>),
    /// Allow-list with value predicates, mappers and renames.
    DynamicMapIncludes(BTreeMap<String, Option<DynamicEntry>>),
    /// The same rules for every element of an array.
    ArrayExcludes(Box<ExcludeRules>),
    /// A per-element predicate deciding exclusion.
    DynamicArrayExcludes(DynamicArrayExcludes),
}

/// Entry of a dynamic map rule.
///
/// In a [`ExcludeRules::DynamicMapExcludes`] the checker says "drop"; in a
/// [`ExcludeRules::DynamicMapIncludes`] it says "keep".
#[derive(Clone, Default)]
pub struct DynamicEntry {
    pub checker: Option<ValueChecker>,
    pub mapper: Option<ValueMapper>,
    pub continuation: Option<ExcludeRules>,
    pub rename: Option<String>,
}

impl DynamicEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.checker = Some(Arc::new(f));
        self
    }

    pub fn map(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.mapper = Some(Arc::new(f));
        self
    }

    pub fn then(mut self, rules: ExcludeRules) -> Self {
        self.continuation = Some(rules);
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    fn mapped<'v>(&self, value: &'v Value) -> Cow<'v, Value> {
        match &self.mapper {
            Some(m) => Cow::Owned(m(value)),
            None => Cow::Borrowed(value),
        }
    }

    fn name(&self, name: &str) -> String {
        match &self.rename {
            Some(n) if !n.is_empty() => n.clone(),
            _ => name.to_string(),
        }
    }
}

/// Element rule of an array whose elements are filtered individually.
#[derive(Clone, Default)]
pub struct DynamicArrayExcludes {
    /// Returns true for elements that must be excluded.
    pub checker: Option<ValueChecker>,
    pub mapper: Option<ValueMapper>,
    /// Rules for kept elements; `None` keeps them whole.
    pub continuation: Option<Box<ExcludeRules>>,
}

impl DynamicArrayExcludes {
    pub fn new(checker: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            checker: Some(Arc::new(checker)),
            ..Self::default()
        }
    }

    pub fn map(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.mapper = Some(Arc::new(f));
        self
    }

    pub fn then(mut self, rules: ExcludeRules) -> Self {
        self.continuation = Some(Box::new(rules));
        self
    }
}

/// Outcome of keeping an object field.
#[derive(Debug)]
pub struct FieldDecision<'r, 'v> {
    /// Final field name (after an optional rename).
    pub name: String,
    /// Field value (after an optional mapper).
    pub value: Cow<'v, Value>,
    /// Rules for the value.
    pub rules: &'r ExcludeRules,
}

/// Outcome of keeping an array element.
#[derive(Debug)]
pub struct ElementDecision<'r, 'v> {
    pub value: Cow<'v, Value>,
    pub rules: &'r ExcludeRules,
}

impl ExcludeRules {
    /// Deny-list from `(field, rules)` pairs.
    pub fn map_excludes<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, Option<ExcludeRules>)>,
    ) -> Self {
        Self::MapExcludes(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Allow-list from `(field, rules)` pairs.
    pub fn map_includes<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, Option<ExcludeRules>)>,
    ) -> Self {
        Self::MapIncludes(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn dynamic_map_excludes<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, Option<DynamicEntry>)>,
    ) -> Self {
        Self::DynamicMapExcludes(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn dynamic_map_includes<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, Option<DynamicEntry>)>,
    ) -> Self {
        Self::DynamicMapIncludes(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The same rules for all elements.
    pub fn array(elements: ExcludeRules) -> Self {
        Self::ArrayExcludes(Box::new(elements))
    }

    /// Variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoExcludes => "NoExcludes",
            Self::MapExcludes(_) => "MapExcludes",
            Self::MapIncludes(_) => "MapIncludes",
            Self::DynamicMapExcludes(_) => "DynamicMapExcludes",
            Self::DynamicMapIncludes(_) => "DynamicMapIncludes",
            Self::ArrayExcludes(_) => "ArrayExcludes",
            Self::DynamicArrayExcludes(_) => "DynamicArrayExcludes",
        }
    }

    /// Decide the fate of object field `name`.
    ///
    /// `Ok(None)` drops the field.
    ///
    /// # Errors
    ///
    /// [`NormalizationError::RuleShape`] if this is an array rule.
    pub fn field<'r, 'v>(
        &'r self,
        name: &str,
        value: &'v Value,
        path: &str,
    ) -> Result<Option<FieldDecision<'r, 'v>>, NormalizationError> {
        let keep = |name: String, value: Cow<'v, Value>, rules: &'r ExcludeRules| {
            Ok(Some(FieldDecision { name, value, rules }))
        };
        match self {
            Self::NoExcludes => keep(name.to_string(), Cow::Borrowed(value), self),
            Self::MapExcludes(m) => match m.get(name) {
                None => keep(name.to_string(), Cow::Borrowed(value), &NO_EXCLUDES),
                Some(None) => Ok(None),
                Some(Some(rules)) => keep(name.to_string(), Cow::Borrowed(value), rules),
            },
            Self::MapIncludes(m) => match m.get(name) {
                None => Ok(None),
                Some(rules) => keep(
                    name.to_string(),
                    Cow::Borrowed(value),
                    rules.as_ref().unwrap_or(&NO_EXCLUDES),
                ),
            },
            Self::DynamicMapExcludes(m) => match m.get(name) {
                None => keep(name.to_string(), Cow::Borrowed(value), &NO_EXCLUDES),
                Some(None) => Ok(None),
                Some(Some(e)) => {
                    let drop = match &e.checker {
                        Some(c) => c(value),
                        None => e.continuation.is_none(),
                    };
                    if drop {
                        return Ok(None);
                    }
                    keep(
                        e.name(name),
                        e.mapped(value),
                        e.continuation.as_ref().unwrap_or(&NO_EXCLUDES),
                    )
                }
            },
            Self::DynamicMapIncludes(m) => match m.get(name) {
                None => Ok(None),
                Some(None) => keep(name.to_string(), Cow::Borrowed(value), &NO_EXCLUDES),
                Some(Some(e)) => {
                    if !e.checker.as_ref().map_or(true, |c| c(value)) {
                        return Ok(None);
                    }
                    keep(
                        e.name(name),
                        e.mapped(value),
                        e.continuation.as_ref().unwrap_or(&NO_EXCLUDES),
                    )
                }
            },
            Self::ArrayExcludes(_) | Self::DynamicArrayExcludes(_) => {
                Err(self.shape_error("object", "array", path))
            }
        }
    }

    /// Decide the fate of one array element.
    ///
    /// `Ok(None)` excludes the element.
    ///
    /// # Errors
    ///
    /// [`NormalizationError::RuleShape`] if this is a map rule.
    pub fn element<'r, 'v>(
        &'r self,
        value: &'v Value,
        path: &str,
    ) -> Result<Option<ElementDecision<'r, 'v>>, NormalizationError> {
        match self {
            Self::NoExcludes => Ok(Some(ElementDecision {
                value: Cow::Borrowed(value),
                rules: self,
            })),
            Self::ArrayExcludes(elements) => Ok(Some(ElementDecision {
                value: Cow::Borrowed(value),
                rules: elements,
            })),
            Self::DynamicArrayExcludes(d) => {
                if d.checker.as_ref().is_some_and(|c| c(value)) {
                    return Ok(None);
                }
                let value = match &d.mapper {
                    Some(m) => Cow::Owned(m(value)),
                    None => Cow::Borrowed(value),
                };
                Ok(Some(ElementDecision {
                    value,
                    rules: d.continuation.as_deref().unwrap_or(&NO_EXCLUDES),
                }))
            }
            Self::MapExcludes(_)
            | Self::MapIncludes(_)
            | Self::DynamicMapExcludes(_)
            | Self::DynamicMapIncludes(_) => Err(self.shape_error("array", "object", path)),
        }
    }

    fn shape_error(&self, expected: &'static str, found: &'static str, path: &str) -> NormalizationError {
        NormalizationError::RuleShape {
            rule: self.kind(),
            expected,
            found,
            path: path.to_string(),
        }
    }
}

impl fmt::Debug for ExcludeRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExcludes => f.write_str("NoExcludes"),
            Self::MapExcludes(m) => f.debug_tuple("MapExcludes").field(m).finish(),
            Self::MapIncludes(m) => f.debug_tuple("MapIncludes").field(m).finish(),
            Self::DynamicMapExcludes(m) => f.debug_tuple("DynamicMapExcludes").field(m).finish(),
            Self::DynamicMapIncludes(m) => f.debug_tuple("DynamicMapIncludes").field(m).finish(),
            Self::ArrayExcludes(e) => f.debug_tuple("ArrayExcludes").field(e).finish(),
            Self::DynamicArrayExcludes(d) => f.debug_tuple("DynamicArrayExcludes").field(d).finish(),
        }
    }
}

impl fmt::Debug for DynamicEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicEntry")
            .field("checker", &self.checker.is_some())
            .field("mapper", &self.mapper.is_some())
            .field("continuation", &self.continuation)
            .field("rename", &self.rename)
            .finish()
    }
}

impl fmt::Debug for DynamicArrayExcludes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArrayExcludes")
            .field("checker", &self.checker.is_some())
            .field("mapper", &self.mapper.is_some())
            .field("continuation", &self.continuation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// True if the element's `access.type` equals `access_type`, or if the
/// element has no access at all.
pub fn check_ignore_resources_with_access_type(access_type: &str, v: &Value) -> bool {
    match v.get("access") {
        None | Some(Value::Null) => true,
        Some(access) => access.get("type").and_then(Value::as_str) == Some(access_type),
    }
}

/// Predicate excluding resources of the given access type.
pub fn ignore_resources_with_access_type(access_type: impl Into<String>) -> ValueChecker {
    let access_type = access_type.into();
    Arc::new(move |v| check_ignore_resources_with_access_type(&access_type, v))
}

/// Excludes resources without access or with access type `none`.
pub fn ignore_resources_with_none_access(v: &Value) -> bool {
    check_ignore_resources_with_access_type(crate::descriptor::ACCESS_TYPE_NONE, v)
}

/// Excludes labels that are not explicitly marked `signing: true`.
pub fn ignore_labels_without_signature(v: &Value) -> bool {
    v.get("signing").and_then(Value::as_bool) != Some(true)
}

fn signed_labels() -> ExcludeRules {
    ExcludeRules::DynamicArrayExcludes(DynamicArrayExcludes::new(ignore_labels_without_signature))
}

/// The rule set applied to serialized
/// [`ComponentDescriptor`](crate::descriptor::ComponentDescriptor)s before
/// hashing.
pub fn descriptor_exclude_rules() -> ExcludeRules {
    let labels = || Some(signed_labels());
    ExcludeRules::map_excludes([
        ("signatures", None),
        ("nestedDigests", None),
        (
            "component",
            Some(ExcludeRules::map_excludes([
                ("repositoryContexts", None),
                ("labels", labels()),
                (
                    "provider",
                    Some(ExcludeRules::map_excludes([("labels", labels())])),
                ),
                (
                    "resources",
                    Some(ExcludeRules::DynamicArrayExcludes(
                        DynamicArrayExcludes::new(ignore_resources_with_none_access).then(
                            ExcludeRules::map_excludes([
                                ("access", None),
                                ("srcRefs", None),
                                ("labels", labels()),
                            ]),
                        ),
                    )),
                ),
                (
                    "sources",
                    Some(ExcludeRules::array(ExcludeRules::map_excludes([
                        ("access", None),
                        ("labels", labels()),
                    ]))),
                ),
                (
                    "componentReferences",
                    Some(ExcludeRules::array(ExcludeRules::map_excludes([(
                        "labels",
                        labels(),
                    )]))),
                ),
            ])),
        ),
    ])
}
