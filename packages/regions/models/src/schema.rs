//! Column-level capability negotiation between pipeline stages.
//!
//! Every tabular input (the region collection, a metrics table, a point
//! table) exposes a [`Schema`]. Stages declare the fields they need as a
//! [`FieldRequirements`] and negotiate against the schema once, instead of
//! probing for individual columns wherever they happen to need them.

use std::collections::BTreeMap;

/// A logical field a stage wants, with the column names that satisfy it.
///
/// Aliases are matched case-insensitively against the schema's columns, in
/// order, so the first alias listed is the preferred spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Logical name used by the consuming stage.
    pub name: &'static str,
    /// Column names accepted for this field.
    pub aliases: &'static [&'static str],
}

impl Field {
    /// Creates a field satisfied by any of `aliases`.
    #[must_use]
    pub const fn new(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }
}

/// Required and optional fields declared by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRequirements {
    /// Fields that must be present; negotiation fails without them.
    pub required: &'static [Field],
    /// Fields that enable optional behaviour when present.
    pub optional: &'static [Field],
}

/// The result of a successful negotiation: which logical fields resolved to
/// which actual columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    resolved: BTreeMap<&'static str, String>,
}

impl Capabilities {
    /// Returns the actual column name backing a logical field, if present.
    #[must_use]
    pub fn column(&self, field: &str) -> Option<&str> {
        self.resolved.get(field).map(String::as_str)
    }

    /// Whether a logical field (required or optional) resolved.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.resolved.contains_key(field)
    }
}

/// Error returned when required fields are absent from a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields {
    /// Logical names of the required fields that did not resolve.
    pub missing: Vec<String>,
}

impl std::fmt::Display for MissingFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "missing required field(s): {}", self.missing.join(", "))
    }
}

impl std::error::Error for MissingFields {}

/// Ordered column names exposed by a tabular input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Builds a schema from column names, dropping duplicates while keeping
    /// first-seen order.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !out.contains(&column) {
                out.push(column);
            }
        }
        Self { columns: out }
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Exact (case-sensitive) column membership.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Resolves a single field against this schema.
    #[must_use]
    pub fn resolve(&self, field: &Field) -> Option<&str> {
        field.aliases.iter().find_map(|alias| {
            self.columns
                .iter()
                .find(|c| c.eq_ignore_ascii_case(alias))
                .map(String::as_str)
        })
    }

    /// Negotiates a stage's requirements against this schema.
    ///
    /// # Errors
    ///
    /// Returns [`MissingFields`] listing every required field that could not
    /// be resolved.
    pub fn negotiate(&self, requirements: &FieldRequirements) -> Result<Capabilities, MissingFields> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for field in requirements.required {
            match self.resolve(field) {
                Some(column) => {
                    resolved.insert(field.name, column.to_owned());
                }
                None => missing.push(field.name.to_owned()),
            }
        }

        if !missing.is_empty() {
            return Err(MissingFields { missing });
        }

        for field in requirements.optional {
            if let Some(column) = self.resolve(field) {
                resolved.insert(field.name, column.to_owned());
            }
        }

        Ok(Capabilities { resolved })
    }
}
