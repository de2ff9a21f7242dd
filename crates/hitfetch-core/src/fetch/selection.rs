//! Field selection: turns request options into a per-request plan.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::mapping::{MappingService, SOURCE_FIELD};

use super::request::{FetchRequest, FetchSourceOptions};
use super::visitor::FieldsVisitor;

/// What to load for every document of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelectionPlan {
    /// Explicit leaf field names.
    pub fields: BTreeSet<String>,
    /// `*` patterns matched against stored field names.
    pub patterns: Vec<String>,
    /// Load the full source.
    pub load_source: bool,
    /// Stored fields are disabled; hits carry only their doc id.
    pub disabled: bool,
    /// A non-empty stored field list was given.
    pub explicit: bool,
    /// Effective source directive, includes and excludes kept.
    pub source: Option<FetchSourceOptions>,
}

impl FieldSelectionPlan {
    /// Whether a stored field of this name was asked for.
    pub fn matches(&self, name: &str) -> bool {
        self.fields.contains(name) || self.patterns.iter().any(|p| simple_match(p, name))
    }

    /// Whether specific fields (rather than just metadata) are loaded.
    pub fn is_custom(&self) -> bool {
        !self.fields.is_empty() || !self.patterns.is_empty()
    }

    /// The visitor for root documents, `None` when stored fields are disabled.
    pub fn visitor(&self) -> Option<FieldsVisitor> {
        if self.disabled {
            None
        } else if self.is_custom() {
            Some(FieldsVisitor::custom(
                self.fields.clone(),
                self.patterns.clone(),
                self.load_source,
            ))
        } else {
            Some(FieldsVisitor::new(self.load_source))
        }
    }

    /// The visitor for a nested document's own stored fields.
    pub fn nested_visitor(&self) -> FieldsVisitor {
        FieldsVisitor::custom(self.fields.clone(), self.patterns.clone(), false)
    }
}

/// Resolves requested names against the mappings.
pub struct FieldSelector<'a> {
    mappings: &'a MappingService,
}

impl<'a> FieldSelector<'a> {
    pub fn new(mappings: &'a MappingService) -> Self {
        Self { mappings }
    }

    /// Build the plan for a request.
    pub fn plan(&self, request: &FetchRequest) -> Result<FieldSelectionPlan, Error> {
        let mut plan = FieldSelectionPlan {
            source: request.fetch_source.clone(),
            ..Default::default()
        };

        match &request.stored_fields {
            None => {
                if !request.script_fields && request.fetch_source.is_none() {
                    plan.source = Some(FetchSourceOptions::fetch());
                }
            }
            Some(options) if !options.fetch_fields => {
                plan.disabled = true;
            }
            Some(options) => {
                plan.explicit = !options.field_names.is_empty();
                for name in &options.field_names {
                    if name == SOURCE_FIELD {
                        let current = plan.source.take().unwrap_or_else(FetchSourceOptions::fetch);
                        plan.source = Some(FetchSourceOptions {
                            fetch: true,
                            ..current
                        });
                    } else if is_simple_match_pattern(name) {
                        plan.patterns.push(name.clone());
                    } else {
                        self.check_leaf(name)?;
                        plan.fields.insert(name.clone());
                    }
                }
            }
        }

        plan.load_source = plan.source.as_ref().is_some_and(|s| s.fetch);
        Ok(plan)
    }

    /// Only names that resolve to an object fail; unknown names are absent
    /// fields.
    fn check_leaf(&self, name: &str) -> Result<(), Error> {
        if MappingService::is_meta_field(name) || self.mappings.smart_field(name).is_some() {
            return Ok(());
        }
        if self.mappings.object_mapping(name).is_some() {
            return Err(Error::FieldResolution {
                field: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Whether a name is a `*` pattern.
pub fn is_simple_match_pattern(name: &str) -> bool {
    name.contains('*')
}

/// Match `value` against a pattern where `*` matches any run of characters.
///
/// Linear in practice: on a mismatch only the most recent `*` is retried.
pub fn simple_match(pattern: &str, value: &str) -> bool {
    let pattern = pattern.as_bytes();
    let value = value.as_bytes();
    let (mut p, mut v) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, v));
            p += 1;
        } else if p < pattern.len() && pattern[p] == value[v] {
            p += 1;
            v += 1;
        } else if let Some((star_p, star_v)) = star {
            p = star_p + 1;
            v = star_v + 1;
            star = Some((star_p, v));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}
