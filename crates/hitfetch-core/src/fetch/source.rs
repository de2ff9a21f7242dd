//! Re-slicing a root source down to one nested instance, and narrowing a
//! source by include and exclude patterns.

use bytes::Bytes;
use hitfetch_proto::{NestedIdentity, SourceFormat};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

use super::request::FetchSourceOptions;
use super::selection::simple_match;

/// The source of a nested hit.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedSource {
    /// The matched instance wrapped in its path segments, outermost first.
    pub wrapped: JsonValue,
    /// The matched instance itself.
    pub parsed: JsonValue,
    /// `parsed` re-encoded in the root's format.
    pub source: Bytes,
    pub format: SourceFormat,
}

/// Extract the instance addressed by `identity` from a root source.
pub fn reconstruct(
    identity: &NestedIdentity,
    root_source: &[u8],
    format: SourceFormat,
) -> Result<NestedSource, Error> {
    let root = format.decode(root_source)?;
    let mut scope = &root;
    let mut segments = Vec::new();

    for link in identity.iter() {
        let value = extract(scope, &link.field).ok_or_else(|| {
            Error::StructuralConsistency(format!(
                "no source value at nested path [{}]",
                link.field
            ))
        })?;
        scope = match value {
            JsonValue::Array(items) => items.get(link.offset).ok_or_else(|| {
                Error::StructuralConsistency(format!(
                    "nested path [{}] has {} instances, offset is {}",
                    link.field,
                    items.len(),
                    link.offset
                ))
            })?,
            JsonValue::Object(_) => value,
            _ => {
                return Err(Error::StructuralConsistency(format!(
                    "extracted source at [{}] isn't an object or an array",
                    link.field
                )))
            }
        };
        segments.extend(link.field.split('.'));
    }

    if !scope.is_object() {
        return Err(Error::StructuralConsistency(format!(
            "nested instance [{identity}] isn't an object"
        )));
    }

    let parsed = scope.clone();
    let wrapped = segments.iter().rev().fold(parsed.clone(), |inner, segment| {
        let mut outer = Map::new();
        outer.insert(segment.to_string(), inner);
        JsonValue::Object(outer)
    });
    let source = Bytes::from(format.encode(&parsed)?);

    Ok(NestedSource {
        wrapped,
        parsed,
        source,
        format,
    })
}

/// Keep the parts of `tree` selected by the include and exclude patterns.
///
/// Patterns are full dotted paths. `prefix` is the path of `tree` itself,
/// empty for a root source. A path is included when it or one of its
/// ancestors matches an include (or there are no includes); an object or
/// array that is not itself included survives only if something below it
/// does. Excludes win over includes.
pub fn filter_source(tree: &JsonValue, prefix: &str, options: &FetchSourceOptions) -> JsonValue {
    filter_value(tree, prefix, options).unwrap_or_else(|| JsonValue::Object(Map::new()))
}

/// Encode `tree` narrowed by `options`.
pub(crate) fn filter_encoded(
    tree: &JsonValue,
    prefix: &str,
    options: &FetchSourceOptions,
    format: SourceFormat,
) -> Result<Bytes, Error> {
    let filtered = filter_source(tree, prefix, options);
    Ok(Bytes::from(format.encode(&filtered)?))
}

fn filter_value(value: &JsonValue, path: &str, options: &FetchSourceOptions) -> Option<JsonValue> {
    if !path.is_empty() && options.excludes.iter().any(|p| simple_match(p, path)) {
        return None;
    }
    let included = is_included(path, &options.includes);
    match value {
        JsonValue::Object(map) => {
            let mut kept = Map::new();
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if let Some(child) = filter_value(child, &child_path, options) {
                    kept.insert(key.clone(), child);
                }
            }
            (included || !kept.is_empty()).then_some(JsonValue::Object(kept))
        }
        JsonValue::Array(items) => {
            let kept: Vec<JsonValue> = items
                .iter()
                .filter_map(|item| filter_value(item, path, options))
                .collect();
            (included || !kept.is_empty()).then_some(JsonValue::Array(kept))
        }
        leaf => included.then(|| leaf.clone()),
    }
}

fn is_included(path: &str, includes: &[String]) -> bool {
    if includes.is_empty() {
        return true;
    }
    if path.is_empty() {
        return false;
    }
    path.match_indices('.')
        .map(|(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
        .any(|candidate| includes.iter().any(|p| simple_match(p, candidate)))
}

fn extract<'v>(scope: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    path.split('.')
        .try_fold(scope, |value, segment| value.as_object()?.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitfetch_proto::NestedLink;
    use serde_json::json;

    fn identity(links: &[(&str, usize)]) -> NestedIdentity {
        NestedIdentity::new(links.iter().map(|(f, o)| NestedLink::new(*f, *o)).collect()).unwrap()
    }

    fn encode(tree: &JsonValue) -> Vec<u8> {
        SourceFormat::Json.encode(tree).unwrap()
    }

    #[test]
    fn test_single_level() {
        let root = json!({"title": "t", "comments": [{"text": "a"}, {"text": "b"}]});
        let nested = reconstruct(&identity(&[("comments", 1)]), &encode(&root), SourceFormat::Json).unwrap();

        assert_eq!(nested.parsed, json!({"text": "b"}));
        assert_eq!(nested.wrapped, json!({"comments": {"text": "b"}}));
        assert_eq!(
            serde_json::from_slice::<JsonValue>(&nested.source).unwrap(),
            json!({"text": "b"})
        );
    }

    #[test]
    fn test_object_instead_of_array_ignores_offset() {
        let root = json!({"comments": {"text": "only"}});
        let nested = reconstruct(&identity(&[("comments", 3)]), &encode(&root), SourceFormat::Json).unwrap();
        assert_eq!(nested.parsed, json!({"text": "only"}));
    }

    #[test]
    fn test_multi_level_dotted_path() {
        let root = json!({
            "comments": [
                {"meta": {"replies": [{"by": "x"}]}},
                {"meta": {"replies": [{"by": "y"}, {"by": "z"}]}}
            ]
        });
        let nested = reconstruct(
            &identity(&[("comments", 1), ("meta.replies", 1)]),
            &encode(&root),
            SourceFormat::Json,
        )
        .unwrap();

        assert_eq!(nested.parsed, json!({"by": "z"}));
        assert_eq!(
            nested.wrapped,
            json!({"comments": {"meta": {"replies": {"by": "z"}}}})
        );
    }

    #[test]
    fn test_scalar_at_nested_path_is_fatal() {
        let root = json!({"comments": "oops"});
        let err = reconstruct(&identity(&[("comments", 0)]), &encode(&root), SourceFormat::Json)
            .unwrap_err();
        assert!(matches!(err, Error::StructuralConsistency(_)));

        let root = json!({"title": "no comments"});
        let err = reconstruct(&identity(&[("comments", 0)]), &encode(&root), SourceFormat::Json)
            .unwrap_err();
        assert!(matches!(err, Error::StructuralConsistency(_)));
    }

    fn options(includes: &[&str], excludes: &[&str]) -> FetchSourceOptions {
        FetchSourceOptions::fetch()
            .with_includes(includes)
            .with_excludes(excludes)
    }

    #[test]
    fn test_filter_includes_keep_ancestors_of_matches() {
        let root = json!({
            "title": "t",
            "comments": [{"text": "a", "meta": {"score": 1}}, {"text": "b"}]
        });
        assert_eq!(
            filter_source(&root, "", &options(&["comments.text"], &[])),
            json!({"comments": [{"text": "a"}, {"text": "b"}]})
        );
        assert_eq!(
            filter_source(&root, "", &options(&["comments"], &[])),
            json!({"comments": [{"text": "a", "meta": {"score": 1}}, {"text": "b"}]})
        );
        assert_eq!(
            filter_source(&root, "", &options(&["tit*"], &[])),
            json!({"title": "t"})
        );
    }

    #[test]
    fn test_filter_excludes_win() {
        let root = json!({"title": "t", "comments": [{"text": "a", "meta": {"score": 1}}]});
        assert_eq!(
            filter_source(&root, "", &options(&[], &["comments.meta"])),
            json!({"title": "t", "comments": [{"text": "a"}]})
        );
        assert_eq!(
            filter_source(&root, "", &options(&["comments"], &["*.text"])),
            json!({"comments": [{"meta": {"score": 1}}]})
        );
        assert_eq!(filter_source(&root, "", &options(&["missing"], &[])), json!({}));
    }

    #[test]
    fn test_filter_uses_full_paths_under_prefix() {
        let reply = json!({"body": "r", "by": "x"});
        assert_eq!(
            filter_source(&reply, "comments.meta.replies", &options(&["comments.meta.replies.body"], &[])),
            json!({"body": "r"})
        );
        assert_eq!(
            filter_source(&reply, "comments.meta.replies", &options(&["comments"], &["*.by"])),
            json!({"body": "r"})
        );
    }

    #[test]
    fn test_keeps_yaml_encoding() {
        let root = json!({"comments": [{"text": "a"}]});
        let bytes = SourceFormat::Yaml.encode(&root).unwrap();
        let nested = reconstruct(&identity(&[("comments", 0)]), &bytes, SourceFormat::Yaml).unwrap();

        assert_eq!(nested.format, SourceFormat::Yaml);
        assert_eq!(SourceFormat::Yaml.decode(&nested.source).unwrap(), json!({"text": "a"}));
    }
}
