// Pure document mutations shared by every store backend. Backends provide
// atomicity (lock or row lock) around these; the functions themselves only
// touch the document they are given.

use serde_json::{Map, Value};

use super::store::{ArrayOp, Collection, Document, Filter, Patch, StoreError};

pub fn document_id(doc: &Document) -> Result<&str, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidDocument("missing string 'id' field".to_string()))
}

/// Apply every assignment of the patch in order. Dotted paths create missing
/// intermediate objects and leave sibling keys untouched.
pub fn apply_patch(doc: &mut Document, patch: &Patch) -> Result<(), StoreError> {
    for (path, value) in patch.assignments() {
        set_path(doc, path, value.clone())?;
    }
    Ok(())
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    let mut segments = path.split('.').peekable();
    let mut current = doc;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return Ok(());
        }

        let child = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if child.is_null() {
            *child = Value::Object(Map::new());
        }
        current = child.as_object_mut().ok_or_else(|| {
            StoreError::InvalidDocument(format!("'{}' in path '{}' is not an object", segment, path))
        })?;
    }

    Err(StoreError::InvalidDocument("empty update path".to_string()))
}

/// Document created by an upsert that matched nothing: seed, then the filter
/// terms, then the patch
pub fn upsert_document(filter: &Filter, patch: &Patch) -> Result<Document, StoreError> {
    let mut doc = patch.seed().clone();
    for (field, value) in filter.terms() {
        doc.insert(field.clone(), value.clone());
    }
    apply_patch(&mut doc, patch)?;
    document_id(&doc)?;
    Ok(doc)
}

pub fn apply_array_op(doc: &mut Document, op: &ArrayOp) -> Result<(), StoreError> {
    match op {
        ArrayOp::PushFront { field, entry, unique_on } => {
            let list = array_field(doc, field)?;
            if let Some(key) = unique_on {
                let candidate = entry.get(key);
                if candidate.is_some() && list.iter().any(|existing| existing.get(key) == candidate) {
                    return Err(StoreError::DuplicateEntry {
                        field: field.clone(),
                        key: key.clone(),
                    });
                }
            }
            list.insert(0, entry.clone());
            Ok(())
        }
        ArrayOp::Pull { field, key, value } => {
            let list = array_field(doc, field)?;
            let position = list
                .iter()
                .position(|existing| existing.get(key) == Some(value))
                .ok_or_else(|| StoreError::EntryNotFound {
                    field: field.clone(),
                    key: key.clone(),
                })?;
            list.remove(position);
            Ok(())
        }
    }
}

fn array_field<'a>(doc: &'a mut Document, field: &str) -> Result<&'a mut Vec<Value>, StoreError> {
    let slot = doc
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| StoreError::InvalidDocument(format!("'{}' is not an array", field)))
}

/// First unique key of `collection` that `candidate` would duplicate among
/// `others` (documents with the candidate's own id are skipped)
pub fn unique_violation<'a>(
    collection: Collection,
    candidate: &Document,
    others: impl Iterator<Item = &'a Document> + Clone,
) -> Option<String> {
    let candidate_id = candidate.get("id");
    collection
        .unique_keys()
        .iter()
        .find(|key| {
            let Some(value) = candidate.get(**key) else {
                return false;
            };
            others
                .clone()
                .filter(|other| other.get("id") != candidate_id)
                .any(|other| other.get(**key) == Some(value))
        })
        .map(|key| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn patch_sets_nested_paths_without_clobbering_siblings() {
        let mut profile = doc(json!({
            "id": "p1",
            "company": "Acme",
            "social": { "twitter": "@old" }
        }));
        let patch = Patch::new()
            .set("status", "Developer")
            .set("social.youtube", "yt");

        apply_patch(&mut profile, &patch).unwrap();

        assert_eq!(profile["company"], "Acme");
        assert_eq!(profile["status"], "Developer");
        assert_eq!(profile["social"], json!({ "twitter": "@old", "youtube": "yt" }));
    }

    #[test]
    fn patch_creates_missing_parent_objects() {
        let mut profile = doc(json!({ "id": "p1", "social": null }));
        apply_patch(&mut profile, &Patch::new().set("social.linkedin", "in")).unwrap();
        assert_eq!(profile["social"], json!({ "linkedin": "in" }));
    }

    #[test]
    fn patch_rejects_path_through_scalar() {
        let mut profile = doc(json!({ "id": "p1", "social": "flat" }));
        let err = apply_patch(&mut profile, &Patch::new().set("social.x", "y")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[test]
    fn upsert_document_layers_seed_filter_and_patch() {
        let seed = doc(json!({ "id": "new", "skills": [], "status": "seed" }));
        let patch = Patch::new().set("status", "Developer").on_insert(seed);
        let created = upsert_document(&Filter::eq("user_id", "u1"), &patch).unwrap();

        assert_eq!(created["id"], "new");
        assert_eq!(created["user_id"], "u1");
        assert_eq!(created["status"], "Developer");
        assert_eq!(created["skills"], json!([]));
    }

    #[test]
    fn push_front_prepends_and_enforces_unique_key() {
        let mut post = doc(json!({ "id": "p1", "likes": [{ "user_id": "a" }] }));
        let like_b = ArrayOp::PushFront {
            field: "likes".into(),
            entry: json!({ "user_id": "b" }),
            unique_on: Some("user_id".into()),
        };
        apply_array_op(&mut post, &like_b).unwrap();
        assert_eq!(post["likes"], json!([{ "user_id": "b" }, { "user_id": "a" }]));

        let err = apply_array_op(&mut post, &like_b).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntry { .. }));
        assert_eq!(post["likes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn push_front_creates_missing_array() {
        let mut profile = doc(json!({ "id": "p1" }));
        let op = ArrayOp::PushFront {
            field: "experience".into(),
            entry: json!({ "id": "e1" }),
            unique_on: None,
        };
        apply_array_op(&mut profile, &op).unwrap();
        assert_eq!(profile["experience"], json!([{ "id": "e1" }]));
    }

    #[test]
    fn pull_removes_only_the_entry_with_matching_key() {
        let mut post = doc(json!({
            "id": "p1",
            "comments": [
                { "id": "c3", "user_id": "a" },
                { "id": "c2", "user_id": "b" },
                { "id": "c1", "user_id": "a" }
            ]
        }));
        let op = ArrayOp::Pull {
            field: "comments".into(),
            key: "id".into(),
            value: json!("c1"),
        };
        apply_array_op(&mut post, &op).unwrap();
        assert_eq!(
            post["comments"],
            json!([{ "id": "c3", "user_id": "a" }, { "id": "c2", "user_id": "b" }])
        );

        let err = apply_array_op(&mut post, &op).unwrap_err();
        assert!(matches!(err, StoreError::EntryNotFound { .. }));
    }

    #[test]
    fn unique_violation_ignores_same_document() {
        let existing = vec![doc(json!({ "id": "u1", "email": "a@x.io" }))];
        let same = doc(json!({ "id": "u1", "email": "a@x.io" }));
        let other = doc(json!({ "id": "u2", "email": "a@x.io" }));

        assert_eq!(unique_violation(Collection::Users, &same, existing.iter()), None);
        assert_eq!(
            unique_violation(Collection::Users, &other, existing.iter()),
            Some("email".to_string())
        );
    }
}
