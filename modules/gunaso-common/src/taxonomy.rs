//! Fixed complaint taxonomy. Every tag on a complaint comes from this list.

use crate::error::{GunasoError, Result};

pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("Roads & Transport", &["potholes", "illegal parking", "accident"]),
    ("Sanitation", &["garbage", "open drains", "bad smell"]),
    ("Water Supply", &["no water", "contaminated water"]),
    ("Power", &["streetlight out", "power cuts"]),
    ("Health", &["dead animals"]),
    ("Environment", &["pollution", "noise complaints"]),
];

pub fn is_known_tag(tag: &str) -> bool {
    category_of(tag).is_some()
}

/// Category owning `tag`, if the tag is part of the taxonomy.
pub fn category_of(tag: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(_, tags)| tags.contains(&tag))
        .map(|(category, _)| *category)
}

pub fn all_tags() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().flat_map(|(_, tags)| tags.iter().copied())
}

/// Validate a submitted tag set: non-empty, every tag known. Duplicates
/// collapse while first-seen order is kept.
pub fn validate_tags<S: AsRef<str>>(tags: &[S]) -> Result<Vec<String>> {
    if tags.is_empty() {
        return Err(GunasoError::InvalidTags("at least one tag is required".into()));
    }

    let unknown: Vec<&str> = tags
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !is_known_tag(t))
        .collect();
    if !unknown.is_empty() {
        return Err(GunasoError::InvalidTags(format!(
            "unknown tags: {}",
            unknown.join(", ")
        )));
    }

    let mut validated: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref();
        if !validated.iter().any(|t| t == tag) {
            validated.push(tag.to_string());
        }
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_set_is_rejected() {
        let err = validate_tags::<&str>(&[]).unwrap_err();
        assert!(matches!(err, GunasoError::InvalidTags(_)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = validate_tags(&["garbage", "aliens"]).unwrap_err();
        assert!(matches!(err, GunasoError::InvalidTags(msg) if msg.contains("aliens")));
    }

    #[test]
    fn duplicates_collapse_in_order() {
        let tags = validate_tags(&["bad smell", "garbage", "bad smell"]).unwrap();
        assert_eq!(tags, vec!["bad smell".to_string(), "garbage".to_string()]);
    }

    #[test]
    fn tags_map_to_categories() {
        assert_eq!(category_of("potholes"), Some("Roads & Transport"));
        assert_eq!(category_of("dead animals"), Some("Health"));
        assert_eq!(category_of("Garbage"), None);
        assert_eq!(all_tags().count(), 13);
    }
}
