//! Origin tags: return-address metadata on imported objects
//!
//! After an import, the resulting object carries the session key as custom
//! attributes. Any object bearing the tag is round-trip-eligible: a later
//! send/replace derives its artifact paths from the tag plus a direction,
//! with no other state.

use crate::session::SessionKey;

/// Attribute key for the origin scene name
pub const ATTR_ORIGIN_SCENE: &str = "origin_scene";
/// Attribute key for the origin object short name
pub const ATTR_ORIGIN_OBJECT: &str = "origin_object";
/// Attribute key for the origin full path
pub const ATTR_ORIGIN_FULL_PATH: &str = "origin_full_path";

/// Tag attached to an object after a bridge import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTag {
    /// Scene name of the originating peer
    pub origin_scene: String,
    /// Short name the object had on the originating peer
    pub origin_object: String,
    /// Full path the object had on the originating peer
    pub origin_full_path: Option<String>,
}

impl ObjectTag {
    /// Attribute pairs to write onto the tagged object
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (ATTR_ORIGIN_SCENE, self.origin_scene.clone()),
            (ATTR_ORIGIN_OBJECT, self.origin_object.clone()),
        ];
        if let Some(full) = &self.origin_full_path {
            pairs.push((ATTR_ORIGIN_FULL_PATH, full.clone()));
        }
        pairs
    }

    /// Rebuild a tag from an attribute lookup; `None` if either required
    /// attribute is missing.
    pub fn from_lookup(mut get: impl FnMut(&str) -> Option<String>) -> Option<Self> {
        let origin_scene = get(ATTR_ORIGIN_SCENE)?;
        let origin_object = get(ATTR_ORIGIN_OBJECT)?;
        Some(Self {
            origin_scene,
            origin_object,
            origin_full_path: get(ATTR_ORIGIN_FULL_PATH),
        })
    }

    /// Session key for the leg that produced the tagged object
    pub fn session_key(&self, direction: crate::session::Direction) -> SessionKey {
        SessionKey::new(self.origin_scene.clone(), self.origin_object.clone(), direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Direction;
    use std::collections::HashMap;

    #[test]
    fn pairs_and_lookup_round_trip() {
        let tag = ObjectTag {
            origin_scene: "shot010".into(),
            origin_object: "crate".into(),
            origin_full_path: Some("|group1|crate".into()),
        };
        let map: HashMap<&str, String> = tag.pairs().into_iter().collect();
        let rebuilt = ObjectTag::from_lookup(|k| map.get(k).cloned()).unwrap();
        assert_eq!(rebuilt, tag);
    }

    #[test]
    fn lookup_requires_scene_and_object() {
        let rebuilt = ObjectTag::from_lookup(|k| {
            (k == ATTR_ORIGIN_SCENE).then(|| "shot010".to_string())
        });
        assert!(rebuilt.is_none());
    }

    #[test]
    fn tag_derives_session_key() {
        let tag = ObjectTag {
            origin_scene: "shot010".into(),
            origin_object: "crate".into(),
            origin_full_path: None,
        };
        let key = tag.session_key(Direction::ToPeerB);
        assert_eq!(key.file_stem(), "shot010_crate_toPeerB");
    }
}
