//! Scene host interface
//!
//! The host application's scene graph is an opaque mutable store; the
//! bridge reaches it only through this trait. Every method is a
//! synchronous, possibly-failing call, mirroring the command surface a DCC
//! host exposes to embedded tooling. Implementations are not expected to
//! be thread-safe: all calls happen on the scene-owner execution context
//! (see [`crate::executor`]).
//!
//! Conventions:
//! - Object and shape identifiers are full paths with `|` separators
//!   (`|group1|crate`, `|group1|crate|crateShape`).
//! - Face components are `<shape path>.f[<range>]`.
//! - A "mesh object" is a transform carrying at least one mesh shape.

use bridge_core::{ObjectTag, Result};
use std::path::Path;

/// Short (unqualified) name of a path: the segment after the last `|`
pub fn short_name(path: &str) -> &str {
    path.rsplit('|').next().unwrap_or(path)
}

/// Interface to one host application's scene
pub trait SceneHost: Send {
    /// Saved-file base name of the current scene, or the unsaved sentinel
    fn scene_name(&self) -> String;

    // --- object set ---

    /// Full paths of every object in the scene
    fn list_objects(&self) -> Vec<String>;

    fn object_exists(&self, path: &str) -> bool;

    /// All objects whose short name matches
    fn find_by_short_name(&self, short: &str) -> Vec<String>;

    /// Whether the object is a transform with at least one mesh shape
    fn is_mesh(&self, path: &str) -> bool;

    /// Shape paths under a transform
    fn shapes(&self, path: &str) -> Vec<String>;

    // --- selection ---

    fn selection(&self) -> Vec<String>;

    /// Replace the selection with a single object
    fn select(&mut self, path: &str) -> Result<()>;

    // --- structure ---

    /// Duplicate an object; the copy keeps the source's parent. Returns the
    /// copy's full path.
    fn duplicate(&mut self, path: &str, copy_short_name: &str) -> Result<String>;

    /// Delete an object and everything under it
    fn delete_object(&mut self, path: &str) -> Result<()>;

    /// Rename an object; returns its new full path
    fn rename(&mut self, path: &str, new_short_name: &str) -> Result<String>;

    /// Parent path of an object, if it has one
    fn parent_of(&self, path: &str) -> Option<String>;

    /// Move an object under a new parent (`None` = scene root); returns its
    /// new full path
    fn reparent(&mut self, child: &str, new_parent: Option<&str>) -> Result<String>;

    // --- transform ---

    /// Row-major world-space 4x4 transform
    fn world_matrix(&self, path: &str) -> Result<[f64; 16]>;

    fn set_world_matrix(&mut self, path: &str, matrix: &[f64; 16]) -> Result<()>;

    /// Zero translation/rotation, unit scale
    fn reset_transform(&mut self, path: &str) -> Result<()>;

    // --- shading ---

    /// Shading groups with at least one face of this shape
    fn shading_groups_of(&self, shape: &str) -> Vec<String>;

    /// Face components currently assigned to a group (all shapes)
    fn faces_in_group(&self, group: &str) -> Vec<String>;

    fn shading_group_exists(&self, group: &str) -> bool;

    /// Force face components onto a group, removing them from any other
    fn assign_faces(&mut self, group: &str, faces: &[String]) -> Result<()>;

    /// Remove every face of a shape from a group
    fn remove_shape_from_group(&mut self, group: &str, shape: &str) -> Result<()>;

    /// The scene's default (empty-shader) group
    fn default_shading_group(&self) -> String;

    /// Force a whole shape onto a group
    fn assign_whole_shape(&mut self, group: &str, shape: &str) -> Result<()>;

    // --- lights ---

    /// Full paths of every light in the scene
    fn lights(&self) -> Vec<String>;

    /// Lights currently linked to an object
    fn linked_lights(&self, object: &str) -> Result<Vec<String>>;

    /// Make or break one light/object link
    fn set_light_link(&mut self, light: &str, object: &str, linked: bool) -> Result<()>;

    // --- custom attributes ---

    fn get_attr(&self, path: &str, key: &str) -> Option<String>;

    fn set_attr(&mut self, path: &str, key: &str, value: &str) -> Result<()>;

    // --- interchange codec (black box) ---

    /// Export one object (and its shapes) to an interchange file
    fn export_object(&mut self, path: &str, file: &Path) -> Result<()>;

    /// Import an interchange file. Returns the importer-reported selection,
    /// which may be empty; callers compute the created set from a
    /// before/after object-list delta.
    fn import_file(&mut self, file: &Path) -> Result<Vec<String>>;

    // --- provided ---

    /// Origin tag of an object, if it was imported through the bridge
    fn read_tag(&self, path: &str) -> Option<ObjectTag> {
        ObjectTag::from_lookup(|key| self.get_attr(path, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_handles_flat_and_nested_paths() {
        assert_eq!(short_name("|group1|crate"), "crate");
        assert_eq!(short_name("crate"), "crate");
        assert_eq!(short_name("|crate"), "crate");
    }
}
