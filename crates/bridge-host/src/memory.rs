//! In-memory scene host
//!
//! A self-contained [`SceneHost`] used by the demo binary and the test
//! suite. It models the parts of a DCC scene the bridge touches: transform
//! nodes with mesh shapes, scene-level shading groups with face-set
//! membership, lights, a light-link table, and custom attributes.
//!
//! Its interchange codec is a private JSON payload, and its importer
//! reproduces the awkward realities the replace machinery has to tolerate:
//! it renames on name collision, reports no selection, and speculatively
//! assigns an auto-generated `*_fbx_SG` group to imported shapes.

use bridge_core::envelope::IDENTITY_MATRIX;
use bridge_core::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::scene::{SceneHost, short_name};

/// The scene's default (empty-shader) group
pub const DEFAULT_GROUP: &str = "defaultShadingGroup";

const DEFAULT_FACE_COUNT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShapeData {
    name: String,
    is_mesh: bool,
    face_count: u32,
}

#[derive(Debug, Clone)]
struct ObjectData {
    parent: Option<String>,
    world_matrix: [f64; 16],
    shapes: Vec<ShapeData>,
    attrs: BTreeMap<String, String>,
    is_light: bool,
}

/// What the in-memory "interchange format" actually persists
#[derive(Debug, Serialize, Deserialize)]
struct InterchangePayload {
    object: String,
    shapes: Vec<ShapeData>,
}

fn child_path(parent: Option<&str>, short: &str) -> String {
    match parent {
        Some(p) => format!("{}|{}", p, short),
        None => format!("|{}", short),
    }
}

/// Whether `s` is `root` itself or a path/component under it
fn is_under(s: &str, root: &str) -> bool {
    s == root
        || s.strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('|') || rest.starts_with('.'))
}

fn replace_path_prefix(s: &str, old: &str, new: &str) -> String {
    if is_under(s, old) {
        format!("{}{}", new, &s[old.len()..])
    } else {
        s.to_string()
    }
}

/// In-memory implementation of [`SceneHost`]
pub struct MemoryScene {
    name: String,
    objects: BTreeMap<String, ObjectData>,
    groups: BTreeMap<String, BTreeSet<String>>,
    light_links: BTreeSet<(String, String)>,
    selection: Vec<String>,
}

impl MemoryScene {
    pub fn new(name: impl Into<String>) -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), BTreeSet::new());
        Self {
            name: name.into(),
            objects: BTreeMap::new(),
            groups,
            light_links: BTreeSet::new(),
            selection: Vec::new(),
        }
    }

    /// Add an empty transform node; returns its full path
    pub fn create_transform(&mut self, short: &str, parent: Option<&str>) -> String {
        let path = child_path(parent, short);
        self.objects.insert(
            path.clone(),
            ObjectData {
                parent: parent.map(String::from),
                world_matrix: IDENTITY_MATRIX,
                shapes: Vec::new(),
                attrs: BTreeMap::new(),
                is_light: false,
            },
        );
        path
    }

    /// Add a mesh (one `<short>Shape` shape); returns its full path
    pub fn create_mesh(&mut self, short: &str, parent: Option<&str>) -> String {
        let path = child_path(parent, short);
        self.objects.insert(
            path.clone(),
            ObjectData {
                parent: parent.map(String::from),
                world_matrix: IDENTITY_MATRIX,
                shapes: vec![ShapeData {
                    name: format!("{}Shape", short),
                    is_mesh: true,
                    face_count: DEFAULT_FACE_COUNT,
                }],
                attrs: BTreeMap::new(),
                is_light: false,
            },
        );
        path
    }

    /// Add a light at the scene root; returns its full path
    pub fn create_light(&mut self, short: &str) -> String {
        let path = child_path(None, short);
        self.objects.insert(
            path.clone(),
            ObjectData {
                parent: None,
                world_matrix: IDENTITY_MATRIX,
                shapes: Vec::new(),
                attrs: BTreeMap::new(),
                is_light: true,
            },
        );
        path
    }

    /// Declare a shading group
    pub fn create_group(&mut self, name: &str) {
        self.groups.entry(name.to_string()).or_default();
    }

    fn object(&self, path: &str) -> Result<&ObjectData> {
        self.objects
            .get(path)
            .ok_or_else(|| BridgeError::Scene(format!("Object not found: {}", path)))
    }

    fn object_mut(&mut self, path: &str) -> Result<&mut ObjectData> {
        self.objects
            .get_mut(path)
            .ok_or_else(|| BridgeError::Scene(format!("Object not found: {}", path)))
    }

    fn shape_paths(&self, path: &str, data: &ObjectData) -> Vec<String> {
        data.shapes
            .iter()
            .map(|s| format!("{}|{}", path, s.name))
            .collect()
    }

    /// Rewrite every stored path under `old` to live under `new`; set
    /// membership follows the node the way it does in a real host.
    fn repath(&mut self, old: &str, new: &str) {
        let keys: Vec<String> = self
            .objects
            .keys()
            .filter(|k| is_under(k, old))
            .cloned()
            .collect();
        for key in keys {
            let mut data = self.objects.remove(&key).expect("key listed above");
            if let Some(parent) = &data.parent {
                data.parent = Some(replace_path_prefix(parent, old, new));
            }
            let new_key = format!("{}{}", new, &key[old.len()..]);
            self.objects.insert(new_key, data);
        }
        for faces in self.groups.values_mut() {
            *faces = faces
                .iter()
                .map(|f| replace_path_prefix(f, old, new))
                .collect();
        }
        self.light_links = self
            .light_links
            .iter()
            .map(|(l, o)| {
                (
                    replace_path_prefix(l, old, new),
                    replace_path_prefix(o, old, new),
                )
            })
            .collect();
        for sel in &mut self.selection {
            *sel = replace_path_prefix(sel, old, new);
        }
    }

    fn remove_faces_everywhere(&mut self, predicate: impl Fn(&str) -> bool) {
        for faces in self.groups.values_mut() {
            faces.retain(|f| !predicate(f));
        }
    }

    fn shape_face_count(&self, shape: &str) -> Result<u32> {
        let (owner, shape_short) = shape
            .rsplit_once('|')
            .ok_or_else(|| BridgeError::Scene(format!("Not a shape path: {}", shape)))?;
        let data = self.object(owner)?;
        data.shapes
            .iter()
            .find(|s| s.name == shape_short)
            .map(|s| s.face_count)
            .ok_or_else(|| BridgeError::Scene(format!("Shape not found: {}", shape)))
    }
}

impl SceneHost for MemoryScene {
    fn scene_name(&self) -> String {
        self.name.clone()
    }

    fn list_objects(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    fn object_exists(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    fn find_by_short_name(&self, short: &str) -> Vec<String> {
        self.objects
            .keys()
            .filter(|k| short_name(k) == short)
            .cloned()
            .collect()
    }

    fn is_mesh(&self, path: &str) -> bool {
        self.objects
            .get(path)
            .is_some_and(|o| o.shapes.iter().any(|s| s.is_mesh))
    }

    fn shapes(&self, path: &str) -> Vec<String> {
        match self.objects.get(path) {
            Some(data) => self.shape_paths(path, data),
            None => Vec::new(),
        }
    }

    fn selection(&self) -> Vec<String> {
        self.selection.clone()
    }

    fn select(&mut self, path: &str) -> Result<()> {
        self.object(path)?;
        self.selection = vec![path.to_string()];
        Ok(())
    }

    fn duplicate(&mut self, path: &str, copy_short_name: &str) -> Result<String> {
        let source = self.object(path)?.clone();
        let copy_path = child_path(source.parent.as_deref(), copy_short_name);
        if self.objects.contains_key(&copy_path) {
            return Err(BridgeError::Scene(format!(
                "Name collision duplicating to {}",
                copy_path
            )));
        }
        self.objects.insert(
            copy_path.clone(),
            ObjectData {
                // The copy carries no origin attributes of its own
                attrs: BTreeMap::new(),
                ..source
            },
        );
        Ok(copy_path)
    }

    fn delete_object(&mut self, path: &str) -> Result<()> {
        self.object(path)?;
        let doomed: Vec<String> = self
            .objects
            .keys()
            .filter(|k| is_under(k, path))
            .cloned()
            .collect();
        for key in &doomed {
            self.objects.remove(key);
        }
        self.remove_faces_everywhere(|f| is_under(f, path));
        self.light_links
            .retain(|(l, o)| !is_under(l, path) && !is_under(o, path));
        self.selection.retain(|s| !is_under(s, path));
        debug!("Deleted {} ({} nodes)", path, doomed.len());
        Ok(())
    }

    fn rename(&mut self, path: &str, new_short_name: &str) -> Result<String> {
        let parent = self.object(path)?.parent.clone();
        let new_path = child_path(parent.as_deref(), new_short_name);
        if new_path == path {
            return Ok(new_path);
        }
        if self.objects.contains_key(&new_path) {
            return Err(BridgeError::Scene(format!(
                "Name collision renaming to {}",
                new_path
            )));
        }
        self.repath(path, &new_path);
        Ok(new_path)
    }

    fn parent_of(&self, path: &str) -> Option<String> {
        self.objects.get(path).and_then(|o| o.parent.clone())
    }

    fn reparent(&mut self, child: &str, new_parent: Option<&str>) -> Result<String> {
        self.object(child)?;
        if let Some(parent) = new_parent {
            self.object(parent)?;
        }
        let new_path = child_path(new_parent, short_name(child));
        if new_path == child {
            return Ok(new_path);
        }
        if self.objects.contains_key(&new_path) {
            return Err(BridgeError::Scene(format!(
                "Name collision reparenting to {}",
                new_path
            )));
        }
        self.repath(child, &new_path);
        self.object_mut(&new_path)?.parent = new_parent.map(String::from);
        Ok(new_path)
    }

    fn world_matrix(&self, path: &str) -> Result<[f64; 16]> {
        Ok(self.object(path)?.world_matrix)
    }

    fn set_world_matrix(&mut self, path: &str, matrix: &[f64; 16]) -> Result<()> {
        self.object_mut(path)?.world_matrix = *matrix;
        Ok(())
    }

    fn reset_transform(&mut self, path: &str) -> Result<()> {
        self.object_mut(path)?.world_matrix = IDENTITY_MATRIX;
        Ok(())
    }

    fn shading_groups_of(&self, shape: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, faces)| faces.iter().any(|f| is_under(f, shape)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn faces_in_group(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|faces| faces.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn shading_group_exists(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    fn assign_faces(&mut self, group: &str, faces: &[String]) -> Result<()> {
        if !self.groups.contains_key(group) {
            return Err(BridgeError::Scene(format!(
                "Shading group {} does not exist",
                group
            )));
        }
        // Force-element semantics: a face lives in exactly one group
        for face in faces {
            for members in self.groups.values_mut() {
                members.remove(face);
            }
        }
        let members = self.groups.get_mut(group).expect("checked above");
        members.extend(faces.iter().cloned());
        Ok(())
    }

    fn remove_shape_from_group(&mut self, group: &str, shape: &str) -> Result<()> {
        if let Some(members) = self.groups.get_mut(group) {
            members.retain(|f| !is_under(f, shape));
        }
        Ok(())
    }

    fn default_shading_group(&self) -> String {
        DEFAULT_GROUP.to_string()
    }

    fn assign_whole_shape(&mut self, group: &str, shape: &str) -> Result<()> {
        let face_count = self.shape_face_count(shape)?;
        let all_faces = format!("{}.f[0:{}]", shape, face_count.saturating_sub(1));
        self.remove_faces_everywhere(|f| is_under(f, shape));
        self.assign_faces(group, &[all_faces])
    }

    fn lights(&self) -> Vec<String> {
        self.objects
            .iter()
            .filter(|(_, o)| o.is_light)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn linked_lights(&self, object: &str) -> Result<Vec<String>> {
        self.object(object)?;
        Ok(self
            .light_links
            .iter()
            .filter(|(_, o)| o == object)
            .map(|(l, _)| l.clone())
            .collect())
    }

    fn set_light_link(&mut self, light: &str, object: &str, linked: bool) -> Result<()> {
        if !self.object(light)?.is_light {
            return Err(BridgeError::Scene(format!("Not a light: {}", light)));
        }
        self.object(object)?;
        let pair = (light.to_string(), object.to_string());
        if linked {
            self.light_links.insert(pair);
        } else {
            self.light_links.remove(&pair);
        }
        Ok(())
    }

    fn get_attr(&self, path: &str, key: &str) -> Option<String> {
        self.objects.get(path)?.attrs.get(key).cloned()
    }

    fn set_attr(&mut self, path: &str, key: &str, value: &str) -> Result<()> {
        self.object_mut(path)?
            .attrs
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn export_object(&mut self, path: &str, file: &Path) -> Result<()> {
        let data = self.object(path)?;
        let payload = InterchangePayload {
            object: short_name(path).to_string(),
            shapes: data.shapes.clone(),
        };
        let json = serde_json::to_string(&payload)?;
        fs::write(file, json).map_err(|e| {
            BridgeError::HostApi(format!("Export to {} failed: {}", file.display(), e))
        })
    }

    fn import_file(&mut self, file: &Path) -> Result<Vec<String>> {
        let json = fs::read_to_string(file).map_err(|e| {
            BridgeError::HostApi(format!("Import of {} failed: {}", file.display(), e))
        })?;
        let payload: InterchangePayload = serde_json::from_str(&json)?;

        // Rename on collision, the way interchange importers do
        let mut short = payload.object.clone();
        let mut counter = 1;
        while self.objects.contains_key(&child_path(None, &short)) {
            short = format!("{}_{}", payload.object, counter);
            counter += 1;
        }
        let path = self.create_transform(&short, None);
        self.object_mut(&path)?.shapes = payload.shapes;

        // Speculative importer material on every imported mesh shape
        let group = format!("{}_fbx_SG", short);
        self.create_group(&group);
        let data = self.object(&path)?.clone();
        for shape in self.shape_paths(&path, &data) {
            if data
                .shapes
                .iter()
                .any(|s| s.is_mesh && shape.ends_with(&s.name))
            {
                self.assign_whole_shape(&group, &shape)?;
            }
        }

        debug!("Imported {} as {}", file.display(), path);
        // This importer does not report a selection
        Ok(Vec::new())
    }
}
