//! Transfer envelope: side-channel metadata for one transfer
//!
//! The interchange format moves geometry; everything it does not preserve
//! travels here. Written once by the sender immediately before the socket
//! command goes out, read once by the receiver during import, never mutated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{BridgeError, Result};

/// Per-face assignment of one shading group on one shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialAssignment {
    /// Full path of the shape the faces belong to
    pub shape: String,
    /// Name of the pre-existing shading group in the receiving scene
    pub shading_group: String,
    /// Face component identifiers scoped to `shape`, e.g. `|a|aShape.f[0:11]`
    pub faces: Vec<String>,
}

/// Light-link table recorded at export time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightLinks {
    /// Lights that illuminate the object
    #[serde(default)]
    pub linked: Vec<String>,
    /// Lights explicitly excluded (recorded for completeness)
    #[serde(default)]
    pub unlinked: Vec<String>,
}

/// Persisted metadata accompanying one interchange file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEnvelope {
    /// Fully qualified path of the original object
    pub object: String,
    /// Fully qualified parent path, if the object was parented
    pub parent: Option<String>,
    /// Row-major 4x4 world transform
    pub world_matrix: [f64; 16],
    /// Ordered per-face material assignments
    #[serde(default)]
    pub materials: Vec<MaterialAssignment>,
    /// Light-link table
    #[serde(default)]
    pub light_links: LightLinks,
}

/// Identity matrix for envelopes of untransformed objects
pub const IDENTITY_MATRIX: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

impl TransferEnvelope {
    /// Short (unqualified) name of the recorded object
    pub fn object_short_name(&self) -> &str {
        self.object.rsplit('|').next().unwrap_or(&self.object)
    }

    /// Write the envelope next to its interchange file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|e| {
            BridgeError::Artifact(format!("Could not write envelope {}: {}", path.display(), e))
        })
    }

    /// Read and validate an envelope
    ///
    /// An envelope whose `object` field is absent or empty is unusable: the
    /// receiver cannot name, tag, or replace anything without it.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            BridgeError::Artifact(format!(
                "Could not read envelope {}: {}",
                path.display(),
                e
            ))
        })?;
        let envelope: TransferEnvelope = serde_json::from_str(&json)?;
        if envelope.object.is_empty() {
            return Err(BridgeError::Artifact(
                "No object name in envelope".to_string(),
            ));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferEnvelope {
        TransferEnvelope {
            object: "|group1|crate".into(),
            parent: Some("|group1".into()),
            world_matrix: IDENTITY_MATRIX,
            materials: vec![MaterialAssignment {
                shape: "|group1|crate|crateShape".into(),
                shading_group: "woodSG".into(),
                faces: vec!["|group1|crate|crateShape.f[0:5]".into()],
            }],
            light_links: LightLinks {
                linked: vec!["|keyLight".into()],
                unlinked: vec![],
            },
        }
    }

    #[test]
    fn short_name_is_last_path_segment() {
        assert_eq!(sample().object_short_name(), "crate");
        let flat = TransferEnvelope {
            object: "crate".into(),
            ..sample()
        };
        assert_eq!(flat.object_short_name(), "crate");
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot_crate_toPeerB_meta.json");
        let envelope = sample();
        envelope.save(&path).unwrap();
        let loaded = TransferEnvelope::load(&path).unwrap();
        assert_eq!(loaded, envelope);
    }

    #[test]
    fn load_rejects_missing_object_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_meta.json");
        std::fs::write(
            &path,
            r#"{"object":"","parent":null,"world_matrix":[1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1]}"#,
        )
        .unwrap();
        assert!(TransferEnvelope::load(&path).is_err());
    }

    #[test]
    fn optional_sections_default_empty() {
        // Envelopes from peers that recorded no materials or links still parse.
        let json = r#"{
            "object": "|crate",
            "parent": null,
            "world_matrix": [1,0,0,0,0,1,0,0,0,0,1,0,4,5,6,1]
        }"#;
        let envelope: TransferEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.materials.is_empty());
        assert!(envelope.light_links.linked.is_empty());
        assert_eq!(envelope.world_matrix[12], 4.0);
    }
}
