//! Session identity and deterministic artifact paths
//!
//! A transfer is identified by `(scene, object, direction)`. Both peer
//! processes derive the same interchange/envelope paths from that key with
//! no shared in-memory state; the file names *are* the handoff protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Scene name used when the host scene has never been saved
pub const UNSAVED_SCENE: &str = "unsaved";

/// File extension of the interchange artifact
pub const INTERCHANGE_EXT: &str = "fbx";

/// Suffix of the envelope artifact
pub const ENVELOPE_SUFFIX: &str = "_meta.json";

/// Which peer an artifact is travelling toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward peer A
    ToPeerA,
    /// Toward peer B
    ToPeerB,
}

impl Direction {
    /// Wire/file-name form of the direction tag
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ToPeerA => "toPeerA",
            Direction::ToPeerB => "toPeerB",
        }
    }

    /// The reverse leg of a round trip
    pub fn opposite(self) -> Self {
        match self {
            Direction::ToPeerA => Direction::ToPeerB,
            Direction::ToPeerB => Direction::ToPeerA,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "toPeerA" => Ok(Direction::ToPeerA),
            "toPeerB" => Ok(Direction::ToPeerB),
            other => Err(BridgeError::Protocol(format!(
                "Unknown direction tag: {}",
                other
            ))),
        }
    }
}

/// Identity of one peer process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    A,
    B,
}

impl PeerRole {
    /// Direction of artifacts arriving at this peer
    pub fn inbound(self) -> Direction {
        match self {
            PeerRole::A => Direction::ToPeerA,
            PeerRole::B => Direction::ToPeerB,
        }
    }

    /// Direction of artifacts this peer produces
    pub fn outbound(self) -> Direction {
        self.inbound().opposite()
    }

    /// The other peer
    pub fn peer(self) -> Self {
        match self {
            PeerRole::A => PeerRole::B,
            PeerRole::B => PeerRole::A,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRole::A => f.write_str("A"),
            PeerRole::B => f.write_str("B"),
        }
    }
}

/// The `(scene, object, direction)` triple identifying one transfer
///
/// Scene and object names are expected to be already sanitized by the host
/// layer; the key does no escaping. Two objects sharing a short name in the
/// same scene collide on the same paths (known, accepted limitation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    /// Host scene saved-file base name, or [`UNSAVED_SCENE`]
    pub scene: String,
    /// Short (unqualified) name of the transferred object
    pub object: String,
    /// Which peer the artifacts travel toward
    pub direction: Direction,
}

impl SessionKey {
    pub fn new(
        scene: impl Into<String>,
        object: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            scene: scene.into(),
            object: object.into(),
            direction,
        }
    }

    /// Base name shared by both artifacts: `{scene}_{object}_{direction}`
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.scene, self.object, self.direction)
    }

    /// Path of the interchange file under `temp_dir`
    pub fn interchange_path(&self, temp_dir: &Path) -> PathBuf {
        temp_dir.join(format!("{}.{}", self.file_stem(), INTERCHANGE_EXT))
    }

    /// Path of the envelope file under `temp_dir`
    pub fn envelope_path(&self, temp_dir: &Path) -> PathBuf {
        temp_dir.join(format!("{}{}", self.file_stem(), ENVELOPE_SUFFIX))
    }

    /// Same key pointed at the opposite leg of the round trip
    pub fn reversed(&self) -> Self {
        Self {
            scene: self.scene.clone(),
            object: self.object.clone(),
            direction: self.direction.opposite(),
        }
    }

    /// Recover the scene name from an interchange file stem.
    ///
    /// The stem is `{scene}_{object}_{direction}`; given the exact object
    /// short name (from the envelope) and the direction, stripping the
    /// `_{object}_{direction}` suffix is unambiguous even when scene or
    /// object names contain underscores.
    pub fn scene_from_stem(stem: &str, object: &str, direction: Direction) -> Option<String> {
        let suffix = format!("_{}_{}", object, direction);
        stem.strip_suffix(suffix.as_str()).map(str::to_string)
    }

    /// Rebuild a full key from an interchange path plus the object short
    /// name recorded in its envelope.
    pub fn from_interchange_path(path: &Path, object: &str) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                BridgeError::Artifact(format!("Unreadable file name: {}", path.display()))
            })?;
        for direction in [Direction::ToPeerA, Direction::ToPeerB] {
            if let Some(scene) = Self::scene_from_stem(stem, object, direction) {
                return Ok(Self::new(scene, object, direction));
            }
        }
        Err(BridgeError::Artifact(format!(
            "File name {} does not match session naming for object '{}'",
            path.display(),
            object
        )))
    }
}

/// Sibling envelope path for an interchange file
///
/// `scene_obj_toPeerB.fbx` -> `scene_obj_toPeerB_meta.json`, in the same
/// directory.
pub fn envelope_path_for(interchange: &Path) -> PathBuf {
    let stem = interchange
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    interchange.with_file_name(format!("{}{}", stem, ENVELOPE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_deterministic() {
        let dir = Path::new("/tmp/bridge");
        let a = SessionKey::new("shot010", "crate", Direction::ToPeerB);
        let b = SessionKey::new("shot010", "crate", Direction::ToPeerB);
        assert_eq!(a.interchange_path(dir), b.interchange_path(dir));
        assert_eq!(a.envelope_path(dir), b.envelope_path(dir));
        assert_eq!(
            a.interchange_path(dir),
            PathBuf::from("/tmp/bridge/shot010_crate_toPeerB.fbx")
        );
        assert_eq!(
            a.envelope_path(dir),
            PathBuf::from("/tmp/bridge/shot010_crate_toPeerB_meta.json")
        );
    }

    #[test]
    fn scene_recovery_tolerates_underscores() {
        // Scene and object both contain underscores; exact-suffix stripping
        // still recovers the scene.
        let key = SessionKey::new("env_kitchen_v2", "prop_table", Direction::ToPeerB);
        let stem = key.file_stem();
        assert_eq!(
            SessionKey::scene_from_stem(&stem, "prop_table", Direction::ToPeerB).as_deref(),
            Some("env_kitchen_v2")
        );
        // Wrong direction does not match
        assert_eq!(
            SessionKey::scene_from_stem(&stem, "prop_table", Direction::ToPeerA),
            None
        );
    }

    #[test]
    fn key_from_interchange_path() {
        let dir = Path::new("/tmp/bridge");
        let key = SessionKey::new("shot010", "crate_low", Direction::ToPeerA);
        let path = key.interchange_path(dir);
        let parsed = SessionKey::from_interchange_path(&path, "crate_low").unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn envelope_sibling_path() {
        let p = Path::new("/tmp/bridge/shot010_crate_toPeerB.fbx");
        assert_eq!(
            envelope_path_for(p),
            PathBuf::from("/tmp/bridge/shot010_crate_toPeerB_meta.json")
        );
    }

    #[test]
    fn roles_and_directions() {
        assert_eq!(PeerRole::A.inbound(), Direction::ToPeerA);
        assert_eq!(PeerRole::A.outbound(), Direction::ToPeerB);
        assert_eq!(Direction::ToPeerB.opposite(), Direction::ToPeerA);
        assert_eq!("toPeerA".parse::<Direction>().unwrap(), Direction::ToPeerA);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
