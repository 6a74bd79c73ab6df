//! Outbound transfer flow
//!
//! The sending half of a round trip: capture the envelope, export a
//! neutralized copy of the selection, then tell the peer to pick it up.
//! Scene work runs through the executor; only the socket exchange happens
//! outside it.

use bridge_core::envelope::{LightLinks, MaterialAssignment, TransferEnvelope};
use bridge_core::{BridgeError, Command, Direction, PeerRole, Reply, Result, SessionKey};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::executor::SceneHandle;
use crate::scene::{SceneHost, short_name};

/// Artifacts written for one outbound transfer
#[derive(Debug)]
pub struct PreparedTransfer {
    pub key: SessionKey,
    pub interchange: PathBuf,
    pub envelope: PathBuf,
}

/// Record everything the interchange format will drop
pub fn capture_envelope(scene: &dyn SceneHost, object: &str) -> Result<TransferEnvelope> {
    let world_matrix = scene.world_matrix(object)?;
    let parent = scene.parent_of(object);
    let linked = scene.linked_lights(object)?;

    let mut materials = Vec::new();
    let default_group = scene.default_shading_group();
    for shape in scene.shapes(object) {
        for group in scene.shading_groups_of(&shape) {
            if group == default_group {
                continue;
            }
            let faces: Vec<String> = scene
                .faces_in_group(&group)
                .into_iter()
                .filter(|f| f.contains(shape.as_str()))
                .collect();
            if !faces.is_empty() {
                debug!("Captured {} with {} faces on {}", group, faces.len(), shape);
                materials.push(MaterialAssignment {
                    shape: shape.clone(),
                    shading_group: group,
                    faces,
                });
            }
        }
    }

    Ok(TransferEnvelope {
        object: object.to_string(),
        parent,
        world_matrix,
        materials,
        light_links: LightLinks {
            linked,
            unlinked: Vec::new(),
        },
    })
}

/// Write the envelope and export the selected object for one outbound leg.
///
/// The export goes through a throwaway duplicate that is unparented and
/// zeroed out, so the peer receives the object at the origin; transform and
/// parentage travel in the envelope instead. The duplicate is deleted and
/// the original reselected whether or not the export succeeds.
pub fn prepare_outbound(
    scene: &mut dyn SceneHost,
    config: &BridgeConfig,
    direction: Direction,
) -> Result<PreparedTransfer> {
    let selected = scene
        .selection()
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::Scene("No object selected to send".into()))?;
    let object_short = short_name(&selected).to_string();
    let key = SessionKey::new(scene.scene_name(), object_short.clone(), direction);

    config.ensure_temp_dir()?;
    let interchange = key.interchange_path(config.temp_dir());
    let envelope_path = key.envelope_path(config.temp_dir());

    let envelope = capture_envelope(scene, &selected)?;
    envelope.save(&envelope_path)?;
    info!("Envelope written to {}", envelope_path.display());

    let mut copy = scene.duplicate(&selected, &format!("{}_xfer", object_short))?;
    if scene.parent_of(&copy).is_some() {
        match scene.reparent(&copy, None) {
            Ok(path) => copy = path,
            Err(e) => warn!("Could not unparent {}: {}", copy, e),
        }
    }
    if let Err(e) = scene.reset_transform(&copy) {
        warn!("Could not reset transform on {}: {}", copy, e);
    }

    let exported = scene.export_object(&copy, &interchange);
    if let Err(e) = scene.delete_object(&copy) {
        warn!("Could not delete export copy {}: {}", copy, e);
    }
    if let Err(e) = scene.select(&selected) {
        debug!("Could not reselect {}: {}", selected, e);
    }
    exported?;
    info!("Exported {} to {}", selected, interchange.display());

    Ok(PreparedTransfer {
        key,
        interchange,
        envelope: envelope_path,
    })
}

/// Export the selected tagged object for its return leg.
///
/// The object is temporarily renamed to its origin name so the exported
/// file carries the name the origin peer expects; a failed rename is
/// tolerated and the current name exported instead.
pub fn prepare_return(
    scene: &mut dyn SceneHost,
    config: &BridgeConfig,
    direction: Direction,
) -> Result<(SessionKey, PathBuf)> {
    let selected = scene
        .selection()
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::Scene("No object selected to send back".into()))?;
    let tag = scene.read_tag(&selected).ok_or_else(|| {
        BridgeError::Scene(format!(
            "{} has no origin tag; it did not arrive through the bridge",
            selected
        ))
    })?;
    let key = tag.session_key(direction);

    config.ensure_temp_dir()?;
    let interchange = key.interchange_path(config.temp_dir());

    let current_short = short_name(&selected).to_string();
    let mut export_path = selected.clone();
    let mut renamed = false;
    if current_short != key.object {
        match scene.rename(&selected, &key.object) {
            Ok(path) => {
                export_path = path;
                renamed = true;
            }
            Err(e) => warn!("Could not rename {} to {}: {}", selected, key.object, e),
        }
    }

    let exported = scene.export_object(&export_path, &interchange);
    if renamed {
        match scene.rename(&export_path, &current_short) {
            Ok(path) => {
                let _ = scene.select(&path);
            }
            Err(e) => warn!("Could not restore name {}: {}", current_short, e),
        }
    }
    exported?;
    info!("Exported return leg to {}", interchange.display());

    Ok((key, interchange))
}

/// Send the selected object to the other peer (`IMPORT` leg)
pub async fn send_selected(
    handle: &SceneHandle,
    config: &BridgeConfig,
    to: PeerRole,
) -> Result<Reply> {
    let direction = to.inbound();
    let cfg = config.clone();
    let prepared = handle
        .submit(move |scene| prepare_outbound(scene, &cfg, direction))
        .await??;

    let command = Command::Import {
        path: prepared.interchange.to_string_lossy().replace('\\', "/"),
    };
    bridge_net::send_command(&config.addr_for(to), &command, config.connect_timeout).await
}

/// Send the selected tagged object back to its origin (`REPLACE` leg)
pub async fn return_to_origin(
    handle: &SceneHandle,
    config: &BridgeConfig,
    to: PeerRole,
) -> Result<Reply> {
    let direction = to.inbound();
    let cfg = config.clone();
    let (key, _interchange) = handle
        .submit(move |scene| prepare_return(scene, &cfg, direction))
        .await??;

    let command = Command::Replace {
        scene: Some(key.scene.clone()),
        object: key.object.clone(),
    };
    bridge_net::send_command(&config.addr_for(to), &command, config.connect_timeout).await
}

/// Liveness probe against a peer listener
pub async fn ping_peer(config: &BridgeConfig, to: PeerRole) -> Result<Reply> {
    bridge_net::ping(&config.addr_for(to), config.connect_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;
    use bridge_core::envelope::IDENTITY_MATRIX;

    fn moved_matrix() -> [f64; 16] {
        let mut m = IDENTITY_MATRIX;
        m[12] = 4.0;
        m
    }

    fn populated_scene() -> (MemoryScene, String) {
        let mut scene = MemoryScene::new("shot010");
        scene.create_transform("props", None);
        let object = scene.create_mesh("crate", Some("|props"));
        scene.set_world_matrix(&object, &moved_matrix()).unwrap();
        scene.create_group("woodSG");
        scene
            .assign_faces("woodSG", &["|props|crate|crateShape.f[0:5]".into()])
            .unwrap();
        let light = scene.create_light("keyLight");
        scene.set_light_link(&light, &object, true).unwrap();
        (scene, object)
    }

    #[test]
    fn capture_records_transform_materials_and_links() {
        let (scene, object) = populated_scene();
        let envelope = capture_envelope(&scene, &object).unwrap();

        assert_eq!(envelope.object, "|props|crate");
        assert_eq!(envelope.parent.as_deref(), Some("|props"));
        assert_eq!(envelope.world_matrix, moved_matrix());
        assert_eq!(envelope.materials.len(), 1);
        assert_eq!(envelope.materials[0].shading_group, "woodSG");
        assert_eq!(
            envelope.materials[0].faces,
            vec!["|props|crate|crateShape.f[0:5]".to_string()]
        );
        assert_eq!(envelope.light_links.linked, vec!["|keyLight".to_string()]);
    }

    #[test]
    fn prepare_outbound_writes_artifacts_and_restores_scene() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::with_temp_dir(dir.path());
        let (mut scene, object) = populated_scene();
        scene.select(&object).unwrap();

        let prepared =
            prepare_outbound(&mut scene, &config, Direction::ToPeerB).unwrap();

        assert_eq!(prepared.key.file_stem(), "shot010_crate_toPeerB");
        assert!(prepared.interchange.exists());
        assert!(prepared.envelope.exists());
        // The throwaway copy is gone, the original untouched and reselected
        assert!(scene.find_by_short_name("crate_xfer").is_empty());
        assert_eq!(scene.selection(), vec![object.clone()]);
        assert_eq!(scene.world_matrix(&object).unwrap(), moved_matrix());
    }

    #[test]
    fn prepare_outbound_requires_a_selection() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::with_temp_dir(dir.path());
        let (mut scene, _) = populated_scene();

        let err = prepare_outbound(&mut scene, &config, Direction::ToPeerB).unwrap_err();
        assert!(err.reason().contains("No object selected"));
    }

    #[test]
    fn prepare_return_requires_an_origin_tag() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::with_temp_dir(dir.path());
        let (mut scene, object) = populated_scene();
        scene.select(&object).unwrap();

        let err = prepare_return(&mut scene, &config, Direction::ToPeerA).unwrap_err();
        assert!(err.reason().contains("no origin tag"));
    }

    #[test]
    fn prepare_return_exports_under_origin_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::with_temp_dir(dir.path());

        // An imported object that was renamed locally since it arrived
        let mut scene = MemoryScene::new("peerB");
        let object = scene.create_mesh("crate_edit", None);
        scene.set_attr(&object, "origin_scene", "shot010").unwrap();
        scene.set_attr(&object, "origin_object", "crate").unwrap();
        scene.select(&object).unwrap();

        let (key, interchange) =
            prepare_return(&mut scene, &config, Direction::ToPeerA).unwrap();

        assert_eq!(key.file_stem(), "shot010_crate_toPeerA");
        assert!(interchange.exists());
        // Name restored after export
        assert_eq!(scene.find_by_short_name("crate_edit"), vec![object.clone()]);
        assert_eq!(scene.selection(), vec![object]);
    }
}
