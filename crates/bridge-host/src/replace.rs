//! Replace/import state machine
//!
//! The receiving half of a transfer: validate artifacts, delete what the
//! import will replace, import, identify the new mesh, then reapply
//! everything the interchange format dropped (parent, world transform,
//! name, per-face materials, light links) from the envelope.
//!
//! Steps split into two classes. Hard preconditions (artifact presence, a
//! readable envelope, original resolution, the delete, the import, mesh
//! identification) abort the whole operation with a specific reason. The
//! reapply steps are best-effort and independently recoverable; each
//! sub-step's result lands in an [`ApplyReport`] so no suppressed failure
//! disappears.

use bridge_core::envelope::TransferEnvelope;
use bridge_core::{BridgeError, ObjectTag, PeerRole, Result, SessionKey, envelope_path_for};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::scene::{SceneHost, short_name};

/// Shading-group name markers of speculative importer-created materials
const IMPORTER_GROUP_MARKERS: [&str; 2] = ["fbx", "import"];

/// Best-effort steps of the reapply sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reparent,
    WorldMatrix,
    Rename,
    Materials,
    LightLinks,
    Tag,
}

/// Result of one best-effort step
#[derive(Debug)]
pub struct StepOutcome {
    pub step: Step,
    pub result: std::result::Result<String, String>,
}

/// Structured log of every best-effort step
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub steps: Vec<StepOutcome>,
}

impl ApplyReport {
    fn ok(&mut self, step: Step, detail: impl Into<String>) {
        let detail = detail.into();
        debug!("{:?}: {}", step, detail);
        self.steps.push(StepOutcome {
            step,
            result: Ok(detail),
        });
    }

    fn soft_fail(&mut self, step: Step, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{:?} step failed: {}", step, reason);
        self.steps.push(StepOutcome {
            step,
            result: Err(reason),
        });
    }

    /// Outcome of one step, if it ran
    pub fn outcome_of(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|o| o.step == step)
    }

    /// Steps that did not succeed
    pub fn failed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.step)
            .collect()
    }
}

/// Final object plus the per-step log
#[derive(Debug)]
pub struct TransferOutcome {
    /// Full path of the resulting object
    pub object: String,
    pub report: ApplyReport,
}

/// Validate both artifacts before any scene mutation
fn check_artifacts(interchange: &Path, envelope: &Path) -> Result<()> {
    let meta = std::fs::metadata(interchange).map_err(|_| {
        BridgeError::Artifact(format!("File not found: {}", interchange.display()))
    })?;
    if meta.len() == 0 {
        return Err(BridgeError::Artifact(format!(
            "Interchange file is empty: {}",
            interchange.display()
        )));
    }
    if !envelope.exists() {
        return Err(BridgeError::Artifact(format!(
            "File not found: {}",
            envelope.display()
        )));
    }
    Ok(())
}

/// Import the file and identify the resulting mesh.
///
/// Importers do not reliably report their own selection, so the created
/// set comes from a before/after delta of the scene object list.
/// Preference order: reported selection of mesh type, then a created mesh,
/// then a created object matching the expected name.
fn import_and_identify(
    scene: &mut dyn SceneHost,
    interchange: &Path,
    expected_short: &str,
) -> Result<String> {
    let before: HashSet<String> = scene.list_objects().into_iter().collect();
    let reported = scene.import_file(interchange)?;
    let created: Vec<String> = scene
        .list_objects()
        .into_iter()
        .filter(|o| !before.contains(o))
        .collect();
    debug!("{} new objects after import", created.len());

    for object in &reported {
        if scene.object_exists(object) && scene.is_mesh(object) {
            return Ok(object.clone());
        }
    }
    for object in &created {
        if scene.is_mesh(object) {
            return Ok(object.clone());
        }
    }
    for object in &created {
        if short_name(object).contains(expected_short) {
            debug!("Falling back to name match: {}", object);
            return Ok(object.clone());
        }
    }

    Err(BridgeError::Scene(
        "No mesh object found in imported file".into(),
    ))
}

/// Reapply everything the envelope records onto a freshly imported object.
///
/// Returns the object's final path (reparenting and renaming both move it)
/// and the per-step report. Applying the same envelope twice lands on the
/// same scene state.
pub fn apply_envelope(
    scene: &mut dyn SceneHost,
    object: String,
    envelope: &TransferEnvelope,
    target_short: &str,
) -> (String, ApplyReport) {
    let mut report = ApplyReport::default();
    let mut object = object;

    match &envelope.parent {
        Some(parent) if scene.object_exists(parent) => {
            match scene.reparent(&object, Some(parent)) {
                Ok(new_path) => {
                    object = new_path;
                    report.ok(Step::Reparent, format!("Parented under {}", parent));
                }
                Err(e) => report.soft_fail(Step::Reparent, e.reason()),
            }
        }
        Some(parent) => {
            report.soft_fail(Step::Reparent, format!("Parent {} no longer exists", parent));
        }
        None => report.ok(Step::Reparent, "No parent recorded"),
    }

    match scene.set_world_matrix(&object, &envelope.world_matrix) {
        Ok(()) => report.ok(Step::WorldMatrix, "World matrix applied"),
        Err(e) => report.soft_fail(Step::WorldMatrix, e.reason()),
    }

    if short_name(&object) == target_short {
        report.ok(Step::Rename, "Name already matches");
    } else {
        match scene.rename(&object, target_short) {
            Ok(new_path) => {
                object = new_path;
                report.ok(Step::Rename, format!("Renamed to {}", target_short));
            }
            // Tolerated: usually a name collision with an unrelated node
            Err(e) => report.soft_fail(Step::Rename, e.reason()),
        }
    }

    reapply_materials(scene, &object, envelope, &mut report);
    reapply_light_links(scene, &object, envelope, &mut report);

    (object, report)
}

fn is_importer_group(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMPORTER_GROUP_MARKERS.iter().any(|m| lower.contains(m))
}

fn reapply_materials(
    scene: &mut dyn SceneHost,
    object: &str,
    envelope: &TransferEnvelope,
    report: &mut ApplyReport,
) {
    let shapes = scene.shapes(object);
    if shapes.is_empty() {
        report.soft_fail(Step::Materials, "No shapes on imported object");
        return;
    }

    // Strip whatever the importer guessed at; only the envelope decides
    let default_group = scene.default_shading_group();
    for shape in &shapes {
        for group in scene.shading_groups_of(shape) {
            if group != default_group && is_importer_group(&group) {
                if let Err(e) = scene.remove_shape_from_group(&group, shape) {
                    debug!("Could not strip importer group {}: {}", group, e);
                }
            }
        }
    }

    if envelope.materials.is_empty() {
        // Never leave the object on an importer-default material
        match scene.assign_whole_shape(&default_group, &shapes[0]) {
            Ok(()) => report.ok(Step::Materials, "No material data; default assignment"),
            Err(e) => report.soft_fail(Step::Materials, e.reason()),
        }
        return;
    }

    let mut applied = 0;
    let mut failures: Vec<String> = Vec::new();
    for entry in &envelope.materials {
        // The bridge never recreates materials, only reassigns faces
        if !scene.shading_group_exists(&entry.shading_group) {
            failures.push(format!(
                "Shading group {} does not exist",
                entry.shading_group
            ));
            continue;
        }

        let recorded_short = short_name(&entry.shape).to_string();
        let Some(new_shape) = shapes.iter().find(|s| s.contains(&recorded_short)) else {
            failures.push(format!("No shape matching {}", recorded_short));
            continue;
        };

        let new_faces: Vec<String> = entry
            .faces
            .iter()
            .filter_map(|face| {
                face.split_once(".f[")
                    .map(|(_, components)| format!("{}.f[{}", new_shape, components))
            })
            .collect();
        if new_faces.is_empty() {
            failures.push(format!("No face components recorded for {}", entry.shape));
            continue;
        }

        match scene.assign_faces(&entry.shading_group, &new_faces) {
            Ok(()) => {
                debug!(
                    "Assigned {} faces to {} on {}",
                    new_faces.len(),
                    entry.shading_group,
                    new_shape
                );
                applied += 1;
            }
            Err(e) => failures.push(format!("{}: {}", entry.shading_group, e.reason())),
        }
    }

    if applied == 0 {
        if let Err(e) = scene.assign_whole_shape(&default_group, &shapes[0]) {
            warn!("Default shading fallback failed: {}", e);
        }
        report.soft_fail(
            Step::Materials,
            format!(
                "No materials applied ({}); default fallback",
                failures.join("; ")
            ),
        );
    } else if failures.is_empty() {
        report.ok(Step::Materials, format!("{} assignments applied", applied));
    } else {
        report.soft_fail(
            Step::Materials,
            format!(
                "{} of {} assignments applied; {}",
                applied,
                envelope.materials.len(),
                failures.join("; ")
            ),
        );
    }
}

fn reapply_light_links(
    scene: &mut dyn SceneHost,
    object: &str,
    envelope: &TransferEnvelope,
    report: &mut ApplyReport,
) {
    let lights = scene.lights();

    // Resolve recorded ids; lights that no longer exist are dropped
    let mut wanted: Vec<String> = Vec::new();
    for recorded in &envelope.light_links.linked {
        let resolved = if lights.iter().any(|l| l == recorded) {
            Some(recorded.clone())
        } else {
            lights
                .iter()
                .find(|l| short_name(l) == short_name(recorded))
                .cloned()
        };
        match resolved {
            Some(light) if !wanted.contains(&light) => wanted.push(light),
            Some(_) => {}
            None => debug!("Dropping vanished light {}", recorded),
        }
    }

    // Break everything first so the end state matches the envelope exactly,
    // whatever links the importer created as a side effect
    for light in &lights {
        if let Err(e) = scene.set_light_link(light, object, false) {
            debug!("Could not break link {} -> {}: {}", light, object, e);
        }
    }

    let mut restored = 0;
    let mut failed = 0;
    for light in &wanted {
        match scene.set_light_link(light, object, true) {
            Ok(()) => restored += 1,
            Err(e) => {
                failed += 1;
                warn!("Could not link {} -> {}: {}", light, object, e);
            }
        }
    }

    if restored == 0 && failed > 0 {
        report.soft_fail(
            Step::LightLinks,
            format!("No links restored ({} failed)", failed),
        );
    } else {
        report.ok(
            Step::LightLinks,
            format!(
                "{} links restored, {} recorded",
                restored,
                envelope.light_links.linked.len()
            ),
        );
    }
}

/// Handle `IMPORT|<path>`: first leg of a transfer arriving at this peer.
///
/// Deletes a stale copy from an earlier transfer of the same session, then
/// imports, reapplies the envelope, and tags the result with its return
/// address.
pub fn run_import(scene: &mut dyn SceneHost, interchange: &Path) -> Result<TransferOutcome> {
    let envelope_path = envelope_path_for(interchange);
    check_artifacts(interchange, &envelope_path)?;

    let envelope = TransferEnvelope::load(&envelope_path)?;
    let target_short = envelope.object_short_name().to_string();
    let key = SessionKey::from_interchange_path(interchange, &target_short)?;
    info!("Importing {} (session {})", target_short, key.file_stem());

    for candidate in scene.find_by_short_name(&target_short) {
        let stale = scene.read_tag(&candidate).is_some_and(|tag| {
            tag.origin_scene == key.scene && tag.origin_object == key.object
        });
        if stale {
            scene.delete_object(&candidate).map_err(|e| {
                BridgeError::Scene(format!(
                    "Could not delete stale object {}: {}",
                    candidate,
                    e.reason()
                ))
            })?;
            info!("Deleted stale import {}", candidate);
        }
    }

    let imported = import_and_identify(scene, interchange, &target_short)?;
    let (object, mut report) = apply_envelope(scene, imported, &envelope, &target_short);

    // Return-address tag; without it the object cannot travel back
    let tag = ObjectTag {
        origin_scene: key.scene.clone(),
        origin_object: key.object.clone(),
        origin_full_path: Some(envelope.object.clone()),
    };
    match write_tag(scene, &object, &tag) {
        Ok(()) => report.ok(Step::Tag, "Origin tag written"),
        Err(e) => report.soft_fail(Step::Tag, e.reason()),
    }

    if let Err(e) = scene.select(&object) {
        debug!("Could not select {}: {}", object, e);
    }

    Ok(TransferOutcome { object, report })
}

/// Handle `REPLACE|<scene>|<object>`: return leg arriving back at the
/// originating peer.
///
/// Reads the interchange file of the peer's return direction and the
/// envelope of the original outbound direction, deletes the original
/// *before* importing (so the replacement can claim the canonical name),
/// then reapplies the envelope.
pub fn run_replace(
    scene: &mut dyn SceneHost,
    role: PeerRole,
    scene_name: Option<String>,
    object: String,
    config: &BridgeConfig,
) -> Result<TransferOutcome> {
    let scene_name = scene_name.unwrap_or_else(|| scene.scene_name());
    let inbound_key = SessionKey::new(scene_name, object, role.inbound());
    let outbound_key = inbound_key.reversed();

    let interchange = inbound_key.interchange_path(config.temp_dir());
    let envelope_path = outbound_key.envelope_path(config.temp_dir());
    debug!(
        "Replace session {}: interchange {}, envelope {}",
        inbound_key.file_stem(),
        interchange.display(),
        envelope_path.display()
    );
    check_artifacts(&interchange, &envelope_path)?;

    let envelope = TransferEnvelope::load(&envelope_path)?;
    let target_short = envelope.object_short_name().to_string();

    // Resolve the original, falling back to a short-name search when the
    // recorded full path went stale
    let original = if scene.object_exists(&envelope.object) {
        envelope.object.clone()
    } else {
        debug!(
            "Original path {} not found, searching for {}",
            envelope.object, target_short
        );
        scene
            .find_by_short_name(&target_short)
            .into_iter()
            .next()
            .ok_or_else(|| {
                BridgeError::Scene(format!(
                    "Original object {} not found in scene",
                    envelope.object
                ))
            })?
    };

    // Delete before import: importing first risks a collision rename that
    // robs the replacement of the canonical name
    scene.delete_object(&original).map_err(|e| {
        BridgeError::Scene(format!(
            "Replace failed: could not delete original object: {}",
            e.reason()
        ))
    })?;
    info!("Deleted original {} before import", original);

    let imported = import_and_identify(scene, &interchange, &target_short).map_err(|e| match e {
        // Mesh identification keeps its exact reason
        scene_err @ BridgeError::Scene(_) => scene_err,
        other => BridgeError::HostApi(format!("Replace failed: {}", other.reason())),
    })?;

    let (object_path, report) = apply_envelope(scene, imported, &envelope, &target_short);

    if let Err(e) = scene.select(&object_path) {
        debug!("Could not select {}: {}", object_path, e);
    }

    if !config.keep_artifacts {
        cleanup_artifacts(&[&interchange, &envelope_path]);
    }

    info!("Replaced original with {}", object_path);
    Ok(TransferOutcome {
        object: object_path,
        report,
    })
}

fn write_tag(scene: &mut dyn SceneHost, object: &str, tag: &ObjectTag) -> Result<()> {
    for (attr, value) in tag.pairs() {
        scene.set_attr(object, attr, &value)?;
    }
    Ok(())
}

fn cleanup_artifacts(paths: &[&Path]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed artifact {}", path.display()),
            Err(e) => warn!("Could not remove artifact {}: {}", path.display(), e),
        }
    }
}
