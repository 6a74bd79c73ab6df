//! End-to-end round trip between two in-process peers
//!
//! Peer A holds the authored scene; peer B receives the object, edits it,
//! and sends it home. Both listeners run on ephemeral ports against
//! in-memory scenes, with real sockets and real artifact files in between.

use bridge_core::envelope::IDENTITY_MATRIX;
use bridge_core::{PeerRole, Reply};
use bridge_host::{
    BridgeConfig, BridgeHandler, MemoryScene, SceneExecutor, SceneHost, ping_peer,
    return_to_origin, send_selected,
};
use bridge_net::{ListenerConfig, PeerListener};
use std::sync::Arc;

fn moved_matrix() -> [f64; 16] {
    let mut m = IDENTITY_MATRIX;
    m[12] = 4.0;
    m[13] = 5.0;
    m[14] = 6.0;
    m
}

async fn start_peer(
    scene: MemoryScene,
    role: PeerRole,
    config: &BridgeConfig,
) -> (SceneExecutor, PeerListener) {
    let executor = SceneExecutor::spawn(scene);
    let handler = BridgeHandler::new(executor.handle(), config.clone(), role);
    let mut listener = PeerListener::new(ListenerConfig::new(0), Arc::new(handler));
    listener.start().await.unwrap();
    (executor, listener)
}

#[tokio::test]
async fn object_round_trips_between_peers() {
    let dir = tempfile::tempdir().unwrap();
    let base = BridgeConfig::with_temp_dir(dir.path());

    // Peer A: the originating scene, with everything the interchange
    // format is going to drop
    let mut scene_a = MemoryScene::new("shot010");
    scene_a.create_transform("props", None);
    let original = scene_a.create_mesh("crate", Some("|props"));
    scene_a
        .set_world_matrix(&original, &moved_matrix())
        .unwrap();
    scene_a.create_group("woodSG");
    scene_a
        .assign_faces("woodSG", &["|props|crate|crateShape.f[0:5]".into()])
        .unwrap();
    let light = scene_a.create_light("keyLight");
    scene_a.set_light_link(&light, &original, true).unwrap();
    scene_a.select(&original).unwrap();

    let scene_b = MemoryScene::new("authorB");

    let (exec_a, mut listener_a) = start_peer(scene_a, PeerRole::A, &base).await;
    let (exec_b, mut listener_b) = start_peer(scene_b, PeerRole::B, &base).await;

    let mut config = base.clone();
    config.peer_a_port = listener_a.local_addr().unwrap().port();
    config.peer_b_port = listener_b.local_addr().unwrap().port();

    // Liveness both ways
    assert!(matches!(
        ping_peer(&config, PeerRole::A).await.unwrap(),
        Reply::Pong(_)
    ));
    assert!(matches!(
        ping_peer(&config, PeerRole::B).await.unwrap(),
        Reply::Pong(_)
    ));

    // First leg: A's selection travels to B
    let handle_a = exec_a.handle();
    let handle_b = exec_b.handle();
    let reply = send_selected(&handle_a, &config, PeerRole::B).await.unwrap();
    assert_eq!(reply, Reply::Ok("Imported crate".into()));

    // B holds a tagged copy at the recorded transform
    let (tag, matrix) = handle_b
        .submit(|scene| {
            let tag = scene.read_tag("|crate");
            let matrix = scene.world_matrix("|crate").unwrap();
            (tag, matrix)
        })
        .await
        .unwrap();
    let tag = tag.expect("imported object carries an origin tag");
    assert_eq!(tag.origin_scene, "shot010");
    assert_eq!(tag.origin_object, "crate");
    assert_eq!(tag.origin_full_path.as_deref(), Some("|props|crate"));
    assert_eq!(matrix, moved_matrix());

    // Return leg: B sends its (edited) copy home
    handle_b
        .submit(|scene| scene.select("|crate"))
        .await
        .unwrap()
        .unwrap();
    let reply = return_to_origin(&handle_b, &config, PeerRole::A)
        .await
        .unwrap();
    assert_eq!(reply, Reply::Ok("Replaced with |props|crate".into()));

    // A's replacement reacquired parent, transform, materials, and links
    let (matrix, faces, links, selection) = handle_a
        .submit(|scene| {
            (
                scene.world_matrix("|props|crate").unwrap(),
                scene.faces_in_group("woodSG"),
                scene.linked_lights("|props|crate").unwrap(),
                scene.selection(),
            )
        })
        .await
        .unwrap();
    assert_eq!(matrix, moved_matrix());
    assert_eq!(
        faces,
        vec!["|props|crate|crateShape.f[0:5]".to_string()]
    );
    assert_eq!(links, vec!["|keyLight".to_string()]);
    assert_eq!(selection, vec!["|props|crate".to_string()]);

    listener_a.stop().await;
    listener_b.stop().await;
    exec_a.shutdown().await;
    exec_b.shutdown().await;
}

#[tokio::test]
async fn malformed_traffic_does_not_poison_a_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let base = BridgeConfig::with_temp_dir(dir.path());

    let mut scene_a = MemoryScene::new("shot010");
    let original = scene_a.create_mesh("crate", None);
    scene_a.select(&original).unwrap();

    let (exec_a, mut listener_a) = start_peer(scene_a, PeerRole::A, &base).await;
    let (exec_b, mut listener_b) =
        start_peer(MemoryScene::new("authorB"), PeerRole::B, &base).await;

    let mut config = base.clone();
    config.peer_a_port = listener_a.local_addr().unwrap().port();
    config.peer_b_port = listener_b.local_addr().unwrap().port();

    // Garbage first; the listener answers and keeps accepting
    let addr = config.addr_for(PeerRole::B);
    let reply = bridge_net::send_command(
        &addr,
        &bridge_core::Command::Unknown {
            raw: "FOO|bar".into(),
        },
        config.connect_timeout,
    )
    .await
    .unwrap();
    assert_eq!(reply, Reply::Err("Unknown command: FOO|bar".into()));

    // A real transfer still goes through on the same listener
    let reply = send_selected(&exec_a.handle(), &config, PeerRole::B)
        .await
        .unwrap();
    assert_eq!(reply, Reply::Ok("Imported crate".into()));

    listener_a.stop().await;
    listener_b.stop().await;
    exec_a.shutdown().await;
    exec_b.shutdown().await;
}
