use std::time::Duration;

use lobster_scene::{
    LoadReport, LoadStatus, SceneConfig, SceneState,
    context::Viewport,
    driver::settle_model,
    resources::{
        Assets,
        error::{AssetError, AssetKind},
        geometry::{box_geometry, cylinder, sphere},
    },
};

fn empty_scene() -> SceneState<()> {
    SceneState::new(&SceneConfig::default(), |_, _| ())
}

#[test]
fn scene_runs_a_hundred_frames_without_the_model() {
    let mut state = empty_scene();
    let mut report = LoadReport::default();
    settle_model(
        &mut state,
        &mut report,
        Err(AssetError::Empty {
            path: "models/lobster/lobster.obj".to_string(),
        }),
    );

    let frame = Duration::from_millis(16);
    let mut elapsed = Duration::ZERO;
    for _ in 0..100 {
        elapsed += frame;
        state.animate(elapsed);
    }

    assert_eq!(state.scene.len(), 5);
    assert!(state.lobster.is_none());
    assert!(matches!(report.model, LoadStatus::Failed(_)));
    let last = state.scene.transform(state.cubes[2]).rotation.x;
    assert!((last - 1.6 * 1.2).abs() < 1e-3, "{last}");
}

#[test]
fn late_model_starts_spinning_from_its_initial_yaw() {
    let mut state = empty_scene();
    state.animate(Duration::from_secs(3));

    let mut report = LoadReport::default();
    let id = settle_model(&mut state, &mut report, Ok(())).unwrap();
    let start = state.scene.transform(id).rotation.y;

    state.animate(Duration::from_secs(4));
    let yaw = state.scene.transform(id).rotation.y;
    assert!((yaw - start - 0.01).abs() < 1e-6);
    assert_eq!(report.model, LoadStatus::Loaded);
    assert_eq!(report.texture, LoadStatus::Pending);
}

#[test]
fn canvas_resize_follows_the_displayed_size() {
    let mut backing = Viewport::new(300, 150);
    for displayed in [Viewport::new(1024, 768), Viewport::new(0, 0), Viewport::new(640, 480)] {
        if let Some(size) = backing.resize_to(displayed) {
            backing = size;
        }
    }
    assert_eq!(backing, Viewport::new(640, 480));
    assert!((backing.aspect() - 4.0 / 3.0).abs() < 1e-6);
}

#[test]
fn primitives_have_the_expected_topology() {
    let cube = box_geometry(1.0, 1.0, 1.0);
    assert_eq!((cube.vertices.len(), cube.indices.len()), (24, 36));

    let ball = sphere(5.0, 10, 10);
    assert_eq!((ball.vertices.len(), ball.indices.len()), (121, 540));

    let disc = cylinder(4.0, 4.0, 1.0, 32, 1);
    assert_eq!((disc.vertices.len(), disc.indices.len()), (196, 384));

    for mesh in [&cube, &ball, &disc] {
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }
}

#[tokio::test]
async fn missing_asset_root_reports_every_file() {
    let assets = Assets::new("/nonexistent/lobster-scene-assets");
    let config = SceneConfig::default();

    let err = assets.load_binary(&config.sphere_texture).await.unwrap_err();
    assert_eq!(err.path(), config.sphere_texture);

    let mut report = LoadReport::default();
    report.record::<()>(AssetKind::Texture, &Err(err));
    assert!(report.texture.to_string().contains("disco2.jpg"));
    assert!(!report.is_settled());
}
