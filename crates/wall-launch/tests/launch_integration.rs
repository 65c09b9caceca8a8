//! End-to-end runs of the launcher with small walls.

use wall_core::{Arrangement, CodecKind};
use wall_launch::{launch, LaunchError};
use wall_service::infrastructure::storage::config::ServiceConfig;

fn small_config(head_node: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.wall.num_displays = [2, 2];
    config.wall.pixels_per_display = [40, 30];
    config.wall.bezel = [0.1, 0.0];
    config.wall.arrangement = Arrangement::XDecYInc;
    config.service.head_node = head_node;
    config.service.decode_workers = 2;
    config.service.info_port = 0;
    config.service.port_file =
        std::env::temp_dir().join(format!("wall-launch-{}.port", uuid::Uuid::new_v4()));
    config.compression.codec = CodecKind::Zstd;
    config.render.clients = 3;
    config.render.frames = 4;
    config.render.tile_size = 16;
    config
}

#[tokio::test]
async fn test_launch_presents_every_frame_on_every_display() {
    // Arrange
    let config = small_config(false);

    // Act
    let report = launch(&config).await.expect("launch");

    // Assert
    assert_eq!(report.frames_per_display, vec![4; 4]);
    assert!(config.service.port_file.exists());
    let _ = std::fs::remove_file(&config.service.port_file);
}

#[tokio::test]
async fn test_launch_with_head_node_and_lossy_codec() {
    let mut config = small_config(true);
    config.compression.codec = CodecKind::Quantized;
    config.compression.quality = 50;
    config.wall.stereo = true;

    let report = launch(&config).await.expect("launch");

    assert_eq!(report.frames_per_display, vec![4; 4]);
    let _ = std::fs::remove_file(&config.service.port_file);
}

#[tokio::test]
async fn test_launch_without_clients_is_rejected() {
    let mut config = small_config(false);
    config.render.clients = 0;

    let err = launch(&config).await.expect_err("must fail");

    assert!(matches!(err, LaunchError::NoClients));
}

#[tokio::test]
async fn test_degenerate_wall_is_a_config_error() {
    let mut config = small_config(false);
    config.wall.num_displays = [0, 2];

    let err = launch(&config).await.expect_err("must fail");

    assert!(matches!(err, LaunchError::Config(_)));
}
