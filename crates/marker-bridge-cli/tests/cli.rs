use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("marker-bridge").unwrap()
}

const CALIBRATION_YML: &str = "%YAML:1.0
---
cameraMatrix: !!opencv-matrix
   rows: 3
   cols: 3
   dt: d
   data: [ 800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0 ]
distCoeffs: !!opencv-matrix
   rows: 1
   cols: 5
   dt: d
   data: [ 0.1, -0.05, 0.0, 0.0, 0.01 ]
";

#[test]
fn preview_size_prints_choice() {
    cli()
        .args([
            "preview-size",
            "--view",
            "1400x800",
            "--candidates",
            "1920x1080,1280x720,640x480",
        ])
        .assert()
        .success()
        .stdout("1280x720\n");
}

#[test]
fn preview_size_rejects_malformed_sizes() {
    cli()
        .args(["preview-size", "--view", "wide", "--candidates", "640x480"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WIDTHxHEIGHT"));
}

#[test]
fn yuv_dump_converts_to_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("frame.nv21");
    let out = dir.path().join("frame.png");
    let mut data = vec![200u8; 4 * 2];
    data.extend_from_slice(&[128, 128, 128, 128]);
    std::fs::write(&input, &data).unwrap();

    cli()
        .args(["yuv-to-png", "--width", "4", "--height", "2", "--layout", "nv21"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (4, 2));
    assert!(img.pixels().all(|p| p.0[3] == 255));
}

#[test]
fn yuv_preview_is_rotated_to_portrait() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("frame.i420");
    let out = dir.path().join("preview.png");
    std::fs::write(&input, vec![100u8; 4 * 2 + 2 + 2]).unwrap();

    cli()
        .args(["yuv-to-png", "--width", "4", "--height", "2", "--layout", "i420", "--preview"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).unwrap();
    assert_eq!((img.width(), img.height()), (2, 4));
}

#[test]
fn truncated_yuv_dump_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("short.nv21");
    std::fs::write(&input, [0u8; 5]).unwrap();

    cli()
        .args(["yuv-to-png", "--width", "4", "--height", "2"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(dir.path().join("x.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn rotate180_flips_gray_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let out = dir.path().join("out.png");
    image::GrayImage::from_raw(3, 1, vec![1, 2, 3])
        .unwrap()
        .save(&input)
        .unwrap();

    cli()
        .arg("rotate180")
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let img = image::open(&out).unwrap().to_luma8();
    assert_eq!(img.as_raw(), &vec![3, 2, 1]);
}

#[test]
fn show_calibration_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.yml");
    std::fs::write(&path, CALIBRATION_YML).unwrap();

    let output = cli()
        .arg("show-calibration")
        .arg("--path")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["camera_matrix"][0][2], 320.0);
    assert_eq!(json["camera_matrix"][1][1], 800.0);
    assert_eq!(json["dist_coeffs"].as_array().unwrap().len(), 5);
}

#[test]
fn show_calibration_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .arg("show-calibration")
        .arg("--path")
        .arg(dir.path().join("absent.yml"))
        .assert()
        .failure();
}

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("bridge.json");

    cli().arg("init-config").arg("--out").arg(&out).assert().success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["marker_length"], 0.05);
    assert_eq!(json["calibration_path"], "calibration.yml");
}

#[cfg(feature = "tracing")]
#[test]
fn json_logs_are_written_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["-v", "--log-json", "init-config", "--out"])
        .arg(dir.path().join("bridge.json"))
        .assert()
        .success()
        .stderr(
            predicate::str::contains("\"level\":\"INFO\"")
                .and(predicate::str::contains("wrote")),
        );
}
