// Command line behaviour: exit codes, output, and file effects

use assert_cmd::Command;
use motion_photo_muxer::test_utils::*;
use predicates::prelude::*;
use std::fs;

#[allow(deprecated)]
fn muxer() -> Command {
    let mut cmd = Command::cargo_bin("motion-photo-muxer").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_explicit_pair_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let (photo, video) = write_pair(dir.path(), "IMG_001", "jpg", "mov", 2_000);
    let photo_len = fs::metadata(&photo).unwrap().len();

    muxer()
        .arg("--photo")
        .arg(&photo)
        .arg("--video")
        .arg(&video)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 1 of 1 pair(s)"));

    assert!(fs::metadata(&photo).unwrap().len() > photo_len + 2_000);
}

#[test]
fn test_output_dir_keeps_source() {
    let dir = tempfile::tempdir().unwrap();
    let (photo, video) = write_pair(dir.path(), "a", "jpeg", "mp4", 500);
    let original = fs::read(&photo).unwrap();
    let out = dir.path().join("out");

    muxer()
        .arg("--photo")
        .arg(&photo)
        .arg("--video")
        .arg(&video)
        .arg("--output")
        .arg(&out)
        .arg("--presentation-timestamp-us")
        .arg("-1")
        .assert()
        .success();

    assert_eq!(fs::read(&photo).unwrap(), original);
    let merged = fs::read(out.join("a.jpeg")).unwrap();
    let text = String::from_utf8_lossy(&merged);
    assert!(text.contains(r#"GCamera:MicroVideoPresentationTimestampUs="-1""#));
    assert!(text.contains(r#"GCamera:MicroVideoOffset="500""#));
}

#[test]
fn test_wrong_extension_is_usage_error() {
    // Files don't exist: the extension check must come first
    muxer()
        .args(["--photo", "photo.png", "--video", "clip.mov"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("isn't a JPEG"));
}

#[test]
fn test_missing_inputs_is_usage_error() {
    muxer()
        .args(["--photo", "only.jpg"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--dir"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    muxer().arg("--frobnicate").assert().code(2);
}

#[test]
fn test_bad_dir_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    muxer()
        .arg("--dir")
        .arg(dir.path().join("missing"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn test_dir_with_orphan() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), "A", "jpg", "mov", 64);
    write_file(dir.path(), "B.jpg", &JpegBuilder::new().build());

    muxer()
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 1 of 1 pair(s)"))
        .stdout(predicate::str::contains("no matching video"))
        .stderr(predicate::str::contains("skipping group"));
}

#[test]
fn test_dir_without_pairs_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "lonely.jpg", &JpegBuilder::new().build());

    muxer().arg("--dir").arg(dir.path()).assert().code(1);
}

#[test]
fn test_all_failures_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "broken.jpg", b"not a jpeg");
    write_file(dir.path(), "broken.mov", &video_bytes(32, 2));

    muxer()
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("metadata write"));
}

#[test]
fn test_recurse_flag() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(&dir.path().join("nested"), "deep", "jpg", "mov", 64);

    muxer().arg("--dir").arg(dir.path()).assert().code(1);
    muxer()
        .arg("--dir")
        .arg(dir.path())
        .arg("--recurse")
        .assert()
        .success();
}

#[test]
fn test_verbose_lists_merged_files() {
    let dir = tempfile::tempdir().unwrap();
    let (photo, video) = write_pair(dir.path(), "v", "jpg", "mov", 64);

    muxer()
        .arg("-v")
        .arg("--photo")
        .arg(&photo)
        .arg("--video")
        .arg(&video)
        .assert()
        .success()
        .stdout(predicate::str::contains("video offset 64"))
        .stderr(predicate::str::contains("merged"));
}
