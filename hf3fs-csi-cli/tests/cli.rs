use predicates::prelude::*;

mod common;

#[test]
fn test_render_prints_launcher_config() {
    let mut ctx = common::hf3fs_csi();
    ctx.cmd.arg("render");
    ctx.cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster_id = \"c1\""))
        .stdout(predicate::str::contains("[mgmtd_client]"))
        .stdout(predicate::str::contains("RDMA://192.168.1.2:8000"));
}

#[test]
fn test_render_write_creates_file() {
    let mut ctx = common::hf3fs_csi();
    std::fs::create_dir_all(ctx.home.path().join("etc")).unwrap();
    ctx.cmd.args(["render", "--write"]);
    ctx.cmd.assert().success();

    let written =
        std::fs::read_to_string(ctx.home.path().join("etc/hf3fs_fuse_main_launcher.toml")).unwrap();
    assert!(written.contains("cluster_id = \"c1\""));
}

#[test]
fn test_info_reports_identity() {
    let mut ctx = common::hf3fs_csi();
    ctx.cmd.arg("info");
    ctx.cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("\"node_id\": \"node-a\""))
        .stdout(predicate::str::contains("fs.3fs.dev"))
        .stdout(predicate::str::contains("c1.mount.lock"));
}

#[test]
fn test_missing_cluster_id_fails() {
    let ctx = common::hf3fs_csi();
    let mut cmd = ctx.unconfigured_cmd();
    cmd.env("MGMTD_ADDRESSES", r#"["a:1"]"#).arg("render");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("CLUSTER_ID"));
}

#[test]
fn test_stats_of_existing_dir() {
    let mut ctx = common::hf3fs_csi();
    let path = ctx.home.path().to_path_buf();
    ctx.cmd.arg("stats").arg("--volume-path").arg(&path);
    ctx.cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bytes\""))
        .stdout(predicate::str::contains("\"inodes\""));
}

#[test]
fn test_stats_of_missing_path_fails() {
    let mut ctx = common::hf3fs_csi();
    let path = ctx.home.path().join("missing");
    ctx.cmd.arg("stats").arg("--volume-path").arg(&path);
    ctx.cmd
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_publish_rejects_empty_sub_path() {
    let mut ctx = common::hf3fs_csi();
    let target = ctx.home.path().join("target");
    ctx.cmd
        .args(["publish", "--volume-id", "pvc-1", "--sub-path", ""])
        .arg("--target-path")
        .arg(&target);
    ctx.cmd
        .assert()
        .failure()
        .stderr(predicate::str::contains("sub_path is required"));
}

#[test]
fn test_unpublish_never_published_succeeds() {
    let mut ctx = common::hf3fs_csi();
    let target = ctx.home.path().join("never");
    ctx.cmd
        .args(["unpublish", "--volume-id", "pvc-1"])
        .arg("--target-path")
        .arg(&target);
    ctx.cmd.assert().success();

    let mut again = ctx.new_cmd();
    again
        .args(["unpublish", "--volume-id", "pvc-1"])
        .arg("--target-path")
        .arg(&target);
    again.assert().success();
}
