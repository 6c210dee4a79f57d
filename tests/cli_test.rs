use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use vision_clip::audio::Clip;

/// Binary with a clean environment rooted in `dir`, so no user config or
/// provider variables leak in.
fn vision_clip(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vision-clip").unwrap();
    cmd.current_dir(dir)
        .env_clear()
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd
}

fn workspace_with_script(script: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("call.txt"), script).unwrap();
    dir
}

#[test]
fn providers_json_lists_registry() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .args(["providers", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"elevenlabs\""))
        .stdout(predicate::str::contains("\"max_text_length\": 3000"));
}

#[test]
fn unknown_provider_exits_with_config_code() {
    let dir = workspace_with_script("<ringback>\nIVA: Hello\n");
    vision_clip(dir.path())
        .args(["generate", "--file", "call.txt", "--provider", "watson"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown TTS provider 'watson'"));
}

#[test]
fn unknown_provider_from_env_is_rejected_before_config_is_read() {
    let dir = workspace_with_script("<ringback>\n");
    // A broken project config would fail to parse if it were read.
    std::fs::write(dir.path().join("vision-clip.toml"), "not = [valid").unwrap();
    vision_clip(dir.path())
        .env("TTS_PROVIDER", "bogus")
        .args(["generate", "--file", "call.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn missing_credentials_name_the_env_var() {
    let dir = workspace_with_script("<ringback>\nIVA: Hello\n");
    vision_clip(dir.path())
        .args(["generate", "--file", "call.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));
}

#[test]
fn missing_script_exits_with_script_code() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "absent.txt"])
        .assert()
        .code(4);
}

#[test]
fn malformed_script_exits_with_script_code() {
    let dir = workspace_with_script("<ringback>\nCaller: soon: hello\n");
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "--no-playback"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("line 2"));
    assert!(!dir.path().join("call.wav").exists());
}

#[test]
fn missing_effect_asset_exits_with_io_code() {
    let dir = workspace_with_script("<ringback>\nIVA: Hello\n");
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "--no-playback"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ringback.wav"));
}

#[test]
fn declining_directory_creation_exits_with_general_code() {
    let dir = workspace_with_script("<ringback>\n");
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "-o", "out/clips/call.wav"])
        .write_stdin("n\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Create directory? (y/n)"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn accepted_prompt_creates_directory_and_writes_clip() {
    let dir = workspace_with_script("no ringback here\n");
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "--no-playback", "-o", "out/call.wav"])
        .write_stdin("Y\n")
        .assert()
        .success();
    assert!(dir.path().join("out").join("call.wav").is_file());
}

#[test]
fn default_output_uses_script_stem() {
    let dir = workspace_with_script("IVA: not spoken\n");
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "--no-playback"])
        .assert()
        .success();
    assert!(dir.path().join("call.wav").is_file());
    assert!(!dir.path().join(".temp").exists());
}

#[test]
fn assemble_concatenates_kept_segments() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join(".temp");
    std::fs::create_dir_all(&workspace).unwrap();
    Clip::new(24_000, 1, vec![1; 100])
        .write(&workspace.join("002_va.wav"))
        .unwrap();
    Clip::new(24_000, 1, vec![2; 50])
        .write(&workspace.join("001_ringback.wav"))
        .unwrap();

    vision_clip(dir.path())
        .args(["assemble", "--workspace", ".temp", "-o", "joined.wav"])
        .assert()
        .success();

    let joined = Clip::read(&dir.path().join("joined.wav")).unwrap();
    assert_eq!(joined.frames(), 150);
    assert_eq!(joined.samples[0], 2);
    assert_eq!(joined.samples[149], 1);
}

#[test]
fn config_show_masks_secrets() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .env("AWS_SECRET_ACCESS_KEY", "super-secret")
        .env("AWS_ACCESS_KEY_ID", "AKID")
        .args(["config", "--show", "--provider", "aws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"provider\": \"aws\""))
        .stdout(predicate::str::contains("\"access_key_id\": \"AKID\""))
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn config_with_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .args(["config", "--validate", "--config", "missing.toml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn config_path_prints_user_config_location() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().join(".config").join("vision-clip").join("config.toml");
    vision_clip(dir.path())
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn config_validate_resolves_selected_provider() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .env("GOOGLE_API_KEY", "g")
        .args(["config", "--validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config OK (provider: google)"));
}

#[test]
fn invalid_log_level_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .args(["--log-level", "loud", "providers"])
        .assert()
        .code(2);
}

#[test]
fn log_file_flag_without_value_uses_default_name() {
    let dir = tempfile::tempdir().unwrap();
    vision_clip(dir.path())
        .args(["--log-file", "--log-level", "WARNING", "providers"])
        .assert()
        .success();
    assert!(dir.path().join("vision-clip.log").is_file());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn interrupt_during_synthesis_exits_130() {
    use std::process::Stdio;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta1/text:synthesize"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let dir = workspace_with_script("<ringback>\nIVA: Hello\n");
    std::fs::create_dir_all(dir.path().join("audio")).unwrap();
    Clip::silence(24_000, 240)
        .write(&dir.path().join("audio").join("ringback.wav"))
        .unwrap();

    let child = std::process::Command::new(env!("CARGO_BIN_EXE_vision-clip"))
        .current_dir(dir.path())
        .env_clear()
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("GOOGLE_API_KEY", "g")
        .args(["generate", "--file", "call.txt", "--no-playback", "--tts-option"])
        .arg(format!("endpoint={}", server.uri()))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Wait until the synthesis request is in flight.
    let mut waited = 0;
    while server.received_requests().await.unwrap_or_default().is_empty() {
        assert!(waited < 200, "synthesis request never arrived");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += 1;
    }

    let status = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = tokio::task::spawn_blocking(move || child.wait_with_output())
        .await
        .unwrap()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(130));
    assert!(stderr.contains("Exiting..."));
    assert!(!stderr.contains("panicked"));
}
