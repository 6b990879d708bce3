//! Integration tests for bundlekeeper

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn bundlekeeper() -> Command {
        cargo_bin_cmd!("bundlekeeper")
    }

    /// Write a config pointing storage and assets into `dir`
    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        let content = format!(
            "[storage]\ndownload_dir = {:?}\nasset_dir = {:?}\n\n{}",
            dir.join("download").display().to_string(),
            dir.join("assets").display().to_string(),
            extra
        );
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        bundlekeeper()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("background bundle update service"));
    }

    #[test]
    fn version_displays() {
        bundlekeeper()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bundlekeeper"));
    }

    #[test]
    fn config_path_uses_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        bundlekeeper()
            .args(["config", "path"])
            .env("BUNDLEKEEPER_CONFIG", &path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        bundlekeeper()
            .args(["config", "show"])
            .env("BUNDLEKEEPER_CONFIG", temp.path().join("missing.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[update]"))
            .stdout(predicate::str::contains("poll_interval_secs = 3600"));
    }

    #[test]
    fn config_set_persists_and_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        bundlekeeper()
            .args(["config", "set", "fetch.base_url", "https://bundles.example.com"])
            .env("BUNDLEKEEPER_CONFIG", &path)
            .assert()
            .success();
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("https://bundles.example.com"));

        bundlekeeper()
            .args(["config", "set", "vm.name", "x"])
            .env("BUNDLEKEEPER_CONFIG", &path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration key"));

        bundlekeeper()
            .args(["config", "set", "update.max_concurrent_fetches", "0"])
            .env("BUNDLEKEEPER_CONFIG", &path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("at least 1"));
    }

    #[test]
    fn fetch_rejects_path_like_bundle_id() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        bundlekeeper()
            .args(["fetch", "../escaped", "--json"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .failure()
            .stdout(predicate::str::contains(r#""success":false"#))
            .stderr(predicate::str::contains("Invalid bundle id"));
        assert!(!temp.path().join("escaped@1.0.jar").exists());
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[update]\npoll_interval_secs = \"soon\"\n").unwrap();

        bundlekeeper()
            .args(["list"])
            .env("BUNDLEKEEPER_CONFIG", &path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        bundlekeeper()
            .args(["list", "--format", "json"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn list_skips_malformed_artifacts() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let download = temp.path().join("download");
        fs::create_dir_all(&download).unwrap();
        fs::write(download.join("maps@1.2.jar"), b"maps").unwrap();
        fs::write(download.join("chat@0.9.apk"), b"chat").unwrap();
        fs::write(download.join("bad.jar"), b"x").unwrap();
        fs::write(download.join("x@y@z.jar"), b"x").unwrap();

        bundlekeeper()
            .args(["list", "--format", "plain"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .success()
            .stdout(predicate::eq("chat@0.9\nmaps@1.2\n"));
    }

    #[test]
    fn fetch_seeds_from_bundled_asset() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let assets = temp.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("maps@1.0.apk"), b"seed").unwrap();

        bundlekeeper()
            .args(["fetch", "maps", "--json"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""from_cache":true"#))
            .stdout(predicate::str::contains(r#""version":"1.0""#));

        assert!(temp.path().join("download/maps@1.0.jar").exists());
    }

    #[test]
    fn fetch_without_repository_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        bundlekeeper()
            .args(["fetch", "maps", "--json"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .failure()
            .stdout(predicate::str::contains(r#""success":false"#))
            .stderr(predicate::str::contains("not configured"));
    }

    #[test]
    fn fetch_cached_update_reports_cache_hit() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        let download = temp.path().join("download");
        fs::create_dir_all(&download).unwrap();
        fs::write(download.join("maps@1.2.jar"), b"maps").unwrap();

        bundlekeeper()
            .args(["fetch", "maps", "-t", "update", "--json"])
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""from_cache":true"#));
    }

    #[test]
    fn status_runs() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        bundlekeeper()
            .arg("status")
            .env("BUNDLEKEEPER_CONFIG", &config)
            .assert()
            .success()
            .stdout(predicate::str::contains("Storage"));
    }
}
