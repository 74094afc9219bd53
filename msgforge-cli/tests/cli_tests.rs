use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn msgforge_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("msgforge"))
}

fn project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("app")).unwrap();
    fs::create_dir_all(dir.path().join("resources/views")).unwrap();
    fs::write(
        dir.path().join("app/Controller.php"),
        "<?php\n$title = __('Hello');\n$files = n__('%d file', '%d files', $n);\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("resources/views/home.blade.php"),
        "<h1>{{ __('Hello') }}</h1>\n<a>{{ p__('nav', 'Home') }}</a>\n",
    )
    .unwrap();
    let config = dir.path().join("msgforge.toml");
    fs::write(&config, "locales = [\"en_US\", \"es\"]\n").unwrap();
    (dir, config)
}

fn run(config: &Path, args: &[&str]) -> Output {
    msgforge_cmd()
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn assert_success(output: &Output) -> String {
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn po_path(dir: &Path, locale: &str) -> PathBuf {
    dir.join("resources/gettext")
        .join(locale)
        .join("LC_MESSAGES/messages.po")
}

#[test]
fn test_scan_json_lists_extracted_messages() {
    let (_dir, config) = project();
    let stdout = assert_success(&run(&config, &["scan", "--json"]));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(v["domain"], "messages");
    assert_eq!(v["count"], 3);
    let messages = v["messages"].as_array().unwrap();
    let hello = messages.iter().find(|m| m["msgid"] == "Hello").unwrap();
    assert_eq!(hello["references"].as_array().unwrap().len(), 2);
    let files = messages.iter().find(|m| m["msgid"] == "%d file").unwrap();
    assert_eq!(files["msgid_plural"], "%d files");
    let home = messages.iter().find(|m| m["msgid"] == "Home").unwrap();
    assert_eq!(home["context"], "nav");
    assert_eq!(
        home["references"][0],
        "resources/views/home.blade.php:2"
    );
}

#[test]
fn test_refresh_writes_catalogs_for_every_locale() {
    let (dir, config) = project();
    let stdout = assert_success(&run(&config, &["refresh"]));
    assert!(stdout.contains("Extracted 3 messages"), "{stdout}");

    for locale in ["en_US", "es"] {
        let lc = dir
            .path()
            .join("resources/gettext")
            .join(locale)
            .join("LC_MESSAGES");
        for ext in ["po", "mo", "json"] {
            assert!(lc.join(format!("messages.{ext}")).is_file(), "{locale} {ext}");
        }
    }
}

#[test]
fn test_refresh_single_unknown_locale_fails() {
    let (_dir, config) = project();
    let output = run(&config, &["refresh", "--locale", "de"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "{stderr}");
}

#[test]
fn test_compile_then_lookup_uses_curated_translation() {
    let (dir, config) = project();
    assert_success(&run(&config, &["refresh", "--locale", "es"]));

    let po = po_path(dir.path(), "es");
    let text = fs::read_to_string(&po).unwrap();
    let edited = text.replace(
        "msgid \"Hello\"\nmsgstr \"\"",
        "msgid \"Hello\"\nmsgstr \"Hola\"",
    );
    assert_ne!(text, edited);
    fs::write(&po, edited).unwrap();

    assert_success(&run(&config, &["compile", "--locale", "es"]));

    let stdout = assert_success(&run(&config, &["lookup", "--locale", "es", "Hello"]));
    assert_eq!(stdout.trim(), "Hola");

    let stdout = assert_success(&run(
        &config,
        &["lookup", "--locale", "es", "--context", "nav", "Home"],
    ));
    assert_eq!(stdout.trim(), "Home");

    let stdout = assert_success(&run(
        &config,
        &[
            "lookup", "--locale", "es", "--count", "3", "--plural", "%d files", "%d file",
        ],
    ));
    assert_eq!(stdout.trim(), "%d files");
}

#[test]
fn test_compile_without_text_catalog_fails() {
    let (_dir, config) = project();
    let output = run(&config, &["compile", "--locale", "es"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no text catalog"));
}

#[test]
fn test_resolve_json() {
    let (_dir, config) = project();
    let stdout = assert_success(&run(
        &config,
        &["resolve", "--persisted", "es", "--override", "en_US", "--json"],
    ));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["tag"], "en_US");
    assert_eq!(v["should_persist"], true);

    let stdout = assert_success(&run(&config, &["resolve", "--persisted", "de"]));
    assert_eq!(stdout.trim(), "en_US");
}

#[test]
fn test_stats_json_reports_coverage() {
    let (dir, config) = project();
    assert_success(&run(&config, &["refresh"]));

    let po = po_path(dir.path(), "es");
    let text = fs::read_to_string(&po).unwrap();
    fs::write(
        &po,
        text.replace(
            "msgid \"Hello\"\nmsgstr \"\"",
            "msgid \"Hello\"\nmsgstr \"Hola\"",
        ),
    )
    .unwrap();

    let stdout = assert_success(&run(&config, &["stats", "--json"]));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["summary"]["locales"], 2);
    assert_eq!(v["summary"]["default"], "en_US");
    let locales = v["locales"].as_array().unwrap();
    let es = locales.iter().find(|l| l["locale"] == "es").unwrap();
    assert_eq!(es["total"], 3);
    assert_eq!(es["translated"], 1);
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(&dir.path().join("missing.toml"), &["scan"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading"));
}

#[test]
fn test_unknown_config_key_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("msgforge.toml");
    fs::write(&config, "locale = [\"es\"]\n").unwrap();
    let output = run(&config, &["stats"]);
    assert!(!output.status.success());
}
