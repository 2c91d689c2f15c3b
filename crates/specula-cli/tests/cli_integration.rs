//! Integration tests for the `specula` binary.
//!
//! Runs the built binary against `tests/fixtures` images.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn specula(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_specula"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("SPECULA_CONFIG")
        .env_remove("SPECULA_LOG")
        .output()
        .expect("failed to run specula")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn zoo() -> String {
    fixtures_dir().join("zoo.toml").display().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// browse
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_browse_text() {
    let output = specula(&["browse", &zoo(), "Zoo::Dog"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.starts_with("class Zoo::Dog < Animal"), "{}", text);
    assert!(text.contains("Zoo::Dog > Named > Animal > Object > Kernel > BasicObject"));
    assert!(text.contains("MAX_AGE = 30"));
    assert!(text.contains("@registry = \"kennel\""));
    assert!(text.contains("bark"));
    assert!(text.contains("/srv/zoo/lib/zoo/dog.rb:3"));
}

#[test]
fn test_browse_json() {
    let output = specula(&["browse", &zoo(), "Zoo::Dog", "--json"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    // The image overrides Dog.name; the mirror must not care
    assert_eq!(summary["name"], "Zoo::Dog");
    assert_eq!(summary["kind"], "class");
    assert_eq!(summary["superclass"], "Animal");
    assert_eq!(summary["mixins"], serde_json::json!(["Named", "Kernel"]));
    assert_eq!(summary["nesting"], serde_json::json!(["Zoo::Dog", "Zoo"]));
    assert_eq!(summary["instance_methods"][0]["name"], "bark");
    assert_eq!(summary["instance_methods"][2]["visibility"], "private");
    assert_eq!(summary["class_methods"][0]["name"], "breed");
    assert_eq!(summary["file"], "/srv/zoo/lib/zoo/dog.rb");
    assert_eq!(summary["package"], serde_json::Value::Null);
}

#[test]
fn test_browse_module_with_pending_autoload() {
    let output = specula(&["browse", &zoo(), "Zoo", "--json"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(summary["kind"], "module");
    assert_eq!(summary["superclass"], serde_json::Value::Null);
    assert_eq!(summary["nested_classes"], serde_json::json!(["Zoo::Cat", "Zoo::Dog"]));
    let aviary = summary["constants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "Aviary")
        .expect("Aviary listed");
    assert_eq!(aviary["value"], "(autoload)");
}

#[test]
fn test_browse_subclasses() {
    let output = specula(&["browse", &zoo(), "Animal", "--json"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(summary["subclasses"], serde_json::json!(["Zoo::Dog", "Zoo::Cat"]));
}

#[test]
fn test_browse_unknown_class() {
    let output = specula(&["browse", &zoo(), "Nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nope"));
}

#[test]
fn test_browse_missing_image() {
    let output = specula(&["browse", "/nonexistent/image.toml", "Dog"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading image"));
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_package_from_config_root() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        config,
        "[resolver]\nroots = [{{ path = \"/srv/zoo\", package = \"zoo-app\" }}]"
    )
    .unwrap();
    let config_path = config.path().display().to_string();

    let output = specula(&["browse", &zoo(), "Zoo::Dog", "--json", "--config", &config_path]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["package"], "zoo-app");
}

#[test]
fn test_package_from_config_namespace() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[resolver]\nnamespaces = {{ Zoo = \"zoo-core\" }}").unwrap();
    let config_path = config.path().display().to_string();

    // Cat has no methods, so only the namespace can attribute it
    let output = specula(&["browse", &zoo(), "Zoo::Cat", "--json", "--config", &config_path]);
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["file"], serde_json::Value::Null);
    assert_eq!(summary["package"], "zoo-core");
}

#[test]
fn test_invalid_config() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[output]\ncolor = \"sometimes\"").unwrap();
    let config_path = config.path().display().to_string();

    let output = specula(&["tree", &zoo(), "--config", &config_path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading config"));
}

// ────────────────────────────────────────────────────────────────────────────
// tree and info
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tree() {
    let output = specula(&["tree", &zoo()]);
    assert!(output.status.success());

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.contains(&"class  Animal < Object"));
    assert!(lines.contains(&"class  Zoo::Dog < Animal"));
    assert!(lines.contains(&"module Named"));
    assert!(lines.contains(&"class  BasicObject"));
    assert!(!text.contains("#<Class:"));

    let animal = lines.iter().position(|l| l.ends_with("Animal < Object")).unwrap();
    let dog = lines.iter().position(|l| l.contains("Zoo::Dog")).unwrap();
    assert!(animal < dog);
}

#[test]
fn test_info() {
    let output = specula(&["info"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains(&format!("Specula v{}", env!("CARGO_PKG_VERSION"))));
    assert!(text.contains("SPECULA_LOG"));
}
