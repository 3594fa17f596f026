use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn load_json_fixture<T: DeserializeOwned>(relative: &str) -> T {
    let content = load_fixture(relative);
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse JSON fixture {}: {}", relative, e))
}

/// Write an executable shell script standing in for the subfinder binary.
///
/// The script records its arguments in `args.txt` next to itself, finds the
/// `-o` output path and then runs `body`, which can use `$out`.
#[cfg(unix)]
pub fn write_fake_subfinder(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script_path = dir.join("fake-subfinder");
    let args_path = dir.join("args.txt");
    let script = format!(
        r#"#!/bin/sh
echo "$*" > "{args}"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  shift
done
{body}
"#,
        args = args_path.display(),
        body = body
    );

    std::fs::write(&script_path, script).expect("write fake subfinder");
    let mut perms = std::fs::metadata(&script_path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script_path, perms).expect("chmod script");
    script_path
}

/// Arguments recorded by the last run of a fake subfinder in `dir`
pub fn recorded_args(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("args.txt"))
        .unwrap_or_default()
        .trim()
        .to_string()
}
