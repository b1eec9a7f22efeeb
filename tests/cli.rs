use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_requires_a_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("shellarch")?;
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
    Ok(())
}

#[test]
fn test_cli_list_missing_archive_reports_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let missing = dir.path().join("absent.zip");

    let mut cmd = Command::cargo_bin("shellarch")?;
    cmd.arg("list").arg(&missing);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("not found")));
    Ok(())
}

#[test]
fn test_cli_rejects_out_of_range_level() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("shellarch")?;
    cmd.arg("compress")
        .arg("some_file.txt")
        .arg("--output")
        .arg("out.zip")
        .arg("--level")
        .arg("12");
    cmd.assert().failure().stderr(predicate::str::contains("12"));
    Ok(())
}

#[test]
fn test_cli_password_flags_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("shellarch")?;
    cmd.arg("compress")
        .arg("some_file.txt")
        .arg("--output")
        .arg("out.zip")
        .arg("--password")
        .arg("x")
        .arg("--ask-password");
    cmd.assert().failure().stderr(predicate::str::contains("cannot be used with"));
    Ok(())
}

#[cfg(unix)]
mod with_stub_tool {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    const STUB_7Z: &str = r#"#!/bin/sh
cmd="$1"
shift
case "$cmd" in
  a)
    out=""
    for arg in "$@"; do
      case "$arg" in
        -*) ;;
        *) if [ -z "$out" ]; then out="$arg"; fi ;;
      esac
    done
    echo ' 42%'
    printf 'stub archive' > "$out"
    ;;
  x)
    dest=""
    for arg in "$@"; do
      case "$arg" in
        -o*) dest="${arg#-o}" ;;
      esac
    done
    mkdir -p "$dest/docs"
    printf 'hello' > "$dest/docs/readme.md"
    ;;
  l)
    cat <<'EOF'
Path = docs
Folder = +

Path = docs/readme.md
Size = 5

Path = file1.txt
Size = 30
EOF
    ;;
esac
exit 0
"#;

    fn install_stub(dir: &Path, contents: &str) -> PathBuf {
        let stub = dir.join("7z");
        fs::write(&stub, contents).unwrap();
        let mut perms = fs::metadata(&stub).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&stub, perms).unwrap();
        stub
    }

    fn stub_path_env(dir: &Path) -> String {
        format!("{}:{}", dir.display(), std::env::var("PATH").unwrap_or_default())
    }

    #[test]
    fn test_cli_compress_list_extract_cycle() -> Result<(), Box<dyn std::error::Error>> {
        // 1. Setup: a stub 7z on PATH and a file to archive
        let tool_dir = tempdir()?;
        install_stub(tool_dir.path(), STUB_7Z);
        let path_env = stub_path_env(tool_dir.path());

        let source_dir = tempdir()?;
        let file1 = source_dir.path().join("file1.txt");
        fs::write(&file1, "Hello, this is the first file.")?;

        let archive_dir = tempdir()?;
        let archive_path = archive_dir.path().join("test_archive.zip");

        // 2. Create archive
        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env)
            .arg("compress")
            .arg(&file1)
            .arg("--output")
            .arg(&archive_path);
        cmd.assert().success().stdout(predicate::str::contains("Created"));
        assert!(archive_path.exists());

        // 3. List contents of the archive
        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env).arg("list").arg(&archive_path);
        cmd.assert().success().stdout(
            predicate::str::contains("docs/")
                .and(predicate::str::contains("readme.md (5 bytes)"))
                .and(predicate::str::contains("3 entries, 35 bytes")),
        );

        // 4. List as JSON
        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env).arg("list").arg(&archive_path).arg("--json");
        cmd.assert().success().stdout(
            predicate::str::contains("\"total_files\": 3")
                .and(predicate::str::contains("\"name\": \"docs\"")),
        );

        // 5. Extract into a new directory
        let extract_dir = tempdir()?;
        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env)
            .arg("extract")
            .arg(&archive_path)
            .arg("-o")
            .arg(extract_dir.path());
        cmd.assert().success().stdout(predicate::str::contains("extracted"));

        // 6. Verify delivered files
        assert_eq!(fs::read_to_string(extract_dir.path().join("docs/readme.md"))?, "hello");
        Ok(())
    }

    #[test]
    fn test_cli_picks_up_password_from_environment() -> Result<(), Box<dyn std::error::Error>> {
        let tool_dir = tempdir()?;
        install_stub(
            tool_dir.path(),
            "#!/bin/sh\ncase \"$*\" in\n  *-ppw*) exit 0 ;;\nesac\necho 'missing password flag' 1>&2\nexit 9\n",
        );
        let path_env = stub_path_env(tool_dir.path());

        let source_dir = tempdir()?;
        let file1 = source_dir.path().join("file1.txt");
        fs::write(&file1, "data")?;
        let archive_path = source_dir.path().join("locked.zip");

        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env)
            .env("SHELLARCH_PASSWORD", "pw")
            .arg("compress")
            .arg(&file1)
            .arg("--output")
            .arg(&archive_path);
        cmd.assert().success();

        // Without the variable the stub rejects the call.
        let mut cmd = Command::cargo_bin("shellarch")?;
        cmd.env("PATH", &path_env)
            .env_remove("SHELLARCH_PASSWORD")
            .arg("compress")
            .arg(&file1)
            .arg("--output")
            .arg(&archive_path);
        cmd.assert().failure().stderr(predicate::str::contains("Compression failed"));
        Ok(())
    }
}
