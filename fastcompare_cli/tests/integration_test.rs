use filetime::{set_file_mtime, FileTime};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper struct to manage test directories and an isolated settings home
struct TestFixture {
    temp_dir: TempDir,
    left_dir: PathBuf,
    right_dir: PathBuf,
    home_dir: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let left_dir = temp_dir.path().join("left");
        let right_dir = temp_dir.path().join("right");
        let home_dir = temp_dir.path().join("home");

        fs::create_dir(&left_dir).expect("Failed to create left dir");
        fs::create_dir(&right_dir).expect("Failed to create right dir");
        fs::create_dir(&home_dir).expect("Failed to create home dir");

        TestFixture {
            temp_dir,
            left_dir,
            right_dir,
            home_dir,
        }
    }

    fn create_left_file<P: AsRef<Path>>(&self, path: P, content: &str) -> PathBuf {
        self.create_file(&self.left_dir, path, content)
    }

    fn create_right_file<P: AsRef<Path>>(&self, path: P, content: &str) -> PathBuf {
        self.create_file(&self.right_dir, path, content)
    }

    fn create_file<P: AsRef<Path>>(&self, base: &Path, path: P, content: &str) -> PathBuf {
        let file_path = base.join(path.as_ref());

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    fn create_right_dir<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let dir_path = self.right_dir.join(path.as_ref());
        fs::create_dir_all(&dir_path).expect("Failed to create directory");
        dir_path
    }

    fn left(&self) -> &str {
        self.left_dir.to_str().unwrap()
    }

    fn right(&self) -> &str {
        self.right_dir.to_str().unwrap()
    }

    fn out_dir(&self) -> PathBuf {
        self.temp_dir.path().join("patches")
    }

    /// Run the binary with settings confined to this fixture
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_fastcompare"))
            .args(args)
            .env("XDG_CONFIG_HOME", &self.home_dir)
            .env("APPDATA", &self.home_dir)
            .env("HOME", &self.home_dir)
            .env("RUST_LOG", "warn")
            .output()
            .expect("Failed to execute command")
    }

    fn run_json(&self, args: &[&str]) -> (i32, Value) {
        let mut full = args.to_vec();
        full.push("--json");
        let output = self.run(&full);
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8(output.stdout).expect("stdout not utf-8");
        let report = serde_json::from_str(&stdout).unwrap_or_else(|e| {
            panic!(
                "invalid json output: {e}\n{stdout}\n{}",
                String::from_utf8_lossy(&output.stderr)
            )
        });
        (code, report)
    }
}

fn report_paths(report: &Value) -> Vec<String> {
    report["paths"]
        .as_array()
        .expect("paths array missing")
        .iter()
        .map(|p| p.as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn test_identical_directories_exit_zero() {
    let fixture = TestFixture::new();
    fixture.create_left_file("file1.txt", "Hello, world!");
    fixture.create_right_file("file1.txt", "Hello, world!");
    fixture.create_left_file("nested/file2.txt", "Test content");
    fixture.create_right_file("nested/file2.txt", "Test content");

    let output = fixture.run(&["compare", fixture.left(), fixture.right(), "--no-date"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_changed_and_new_files_exit_two() {
    let fixture = TestFixture::new();
    fixture.create_left_file("same.txt", "same");
    fixture.create_right_file("same.txt", "same");
    fixture.create_left_file("changed.txt", "left");
    let changed = fixture.create_right_file("changed.txt", "rght");
    let added = fixture.create_right_file("added.txt", "new");
    fixture.create_left_file("only_left.txt", "ignored");

    let output = fixture.run(&["compare", fixture.left(), fixture.right(), "--no-date"]);

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines.contains(&changed.to_str().unwrap()));
    assert!(lines.contains(&added.to_str().unwrap()));
    assert!(!stdout.contains("only_left.txt"));
}

#[test]
fn test_json_report_for_meta_scenario() {
    let fixture = TestFixture::new();
    fixture.create_right_file("a.txt", "x");
    let b = fixture.create_right_file("b.txt", "y");
    fixture.create_right_file(".meta/skip.meta", "m");
    fixture.create_left_file("a.txt", "x");
    fixture.create_left_file("b.txt", "z");

    for strategy in ["normal", "bounded-flat"] {
        let (code, report) = fixture.run_json(&[
            "compare",
            fixture.left(),
            fixture.right(),
            "--no-date",
            "--exclude",
            ".meta",
            "--strategy",
            strategy,
        ]);

        assert_eq!(code, 2);
        assert_eq!(report["success"], true);
        assert_eq!(report_paths(&report), vec![b.to_str().unwrap().to_string()]);
        assert!(report["diagnostics"].as_array().unwrap().is_empty());
    }
}

#[test]
fn test_new_directory_reported_once() {
    let fixture = TestFixture::new();
    fixture.create_left_file("keep.txt", "k");
    fixture.create_right_file("keep.txt", "k");
    let new_dir = fixture.create_right_dir("fresh");
    fixture.create_right_file("fresh/inner/deep.txt", "d");
    fixture.create_right_file("fresh/top.txt", "t");

    let (code, report) = fixture.run_json(&["compare", fixture.left(), fixture.right(), "--no-date"]);

    assert_eq!(code, 2);
    assert_eq!(report_paths(&report), vec![new_dir.to_str().unwrap().to_string()]);
}

#[test]
fn test_missing_left_root_fails() {
    let fixture = TestFixture::new();
    fixture.create_right_file("a.txt", "a");
    let missing = fixture.left_dir.join("does_not_exist");

    let (code, report) = fixture.run_json(&["compare", missing.to_str().unwrap(), fixture.right()]);

    assert_eq!(code, 1);
    assert_eq!(report["success"], false);
    assert_eq!(report["summary"]["total"], 1);
    assert_eq!(report["diagnostics"].as_array().unwrap().len(), 1);
}

#[test]
fn test_sort_by_date_newest_first() {
    let fixture = TestFixture::new();
    let old = fixture.create_right_file("old.txt", "o");
    let new = fixture.create_right_file("new.txt", "n");
    set_file_mtime(&old, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    set_file_mtime(&new, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let (_, sorted) = fixture.run_json(&["compare", fixture.left(), fixture.right()]);
    assert_eq!(
        report_paths(&sorted),
        vec![new.to_str().unwrap().to_string(), old.to_str().unwrap().to_string()]
    );
}

#[test]
fn test_sync_date_makes_second_run_clean() {
    let fixture = TestFixture::new();
    let left = fixture.create_left_file("same.txt", "content");
    let right = fixture.create_right_file("same.txt", "content");
    set_file_mtime(&left, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    set_file_mtime(&right, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let first = fixture.run(&["compare", fixture.left(), fixture.right(), "--sync-date"]);
    assert_eq!(first.status.code(), Some(0));

    let synced = FileTime::from_last_modification_time(&fs::metadata(&right).unwrap());
    assert_eq!(synced, FileTime::from_unix_time(1_000_000_000, 0));

    let second = fixture.run(&["compare", fixture.left(), fixture.right(), "--sync-date"]);
    assert_eq!(second.status.code(), Some(0));
}

#[test]
fn test_patch_directory_mirrors_differences() {
    let fixture = TestFixture::new();
    fixture.create_left_file("same.txt", "same");
    fixture.create_right_file("same.txt", "same");
    fixture.create_right_file("sub/changed.txt", "new content");
    fixture.create_left_file("sub/changed.txt", "old content");
    fixture.create_right_file("sub/changed.txt.meta", "meta");

    let out = fixture.out_dir();
    let output = fixture.run(&[
        "patch",
        fixture.left(),
        fixture.right(),
        "--no-date",
        "--no-progress",
        "--out",
        out.to_str().unwrap(),
        "--label",
        "nightly",
        "--no-compress",
    ]);

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let patch_dir = PathBuf::from(stdout.trim());
    assert_eq!(patch_dir.parent(), Some(out.as_path()));
    assert!(patch_dir.to_str().unwrap().ends_with("_[nightly]"));

    assert_eq!(
        fs::read_to_string(patch_dir.join("sub/changed.txt")).unwrap(),
        "new content"
    );
    assert!(!patch_dir.join("same.txt").exists());
    assert!(!patch_dir.join("sub/changed.txt.meta").exists());
}

#[test]
fn test_patch_compressed_by_default() {
    let fixture = TestFixture::new();
    fixture.create_right_file("added.txt", "added");

    let out = fixture.out_dir();
    let output = fixture.run(&[
        "patch",
        fixture.left(),
        fixture.right(),
        "--no-progress",
        "--out",
        out.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), out.to_str().unwrap());

    let entries: Vec<PathBuf> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].extension().and_then(|e| e.to_str()), Some("zip"));
}

#[test]
fn test_patch_requires_output_directory() {
    let fixture = TestFixture::new();
    fixture.create_right_file("added.txt", "added");

    let output = fixture.run(&["patch", fixture.left(), fixture.right()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_saved_settings_are_reused() {
    let fixture = TestFixture::new();
    fixture.create_right_file("added.txt", "added");

    let saved = fixture.run(&[
        "compare",
        fixture.left(),
        fixture.right(),
        "--strategy",
        "bounded-flat",
        "--exclude",
        ".tmp|.bak",
        "--save",
    ]);
    assert_eq!(saved.status.code(), Some(2));

    let config = fixture.run(&["config"]);
    assert!(config.status.success());
    let stdout = String::from_utf8_lossy(&config.stdout);
    assert!(stdout.contains("fastcompare.toml"));
    assert!(stdout.contains("bounded_flat"));
    assert!(stdout.contains(".bak"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));

    // Roots now come from the saved settings
    let (code, report) = fixture.run_json(&["compare"]);
    assert_eq!(code, 2);
    assert_eq!(report["strategy"], "bounded_flat");
    assert_eq!(report_paths(&report).len(), 1);
}

#[test]
fn test_config_init_writes_defaults() {
    let fixture = TestFixture::new();

    let before = fixture.run(&["config"]);
    assert!(String::from_utf8_lossy(&before.stdout).contains("not created yet"));

    let init = fixture.run(&["config", "--init"]);
    assert!(init.status.success());
    let stdout = String::from_utf8_lossy(&init.stdout);
    assert!(stdout.contains("thread_limit = 120"));
    assert!(stdout.contains(".meta"));
}

#[test]
fn test_help_lists_subcommands() {
    let fixture = TestFixture::new();
    let output = fixture.run(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["compare", "patch", "config"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}
