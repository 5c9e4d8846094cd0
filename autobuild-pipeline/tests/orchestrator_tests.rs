//! End-to-end runs of the state machine against in-memory VCS and build
//! backends over a real scratch directory.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use autobuild_builder::{BuildBackend, BuildError, StepExit};
use autobuild_core::{BranchName, BuildDescriptor, Fingerprint, PublishMode, Settings, SettingsFile};
use autobuild_pipeline::state;
use autobuild_pipeline::{ErrorKind, Orchestrator, PipelineError, RebuildReason, RunReport, Stage};
use autobuild_vcs::{Vcs, VcsError};
use tempfile::TempDir;

const TEMPLATE: &str = "{\n  \"gameId\": 0\n}\n";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// A remote with a movable tip. Clone and fetch+checkout copy the tip into
/// the local checkout, which is marked on disk by a `.git` directory.
struct FakeRemote {
    url: String,
    tip: RefCell<Fingerprint>,
    local: RefCell<Option<Fingerprint>>,
    fetched: RefCell<Option<Fingerprint>>,
    fail_fetch: Cell<bool>,
    clones: Cell<u32>,
    fetches: Cell<u32>,
}

impl FakeRemote {
    fn new(url: &str, tip: Fingerprint) -> Self {
        Self {
            url: url.to_string(),
            tip: RefCell::new(tip),
            local: RefCell::new(None),
            fetched: RefCell::new(None),
            fail_fetch: Cell::new(false),
            clones: Cell::new(0),
            fetches: Cell::new(0),
        }
    }

    fn push(&self, tip: Fingerprint) {
        *self.tip.borrow_mut() = tip;
    }
}

impl Vcs for FakeRemote {
    fn clone_repo(
        &self,
        _url: &str,
        dest: &Path,
        _branch: &BranchName,
        _recurse_submodules: bool,
    ) -> Result<(), VcsError> {
        self.clones.set(self.clones.get() + 1);
        fs::create_dir_all(dest.join(".git")).unwrap();
        fs::write(dest.join("GameServer.sln"), "sln").unwrap();
        let settings = dest.join("GameServerApp/Settings");
        fs::create_dir_all(&settings).unwrap();
        fs::write(settings.join("GameInfo.json.template"), TEMPLATE).unwrap();
        *self.local.borrow_mut() = Some(self.tip.borrow().clone());
        Ok(())
    }

    fn is_valid_checkout(&self, path: &Path) -> bool {
        path.join(".git").is_dir()
    }

    fn origin_url(&self, _path: &Path) -> Result<Option<String>, VcsError> {
        Ok(Some(self.url.clone()))
    }

    fn fetch(&self, _path: &Path, _remote: &str) -> Result<(), VcsError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail_fetch.get() {
            return Err(VcsError::Command {
                command: "git fetch origin".into(),
                status: "exit status: 128".into(),
                stderr: "fatal: unable to access remote".into(),
            });
        }
        *self.fetched.borrow_mut() = Some(self.tip.borrow().clone());
        Ok(())
    }

    fn checkout(&self, _path: &Path, _reference: &str) -> Result<(), VcsError> {
        if let Some(fetched) = self.fetched.borrow().clone() {
            *self.local.borrow_mut() = Some(fetched);
        }
        Ok(())
    }

    fn update_submodules(&self, _path: &Path) -> Result<(), VcsError> {
        Ok(())
    }

    fn head_fingerprint(&self, path: &Path) -> Result<Fingerprint, VcsError> {
        self.local.borrow().clone().ok_or_else(|| VcsError::NoHead {
            path: path.to_path_buf(),
        })
    }

    fn list_remote_branches(&self, _url: &str) -> Result<Vec<String>, VcsError> {
        Ok(vec!["master".into()])
    }
}

/// Writes `<tag>.dll` into the output directory. With `write_nothing` set
/// the build still exits 0 but produces no files.
struct FakeBuilder {
    output_dir: PathBuf,
    tag: RefCell<String>,
    fail_build: Cell<bool>,
    write_nothing: Cell<bool>,
    restores: Cell<u32>,
    builds: Cell<u32>,
}

impl FakeBuilder {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            tag: RefCell::new("c1".into()),
            fail_build: Cell::new(false),
            write_nothing: Cell::new(false),
            restores: Cell::new(0),
            builds: Cell::new(0),
        }
    }

    fn invocations(&self) -> u32 {
        self.restores.get() + self.builds.get()
    }
}

impl BuildBackend for FakeBuilder {
    fn restore(&self, _descriptor: &BuildDescriptor) -> Result<StepExit, BuildError> {
        self.restores.set(self.restores.get() + 1);
        Ok(StepExit { code: Some(0) })
    }

    fn build(&self, _descriptor: &BuildDescriptor) -> Result<StepExit, BuildError> {
        self.builds.set(self.builds.get() + 1);
        if self.fail_build.get() {
            return Ok(StepExit { code: Some(1) });
        }
        if self.write_nothing.get() {
            return Ok(StepExit { code: Some(0) });
        }
        fs::create_dir_all(&self.output_dir).unwrap();
        let tag = self.tag.borrow();
        fs::write(self.output_dir.join(format!("{tag}.dll")), tag.as_str()).unwrap();
        fs::write(self.output_dir.join("GameServerApp.dll"), tag.as_str()).unwrap();
        Ok(StepExit { code: Some(0) })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _tmp: TempDir,
    settings: Settings,
    remote: FakeRemote,
    builder: FakeBuilder,
}

impl Harness {
    fn new(file: SettingsFile) -> Self {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::resolve(tmp.path().to_path_buf(), file).unwrap();
        let remote = FakeRemote::new(&settings.repository, init());
        let builder = FakeBuilder::new(settings.build_output_dir());
        Self {
            _tmp: tmp,
            settings,
            remote,
            builder,
        }
    }

    fn run(&self) -> Result<RunReport, PipelineError> {
        Orchestrator::new(&self.settings, &self.remote, &self.builder).run()
    }

    fn public(&self) -> PathBuf {
        self.settings.publish_path()
    }

    fn published_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(&self.public(), &self.public(), &mut out);
        out.sort();
        out
    }

    /// Simulate a new commit upstream, and the output it will build into.
    fn push(&self, tip: Fingerprint) {
        *self.builder.tag.borrow_mut() = tip.commit_id.clone();
        self.remote.push(tip);
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).unwrap();
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

fn init() -> Fingerprint {
    Fingerprint::new("c1", "a <a@example.com>", "init")
}

fn fix_bug() -> Fingerprint {
    Fingerprint::new("c2", "b <b@example.com>", "fix bug")
}

/// Snapshot of every file under `dir` with its contents.
fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    collect(dir, dir, &mut files);
    files.sort();
    files
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(dir.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn absent_working_copy_is_cloned_built_and_published() {
    let h = Harness::new(SettingsFile::default());

    let report = h.run().expect("run");
    assert_eq!(
        report.stages,
        vec![
            Stage::Start,
            Stage::Invalid,
            Stage::Cloned,
            Stage::RebuildNeeded,
            Stage::Built,
            Stage::Published,
            Stage::Done,
        ]
    );
    assert_eq!(report.rebuild, Some(RebuildReason::FreshClone));
    assert_eq!(report.after, init());
    assert_eq!(
        h.published_files(),
        vec!["GameServerApp.dll", "Settings/GameInfo.json", "c1.dll"]
    );
    let config = fs::read_to_string(h.public().join("Settings/GameInfo.json")).unwrap();
    assert_eq!(config, TEMPLATE);

    let record = state::load_at(&h.settings.state_path()).unwrap().unwrap();
    assert_eq!(record.published, Some(init()));
    assert_eq!(record.runs, 1);
}

#[test]
fn new_commit_is_rebuilt_once_then_up_to_date() {
    let h = Harness::new(SettingsFile::default());
    h.run().expect("first run");
    let first_invocations = h.builder.invocations();

    h.push(fix_bug());
    let report = h.run().expect("second run");
    assert_eq!(
        report.stages,
        vec![
            Stage::Start,
            Stage::Valid,
            Stage::Fetched,
            Stage::RebuildNeeded,
            Stage::Built,
            Stage::Published,
            Stage::Done,
        ]
    );
    assert_eq!(report.before, Some(init()));
    assert_eq!(report.after, fix_bug());
    assert_eq!(report.rebuild, Some(RebuildReason::FingerprintChanged));
    assert_eq!(
        h.published_files(),
        vec!["GameServerApp.dll", "Settings/GameInfo.json", "c2.dll"],
        "no file from the c1 build may survive"
    );

    let after_rebuild = h.builder.invocations();
    assert_eq!(after_rebuild, first_invocations + 2);

    let report = h.run().expect("third run");
    assert_eq!(
        report.stages,
        vec![Stage::Start, Stage::Valid, Stage::Fetched, Stage::UpToDate, Stage::Done]
    );
    assert_eq!(h.builder.invocations(), after_rebuild, "no restore or build");
    assert!(report.publish.is_none());
}

#[test]
fn idempotent_second_run_does_not_touch_publish() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    let before = snapshot(&h.public());
    let state_before = fs::read(h.settings.state_path()).unwrap();

    let report = h.run().unwrap();
    assert!(report.visited(Stage::UpToDate));
    assert!(!report.visited(Stage::Published));
    assert_eq!(snapshot(&h.public()), before);
    assert_eq!(fs::read(h.settings.state_path()).unwrap(), state_before);
}

#[test]
fn force_publish_copies_without_building() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    fs::remove_dir_all(h.public()).unwrap();
    let invocations = h.builder.invocations();

    let forced = Harness {
        settings: Settings {
            force_publish: true,
            ..h.settings.clone()
        },
        ..h
    };
    let report = forced.run().unwrap();
    assert_eq!(
        report.stages,
        vec![
            Stage::Start,
            Stage::Valid,
            Stage::Fetched,
            Stage::UpToDate,
            Stage::Published,
            Stage::Done,
        ]
    );
    assert_eq!(forced.builder.invocations(), invocations);
    assert!(forced.public().join("c1.dll").is_file());
    let record = state::load_at(&forced.settings.state_path()).unwrap().unwrap();
    assert_eq!(record.runs, 2);
}

#[test]
fn force_config_rewrites_only_the_config() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    let dll_before = fs::read(h.public().join("c1.dll")).unwrap();

    let forced = Harness {
        settings: Settings {
            force_config: true,
            config_json: Some("{\"gameId\":7}".into()),
            ..h.settings.clone()
        },
        ..h
    };
    let report = forced.run().unwrap();
    assert_eq!(
        report.stages,
        vec![
            Stage::Start,
            Stage::Valid,
            Stage::Fetched,
            Stage::UpToDate,
            Stage::ConfigRefreshed,
            Stage::Done,
        ]
    );
    assert_eq!(fs::read(forced.public().join("c1.dll")).unwrap(), dll_before);
    assert_eq!(
        fs::read_to_string(forced.public().join("Settings/GameInfo.json")).unwrap(),
        "{\"gameId\":7}"
    );
}

#[test]
fn build_failure_leaves_publish_byte_identical_and_is_retried() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    let published = snapshot(&h.public());

    h.push(fix_bug());
    h.builder.fail_build.set(true);
    let err = h.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    assert_eq!(snapshot(&h.public()), published);
    let record = state::load_at(&h.settings.state_path()).unwrap().unwrap();
    assert_eq!(record.published, Some(init()), "record must not advance");

    // The working copy is already at c2, so only the record shows the gap.
    h.builder.fail_build.set(false);
    let report = h.run().unwrap();
    assert_eq!(report.before, Some(fix_bug()));
    assert_eq!(report.rebuild, Some(RebuildReason::PublishBehind));
    assert!(h.public().join("c2.dll").is_file());
}

#[test]
fn previous_output_is_not_republished_when_build_writes_nothing() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    let published = snapshot(&h.public());

    h.push(fix_bug());
    h.builder.write_nothing.set(true);
    let err = h.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(
        matches!(err, PipelineError::Build(BuildError::EmptyOutput { .. })),
        "got: {err}"
    );
    assert_eq!(snapshot(&h.public()), published);
    let record = state::load_at(&h.settings.state_path()).unwrap().unwrap();
    assert_eq!(record.published, Some(init()));
}

#[test]
fn fetch_failure_is_fatal_before_build() {
    let h = Harness::new(SettingsFile::default());
    h.run().unwrap();
    let published = snapshot(&h.public());
    let invocations = h.builder.invocations();

    h.push(fix_bug());
    h.remote.fail_fetch.set(true);
    let fetches = h.remote.fetches.get();
    let err = h.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Synchronization);
    assert_eq!(h.remote.fetches.get(), fetches + 1);
    assert_eq!(h.builder.invocations(), invocations);
    assert_eq!(snapshot(&h.public()), published);
}

#[test]
fn foreign_directory_is_replaced_by_clone() {
    let h = Harness::new(SettingsFile::default());
    let working_copy = h.settings.working_copy();
    fs::create_dir_all(&working_copy).unwrap();
    fs::write(working_copy.join("stray.txt"), "left over").unwrap();

    let report = h.run().unwrap();
    assert_eq!(&report.stages[..3], &[Stage::Start, Stage::Invalid, Stage::Cloned]);
    assert!(!working_copy.join("stray.txt").exists());
    assert_eq!(h.remote.clones.get(), 1);
}

#[test]
fn in_place_mode_publishes_literal_config() {
    let h = Harness::new(SettingsFile {
        publish_mode: Some(PublishMode::InPlace),
        config_json: Some("{\"players\":[]}".into()),
        ..SettingsFile::default()
    });
    let report = h.run().unwrap();
    assert_eq!(report.publish.as_ref().unwrap().mode, PublishMode::InPlace);
    assert_eq!(
        fs::read_to_string(h.public().join("Settings/GameInfo.json")).unwrap(),
        "{\"players\":[]}"
    );
}

#[test]
fn unreadable_state_record_stops_the_run() {
    let h = Harness::new(SettingsFile::default());
    let path = h.settings.state_path();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ truncated").unwrap();

    let err = h.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(h.remote.clones.get(), 0);
    assert_eq!(h.builder.invocations(), 0);
}
