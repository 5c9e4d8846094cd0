//! Synchronizer decisions against an in-memory backend.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use autobuild_core::{BranchName, Fingerprint};
use autobuild_vcs::remote::ProbeError;
use autobuild_vcs::{
    fingerprint, sync, CheckoutState, RemoteProbe, SyncOutcome, SyncTarget, Synchronizer, Vcs,
    VcsError,
};
use tempfile::TempDir;

const URL: &str = "https://example.com/game/server.git";

#[derive(Default)]
struct FakeVcs {
    calls: RefCell<Vec<String>>,
    checkouts: RefCell<HashSet<PathBuf>>,
    origin: Option<String>,
    fail_fetch: bool,
}

impl FakeVcs {
    fn with_origin(origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            ..Default::default()
        }
    }

    fn adopt(&self, path: &Path) {
        fs::create_dir_all(path).unwrap();
        self.checkouts.borrow_mut().insert(path.to_path_buf());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Vcs for FakeVcs {
    fn clone_repo(
        &self,
        _url: &str,
        dest: &Path,
        branch: &BranchName,
        recurse_submodules: bool,
    ) -> Result<(), VcsError> {
        assert!(!dest.exists(), "clone target must be cleared first");
        self.calls
            .borrow_mut()
            .push(format!("clone {branch} recurse={recurse_submodules}"));
        self.adopt(dest);
        Ok(())
    }

    fn is_valid_checkout(&self, path: &Path) -> bool {
        self.checkouts.borrow().contains(path)
    }

    fn origin_url(&self, _path: &Path) -> Result<Option<String>, VcsError> {
        Ok(self.origin.clone())
    }

    fn fetch(&self, _path: &Path, remote: &str) -> Result<(), VcsError> {
        self.calls.borrow_mut().push(format!("fetch {remote}"));
        if self.fail_fetch {
            return Err(VcsError::Command {
                command: "git fetch origin".into(),
                status: "exit status: 128".into(),
                stderr: "fatal: unable to access".into(),
            });
        }
        Ok(())
    }

    fn checkout(&self, _path: &Path, reference: &str) -> Result<(), VcsError> {
        self.calls.borrow_mut().push(format!("checkout {reference}"));
        Ok(())
    }

    fn update_submodules(&self, _path: &Path) -> Result<(), VcsError> {
        self.calls.borrow_mut().push("submodules".into());
        Ok(())
    }

    fn head_fingerprint(&self, _path: &Path) -> Result<Fingerprint, VcsError> {
        Ok(Fingerprint::new("c1", "a", "init"))
    }

    fn list_remote_branches(&self, _url: &str) -> Result<Vec<String>, VcsError> {
        Ok(vec!["master".into()])
    }
}

struct StaticProbe(Option<&'static str>);

impl RemoteProbe for StaticProbe {
    fn latest_summary(&self, _branch: &BranchName) -> Result<String, ProbeError> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| ProbeError::Http("connection refused".into()))
    }
}

fn target<'a>(path: &'a Path, branch: &'a BranchName, recurse: bool) -> SyncTarget<'a> {
    SyncTarget {
        url: URL,
        branch,
        path,
        recurse_submodules: recurse,
    }
}

#[test]
fn absent_working_copy_is_cloned() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("nested").join("CurrentRepository");
    let vcs = FakeVcs::with_origin(URL);
    let branch = BranchName::from("master");

    let state = sync::inspect(&vcs, &path, URL).unwrap();
    assert_eq!(state, CheckoutState::Absent);

    let outcome = Synchronizer::new(&vcs)
        .synchronize(&target(&path, &branch, true), &state, None)
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Cloned);
    assert_eq!(vcs.calls(), vec!["clone master recurse=true"]);
    assert!(path.is_dir());
}

#[test]
fn foreign_directory_is_deleted_then_cloned() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    fs::create_dir_all(path.join("junk")).unwrap();
    fs::write(path.join("junk").join("half-downloaded.pack"), "x").unwrap();
    let vcs = FakeVcs::with_origin(URL);
    let branch = BranchName::from("master");

    let state = sync::inspect(&vcs, &path, URL).unwrap();
    assert!(matches!(state, CheckoutState::Foreign { .. }));

    let outcome = Synchronizer::new(&vcs)
        .synchronize(&target(&path, &branch, false), &state, None)
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Cloned);
    assert!(!path.join("junk").exists(), "stale content must be removed");
}

#[test]
fn checkout_of_another_repository_is_foreign() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    let vcs = FakeVcs::with_origin("https://example.com/someone/else.git");
    vcs.adopt(&path);

    let state = sync::inspect(&vcs, &path, URL).unwrap();
    match state {
        CheckoutState::Foreign { reason } => assert!(reason.contains("someone/else")),
        other => panic!("expected foreign, got {other:?}"),
    }
}

#[test]
fn valid_working_copy_fetches_and_checks_out_remote_ref() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    let vcs = FakeVcs::with_origin(&format!("{URL}/"));
    vcs.adopt(&path);
    let branch = BranchName::from("indev");

    let state = sync::inspect(&vcs, &path, URL).unwrap();
    assert_eq!(state, CheckoutState::Valid);

    let outcome = Synchronizer::new(&vcs)
        .synchronize(&target(&path, &branch, true), &state, None)
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Fetched);
    assert_eq!(
        vcs.calls(),
        vec!["fetch origin", "checkout origin/indev", "submodules"]
    );
}

#[test]
fn fetch_failure_propagates_without_checkout() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    let vcs = FakeVcs {
        fail_fetch: true,
        ..FakeVcs::with_origin(URL)
    };
    vcs.adopt(&path);
    let branch = BranchName::from("master");

    let err = Synchronizer::new(&vcs)
        .synchronize(&target(&path, &branch, false), &CheckoutState::Valid, None)
        .unwrap_err();
    assert!(matches!(err, VcsError::Command { .. }), "got: {err}");
    assert_eq!(vcs.calls(), vec!["fetch origin"]);
}

#[test]
fn matching_probe_skips_all_vcs_traffic() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    let vcs = FakeVcs::with_origin(URL);
    vcs.adopt(&path);
    let branch = BranchName::from("master");
    let probe = StaticProbe(Some("init"));
    let baseline = Fingerprint::new("c1", "a", "init");

    let outcome = Synchronizer::new(&vcs)
        .with_probe(&probe)
        .synchronize(&target(&path, &branch, false), &CheckoutState::Valid, Some(&baseline))
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Skipped);
    assert!(vcs.calls().is_empty());
}

#[test]
fn failing_probe_assumes_changed() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("CurrentRepository");
    let vcs = FakeVcs::with_origin(URL);
    vcs.adopt(&path);
    let branch = BranchName::from("master");
    let probe = StaticProbe(None);
    let baseline = Fingerprint::new("c1", "a", "init");

    let outcome = Synchronizer::new(&vcs)
        .with_probe(&probe)
        .synchronize(&target(&path, &branch, false), &CheckoutState::Valid, Some(&baseline))
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Fetched);
}

#[test]
fn resolver_returns_none_for_missing_or_foreign_paths() {
    let root = TempDir::new().unwrap();
    let vcs = FakeVcs::with_origin(URL);
    let missing = root.path().join("missing");
    assert!(fingerprint::resolve(&vcs, &missing).is_none());

    let plain = root.path().join("plain");
    fs::create_dir_all(&plain).unwrap();
    assert!(fingerprint::resolve(&vcs, &plain).is_none());

    vcs.adopt(&plain);
    assert_eq!(
        fingerprint::resolve(&vcs, &plain),
        Some(Fingerprint::new("c1", "a", "init"))
    );
}
