use mipcache::project::{FolderRecord, LayerRecord, PatchRecord, ProjectManifest};
use mipcache::stale::{
    delete_alpha_masks, delete_coordinate_transforms, delete_stale, remove_stale_file,
    AlphaMaskPath, CoordinateTransformPath, FileRemover, Reconciler, RemoveError, SweepOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn touch(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A project with transforms under `<dir>/trakem2.ct` and masks under
/// `<dir>/trakem2.masks`, referencing the given file names.
fn project(dir: &Path, transforms: &[&str], masks: &[&str]) -> ProjectManifest {
    let ct = dir.join("trakem2.ct");
    let mk = dir.join("trakem2.masks");
    let mut patches = Vec::new();
    for (i, name) in transforms.iter().enumerate() {
        patches.push(PatchRecord::new(i as i64).with_coordinate_transform(ct.join(name)));
    }
    for (i, name) in masks.iter().enumerate() {
        patches.push(PatchRecord::new(100 + i as i64).with_alpha_mask(mk.join(name)));
    }
    ProjectManifest {
        folders: FolderRecord {
            coordinate_transforms: Some(ct),
            masks: Some(mk),
        },
        layers: vec![LayerRecord { id: 1, patches }],
    }
}

#[test]
fn test_sweep_only_removes_unreferenced_files() {
    let dir = TempDir::new().unwrap();
    let ct = dir.path().join("trakem2.ct");
    for name in ["A.ct", "B.ct", "C.ct", "D.txt"] {
        touch(&ct.join(name), b"ct");
    }
    let project = project(dir.path(), &["A.ct", "B.ct"], &[]);

    assert!(delete_coordinate_transforms(&project));

    assert!(ct.join("A.ct").exists());
    assert!(ct.join("B.ct").exists());
    assert!(!ct.join("C.ct").exists());
    assert!(ct.join("D.txt").exists());
}

#[test]
fn test_sweep_with_no_live_patches_removes_everything_matching() {
    let dir = TempDir::new().unwrap();
    let mk = dir.path().join("trakem2.masks");
    let stale: Vec<PathBuf> = (0..25)
        .map(|i| mk.join(format!("layer{}/mask{}.zip", i % 5, i)))
        .collect();
    for path in &stale {
        touch(path, b"zip");
    }
    touch(&mk.join("notes.txt"), b"keep");
    let project = project(dir.path(), &[], &[]);

    let report = Reconciler::new(SweepOptions::default().with_workers(4))
        .sweep_kind(&project, &AlphaMaskPath)
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.scheduled, 25);
    assert_eq!(report.deleted, 25);
    assert_eq!(report.bytes_freed, 75);
    assert!(report.drained);
    assert!(stale.iter().all(|p| !p.exists()));
    assert!(mk.join("notes.txt").exists());
}

#[test]
fn test_kinds_do_not_touch_each_other() {
    let dir = TempDir::new().unwrap();
    let ct = dir.path().join("trakem2.ct");
    let mk = dir.path().join("trakem2.masks");
    touch(&ct.join("live.ct"), b"1");
    touch(&ct.join("dead.ct"), b"1");
    touch(&ct.join("stray.zip"), b"1");
    touch(&mk.join("live.zip"), b"1");
    touch(&mk.join("dead.zip"), b"1");
    let project = project(dir.path(), &["live.ct"], &["live.zip"]);

    assert!(delete_alpha_masks(&project));
    assert!(ct.join("dead.ct").exists());
    assert!(ct.join("stray.zip").exists());
    assert!(!mk.join("dead.zip").exists());
    assert!(mk.join("live.zip").exists());

    assert!(delete_coordinate_transforms(&project));
    assert!(!ct.join("dead.ct").exists());
    assert!(ct.join("live.ct").exists());
}

#[test]
fn test_missing_or_unset_root_succeeds() {
    let dir = TempDir::new().unwrap();
    // Folders configured but never created
    let project = project(dir.path(), &["a.ct"], &["a.zip"]);
    assert!(delete_coordinate_transforms(&project));
    assert!(delete_alpha_masks(&project));

    assert!(delete_stale(
        &ProjectManifest::default(),
        None,
        &CoordinateTransformPath
    ));
}

#[test]
fn test_relative_references_match_absolute_walk() {
    let dir = TempDir::new().unwrap();
    let ct = dir.path().join("trakem2.ct");
    touch(&ct.join("keep.ct"), b"1");
    touch(&ct.join("drop.ct"), b"1");

    // Reference through a `.` component, which is normalized away
    let project = ProjectManifest {
        folders: FolderRecord {
            coordinate_transforms: Some(ct.clone()),
            masks: None,
        },
        layers: vec![LayerRecord {
            id: 1,
            patches: vec![PatchRecord::new(1).with_coordinate_transform(ct.join(".").join("keep.ct"))],
        }],
    };

    assert!(delete_coordinate_transforms(&project));
    assert!(ct.join("keep.ct").exists());
    assert!(!ct.join("drop.ct").exists());
}

/// Refuses one file, counts every call.
struct Flaky {
    refuse: &'static str,
    calls: AtomicUsize,
}

impl FileRemover for Flaky {
    fn remove(&self, root: &Path, path: &Path) -> Result<u64, RemoveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if path.file_name().is_some_and(|n| n == self.refuse) {
            return Err(RemoveError::PermissionDenied(path.to_path_buf()));
        }
        remove_stale_file(root, path)
    }
}

#[test]
fn test_failure_is_reported_and_others_still_removed() {
    let dir = TempDir::new().unwrap();
    let ct = dir.path().join("trakem2.ct");
    for i in 0..10 {
        touch(&ct.join(format!("{}.ct", i)), b"x");
    }
    let project = project(dir.path(), &["0.ct"], &[]);
    let remover = Arc::new(Flaky {
        refuse: "5.ct",
        calls: AtomicUsize::new(0),
    });

    let report = Reconciler::new(
        SweepOptions::default()
            .with_workers(3)
            .with_drain_timeout(Duration::from_secs(60)),
    )
    .with_remover(remover.clone())
    .sweep_kind(&project, &CoordinateTransformPath)
    .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 8);
    assert_eq!(report.kept, 1);
    assert_eq!(remover.calls.load(Ordering::SeqCst), 9);
    assert!(ct.join("0.ct").exists());
    assert!(ct.join("5.ct").exists());
    assert!(!ct.join("9.ct").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_is_not_followed() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    touch(&outside.path().join("precious.ct"), b"keep me");
    let ct = dir.path().join("trakem2.ct");
    fs::create_dir_all(&ct).unwrap();
    std::os::unix::fs::symlink(outside.path(), ct.join("elsewhere")).unwrap();
    let project = project(dir.path(), &[], &[]);

    assert!(delete_coordinate_transforms(&project));
    assert!(outside.path().join("precious.ct").exists());
}
