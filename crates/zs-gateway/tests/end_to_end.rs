// end_to_end.rs — Integration tests driving the storage service the way a
// host would: one service, several callers, every zone.
//
// Covered here:
//
//   1. Write a CSV to Storage and count its lines with `wc -l`
//   2. Shells are refused as commands; shell syntax in file content is just text
//   3. Blacklisted commands and remote git subcommands fail in every zone
//   4. Traversal attempts never produce a path outside the zone
//   5. Quota rejections leave no partial file (and no commit)
//   6. N Documents mutations produce exactly N commits
//   7. Safe edit: save round-trip, cancel restores the original byte-for-byte
//   8. Locks block other conversations until they expire (simulated clock)
//   9. Upload → import → bridge → versioned document → move back out
//  10. The audit log records every operation with an intact hash chain
//  11. Symlink chains with `..` steps cannot climb out of the zone
//  12. A `.git` planted inside a zone is never treated as a repository
//
// Tests that spawn programs (`wc`, `git`) return early when the program is
// not installed.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use zs_audit::{AuditLog, AuditOutcome};
use zs_gateway::{
    Caller, ErrorCode, ExecParams, ImportRequest, ManualClock, Request, StorageConfig,
    StorageService, UploadedFile, Zone,
};
use zs_versioned::{CommitIdentity, GitRepo};

fn has(program: &str) -> bool {
    which::which(program).is_ok()
}

fn service(root: &Path) -> StorageService {
    StorageService::new(StorageConfig::new(root).without_audit()).unwrap()
}

fn commit_count(root: &Path, user: &str) -> usize {
    let zone = root.join(user).join("Documents");
    let repo = zone.join("repo.git");
    if !repo.join("HEAD").exists() {
        return 0;
    }
    GitRepo::new(zone.join("data"), repo, CommitIdentity::default())
        .commit_count()
        .unwrap()
}

#[test]
fn csv_line_count_in_storage() {
    if !has("wc") {
        return;
    }
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");

    let env = service.write(
        &caller,
        Zone::Storage,
        "data/sample.csv",
        "id,product\n1,Keyboard\n",
        false,
        None,
    );
    assert!(env.success, "{:?}", env);

    let env = service.exec(&caller, Zone::Storage, &ExecParams::new("wc", ["-l", "data/sample.csv"]));
    assert!(env.success, "{:?}", env);
    let data = env.data.unwrap();
    assert_eq!(data["exit_code"], 0);
    let stdout = data["stdout"].as_str().unwrap();
    assert_eq!(stdout.split_whitespace().next(), Some("2"));
}

#[test]
fn shells_are_commands_not_content() {
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");

    let env = service.exec(&caller, Zone::Storage, &ExecParams::new("bash", ["-c", "id"]));
    assert!(!env.success);
    assert_eq!(env.code(), Some(ErrorCode::CommandForbidden));
    assert!(env.data.is_none());

    let body = "echo hi; rm -rf /\n$(reboot) `id` | tee x && true\n";
    let env = service.write(&caller, Zone::Storage, "notes/script.txt", body, false, None);
    assert!(env.success, "{:?}", env);
    assert_eq!(
        fs::read_to_string(dir.path().join("alice/Storage/data/notes/script.txt")).unwrap(),
        body
    );
}

#[test]
fn blacklist_and_remote_git_denied_everywhere() {
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");

    for zone in Zone::ALL {
        for command in ["bash", "sh", "python3", "curl", "sudo", "dd", "kill"] {
            let env = service.exec(&caller, zone, &ExecParams::new(command, ["--version"]));
            assert_eq!(
                env.code(),
                Some(ErrorCode::CommandForbidden),
                "{} in {}",
                command,
                zone
            );
        }
        for sub in ["push", "pull", "fetch", "clone", "remote", "gc", "prune", "filter-branch"] {
            let env = service.exec(&caller, zone, &ExecParams::new("git", [sub, "origin"]));
            assert_eq!(
                env.code(),
                Some(ErrorCode::CommandForbidden),
                "git {} in {}",
                sub,
                zone
            );
        }
    }
}

#[test]
fn traversal_never_leaves_the_zone() {
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");
    let storage_root = dir.path().join("alice/Storage/data");

    let attempts = [
        "../x",
        "../../bob/Storage/data/x",
        "a/../../x",
        "a/b/../../../x",
        "/etc/passwd",
        "..%2f..%2fx",
        "%2e%2e/x",
        "a/./../b/../../x",
        "a/b/../c/./d.txt",
        "a/../b.txt",
    ];
    for attempt in attempts {
        let env = service.write(&caller, Zone::Storage, attempt, "x", false, None);
        if env.success {
            let written = env.data.unwrap()["path"].as_str().unwrap().to_string();
            let on_disk = storage_root.join(&written).canonicalize().unwrap();
            assert!(
                on_disk.starts_with(storage_root.canonicalize().unwrap()),
                "{} landed at {}",
                attempt,
                on_disk.display()
            );
        } else {
            assert_eq!(env.code(), Some(ErrorCode::PathEscape), "{}", attempt);
        }
    }
    assert!(!dir.path().join("alice/Storage/x").exists());
    assert!(!dir.path().join("alice/x").exists());
    assert!(!dir.path().join("bob").exists());

    #[cfg(unix)]
    {
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), storage_root.join("link")).unwrap();
        let env = service.write(&caller, Zone::Storage, "link/owned.txt", "x", false, None);
        assert_eq!(env.code(), Some(ErrorCode::PathEscape));
        assert!(!outside.path().join("owned.txt").exists());
    }
}

#[test]
fn quota_rejection_leaves_nothing_behind() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path()).without_audit().with_quota_mb(1);
    let service = StorageService::new(config).unwrap();
    let caller = Caller::new("alice", "conv-1");

    let almost_full = "x".repeat(1024 * 1024 - 10);
    assert!(service.write(&caller, Zone::Storage, "big.txt", &almost_full, false, None).success);

    let env = service.write(&caller, Zone::Storage, "more.txt", &"y".repeat(100), false, None);
    assert_eq!(env.code(), Some(ErrorCode::QuotaExceeded));
    assert!(env.details.unwrap().get("used_mb").is_some());
    assert!(env.hint.is_some());
    assert!(!dir.path().join("alice/Storage/data/more.txt").exists());

    let env = service.write(&caller, Zone::Storage, "big.txt", &"z".repeat(100), true, None);
    assert_eq!(env.code(), Some(ErrorCode::QuotaExceeded));
    assert_eq!(
        fs::metadata(dir.path().join("alice/Storage/data/big.txt")).unwrap().len(),
        almost_full.len() as u64
    );

    if has("git") {
        let before = commit_count(dir.path(), "alice");
        let env = service.write(&caller, Zone::Documents, "d.txt", &"y".repeat(100), false, None);
        assert_eq!(env.code(), Some(ErrorCode::QuotaExceeded));
        assert_eq!(commit_count(dir.path(), "alice"), before);
        assert!(!dir.path().join("alice/Documents/data/d.txt").exists());
    }
}

#[test]
fn one_commit_per_documents_mutation() {
    if !has("git") {
        return;
    }
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");

    let ops: Vec<Request> = vec![
        Request::Write {
            zone: Zone::Documents,
            path: "report.md".to_string(),
            content: "# Report\n".to_string(),
            append: false,
            message: None,
        },
        Request::Write {
            zone: Zone::Documents,
            path: "report.md".to_string(),
            content: "more\n".to_string(),
            append: true,
            message: Some("Add a line".to_string()),
        },
        Request::Rename {
            zone: Zone::Documents,
            from: "report.md".to_string(),
            to: "final/report.md".to_string(),
            message: None,
        },
        Request::Write {
            zone: Zone::Documents,
            path: "scratch.txt".to_string(),
            content: "tmp".to_string(),
            append: false,
            message: None,
        },
        Request::Delete {
            zone: Zone::Documents,
            path: "scratch.txt".to_string(),
            message: None,
        },
    ];
    let mut commits = Vec::new();
    for op in &ops {
        let env = service.handle(&caller, op);
        assert!(env.success, "{:?} -> {:?}", op, env);
        commits.push(env.data.unwrap()["commit"].as_str().unwrap().to_string());
    }
    assert_eq!(commit_count(dir.path(), "alice"), ops.len());
    commits.dedup();
    assert_eq!(commits.len(), ops.len());

    // A refused operation adds nothing.
    let env = service.delete(&caller, Zone::Documents, "scratch.txt", None);
    assert_eq!(env.code(), Some(ErrorCode::FileNotFound));
    let env = service.write(&caller, Zone::Documents, "../escape.txt", "x", false, None);
    assert_eq!(env.code(), Some(ErrorCode::PathEscape));
    assert_eq!(commit_count(dir.path(), "alice"), ops.len());

    // Read-only history is reachable; the repository itself is not.
    let env = service.exec(&caller, Zone::Documents, &ExecParams::new("git", ["log", "--oneline"]));
    assert!(env.success, "{:?}", env);
    let log = env.data.unwrap()["stdout"].as_str().unwrap().to_string();
    assert!(log.contains("Renamed report.md -> final/report.md"), "{}", log);
    assert!(log.contains("Add a line"));
    let env = service.exec(&caller, Zone::Documents, &ExecParams::new("cat", [".git/config"]));
    assert_eq!(env.code(), Some(ErrorCode::PathEscape));
}

#[test]
fn safe_edit_round_trip_and_cancel() {
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");
    let original_bytes: Vec<u8> = b"line one\r\nline two\n\xE2\x82\xAC\n".to_vec();
    let original = dir.path().join("alice/Storage/data/doc.txt");
    fs::create_dir_all(original.parent().unwrap()).unwrap();
    fs::write(&original, &original_bytes).unwrap();

    // Cancel with no intervening write restores identical bytes.
    assert!(service.edit_open(&caller, Zone::Storage, "doc.txt").success);
    assert!(service.edit_cancel(&caller, Zone::Storage, "doc.txt").success);
    assert_eq!(fs::read(&original).unwrap(), original_bytes);

    // Cancel after a write still leaves the original untouched.
    assert!(service.edit_open(&caller, Zone::Storage, "doc.txt").success);
    assert!(service.edit_write(&caller, Zone::Storage, "doc.txt", "scratch", false).success);
    assert!(service.edit_cancel(&caller, Zone::Storage, "doc.txt").success);
    assert_eq!(fs::read(&original).unwrap(), original_bytes);

    // Save replaces it with exactly the new content.
    assert!(service.edit_open(&caller, Zone::Storage, "doc.txt").success);
    assert!(service.edit_write(&caller, Zone::Storage, "doc.txt", "new content", false).success);
    let env = service.edit_save(&caller, Zone::Storage, "doc.txt", None);
    assert!(env.success, "{:?}", env);
    assert_eq!(fs::read_to_string(&original).unwrap(), "new content");

    // The session is gone: nothing left to save or cancel, no working copies.
    let env = service.edit_save(&caller, Zone::Storage, "doc.txt", None);
    assert_eq!(env.code(), Some(ErrorCode::FileNotFound));
    let editzone = dir.path().join("alice/Storage/editzone");
    assert!(!editzone.join("conv-1/doc.txt").exists());

    if has("sed") {
        assert!(service.edit_open(&caller, Zone::Storage, "doc.txt").success);
        let env = service.edit_exec(
            &caller,
            Zone::Storage,
            &ExecParams::new("sed", ["-n", "1p", "doc.txt"]),
        );
        assert!(env.success, "{:?}", env);
        assert_eq!(env.data.unwrap()["stdout"], "new content\n");
        assert!(service.edit_cancel(&caller, Zone::Storage, "doc.txt").success);
    }
}

#[test]
fn documents_edit_save_commits_once() {
    if !has("git") {
        return;
    }
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");
    assert!(service.write(&caller, Zone::Documents, "plan.md", "v1", false, None).success);
    let before = commit_count(dir.path(), "alice");

    assert!(service.edit_open(&caller, Zone::Documents, "plan.md").success);
    assert!(service.edit_write(&caller, Zone::Documents, "plan.md", "v2", false).success);
    assert_eq!(commit_count(dir.path(), "alice"), before);
    let env = service.edit_save(&caller, Zone::Documents, "plan.md", None);
    assert!(env.success, "{:?}", env);
    assert_eq!(env.data.unwrap()["message"], "Edited plan.md");
    assert_eq!(commit_count(dir.path(), "alice"), before + 1);

    assert!(service.edit_open(&caller, Zone::Documents, "plan.md").success);
    assert!(service.edit_cancel(&caller, Zone::Documents, "plan.md").success);
    assert_eq!(commit_count(dir.path(), "alice"), before + 1);
}

#[test]
fn locks_expire_on_the_simulated_clock() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()));
    let service = service(dir.path()).with_clock(clock.clone());
    let first = Caller::new("alice", "conv-1");
    let second = Caller::new("alice", "conv-2");
    assert!(service.write(&first, Zone::Storage, "shared.txt", "base", false, None).success);

    assert!(service.edit_open(&first, Zone::Storage, "shared.txt").success);
    assert!(service.edit_write(&first, Zone::Storage, "shared.txt", "abandoned", false).success);

    let env = service.edit_open(&second, Zone::Storage, "shared.txt");
    assert_eq!(env.code(), Some(ErrorCode::FileLocked));

    clock.advance(Duration::hours(23));
    let env = service.edit_open(&second, Zone::Storage, "shared.txt");
    assert_eq!(env.code(), Some(ErrorCode::FileLocked));

    clock.advance(Duration::hours(2));
    let env = service.edit_open(&second, Zone::Storage, "shared.txt");
    assert!(env.success, "{:?}", env);
    assert_eq!(env.data.unwrap()["reclaimed_from"], "conv-1");
    let editzone = dir.path().join("alice/Storage/editzone");
    assert!(!editzone.join("conv-1/shared.txt").exists());
    assert_eq!(
        fs::read_to_string(editzone.join("conv-2/shared.txt")).unwrap(),
        "base"
    );

    // The first conversation lost its session.
    let env = service.edit_save(&first, Zone::Storage, "shared.txt", None);
    assert_eq!(env.code(), Some(ErrorCode::FileLocked));
    assert!(service.edit_save(&second, Zone::Storage, "shared.txt", None).success);
}

#[test]
fn maintenance_sweeps_expired_locks_and_orphans() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
    let service = service(dir.path()).with_clock(clock.clone());
    let caller = Caller::new("alice", "conv-1");
    assert!(service.edit_open(&caller, Zone::Storage, "a.txt").success);

    // A working copy nobody holds a lock for.
    let orphan = dir.path().join("alice/Storage/editzone/conv-9/stray.txt");
    fs::create_dir_all(orphan.parent().unwrap()).unwrap();
    fs::write(&orphan, "left over").unwrap();

    clock.advance(Duration::hours(30));
    let env = service.maintenance(&caller);
    assert!(env.success, "{:?}", env);
    let data = env.data.unwrap();
    assert_eq!(data["expired_locks"], serde_json::json!(["Storage/a.txt"]));
    assert_eq!(data["orphan_editzones"], serde_json::json!(["Storage/stray.txt"]));
    assert!(!orphan.exists());
    assert!(!dir.path().join("alice/Storage/locks/a.txt.lock").exists());
}

#[test]
fn upload_import_bridge_and_back() {
    if !has("git") {
        return;
    }
    let host = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");
    let attachment = host.path().join("1234_invoice.txt");
    fs::write(&attachment, "total: 42\n").unwrap();

    let env = service.import(
        &caller,
        &ImportRequest {
            files: vec![UploadedFile::named("invoice.txt", &attachment)],
            import_all: true,
            ..Default::default()
        },
    );
    assert!(env.success, "{:?}", env);
    assert_eq!(env.data.unwrap()["imported"], serde_json::json!(["invoice.txt"]));

    // Another conversation cannot see this conversation's uploads.
    let other = Caller::new("alice", "conv-2");
    let env = service.uploads_to_storage(&other, "invoice.txt", "invoice.txt");
    assert_eq!(env.code(), Some(ErrorCode::FileNotFound));

    let before = commit_count(dir.path(), "alice");
    let env = service.uploads_to_documents(&caller, "invoice.txt", "finance/invoice.txt", None);
    assert!(env.success, "{:?}", env);
    let data = env.data.unwrap();
    assert_eq!(data["message"], "Imported finance/invoice.txt from Uploads");
    assert_eq!(commit_count(dir.path(), "alice"), before + 1);

    let env = service.documents_to_storage(&caller, "finance/invoice.txt", "archive/invoice.txt", None);
    assert!(env.success, "{:?}", env);
    assert_eq!(env.data.unwrap()["moved"], true);
    assert_eq!(commit_count(dir.path(), "alice"), before + 2);
    assert!(!dir.path().join("alice/Documents/data/finance/invoice.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("alice/Storage/data/archive/invoice.txt")).unwrap(),
        "total: 42\n"
    );

    let env = service.storage_to_documents(&caller, "archive/invoice.txt", "invoice.txt", Some("Restore"));
    assert!(env.success, "{:?}", env);
    assert_eq!(commit_count(dir.path(), "alice"), before + 3);
    assert!(dir.path().join("alice/Storage/data/archive/invoice.txt").exists());
}

#[test]
fn every_operation_is_audited() {
    let dir = tempdir().unwrap();
    let service = StorageService::new(StorageConfig::new(dir.path())).unwrap();
    let caller = Caller::new("alice", "conv-1");

    assert!(service.write(&caller, Zone::Storage, "a.txt", "hello", false, None).success);
    assert!(!service.exec(&caller, Zone::Storage, &ExecParams::new("bash", ["-c", "id"])).success);
    assert!(service.stats(&caller).success);

    let log = dir.path().join(".audit/audit.jsonl");
    let events = AuditLog::read_all(&log).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].operation, "storage_write");
    assert_eq!(events[0].outcome, AuditOutcome::Success);
    assert_eq!(events[0].target.as_deref(), Some("a.txt"));
    assert!(events[0].content_hash.is_some());
    assert_eq!(events[1].operation, "storage_exec");
    assert_eq!(events[1].outcome, AuditOutcome::Denied);
    assert_eq!(events[1].error_code, Some(ErrorCode::CommandForbidden));
    assert_eq!(events[2].operation, "stats");
    assert_eq!(AuditLog::verify_chain(&log).unwrap(), 3);
}

#[cfg(unix)]
#[test]
fn symlink_chains_cannot_climb_out_of_the_zone() {
    if !has("ln") || !has("cat") || !has("ls") {
        return;
    }
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let alice = Caller::new("alice", "conv-1");
    let bob = Caller::new("bob", "conv-1");
    assert!(service.write(&bob, Zone::Storage, "secret.txt", "bob only", false, None).success);
    let data = dir.path().join("alice/Storage/data");
    fs::create_dir_all(&data).unwrap();

    let env = service.exec(&alice, Zone::Storage, &ExecParams::new("ln", ["-s", ".", "s"]));
    assert!(env.success, "{:?}", env);
    let env = service.exec(&alice, Zone::Storage, &ExecParams::new("ln", ["-s", "s/..", "up"]));
    assert_eq!(env.code(), Some(ErrorCode::PathEscape));

    // The same chain as an extracted archive would leave it.
    std::os::unix::fs::symlink("s/..", data.join("up")).unwrap();
    std::os::unix::fs::symlink("up/..", data.join("up2")).unwrap();
    let attempts: [(&str, &[&str]); 4] = [
        ("cat", &["up2/../bob/Storage/data/secret.txt"]),
        ("cat", &["up/../../bob/Storage/data/secret.txt"]),
        ("ls", &["up2/.."]),
        ("ls", &["s/.."]),
    ];
    for (command, args) in attempts {
        let env = service.exec(&alice, Zone::Storage, &ExecParams::new(command, args.iter().copied()));
        assert_eq!(env.code(), Some(ErrorCode::PathEscape), "{} {:?}", command, args);
        assert!(env.data.is_none());
    }

    // The next command sweeps the escaping links away and keeps the harmless one.
    let env = service.exec(&alice, Zone::Storage, &ExecParams::new("ls", Vec::<String>::new()));
    assert!(env.success, "{:?}", env);
    let message = env.message.unwrap();
    assert!(message.contains("removed symlinks leading out of the zone"), "{}", message);
    assert!(fs::symlink_metadata(data.join("up")).is_err());
    assert!(fs::symlink_metadata(data.join("up2")).is_err());
    assert!(fs::symlink_metadata(data.join("s")).is_ok());
    assert_eq!(
        fs::read_to_string(dir.path().join("bob/Storage/data/secret.txt")).unwrap(),
        "bob only"
    );
}

#[test]
fn planted_git_directories_are_inert() {
    let dir = tempdir().unwrap();
    let service = service(dir.path());
    let caller = Caller::new("alice", "conv-1");

    for path in ["sub/.git/config", "sub/.GIT/HEAD", ".git/hooks/pre-commit"] {
        let env = service.write(&caller, Zone::Storage, path, "[diff]\n", false, None);
        assert_eq!(env.code(), Some(ErrorCode::PathEscape), "{}", path);
    }
    assert!(service.write(&caller, Zone::Storage, "sub/dotgit/config", "x", false, None).success);
    let env = service.exec(&caller, Zone::Storage, &ExecParams::new("mv", ["sub/dotgit", "sub/.git"]));
    assert_eq!(env.code(), Some(ErrorCode::PathEscape));
    let env = service.exec(&caller, Zone::Storage, &ExecParams::new("mv", ["-t", "sub/.git", "sub/dotgit"]));
    assert_eq!(env.code(), Some(ErrorCode::PathEscape));
    assert!(!dir.path().join("alice/Storage/data/sub/.git").exists());

    // git itself only runs where the service owns the repository.
    let env = service.exec(
        &caller,
        Zone::Storage,
        &ExecParams::new("git", ["diff", "--no-index", "a.txt", "b.txt"]),
    );
    assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));
    let env = service.exec(&caller, Zone::Uploads, &ExecParams::new("git", ["log"]));
    assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));

    if !has("git") {
        return;
    }
    // A repository unpacked into Documents, configured to run a program on diff.
    assert!(service.write(&caller, Zone::Documents, "a.txt", "one\n", false, None).success);
    let data = dir.path().join("alice/Documents/data");
    let marker = dir.path().join("external-diff-ran");
    let planted = std::process::Command::new("git")
        .args(["init", "-q"])
        .arg(&data)
        .status()
        .unwrap();
    assert!(planted.success());
    fs::write(
        data.join(".git/config"),
        format!("[diff]\n\texternal = touch {}\n", marker.display()),
    )
    .unwrap();
    fs::write(data.join("a.txt"), "two\n").unwrap();

    let env = service.exec(&caller, Zone::Documents, &ExecParams::new("git", ["diff"]));
    assert!(env.success, "{:?}", env);
    let stdout = env.data.unwrap()["stdout"].as_str().unwrap().to_string();
    assert!(stdout.contains("+two"), "{}", stdout);
    assert!(!marker.exists());
    assert!(dir.path().join("alice/Documents/repo.git/HEAD").exists());
}
