//! Build script for dtr-rc
//!
//! Exposes build identification to the job's startup log line:
//! `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE`.
//!
//! Packaged builds often run outside a git checkout; `DTR_GIT_HASH` supplies
//! the hash there.

use std::process::Command;

fn git_hash() -> Option<String> {
    if let Ok(hash) = std::env::var("DTR_GIT_HASH") {
        let hash = hash.trim();
        if !hash.is_empty() {
            return Some(hash.to_string());
        }
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    // No rerun-if directives: the script runs on every build so the hash and
    // timestamp stay current
    let hash = git_hash().unwrap_or_else(|| "unknown".to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", built_at);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
