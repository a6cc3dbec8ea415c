//! Build script for cgm-ui
//!
//! Stamps the binary with what was built and when, so the startup log line
//! and `/health` identify a deployment:
//! - `GIT_HASH`: short commit hash, `-dirty` when the work tree has changes
//! - `BUILD_TIMESTAMP`: UTC build time, RFC 3339 to the second
//! - `BUILD_PROFILE`: Cargo profile (`debug` or `release`)

use std::process::Command;

/// Run `git` with `args` and return trimmed stdout, `None` when git is
/// missing or the source is not a checkout (crate tarballs)
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn main() {
    // Eight characters matches what `git log --oneline` shows in most repos
    let git_hash = match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            // Any porcelain output means uncommitted changes went into this build
            let dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    // Cargo sets PROFILE for build scripts only
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    // Read back in the binary with env!()
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    // Emitting no rerun-if-changed line makes Cargo rerun this script on
    // every build, which keeps the timestamp and hash from going stale
}
