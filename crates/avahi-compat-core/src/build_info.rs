//! Build metadata embedded by the build script.

/// Short git commit hash of the build, or `"unknown"`.
pub const GIT_HASH: &str = env!("AVAHI_COMPAT_GIT_HASH");

/// Cargo profile the crate was built with.
pub const BUILD_PROFILE: &str = env!("AVAHI_COMPAT_BUILD_PROFILE");

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string reported by [`Client::version_string`](crate::Client::version_string).
///
/// Example: `"avahi-compat 0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("avahi-compat {VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_mentions_crate_version() {
        let v = version_string();
        assert!(v.starts_with("avahi-compat "));
        assert!(v.contains(VERSION));
    }

    #[test]
    fn test_git_hash_not_empty() {
        assert!(!GIT_HASH.is_empty());
    }
}
