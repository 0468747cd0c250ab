use once_cell::sync::Lazy;
use std::fmt;

include!(concat!(env!("OUT_DIR"), "/built.rs"));

const UNKNOWN: &str = "unknown";

/// Build-time facts about this binary, fixed after first access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}

impl BuildInfo {
    pub fn current() -> &'static Self {
        static BUILD_INFO: Lazy<BuildInfo> = Lazy::new(|| {
            BuildInfo::new(
                PKG_VERSION,
                GIT_COMMIT_HASH,
                Some(BUILT_TIME_UTC),
                GIT_DIRTY.unwrap_or(false),
            )
        });
        &BUILD_INFO
    }

    pub fn version_str() -> &'static str {
        PKG_VERSION
    }

    fn new(version: &str, commit: Option<&str>, date: Option<&str>, dirty: bool) -> Self {
        let commit = match commit {
            Some(hash) if dirty => format!("{}-dirty", hash),
            Some(hash) => hash.to_string(),
            None => UNKNOWN.to_string(),
        };
        Self {
            version: version.to_string(),
            commit,
            date: date.unwrap_or(UNKNOWN).to_string(),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "commit: {}", self.commit)?;
        write!(f, "build date: {}", self.date)
    }
}
