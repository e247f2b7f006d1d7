//! Language profiles
//!
//! Data-driven table of the languages the execution service accepts, with
//! the version/compiler a cell gets when its language is first chosen.
//! Built-in entries can be overridden from the config file or refreshed from
//! the service's own catalog.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::config::LanguageOverride;

/// Built-in profile entry
struct Builtin {
    id: &'static str,
    default_version: Option<&'static str>,
    default_compiler: Option<&'static str>,
    versions: &'static [&'static str],
    compilers: &'static [&'static str],
    extensions: &'static [&'static str],
}

/// Languages known without asking the service
static BUILTIN: &[Builtin] = &[
    Builtin {
        id: "python",
        default_version: Some("3.10"),
        default_compiler: None,
        versions: &["2.7", "3.5", "3.6", "3.7", "3.8", "3.9", "3.10", "3.11", "3.12"],
        compilers: &[],
        extensions: &["py"],
    },
    Builtin {
        id: "cpp",
        default_version: None,
        default_compiler: Some("gcc"),
        versions: &[],
        compilers: &["gcc", "clang"],
        extensions: &["cpp", "cc", "cxx"],
    },
    Builtin {
        id: "java",
        default_version: Some("21"),
        default_compiler: Some("amazoncorretto"),
        versions: &["21", "19", "17"],
        compilers: &["amazoncorretto", "temurin"],
        extensions: &["java"],
    },
    Builtin {
        id: "javascript",
        default_version: Some("node:19"),
        default_compiler: None,
        versions: &["node:current", "node:19", "node:18", "node:16", "node:14", "node:12"],
        compilers: &[],
        extensions: &["js", "mjs"],
    },
    Builtin {
        id: "typescript",
        default_version: Some("node:19"),
        default_compiler: None,
        versions: &["node:19", "node:18", "node:16", "node:14", "node:12"],
        compilers: &[],
        extensions: &["ts"],
    },
    Builtin {
        id: "php",
        default_version: Some("php:8.3"),
        default_compiler: None,
        versions: &["php:8.3", "php:7.4", "php:5.6"],
        compilers: &[],
        extensions: &["php"],
    },
    Builtin {
        id: "go",
        default_version: Some("1.24"),
        default_compiler: Some("gc"),
        versions: &["1.24", "1.22", "1.21", "1.19", "1.17"],
        compilers: &["gc"],
        extensions: &["go"],
    },
    Builtin {
        id: "rust",
        default_version: None,
        default_compiler: None,
        versions: &[],
        compilers: &[],
        extensions: &["rs"],
    },
    Builtin {
        id: "c#",
        default_version: None,
        default_compiler: None,
        versions: &[],
        compilers: &[],
        extensions: &["cs"],
    },
];

/// Versions and compilers available for one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub id: String,
    pub default_version: Option<String>,
    pub default_compiler: Option<String>,
    pub versions: Vec<String>,
    pub compilers: Vec<String>,
    pub extensions: Vec<String>,
}

impl LanguageProfile {
    fn from_builtin(b: &Builtin) -> Self {
        Self {
            id: b.id.to_string(),
            default_version: b.default_version.map(str::to_string),
            default_compiler: b.default_compiler.map(str::to_string),
            versions: owned(b.versions),
            compilers: owned(b.compilers),
            extensions: owned(b.extensions),
        }
    }

    fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            default_version: None,
            default_compiler: None,
            versions: Vec::new(),
            compilers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    fn apply(&mut self, o: &LanguageOverride) {
        if let Some(v) = &o.default_version {
            self.default_version = Some(v.clone());
        }
        if let Some(c) = &o.default_compiler {
            self.default_compiler = Some(c.clone());
        }
        if let Some(v) = &o.versions {
            self.versions = v.clone();
        }
        if let Some(c) = &o.compilers {
            self.compilers = c.clone();
        }
        if let Some(e) = &o.extensions {
            self.extensions = e.iter().map(|x| x.trim_start_matches('.').to_lowercase()).collect();
        }
    }
}

/// Service answer for `versions_compilers?language=all`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteLanguage {
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub compilers: Vec<String>,
}

/// Lookup table of language profiles
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    profiles: BTreeMap<String, LanguageProfile>,
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageCatalog {
    /// Catalog with only the built-in profiles
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN
                .iter()
                .map(|b| (b.id.to_string(), LanguageProfile::from_builtin(b)))
                .collect(),
        }
    }

    /// Built-in profiles with config overrides applied
    pub fn with_overrides(overrides: &HashMap<String, LanguageOverride>) -> Self {
        let mut catalog = Self::builtin();
        for (id, o) in overrides {
            catalog
                .profiles
                .entry(id.clone())
                .or_insert_with(|| LanguageProfile::empty(id))
                .apply(o);
        }
        catalog
    }

    /// Replace version/compiler lists with what the service reports
    ///
    /// Defaults are kept when the service still lists them, otherwise the
    /// first listed entry becomes the default.
    pub fn merge_remote(&mut self, remote: &HashMap<String, RemoteLanguage>) {
        for (id, langs) in remote {
            let profile = self
                .profiles
                .entry(id.clone())
                .or_insert_with(|| LanguageProfile::empty(id));
            profile.versions = langs.versions.clone();
            profile.compilers = langs.compilers.clone();
            profile.default_version = keep_or_first(profile.default_version.take(), &profile.versions);
            profile.default_compiler = keep_or_first(profile.default_compiler.take(), &profile.compilers);
        }
        tracing::debug!(languages = remote.len(), "Merged service language catalog");
    }

    /// Get a profile by language id
    pub fn get(&self, id: &str) -> Option<&LanguageProfile> {
        self.profiles.get(id)
    }

    /// All profiles, ordered by id
    pub fn profiles(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.values()
    }

    /// Infer a language from a source file's extension
    pub fn for_path(&self, path: &Path) -> Option<&LanguageProfile> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.profiles
            .values()
            .find(|p| p.extensions.iter().any(|e| *e == ext))
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn keep_or_first(current: Option<String>, listed: &[String]) -> Option<String> {
    match current {
        Some(c) if listed.contains(&c) => Some(c),
        _ => listed.first().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let catalog = LanguageCatalog::builtin();
        let java = catalog.get("java").unwrap();
        assert_eq!(java.default_version.as_deref(), Some("21"));
        assert_eq!(java.default_compiler.as_deref(), Some("amazoncorretto"));
        assert_eq!(catalog.get("cpp").unwrap().default_compiler.as_deref(), Some("gcc"));
        assert!(catalog.get("cobol").is_none());
    }

    #[test]
    fn test_for_path() {
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.for_path(Path::new("solve.py")).unwrap().id, "python");
        assert_eq!(catalog.for_path(Path::new("a/b/Main.JS")).unwrap().id, "javascript");
        assert!(catalog.for_path(Path::new("README")).is_none());
    }

    #[test]
    fn test_overrides_extend_and_replace() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "rust".to_string(),
            LanguageOverride {
                default_version: Some("1.79".into()),
                versions: Some(vec!["1.79".into()]),
                ..Default::default()
            },
        );
        overrides.insert(
            "kotlin".to_string(),
            LanguageOverride {
                extensions: Some(vec![".kt".into()]),
                ..Default::default()
            },
        );
        let catalog = LanguageCatalog::with_overrides(&overrides);
        assert_eq!(catalog.get("rust").unwrap().default_version.as_deref(), Some("1.79"));
        assert_eq!(catalog.for_path(Path::new("Main.kt")).unwrap().id, "kotlin");
    }

    #[test]
    fn test_merge_remote_keeps_listed_default() {
        let mut catalog = LanguageCatalog::builtin();
        let mut remote = HashMap::new();
        remote.insert(
            "python".to_string(),
            RemoteLanguage { versions: vec!["3.12".into(), "3.10".into()], compilers: vec![] },
        );
        remote.insert(
            "java".to_string(),
            RemoteLanguage { versions: vec!["22".into()], compilers: vec!["temurin".into()] },
        );
        catalog.merge_remote(&remote);
        assert_eq!(catalog.get("python").unwrap().default_version.as_deref(), Some("3.10"));
        let java = catalog.get("java").unwrap();
        assert_eq!(java.default_version.as_deref(), Some("22"));
        assert_eq!(java.default_compiler.as_deref(), Some("temurin"));
    }
}
