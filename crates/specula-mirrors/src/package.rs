//! File and package attribution
//!
//! Nothing in the runtime records which file "defines" a class or which
//! package it belongs to, so both are inferred from where its methods were
//! defined. Answers are best effort: a resolver returns `None` rather than
//! failing.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::class_mirror::ClassMirror;
use crate::config::ResolverConfig;
use crate::debug::debug_log;
use crate::heuristics;

static GEM_DIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)gems/([A-Za-z0-9_.\-]+?)-[0-9]+(?:\.[0-9A-Za-z]+)*(?:-[A-Za-z0-9_.\-]+)?/")
        .expect("gem dir regex")
});

/// Best-effort provenance for class mirrors
pub trait PackageResolver: Send + Sync {
    /// The file most likely to define the class
    fn resolve(&self, class: &ClassMirror) -> Option<PathBuf>;

    /// The package the class most likely belongs to
    fn package(&self, class: &ClassMirror) -> Option<String>;
}

/// Default resolver: majority file, then configured roots, gem paths and namespaces
#[derive(Debug, Clone, Default)]
pub struct PackageInference {
    config: ResolverConfig,
}

impl PackageInference {
    /// Create a resolver from configuration
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Package owning `path`: the longest configured root, else a `gems/<name>-<version>/` segment
    pub fn package_for_path(&self, path: &Path) -> Option<String> {
        let root = self
            .config
            .roots
            .iter()
            .filter(|root| path.starts_with(&root.path))
            .max_by_key(|root| root.path.components().count());
        if let Some(root) = root {
            return Some(root.package.clone());
        }
        let text = path.to_string_lossy();
        GEM_DIR
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|name| name.as_str().to_string())
    }

    /// Package configured for the top-level namespace of `name`
    pub fn package_for_namespace(&self, name: &str) -> Option<String> {
        if heuristics::is_anonymous_name(name) || heuristics::is_singleton_name(name) {
            return None;
        }
        let top = heuristics::split_path(name).into_iter().next()?;
        self.config.namespaces.get(top).cloned()
    }
}

/// Most frequent entry, ties going to the one seen first
fn majority(files: Vec<PathBuf>) -> Option<PathBuf> {
    let mut counts: FxHashMap<&Path, (usize, usize)> = FxHashMap::default();
    for (order, file) in files.iter().enumerate() {
        counts.entry(file.as_path()).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(path, _)| path.to_path_buf())
}

impl PackageResolver for PackageInference {
    fn resolve(&self, class: &ClassMirror) -> Option<PathBuf> {
        let mut files = match class.method_files() {
            Ok(files) => files,
            Err(err) => {
                debug_log!("could not list methods of module {:?}: {}", class.subject(), err);
                Vec::new()
            }
        };
        if files.is_empty() {
            files = match class.singleton_class().and_then(|meta| meta.method_files()) {
                Ok(files) => files,
                Err(err) => {
                    let subject = class.subject();
                    debug_log!("could not list class methods of module {:?}: {}", subject, err);
                    Vec::new()
                }
            };
        }
        let file = majority(files);
        if file.is_none() {
            debug_log!("no source file found for module {:?}", class.subject());
        }
        file
    }

    fn package(&self, class: &ClassMirror) -> Option<String> {
        if let Some(package) = self.resolve(class).and_then(|file| self.package_for_path(&file)) {
            return Some(package);
        }
        let package = class
            .name()
            .ok()
            .and_then(|name| self.package_for_namespace(&name));
        if package.is_none() {
            debug_log!("no package found for module {:?}", class.subject());
        }
        package
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackageRoot;

    fn inference() -> PackageInference {
        let mut config = ResolverConfig::default();
        config.roots.push(PackageRoot {
            path: PathBuf::from("/srv/app"),
            package: "app".to_string(),
        });
        config.roots.push(PackageRoot {
            path: PathBuf::from("/srv/app/vendor/billing"),
            package: "billing".to_string(),
        });
        config.namespaces.insert("Net".to_string(), "net-stack".to_string());
        PackageInference::new(config)
    }

    #[test]
    fn test_longest_root_wins() {
        let resolver = inference();
        assert_eq!(
            resolver.package_for_path(Path::new("/srv/app/lib/user.rb")).as_deref(),
            Some("app")
        );
        assert_eq!(
            resolver
                .package_for_path(Path::new("/srv/app/vendor/billing/invoice.rb"))
                .as_deref(),
            Some("billing")
        );
    }

    #[test]
    fn test_root_matches_whole_components() {
        let resolver = inference();
        assert_eq!(resolver.package_for_path(Path::new("/srv/application/x.rb")), None);
    }

    #[test]
    fn test_gem_paths() {
        let resolver = PackageInference::default();
        let path = Path::new("/usr/lib/ruby/gems/3.2.0/gems/rack-test-2.1.0/lib/rack/test.rb");
        assert_eq!(resolver.package_for_path(path).as_deref(), Some("rack-test"));
        assert_eq!(
            resolver
                .package_for_path(Path::new("gems/nokogiri-1.15.4-x86_64-linux/lib/nokogiri.rb"))
                .as_deref(),
            Some("nokogiri")
        );
        assert_eq!(resolver.package_for_path(Path::new("lib/gems.rb")), None);
    }

    #[test]
    fn test_namespace_fallback() {
        let resolver = inference();
        assert_eq!(resolver.package_for_namespace("Net::HTTP").as_deref(), Some("net-stack"));
        assert_eq!(resolver.package_for_namespace("Network"), None);
        assert_eq!(resolver.package_for_namespace("#<Class:Net>"), None);
    }

    #[test]
    fn test_majority_ties_go_to_first_seen() {
        let files = vec![
            PathBuf::from("b.rb"),
            PathBuf::from("a.rb"),
            PathBuf::from("a.rb"),
            PathBuf::from("b.rb"),
        ];
        assert_eq!(majority(files), Some(PathBuf::from("b.rb")));
        assert_eq!(
            majority(vec![PathBuf::from("b.rb"), PathBuf::from("a.rb"), PathBuf::from("a.rb")]),
            Some(PathBuf::from("a.rb"))
        );
        assert_eq!(majority(Vec::new()), None);
    }
}
