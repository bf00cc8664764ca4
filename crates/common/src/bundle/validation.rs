//! Comprehensive bundle validation.
//!
//! Validation runs a fixed pipeline over a parsed manifest/container pair
//! and accumulates findings bucketed by severity. It never fails: callers
//! always get a full [`ValidationReport`] (or a truncated one under
//! fail-fast). Only parse-time structural problems are surfaced as errors,
//! and those happen before validation is reachable.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use mime::Mime;

use crate::container::Container;

use super::manifest::{Manifest, MAX_SUPPORTED_VERSION, MANIFEST_PATH};

/// Reserved container namespace for replicated document chunks.
pub const STORAGE_PREFIX: &str = "storage/";

/// Hard ceiling on total declared file size (500 MB).
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;

/// Hard ceiling on manifest file count.
pub const DEFAULT_MAX_FILE_COUNT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One validation finding.
#[derive(Debug, Clone)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub message: String,
    /// Manifest field or container path the finding is about.
    pub field: Option<String>,
}

impl ValidationMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            field: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            field: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Accumulated findings from one validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    messages: Vec<ValidationMessage>,
}

impl ValidationReport {
    /// A bundle is valid iff no ERROR-severity finding was recorded.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.severity == Severity::Error)
    }

    pub fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.by_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.by_severity(Severity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.by_severity(Severity::Info)
    }

    fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationMessage> {
        self.messages.iter().filter(move |m| m.severity == severity)
    }

    fn push(&mut self, message: ValidationMessage) {
        self.messages.push(message);
    }

    fn extend(&mut self, messages: impl IntoIterator<Item = ValidationMessage>) {
        self.messages.extend(messages);
    }
}

/// A caller-supplied validation stage, run after the built-in pipeline.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, manifest: &Manifest, container: &Container) -> Vec<ValidationMessage>;
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Require every content type to parse under the MIME grammar.
    pub strict_mime: bool,
    /// Stop the pipeline after the first stage that records an error.
    pub fail_fast: bool,
    pub max_total_size: u64,
    pub max_file_count: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            strict_mime: false,
            fail_fast: false,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
        }
    }
}

/// Fixed-pipeline bundle validator.
pub struct Validator {
    options: ValidationOptions,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Run the pipeline. Never fails; findings land in the report.
    pub fn validate(&self, manifest: &Manifest, container: &Container) -> ValidationReport {
        let mut report = ValidationReport::default();

        let stages: &[fn(&Self, &Manifest, &Container, &mut ValidationReport)] = &[
            Self::check_required_fields,
            Self::check_unique_paths,
            Self::check_container_consistency,
            Self::check_entrypoint_targets,
            Self::check_size_ceiling,
            Self::check_file_count,
            Self::check_mime_grammar,
            Self::check_circular_entrypoints,
        ];

        for stage in stages {
            stage(self, manifest, container, &mut report);
            if self.options.fail_fast && report.has_errors() {
                return report;
            }
        }

        for rule in &self.rules {
            report.extend(rule.check(manifest, container));
            if self.options.fail_fast && report.has_errors() {
                return report;
            }
        }

        report
    }

    fn check_required_fields(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        if manifest.version == 0 || manifest.version > MAX_SUPPORTED_VERSION {
            report.push(
                ValidationMessage::error(format!(
                    "unsupported manifest version {}",
                    manifest.version
                ))
                .with_field("version"),
            );
        }
        for (index, file) in manifest.files.iter().enumerate() {
            if file.path.is_empty() {
                report.push(
                    ValidationMessage::error("file entry has an empty path")
                        .with_field(format!("files[{index}].path")),
                );
            }
            if file.content_type.is_empty() {
                report.push(
                    ValidationMessage::error(format!(
                        "file {} has an empty content type",
                        file.path
                    ))
                    .with_field(format!("files[{index}].contentType")),
                );
            }
        }
    }

    fn check_unique_paths(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        let mut seen = HashSet::new();
        for file in &manifest.files {
            if !seen.insert(file.path.as_str()) {
                report.push(
                    ValidationMessage::error(format!("duplicate file path {}", file.path))
                        .with_field(file.path.clone()),
                );
            }
        }
    }

    /// Every manifest file exists in the container and vice versa.
    /// `manifest.json` itself and the `storage/` namespace are exempt on
    /// the container side.
    fn check_container_consistency(
        &self,
        manifest: &Manifest,
        container: &Container,
        report: &mut ValidationReport,
    ) {
        let entries = container.list();
        for file in &manifest.files {
            if !container.contains(&file.path) {
                report.push(
                    ValidationMessage::error(format!(
                        "manifest file {} is missing from the container",
                        file.path
                    ))
                    .with_field(file.path.clone()),
                );
            } else if let Some(info) = entries
                .iter()
                .find(|info| file.path.trim_start_matches('/') == info.path)
            {
                let stored = if info.compressed {
                    info.uncompressed_size
                } else {
                    info.size
                };
                if stored != file.length {
                    report.push(
                        ValidationMessage::warning(format!(
                            "file {} declares {} bytes but stores {}",
                            file.path, file.length, stored
                        ))
                        .with_field(file.path.clone()),
                    );
                }
            }
        }

        let declared: HashSet<&str> = manifest
            .files
            .iter()
            .map(|f| f.path.trim_start_matches('/'))
            .collect();
        for path in container.paths() {
            if path == MANIFEST_PATH || path.starts_with(STORAGE_PREFIX) {
                continue;
            }
            if !declared.contains(path) {
                report.push(
                    ValidationMessage::error(format!(
                        "container entry {path} is not declared in the manifest"
                    ))
                    .with_field(path.to_string()),
                );
            }
        }
    }

    fn check_entrypoint_targets(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        for (name, target) in &manifest.entrypoints {
            if !manifest.has_file(target) {
                report.push(
                    ValidationMessage::error(format!(
                        "entrypoint {name} references missing file {target}"
                    ))
                    .with_field(format!("entrypoints.{name}")),
                );
            }
        }
    }

    fn check_size_ceiling(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        let total = manifest.total_size();
        let max = self.options.max_total_size;
        if total > max {
            report.push(
                ValidationMessage::error(format!(
                    "total declared size {total} exceeds maximum {max}"
                ))
                .with_field("files"),
            );
        } else if total > max / 10 * 9 {
            report.push(
                ValidationMessage::warning(format!(
                    "total declared size {total} is within 10% of maximum {max}"
                ))
                .with_field("files"),
            );
        }
    }

    fn check_file_count(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        let count = manifest.files.len();
        if count > self.options.max_file_count {
            report.push(
                ValidationMessage::error(format!(
                    "manifest declares {count} files, maximum is {}",
                    self.options.max_file_count
                ))
                .with_field("files"),
            );
        }
    }

    fn check_mime_grammar(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        if !self.options.strict_mime {
            return;
        }
        for (index, file) in manifest.files.iter().enumerate() {
            if Mime::from_str(&file.content_type).is_err() {
                report.push(
                    ValidationMessage::error(format!(
                        "file {} has invalid content type `{}`",
                        file.path, file.content_type
                    ))
                    .with_field(format!("files[{index}].contentType")),
                );
            }
        }
    }

    fn check_circular_entrypoints(
        &self,
        manifest: &Manifest,
        _container: &Container,
        report: &mut ValidationReport,
    ) {
        for cycle in find_entrypoint_cycles(&manifest.entrypoints) {
            report.push(
                ValidationMessage::warning(format!(
                    "circular entrypoint reference: {}",
                    cycle.join(" -> ")
                ))
                .with_field("entrypoints"),
            );
        }
    }
}

/// Detect cycles in the entrypoint alias graph.
///
/// Nodes are entrypoint names; an edge joins two names iff they reference
/// the same file path. Depth-first search from every unvisited node with a
/// recursion stack; meeting an on-stack node yields the name sequence from
/// its first occurrence back to itself. At most one cycle is reported per
/// connected component.
pub fn find_entrypoint_cycles(entrypoints: &BTreeMap<String, String>) -> Vec<Vec<String>> {
    let names: Vec<&str> = entrypoints.keys().map(String::as_str).collect();
    let mut by_path: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, path) in entrypoints {
        by_path.entry(path.as_str()).or_default().push(name);
    }

    let neighbors = |name: &str| -> Vec<&str> {
        let path = entrypoints[name].as_str();
        by_path[path]
            .iter()
            .copied()
            .filter(|other| *other != name)
            .collect()
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for start in names {
        if visited.contains(start) {
            continue;
        }

        // Iterative DFS carrying an explicit recursion stack.
        let mut stack: Vec<&str> = vec![start];
        let mut frames: Vec<(usize, Vec<&str>)> = vec![(0, neighbors(start))];
        visited.insert(start);
        let mut found = None;

        'dfs: while let Some((cursor, adjacent)) = frames.last_mut() {
            while *cursor < adjacent.len() {
                let next = adjacent[*cursor];
                *cursor += 1;

                if let Some(position) = stack.iter().position(|n| *n == next) {
                    let mut cycle: Vec<String> =
                        stack[position..].iter().map(|n| n.to_string()).collect();
                    cycle.push(next.to_string());
                    found = Some(cycle);
                    break 'dfs;
                }
                if !visited.contains(next) {
                    visited.insert(next);
                    stack.push(next);
                    frames.push((0, neighbors(next)));
                    continue 'dfs;
                }
            }
            frames.pop();
            stack.pop();
        }

        if let Some(cycle) = found {
            cycles.push(cycle);
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::manifest::FileEntry;
    use crate::container::SetOptions;
    use bytes::Bytes;

    fn file(path: &str, length: u64, content_type: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            length,
            content_type: content_type.to_string(),
            compressed: None,
            uncompressed_size: None,
            last_modified: None,
        }
    }

    async fn consistent_pair() -> (Manifest, Container) {
        let mut manifest = Manifest::default();
        manifest.files.push(file("/a.txt", 2, "text/plain"));
        let mut container = Container::new();
        container
            .set("/a.txt", Bytes::from("hi"), SetOptions::default())
            .await
            .unwrap();
        (manifest, container)
    }

    #[tokio::test]
    async fn test_valid_bundle_has_no_findings() {
        let (manifest, container) = consistent_pair().await;
        let report = Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        assert!(report.is_valid());
        assert!(report.messages().is_empty());
    }

    #[tokio::test]
    async fn test_missing_container_entry_is_error() {
        let (mut manifest, container) = consistent_pair().await;
        manifest.files.push(file("/ghost.js", 1, "text/javascript"));

        let report = Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        assert!(!report.is_valid());
        assert_eq!(report.errors().count(), 1);
        assert!(report.errors().next().unwrap().message.contains("/ghost.js"));
    }

    #[tokio::test]
    async fn test_undeclared_container_entry_is_error() {
        let (manifest, mut container) = consistent_pair().await;
        container
            .set("stray.bin", Bytes::from("x"), SetOptions::default())
            .await
            .unwrap();

        let report = Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        assert!(!report.is_valid());
    }

    #[tokio::test]
    async fn test_storage_namespace_and_manifest_are_exempt() {
        let (manifest, mut container) = consistent_pair().await;
        container
            .set("manifest.json", Bytes::from("{}"), SetOptions::default())
            .await
            .unwrap();
        container
            .set("storage/ab/12/chunk", Bytes::from("c"), SetOptions::default())
            .await
            .unwrap();

        let report = Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn test_duplicate_paths_and_bad_entrypoint() {
        let (mut manifest, container) = consistent_pair().await;
        manifest.files.push(file("/a.txt", 2, "text/plain"));
        manifest
            .entrypoints
            .insert("main".to_string(), "/missing.html".to_string());

        let report = Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|m| m.message.contains("duplicate")));
        assert!(errors.iter().any(|m| m.message.contains("main")));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_after_first_error_stage() {
        let (mut manifest, container) = consistent_pair().await;
        manifest.files[0].path = String::new();
        manifest
            .entrypoints
            .insert("main".to_string(), "/missing.html".to_string());

        let options = ValidationOptions {
            fail_fast: true,
            ..Default::default()
        };
        let report = Validator::new(options).validate(&manifest, &container);
        // only the required-fields stage ran
        assert!(report
            .errors()
            .all(|m| m.message.contains("empty path")));
    }

    #[tokio::test]
    async fn test_strict_mime() {
        let (mut manifest, mut container) = consistent_pair().await;
        manifest.files.push(file("/b", 1, "not a mime"));
        container
            .set("/b", Bytes::from("x"), SetOptions::default())
            .await
            .unwrap();

        let lenient =
            Validator::new(ValidationOptions::default()).validate(&manifest, &container);
        assert!(lenient.is_valid());

        let strict = Validator::new(ValidationOptions {
            strict_mime: true,
            ..Default::default()
        })
        .validate(&manifest, &container);
        assert!(!strict.is_valid());
    }

    #[tokio::test]
    async fn test_size_ceiling_reports_actual_and_max() {
        let (mut manifest, container) = consistent_pair().await;
        manifest.files[0].length = 1000;

        let report = Validator::new(ValidationOptions {
            max_total_size: 100,
            ..Default::default()
        })
        .validate(&manifest, &container);
        let error = report.errors().next().unwrap();
        assert!(error.message.contains("1000"));
        assert!(error.message.contains("100"));
        // the stored/declared mismatch also surfaces, as a warning
        assert!(report.warnings().count() >= 1);
    }

    #[tokio::test]
    async fn test_custom_rule_runs() {
        struct NoDotfiles;
        impl ValidationRule for NoDotfiles {
            fn name(&self) -> &str {
                "no-dotfiles"
            }
            fn check(&self, manifest: &Manifest, _: &Container) -> Vec<ValidationMessage> {
                manifest
                    .files
                    .iter()
                    .filter(|f| f.path.trim_start_matches('/').starts_with('.'))
                    .map(|f| ValidationMessage::error(format!("dotfile {}", f.path)))
                    .collect()
            }
        }

        let (mut manifest, mut container) = consistent_pair().await;
        manifest.files.push(file("/.env", 1, "text/plain"));
        container
            .set("/.env", Bytes::from("x"), SetOptions::default())
            .await
            .unwrap();

        let report = Validator::new(ValidationOptions::default())
            .with_rule(Box::new(NoDotfiles))
            .validate(&manifest, &container);
        assert!(report.errors().any(|m| m.message.contains(".env")));
    }

    #[test]
    fn test_aliased_entrypoints_report_one_cycle() {
        let mut entrypoints = BTreeMap::new();
        entrypoints.insert("main".to_string(), "/x.js".to_string());
        entrypoints.insert("alt".to_string(), "/x.js".to_string());

        let cycles = find_entrypoint_cycles(&entrypoints);
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].contains(&"main".to_string()));
        assert!(cycles[0].contains(&"alt".to_string()));
        // the sequence returns to its first node
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn test_distinct_targets_have_no_cycles() {
        let mut entrypoints = BTreeMap::new();
        entrypoints.insert("main".to_string(), "/x.js".to_string());
        entrypoints.insert("docs".to_string(), "/docs.html".to_string());

        assert!(find_entrypoint_cycles(&entrypoints).is_empty());
    }

    #[test]
    fn test_two_alias_groups_report_two_cycles() {
        let mut entrypoints = BTreeMap::new();
        entrypoints.insert("a".to_string(), "/x".to_string());
        entrypoints.insert("b".to_string(), "/x".to_string());
        entrypoints.insert("c".to_string(), "/y".to_string());
        entrypoints.insert("d".to_string(), "/y".to_string());

        assert_eq!(find_entrypoint_cycles(&entrypoints).len(), 2);
    }
}
