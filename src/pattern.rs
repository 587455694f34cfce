//! Glob patterns for folder and file filtering
//!
//! Patterns are translated to anchored, case-insensitive regular expressions
//! over forward-slash relative paths:
//!
//! | pattern        | matches                                      |
//! |----------------|----------------------------------------------|
//! | `*`            | anything, at any depth                       |
//! | `*.ext`        | names ending in `.ext` within one segment    |
//! | `name`         | exactly `name`                               |
//! | `**/name`      | `name` at any depth, including the top level |
//! | `dir/**`       | `dir` and everything below it                |

use regex::{Regex, RegexBuilder};

use crate::config::Config;
use crate::error::{Fs2DadError, Result};

/// A single compiled glob pattern
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: String,
    regex: Regex,
}

impl PatternRule {
    /// Compile a glob pattern, rejecting empty or malformed input
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Fs2DadError::Pattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.trim().is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern.chars().any(char::is_control) {
            return Err(invalid("pattern contains control characters"));
        }

        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written in the configuration
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Match a relative path; backslashes count as separators
    pub fn matches(&self, relative_path: &str) -> bool {
        if relative_path.contains('\\') {
            self.regex.is_match(&relative_path.replace('\\', "/"))
        } else {
            self.regex.is_match(relative_path)
        }
    }
}

/// Translate a glob into an anchored regular expression
fn glob_to_regex(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    if pattern == "*" {
        return "^.*$".to_string();
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                let mut end = i;
                while end < chars.len() && chars[end] == '*' {
                    end += 1;
                }
                if end - i == 1 {
                    regex.push_str("[^/]*");
                    i = end;
                    continue;
                }
                let segment_start = i == 0 || chars[i - 1] == '/';
                if segment_start && chars.get(end) == Some(&'/') {
                    // `**/` may also stand for no directory at all
                    regex.push_str("(?:.*/)?");
                    i = end + 1;
                } else {
                    regex.push_str(".*");
                    i = end;
                }
            }
            '/' => {
                let rest = &chars[i + 1..];
                if rest.len() >= 2 && rest.iter().all(|&c| c == '*') {
                    // trailing `/**` also matches the directory itself
                    regex.push_str("(?:/.*)?");
                    i = chars.len();
                } else {
                    regex.push('/');
                    i += 1;
                }
            }
            c => {
                let mut buf = [0u8; 4];
                regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    regex.push('$');
    regex
}

/// An ordered list of compiled patterns
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| PatternRule::compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// First rule matching the path, if any
    pub fn first_match(&self, path: &str) -> Option<&PatternRule> {
        self.rules.iter().find(|r| r.matches(path))
    }

    pub fn matches_any(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }
}

/// Outcome of evaluating a folder against the folder rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderDecision {
    /// Matched an include rule, or sits below a folder that did
    pub included: bool,
    /// Matched an exclude rule; the whole subtree is skipped
    pub excluded: bool,
}

/// Outcome of evaluating a file name against the file rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDecision {
    /// The include-file set is empty or one of its rules matched
    pub included_by_name: bool,
    /// One of the exclude-file rules matched
    pub excluded: bool,
    /// Inclusion inherited from the containing folder
    pub folder_included: bool,
}

impl FileDecision {
    /// Exclusion vetoes; otherwise folder or name inclusion suffices
    pub fn is_eligible(&self) -> bool {
        !self.excluded && (self.folder_included || self.included_by_name)
    }
}

/// The four rule sets that drive a traversal
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    pub include_folders: RuleSet,
    pub exclude_folders: RuleSet,
    pub include_files: RuleSet,
    pub exclude_files: RuleSet,
}

impl FilterRules {
    /// Compile every pattern list of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            include_folders: RuleSet::compile(&config.include_folders)?,
            exclude_folders: RuleSet::compile(&config.exclude_folders)?,
            include_files: RuleSet::compile(&config.include_files)?,
            exclude_files: RuleSet::compile(&config.exclude_files)?,
        })
    }

    /// Evaluate a folder by its path relative to the traversal root
    pub fn folder_decision(&self, relative_path: &str, inherited: bool) -> FolderDecision {
        FolderDecision {
            included: inherited || self.include_folders.matches_any(relative_path),
            excluded: self.exclude_folders.matches_any(relative_path),
        }
    }

    /// Evaluate a file by its name
    pub fn file_decision(&self, file_name: &str, folder_included: bool) -> FileDecision {
        FileDecision {
            included_by_name: self.include_files.is_empty()
                || self.include_files.matches_any(file_name),
            excluded: self.exclude_files.matches_any(file_name),
            folder_included,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(p: &str) -> PatternRule {
        PatternRule::compile(p).unwrap()
    }

    fn rules(
        include_folders: &[&str],
        exclude_folders: &[&str],
        include_files: &[&str],
        exclude_files: &[&str],
    ) -> FilterRules {
        FilterRules {
            include_folders: RuleSet::compile(include_folders).unwrap(),
            exclude_folders: RuleSet::compile(exclude_folders).unwrap(),
            include_files: RuleSet::compile(include_files).unwrap(),
            exclude_files: RuleSet::compile(exclude_files).unwrap(),
        }
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let r = rule("*.txt");
        assert!(r.matches("notes.txt"));
        assert!(r.matches("NOTES.TXT"));
        assert!(!r.matches("docs/notes.txt"));
        assert!(!r.matches("notes.txt.bak"));
    }

    #[test]
    fn test_literal_pattern_is_anchored() {
        let r = rule("bin");
        assert!(r.matches("bin"));
        assert!(r.matches("BIN"));
        assert!(!r.matches("src/bin"));
        assert!(!r.matches("binary"));
        // regex metacharacters are literal
        assert!(rule("a+b.(c)").matches("a+b.(c)"));
        assert!(!rule("a.c").matches("abc"));
    }

    #[test]
    fn test_double_star_crosses_separators() {
        let r = rule("**/_artifacts");
        assert!(r.matches("_artifacts"));
        assert!(r.matches("src/_artifacts"));
        assert!(r.matches("a/b/c/_artifacts"));
        assert!(!r.matches("a/b/_artifacts_old"));

        let r = rule("**/*.rs");
        assert!(r.matches("main.rs"));
        assert!(r.matches("src/deep/lib.rs"));

        let r = rule("src/**");
        assert!(r.matches("src"));
        assert!(r.matches("src/a/b"));
        assert!(!r.matches("srcs"));

        let r = rule("a**b");
        assert!(r.matches("ab"));
        assert!(r.matches("a/x/b"));
    }

    #[test]
    fn test_wildcard_segments() {
        let r = rule("*.git*");
        assert!(r.matches(".git"));
        assert!(r.matches(".github"));
        assert!(!r.matches("src/.git"));
    }

    #[test]
    fn test_backslashes_are_separators() {
        assert!(rule("src\\*.rs").matches("src/lib.rs"));
        assert!(rule("src/*.rs").matches("src\\lib.rs"));
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        for bad in ["", "   ", "a\u{0}b", "tab\there"] {
            let err = PatternRule::compile(bad).unwrap_err();
            assert!(err.is_configuration(), "{bad:?} should be rejected");
        }
        assert!(RuleSet::compile(&["*.rs", ""]).is_err());
    }

    #[test]
    fn test_folder_exclusion_independent_of_inclusion() {
        let r = rules(&["*"], &["sub"], &[], &[]);
        let d = r.folder_decision("sub", false);
        assert!(d.included);
        assert!(d.excluded);

        let d = r.folder_decision("other", false);
        assert!(d.included && !d.excluded);
    }

    #[test]
    fn test_folder_inclusion_is_inherited() {
        let r = rules(&["src"], &[], &[], &[]);
        assert!(!r.folder_decision(".", false).included);
        assert!(r.folder_decision("src", false).included);
        assert!(r.folder_decision("src/inner", true).included);
        assert!(!r.folder_decision("docs", false).included);
    }

    #[test]
    fn test_file_policy() {
        let r = rules(&[], &[], &["*.txt"], &["secret*"]);

        // name match alone is enough
        assert!(r.file_decision("a.txt", false).is_eligible());
        // neither folder nor name
        assert!(!r.file_decision("a.bin", false).is_eligible());
        // folder inclusion makes any name eligible
        assert!(r.file_decision("a.bin", true).is_eligible());
        // exclusion wins over both
        let d = r.file_decision("secret.txt", true);
        assert!(d.included_by_name && d.folder_included && d.excluded);
        assert!(!d.is_eligible());
    }

    #[test]
    fn test_empty_include_files_accepts_all_names() {
        let r = rules(&[], &[], &[], &[]);
        assert!(r.file_decision("anything.xyz", false).is_eligible());
    }

    proptest! {
        #[test]
        fn prop_star_matches_every_path(path in "[A-Za-z0-9_. -]{1,12}(/[A-Za-z0-9_. -]{1,12}){0,5}") {
            prop_assert!(rule("*").matches(&path));
        }

        #[test]
        fn prop_matching_ignores_case(name in "[a-z]{1,10}\\.[a-z]{1,4}") {
            let upper = name.to_uppercase();
            prop_assert!(rule(&name).matches(&upper));
            prop_assert!(rule(&upper).matches(&name));
        }
    }
}
