//! Section grammar and line classification.
//!
//! The target device family emits a flat configuration: section membership is
//! not indented, it is implied by a section-opening line and closed by a
//! universal terminator (`exit`). The classifier here turns that convention
//! into typed, explicitly-nested lines up front, so the tree builder never
//! has to track an "inside a section" flag.

use regex::Regex;

use crate::error::{Error, Result};

/// The universal section terminator for the default grammar.
pub const DEFAULT_TERMINATOR: &str = "exit";

/// Default section-opening patterns, anchored to the whole line.
const DEFAULT_OPENERS: &[&str] = &[
    r"^vlan database$",
    r"^ip access-list \S+$",
    r"^line \S+$",
    r"^interface \S+$",
    r"^interface lag \S+$",
    r"^service \S+$",
];

/// How a raw configuration line participates in section structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Opens a section; following lines nest under it until the terminator.
    Opener,
    /// Closes the most recently opened section.
    Terminator,
    /// An ordinary command line.
    Plain,
}

/// A raw line annotated with its section membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// Exact line text, trimmed of surrounding whitespace.
    pub text: String,
    /// Structural role of the line.
    pub kind: LineKind,
    /// Ordered path of section headers this line is nested under. The
    /// terminator itself is not nested; its parents are the path that
    /// remains after its section closes.
    pub parents: Vec<String>,
}

/// The set of patterns that identify section-opening lines, plus the
/// terminator token that closes the current section.
///
/// The default rule set matches the EdgeSwitch grammar; callers targeting a
/// different flat-config device can supply their own patterns.
#[derive(Debug, Clone)]
pub struct SectionRules {
    openers: Vec<Regex>,
    terminator: String,
}

impl Default for SectionRules {
    fn default() -> Self {
        let openers = DEFAULT_OPENERS
            .iter()
            .map(|p| Regex::new(p).expect("default opener pattern is valid"))
            .collect();
        Self {
            openers,
            terminator: DEFAULT_TERMINATOR.to_string(),
        }
    }
}

impl SectionRules {
    /// Build a custom rule set from opener patterns and a terminator token.
    pub fn new<S: AsRef<str>>(patterns: &[S], terminator: impl Into<String>) -> Result<Self> {
        let openers = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            openers,
            terminator: terminator.into(),
        })
    }

    /// The terminator token that closes an open section.
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    /// Whether a line opens a section.
    pub fn is_opener(&self, line: &str) -> bool {
        self.openers.iter().any(|re| re.is_match(line))
    }

    /// Whether a line closes the current section.
    pub fn is_terminator(&self, line: &str) -> bool {
        line == self.terminator
    }

    /// Classify raw configuration text into typed, nested lines.
    ///
    /// Blank lines and `!` comment lines are dropped. Malformed nesting is a
    /// structural error: a terminator with no open section, a section left
    /// open at end of input, or an opener encountered while another section
    /// is still open (the source grammar requires the terminator first).
    pub fn classify(&self, text: &str) -> Result<Vec<ClassifiedLine>> {
        let mut classified = Vec::new();
        let mut open: Vec<String> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('!') {
                continue;
            }

            if self.is_terminator(line) {
                if open.pop().is_none() {
                    return Err(Error::UnexpectedTerminator { line: idx + 1 });
                }
                classified.push(ClassifiedLine {
                    text: line.to_string(),
                    kind: LineKind::Terminator,
                    parents: open.clone(),
                });
            } else if self.is_opener(line) {
                if let Some(current) = open.last() {
                    return Err(Error::NestedSection {
                        section: line.to_string(),
                        open: current.clone(),
                        line: idx + 1,
                    });
                }
                classified.push(ClassifiedLine {
                    text: line.to_string(),
                    kind: LineKind::Opener,
                    parents: open.clone(),
                });
                open.push(line.to_string());
            } else {
                classified.push(ClassifiedLine {
                    text: line.to_string(),
                    kind: LineKind::Plain,
                    parents: open.clone(),
                });
            }
        }

        if let Some(section) = open.pop() {
            return Err(Error::UnterminatedSection { section });
        }

        Ok(classified)
    }
}

/// Lines excluded from equality and diff computations, given as exact
/// matches or regular expressions (anchored at the start of the line).
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
}

#[derive(Debug, Clone)]
enum IgnorePattern {
    Literal(String),
    Pattern(Regex),
}

impl IgnoreRules {
    /// Compile ignore entries. Entries that are not valid regular
    /// expressions fall back to exact line matches.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let patterns = entries
            .iter()
            .map(|e| {
                let entry = e.as_ref();
                let anchored = if entry.starts_with('^') {
                    entry.to_string()
                } else {
                    format!("^{entry}")
                };
                match Regex::new(&anchored) {
                    Ok(re) => IgnorePattern::Pattern(re),
                    Err(_) => IgnorePattern::Literal(entry.to_string()),
                }
            })
            .collect();
        Self { patterns }
    }

    /// Whether no ignore entries were configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a line is excluded from comparison.
    pub fn matches(&self, line: &str) -> bool {
        let line = line.trim();
        self.patterns.iter().any(|p| match p {
            IgnorePattern::Literal(l) => l == line,
            IgnorePattern::Pattern(re) => re.is_match(line),
        })
    }

    /// Drop ignored lines from raw configuration text.
    pub fn filter_text(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        text.lines()
            .filter(|line| !self.matches(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_openers() {
        let rules = SectionRules::default();
        assert!(rules.is_opener("interface 0/1"));
        assert!(rules.is_opener("vlan database"));
        assert!(rules.is_opener("ip access-list EXAMPLE"));
        assert!(rules.is_opener("line console"));
        assert!(!rules.is_opener("description uplink"));
        assert!(!rules.is_opener("ip address 10.0.0.1 255.255.255.0"));
        assert!(rules.is_terminator("exit"));
    }

    #[test]
    fn test_classify_flat_and_nested() {
        let rules = SectionRules::default();
        let text = "domain-name example.net\ninterface 0/1\ndescription uplink\nexit\nsnmp-server community public\n";
        let lines = rules.classify(text).unwrap();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].kind, LineKind::Plain);
        assert!(lines[0].parents.is_empty());
        assert_eq!(lines[1].kind, LineKind::Opener);
        assert_eq!(lines[2].kind, LineKind::Plain);
        assert_eq!(lines[2].parents, vec!["interface 0/1".to_string()]);
        assert_eq!(lines[3].kind, LineKind::Terminator);
        assert!(lines[3].parents.is_empty());
        assert!(lines[4].parents.is_empty());
    }

    #[test]
    fn test_classify_skips_comments_and_blanks() {
        let rules = SectionRules::default();
        let lines = rules
            .classify("!Current Configuration:\n\ndomain-name example.net\n")
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "domain-name example.net");
    }

    #[test]
    fn test_classify_opener_inside_open_section_is_error() {
        let rules = SectionRules::default();
        let err = rules
            .classify("interface 0/1\ninterface 0/2\nexit\nexit\n")
            .unwrap_err();
        match err {
            Error::NestedSection { section, open, line } => {
                assert_eq!(section, "interface 0/2");
                assert_eq!(open, "interface 0/1");
                assert_eq!(line, 2);
            }
            other => panic!("expected NestedSection, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_terminator_without_opener_is_error() {
        let rules = SectionRules::default();
        let err = rules.classify("domain-name example.net\nexit\n").unwrap_err();
        assert!(matches!(err, Error::UnexpectedTerminator { line: 2 }));
    }

    #[test]
    fn test_classify_unterminated_section_is_error() {
        let rules = SectionRules::default();
        let err = rules.classify("interface 0/1\ndescription uplink\n").unwrap_err();
        match err {
            Error::UnterminatedSection { section } => assert_eq!(section, "interface 0/1"),
            other => panic!("expected UnterminatedSection, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_rules() {
        let rules = SectionRules::new(&[r"^zone \S+$"], "end").unwrap();
        assert!(rules.is_opener("zone trusted"));
        assert!(!rules.is_opener("interface 0/1"));
        assert!(rules.is_terminator("end"));
        assert!(!rules.is_terminator("exit"));
    }

    #[test]
    fn test_ignore_rules_literal_and_pattern() {
        let ignore = IgnoreRules::new(&["clock timezone .*", "hostname sw1"]);
        assert!(ignore.matches("clock timezone PST -8"));
        assert!(ignore.matches("hostname sw1"));
        assert!(!ignore.matches("hostname sw2"));
    }

    #[test]
    fn test_ignore_filter_text() {
        let ignore = IgnoreRules::new(&["serial-number .*"]);
        let filtered = ignore.filter_text("hostname sw1\nserial-number F09F\ndomain-name example.net");
        assert_eq!(filtered, "hostname sw1\ndomain-name example.net");
    }

    #[test]
    fn test_ignore_rules_empty_passthrough() {
        let ignore = IgnoreRules::new::<&str>(&[]);
        assert!(ignore.is_empty());
        assert_eq!(ignore.filter_text("a\nb"), "a\nb");
    }
}
