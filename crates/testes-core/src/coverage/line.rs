//! Source lines and the classifiers that decide which lines can count.

use serde::Serialize;

use super::result::DEAD;

// ============================================================================
// Line Status
// ============================================================================

/// Where a line lands in the coverage figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "count")]
pub enum LineStatus {
    /// Executed the given number of times.
    Tested(u64),
    /// Executable but never executed.
    Untested,
    /// Reported unreachable by the probe.
    Dead,
    /// Never counted: blank, comment, declaration or punctuation.
    Ignored,
}

impl LineStatus {
    /// Classify a raw probe status. An ignorable line is ignored whatever
    /// the probe recorded for it.
    pub fn classify(raw: i64, ignorable: bool) -> Self {
        if ignorable {
            LineStatus::Ignored
        } else if raw > 0 {
            LineStatus::Tested(raw.unsigned_abs())
        } else if raw == DEAD {
            LineStatus::Dead
        } else {
            LineStatus::Untested
        }
    }
}

// ============================================================================
// Line
// ============================================================================

/// One classified source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    number: u32,
    text: String,
    raw: i64,
    status: LineStatus,
}

impl Line {
    pub fn new(number: u32, text: impl Into<String>, raw: i64, classifier: &dyn LineClassifier) -> Self {
        let text = text.into();
        let status = LineStatus::classify(raw, classifier.is_ignorable(&text));
        Line {
            number,
            text,
            raw,
            status,
        }
    }

    /// 1-indexed line number.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Status as recorded by the probe.
    pub fn raw_status(&self) -> i64 {
        self.raw
    }

    pub fn status(&self) -> LineStatus {
        self.status
    }

    /// Times the line executed.
    pub fn count(&self) -> u64 {
        match self.status {
            LineStatus::Tested(count) => count,
            _ => 0,
        }
    }

    pub fn is_tested(&self) -> bool {
        matches!(self.status, LineStatus::Tested(_))
    }

    pub fn is_untested(&self) -> bool {
        self.status == LineStatus::Untested
    }

    pub fn is_dead(&self) -> bool {
        self.status == LineStatus::Dead
    }

    pub fn is_ignored(&self) -> bool {
        self.status == LineStatus::Ignored
    }
}

// ============================================================================
// Classifiers
// ============================================================================

/// Decides whether a source line is non-executable noise.
pub trait LineClassifier {
    fn is_ignorable(&self, line: &str) -> bool;
}

impl<F: Fn(&str) -> bool> LineClassifier for F {
    fn is_ignorable(&self, line: &str) -> bool {
        self(line)
    }
}

/// Heuristic classifier driven by token lists, applied to the trimmed line.
///
/// A line is ignorable when it is blank, starts with one of `prefixes`,
/// starts with one of `keywords` as a whole word, or equals one of `exact`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternClassifier {
    prefixes: Vec<String>,
    keywords: Vec<String>,
    exact: Vec<String>,
}

impl PatternClassifier {
    /// A classifier that only ignores blank lines.
    pub fn blank_only() -> Self {
        PatternClassifier::default()
    }

    /// The general token list: comments, string and symbol continuations,
    /// declaration keywords and lone brackets.
    pub fn standard() -> Self {
        PatternClassifier::blank_only()
            .with_prefixes(["<?", "?>", "/", "*", "'", "\"", ".", "_", "[", "]"])
            .with_keywords([
                "namespace",
                "use",
                "abstract",
                "class",
                "interface",
                "trait",
                "const",
                "return",
                "final",
                "static",
                "public",
                "protected",
                "private",
                "function",
            ])
            .with_exact(["(", ")", ");", "{", "}", "[", "]"])
    }

    /// Token list for Rust sources.
    pub fn rust() -> Self {
        PatternClassifier::blank_only()
            .with_prefixes(["//", "/*", "*", "#[", "#!["])
            .with_keywords([
                "use", "mod", "extern", "pub", "fn", "impl", "trait", "struct", "enum", "type",
                "const", "static", "where",
            ])
            .with_exact([
                "{", "}", "(", ")", "[", "]", ");", "};", "},", "})", "];", "} else {", "else {",
            ])
    }

    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_exact<I, S>(mut self, exact: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact.extend(exact.into_iter().map(Into::into));
        self
    }
}

impl LineClassifier for PatternClassifier {
    fn is_ignorable(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return true;
        }
        if self.exact.iter().any(|tok| trimmed == tok) {
            return true;
        }
        if self.prefixes.iter().any(|tok| trimmed.starts_with(tok.as_str())) {
            return true;
        }
        self.keywords.iter().any(|kw| starts_with_word(trimmed, kw))
    }
}

fn starts_with_word(line: &str, word: &str) -> bool {
    match line.strip_prefix(word) {
        Some(rest) => !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_'),
        None => false,
    }
}
