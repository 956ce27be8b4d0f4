//! Editor-facing completion types and the glue around a worker response.

use serde::Serialize;

use crate::config::shell_name;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    /// Text inserted into the buffer.
    pub word: String,
    /// Description shown next to the word.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl CompletionItem {
    /// Candidate without a description.
    #[must_use]
    pub fn word(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            info: None,
        }
    }

    /// Candidate with a description.
    #[must_use]
    pub fn with_info(word: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            info: Some(info.into()),
        }
    }

    /// Turn one raw worker line into a candidate.
    ///
    /// Empty lines yield `None`. A trailing `//` collapses to `/`. The line is
    /// then split at the first dialect delimiter into word and info.
    #[must_use]
    pub fn from_line(line: &str, dialect: Dialect) -> Option<Self> {
        if line.is_empty() {
            return None;
        }

        let line = match line.strip_suffix("//") {
            Some(stem) => format!("{stem}/"),
            None => line.to_owned(),
        };

        let item = match dialect.delimiter().and_then(|d| line.split_once(d)) {
            Some((word, info)) => Self::with_info(word, info),
            None => Self::word(line),
        };
        Some(item)
    }
}

/// Output format of a capture script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `word -- description`
    Zsh,
    /// `word<TAB>description`
    Fish,
    /// Bare words.
    Plain,
}

impl Dialect {
    /// Dialect of the given shell name or path.
    #[must_use]
    pub fn for_shell(shell: &str) -> Self {
        match shell_name(shell) {
            "zsh" => Self::Zsh,
            "fish" => Self::Fish,
            _ => Self::Plain,
        }
    }

    /// Word/info separator, if the dialect has one.
    #[must_use]
    pub fn delimiter(self) -> Option<&'static str> {
        match self {
            Self::Zsh => Some(" -- "),
            Self::Fish => Some("\t"),
            Self::Plain => None,
        }
    }
}

/// Convert a worker response into candidates, dropping empty lines.
#[must_use]
pub fn post_process(lines: &[String], dialect: Dialect) -> Vec<CompletionItem> {
    lines
        .iter()
        .filter_map(|line| CompletionItem::from_line(line, dialect))
        .collect()
}

/// Byte offset where the word under completion starts: the beginning of the
/// trailing run of non-whitespace characters.
#[must_use]
pub fn complete_position(input: &str) -> usize {
    input
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(idx, c)| idx + c.len_utf8())
}

/// Where the editor is asking for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    /// A text buffer.
    #[default]
    Insert,
    /// The editor's command line.
    CommandLine,
}

/// Editor state for one completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionContext {
    /// Text before the cursor.
    pub input: String,
    /// Editor mode.
    pub mode: EditorMode,
    /// Prompt line supplied by a terminal UI, replacing `input` in insert mode.
    pub input_override: Option<String>,
}

impl CompletionContext {
    /// Context for `input` in `mode`.
    #[must_use]
    pub fn new(input: impl Into<String>, mode: EditorMode) -> Self {
        Self {
            input: input.into(),
            mode,
            input_override: None,
        }
    }

    /// Query line to send to the worker.
    ///
    /// In command-line mode a leading `!` (`:!cmd`) is dropped.
    #[must_use]
    pub fn query(&self) -> &str {
        match self.mode {
            EditorMode::CommandLine => self.input.strip_prefix('!').unwrap_or(&self.input),
            EditorMode::Insert => self.input_override.as_deref().unwrap_or(&self.input),
        }
    }
}
