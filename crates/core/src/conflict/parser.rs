//! Conflict-marker parsing.
//!
//! Scans marker-delimited text in a single pass and produces the ordered list
//! of [`ConflictHunk`]s. Lines outside any hunk are not captured.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::model::ConflictHunk;
use crate::errors::ParseError;

/// Start of the current-branch section.
pub const OURS_MARKER: &str = "<<<<<<<";
/// Start of the common-ancestor section (diff3 style).
pub const BASE_MARKER: &str = "|||||||";
/// Start of the incoming-branch section.
pub const SEPARATOR_MARKER: &str = "=======";
/// End of the hunk.
pub const END_MARKER: &str = ">>>>>>>";

/// How malformed marker sequences are handled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Ignore stray markers, keep nested starts as content, drop unterminated hunks.
    #[default]
    Lenient,
    /// Reject any malformed sequence with a [`ParseError`].
    Strict,
}

impl std::str::FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown parse mode '{other}': use 'lenient' or 'strict'")),
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Ours,
    Base,
    Separator,
    End,
}

impl Marker {
    fn classify(line: &str) -> Option<Self> {
        [
            (OURS_MARKER, Self::Ours),
            (BASE_MARKER, Self::Base),
            (SEPARATOR_MARKER, Self::Separator),
            (END_MARKER, Self::End),
        ]
        .into_iter()
        .find(|(prefix, _)| is_marker_line(line, prefix))
        .map(|(_, marker)| marker)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ours => OURS_MARKER,
            Self::Base => BASE_MARKER,
            Self::Separator => SEPARATOR_MARKER,
            Self::End => END_MARKER,
        }
    }
}

/// Any line that starts with the seven-character prefix; the rest is a label.
fn is_marker_line(line: &str, prefix: &str) -> bool {
    line.starts_with(prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InOurs,
    InBase,
    InTheirs,
}

/// Single-pass scanner over marker-delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictParser {
    mode: ParseMode,
}

impl ConflictParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Parse `text` belonging to `file_path` into its ordered hunks.
    ///
    /// In [`ParseMode::Lenient`] this never fails.
    pub fn detect_conflicts(
        &self,
        text: &str,
        file_path: &str,
    ) -> Result<Vec<ConflictHunk>, ParseError> {
        let strict = self.mode == ParseMode::Strict;
        let mut hunks = Vec::new();
        let mut state = ScanState::Outside;
        let mut current: Option<ConflictHunk> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let marker = Marker::classify(line);

            if current.is_none() {
                match marker {
                    Some(Marker::Ours) => {
                        let id = format!("hunk-{}", hunks.len() + 1);
                        current = Some(ConflictHunk::new(id, line_no));
                        state = ScanState::InOurs;
                    }
                    Some(other) if strict => {
                        return Err(ParseError::UnexpectedMarker {
                            path: file_path.to_string(),
                            line: line_no,
                            marker: other.as_str().to_string(),
                        });
                    }
                    Some(other) => {
                        debug!(path = file_path, line = line_no, marker = other.as_str(), "ignoring stray marker");
                    }
                    None => {}
                }
                continue;
            }
            let Some(hunk) = current.as_mut() else {
                continue;
            };

            match marker {
                Some(Marker::Ours) => {
                    if strict {
                        return Err(ParseError::NestedStart {
                            path: file_path.to_string(),
                            line: line_no,
                        });
                    }
                    debug!(path = file_path, line = line_no, "nested start marker kept as content");
                    push_line(hunk, state, line);
                }
                Some(Marker::Base) => {
                    if strict && state != ScanState::InOurs {
                        return Err(ParseError::MisplacedBase {
                            path: file_path.to_string(),
                            line: line_no,
                        });
                    }
                    hunk.base_content = Some(Vec::new());
                    state = ScanState::InBase;
                }
                Some(Marker::Separator) => {
                    if strict && state == ScanState::InTheirs {
                        return Err(ParseError::UnexpectedMarker {
                            path: file_path.to_string(),
                            line: line_no,
                            marker: SEPARATOR_MARKER.to_string(),
                        });
                    }
                    state = ScanState::InTheirs;
                }
                Some(Marker::End) => {
                    if strict && state != ScanState::InTheirs {
                        return Err(ParseError::UnexpectedMarker {
                            path: file_path.to_string(),
                            line: line_no,
                            marker: END_MARKER.to_string(),
                        });
                    }
                    if let Some(mut done) = current.take() {
                        done.end_line = line_no;
                        debug!(
                            path = file_path,
                            hunk = %done.id,
                            start = done.start_line,
                            end = done.end_line,
                            "hunk closed"
                        );
                        hunks.push(done);
                    }
                    state = ScanState::Outside;
                }
                None => push_line(hunk, state, line),
            }
        }

        if let Some(open) = current {
            if strict {
                return Err(ParseError::Unterminated {
                    path: file_path.to_string(),
                    start_line: open.start_line,
                });
            }
            debug!(path = file_path, start = open.start_line, "dropping unterminated hunk");
        }

        info!(path = file_path, count = hunks.len(), "conflict scan complete");
        Ok(hunks)
    }
}

fn push_line(hunk: &mut ConflictHunk, state: ScanState, line: &str) {
    let target = match state {
        ScanState::InOurs => &mut hunk.our_content,
        ScanState::InTheirs => &mut hunk.their_content,
        ScanState::InBase => hunk.base_content.get_or_insert_with(Vec::new),
        ScanState::Outside => return,
    };
    target.push(line.to_string());
}

/// Parse with the default (lenient) mode.
pub fn detect_conflicts(text: &str, file_path: &str) -> Vec<ConflictHunk> {
    ConflictParser::default()
        .detect_conflicts(text, file_path)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HUNKS: &str = "\
fn main() {
<<<<<<< HEAD
    let x = 1;
=======
    let x = 2;
>>>>>>> feature
    println!(\"{}\", x);
<<<<<<< HEAD
    a();
    b();
=======
    c();
>>>>>>> feature
}
";

    fn strict() -> ConflictParser {
        ConflictParser::new(ParseMode::Strict)
    }

    #[test]
    fn test_single_hunk() {
        let text = "<<<<<<< ours\nconst a = 1;\n=======\nconst a = 2;\n>>>>>>> theirs\n";
        let hunks = detect_conflicts(text, "a.ts");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].id, "hunk-1");
        assert_eq!(hunks[0].our_content, vec!["const a = 1;"]);
        assert_eq!(hunks[0].their_content, vec!["const a = 2;"]);
        assert_eq!(hunks[0].base_content, None);
        assert!(!hunks[0].is_resolved());
    }

    #[test]
    fn test_hunks_in_source_order_with_lines() {
        let hunks = strict().detect_conflicts(TWO_HUNKS, "main.rs").unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!((hunks[0].start_line, hunks[0].end_line), (2, 6));
        assert_eq!((hunks[1].start_line, hunks[1].end_line), (8, 13));
        assert_eq!(hunks[1].id, "hunk-2");
        assert_eq!(hunks[1].our_content, vec!["    a();", "    b();"]);
        assert_eq!(hunks[1].their_content, vec!["    c();"]);
        for h in &hunks {
            assert!(!h.our_content.is_empty());
            assert!(!h.their_content.is_empty());
        }
    }

    #[test]
    fn test_no_markers_no_hunks() {
        assert!(detect_conflicts("plain\ntext\n", "a.txt").is_empty());
        assert!(detect_conflicts("", "a.txt").is_empty());
    }

    #[test]
    fn test_diff3_base_section() {
        let text = "<<<<<<< ours\nmine\n||||||| base\norig\n=======\nyours\n>>>>>>> theirs";
        let hunks = strict().detect_conflicts(text, "a.txt").unwrap();
        assert_eq!(hunks[0].base_content, Some(vec!["orig".to_string()]));
        assert_eq!(hunks[0].our_content, vec!["mine"]);
        assert_eq!(hunks[0].their_content, vec!["yours"]);
    }

    #[test]
    fn test_empty_base_section_is_present() {
        let text = "<<<<<<<\nmine\n|||||||\n=======\nyours\n>>>>>>>";
        let hunks = strict().detect_conflicts(text, "a.txt").unwrap();
        assert_eq!(hunks[0].base_content, Some(Vec::new()));
    }

    #[test]
    fn test_crlf_input() {
        let text = "<<<<<<< ours\r\nmine\r\n=======\r\nyours\r\n>>>>>>> theirs\r\n";
        let hunks = strict().detect_conflicts(text, "a.txt").unwrap();
        assert_eq!(hunks[0].our_content, vec!["mine"]);
        assert_eq!(hunks[0].their_content, vec!["yours"]);
    }

    #[test]
    fn test_longer_marker_runs_match_by_prefix() {
        let text = "<<<<<<<< ours\na\n========\nb\n>>>>>>>> theirs\n";
        let hunks = strict().detect_conflicts(text, "a.txt").unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].our_content, vec!["a"]);
        assert_eq!(hunks[0].their_content, vec!["b"]);

        let text = "<<<<<<< ours\na\n========\nb\n>>>>>>> theirs\n";
        let hunks = strict().detect_conflicts(text, "a.txt").unwrap();
        assert_eq!(hunks[0].our_content, vec!["a"]);
        assert_eq!(hunks[0].their_content, vec!["b"]);
    }

    #[test]
    fn test_lenient_ignores_stray_markers() {
        let text = "=======\n>>>>>>> x\n<<<<<<<\na\n=======\nb\n>>>>>>>\n";
        let hunks = detect_conflicts(text, "a.txt");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].start_line, 3);
    }

    #[test]
    fn test_strict_rejects_stray_markers() {
        let err = strict().detect_conflicts("text\n=======\n", "a.txt").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedMarker {
                path: "a.txt".into(),
                line: 2,
                marker: "=======".into(),
            }
        );
    }

    #[test]
    fn test_nested_start_lenient_is_content() {
        let text = "<<<<<<< a\nx\n<<<<<<< b\ny\n=======\nz\n>>>>>>>\n";
        let hunks = detect_conflicts(text, "a.txt");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].our_content, vec!["x", "<<<<<<< b", "y"]);
    }

    #[test]
    fn test_nested_start_strict_is_error() {
        let text = "<<<<<<< a\nx\n<<<<<<< b\n";
        let err = strict().detect_conflicts(text, "a.txt").unwrap_err();
        assert!(matches!(err, ParseError::NestedStart { line: 3, .. }));
    }

    #[test]
    fn test_unterminated_hunk() {
        let text = "<<<<<<<\na\n=======\nb\n";
        assert!(detect_conflicts(text, "a.txt").is_empty());
        let err = strict().detect_conflicts(text, "a.txt").unwrap_err();
        assert!(matches!(err, ParseError::Unterminated { start_line: 1, .. }));
    }

    #[test]
    fn test_strict_rejects_base_after_separator() {
        let text = "<<<<<<<\na\n=======\nb\n|||||||\n>>>>>>>\n";
        let err = strict().detect_conflicts(text, "a.txt").unwrap_err();
        assert!(matches!(err, ParseError::MisplacedBase { line: 5, .. }));
    }

    #[test]
    fn test_strict_rejects_end_without_separator() {
        let text = "<<<<<<<\na\n>>>>>>>\n";
        assert!(strict().detect_conflicts(text, "a.txt").is_err());
        let hunks = detect_conflicts(text, "a.txt");
        assert_eq!(hunks.len(), 1);
        assert!(hunks[0].their_content.is_empty());
    }

    #[test]
    fn test_parse_mode_from_str() {
        assert_eq!("STRICT".parse::<ParseMode>(), Ok(ParseMode::Strict));
        assert!("loose".parse::<ParseMode>().is_err());
    }
}
