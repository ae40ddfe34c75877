use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use fandom_extract_core::host::{EditorSink, Notifier, SearchPrompt};

/// Prints the insertion to stdout.
pub struct StdoutEditor;

impl EditorSink for StdoutEditor {
    fn insert_at_cursor(&mut self, text: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}").context("failed to write to stdout")
    }
}

/// Inserts into a note file before the given 1-based line, or at the end.
pub struct NoteFileEditor {
    path: PathBuf,
    line: Option<usize>,
}

impl NoteFileEditor {
    pub fn new(path: impl Into<PathBuf>, line: Option<usize>) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// The note's base name, used as the active document title.
    pub fn title(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
    }
}

impl EditorSink for NoteFileEditor {
    fn insert_at_cursor(&mut self, text: &str) -> Result<()> {
        let existing = if self.path.exists() {
            fs::read_to_string(&self.path)
                .with_context(|| format!("failed to read {}", self.path.display()))?
        } else {
            String::new()
        };
        let updated = insert_at_line(&existing, text, self.line);
        fs::write(&self.path, updated)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

// Keeps the note's line ending; CRLF wins only when the note already uses it.
fn insert_at_line(existing: &str, text: &str, line: Option<usize>) -> String {
    let newline = if existing.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines = existing.lines().map(ToString::to_string).collect::<Vec<_>>();
    let index = line
        .map(|line| line.saturating_sub(1).min(lines.len()))
        .unwrap_or(lines.len());
    lines.splice(index..index, text.lines().map(ToString::to_string));
    let mut output = lines.join(newline);
    output.push_str(newline);
    output
}

pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("notice: {message}");
    }
}

/// Reads one line from stdin. End of input or a blank line dismisses the prompt.
pub struct StdinPrompt;

impl SearchPrompt for StdinPrompt {
    fn prompt(&mut self, message: &str) -> Option<String> {
        eprint!("{message} ");
        io::stderr().flush().ok()?;
        let mut answer = String::new();
        let read = io::stdin().lock().read_line(&mut answer).ok()?;
        if read == 0 {
            return None;
        }
        let answer = answer.trim();
        if answer.is_empty() {
            None
        } else {
            Some(answer.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use fandom_extract_core::host::EditorSink;
    use tempfile::tempdir;

    use super::{NoteFileEditor, insert_at_line};

    #[test]
    fn insert_at_line_places_text_before_requested_line() {
        assert_eq!(insert_at_line("a\nb\n", "X", Some(2)), "a\nX\nb\n");
        assert_eq!(insert_at_line("a\nb\n", "X", Some(1)), "X\na\nb\n");
        assert_eq!(insert_at_line("a\nb\n", "X", Some(99)), "a\nb\nX\n");
        assert_eq!(insert_at_line("a\nb\n", "X", None), "a\nb\nX\n");
        assert_eq!(insert_at_line("", "X", None), "X\n");
    }

    #[test]
    fn insert_at_line_keeps_crlf_line_endings() {
        assert_eq!(
            insert_at_line("# Notes\r\nbody\r\n", "> quote\n> [Fandom](url)", Some(2)),
            "# Notes\r\n> quote\r\n> [Fandom](url)\r\nbody\r\n"
        );
        assert_eq!(insert_at_line("a\nb\n", "X\nY", None), "a\nb\nX\nY\n");
    }

    #[test]
    fn note_editor_uses_file_stem_as_title_and_appends() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Darth Vader.md");
        fs::write(&path, "# Notes\n").expect("write note");

        let mut editor = NoteFileEditor::new(&path, None);
        assert_eq!(editor.title().as_deref(), Some("Darth Vader"));
        editor
            .insert_at_cursor("> Sith Lord.\n> [Fandom](https://starwars.fandom.com/wiki/Vader)")
            .expect("insert");

        let content = fs::read_to_string(&path).expect("read note");
        assert_eq!(
            content,
            "# Notes\n> Sith Lord.\n> [Fandom](https://starwars.fandom.com/wiki/Vader)\n"
        );
    }
}
