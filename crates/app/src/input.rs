use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

pub const PROMPT: &str = "> ";
pub const HISTORY_FILE_NAME: &str = "history.txt";

/// Lines typed at the prompt, read by a rustyline editor on its own thread.
///
/// The reader waits for [`resume`](Self::resume) after every line before it prompts again,
/// so command output lands above the next prompt and nothing is read once the session
/// stops asking.
pub struct InputLines {
    lines: mpsc::UnboundedReceiver<String>,
    resume: mpsc::UnboundedSender<()>,
    reader: Option<JoinHandle<()>>,
}

impl InputLines {
    pub fn spawn(history_path: Option<PathBuf>) -> io::Result<Self> {
        let (line_tx, lines) = mpsc::unbounded_channel();
        let (resume, resume_rx) = mpsc::unbounded_channel();
        let reader = thread::Builder::new()
            .name("finscribe-input".to_string())
            .spawn(move || read_lines(line_tx, resume_rx, history_path))?;
        Ok(Self {
            lines,
            resume,
            reader: Some(reader),
        })
    }

    /// Lines fed from somewhere other than a terminal, e.g. a script.
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        let (resume, _) = mpsc::unbounded_channel();
        Self {
            lines,
            resume,
            reader: None,
        }
    }

    /// Next line, or `None` once input ended.
    pub async fn next(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Lets the reader prompt for the next line.
    pub fn resume(&self) {
        let _ = self.resume.send(());
    }

    /// Stops the reader and waits for it to save the input history.
    pub fn close(self) {
        let Self {
            lines,
            resume,
            reader,
        } = self;
        drop(resume);
        drop(lines);
        if let Some(reader) = reader
            && reader.join().is_err()
        {
            tracing::warn!("input reader thread panicked");
        }
    }
}

fn read_lines(
    line_tx: mpsc::UnboundedSender<String>,
    mut resume_rx: mpsc::UnboundedReceiver<()>,
    history_path: Option<PathBuf>,
) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            tracing::error!(error = %error, "failed to create line editor");
            return;
        }
    };
    if let Some(path) = &history_path
        && let Err(error) = editor.load_history(path)
    {
        tracing::debug!(path = %path.display(), error = %error, "no input history loaded");
    }

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if line_tx.send(line).is_err() || resume_rx.blocking_recv().is_none() {
                    break;
                }
            }
            // Ctrl+C drops the current line only.
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(error) => {
                tracing::warn!(error = %error, "failed to read input line");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        save_history(&mut editor, path);
    }
}

fn save_history(editor: &mut DefaultEditor, path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(error) = std::fs::create_dir_all(parent)
    {
        tracing::warn!(path = %parent.display(), error = %error, "failed to create history directory");
        return;
    }
    if let Err(error) = editor.save_history(path) {
        tracing::warn!(path = %path.display(), error = %error, "failed to save input history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fed_lines_arrive_in_order_then_end() {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let mut input = InputLines::from_lines(line_rx);
        line_tx.send("Q1".to_string()).unwrap();
        line_tx.send("quit".to_string()).unwrap();
        drop(line_tx);

        assert_eq!(input.next().await.as_deref(), Some("Q1"));
        input.resume();
        assert_eq!(input.next().await.as_deref(), Some("quit"));
        assert_eq!(input.next().await, None);
        input.close();
    }
}
