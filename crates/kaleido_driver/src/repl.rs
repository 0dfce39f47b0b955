// crates/kaleido_driver/src/repl.rs
//
// Interactive loop with line editing and persisted history.
//
// Lines accumulate until they form complete statements; an unfinished
// `def` or expression gets a continuation prompt instead of an error.

use crate::session::{self, Session};
use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

const HISTORY_FILE: &str = ".kaleido_history";
const PROMPT: &str = "ready> ";
const CONTINUATION: &str = "  ...> ";

pub struct Repl {
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> Result<Self> {
        let mut editor =
            DefaultEditor::new().map_err(|e| anyhow!("failed to start line editor: {}", e))?;
        let _ = editor.load_history(&history_file_path());
        Ok(Self { editor })
    }

    /// Reads and runs statements until end of input or interrupt.
    pub fn run(&mut self, session: &mut Session) -> Result<()> {
        let mut pending = String::new();

        loop {
            let prompt = if pending.is_empty() { PROMPT } else { CONTINUATION };
            let line = match self.editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C abandons the statement being typed.
                    pending.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(anyhow!("failed to read line: {}", e)),
            };

            if pending.is_empty() && line.trim().is_empty() {
                continue;
            }
            pending.push_str(&line);
            pending.push('\n');

            if session::is_incomplete(&pending, session.precedence()) {
                continue;
            }

            let _ = self.editor.add_history_entry(pending.trim_end());
            session.run_source(&pending);
            pending.clear();
        }

        // Whatever was left unfinished still gets its error.
        if !pending.trim().is_empty() {
            session.run_source(&pending);
        }
        let _ = self.editor.save_history(&history_file_path());
        Ok(())
    }
}

fn history_file_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}
