//! Terminal prompt for missing documents.

use std::io::{BufRead, Write};

use chirp_codegen::MissingReferenceHandler;
use chirp_types::Decision;
use colored::Colorize;

/// Asks on `output` and reads the answer from `input`.
///
/// Anything other than `y`/`yes` (including end of input) aborts.
pub struct PromptHandler<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptHandler<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> MissingReferenceHandler for PromptHandler<R, W> {
    fn on_missing(&mut self, referenced: &str, enclosing: &str) -> Decision {
        let _ = write!(
            self.output,
            "  {} '{}' (used by '{}') does not exist. Continue without it? [y/N] ",
            "?".yellow().bold(),
            referenced,
            enclosing
        );
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => Decision::Continue,
                _ => Decision::Abort,
            },
            Err(_) => Decision::Abort,
        }
    }
}
