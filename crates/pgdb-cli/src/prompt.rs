//! Interactive yes/no confirmation on stdin.

use std::io::{self, BufRead, Write};

use pgdb_core::Prompt;

/// Asks on stdout and reads one line from stdin; only `y`/`Y` confirms.
pub struct StdinPrompt<R> {
    input: R,
}

impl StdinPrompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> StdinPrompt<R> {
    pub fn from_reader(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> Prompt for StdinPrompt<R> {
    fn confirm(&mut self, question: &str) -> bool {
        print!("{question} (Y/N) ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(_) => false,
        }
    }
}
