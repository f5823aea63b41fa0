use std::io::{self, BufRead};

/// Where the REPL reads commands from.
pub trait LineSource {
    /// The next line without its line terminator, or `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines typed on the process's standard input.
pub struct StdinLines {
    stdin: io::Stdin,
    buffer: String,
}

impl StdinLines {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin(),
            buffer: String::new(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for StdinLines {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        let n = self.stdin.lock().read_line(&mut self.buffer)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buffer.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<L: LineSource + ?Sized> LineSource for &mut L {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        (**self).next_line()
    }
}
