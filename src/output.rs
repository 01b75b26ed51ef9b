/// Abstraction over user-facing output.
///
/// Command modules write through this trait instead of `println!` so tests
/// can capture what a command reports.
pub trait UserOutput: Send + Sync {
    /// Informational line on stdout.
    fn status(&self, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);

    fn blank(&self) {
        self.status("");
    }
}

/// Standard CLI output: stdout for status, stderr for problems.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }
}

/// Collects output lines, tagged by kind.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingOutput {
    pub lines: parking_lot::Mutex<Vec<(&'static str, String)>>,
}

#[cfg(test)]
impl RecordingOutput {
    pub fn text(&self) -> String {
        self.lines
            .lock()
            .iter()
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn count(&self, kind: &str) -> usize {
        self.lines.lock().iter().filter(|(k, _)| *k == kind).count()
    }
}

#[cfg(test)]
impl UserOutput for RecordingOutput {
    fn status(&self, message: &str) {
        self.lines.lock().push(("status", message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.lines.lock().push(("warning", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().push(("error", message.to_string()));
    }
}
