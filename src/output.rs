use colored::Colorize;
use indicatif::ProgressBar;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::debug;

use crate::github_client::DEFAULT_HOST;
use crate::types::Repository;

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub colorize: bool,
    pub hyperlinks: bool,
    /// Host used in hyperlink blob URLs.
    pub host: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colorize: false,
            hyperlinks: false,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

struct Streams {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

/// Serialized writer for matches and diagnostics.
///
/// Each call formats and writes one whole message under a single lock, so
/// lines from concurrent tasks never interleave.
pub struct Output {
    streams: Mutex<Streams>,
    options: OutputOptions,
    progress: Option<ProgressBar>,
}

impl Output {
    /// Writes to arbitrary sinks; tests hand in in-memory buffers.
    pub fn new(
        stdout: Box<dyn Write + Send>,
        stderr: Box<dyn Write + Send>,
        options: OutputOptions,
    ) -> Self {
        Self {
            streams: Mutex::new(Streams { stdout, stderr }),
            options,
            progress: None,
        }
    }

    /// Writes to the process's stdout and stderr.
    pub fn stdio(options: OutputOptions) -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()), options)
    }

    /// Routes writes around `progress` so the bar is never torn.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    /// Writes `owner/name:path`, optionally hyperlinked to the blob.
    pub fn matched(&self, repo: &Repository, path: &str) {
        let mut line = if self.options.colorize {
            format!(
                "{}/{}:{}",
                repo.owner.cyan(),
                repo.name.green().bold(),
                path.white()
            )
        } else {
            format!("{}/{}:{}", repo.owner, repo.name, path)
        };

        if self.options.hyperlinks {
            line = hyperlink(&repo.blob_url(&self.options.host, path), &line);
        }

        self.write(false, &line);
    }

    /// Writes `Warning: <message>` to stderr, the prefix yellow when colorized.
    pub fn warning(&self, message: impl Display) {
        let prefix = if self.options.colorize {
            "Warning:".yellow().to_string()
        } else {
            "Warning:".to_string()
        };
        self.write(true, &format!("{} {}", prefix, message));
    }

    /// Writes an unprefixed note to stderr.
    pub fn info(&self, message: impl Display) {
        self.write(true, &message.to_string());
    }

    fn write(&self, to_stderr: bool, line: &str) {
        // Hold the lock for the whole line so concurrent writers never interleave
        let emit = || {
            let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
            let stream = if to_stderr {
                &mut streams.stderr
            } else {
                &mut streams.stdout
            };
            if let Err(e) = writeln!(stream, "{}", line).and_then(|_| stream.flush()) {
                debug!("Failed to write output: {}", e);
            }
        };

        match &self.progress {
            Some(progress) => progress.suspend(emit),
            None => emit(),
        }
    }
}

/// OSC 8 terminal hyperlink.
pub fn hyperlink(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{repository, SharedBuf};
    use std::sync::Arc;

    fn output(options: OutputOptions) -> (Output, SharedBuf, SharedBuf) {
        let stdout = SharedBuf::default();
        let stderr = SharedBuf::default();
        let output = Output::new(Box::new(stdout.clone()), Box::new(stderr.clone()), options);
        (output, stdout, stderr)
    }

    #[test]
    fn test_match_format() {
        let (out, stdout, stderr) = output(OutputOptions::default());
        out.matched(&repository("octocat", "Hello-World"), "cmd/tool.go");
        assert_eq!(stdout.contents(), "octocat/Hello-World:cmd/tool.go\n");
        assert!(stderr.contents().is_empty());
    }

    #[test]
    fn test_match_hyperlink() {
        let (out, stdout, _) = output(OutputOptions {
            hyperlinks: true,
            host: "github.com".to_string(),
            ..OutputOptions::default()
        });
        out.matched(&repository("cli", "cli"), "go.mod");
        assert_eq!(
            stdout.contents(),
            "\x1b]8;;https://github.com/cli/cli/blob/main/go.mod\x1b\\cli/cli:go.mod\x1b]8;;\x1b\\\n"
        );
    }

    #[test]
    fn test_diagnostics_go_to_stderr() {
        let (out, stdout, stderr) = output(OutputOptions::default());
        out.warning("cli/cli: not found");
        out.info("No repositories match the filter");
        assert!(stdout.contents().is_empty());
        assert_eq!(
            stderr.lines(),
            vec![
                "Warning: cli/cli: not found".to_string(),
                "No repositories match the filter".to_string()
            ]
        );
    }

    #[test]
    fn test_concurrent_writes_stay_whole() {
        let (out, stdout, _) = output(OutputOptions::default());
        let out = Arc::new(out);
        let repo = repository("octocat", "Hello-World");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let out = out.clone();
                let repo = repo.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        out.matched(&repo, &format!("dir{}/file{}.txt", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = stdout.lines();
        assert_eq!(lines.len(), 400);
        for line in lines {
            assert!(line.starts_with("octocat/Hello-World:dir"), "torn line {:?}", line);
            assert!(line.ends_with(".txt"), "torn line {:?}", line);
        }
    }
}
