use super::Segment;
use crate::core::{NerError, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Delegates segmentation to an external program. The text is written to
/// the program's stdin and whitespace separated tokens are read back from
/// its stdout.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
}

impl CommandSegmenter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parses `program arg1 arg2`. Arguments are split on whitespace only.
    pub fn parse(cmdline: &str) -> Result<Self> {
        let mut parts = cmdline.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| NerError::Config("empty segmenter command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Segment for CommandSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NerError::Segmentation(format!("cannot run {}: {}", self.program, e)))?;

        // stdin is fed from its own thread while stdout is drained here.
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|s| {
            let writer = s.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(text.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });

        let output =
            output.map_err(|e| NerError::Segmentation(format!("wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NerError::Segmentation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        written.map_err(|e| NerError::Segmentation(format!("write to {}: {}", self.program, e)))?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| NerError::Segmentation(format!("{} produced invalid UTF-8: {}", self.program, e)))?;

        Ok(stdout.split_whitespace().map(String::from).collect())
    }

    fn name(&self) -> &str {
        "command"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let seg = CommandSegmenter::parse("khmercut  --sep ' '").unwrap();
        assert_eq!(seg.program(), "khmercut");
        assert!(CommandSegmenter::parse("   ").is_err());
    }

    #[test]
    fn test_reads_tokens_from_stdout() {
        let seg = CommandSegmenter::new("cat", vec![]);
        let tokens = seg.segment("សួស្តី ប្រាក់").unwrap();
        assert_eq!(tokens, vec!["សួស្តី", "ប្រាក់"]);
    }

    #[test]
    fn test_large_input_does_not_stall() {
        let text = "ក".repeat(200_000);
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let seg = CommandSegmenter::new("cat", vec![]);
            let _ = tx.send(seg.segment(&text));
        });

        let tokens = rx
            .recv_timeout(std::time::Duration::from_secs(20))
            .expect("segmenting through cat did not finish")
            .unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].chars().count(), 200_000);
    }

    #[test]
    fn test_missing_program_is_segmentation_error() {
        let seg = CommandSegmenter::new("/nonexistent/khmercut", vec![]);
        assert!(matches!(seg.segment("ក"), Err(NerError::Segmentation(_))));
    }

    #[test]
    fn test_non_zero_exit_is_segmentation_error() {
        let seg = CommandSegmenter::new("false", vec![]);
        assert!(matches!(seg.segment("ក"), Err(NerError::Segmentation(_))));
    }
}
