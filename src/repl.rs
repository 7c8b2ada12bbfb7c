//! The interactive question loop.
//!
//! ```text
//!            ┌──────── blank line ───────┐
//!            ▼                           │
//!     AwaitingInput ── question ──► Processing
//!        │    ▲                          │
//!        │    └──── answer or error ─────┘
//!        │
//!        └── "exit" / EOF ──► Terminated
//! ```
//!
//! Console I/O is generic over [`BufRead`] and [`Write`], so the loop runs
//! the same against a terminal or an in-memory buffer. Query failures are
//! printed and the loop carries on; only console I/O errors end it early.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use kbqa_core::models::{Answer, ScoredChunk};
use kbqa_core::qa::QaChain;

/// Shown before every read.
pub const PROMPT: &str = "\nYour question: ";
/// Shown once setup succeeds.
pub const READY_MESSAGE: &str = "\n> RAG chain is ready. Ask a question or type 'exit' to quit.";
const GOODBYE: &str = "> Goodbye!";
const THINKING: &str = "> Thinking...";
const SNIPPET_CHARS: usize = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Processing(String),
    Terminated,
}

/// What one line of input asks the loop to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopInput {
    Exit,
    Blank,
    Question(String),
}

/// Classify a raw input line. `exit` matches case-insensitively, ignoring
/// surrounding whitespace.
pub fn classify_input(line: &str) -> LoopInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LoopInput::Blank
    } else if trimmed.eq_ignore_ascii_case("exit") {
        LoopInput::Exit
    } else {
        LoopInput::Question(trimmed.to_string())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReplOptions {
    /// Print the retrieved chunks under each answer.
    pub show_sources: bool,
}

/// Counters for a finished session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub questions: usize,
    pub answered: usize,
    pub failed: usize,
}

/// Run the loop until `exit` or end of input.
pub async fn run_loop<R: BufRead, W: Write>(
    chain: &QaChain,
    mut input: R,
    output: &mut W,
    options: &ReplOptions,
) -> io::Result<LoopSummary> {
    let mut summary = LoopSummary::default();
    let mut state = LoopState::AwaitingInput;

    loop {
        state = match state {
            LoopState::AwaitingInput => {
                write!(output, "{}", PROMPT)?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    writeln!(output)?;
                    writeln!(output, "{}", GOODBYE)?;
                    LoopState::Terminated
                } else {
                    match classify_input(&line) {
                        LoopInput::Exit => {
                            writeln!(output, "{}", GOODBYE)?;
                            LoopState::Terminated
                        }
                        LoopInput::Blank => LoopState::AwaitingInput,
                        LoopInput::Question(question) => LoopState::Processing(question),
                    }
                }
            }
            LoopState::Processing(question) => {
                writeln!(output, "{}", THINKING)?;
                output.flush()?;
                summary.questions += 1;

                let started = Instant::now();
                match chain.ask(&question).await {
                    Ok(answer) => {
                        tracing::debug!(
                            sources = answer.sources.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "question answered"
                        );
                        print_answer(output, &answer, options)?;
                        summary.answered += 1;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "question failed");
                        writeln!(output, "An error occurred: {}", e)?;
                        summary.failed += 1;
                    }
                }
                LoopState::AwaitingInput
            }
            LoopState::Terminated => break,
        };
    }

    output.flush()?;
    Ok(summary)
}

fn print_answer<W: Write>(output: &mut W, answer: &Answer, options: &ReplOptions) -> io::Result<()> {
    writeln!(output, "\n> {}", answer.text)?;
    if options.show_sources {
        for (rank, source) in answer.sources.iter().enumerate() {
            writeln!(output, "{}", format_source(rank + 1, source))?;
        }
    }
    Ok(())
}

fn format_source(rank: usize, source: &ScoredChunk) -> String {
    format!(
        "  [{}] chunk {} (score {:.3}): {}",
        rank,
        source.chunk.chunk_index,
        source.score,
        snippet(&source.chunk.text)
    )
}

/// First line-folded [`SNIPPET_CHARS`] characters of `text`.
fn snippet(text: &str) -> String {
    let folded: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if folded.chars().count() <= SNIPPET_CHARS {
        folded
    } else {
        let mut cut: String = folded.chars().take(SNIPPET_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_input() {
        assert_eq!(classify_input("exit\n"), LoopInput::Exit);
        assert_eq!(classify_input("  EXIT  \r\n"), LoopInput::Exit);
        assert_eq!(classify_input("Exit"), LoopInput::Exit);
        assert_eq!(classify_input("   \n"), LoopInput::Blank);
        assert_eq!(
            classify_input("exit now?\n"),
            LoopInput::Question("exit now?".to_string())
        );
        assert_eq!(
            classify_input(" What is Rust? \n"),
            LoopInput::Question("What is Rust?".to_string())
        );
    }

    #[test]
    fn test_snippet_folds_and_truncates() {
        assert_eq!(snippet("a\nb\t c"), "a b c");
        let long = "x".repeat(200);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
        assert!(s.ends_with("..."));
    }
}
