//! Terminal rendering of a research session
//!
//! Prints only what changed since the previous notification: new phases,
//! new retrievals, new messages and the growth of a streaming assistant
//! message.

use crate::runtime::RenderSink;
use crate::state_machine::{Lifecycle, Phase, Role, Session};
use std::io::{self, Write};

/// Incremental line-oriented renderer over any writer (stdout in the binary)
pub struct TerminalSink<W: Write + Send> {
    out: W,
    announced_start: bool,
    announced_end: bool,
    phase: Option<Phase>,
    retrievals: usize,
    messages: usize,
    /// Bytes of the last message already written
    tail_len: usize,
    /// A streaming message is mid-line
    line_open: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            announced_start: false,
            announced_end: false,
            phase: None,
            retrievals: 0,
            messages: 0,
            tail_len: 0,
            line_open: false,
        }
    }

    #[allow(dead_code)] // used in tests
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, session: &Session) -> io::Result<()> {
        if let Lifecycle::Active { session_id } = &session.lifecycle {
            if !self.announced_start {
                self.announced_start = true;
                self.line(&format!("Research session {session_id} started"))?;
            }
        }

        if self.phase.as_ref() != Some(&session.phase) && session.lifecycle != Lifecycle::New {
            self.phase = Some(session.phase.clone());
            self.line(&format!("[phase: {}]", session.phase))?;
        }

        for retrieval in session.retrievals.iter().skip(self.retrievals) {
            let line = match &retrieval.source {
                Some(source) => format!("  retrieved: {} ({source})", retrieval.title),
                None => format!("  retrieved: {}", retrieval.title),
            };
            self.line(&line)?;
        }
        self.retrievals = session.retrievals.len();

        self.render_messages(session)?;

        if let Lifecycle::Failed { reason, .. } = &session.lifecycle {
            if !self.announced_end {
                self.announced_end = true;
                self.line(&format!("Research failed: {reason}"))?;
            }
        }

        self.out.flush()
    }

    fn render_messages(&mut self, session: &Session) -> io::Result<()> {
        // Growth of the message that was last written
        if let Some(last) = self.messages.checked_sub(1).and_then(|i| session.messages.get(i)) {
            if let Some(delta) = last.content.get(self.tail_len..) {
                if !delta.is_empty() {
                    self.out.write_all(delta.as_bytes())?;
                    self.tail_len = last.content.len();
                    self.line_open = true;
                }
            }
        }

        for message in session.messages.iter().skip(self.messages) {
            self.close_line()?;
            match message.role {
                // Already on the user's screen
                Role::User => {}
                Role::Assistant if message.clarification => {
                    writeln!(self.out, "? {}", message.content)?;
                }
                Role::Assistant => {
                    write!(self.out, "{}", message.content)?;
                    self.line_open = true;
                }
            }
            self.tail_len = message.content.len();
        }
        self.messages = session.messages.len();
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        self.close_line()?;
        writeln!(self.out, "{text}")
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            self.line_open = false;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

impl<W: Write + Send> RenderSink for TerminalSink<W> {
    fn state_changed(&mut self, session: &Session) {
        if let Err(e) = self.render(session) {
            tracing::debug!(error = %e, "Failed to render session");
        }
    }

    fn reveal_report(&mut self, report: &str) {
        let result = self
            .close_line()
            .and_then(|()| writeln!(self.out, "\n===== Report =====\n{report}"))
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to render report");
        }
    }

    fn input_ignored(&mut self, _text: &str) {
        let result = self
            .close_line()
            .and_then(|()| writeln!(self.out, "(research in progress, input not sent)"));
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to render notice");
        }
    }
}
