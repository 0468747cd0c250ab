use colored::Colorize;
use ghtail_common::types::{OutputEvent, RunIdentity, RunSummary};
use std::io::{self, Write};
use std::time::Duration;

/// `CI #12, 2m 5s`. The elapsed part is left out when the start time is unknown.
pub fn summary_line(summary: &RunSummary) -> String {
    let mut line = format!("{} #{}", summary.workflow, summary.number);
    if let Some(elapsed) = summary.elapsed() {
        line.push_str(", ");
        line.push_str(&format_elapsed(elapsed));
    }
    line
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, m, s) => format!("{}h {}m {}s", h, m, s),
    }
}

/// Writes attributed output, with a header whenever the job or step changes.
pub struct Printer<W: Write> {
    writer: W,
    job_filter: Option<String>,
    current_run: Option<RunIdentity>,
    last_header: Option<(String, String)>,
}

impl<W: Write> Printer<W> {
    pub fn new(writer: W, job_filter: Option<String>) -> Self {
        Self {
            writer,
            job_filter,
            current_run: None,
            last_header: None,
        }
    }

    /// Output of any other run is dropped from now on.
    pub fn follow(&mut self, run: RunIdentity) {
        self.current_run = Some(run);
        self.last_header = None;
    }

    pub fn print(&mut self, event: &OutputEvent) -> io::Result<()> {
        if self
            .current_run
            .as_ref()
            .is_some_and(|run| *run != event.run)
        {
            return Ok(());
        }
        if self
            .job_filter
            .as_ref()
            .is_some_and(|job| *job != event.job_name)
        {
            return Ok(());
        }

        let header = (event.job_name.clone(), event.display_step_name());
        if self.last_header.as_ref() != Some(&header) {
            writeln!(
                self.writer,
                "{} {}",
                format!("[{}]", header.0).cyan().bold(),
                header.1.yellow()
            )?;
            self.last_header = Some(header);
        }

        for line in &event.lines {
            writeln!(self.writer, "{}", line)?;
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
