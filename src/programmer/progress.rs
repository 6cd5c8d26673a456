use regex::Regex;

use super::process::Stream;

/// A progress report on a line of its own, e.g. `42%`
const PERCENT_PATTERN: &str = r"^\d+%$";

/// What a single line of programmer output represents
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LineKind<'a> {
    /// A progress percentage, already clamped to `0..=100`
    Percent(u8),
    /// A line with nothing but whitespace
    Blank,
    /// Anything else, which is logged as-is
    Text(&'a str),
}

/// Sorts lines of programmer output into progress reports and log text
#[derive(Debug, Clone)]
pub struct ProgressParser {
    percent: Regex,
}

impl ProgressParser {
    pub fn new() -> ProgressParser {
        ProgressParser {
            percent: Regex::new(PERCENT_PATTERN).expect("percent pattern is a valid regex"),
        }
    }

    /// Classifies `line`, considering only what follows its last carriage return
    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let line = after_last_cr(line);

        if self.percent.is_match(line) {
            // Only digits precede the '%', so parsing can only fail on overflow
            let value = line[..line.len() - 1].parse::<u64>().unwrap_or(u64::MAX);

            return LineKind::Percent(value.min(100) as u8);
        }

        if line.trim().is_empty() {
            LineKind::Blank
        } else {
            LineKind::Text(line)
        }
    }
}

impl Default for ProgressParser {
    fn default() -> ProgressParser {
        ProgressParser::new()
    }
}

/// Something the presentation layer should show
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Output {
    /// The progress value changed
    Progress(u8),
    /// A line for the log
    Line(String),
}

/// Turns raw process output into log lines and progress updates
///
/// Runs of blank lines are collapsed into a single one, and progress lines update the progress
/// value instead of being logged.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    parser: ProgressParser,
    /// The last progress value that was reported
    percent: u8,
    /// Whether the last logged line was blank
    previous_blank: bool,
    /// Incomplete trailing lines for stdout and stderr
    pending: [String; 2],
}

impl ProgressTracker {
    pub fn new() -> ProgressTracker {
        ProgressTracker::default()
    }

    /// Forgets all state, as is done before every command
    pub fn reset(&mut self) {
        self.percent = 0;
        self.previous_blank = false;

        for pending in &mut self.pending {
            pending.clear();
        }
    }

    /// The current progress value
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Processes a single complete line
    pub fn push_line(&mut self, line: &str) -> Option<Output> {
        match self.parser.classify(line) {
            LineKind::Percent(value) => {
                self.previous_blank = false;

                if value == self.percent {
                    return None;
                }

                self.percent = value;

                Some(Output::Progress(value))
            }
            LineKind::Blank => {
                if self.previous_blank {
                    return None;
                }

                self.previous_blank = true;

                Some(Output::Line(after_last_cr(line).to_string()))
            }
            LineKind::Text(text) => {
                self.previous_blank = false;

                Some(Output::Line(text.to_string()))
            }
        }
    }

    /// Processes a chunk of output read from `stream`
    ///
    /// Complete lines are processed right away, while an unterminated trailing line is kept
    /// until the rest of it arrives. Progress redraws within that trailing line (`10%\r20%\r`)
    /// still update the progress value immediately.
    pub fn feed(&mut self, stream: Stream, chunk: &str) -> Vec<Output> {
        let mut outputs = Vec::new();
        let mut pending = std::mem::take(&mut self.pending[stream.index()]);

        pending.push_str(chunk);

        while let Some(end) = pending.find('\n') {
            let line: String = pending.drain(..=end).collect();
            let line = line.trim_end_matches('\n');
            let line = line.strip_suffix('\r').unwrap_or(line);

            outputs.extend(self.push_line(line));
        }

        // Only a redraw that has been ended by a carriage return is complete
        if let Some(cr) = pending.rfind('\r') {
            let redraw = after_last_cr(&pending[..cr]);

            if let LineKind::Percent(_) = self.parser.classify(redraw) {
                outputs.extend(self.push_line(redraw));
            }
        }

        self.pending[stream.index()] = pending;

        outputs
    }

    /// Processes whatever is left of an unterminated line on `stream`
    pub fn flush(&mut self, stream: Stream) -> Vec<Output> {
        let pending = std::mem::take(&mut self.pending[stream.index()]);

        if pending.is_empty() {
            return Vec::new();
        }

        let line = pending.strip_suffix('\r').unwrap_or(&pending);

        self.push_line(line).into_iter().collect()
    }
}

fn after_last_cr(line: &str) -> &str {
    match line.rfind('\r') {
        Some(cr) => &line[cr + 1..],
        None => line,
    }
}
