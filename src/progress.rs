use clap::ValueEnum;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const MAX_STORED_WARNINGS: usize = 32;

/// `--progress` flag value. `auto` draws a bar on a terminal and falls back
/// to line output when stderr is redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    Auto,
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Display {
    Bar,
    Lines,
    Silent,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    mode: ProgressMode,
    line_interval: Duration,
    tty_override: Option<bool>,
}

impl ProgressConfig {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            line_interval: Duration::from_secs(2),
            tty_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_tty_override(mut self, is_tty: bool) -> Self {
        self.tty_override = Some(is_tty);
        self
    }

    fn display(self) -> Display {
        match self.mode {
            ProgressMode::Rich => Display::Bar,
            ProgressMode::Plain => Display::Lines,
            ProgressMode::Quiet => Display::Silent,
            ProgressMode::Auto => {
                let tty = self
                    .tty_override
                    .unwrap_or_else(|| std::io::stderr().is_terminal());
                if tty {
                    Display::Bar
                } else {
                    Display::Lines
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterializeSummary {
    pub output_dir: PathBuf,
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub copied_files: usize,
    pub failed_files: usize,
    pub class_count: usize,
    pub elapsed: Duration,
    pub avg_bytes_per_sec: f64,
    pub warning_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub checked_classes: usize,
    pub checked_files: usize,
    pub checked_bytes: u64,
    pub elapsed: Duration,
    pub avg_bytes_per_sec: f64,
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub elapsed: Duration,
    pub processed_bytes: u64,
    pub avg_bytes_per_sec: f64,
    pub warning_count: usize,
    pub warnings: Vec<String>,
}

/// Byte-based progress for one phase of a run. Updated inline by the caller;
/// rich mode draws an indicatif bar, plain mode prints throttled lines to
/// stderr, quiet mode prints nothing.
pub struct ProgressReporter {
    label: String,
    mode: Display,
    line_interval: Duration,
    bar: Option<ProgressBar>,
    started: Instant,
    last_line_at: Instant,
    stage: String,
    total_bytes: u64,
    processed_bytes: u64,
    warnings: Vec<String>,
    warning_count: usize,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total_bytes: u64, config: ProgressConfig) -> Self {
        let label = label.into();
        let mode = config.display();
        let now = Instant::now();

        let bar = if mode == Display::Bar {
            Some(rich_bar(&label, total_bytes))
        } else {
            None
        };

        Self {
            label,
            mode,
            line_interval: config.line_interval,
            bar,
            started: now,
            last_line_at: now.checked_sub(config.line_interval).unwrap_or(now),
            stage: "starting".to_string(),
            total_bytes,
            processed_bytes: 0,
            warnings: Vec::new(),
            warning_count: 0,
            finished: false,
        }
    }

    pub fn set_stage(&mut self, stage: impl Into<String>) {
        self.stage = stage.into();
        if let Some(bar) = &self.bar {
            bar.set_message(self.stage.clone());
        }
        self.render_line(true);
    }

    pub fn inc_bytes(&mut self, delta: u64) {
        if delta == 0 {
            return;
        }
        self.processed_bytes = self.processed_bytes.saturating_add(delta);
        if self.total_bytes > 0 {
            self.processed_bytes = self.processed_bytes.min(self.total_bytes);
        }
        if let Some(bar) = &self.bar {
            bar.set_position(self.processed_bytes);
        }
        self.render_line(false);
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.emit_message("INFO", message.as_ref());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.emit_message("WARN", &message);
        if self.warnings.len() >= MAX_STORED_WARNINGS {
            self.warnings.remove(0);
        }
        self.warnings.push(message);
        self.warning_count += 1;
    }

    pub fn finish(mut self, final_message: impl Into<String>) -> ProgressOutcome {
        self.finalize(Some(final_message.into()))
    }

    fn finalize(&mut self, final_message: Option<String>) -> ProgressOutcome {
        let elapsed = self.started.elapsed();
        let avg = average_rate(self.processed_bytes, elapsed);

        if !self.finished {
            self.finished = true;
            match self.mode {
                Display::Silent => {}
                Display::Lines => {
                    self.render_line(true);
                    if let Some(msg) = final_message.as_deref() {
                        eprintln!("[DONE] {}: {}", self.label, msg);
                    }
                }
                Display::Bar => {
                    if let Some(bar) = &self.bar {
                        match final_message {
                            Some(msg) => bar.finish_with_message(msg),
                            None => bar.finish_and_clear(),
                        }
                    }
                }
            }
        }

        ProgressOutcome {
            elapsed,
            processed_bytes: self.processed_bytes,
            avg_bytes_per_sec: avg,
            warning_count: self.warning_count,
            warnings: self.warnings.clone(),
        }
    }

    fn render_line(&mut self, force: bool) {
        if self.mode != Display::Lines {
            return;
        }
        let now = Instant::now();
        if !force && now.duration_since(self.last_line_at) < self.line_interval {
            return;
        }
        self.last_line_at = now;

        let elapsed = self.started.elapsed();
        let rate = average_rate(self.processed_bytes, elapsed);
        let pct = if self.total_bytes == 0 {
            0.0
        } else {
            (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0
        };
        eprintln!(
            "[PROGRESS] {} elapsed={} stage={} done={} / {} ({:.1}%) rate={} ETA={}",
            self.label,
            format_duration(elapsed),
            self.stage,
            HumanBytes(self.processed_bytes),
            HumanBytes(self.total_bytes),
            pct,
            format_rate(rate),
            remaining_time(self.total_bytes, self.processed_bytes, rate)
                .map_or_else(|| "--:--".to_string(), format_duration),
        );
    }

    fn emit_message(&self, level: &str, message: &str) {
        match self.mode {
            Display::Silent => {}
            Display::Lines => {
                eprintln!("[{}] {}: {}", level, self.label, message);
            }
            Display::Bar => match &self.bar {
                Some(bar) => bar.println(format!("[{}] {}: {}", level, self.label, message)),
                None => eprintln!("[{}] {}: {}", level, self.label, message),
            },
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        let _ = self.finalize(None);
    }
}

fn rich_bar(label: &str, total_bytes: u64) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes.max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} ETA {eta_precise} | {msg}",
    ) {
        bar.set_style(style);
    }
    bar.set_message(format!("{} starting", label));
    bar
}

pub fn average_rate(bytes: u64, elapsed: Duration) -> f64 {
    bytes as f64 / elapsed.as_secs_f64().max(1e-6)
}

/// `mm:ss`, or `hh:mm:ss` once a run passes the hour.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h == 0 {
        format!("{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}")
    }
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    if bytes_per_sec < 1.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", HumanBytes(bytes_per_sec as u64))
}

/// Time left at the current average rate. `None` once the phase is done or
/// before any bytes have moved.
fn remaining_time(total_bytes: u64, processed_bytes: u64, bytes_per_sec: f64) -> Option<Duration> {
    let remaining = total_bytes.checked_sub(processed_bytes).filter(|r| *r > 0)?;
    if bytes_per_sec < 1.0 {
        return None;
    }
    Some(Duration::from_secs_f64(remaining as f64 / bytes_per_sec))
}
