//! Terminal feedback: spinners for startup steps and a progress bar fed by
//! transfer events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::common::{EventSink, LogEvents, TransferEvent};

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn finish_spinner_success(spinner: &ProgressBar, msg: &str) {
    spinner.finish_with_message(format!("{} {}", style("✓").green().bold(), msg));
}

pub fn finish_spinner_error(spinner: &ProgressBar, msg: &str) {
    spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), msg));
}

fn transfer_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Event sink that renders progress in the terminal and logs the rest.
#[derive(Default)]
pub struct TerminalEvents {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn print(&self, line: String) {
        match self.bar().as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl EventSink for TerminalEvents {
    fn emit(&self, event: TransferEvent) {
        match &event {
            TransferEvent::DownloadStarted { remote, sequence } => {
                let who = remote.map_or_else(|| "a client".to_string(), |addr| addr.ip().to_string());
                self.print(format!(
                    "{} download #{} started by {}",
                    style("↓").cyan().bold(),
                    sequence,
                    who
                ));
            }
            TransferEvent::Progress(obs) => {
                let mut guard = self.bar();
                let bar = guard.get_or_insert_with(|| transfer_bar(obs.total));
                bar.set_length(obs.total);
                bar.set_position(obs.transferred);
                if obs.percent == 100 {
                    bar.finish();
                    *guard = None;
                }
            }
            TransferEvent::FileReceived { name, bytes } => {
                self.print(format!(
                    "{} received {} ({})",
                    style("✓").green().bold(),
                    name,
                    indicatif::HumanBytes(*bytes)
                ));
            }
            TransferEvent::ClipboardChanged(_) => {}
            TransferEvent::Stopped(termination) => {
                if let Some(bar) = self.bar().take() {
                    bar.abandon();
                }
                println!("{} {}", style("■").yellow().bold(), termination.reason);
            }
        }
        LogEvents.emit(event);
    }
}
