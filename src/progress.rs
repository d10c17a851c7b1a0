use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

const NO_PROGRESS_ENV: &str = "CONCLAVE_NO_PROGRESS";
const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// Print a styled stage header to the diagnostic stream.
pub fn stage_header(label: &str) {
    if std::io::stderr().is_tty() {
        eprintln!("{}", format!("==> {label}").bold().cyan());
    } else {
        eprintln!("==> {label}");
    }
}

/// Monotonic per-stage timer that logs elapsed time on finish.
pub struct StageTimer {
    label: &'static str,
    start: Instant,
}

pub fn start_timer(label: &'static str) -> StageTimer {
    StageTimer {
        label,
        start: Instant::now(),
    }
}

impl StageTimer {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!("{} finished in {:.1}s", self.label, elapsed.as_secs_f64());
        elapsed
    }
}

/// Owned handle to a background "working" ticker on stderr. Must be stopped
/// before any further diagnostic output so lines do not interleave.
pub struct Indicator {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Start the working indicator, or return `None` when stderr is not a
/// terminal or suppression is requested via `CONCLAVE_NO_PROGRESS`.
pub fn start_indicator(label: &str) -> Option<Indicator> {
    if !std::io::stderr().is_tty() || std::env::var_os(NO_PROGRESS_ENV).is_some() {
        return None;
    }

    let (stop, mut rx) = oneshot::channel();
    let label = label.to_string();
    let handle = tokio::spawn(async move {
        let mut frame = 0usize;
        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = sleep(Duration::from_millis(150)) => {
                    eprint!("\r{} {}...", FRAMES[frame % FRAMES.len()], label);
                    let _ = std::io::stderr().flush();
                    frame += 1;
                }
            }
        }
        clear_line();
    });

    Some(Indicator { stop, handle })
}

impl Indicator {
    /// Stop the ticker and wait for the line to be cleared.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

fn clear_line() {
    use crossterm::cursor::MoveToColumn;
    use crossterm::terminal::{Clear, ClearType};
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_measures_elapsed() {
        let timer = start_timer("test");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.finish() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn indicator_suppressed_by_env() {
        // stderr is not a tty under the test harness either way, but the env
        // gate must hold regardless of where the tests run.
        std::env::set_var(NO_PROGRESS_ENV, "1");
        assert!(start_indicator("working").is_none());
        std::env::remove_var(NO_PROGRESS_ENV);
    }
}
