//! Terminal progress bar fed by the dispatch progress channel.

use anyhow::{Context, Result};
use bulkmail_core::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

/// Creates a bar for `total` recipients.
pub fn bar(total: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(to_u64(total));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Failed to set progress style")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(bar)
}

/// Mirrors progress updates onto `bar` until the run is done or the
/// dispatch is dropped.
pub async fn follow(mut updates: watch::Receiver<Progress>, bar: ProgressBar) {
    loop {
        let progress = *updates.borrow_and_update();
        render(&bar, &progress);
        if progress.is_done() || updates.changed().await.is_err() {
            break;
        }
    }
}

fn render(bar: &ProgressBar, progress: &Progress) {
    bar.set_position(to_u64(progress.processed));
    bar.set_message(format!(
        "{} sent, {} failed",
        progress.succeeded, progress.failed
    ));
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
