use anyhow::Result;
use indicatif::{ProgressBar as IndicatifProgressBar, ProgressStyle};

/// Progress bar over the search pages of a batch run
#[derive(Clone)]
pub struct ProgressBar {
    pb: IndicatifProgressBar,
}

impl ProgressBar {
    pub fn new(total: u64, quiet: bool) -> Result<Self> {
        if quiet {
            return Ok(Self {
                pb: IndicatifProgressBar::hidden(),
            });
        }

        let pb = IndicatifProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages | {msg}")?
                .progress_chars("█▓▒░ "),
        );
        Ok(Self { pb })
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.pb.set_message(msg.into());
    }

    /// Print a line above the bar without tearing it
    pub fn println(&self, line: impl AsRef<str>) {
        self.pb.println(line);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
