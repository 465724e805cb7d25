//! Progress reporting with indicatif

use bootflash_core::flash::Progress;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter drawing one indicatif bar per operation
#[derive(Default)]
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for IndicatifProgress {
    fn init(&mut self, total: u64) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn set_position(&mut self, position: u64) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(position);
        }
    }

    fn finalize(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
    }
}
