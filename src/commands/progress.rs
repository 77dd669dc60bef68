//! Progress reporting with indicatif

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rnand_core::decode::ExtractProgress;

/// Create a page-counting progress bar with a phase message
pub fn create_page_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(page_bar_style(phase).unwrap_or_else(|_| ProgressStyle::default_bar()));
    pb
}

fn page_bar_style(phase: &str) -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} pages ({{per_sec}}, {{eta}}) {}",
            phase
        ))?
        .progress_chars("#>-"))
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &str) {
        let pb = self.multi.add(create_page_bar(total, phase));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractProgress for IndicatifProgress {
    fn started(&mut self, label: &str, total_pages: u64) {
        self.create_bar(total_pages, label);
    }

    fn advanced(&mut self, pages_done: u64) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(pages_done);
        }
    }

    fn finished(&mut self) {
        self.finish("done");
    }
}
