use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::utils::consts::PROGRESS_UPDATE_INTERVAL_MS;

/// 进度条集合，可在多个处理线程之间共享（`Arc<ProgressManager>`）
pub struct ProgressManager {
    mp: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn with_bar<T>(&self, id: &str, f: impl FnOnce(&ProgressBar) -> T) -> Result<T, String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        bars.get(id)
            .map(f)
            .ok_or_else(|| format!("Progress bar '{}' not found", id))
    }

    /// 创建新的进度条
    /// - `id`: 进度条唯一标识
    /// - `total`: 总进度值（符号数或帧数）
    /// - `template`: `templates` 中的模板
    /// - `message`: 初始消息
    pub fn create_bar(
        &self,
        id: &str,
        total: u64,
        template: &str,
        message: &str,
    ) -> Result<(), String> {
        let style = ProgressStyle::default_bar()
            .template(template)
            .map_err(|e| format!("Bad template for '{}': {}", id, e))?
            .progress_chars("█▉▊▋▌▍▎▏ ");

        let mut bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        if bars.contains_key(id) {
            return Err(format!("Progress bar '{}' already exists", id));
        }

        let pb = self.mp.add(ProgressBar::new(total));
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_UPDATE_INTERVAL_MS));
        bars.insert(id.to_string(), pb);
        Ok(())
    }

    /// 增加进度条位置
    pub fn inc(&self, id: &str, value: u64) -> Result<(), String> {
        self.with_bar(id, |pb| pb.inc(value))
    }

    pub fn set_message(&self, id: &str, message: &str) -> Result<(), String> {
        self.with_bar(id, |pb| pb.set_message(message.to_string()))
    }

    /// 完成进度条（保留显示）
    pub fn finish(&self, id: &str, message: &str) -> Result<(), String> {
        self.with_bar(id, |pb| pb.finish_with_message(message.to_string()))
    }

    pub fn position(&self, id: &str) -> Result<u64, String> {
        self.with_bar(id, |pb| pb.position())
    }

    /// 清理所有进度条
    pub fn clear_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                pb.finish_and_clear();
            }
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub mod templates {
    pub const DECODE: &str =
        "\u{f04e6} MSC  [{bar:30.blue}] {percent}% ({pos}/{len} symbols) {msg}";
    pub const SYNTH: &str =
        "\u{f048a} SYN  [{bar:30.cyan}] {percent}% ({pos}/{len} frames) {msg}";
}
