//! 日志增量读取
//!
//! 每个被跟踪的文件维护一份 `TailState`：
//! - 首次见到文件时只检查末尾若干行（冷启动策略，避免代理启动时告警泛滥）
//! - 之后只读取 `last_read_offset` 之后新增的完整行
//! - 末尾未以换行结束的半行保留到下一次事件，不会对写了一半的行告警
//! - 文件被截断（大小小于偏移量）时从头读取

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// 冷启动时读取的文件尾部窗口大小（64KB）
pub const COLD_START_WINDOW: u64 = 64 * 1024;

/// 单个文件的读取位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailState {
    pub path: PathBuf,
    /// 已消费的字节数
    pub last_read_offset: u64,
    initialized: bool,
}

impl TailState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_read_offset: 0,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// 日志尾部跟踪器
///
/// 一个跟踪器只对应一个路径，由该路径的 worker 独占，因此内部不需要锁。
#[derive(Debug)]
pub struct LogTailTracker {
    state: TailState,
    cold_start_lines: usize,
}

impl LogTailTracker {
    pub fn new(path: impl Into<PathBuf>, cold_start_lines: usize) -> Self {
        Self {
            state: TailState::new(path),
            cold_start_lines,
        }
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    pub fn offset(&self) -> u64 {
        self.state.last_read_offset
    }

    /// 遗忘读取位置，下次读取按首次见到处理（文件被删除或重命名后）
    pub fn reset(&mut self) {
        self.state.last_read_offset = 0;
        self.state.initialized = false;
    }

    /// 读取自上次成功读取以来追加的完整行
    ///
    /// # Errors
    ///
    /// 文件无法打开或读取时返回 `AppError::Read`，读取位置保持不变
    pub async fn read_appended(&mut self) -> Result<Vec<String>> {
        let path = self.state.path.clone();
        let mut file = File::open(&path)
            .await
            .map_err(|e| AppError::read_error(&path, e))?;

        let file_size = file
            .metadata()
            .await
            .map_err(|e| AppError::read_error(&path, e))?
            .len();

        if !self.state.initialized {
            return self.cold_start(file, file_size).await;
        }

        let offset = self.state.last_read_offset;
        let start_offset = if file_size < offset {
            warn!(
                file = %path.display(),
                size = file_size,
                offset,
                "File truncated, reading from beginning"
            );
            0
        } else {
            offset
        };

        if start_offset >= file_size {
            self.state.last_read_offset = start_offset;
            return Ok(Vec::new());
        }

        let buf = read_range(&mut file, &path, start_offset, file_size).await?;
        let (lines, consumed) = split_complete_lines(&buf);
        self.state.last_read_offset = start_offset + consumed;

        debug!(
            lines_read = lines.len(),
            file = %path.display(),
            offset_start = start_offset,
            offset_end = self.state.last_read_offset,
            "Read new lines from file"
        );

        Ok(lines)
    }

    async fn cold_start(&mut self, mut file: File, file_size: u64) -> Result<Vec<String>> {
        let path = self.state.path.clone();
        let window_start = file_size.saturating_sub(COLD_START_WINDOW);
        let buf = read_range(&mut file, &path, window_start, file_size).await?;

        // 窗口起点落在行中间时丢弃第一段残行
        let skip = if window_start > 0 {
            buf.iter()
                .position(|b| *b == b'\n')
                .map(|i| i + 1)
                .unwrap_or(buf.len())
        } else {
            0
        };

        let (mut lines, consumed) = split_complete_lines(&buf[skip..]);
        let keep_from = lines.len().saturating_sub(self.cold_start_lines);
        let lines = lines.split_off(keep_from);

        self.state.last_read_offset = window_start + skip as u64 + consumed;
        self.state.initialized = true;

        debug!(
            file = %path.display(),
            lines_examined = lines.len(),
            offset = self.state.last_read_offset,
            "Cold start on newly observed file"
        );

        Ok(lines)
    }
}

async fn read_range(file: &mut File, path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|e| AppError::read_error(path, e))?;

    let mut buf = Vec::with_capacity((end - start) as usize);
    file.take(end - start)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| AppError::read_error(path, e))?;

    Ok(buf)
}

/// 把缓冲区切分为完整行，返回 (行, 消费的字节数)
///
/// 最后一个换行符之后的内容不计入消费。
pub fn split_complete_lines(buf: &[u8]) -> (Vec<String>, u64) {
    let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
        return (Vec::new(), 0);
    };

    let lines = buf[..last_newline]
        .split(|b| *b == b'\n')
        .map(|raw| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            String::from_utf8_lossy(raw).into_owned()
        })
        .collect();

    (lines, last_newline as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_split_complete_lines() {
        let (lines, consumed) = split_complete_lines(b"one\ntwo\r\nthr");
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(consumed, 9);

        let (lines, consumed) = split_complete_lines(b"no newline yet");
        assert!(lines.is_empty());
        assert_eq!(consumed, 0);
    }

    #[tokio::test]
    async fn test_second_increment_returns_only_new_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "first 1\nfirst 2\n");

        let mut tracker = LogTailTracker::new(&path, 10);
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["first 1", "first 2"]);

        append(&path, "second 1\nsecond 2\n");
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["second 1", "second 2"]);

        let lines = tracker.read_appended().await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_partial_line_held_until_completed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let mut tracker = LogTailTracker::new(&path, 10);
        assert!(tracker.read_appended().await.unwrap().is_empty());

        append(&path, "2024 ERROR disk");
        assert!(tracker.read_appended().await.unwrap().is_empty());
        assert_eq!(tracker.offset(), 0);

        append(&path, " full\n");
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["2024 ERROR disk full"]);
        assert_eq!(tracker.offset(), 21);
    }

    #[tokio::test]
    async fn test_truncation_rereads_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "a fairly long line that will be rotated away\n");

        let mut tracker = LogTailTracker::new(&path, 10);
        tracker.read_appended().await.unwrap();
        let before = tracker.offset();

        std::fs::write(&path, "fresh\n").unwrap();
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["fresh"]);
        assert!(tracker.offset() < before);
        assert_eq!(tracker.offset(), 6);
    }

    #[tokio::test]
    async fn test_cold_start_examines_only_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let content: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        append(&path, &content);

        let mut tracker = LogTailTracker::new(&path, 10);
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "line 40");
        assert_eq!(lines[9], "line 49");
        assert_eq!(tracker.offset(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_cold_start_window_skips_leading_fragment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.log");
        let long_line = "x".repeat(COLD_START_WINDOW as usize);
        append(&path, &format!("{}\nlast ERROR\n", long_line));

        let mut tracker = LogTailTracker::new(&path, 10);
        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["last ERROR"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let mut tracker = LogTailTracker::new(dir.path().join("gone.log"), 10);

        let err = tracker.read_appended().await.unwrap_err();
        assert!(matches!(err, AppError::Read { .. }));
        assert!(!tracker.state().is_initialized());
    }

    #[tokio::test]
    async fn test_reset_treats_file_as_new() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "old\n");

        let mut tracker = LogTailTracker::new(&path, 10);
        tracker.read_appended().await.unwrap();

        std::fs::remove_file(&path).unwrap();
        tracker.reset();
        append(&path, "recreated\n");

        let lines = tracker.read_appended().await.unwrap();
        assert_eq!(lines, vec!["recreated"]);
    }
}
