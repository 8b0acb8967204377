//! 文件监听服务
//!
//! 把 `notify` 的回调转换成有界通道中的 `ChangeEvent`：
//! - 只监听单个目录（非递归）
//! - 回调运行在 notify 自己的线程上，使用 `blocking_send` 形成背压
//! - 丢弃 `FsChangeSource` 即停止监听并关闭通道

use std::path::Path;

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, ChangeKind};

/// 目录变化事件源
pub struct FsChangeSource {
    _watcher: RecommendedWatcher,
}

impl FsChangeSource {
    /// 开始监听目录，返回事件源与事件接收端
    ///
    /// # Errors
    ///
    /// 目录不存在、不是目录或无法建立监听时返回 `AppError::WatchSetup`
    pub fn start(directory: &Path, capacity: usize) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let metadata = std::fs::metadata(directory)
            .map_err(|e| AppError::watch_setup(e.to_string(), directory))?;
        if !metadata.is_dir() {
            return Err(AppError::watch_setup("not a directory", directory));
        }

        let (tx, rx) = mpsc::channel::<ChangeEvent>(capacity);

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate_event(event) {
                    // 接收端已关闭说明代理正在退出
                    if tx.blocking_send(change).is_err() {
                        debug!("Change channel closed, dropping event");
                        break;
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Watch error");
            }
        })
        .map_err(|e| AppError::watch_setup(format!("failed to create file watcher: {}", e), directory))?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::watch_setup(format!("failed to start watching: {}", e), directory))?;

        info!(directory = %directory.display(), "Monitoring directory");

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// 将 notify 事件转换为代理内部的变化事件
///
/// 访问类事件与无法归类的事件被丢弃
pub fn translate_event(event: Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent::new(path, kind))
        .collect()
}
