//! 变化事件路由
//!
//! 路由循环消费有界通道中的 `ChangeEvent`，只接受日志后缀的路径。
//! 每个路径拥有一个独立的 worker 任务与通道：
//! - 同一路径的事件按到达顺序串行处理（保证偏移量一致）
//! - 不同路径之间并发处理，路由循环从不等待某个路径的队列
//! - 路径队列已满时事件被合并：worker 下一次读取会取走全部未读字节
//! - `TailState` 由 worker 独占，不需要跨路径加锁
//! - 文件被删除或移走后 worker 退役，映射表中的条目随之回收

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::models::{AgentConfig, ChangeEvent, ChangeKind};
use crate::services::alert_dispatcher::AlertDispatcher;
use crate::services::keyword_scanner::KeywordScanner;
use crate::services::log_tail::LogTailTracker;

/// 每个路径 worker 的待处理事件上限
const PATH_QUEUE_CAPACITY: usize = 64;

/// 单个路径 worker 的处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PathWorkerReport {
    pub events_processed: u64,
    pub read_failures: u64,
    pub alerts_produced: u64,
    pub alerts_delivered: u64,
    /// 因文件消失而退出
    pub retired: bool,
}

/// 路由统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouterReport {
    pub events_received: u64,
    pub events_ignored: u64,
    /// 路径队列已满时被合并掉的事件
    pub events_coalesced: u64,
    pub workers_spawned: u64,
    pub workers_retired: u64,
    pub events_processed: u64,
    pub read_failures: u64,
    pub alerts_produced: u64,
    pub alerts_delivered: u64,
}

impl RouterReport {
    fn absorb(&mut self, worker: PathWorkerReport) {
        self.events_processed += worker.events_processed;
        self.read_failures += worker.read_failures;
        self.alerts_produced += worker.alerts_produced;
        self.alerts_delivered += worker.alerts_delivered;
        if worker.retired {
            self.workers_retired += 1;
        }
    }
}

type WorkerOutcome = std::result::Result<(PathBuf, PathWorkerReport), JoinError>;

enum RouterInput {
    Event(ChangeEvent),
    WorkerExited(WorkerOutcome),
}

/// 路由器持有的路径 worker 句柄
#[derive(Clone)]
struct PathHandle {
    tx: mpsc::Sender<ChangeKind>,
    /// 删除/重命名事件因队列已满被合并时置位，worker 在下一次处理前重置
    reset: Arc<AtomicBool>,
}

/// 变化事件路由器
pub struct ChangeEventRouter {
    config: Arc<AgentConfig>,
    scanner: Arc<KeywordScanner>,
    dispatcher: Arc<AlertDispatcher>,
    workers: HashMap<PathBuf, PathHandle>,
    tasks: JoinSet<(PathBuf, PathWorkerReport)>,
    report: RouterReport,
}

impl ChangeEventRouter {
    pub fn new(config: Arc<AgentConfig>, dispatcher: Arc<AlertDispatcher>) -> Self {
        let scanner = Arc::new(KeywordScanner::new(&config.alert_on_keywords));
        Self {
            config,
            scanner,
            dispatcher,
            workers: HashMap::new(),
            tasks: JoinSet::new(),
            report: RouterReport::default(),
        }
    }

    /// 运行路由循环，直到取消或事件流结束
    ///
    /// 取消后不再接收新事件、不再调度新的路径工作，并等待全部 worker 退出。
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> RouterReport {
        info!(
            suffix = %self.config.agent.log_suffix,
            keywords = ?self.scanner.keywords(),
            "Change event router started"
        );

        loop {
            let input = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Router received cancellation");
                    break;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    RouterInput::WorkerExited(joined)
                }
                event = events.recv() => match event {
                    Some(event) => RouterInput::Event(event),
                    None => {
                        warn!("Change event stream closed");
                        break;
                    }
                },
            };

            match input {
                RouterInput::Event(event) => self.route(event, &shutdown),
                RouterInput::WorkerExited(joined) => self.reap(joined),
            }
        }

        // 停止接收：关闭事件通道与各路径通道
        events.close();
        self.workers.clear();

        while let Some(joined) = self.tasks.join_next().await {
            self.reap(joined);
        }

        info!(
            events = self.report.events_received,
            workers = self.report.workers_spawned,
            alerts = self.report.alerts_produced,
            "Change event router stopped"
        );
        self.report
    }

    fn route(&mut self, event: ChangeEvent, shutdown: &CancellationToken) {
        self.report.events_received += 1;

        if !self.config.is_log_path(&event.path) {
            self.report.events_ignored += 1;
            trace!(path = %event.path.display(), "Ignoring non-log path");
            return;
        }

        info!(path = %event.path.display(), kind = ?event.kind, "Log file changed");

        let handle = match self.workers.get(&event.path) {
            Some(handle) if !handle.tx.is_closed() => handle.clone(),
            _ => self.spawn_worker(event.path.clone(), shutdown),
        };

        match handle.tx.try_send(event.kind) {
            Ok(()) => {}
            Err(TrySendError::Full(kind)) => {
                if matches!(kind, ChangeKind::Deleted | ChangeKind::Renamed) {
                    handle.reset.store(true, Ordering::Release);
                }
                self.report.events_coalesced += 1;
                trace!(path = %event.path.display(), "Path queue full, event coalesced");
            }
            Err(TrySendError::Closed(kind)) => {
                // worker 在检查之后刚刚退役
                let handle = self.spawn_worker(event.path.clone(), shutdown);
                if handle.tx.try_send(kind).is_err() {
                    debug!(path = %event.path.display(), "Fresh path worker unavailable, event dropped");
                }
            }
        }
    }

    fn spawn_worker(&mut self, path: PathBuf, shutdown: &CancellationToken) -> PathHandle {
        let (tx, rx) = mpsc::channel(PATH_QUEUE_CAPACITY);
        let handle = PathHandle {
            tx,
            reset: Arc::new(AtomicBool::new(false)),
        };
        let worker = PathWorker {
            tracker: LogTailTracker::new(path.clone(), self.config.agent.cold_start_lines),
            scanner: Arc::clone(&self.scanner),
            dispatcher: Arc::clone(&self.dispatcher),
            reset: Arc::clone(&handle.reset),
        };

        self.tasks.spawn(worker.run(rx, shutdown.child_token()));
        self.workers.insert(path, handle.clone());
        self.report.workers_spawned += 1;
        handle
    }

    fn reap(&mut self, joined: WorkerOutcome) {
        match joined {
            Ok((path, worker)) => {
                self.report.absorb(worker);
                // 同一路径可能已经换上了新的 worker
                if self.workers.get(&path).is_some_and(|h| h.tx.is_closed()) {
                    self.workers.remove(&path);
                }
                if worker.retired {
                    debug!(path = %path.display(), live = self.workers.len(), "Path worker retired");
                }
            }
            Err(e) => warn!(error = %e, "Path worker terminated abnormally"),
        }
    }
}

enum WorkerStep {
    Continue,
    Retire,
}

/// 单路径 worker：Tail → Scan → Dispatch
struct PathWorker {
    tracker: LogTailTracker,
    scanner: Arc<KeywordScanner>,
    dispatcher: Arc<AlertDispatcher>,
    reset: Arc<AtomicBool>,
}

impl PathWorker {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<ChangeKind>,
        shutdown: CancellationToken,
    ) -> (PathBuf, PathWorkerReport) {
        let mut report = PathWorkerReport::default();

        loop {
            let kind = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                kind = rx.recv() => match kind {
                    Some(kind) => kind,
                    None => break,
                },
            };

            report.events_processed += 1;
            if let WorkerStep::Retire = self.handle(kind, &shutdown, &mut report).await {
                report.retired = true;
                break;
            }
        }

        (self.tracker.path().to_path_buf(), report)
    }

    async fn handle(
        &mut self,
        kind: ChangeKind,
        shutdown: &CancellationToken,
        report: &mut PathWorkerReport,
    ) -> WorkerStep {
        let reset_requested = self.reset.swap(false, Ordering::AcqRel);
        if reset_requested || matches!(kind, ChangeKind::Deleted | ChangeKind::Renamed) {
            self.tracker.reset();
            // 被删除或被改名移走：路径已不存在
            if tokio::fs::metadata(self.tracker.path()).await.is_err() {
                debug!(path = %self.tracker.path().display(), ?kind, "Log file gone, forgetting offset");
                return WorkerStep::Retire;
            }
        }

        let lines = match self.tracker.read_appended().await {
            Ok(lines) => lines,
            Err(e) => {
                report.read_failures += 1;
                warn!(error = %e, "Dropping change event");
                return WorkerStep::Continue;
            }
        };

        let alerts = self.scanner.scan(&lines);
        if alerts.is_empty() {
            return WorkerStep::Continue;
        }
        report.alerts_produced += alerts.len() as u64;

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(pending = alerts.len(), "Cancelled while dispatching alerts");
            }
            delivered = self.dispatcher.dispatch_all(&alerts) => {
                report.alerts_delivered += delivered as u64;
            }
        }

        WorkerStep::Continue
    }
}
