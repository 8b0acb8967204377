pub mod alert_dispatcher;
pub mod event_router;
pub mod file_watcher;
pub mod keyword_scanner;
pub mod log_tail;


pub use alert_dispatcher::{AlertDispatcher, LogNotifier, Notifier, WebhookNotifier, WebhookPayload};
pub use event_router::{ChangeEventRouter, RouterReport};
pub use file_watcher::FsChangeSource;
pub use keyword_scanner::KeywordScanner;
pub use log_tail::{LogTailTracker, TailState};
