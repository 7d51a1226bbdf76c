use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};

use crate::models::PlayerEvent;

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "LOOPER_LOG_LEVEL";

/// Initialize logging system with appropriate log level
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}:{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Looper logging initialized with level: {}", log_level);
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// A player event as recorded in the history
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: PlayerEvent,
    pub details: String,
}

/// Bounded, timestamped history of player events.
///
/// Clones share the same history, so one handle can be moved into a
/// `Player::subscribe` listener while another is read for display.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Arc<Mutex<VecDeque<LoggedEvent>>>,
    max_events: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    /// Record an event and echo it to the logger
    pub fn record(&self, event: PlayerEvent, details: impl Into<String>) {
        let details = details.into();
        match event {
            PlayerEvent::TrackLoop | PlayerEvent::TrackEndOrLoop => debug!("[{}] {}", event, details),
            PlayerEvent::TrackEnd | PlayerEvent::FadeInComplete | PlayerEvent::FadeOutComplete => {
                info!("[{}] {}", event, details)
            }
        }

        let mut events = self.lock();
        events.push_back(LoggedEvent {
            timestamp: Utc::now(),
            event,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// The last `count` events, oldest first
    pub fn recent(&self, count: usize) -> Vec<LoggedEvent> {
        let events = self.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self, event: PlayerEvent) -> usize {
        self.lock().iter().filter(|logged| logged.event == event).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LoggedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_event_log_starts_empty() {
        let log = EventLog::new();
        assert_eq!(log.max_events, 1000);
        assert!(log.is_empty());
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();

        log.record(PlayerEvent::TrackLoop, "Title @ 5.00s");

        let events = log.recent(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, PlayerEvent::TrackLoop);
        assert_eq!(events[0].details, "Title @ 5.00s");
    }

    #[test]
    fn test_event_history_limit() {
        let log = EventLog::with_capacity(3);

        for i in 0..5 {
            log.record(PlayerEvent::TrackEndOrLoop, format!("Event {}", i));
        }

        let events = log.recent(10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details, "Event 2");
        assert_eq!(events[2].details, "Event 4");
    }

    #[test]
    fn test_clones_share_history() {
        let log = EventLog::new();
        let writer = log.clone();

        writer.record(PlayerEvent::FadeInComplete, "");
        writer.record(PlayerEvent::TrackEnd, "");
        writer.record(PlayerEvent::TrackEndOrLoop, "");

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(PlayerEvent::TrackEnd), 1);
        assert_eq!(log.recent(2)[0].event, PlayerEvent::TrackEnd);

        log.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("warn"), log::LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");

        thread::sleep(Duration::from_millis(10));

        let duration = timer.finish_with_threshold(Duration::from_secs(10));
        assert!(duration >= Duration::from_millis(10));
    }
}
