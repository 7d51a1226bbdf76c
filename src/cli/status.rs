use std::time::Duration;

use crate::error::{ErrorSeverity, PlayerError};
use crate::logging::LoggedEvent;
use crate::models::{ChannelSlot, PlaybackState, PlayerStatus, PLAY_ENDLESSLY};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display player status with the loop and fade details
    pub fn display_full_status(status: &PlayerStatus) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");

        match &status.track_name {
            Some(name) => {
                println!("│ Track: {}", Self::truncate(name, 50));
                Self::display_playback_info(status);
            }
            None => {
                println!("│ No track playing");
                println!("│ Status: {}", status.state.as_str());
            }
        }

        println!("│");
        println!("│ Volume: {}%", (status.volume * 100.0).round() as u8);
        println!(
            "│ Channel: {}{}",
            Self::slot_name(status.current_slot),
            if status.fading { " (fading)" } else { "" }
        );
        println!("└─────────────────────────────────────────────────────────┘");
    }

    fn display_playback_info(status: &PlayerStatus) {
        println!("│");
        println!("│ Status: {}", Self::format_playback_state(status.state));
        println!(
            "│ Position: {} / {}",
            Self::format_duration(status.position),
            Self::format_duration(status.length)
        );
        println!(
            "│ Progress: [{}] {:.1}%",
            Self::create_progress_bar(status.progress(), 40),
            status.progress() * 100.0
        );
        println!("│ Loops: {}", Self::format_loops(status.loops_remaining));
    }

    /// Display compact one-line status
    pub fn display_compact_status(status: &PlayerStatus) {
        match &status.track_name {
            Some(name) => {
                println!(
                    "{} | {} | {}/{} ({}%) | loops: {}",
                    status.state.as_str(),
                    Self::truncate(name, 30),
                    Self::format_duration(status.position),
                    Self::format_duration(status.length),
                    (status.progress() * 100.0) as u8,
                    Self::format_loops(status.loops_remaining)
                );
            }
            None => {
                println!("{} | No track playing", status.state.as_str());
            }
        }
    }

    /// List the playlist, marking the track now playing
    pub fn display_track_list(names: &[&str], playing: Option<&str>) {
        if names.is_empty() {
            println!("Playlist is empty");
            return;
        }
        println!("Tracks ({}):", names.len());
        for (i, name) in names.iter().enumerate() {
            let marker = if Some(*name) == playing { ">" } else { " " };
            println!("{} {}: {}", marker, i + 1, name);
        }
    }

    /// Show recorded events, oldest first
    pub fn display_events(events: &[LoggedEvent]) {
        if events.is_empty() {
            println!("No events yet");
            return;
        }
        for logged in events {
            println!(
                "{} {:<18} {}",
                logged.timestamp.format("%H:%M:%S%.3f"),
                logged.event.as_str(),
                logged.details
            );
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    /// Format duration as MM:SS or HH:MM:SS for longer tracks
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    pub fn format_loops(loops_remaining: u32) -> String {
        if loops_remaining == PLAY_ENDLESSLY {
            "endless".to_string()
        } else {
            format!("{} remaining", loops_remaining)
        }
    }

    fn slot_name(slot: ChannelSlot) -> &'static str {
        match slot {
            ChannelSlot::Primary => "A",
            ChannelSlot::Secondary => "B",
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Create a progress bar string
    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f32) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_playback_state(state: PlaybackState) -> String {
        match state {
            PlaybackState::PlayingIntro => "▶ Playing (intro)".to_string(),
            PlaybackState::PlayingLoop => "▶ Playing (loop)".to_string(),
            PlaybackState::Paused => "⏸ Paused".to_string(),
            PlaybackState::Stopped => "⏹ Stopped".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayerEvent;
    use chrono::Utc;

    fn create_test_status() -> PlayerStatus {
        let mut status = PlayerStatus::new();
        status.state = PlaybackState::PlayingLoop;
        status.track_name = Some("Title".to_string());
        status.position = Duration::from_secs(60);
        status.length = Duration::from_secs(180);
        status.volume = 0.8;
        status.loops_remaining = 2;
        status
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(30)), "00:30");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(185)), "03:05");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(3661)), "01:01:01");
    }

    #[test]
    fn test_format_loops() {
        assert_eq!(StatusDisplay::format_loops(PLAY_ENDLESSLY), "endless");
        assert_eq!(StatusDisplay::format_loops(3), "3 remaining");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(StatusDisplay::truncate("short", 10), "short");
        assert_eq!(StatusDisplay::truncate("this is a very long string", 10), "this is...");
        assert_eq!(StatusDisplay::truncate("abc", 2), "abc");
        assert_eq!(StatusDisplay::truncate("ünïcödé names", 6), "ünï...");
    }

    #[test]
    fn test_create_progress_bar() {
        assert_eq!(StatusDisplay::create_progress_bar(0.0, 10), "░░░░░░░░░░");
        assert_eq!(StatusDisplay::create_progress_bar(1.0, 10), "██████████");
        assert_eq!(StatusDisplay::create_progress_bar(0.5, 10), "█████░░░░░");
        assert_eq!(StatusDisplay::create_progress_bar(1.5, 4), "████");
    }

    #[test]
    fn test_wrap_text() {
        let lines = StatusDisplay::wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_display_functions_dont_panic() {
        let status = create_test_status();
        StatusDisplay::display_full_status(&status);
        StatusDisplay::display_compact_status(&status);

        let empty = PlayerStatus::new();
        StatusDisplay::display_full_status(&empty);
        StatusDisplay::display_compact_status(&empty);

        StatusDisplay::display_track_list(&["Title", "Battle"], Some("Battle"));
        StatusDisplay::display_track_list(&[], None);

        StatusDisplay::display_events(&[LoggedEvent {
            timestamp: Utc::now(),
            event: PlayerEvent::TrackLoop,
            details: "Title".to_string(),
        }]);
        StatusDisplay::display_events(&[]);

        let error = PlayerError::TrackNotFound { name: "Missing".to_string() };
        StatusDisplay::display_error(&error);
        StatusDisplay::display_simple_error(&error);
    }
}
