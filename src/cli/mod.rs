use crate::error::PlayerError;
use crate::models::PlayerStatus;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod status;
pub use status::StatusDisplay;

/// Seamless music looper
#[derive(Parser, Debug)]
#[command(name = "looper")]
#[command(about = "Plays intro + loop music tracks with sample-accurate looping and crossfades")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Playlist file (TOML) listing the tracks and their loop points
    #[arg(required_unless_present = "list_devices")]
    pub playlist: Option<PathBuf>,

    /// Track to start playing immediately
    #[arg(short, long)]
    pub track: Option<String>,

    /// Number of passes through the loop region (0 = forever)
    #[arg(short, long, default_value_t = 0)]
    pub loops: u32,

    /// Output device name (defaults to the configured or system device)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Master volume (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,

    /// List available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// Interactive commands
#[derive(Debug, Clone, PartialEq)]
pub enum Commands {
    /// Play a track from its beginning
    Play { track: String, loops: u32 },
    /// Play a track from a position
    At { track: String, position: Duration },
    /// Crossfade to a track, optionally from a position
    Crossfade { track: String, position: Option<Duration> },
    /// Fade a track in, optionally from a position
    FadeIn { track: String, position: Option<Duration> },
    /// Fade the current track out to silence
    FadeOut,
    Pause,
    Resume,
    /// Move the playhead of the current track
    Scrub { target: ScrubTarget },
    /// Set master volume (0-100)
    Volume { level: u8 },
    Stop,
    Status,
    /// List playlist track names
    Tracks,
    /// Show recent player events
    Events,
    Quit,
}

/// Where a scrub should land
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrubTarget {
    Position(Duration),
    /// Fraction of the track length, 0.0 to 1.0
    Fraction(f64),
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(rest)
            } else {
                PathBuf::from(path)
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Initial master volume from `--volume`, as 0.0-1.0
    pub fn initial_volume(&self) -> Option<f32> {
        self.volume.map(|level| level as f32 / 100.0)
    }

    /// Parse an interactive command line
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0].to_lowercase().as_str() {
            "play" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "play".to_string(),
                        argument: "track".to_string(),
                    });
                }
                // A trailing integer is the loop count; names may contain spaces
                let (name_args, loops) = match args[args.len() - 1].parse::<u32>() {
                    Ok(loops) if args.len() > 2 => (&args[1..args.len() - 1], loops),
                    _ => (&args[1..], 0),
                };
                Ok(Commands::Play {
                    track: name_args.join(" "),
                    loops,
                })
            }
            "at" => {
                if args.len() < 3 {
                    return Err(ParseError::MissingArgument {
                        command: "at".to_string(),
                        argument: if args.len() < 2 { "track" } else { "time" }.to_string(),
                    });
                }
                let position = Self::parse_time(args[args.len() - 1])?;
                Ok(Commands::At {
                    track: args[1..args.len() - 1].join(" "),
                    position,
                })
            }
            "crossfade" | "xfade" => {
                let (track, position) = Self::parse_track_and_position("crossfade", &args)?;
                Ok(Commands::Crossfade { track, position })
            }
            "fadein" => {
                let (track, position) = Self::parse_track_and_position("fadein", &args)?;
                Ok(Commands::FadeIn { track, position })
            }
            "fadeout" => Ok(Commands::FadeOut),
            "pause" => Ok(Commands::Pause),
            "resume" | "unpause" => Ok(Commands::Resume),
            "scrub" | "seek" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "scrub".to_string(),
                        argument: "time".to_string(),
                    });
                }
                let target = Self::parse_scrub_target(args[1])?;
                Ok(Commands::Scrub { target })
            }
            "volume" | "vol" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "volume".to_string(),
                        argument: "level".to_string(),
                    });
                }
                match args[1].parse::<u8>() {
                    Ok(level) if level <= 100 => Ok(Commands::Volume { level }),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "volume".to_string(),
                        value: args[1].to_string(),
                        expected: "number between 0 and 100".to_string(),
                    }),
                }
            }
            "stop" => Ok(Commands::Stop),
            "status" => Ok(Commands::Status),
            "tracks" | "list" => Ok(Commands::Tracks),
            "events" => Ok(Commands::Events),
            "quit" | "exit" => Ok(Commands::Quit),
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// `<command> <name> [time]`, where a trailing word that parses as a time
    /// is taken as the start position
    fn parse_track_and_position(command: &str, args: &[&str]) -> Result<(String, Option<Duration>), ParseError> {
        if args.len() < 2 {
            return Err(ParseError::MissingArgument {
                command: command.to_string(),
                argument: "track".to_string(),
            });
        }
        if args.len() > 2 {
            if let Ok(position) = Self::parse_time(args[args.len() - 1]) {
                return Ok((args[1..args.len() - 1].join(" "), Some(position)));
            }
        }
        Ok((args[1..].join(" "), None))
    }

    /// Parse a scrub target: a time ("1:30", "90s") or a percentage ("50%")
    pub fn parse_scrub_target(input: &str) -> Result<ScrubTarget, ParseError> {
        let trimmed = input.trim();
        if let Some(percent) = trimmed.strip_suffix('%') {
            let value: f64 = percent.parse().map_err(|_| ParseError::InvalidArgument {
                argument: "scrub".to_string(),
                value: input.to_string(),
                expected: "percentage between 0% and 100%".to_string(),
            })?;
            if !(0.0..=100.0).contains(&value) {
                return Err(ParseError::InvalidArgument {
                    argument: "scrub".to_string(),
                    value: input.to_string(),
                    expected: "percentage between 0% and 100%".to_string(),
                });
            }
            return Ok(ScrubTarget::Fraction(value / 100.0));
        }
        Ok(ScrubTarget::Position(Self::parse_time(trimmed)?))
    }

    /// Display player status in a formatted way
    pub fn display_status(status: &PlayerStatus) {
        StatusDisplay::display_full_status(status);
    }

    /// Display error message with formatting
    pub fn display_error(error: &PlayerError) {
        StatusDisplay::display_error(error);
    }

    /// Display help information
    pub fn display_help() {
        println!("Seamless Looper - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play <name> [loops]      - Play a track from the start (0 loops = forever)");
        println!("  at <name> <time>         - Play a track from a position (e.g., '1:30', '90s')");
        println!("  crossfade <name> [time]  - Crossfade to a track, looping forever");
        println!("  fadein <name> [time]     - Fade a track in from silence");
        println!("  fadeout                  - Fade the current track to silence");
        println!("  pause                    - Pause playback");
        println!("  resume                   - Resume playback");
        println!("  scrub <time|NN%>         - Move the playhead (e.g., '0:45', '50%')");
        println!("  stop                     - Stop playback");
        println!();
        println!("Information:");
        println!("  status                   - Show current player status");
        println!("  tracks                   - List tracks in the playlist");
        println!("  events                   - Show recent loop and fade events");
        println!("  volume <0-100>           - Set master volume");
        println!();
        println!("General:");
        println!("  help                     - Show this help message");
        println!("  exit, quit               - Exit the player");
    }

    /// Parse time string to Duration
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let trimmed = time_str.trim();

        if trimmed.is_empty() {
            return Err(ParseError::InvalidTimeFormat {
                input: time_str.to_string(),
            });
        }

        // Handle different time formats: "1:30", "90", "90s", "1:30.5"
        if trimmed.contains(':') {
            let parts: Vec<&str> = trimmed.split(':').collect();
            if parts.len() != 2 {
                return Err(ParseError::InvalidTimeFormat {
                    input: time_str.to_string(),
                });
            }

            let minutes: u64 = parts[0].parse().map_err(|_| ParseError::InvalidTimeFormat {
                input: time_str.to_string(),
            })?;

            let seconds_f64: f64 = parts[1].parse().map_err(|_| ParseError::InvalidTimeFormat {
                input: time_str.to_string(),
            })?;

            if !(0.0..60.0).contains(&seconds_f64) {
                return Err(ParseError::InvalidTimeFormat {
                    input: time_str.to_string(),
                });
            }

            let total_seconds = minutes as f64 * 60.0 + seconds_f64;
            Ok(Duration::from_secs_f64(total_seconds))
        } else {
            let seconds_str = trimmed.trim_end_matches('s');
            let seconds_f64: f64 = seconds_str.parse().map_err(|_| ParseError::InvalidTimeFormat {
                input: time_str.to_string(),
            })?;

            if !seconds_f64.is_finite() || seconds_f64 < 0.0 {
                return Err(ParseError::InvalidTimeFormat {
                    input: time_str.to_string(),
                });
            }

            Ok(Duration::from_secs_f64(seconds_f64))
        }
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },

    #[error("Help requested")]
    HelpRequested,
}
