use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use seamless_looper::audio::{CpalSink, Player, Playlist, SymphoniaSource};
use seamless_looper::cli::{CliApp, Commands, ParseError, ScrubTarget, StatusDisplay};
use seamless_looper::config::{ConfigManager, PlaylistConfig};
use seamless_looper::error::{ConfigError, ErrorSeverity, PlayerError};
use seamless_looper::logging::{self, EventLog};
use seamless_looper::models::{PlayerEvent, PLAY_ENDLESSLY};

/// Main application controller that coordinates all components
pub struct AppController {
    player: Player<CpalSink>,
    config_manager: ConfigManager,
    events: EventLog,
    tick_interval: Duration,
}

/// What the interactive loop should do after a command
enum Flow {
    Continue,
    Quit,
}

impl AppController {
    /// Load settings and the playlist, open the output device and build the player
    pub fn new(cli: &CliApp) -> Result<Self, PlayerError> {
        let mut config_manager = ConfigManager::new()?;
        let mut config = config_manager.get_config().clone();
        if let Some(volume) = cli.initial_volume() {
            config.default_volume = volume;
        }

        let playlist_path = match &cli.playlist {
            Some(path) => CliApp::expand_path(&path.to_string_lossy()),
            None => {
                return Err(ParseError::MissingArgument {
                    command: "looper".to_string(),
                    argument: "playlist".to_string(),
                }
                .into())
            }
        };
        let playlist_config = PlaylistConfig::load(&playlist_path)?;

        let source = SymphoniaSource::with_import_rate(config.import_sample_rate);
        let playlist = Playlist::from_config(&playlist_config, &source)?;
        playlist.prepare_all()?;
        info!("Loaded {} tracks from {}", playlist.len(), playlist_path.display());

        let sink = Self::open_sink(cli.device.as_deref(), config.preferred_device.as_deref())?;
        if cli.device.is_some() {
            Self::persist(config_manager.set_preferred_device(Some(sink.device_name().to_string())))?;
        }
        println!(
            "Output: {} ({} Hz, {} ch)",
            sink.device_name(),
            sink.sample_rate(),
            sink.channels()
        );

        let mut player = Player::with_config(sink, playlist, &config);
        player.subscribe(|event| {
            if event == PlayerEvent::TrackEnd {
                println!("\nTrack finished");
            }
        });

        info!("Application controller initialized successfully");

        Ok(Self {
            player,
            config_manager,
            events: EventLog::new(),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        })
    }

    /// An explicit `--device` must exist; a saved preference falls back to the default
    fn open_sink(requested: Option<&str>, preferred: Option<&str>) -> Result<CpalSink, PlayerError> {
        if let Some(name) = requested {
            return Ok(CpalSink::open(Some(name))?);
        }
        if let Some(name) = preferred {
            match CpalSink::open(Some(name)) {
                Ok(sink) => return Ok(sink),
                Err(e) => {
                    eprintln!("Warning: Could not open preferred device '{}': {}", name, e);
                    eprintln!("Using default device instead.");
                }
            }
        }
        Ok(CpalSink::open(None)?)
    }

    /// Execute a single command
    fn execute_command(&mut self, command: Commands) -> Result<Flow, PlayerError> {
        match command {
            Commands::Play { track, loops } => {
                self.player.play(&track, loops)?;
                println!("Playing: {}", track);
            }
            Commands::At { track, position } => {
                self.player.play_at_point(&track, position.as_secs_f64(), PLAY_ENDLESSLY)?;
                println!("Playing: {} from {}", track, CliApp::format_duration(position));
            }
            Commands::Crossfade { track, position } => {
                let start = position.map_or(0.0, |p| p.as_secs_f64());
                self.player.crossfade_at_point(&track, start)?;
                println!("Crossfading to: {} ({:.1}s)", track, self.player.crossfade_time());
            }
            Commands::FadeIn { track, position } => {
                let start = position.map_or(0.0, |p| p.as_secs_f64());
                self.player.fade_in_at_point(&track, start)?;
                println!("Fading in: {}", track);
            }
            Commands::FadeOut => {
                self.player.fade_out();
                println!("OK: Fading out");
            }
            Commands::Pause => {
                self.player.pause();
                println!("OK: Paused");
            }
            Commands::Resume => {
                self.player.unpause()?;
                println!("OK: Resumed");
            }
            Commands::Scrub { target } => {
                match target {
                    ScrubTarget::Position(position) => self.player.scrub(position.as_secs_f64())?,
                    ScrubTarget::Fraction(fraction) => self.player.scrub_as_percentage(fraction)?,
                }
                println!(
                    "Scrubbed to: {}",
                    CliApp::format_duration(Duration::from_secs_f64(self.player.current_time().max(0.0)))
                );
            }
            Commands::Volume { level } => {
                let volume = level as f32 / 100.0;
                if self.player.set_volume(volume)? {
                    Self::persist(self.config_manager.set_volume(volume))?;
                    println!("OK: Volume {}%", level);
                } else {
                    println!("Volume unchanged while a fade is running");
                }
            }
            Commands::Stop => {
                self.player.stop();
                println!("OK: Stopped");
            }
            Commands::Status => {
                CliApp::display_status(&self.player.status());
            }
            Commands::Tracks => {
                let names: Vec<&str> = self.player.playlist().names().collect();
                let playing = self.player.playing_track().map(|track| track.name());
                StatusDisplay::display_track_list(&names, playing);
            }
            Commands::Events => {
                StatusDisplay::display_events(&self.events.recent(20));
            }
            Commands::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Advance fades and loop timers by the real time since the last frame
    fn tick(&mut self, delta: Duration) {
        match self.player.tick(delta.as_secs_f32()) {
            Ok(events) => {
                if events.is_empty() {
                    return;
                }
                let details = match self.player.playing_track() {
                    Some(track) => format!("{} @ {:.2}s", track.name(), self.player.current_time()),
                    None => String::new(),
                };
                for event in events {
                    self.events.record(event, details.clone());
                }
            }
            Err(e) => self.report_error(&e),
        }
    }

    /// Run interactive mode
    pub async fn run_interactive_mode(&mut self) -> Result<(), PlayerError> {
        println!("Seamless Looper v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Blocking stdin reads stay on their own thread
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;
                line = rx.recv() => {
                    awaiting_input = false;
                    match line {
                        Some(line) => {
                            if line.is_empty() {
                                continue;
                            }
                            match CliApp::parse_command(&line) {
                                Ok(command) => match self.execute_command(command) {
                                    Ok(Flow::Quit) => {
                                        println!("Goodbye!");
                                        break;
                                    }
                                    Ok(Flow::Continue) => {}
                                    Err(e) => self.report_error(&e),
                                },
                                Err(ParseError::HelpRequested) => CliApp::display_help(),
                                Err(e) => {
                                    eprintln!("Error: {}", e);
                                    println!("Type 'help' for available commands.");
                                }
                            }
                        }
                        None => {
                            // stdin closed
                            println!();
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.tick(now.duration_since(last_tick));
                    last_tick = now;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Stop playback and persist the settings that may have changed
    pub fn shutdown(&mut self) {
        println!("Shutting down...");
        self.player.stop();

        let (volume, crossfade_time) = (self.player.volume(), self.player.crossfade_time());
        if let Err(e) = self.config_manager.update_config(|config| {
            config.default_volume = volume;
            config.crossfade_time = crossfade_time;
        }) {
            eprintln!("Warning: Error saving configuration: {}", e);
        }
        println!("Shutdown complete.");
    }

    /// Settings that fail to save only warn unless the failure is unrecoverable
    fn persist(result: Result<(), ConfigError>) -> Result<(), PlayerError> {
        match result {
            Err(e) if e.is_recoverable() => {
                warn!("Could not save settings: {}", e);
                Ok(())
            }
            other => Ok(other?),
        }
    }

    fn report_error(&self, error: &PlayerError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}", error),
        }
        CliApp::display_error(error);
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();

    if cli.list_devices {
        match CpalSink::list_devices() {
            Ok(devices) if devices.is_empty() => println!("No audio devices found"),
            Ok(devices) => {
                println!("Available audio devices:");
                for device in devices {
                    println!("  {}", device);
                }
            }
            Err(e) => {
                StatusDisplay::display_simple_error(&PlayerError::from(e));
                std::process::exit(1);
            }
        }
        return;
    }

    let mut app = match AppController::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    if let Some(track) = &cli.track {
        match app.player.play(track, cli.loops) {
            Ok(()) => println!("Playing: {}", track),
            Err(e) => app.report_error(&e),
        }
    }

    if let Err(e) = app.run_interactive_mode().await {
        app.report_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
