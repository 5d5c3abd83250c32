use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infisweep_core::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod render;
mod settings;

use settings::Settings;

type Session = GameSession<FileRevealStore, FileConfigStore>;

#[derive(Parser, Debug)]
#[command(version, about = "Endless minesweeper in the terminal", long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Settings file, defaults to ./infisweep.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the saved game, overrides the settings file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reveal the tile at X Y
    #[command(allow_negative_numbers = true)]
    Reveal { x: Coord, y: Coord },
    /// Reveal the tile under a screen position in pixels
    #[command(allow_negative_numbers = true)]
    Click { screen_x: f64, screen_y: f64 },
    /// Move the camera by DX DY pixels
    #[command(allow_negative_numbers = true)]
    Pan { dx: f64, dy: f64 },
    /// Print the revealed tiles around the camera
    View {
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },
    /// Print the session state
    Status,
    /// Forget the current game
    Reset,
}

fn init_logging(verbose: &clap_verbosity_flag::Verbosity) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(settings: &Settings) -> Result<Session> {
    let store = FileRevealStore::open(settings.tiles_path()).with_context(|| {
        format!("Could not open revealed tiles at {}", settings.tiles_path().display())
    })?;
    let config = FileConfigStore::open(settings.session_path()).with_context(|| {
        format!("Could not open session at {}", settings.session_path().display())
    })?;
    Ok(GameSession::open(store, config)?)
}

fn reveal(session: &mut Session, coords: Coord2) -> Result<()> {
    let report = session.reveal(coords)?;
    match report.outcome {
        RevealOutcome::Revealed => println!(
            "Revealed {} tiles from {coords:?} ({} new)",
            report.revealed, report.added
        ),
        RevealOutcome::HitMine => println!("Boom! {coords:?} was a mine, the game is over"),
        RevealOutcome::NoChange => println!("The game is over, run `infisweep reset` to play again"),
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        settings.data_dir = data_dir;
    }
    let mut session = open_session(&settings)?;

    match args.command {
        Command::Reveal { x, y } => reveal(&mut session, (x, y))?,
        Command::Click { screen_x, screen_y } => {
            let viewport = Viewport::new(
                session.camera_offset(),
                settings.view_width,
                settings.view_height,
            );
            let coords = viewport
                .tile_at_screen(screen_x, screen_y, settings.cell_size)
                .with_context(|| format!("No tile under screen position ({screen_x}, {screen_y})"))?;
            log::debug!("Screen ({screen_x}, {screen_y}) is tile {coords:?}");
            reveal(&mut session, coords)?;
        }
        Command::Pan { dx, dy } => {
            session.pan(dx, dy)?;
            let CameraOffset { x, y } = session.camera_offset();
            println!("Camera at ({x}, {y})");
        }
        Command::View { width, height } => {
            let mut window = ViewportWindow::new(settings.cell_size);
            window.resize(
                width.unwrap_or(settings.view_width),
                height.unwrap_or(settings.view_height),
            );
            window.refresh(&session);
            if let Some(bounds) = window.bounds() {
                println!(
                    "Tiles x {}..{}, y {}..{}",
                    bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
                );
            }
            print!("{}", render::render(&window.grid()));
        }
        Command::Status => {
            let CameraOffset { x, y } = session.camera_offset();
            println!("State:    {:?}", session.state());
            match session.seed() {
                Some(seed) => println!("Seed:     {seed}"),
                None => println!("Seed:     not chosen yet"),
            }
            println!("Camera:   ({x}, {y})");
            println!("Revealed: {}", session.store().len()?);
            println!("Saved in: {}", settings.data_dir.display());
        }
        Command::Reset => {
            session.reset()?;
            println!("Session reset");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.verbose);
    log::debug!("{args:?}");
    run(args)
}
