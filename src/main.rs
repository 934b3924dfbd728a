mod ui;

use std::{error::Error, fs, io, path::Path};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use taskurai::config::{Config, CONFIG_FILE};
use taskurai::{BoardStore, FileStore};

use crate::ui::{run_app, App};

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::load(Path::new(CONFIG_FILE))?;
    init_logging(&config)?;

    // Board setup happens before the terminal switches modes so load errors stay readable.
    let store = BoardStore::open(FileStore::open(&config.data_dir)?)?;
    let mut app = App::new(store, config.export_dir.clone());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        log::error!("[taskurai] terminal loop failed: {}", err);
        eprintln!("{:?}", err);
    }
    Ok(())
}

/// Logs go to a file next to the board data; the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&config.data_dir)?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())?;
    env_logger::Builder::new()
        .filter_level(config.log_filter())
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}
