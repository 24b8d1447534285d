// main.rs

mod app;
mod tui;

use crate::app::App;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use rustytodos::logging;
use rustytodos::{
    AuthSession, BackendSelector, Config, FileStore, LocalBackend, RemoteClient, TodoStore, config,
};
use std::io::{self};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::config_path();
    let cfg = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Ignoring config: {}", e);
        Config::default()
    });

    let data_dir = config::data_dir();
    if let Err(e) = logging::initialize(&data_dir, cfg.log_level_filter()) {
        eprintln!("Logging disabled: {}", e);
    }
    info!("Starting RustyTodos, data in {}", data_dir.display());

    let remote = match cfg.remote.as_ref().map(RemoteClient::new) {
        Some(Ok(client)) => Some(client),
        Some(Err(e)) => {
            warn!("Remote server disabled: {}", e);
            None
        }
        None => None,
    };
    let storage = Arc::new(FileStore::new(&data_dir));
    let selector = BackendSelector::new(storage.clone(), remote.clone());
    let store = Arc::new(TodoStore::new(Arc::new(LocalBackend::new(storage))));
    let auth = AuthSession::new(remote);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut app = App::new(store, auth, selector, cfg, config_path);
    rt.block_on(app.start());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the TUI event loop (blocks until exit)
    let res = tui::run_app(&mut terminal, &mut app, &rt);

    // Restore terminal state
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Application error: {}", err);
    }
    info!("Exiting");

    Ok(())
}
