use anyhow::Result;

mod ai;
mod app;
mod catalog;
mod config;
mod content;
mod handler;
mod markdown;
mod provider;
mod quiz;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    tui::install_panic_hook();

    let mut app = App::new()?;

    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event).await?;
        }

        app.poll_background_tasks().await;
    }

    tui::restore()?;

    Ok(())
}
