//! Quiver — interactive seismic-waveform review.
//!
//! This is the main entry point for the GUI application. It:
//! 1. Initializes logging and loads configuration + keybindings
//! 2. Launches the iced application
//!
//! Set `RUST_LOG=debug` for verbose output.

mod config;
mod keybindings;
mod ui;

use std::cell::RefCell;

use iced::Task;

use ui::{Message, QuiverApp};

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("quiver-viewer starting up");

    let viewer_config = config::load_config(&config::default_config_path());
    let bindings = keybindings::load_keybindings(&keybindings::default_keybindings_path());

    // Boot state for the functional application API; taken exactly once.
    let boot_cell = RefCell::new(Some((viewer_config, bindings)));

    iced::application(
        move || {
            let (viewer_config, bindings) = boot_cell
                .borrow_mut()
                .take()
                .expect("boot state already taken");
            let app = QuiverApp::new(viewer_config, bindings);
            (app, Task::<Message>::none())
        },
        QuiverApp::update,
        QuiverApp::view,
    )
    .subscription(QuiverApp::subscription)
    .theme(QuiverApp::theme)
    .title("Quiver - Waveform Review")
    .window_size(iced::Size::new(1400.0, 900.0))
    .run()
}
