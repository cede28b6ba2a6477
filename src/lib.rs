/// Speedy Video - Chrome Extension for playback speed control
/// Built with Rust + WASM + Yew

mod applier;
mod background;
mod chrome;
mod config;
mod content;
mod dom;
mod domain;
mod error;
mod messages;
mod operations;
mod propagator;
mod resolver;
mod rules;
mod speed;
mod storage;
mod validation;
pub mod ui;

pub use applier::{MediaElement, PageState, apply_speed};
pub use config::Config;
pub use messages::{Message, Reply};
pub use resolver::{Resolution, resolve};
pub use speed::{Speed, SpeedSource};
pub use storage::RuleSnapshot;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export the hostname rule for the JS shell
#[wasm_bindgen]
pub fn hostname_of(url: &str) -> String {
    domain::PageContext::parse(url)
        .map(|page| page.hostname)
        .unwrap_or_default()
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
