//! Browser tests: run with `wasm-pack test --headless --chrome`
#![cfg(target_arch = "wasm32")]

use speedy_video::{Message, PageState, Reply, Speed, SpeedSource, apply_speed};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlMediaElement;

wasm_bindgen_test_configure!(run_in_browser);

fn media(tag: &str) -> HtmlMediaElement {
    let document = web_sys::window().unwrap().document().unwrap();
    document
        .create_element(tag)
        .unwrap()
        .dyn_into::<HtmlMediaElement>()
        .unwrap()
}

#[wasm_bindgen_test]
fn test_apply_speed_sets_playback_rate() {
    let elements = vec![media("video"), media("audio")];
    assert_eq!(apply_speed(&elements, Speed::clamped(2.5)), 2);
    assert!(elements.iter().all(|m| m.playback_rate() == 2.5));
    assert_eq!(apply_speed(&elements, Speed::clamped(2.5)), 0);
}

#[wasm_bindgen_test]
fn test_message_crosses_js_boundary() {
    let message = Message::UpdateSpeed {
        speed: 1.5,
        source: Some(SpeedSource::Domain),
    };
    let value = serde_wasm_bindgen::to_value(&message).unwrap();
    let back: Message = serde_wasm_bindgen::from_value(value).unwrap();
    assert_eq!(back, message);
}

#[wasm_bindgen_test]
fn test_page_state_drives_real_elements() {
    let video = media("video");
    let mut state = PageState::new("https://example.com/");
    let (reply, _) = state.handle(&Message::UpdateSpeed { speed: 3.0, source: None });
    assert!(matches!(reply, Reply::SpeedUpdated(_)));
    apply_speed(std::slice::from_ref(&video), state.speed());
    assert_eq!(video.playback_rate(), 3.0);
}
