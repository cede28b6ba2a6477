/// UI module exports
pub mod components;
pub mod popup;
pub mod rule_settings;
pub mod speed_settings;
