/// Popup UI for Speedy Video

use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::chrome;
use crate::error::Error;
use crate::messages::Message;
use crate::operations::{
    ActiveTab, active_preset, overridden_rule, preset_click, restore_domain_rule,
    toggle_dark_mode, toggle_pin,
};
use crate::speed::{Speed, SpeedSource};
use crate::storage::{RuleSnapshot, StoreWrite};
use crate::ui::components::{ErrorAlert, SpeedButton};
use crate::ui::rule_settings::RuleSettings;
use crate::ui::speed_settings::SpeedSettings;

#[derive(Clone, PartialEq)]
enum View {
    Main,
    Presets,
    Rules,
}

fn source_label(source: SpeedSource) -> &'static str {
    match source {
        SpeedSource::Disabled => "Extension disabled",
        SpeedSource::Blacklisted => "Blacklisted site",
        SpeedSource::Pinned => "Pinned to this tab",
        SpeedSource::Domain => "Domain rule",
        SpeedSource::Excluded => "Excluded page",
        SpeedSource::Global => "Global speed",
        SpeedSource::Manual => "Manual",
        SpeedSource::Fallback => "Last known speed",
        SpeedSource::Standalone => "Standalone",
    }
}

fn apply_theme(dark: bool) {
    let body = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body());
    if let Some(body) = body {
        let _ = body.class_list().toggle_with_force("dark-mode", dark);
    }
}

async fn load() -> Result<(RuleSnapshot, Option<ActiveTab>), Error> {
    let (snapshot, _) = chrome::load_snapshot().await?;
    let tab = chrome::active_tab()
        .await?
        .map(|info| ActiveTab::new(info.id, &info.url));
    Ok((snapshot, tab))
}

#[function_component(App)]
pub fn app() -> Html {
    let snapshot = use_state(|| None::<RuleSnapshot>);
    let tab = use_state(|| None::<ActiveTab>);
    let view = use_state(|| View::Main);
    let error = use_state(|| None::<String>);
    let refresh = use_state(|| 0u32);

    // Reload storage on mount and after every write
    {
        let snapshot = snapshot.clone();
        let tab = tab.clone();
        let error = error.clone();
        use_effect_with(*refresh, move |_| {
            spawn_local(async move {
                match load().await {
                    Ok((snap, active)) => {
                        apply_theme(snap.dark_mode);
                        snapshot.set(Some(snap));
                        tab.set(active);
                    }
                    Err(e) => error.set(Some(format!("Failed to load settings: {}", e))),
                }
            });
            || ()
        });
    }

    let reload = {
        let refresh = refresh.clone();
        Callback::from(move |_: ()| refresh.set(*refresh + 1))
    };

    // Write to storage, then reload so the buttons reflect the new state
    let commit = {
        let error = error.clone();
        let reload = reload.clone();
        move |write: StoreWrite| {
            let error = error.clone();
            let reload = reload.clone();
            spawn_local(async move {
                match chrome::apply_write(&write).await {
                    Ok(()) => {
                        error.set(None);
                        reload.emit(());
                    }
                    Err(e) => error.set(Some(format!("Failed to save: {}", e))),
                }
            });
        }
    };

    let on_preset = {
        let snapshot = snapshot.clone();
        let tab = tab.clone();
        let commit = commit.clone();
        Callback::from(move |speed: Speed| {
            if let Some(snap) = (*snapshot).as_ref() {
                commit(preset_click(snap, (*tab).as_ref(), speed));
            }
        })
    };

    let on_pin = {
        let snapshot = snapshot.clone();
        let tab = tab.clone();
        let commit = commit.clone();
        Callback::from(move |_: MouseEvent| {
            if let (Some(snap), Some(active)) = ((*snapshot).as_ref(), (*tab).as_ref()) {
                commit(toggle_pin(snap, active));
            }
        })
    };

    let on_restore = {
        let tab = tab.clone();
        let commit = commit.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(active) = (*tab).as_ref() {
                commit(restore_domain_rule(active));
            }
        })
    };

    let on_theme = {
        let snapshot = snapshot.clone();
        let commit = commit.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(snap) = (*snapshot).as_ref() {
                apply_theme(!snap.dark_mode);
                commit(toggle_dark_mode(snap));
            }
        })
    };

    let on_toggle_enabled = {
        let snapshot = snapshot.clone();
        let error = error.clone();
        let reload = reload.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(snap) = (*snapshot).as_ref() else {
                return;
            };
            let message = if snap.extension_enabled {
                Message::DisableGlobal
            } else {
                Message::EnableGlobal
            };
            let error = error.clone();
            let reload = reload.clone();
            spawn_local(async move {
                match chrome::send_to_runtime(&message).await {
                    Ok(_) => reload.emit(()),
                    Err(e) => error.set(Some(format!("Failed to toggle: {}", e))),
                }
            });
        })
    };

    let show = {
        let view = view.clone();
        move |next: View| {
            let view = view.clone();
            Callback::from(move |_: MouseEvent| view.set(next.clone()))
        }
    };

    let on_settings_saved = {
        let view = view.clone();
        let reload = reload.clone();
        Callback::from(move |_: ()| {
            view.set(View::Main);
            reload.emit(());
        })
    };

    let on_settings_closed = {
        let view = view.clone();
        Callback::from(move |_: ()| view.set(View::Main))
    };

    let Some(snap) = (*snapshot).clone() else {
        return html! {
            <div class="padding-20">
                <ErrorAlert message={(*error).clone()} />
                <div class="loading-text-center">
                    <Spinner />
                </div>
            </div>
        };
    };

    let active = (*tab).clone();
    let current = active.as_ref().map(|t| t.resolution(&snap));
    let highlighted = active_preset(&snap, active.as_ref());
    let pinned = active.as_ref().is_some_and(|t| snap.has_pin(t.id));
    let restorable = active.as_ref().and_then(|t| overridden_rule(&snap, t)).cloned();

    let body = match &*view {
        View::Presets => html! {
            <SpeedSettings
                presets={snap.presets.clone()}
                on_saved={on_settings_saved.clone()}
                on_close={on_settings_closed.clone()}
            />
        },
        View::Rules => html! {
            <RuleSettings
                rules={snap.rules.clone()}
                on_saved={on_settings_saved.clone()}
                on_close={on_settings_closed.clone()}
            />
        },
        View::Main => html! {
            <div class="flex-column-gap">
                if let Some(resolution) = current {
                    <p class="current-speed">
                        <span class="current-speed-value">{format!("{}x", resolution.speed.label())}</span>
                        <span class="current-speed-source">{source_label(resolution.source)}</span>
                    </p>
                }

                <div class="speed-grid">
                    {for snap.presets.speeds().iter().map(|speed| html! {
                        <SpeedButton
                            speed={*speed}
                            active={*speed == highlighted}
                            onselect={on_preset.clone()}
                            disabled={!snap.extension_enabled}
                        />
                    })}
                </div>

                if active.is_some() {
                    <Button
                        onclick={on_pin}
                        variant={if pinned { ButtonVariant::Primary } else { ButtonVariant::Secondary }}
                        disabled={!snap.extension_enabled}
                        block={true}
                    >
                        {if pinned { "Unpin this tab" } else { "Pin speed to this tab" }}
                    </Button>
                }

                if let Some(rule) = restorable {
                    <Button onclick={on_restore} variant={ButtonVariant::Link} block={true}>
                        {format!("Use {} rule ({}x)", rule.domain, rule.speed.label())}
                    </Button>
                }

                <div class="flex-row-gap">
                    <Button onclick={show(View::Presets)} variant={ButtonVariant::Secondary}>
                        {"Presets"}
                    </Button>
                    <Button onclick={show(View::Rules)} variant={ButtonVariant::Secondary}>
                        {"Site rules"}
                    </Button>
                    <Button onclick={on_theme} variant={ButtonVariant::Plain}>
                        {if snap.dark_mode { "☀" } else { "☾" }}
                    </Button>
                </div>
            </div>
        },
    };

    html! {
        <div class="padding-20">
            <div class="popup-header">
                <h1 class="popup-title">{"Speedy Video"}</h1>
                <Button
                    onclick={on_toggle_enabled}
                    variant={if snap.extension_enabled { ButtonVariant::Secondary } else { ButtonVariant::Primary }}
                >
                    {if snap.extension_enabled { "Disable" } else { "Enable" }}
                </Button>
            </div>

            <ErrorAlert message={(*error).clone()} />

            {body}

            <p class="footer-popup">
                {"Speedy Video v0.1.0"}
            </p>
        </div>
    }
}
