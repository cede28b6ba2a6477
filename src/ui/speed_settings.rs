/// Preset editor: up to nine quick-select speeds

use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::chrome;
use crate::speed::{MAX_PRESETS, PresetList};
use crate::storage::StoreWrite;
use crate::ui::components::{ErrorAlert, Field};
use crate::validation::{validate_preset, validate_presets};

#[derive(Properties, PartialEq)]
pub struct SpeedSettingsProps {
    pub presets: PresetList,
    pub on_saved: Callback<()>,
    pub on_close: Callback<()>,
}

fn rows_from(presets: &PresetList) -> Vec<String> {
    presets.speeds().iter().map(|s| s.value().to_string()).collect()
}

#[function_component(SpeedSettings)]
pub fn speed_settings(props: &SpeedSettingsProps) -> Html {
    let rows = use_state(|| rows_from(&props.presets));
    let errors = use_state(|| vec![String::new(); props.presets.len()]);
    let save_error = use_state(|| None::<String>);

    let on_edit = {
        let rows = rows.clone();
        let errors = errors.clone();
        move |index: usize| {
            let rows = rows.clone();
            let errors = errors.clone();
            Callback::from(move |value: String| {
                let mut next_errors = (*errors).clone();
                next_errors.resize(rows.len(), String::new());
                next_errors[index] = validate_preset(&value);
                errors.set(next_errors);

                let mut next = (*rows).clone();
                next[index] = value;
                rows.set(next);
            })
        }
    };

    let on_add = {
        let rows = rows.clone();
        let errors = errors.clone();
        Callback::from(move |_: MouseEvent| {
            if rows.len() >= MAX_PRESETS {
                return;
            }
            let mut next = (*rows).clone();
            next.push("1".to_string());
            rows.set(next);
            let mut next_errors = (*errors).clone();
            next_errors.resize(rows.len() + 1, String::new());
            errors.set(next_errors);
        })
    };

    let on_remove = {
        let rows = rows.clone();
        let errors = errors.clone();
        move |index: usize| {
            let rows = rows.clone();
            let errors = errors.clone();
            Callback::from(move |_: MouseEvent| {
                if rows.len() <= 1 {
                    return;
                }
                let mut next = (*rows).clone();
                next.remove(index);
                let mut next_errors = (*errors).clone();
                next_errors.resize(rows.len(), String::new());
                next_errors.remove(index);
                rows.set(next);
                errors.set(next_errors);
            })
        }
    };

    let on_reset = {
        let rows = rows.clone();
        let errors = errors.clone();
        Callback::from(move |_: MouseEvent| {
            let defaults = PresetList::default();
            errors.set(vec![String::new(); defaults.len()]);
            rows.set(rows_from(&defaults));
        })
    };

    let on_save = {
        let rows = rows.clone();
        let errors = errors.clone();
        let save_error = save_error.clone();
        let on_saved = props.on_saved.clone();
        Callback::from(move |_: MouseEvent| {
            match validate_presets(&rows) {
                Ok(presets) => {
                    let save_error = save_error.clone();
                    let on_saved = on_saved.clone();
                    spawn_local(async move {
                        match chrome::apply_write(&StoreWrite::new().set_presets(&presets)).await {
                            Ok(()) => on_saved.emit(()),
                            Err(e) => save_error.set(Some(format!("Failed to save presets: {}", e))),
                        }
                    });
                }
                Err(row_errors) => errors.set(row_errors),
            }
        })
    };

    let on_close = {
        let on_close = props.on_close.clone();
        Callback::from(move |_: MouseEvent| on_close.emit(()))
    };

    html! {
        <div class="settings-panel">
            <h2 class="settings-title">{"Speed presets"}</h2>
            <ErrorAlert message={(*save_error).clone()} />

            {for rows.iter().enumerate().map(|(index, value)| {
                let error = errors.get(index).cloned().unwrap_or_default();
                html! {
                    <div class="preset-row" key={index}>
                        <Field
                            value={value.clone()}
                            oninput={on_edit(index)}
                            invalid={!error.is_empty()}
                        />
                        <Button
                            onclick={on_remove(index)}
                            variant={ButtonVariant::Plain}
                            disabled={rows.len() <= 1}
                        >
                            {"✕"}
                        </Button>
                        if !error.is_empty() {
                            <p class="validation-message validation-error">{error.clone()}</p>
                        }
                    </div>
                }
            })}

            <div class="flex-row-gap">
                <Button onclick={on_add} variant={ButtonVariant::Secondary} disabled={rows.len() >= MAX_PRESETS}>
                    {"Add speed"}
                </Button>
                <Button onclick={on_reset} variant={ButtonVariant::Link}>
                    {"Reset to defaults"}
                </Button>
            </div>
            <div class="flex-row-gap">
                <Button onclick={on_save} variant={ButtonVariant::Primary}>{"Save"}</Button>
                <Button onclick={on_close} variant={ButtonVariant::Secondary}>{"Back"}</Button>
            </div>
        </div>
    }
}
