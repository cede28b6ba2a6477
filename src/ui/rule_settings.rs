/// Domain rule and blacklist editor

use patternfly_yew::prelude::*;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::chrome;
use crate::rules::{MAX_BLACKLIST_ENTRIES, MAX_DOMAIN_RULES, RuleSet};
use crate::storage::StoreWrite;
use crate::ui::components::{ErrorAlert, Field, ValidationMessage};
use crate::validation::{
    DomainRuleRow, parse_speed_input, validate_domain, validate_rule_batch, validate_speed,
};

/// Rows carry a stable id so Yew keeps input focus while rows come and go.
#[derive(Clone, PartialEq)]
struct RuleRow {
    id: String,
    domain: String,
    speed: String,
}

#[derive(Clone, PartialEq)]
struct BlacklistRow {
    id: String,
    domain: String,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn rule_rows_from(rules: &RuleSet) -> Vec<RuleRow> {
    rules
        .domain_rules
        .iter()
        .map(|r| RuleRow {
            id: new_id(),
            domain: r.domain.clone(),
            speed: r.speed.value().to_string(),
        })
        .collect()
}

fn blacklist_rows_from(rules: &RuleSet) -> Vec<BlacklistRow> {
    rules
        .blacklist
        .iter()
        .map(|b| BlacklistRow {
            id: new_id(),
            domain: b.domain.clone(),
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    DomainSpeeds,
    Blacklist,
}

#[derive(Properties, PartialEq)]
pub struct RuleSettingsProps {
    pub rules: RuleSet,
    pub on_saved: Callback<()>,
    pub on_close: Callback<()>,
}

#[function_component(RuleSettings)]
pub fn rule_settings(props: &RuleSettingsProps) -> Html {
    let rule_rows = use_state(|| rule_rows_from(&props.rules));
    let blacklist_rows = use_state(|| blacklist_rows_from(&props.rules));
    let section = use_state(|| Section::DomainSpeeds);
    let save_error = use_state(|| None::<String>);

    let on_section = {
        let section = section.clone();
        move |next: Section| {
            let section = section.clone();
            Callback::from(move |_: MouseEvent| section.set(next))
        }
    };

    // Back to what is stored
    let on_reset = {
        let rule_rows = rule_rows.clone();
        let blacklist_rows = blacklist_rows.clone();
        let save_error = save_error.clone();
        let rules = props.rules.clone();
        Callback::from(move |_: MouseEvent| {
            rule_rows.set(rule_rows_from(&rules));
            blacklist_rows.set(blacklist_rows_from(&rules));
            save_error.set(None);
        })
    };

    let edit_rule = {
        let rule_rows = rule_rows.clone();
        move |id: String, is_speed: bool| {
            let rule_rows = rule_rows.clone();
            Callback::from(move |value: String| {
                let mut next = (*rule_rows).clone();
                if let Some(row) = next.iter_mut().find(|r| r.id == id) {
                    if is_speed {
                        row.speed = value;
                    } else {
                        row.domain = value;
                    }
                }
                rule_rows.set(next);
            })
        }
    };

    let remove_rule = {
        let rule_rows = rule_rows.clone();
        move |id: String| {
            let rule_rows = rule_rows.clone();
            Callback::from(move |_: MouseEvent| {
                let next = rule_rows.iter().filter(|r| r.id != id).cloned().collect();
                rule_rows.set(next);
            })
        }
    };

    let add_rule = {
        let rule_rows = rule_rows.clone();
        Callback::from(move |_: MouseEvent| {
            if rule_rows.len() >= MAX_DOMAIN_RULES {
                return;
            }
            let mut next = (*rule_rows).clone();
            next.push(RuleRow {
                id: new_id(),
                domain: String::new(),
                speed: "1".to_string(),
            });
            rule_rows.set(next);
        })
    };

    let edit_blacklist = {
        let blacklist_rows = blacklist_rows.clone();
        move |id: String| {
            let blacklist_rows = blacklist_rows.clone();
            Callback::from(move |value: String| {
                let mut next = (*blacklist_rows).clone();
                if let Some(row) = next.iter_mut().find(|r| r.id == id) {
                    row.domain = value;
                }
                blacklist_rows.set(next);
            })
        }
    };

    let remove_blacklist = {
        let blacklist_rows = blacklist_rows.clone();
        move |id: String| {
            let blacklist_rows = blacklist_rows.clone();
            Callback::from(move |_: MouseEvent| {
                let next = blacklist_rows.iter().filter(|r| r.id != id).cloned().collect();
                blacklist_rows.set(next);
            })
        }
    };

    let add_blacklist = {
        let blacklist_rows = blacklist_rows.clone();
        Callback::from(move |_: MouseEvent| {
            if blacklist_rows.len() >= MAX_BLACKLIST_ENTRIES {
                return;
            }
            let mut next = (*blacklist_rows).clone();
            next.push(BlacklistRow {
                id: new_id(),
                domain: String::new(),
            });
            blacklist_rows.set(next);
        })
    };

    let on_save = {
        let rule_rows = rule_rows.clone();
        let blacklist_rows = blacklist_rows.clone();
        let save_error = save_error.clone();
        let on_saved = props.on_saved.clone();
        Callback::from(move |_: MouseEvent| {
            let rows: Vec<DomainRuleRow> = rule_rows
                .iter()
                .map(|r| DomainRuleRow {
                    domain: r.domain.clone(),
                    speed: parse_speed_input(&r.speed),
                })
                .collect();
            let blacklist: Vec<String> = blacklist_rows.iter().map(|b| b.domain.clone()).collect();

            let clean = match validate_rule_batch(&rows, &blacklist) {
                Ok(clean) => clean,
                Err(_) => {
                    save_error.set(Some("Fix the highlighted fields before saving".to_string()));
                    return;
                }
            };

            save_error.set(None);
            let write = StoreWrite::new()
                .set_domain_rules(&clean.domain_rules)
                .set_blacklist(&clean.blacklist);
            let save_error = save_error.clone();
            let on_saved = on_saved.clone();
            spawn_local(async move {
                match chrome::apply_write(&write).await {
                    Ok(()) => {
                        log::info!(
                            "Saved {} domain rules and {} blacklist entries",
                            clean.domain_rules.len(),
                            clean.blacklist.len()
                        );
                        on_saved.emit(());
                    }
                    Err(e) => save_error.set(Some(format!("Failed to save rules: {}", e))),
                }
            });
        })
    };

    let on_close = {
        let on_close = props.on_close.clone();
        Callback::from(move |_: MouseEvent| on_close.emit(()))
    };

    let tab_class = |tab: Section| {
        if *section == tab {
            "pf-v5-c-tabs__item pf-m-current"
        } else {
            "pf-v5-c-tabs__item"
        }
    };

    let rules_pane = html! {
        <>
            {for rule_rows.iter().map(|row| {
                let domain_check = validate_domain(&row.domain);
                let speed_check = validate_speed(parse_speed_input(&row.speed));
                html! {
                    <div class="rule-row" key={row.id.clone()}>
                        <Field
                            value={row.domain.clone()}
                            placeholder="youtube.com"
                            oninput={edit_rule(row.id.clone(), false)}
                            invalid={!domain_check.is_valid && !domain_check.message.is_empty()}
                        />
                        <Field
                            value={row.speed.clone()}
                            placeholder="1.5"
                            oninput={edit_rule(row.id.clone(), true)}
                            invalid={!speed_check.is_valid}
                        />
                        <Button onclick={remove_rule(row.id.clone())} variant={ButtonVariant::Plain}>
                            {"✕"}
                        </Button>
                        <ValidationMessage validation={domain_check.clone()} />
                        <ValidationMessage validation={speed_check.clone()} />
                    </div>
                }
            })}
            <Button
                onclick={add_rule}
                variant={ButtonVariant::Secondary}
                disabled={rule_rows.len() >= MAX_DOMAIN_RULES}
            >
                {format!("Add domain ({}/{})", rule_rows.len(), MAX_DOMAIN_RULES)}
            </Button>
        </>
    };

    let blacklist_pane = html! {
        <>
            {for blacklist_rows.iter().map(|row| {
                let check = validate_domain(&row.domain);
                html! {
                    <div class="rule-row" key={row.id.clone()}>
                        <Field
                            value={row.domain.clone()}
                            placeholder="example.com"
                            oninput={edit_blacklist(row.id.clone())}
                            invalid={!check.is_valid && !check.message.is_empty()}
                        />
                        <Button onclick={remove_blacklist(row.id.clone())} variant={ButtonVariant::Plain}>
                            {"✕"}
                        </Button>
                        <ValidationMessage validation={check.clone()} />
                    </div>
                }
            })}
            <Button
                onclick={add_blacklist}
                variant={ButtonVariant::Secondary}
                disabled={blacklist_rows.len() >= MAX_BLACKLIST_ENTRIES}
            >
                {format!("Add site ({}/{})", blacklist_rows.len(), MAX_BLACKLIST_ENTRIES)}
            </Button>
        </>
    };

    html! {
        <div class="settings-panel">
            <ErrorAlert message={(*save_error).clone()} />

            <div class="pf-v5-c-tabs tabs-nav">
                <ul class="pf-v5-c-tabs__list">
                    <li class={tab_class(Section::DomainSpeeds)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_section(Section::DomainSpeeds)}>
                            <span class="pf-v5-c-tabs__item-text">{"Domain speeds"}</span>
                        </button>
                    </li>
                    <li class={tab_class(Section::Blacklist)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_section(Section::Blacklist)}>
                            <span class="pf-v5-c-tabs__item-text">{"Blacklist"}</span>
                        </button>
                    </li>
                </ul>
            </div>

            <div class="tab-pane-content">
                {match *section {
                    Section::DomainSpeeds => rules_pane,
                    Section::Blacklist => blacklist_pane,
                }}
            </div>

            <div class="flex-row-gap">
                <Button onclick={on_save} variant={ButtonVariant::Primary}>{"Save"}</Button>
                <Button onclick={on_reset} variant={ButtonVariant::Link}>{"Reset"}</Button>
                <Button onclick={on_close} variant={ButtonVariant::Secondary}>{"Back"}</Button>
            </div>
        </div>
    }
}
