/// Reusable UI components

use patternfly_yew::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::speed::Speed;
use crate::validation::{Severity, Validation};

#[derive(Properties, PartialEq)]
pub struct SpeedButtonProps {
    pub speed: Speed,
    pub active: bool,
    pub onselect: Callback<Speed>,
    #[prop_or(false)]
    pub disabled: bool,
}

/// One preset in the popup grid.
#[function_component(SpeedButton)]
pub fn speed_button(props: &SpeedButtonProps) -> Html {
    let onclick = {
        let speed = props.speed;
        let onselect = props.onselect.clone();
        Callback::from(move |_: MouseEvent| onselect.emit(speed))
    };

    let variant = if props.active {
        ButtonVariant::Primary
    } else {
        ButtonVariant::Secondary
    };

    html! {
        <div class="speed-cell">
            <Button {onclick} {variant} disabled={props.disabled} block={true}>
                {format!("{}x", props.speed.label())}
            </Button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ValidationMessageProps {
    pub validation: Validation,
}

/// Inline message under a form field. Renders nothing for an empty message.
#[function_component(ValidationMessage)]
pub fn validation_message(props: &ValidationMessageProps) -> Html {
    let validation = &props.validation;
    if validation.message.is_empty() {
        return html! {};
    }

    html! {
        <p class={classes!("validation-message", severity_class(validation.severity))}>
            {&validation.message}
        </p>
    }
}

pub fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::None => "validation-none",
        Severity::Success => "validation-success",
        Severity::Warning => "validation-warning",
        Severity::Error => "validation-error",
    }
}

#[derive(Properties, PartialEq)]
pub struct FieldProps {
    pub value: String,
    pub oninput: Callback<String>,
    #[prop_or_default]
    pub placeholder: AttrValue,
    #[prop_or(false)]
    pub invalid: bool,
}

/// Text input that reports its value as a `String`.
#[function_component(Field)]
pub fn field(props: &FieldProps) -> Html {
    let oninput = {
        let oninput = props.oninput.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target().and_then(|t| t.dyn_into::<HtmlInputElement>().ok()) {
                oninput.emit(input.value());
            }
        })
    };

    html! {
        <input
            type="text"
            class={classes!("pf-v5-c-form-control", props.invalid.then_some("input-invalid"))}
            value={props.value.clone()}
            placeholder={props.placeholder.clone()}
            {oninput}
        />
    }
}

#[derive(Properties, PartialEq)]
pub struct ErrorAlertProps {
    pub message: Option<String>,
}

#[function_component(ErrorAlert)]
pub fn error_alert(props: &ErrorAlertProps) -> Html {
    match &props.message {
        Some(message) => html! {
            <div class="message-top-margin">
                <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                    {message.clone()}
                </Alert>
            </div>
        },
        None => html! {},
    }
}
