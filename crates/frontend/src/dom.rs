//! Small query helpers over `web-sys`.

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, HtmlInputElement, HtmlSelectElement};

/// All elements under `root` matching `selector`, as `HtmlElement`s.
pub fn select_all(root: &Element, selector: &str) -> Vec<HtmlElement> {
    let mut found = Vec::new();
    let Ok(nodes) = root.query_selector_all(selector) else {
        return found;
    };
    for index in 0..nodes.length() {
        if let Some(node) = nodes.item(index) {
            if let Ok(element) = node.dyn_into::<HtmlElement>() {
                found.push(element);
            }
        }
    }
    found
}

/// First match under `root`, or `None`.
pub fn select_one(root: &Element, selector: &str) -> Option<HtmlElement> {
    root.query_selector(selector)
        .ok()
        .flatten()
        .and_then(|element| element.dyn_into::<HtmlElement>().ok())
}

/// Current value of a form control (`<input>` or `<select>`).
pub fn control_value(element: &HtmlElement) -> String {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.value()
    } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        select.value()
    } else {
        String::new()
    }
}

/// Overwrite a form control's value.
pub fn set_control_value(element: &HtmlElement, value: &str) {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.set_value(value);
    } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        select.set_value(value);
    }
}
