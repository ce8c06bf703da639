//! Bridge to the page's toast hook.

use js_sys::{Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};

pub const SEVERITY_ERROR: &str = "error";

/// Route a message through the externally-supplied
/// `window.showToast(message, severity)` hook. Degrades to console logging
/// when the page does not provide one.
pub fn show_toast(message: &str, severity: &str) {
    let hook = web_sys::window()
        .and_then(|window| Reflect::get(&window, &JsValue::from_str("showToast")).ok())
        .and_then(|value| value.dyn_into::<Function>().ok());

    match hook {
        Some(hook) => {
            let result = hook.call2(
                &JsValue::NULL,
                &JsValue::from_str(message),
                &JsValue::from_str(severity),
            );
            if result.is_err() {
                log::error!("toast hook failed for: {message}");
            }
        }
        None if severity == SEVERITY_ERROR => log::error!("{message}"),
        None => log::info!("{message}"),
    }
}
