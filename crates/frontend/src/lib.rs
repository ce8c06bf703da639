//! Browser side of the report dashboard.
//!
//! The page's markup is owned by the server templates; this crate discovers
//! it by attribute (`data-report-card`, `data-report-modal`, the range
//! controls), binds each discovered element against the report registry and
//! drives the shared fetch pipeline from the `engine` crate.

pub mod controller;
pub mod dom;
pub mod modal;
pub mod toast;
pub mod transport;

use wasm_bindgen::prelude::wasm_bindgen;

use controller::{Dashboard, LoadStrategy};

#[wasm_bindgen(start)]
pub fn start() {
    // initializes logging using the `log` crate
    _ = console_log::init_with_level(log::Level::Debug);
    console_error_panic_hook::set_once();

    if let Err(err) = Dashboard::init(LoadStrategy::Lazy) {
        log::error!("dashboard init failed: {err:?}");
    }
}
