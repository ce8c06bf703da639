//! Dashboard controller: discovers markup, wires the range controls and
//! drives summary-card loading.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use engine::fetcher::{FetchOptions, ReportFetcher};
use engine::format::PLACEHOLDER;
use engine::{registry, render};
use gloo_timers::callback::Timeout;
use js_sys::Reflect;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, HtmlElement, HtmlInputElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, KeyboardEvent,
};

use crate::dom;
use crate::modal::{ActiveModal, ReportModal};
use crate::toast::{show_toast, SEVERITY_ERROR};
use crate::transport::FetchTransport;

/// Cards start fetching 50px before they scroll into view.
const LAZY_ROOT_MARGIN: &str = "50px";
/// Bulk-load delay when `IntersectionObserver` is unavailable.
const FALLBACK_DELAY_MS: u32 = 200;

const LOADED_MARK: &str = "data-loaded";

/// How summary cards get their first load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Fetch a card the first time it enters the viewport.
    Lazy,
    /// Fetch every card at startup.
    Eager,
}

pub struct Dashboard {
    document: Document,
    fetcher: Rc<ReportFetcher<FetchTransport>>,
    modals: HashMap<String, Rc<ReportModal>>,
    cards: Vec<HtmlElement>,
    active: ActiveModal,
    observer: RefCell<Option<IntersectionObserver>>,
    strategy: LoadStrategy,
}

impl Dashboard {
    /// Wire every markup-declared trigger and modal. Intended to run exactly
    /// once per page load. Elements naming a report type without a
    /// descriptor are skipped silently.
    pub fn init(strategy: LoadStrategy) -> Result<Rc<Self>, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("document is not available"))?;
        let root = document
            .document_element()
            .ok_or_else(|| JsValue::from_str("document has no root element"))?;

        let fetcher = Rc::new(ReportFetcher::new(FetchTransport));
        let active: ActiveModal = Rc::new(RefCell::new(None));

        let mut modals = HashMap::new();
        for element in dom::select_all(&root, "[data-report-modal]") {
            let Some(kind) = element.get_attribute("data-report-modal") else {
                continue;
            };
            let Some(desc) = registry::descriptor(&kind) else {
                log::warn!("markup declares unknown report modal: {kind}");
                continue;
            };
            let modal = ReportModal::new(
                kind.clone(),
                element,
                desc,
                Rc::clone(&fetcher),
                Rc::clone(&active),
            );
            modals.insert(kind, modal);
        }

        let mut cards = Vec::new();
        for element in dom::select_all(&root, "[data-report-card]") {
            let Some(kind) = element.get_attribute("data-report-card") else {
                continue;
            };
            if registry::descriptor(&kind).is_none() {
                log::warn!("markup declares unknown report card: {kind}");
                continue;
            }
            cards.push(element);
        }

        let dashboard = Rc::new(Dashboard {
            document,
            fetcher,
            modals,
            cards,
            active,
            observer: RefCell::new(None),
            strategy,
        });

        dashboard.wire_cards();
        dashboard.wire_range_controls();
        dashboard.wire_escape();
        dashboard.arm_loading();

        Ok(dashboard)
    }

    pub fn open_modal(&self, kind: &str) {
        if let Some(modal) = self.modals.get(kind) {
            modal.open();
        }
    }

    fn wire_cards(self: &Rc<Self>) {
        for card in &self.cards {
            let Some(kind) = card.get_attribute("data-report-card") else {
                continue;
            };
            let this = Rc::clone(self);
            let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                this.open_modal(&kind);
            }) as Box<dyn FnMut(_)>);
            let _ = card.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn wire_range_controls(self: &Rc<Self>) {
        let root = match self.document.document_element() {
            Some(root) => root,
            None => return,
        };
        let Some(apply) = dom::select_one(&root, "[data-range-apply]") else {
            return;
        };
        let start = dom::select_one(&root, "[data-range-start]")
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
        let end = dom::select_one(&root, "[data-range-end]")
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());

        let this = Rc::clone(self);
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let start_value = start.as_ref().map(|input| input.value()).unwrap_or_default();
            let end_value = end.as_ref().map(|input| input.value()).unwrap_or_default();
            this.apply_range(&start_value, &end_value);
        }) as Box<dyn FnMut(_)>);
        let _ = apply.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Copy the picker inputs into the shared range, drop every cached
    /// payload and let the cards reload under the active strategy.
    fn apply_range(self: &Rc<Self>, start: &str, end: &str) {
        self.fetcher.set_global_range(start, end);
        for card in &self.cards {
            let _ = card.remove_attribute(LOADED_MARK);
        }

        match self.strategy {
            LoadStrategy::Eager => self.load_all(),
            LoadStrategy::Lazy => {
                let observer = self.observer.borrow();
                match observer.as_ref() {
                    Some(observer) => {
                        // visibility re-arms the loads
                        for card in &self.cards {
                            observer.observe(card);
                        }
                    }
                    None => {
                        drop(observer);
                        self.load_all();
                    }
                }
            }
        }
    }

    fn wire_escape(self: &Rc<Self>) {
        let this = Rc::clone(self);
        let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if key_event.key() != "Escape" {
                return;
            }
            let active = this.active.borrow().clone();
            if let Some(kind) = active {
                if let Some(modal) = this.modals.get(&kind) {
                    modal.close();
                }
            }
        }) as Box<dyn FnMut(_)>);
        let _ = self
            .document
            .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn arm_loading(self: &Rc<Self>) {
        match self.strategy {
            LoadStrategy::Eager => self.load_all(),
            LoadStrategy::Lazy => {
                if has_intersection_observer() {
                    if let Err(err) = self.observe_cards() {
                        log::error!("intersection observer setup failed: {err:?}");
                        self.load_all();
                    }
                } else {
                    let this = Rc::clone(self);
                    Timeout::new(FALLBACK_DELAY_MS, move || this.load_all()).forget();
                }
            }
        }
    }

    fn observe_cards(self: &Rc<Self>) -> Result<(), JsValue> {
        let this = Rc::clone(self);
        let callback = Closure::wrap(Box::new(
            move |entries: js_sys::Array, observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                        continue;
                    };
                    if !entry.is_intersecting() {
                        continue;
                    }
                    let Ok(card) = entry.target().dyn_into::<HtmlElement>() else {
                        continue;
                    };
                    if card.has_attribute(LOADED_MARK) {
                        continue;
                    }
                    let _ = card.set_attribute(LOADED_MARK, "1");
                    observer.unobserve(&card);
                    this.load_card(&card);
                }
            },
        )
            as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>);

        let options = IntersectionObserverInit::new();
        options.set_root_margin(LAZY_ROOT_MARGIN);
        let observer = IntersectionObserver::new_with_options(
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        for card in &self.cards {
            observer.observe(card);
        }
        callback.forget();
        *self.observer.borrow_mut() = Some(observer);
        Ok(())
    }

    fn load_all(self: &Rc<Self>) {
        for card in &self.cards {
            if card.has_attribute(LOADED_MARK) {
                continue;
            }
            let _ = card.set_attribute(LOADED_MARK, "1");
            self.load_card(card);
        }
    }

    /// Fetch one card's summary with the global range applied.
    fn load_card(self: &Rc<Self>, card: &HtmlElement) {
        let Some(kind) = card.get_attribute("data-report-card") else {
            return;
        };
        let _ = card.class_list().add_1("is-loading");
        let value_slot = dom::select_one(card, "[data-card-value]");
        if let Some(slot) = &value_slot {
            slot.set_text_content(Some("…"));
        }

        let fetcher = Rc::clone(&self.fetcher);
        let card = card.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match fetcher.fetch(&kind, FetchOptions::card()).await {
                Ok(payload) => {
                    if let (Some(slot), Some(desc)) = (&value_slot, registry::descriptor(&kind)) {
                        slot.set_text_content(Some(&render::card_value(desc, &payload)));
                    }
                }
                Err(err) => {
                    log::error!("summary for {kind} failed: {err}");
                    if let Some(slot) = &value_slot {
                        slot.set_text_content(Some(PLACEHOLDER));
                    }
                    show_toast("No se pudo cargar el resumen del reporte.", SEVERITY_ERROR);
                }
            }
            let _ = card.class_list().remove_1("is-loading");
        });
    }
}

fn has_intersection_observer() -> bool {
    web_sys::window()
        .map(|window| {
            Reflect::has(&window, &JsValue::from_str("IntersectionObserver")).unwrap_or(false)
        })
        .unwrap_or(false)
}
