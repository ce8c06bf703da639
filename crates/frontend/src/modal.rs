//! Per-report modal: open/closed state machine, filter collection and
//! payload rendering.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use engine::fetcher::{FetchOptions, ReportFetcher};
use engine::filters::FilterMap;
use engine::registry::ReportDescriptor;
use engine::render;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::dom;
use crate::toast::{show_toast, SEVERITY_ERROR};
use crate::transport::FetchTransport;

/// The single "active modal" reference the controller routes Escape to.
/// Markup triggered out of band can still mark several modals visible at
/// once; only the last opened one is tracked here.
pub type ActiveModal = Rc<RefCell<Option<String>>>;

pub struct ReportModal {
    kind: String,
    desc: &'static ReportDescriptor,
    root: HtmlElement,
    fetcher: Rc<ReportFetcher<FetchTransport>>,
    active: ActiveModal,
    is_open: Cell<bool>,
    /// Guards the automatic run on the very first open. Later opens reuse
    /// the last rendered content until the user re-runs explicitly.
    loaded_once: Cell<bool>,
    loading: Cell<bool>,
    last_filters: RefCell<FilterMap>,
    previous_active: RefCell<Option<HtmlElement>>,
}

impl ReportModal {
    pub fn new(
        kind: String,
        root: HtmlElement,
        desc: &'static ReportDescriptor,
        fetcher: Rc<ReportFetcher<FetchTransport>>,
        active: ActiveModal,
    ) -> Rc<Self> {
        let modal = Rc::new(ReportModal {
            kind,
            desc,
            root,
            fetcher,
            active,
            is_open: Cell::new(false),
            loaded_once: Cell::new(false),
            loading: Cell::new(false),
            last_filters: RefCell::new(FilterMap::new()),
            previous_active: RefCell::new(None),
        });

        for button in dom::select_all(&modal.root, "[data-modal-close]") {
            let this = Rc::clone(&modal);
            let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                this.close();
            }) as Box<dyn FnMut(_)>);
            let _ = button
                .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        for button in dom::select_all(&modal.root, "[data-report-run]") {
            let this = Rc::clone(&modal);
            let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                this.run_report();
            }) as Box<dyn FnMut(_)>);
            let _ = button
                .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        modal
    }

    pub fn open(self: &Rc<Self>) {
        if self.is_open.get() {
            return;
        }
        if let Some(document) = self.root.owner_document() {
            *self.previous_active.borrow_mut() = document
                .active_element()
                .and_then(|element| element.dyn_into::<HtmlElement>().ok());
        }

        self.is_open.set(true);
        let _ = self.root.class_list().add_1("is-open");
        let _ = self.root.set_attribute("aria-hidden", "false");
        *self.active.borrow_mut() = Some(self.kind.clone());

        if self.desc.supports_range {
            let range = self.fetcher.global_range();
            self.seed_filter("start", &range.start);
            self.seed_filter("end", &range.end);
        }

        if !self.loaded_once.get() {
            self.loaded_once.set(true);
            self.run_report();
        }
    }

    pub fn close(&self) {
        if !self.is_open.get() {
            return;
        }
        self.is_open.set(false);
        let _ = self.root.class_list().remove_1("is-open");
        let _ = self.root.set_attribute("aria-hidden", "true");

        let mut active = self.active.borrow_mut();
        if active.as_deref() == Some(self.kind.as_str()) {
            *active = None;
        }
        drop(active);

        if let Some(previous) = self.previous_active.borrow_mut().take() {
            if previous.is_connected() {
                let _ = previous.focus();
            }
        }
    }

    /// Collect the declared filters and run the report. Empty input values
    /// stay in the set: from the modal's point of view they are explicit
    /// filters, so the run never merges the global range on top.
    pub fn run_report(self: &Rc<Self>) {
        let filters = self.collect_filters();
        // An identical run is already on the wire; the coordinator would
        // hand back the same settled result anyway.
        if self.loading.get() && *self.last_filters.borrow() == filters {
            return;
        }
        self.loading.set(true);
        let _ = self.root.class_list().add_1("is-loading");

        *self.last_filters.borrow_mut() = filters.clone();

        let this = Rc::clone(self);
        wasm_bindgen_futures::spawn_local(async move {
            match this
                .fetcher
                .fetch(&this.kind, FetchOptions::modal(filters))
                .await
            {
                Ok(payload) => this.render(&payload),
                Err(err) => {
                    // previous rendered content stays in place
                    log::error!("report {} failed: {err}", this.kind);
                    show_toast("No se pudo generar el reporte.", SEVERITY_ERROR);
                }
            }
            this.loading.set(false);
            let _ = this.root.class_list().remove_1("is-loading");
        });
    }

    pub fn render(&self, payload: &engine::Payload) {
        for slot in dom::select_all(&self.root, "[data-summary-field]") {
            let Some(name) = slot.get_attribute("data-summary-field") else {
                continue;
            };
            slot.set_text_content(Some(&render::summary_value(self.desc, &name, payload)));
        }

        if let Some(body) = dom::select_one(&self.root, "[data-report-rows]") {
            let columns = dom::select_all(&self.root, "thead th").len();
            body.set_inner_html(&render::table_html(self.desc, payload, columns));
        }
    }

    fn collect_filters(&self) -> FilterMap {
        let mut filters = FilterMap::new();
        for control in dom::select_all(&self.root, "[data-report-filter]") {
            let Some(key) = control.get_attribute("data-report-filter") else {
                continue;
            };
            filters.insert(key, dom::control_value(&control));
        }
        filters
    }

    /// Seed one of the modal's own range inputs from the global filter.
    /// Values the user already typed are left alone.
    fn seed_filter(&self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let selector = format!("[data-report-filter=\"{key}\"]");
        if let Some(control) = dom::select_one(&self.root, &selector) {
            if dom::control_value(&control).is_empty() {
                dom::set_control_value(&control, value);
            }
        }
    }
}
