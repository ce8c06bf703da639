//! Static catalog of report descriptors.
//!
//! Per-report behaviour lives here as plain data plus attached functions:
//! the endpoint, its filter mapping and the extractor/renderer functions the
//! shared pipeline interprets. Adding a report is adding one entry to
//! [`REPORTS`], not writing new pipeline code.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::format::{escape_html, format_currency, PLACEHOLDER};
use crate::Payload;

/// How a declared summary slot resolves against a payload.
pub enum SummaryField {
    /// Project a payload field verbatim. Dotted paths reach into nested
    /// aggregates (`totals.venta_display`, `summary.cuotas_vencidas`).
    Field(&'static str),
    /// Derive the value from the whole payload.
    Compute(fn(&Payload) -> String),
}

/// Immutable configuration for one report type.
pub struct ReportDescriptor {
    /// Endpoint queried with GET.
    pub endpoint: &'static str,
    /// Whether the shared date-range filter applies to this report.
    pub supports_range: bool,
    /// Internal filter key to query-parameter name. Keys not listed here
    /// serialize under their own name.
    pub param_map: &'static [(&'static str, &'static str)],
    /// Filters applied before globals and explicit overrides.
    pub default_filters: &'static [(&'static str, &'static str)],
    /// Headline value for the summary card.
    pub card_value: fn(&Payload) -> String,
    /// Slot name to projection, for the modal's summary strip.
    pub summary_fields: &'static [(&'static str, SummaryField)],
    /// Record sequence of the payload. Must tolerate payloads that are not
    /// containers by yielding an empty slice.
    pub rows: fn(&Payload) -> &[Payload],
    /// One `<tr>` fragment per row, HTML-escaped.
    pub render_row: fn(&Payload) -> String,
    /// Shown as a single full-width row when there are no records.
    pub empty_message: &'static str,
}

/// Look up a payload field by dotted path. Strings come back as-is, numbers
/// and booleans through their display form.
pub fn field_text(payload: &Payload, path: &str) -> Option<String> {
    let mut current = payload;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        Payload::String(s) => Some(s.clone()),
        Payload::Number(n) => Some(n.to_string()),
        Payload::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text(payload: &Payload, path: &str) -> String {
    field_text(payload, path).unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn rows_at<'a>(payload: &'a Payload, key: &str) -> &'a [Payload] {
    payload
        .get(key)
        .and_then(Payload::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Escaped `<td>` cell for one payload field.
fn cell(payload: &Payload, path: &str) -> String {
    format!("<td>{}</td>", escape_html(&text(payload, path)))
}

fn tr(cells: String) -> String {
    format!("<tr>{cells}</tr>")
}

/// Average ticket for the sales card: derived client-side, the backend only
/// ships the total and the sale count.
fn average_ticket(payload: &Payload) -> String {
    let total = payload.get("total_sales").and_then(Payload::as_f64);
    let count = payload.get("ventas").and_then(Payload::as_f64);
    match (total, count) {
        (Some(total), Some(count)) if count > 0.0 => format_currency(total / count),
        _ => PLACEHOLDER.to_string(),
    }
}

const TOTAL_SALES_SUMMARY: &[(&str, SummaryField)] = &[
    ("total", SummaryField::Field("total_sales_display")),
    ("cost", SummaryField::Field("total_cost_display")),
    ("profit", SummaryField::Field("total_profit_display")),
    ("count", SummaryField::Field("ventas_display")),
    ("average", SummaryField::Compute(average_ticket)),
];

const MAP_RANGE: &[(&str, &str)] = &[("start", "fecha_inicio"), ("end", "fecha_fin")];
const MAP_RANGE_SEARCH: &[(&str, &str)] = &[
    ("start", "fecha_inicio"),
    ("end", "fecha_fin"),
    ("search", "q"),
];

static REPORTS: Lazy<HashMap<&'static str, ReportDescriptor>> = Lazy::new(|| {
    let mut reports = HashMap::new();

    reports.insert(
        "total-sales",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/ventas-totales/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[],
            card_value: |p| text(p, "total_sales_display"),
            summary_fields: TOTAL_SALES_SUMMARY,
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "factura"),
                    cell(row, "fecha_display"),
                    cell(row, "cliente"),
                    cell(row, "subtotal_display"),
                    cell(row, "itbis_display"),
                    cell(row, "total_display"),
                    cell(row, "metodo_pago"),
                ]
                .concat())
            },
            empty_message: "No hay ventas registradas en el período seleccionado.",
        },
    );

    reports.insert(
        "profit",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/ganancias/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[],
            card_value: |p| text(p, "total_profit_display"),
            summary_fields: &[
                ("sales", SummaryField::Field("total_sales_display")),
                ("cost", SummaryField::Field("total_cost_display")),
                ("profit", SummaryField::Field("total_profit_display")),
                ("count", SummaryField::Field("ventas_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "factura"),
                    cell(row, "fecha_display"),
                    cell(row, "total_display"),
                    cell(row, "costo_display"),
                    cell(row, "ganancia_display"),
                ]
                .concat())
            },
            empty_message: "No hay ganancias registradas en el período seleccionado.",
        },
    );

    reports.insert(
        "inventory-cost",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/costo-inventario/",
            supports_range: false,
            param_map: &[],
            default_filters: &[],
            card_value: |p| text(p, "total_cost_display"),
            summary_fields: &[
                ("total", SummaryField::Field("total_cost_display")),
                ("stock", SummaryField::Field("total_stock")),
                ("products", SummaryField::Field("products_count")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "producto"),
                    cell(row, "categoria"),
                    cell(row, "proveedor"),
                    cell(row, "precio_compra_display"),
                    cell(row, "stock"),
                    cell(row, "costo_total_display"),
                ]
                .concat())
            },
            empty_message: "No hay productos con stock disponible.",
        },
    );

    reports.insert(
        "sales-cost",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/costo-ventas/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[],
            card_value: |p| text(p, "total_cost_display"),
            summary_fields: &[
                ("total", SummaryField::Field("total_cost_display")),
                ("units", SummaryField::Field("total_units_display")),
                ("count", SummaryField::Field("ventas_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "factura"),
                    cell(row, "cliente"),
                    cell(row, "fecha_display"),
                    cell(row, "unidades_display"),
                    cell(row, "costo_total_display"),
                ]
                .concat())
            },
            empty_message: "No hay ventas registradas en el período seleccionado.",
        },
    );

    reports.insert(
        "sales-period",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/ventas-periodo/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[("period", "day")],
            card_value: |p| text(p, "total_sales_display"),
            summary_fields: &[
                ("total", SummaryField::Field("total_sales_display")),
                ("count", SummaryField::Field("ventas_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "period_display"),
                    cell(row, "ventas_display"),
                    cell(row, "total_display"),
                ]
                .concat())
            },
            empty_message: "No hay ventas para agrupar en el período seleccionado.",
        },
    );

    reports.insert(
        "profit-period",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/ganancias-periodo/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[("period", "day")],
            card_value: |p| text(p, "total_profit_display"),
            summary_fields: &[
                ("sales", SummaryField::Field("total_sales_display")),
                ("cost", SummaryField::Field("total_cost_display")),
                ("profit", SummaryField::Field("total_profit_display")),
                ("count", SummaryField::Field("ventas_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "period_display"),
                    cell(row, "ventas_display"),
                    cell(row, "total_sales_display"),
                    cell(row, "total_cost_display"),
                    cell(row, "total_profit_display"),
                ]
                .concat())
            },
            empty_message: "No hay ganancias para agrupar en el período seleccionado.",
        },
    );

    reports.insert(
        "product-sales",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/ventas-producto/",
            supports_range: true,
            param_map: MAP_RANGE_SEARCH,
            default_filters: &[],
            card_value: |p| text(p, "totals.venta_display"),
            summary_fields: &[
                ("products", SummaryField::Field("totals.productos_display")),
                ("quantity", SummaryField::Field("totals.cantidad_display")),
                ("total", SummaryField::Field("totals.venta_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "producto"),
                    cell(row, "marca"),
                    cell(row, "modelo"),
                    cell(row, "cantidad_display"),
                    cell(row, "subtotal_display"),
                    cell(row, "total_display"),
                ]
                .concat())
            },
            empty_message: "No se encontraron productos vendidos.",
        },
    );

    reports.insert(
        "category-analysis",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/categorias-analitico/",
            supports_range: false,
            param_map: &[("search", "q")],
            default_filters: &[],
            card_value: |p| text(p, "totals.valor_display"),
            summary_fields: &[
                ("groups", SummaryField::Field("totals.grupos_display")),
                ("categories", SummaryField::Field("totals.categorias_display")),
                ("products", SummaryField::Field("totals.productos_display")),
                ("stock", SummaryField::Field("totals.stock_display")),
                ("value", SummaryField::Field("totals.valor_display")),
            ],
            rows: |p| rows_at(p, "rows"),
            render_row: |row| {
                tr([
                    cell(row, "categoria"),
                    cell(row, "marca"),
                    cell(row, "productos_display"),
                    cell(row, "stock_display"),
                    cell(row, "valor_display"),
                ]
                .concat())
            },
            empty_message: "No se encontraron categorías con stock.",
        },
    );

    reports.insert(
        "credit-installments",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/cuotas/",
            supports_range: true,
            param_map: &[
                ("start", "fecha_inicio"),
                ("end", "fecha_fin"),
                ("status", "estado"),
            ],
            default_filters: &[],
            card_value: |p| text(p, "summary.total_pendiente_display"),
            summary_fields: &[
                ("total", SummaryField::Field("summary.total_creditos")),
                ("pending", SummaryField::Field("summary.total_pendiente_display")),
                ("overdue", SummaryField::Field("summary.cuotas_vencidas")),
                ("upcoming", SummaryField::Field("summary.proximos_vencimientos")),
            ],
            rows: |p| rows_at(p, "creditos"),
            render_row: |row| {
                tr([
                    cell(row, "factura"),
                    cell(row, "cliente"),
                    cell(row, "fecha_venta_display"),
                    cell(row, "total_credito_display"),
                    cell(row, "total_abonado_display"),
                    cell(row, "saldo_pendiente_display"),
                    cell(row, "estado_display"),
                    cell(row, "countdown_display"),
                ]
                .concat())
            },
            empty_message: "No hay cuentas de crédito para los filtros seleccionados.",
        },
    );

    reports.insert(
        "cash-sessions",
        ReportDescriptor {
            endpoint: "/dashboard/reportes/caja/",
            supports_range: true,
            param_map: MAP_RANGE,
            default_filters: &[("page_size", "10")],
            card_value: |p| text(p, "pagination.total"),
            summary_fields: &[("count", SummaryField::Field("pagination.total"))],
            rows: |p| rows_at(p, "sessions"),
            render_row: |row| {
                tr([
                    cell(row, "apertura_display"),
                    cell(row, "cierre_display"),
                    cell(row, "estado_display"),
                    cell(row, "monto_inicial_display"),
                    cell(row, "totals.total_display"),
                    cell(row, "totals.total_en_caja_display"),
                ]
                .concat())
            },
            empty_message: "No hay sesiones de caja en el período seleccionado.",
        },
    );

    reports
});

/// Descriptor for a report type, `None` for unknown types.
pub fn descriptor(kind: &str) -> Option<&'static ReportDescriptor> {
    REPORTS.get(kind)
}

/// Query-parameter name for an internal filter key, identity fallback.
pub fn param_name<'a>(desc: &ReportDescriptor, key: &'a str) -> &'a str {
    desc.param_map
        .iter()
        .find(|(internal, _)| *internal == key)
        .map(|(_, mapped)| *mapped)
        .unwrap_or(key)
}
