//! Filter state and query-string construction.

use std::collections::BTreeMap;

use crate::registry::{param_name, ReportDescriptor};

/// Filter key/value pairs. A `BTreeMap` keeps serialization deterministic so
/// logically-identical filter sets collide to the same cache key.
pub type FilterMap = BTreeMap<String, String>;

/// The shared date range applied to every range-supporting report's summary
/// card. Mutated only by the range-apply control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalFilters {
    pub start: String,
    pub end: String,
}

/// Merge a report's filters in precedence order: descriptor defaults, then
/// the global range (when supplied), then explicit overrides. Empty values
/// survive the merge so an explicit empty string can mask a default; they are
/// dropped later when the query string is built.
pub fn merge_filters(
    desc: &ReportDescriptor,
    globals: Option<&GlobalFilters>,
    explicit: &FilterMap,
) -> FilterMap {
    let mut merged = FilterMap::new();
    for (key, value) in desc.default_filters {
        merged.insert((*key).to_string(), (*value).to_string());
    }
    if let Some(globals) = globals {
        merged.insert("start".to_string(), globals.start.clone());
        merged.insert("end".to_string(), globals.end.clone());
    }
    for (key, value) in explicit {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Serialize merged filters into a query string. Empty values are never
/// serialized; surviving keys go through the descriptor's parameter map with
/// identity fallback.
pub fn build_query(desc: &ReportDescriptor, merged: &FilterMap) -> String {
    let mut parts = Vec::new();
    for (key, value) in merged {
        if value.is_empty() {
            continue;
        }
        parts.push(format!(
            "{}={}",
            urlencoding::encode(param_name(desc, key)),
            urlencoding::encode(value)
        ));
    }
    parts.join("&")
}

/// Full request URL for a report with its merged filters.
pub fn build_url(desc: &ReportDescriptor, merged: &FilterMap) -> String {
    let query = build_query(desc, merged);
    if query.is_empty() {
        desc.endpoint.to_string()
    } else {
        format!("{}?{}", desc.endpoint, query)
    }
}

/// Stable serialization of a filter set for cache keys. Unlike the query
/// string this keeps empty values, so "explicitly blank" and "absent" stay
/// distinct keys.
pub fn stable_token(filters: &FilterMap) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::descriptor;

    fn filters(pairs: &[(&str, &str)]) -> FilterMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_values_never_serialize() {
        let desc = descriptor("total-sales").unwrap();
        let merged = filters(&[("start", "2025-01-01"), ("end", ""), ("search", "")]);
        let query = build_query(desc, &merged);
        assert_eq!(query, "fecha_inicio=2025-01-01");
        assert!(!query.contains("fecha_fin"));
        assert!(!query.contains("q="));
    }

    #[test]
    fn test_param_mapping_with_identity_fallback() {
        let desc = descriptor("product-sales").unwrap();
        let merged = filters(&[("search", "iphone"), ("page", "2")]);
        let query = build_query(desc, &merged);
        // `search` is mapped, `page` is not in the map and keeps its name
        assert!(query.contains("q=iphone"));
        assert!(query.contains("page=2"));
    }

    #[test]
    fn test_precedence_defaults_globals_explicit() {
        let desc = descriptor("sales-period").unwrap();
        let globals = GlobalFilters {
            start: "2025-01-01".to_string(),
            end: "2025-01-31".to_string(),
        };
        let explicit = filters(&[("period", "month"), ("start", "2025-02-01")]);
        let merged = merge_filters(desc, Some(&globals), &explicit);

        assert_eq!(merged.get("period").unwrap(), "month"); // explicit beats default
        assert_eq!(merged.get("start").unwrap(), "2025-02-01"); // explicit beats global
        assert_eq!(merged.get("end").unwrap(), "2025-01-31"); // global survives

        let defaults_only = merge_filters(desc, None, &FilterMap::new());
        assert_eq!(defaults_only.get("period").unwrap(), "day");
        assert!(!defaults_only.contains_key("start"));
    }

    #[test]
    fn test_query_values_are_percent_encoded() {
        let desc = descriptor("product-sales").unwrap();
        let merged = filters(&[("search", "café & azúcar")]);
        let query = build_query(desc, &merged);
        assert_eq!(query, "q=caf%C3%A9%20%26%20az%C3%BAcar");
    }

    #[test]
    fn test_stable_token_is_order_independent() {
        let a = filters(&[("start", "2025-01-01"), ("end", "2025-01-31")]);
        let b = filters(&[("end", "2025-01-31"), ("start", "2025-01-01")]);
        assert_eq!(stable_token(&a), stable_token(&b));
        // empty values stay visible in the token
        let c = filters(&[("start", ""), ("end", "2025-01-31")]);
        assert_ne!(stable_token(&a), stable_token(&c));
    }

    #[test]
    fn test_build_url_with_and_without_query() {
        let desc = descriptor("inventory-cost").unwrap();
        assert_eq!(
            build_url(desc, &FilterMap::new()),
            "/dashboard/reportes/costo-inventario/"
        );

        let desc = descriptor("cash-sessions").unwrap();
        let merged = merge_filters(desc, None, &FilterMap::new());
        assert_eq!(
            build_url(desc, &merged),
            "/dashboard/reportes/caja/?page_size=10"
        );
    }
}
