//! OpenSearch query builders.
//!
//! This module turns listing criteria and a page request into a search body.

use serde_json::{json, Map, Value};

use crate::opensearch::index_config::TEXT_FIELDS;
use listing_indexer_shared::{PageRequest, SearchCriteria, SortOrder};

/// Build an OpenSearch search body from criteria and a page request.
///
/// Every present criteria field becomes a `match` clause in `bool.must`, so
/// fields combine with AND. With no criteria the query is `match_all`.
pub fn build_search_query(criteria: &SearchCriteria, page: &PageRequest) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), build_criteria_query(criteria));
    body.insert("from".to_string(), json!(page.offset()));
    body.insert("size".to_string(), json!(page.size));

    if !page.sort.is_empty() {
        let sort: Vec<Value> = page.sort.iter().map(build_sort_clause).collect();
        body.insert("sort".to_string(), Value::Array(sort));
    }

    Value::Object(body)
}

fn build_criteria_query(criteria: &SearchCriteria) -> Value {
    let mut must = Vec::new();

    if let Some(make) = &criteria.make {
        must.push(match_clause("make", json!(make)));
    }
    if let Some(model) = &criteria.model {
        must.push(match_clause("model", json!(model)));
    }
    if let Some(year) = criteria.year {
        must.push(match_clause("year", json!(year)));
    }
    if let Some(min_price) = criteria.min_price {
        must.push(match_clause("minPrice", json!(min_price)));
    }
    if let Some(max_price) = criteria.max_price {
        must.push(match_clause("maxPrice", json!(max_price)));
    }
    if let Some(color) = &criteria.color {
        must.push(match_clause("color", json!(color)));
    }

    if must.is_empty() {
        return json!({ "match_all": {} });
    }

    json!({
        "bool": {
            "must": must
        }
    })
}

fn match_clause(field: &str, value: Value) -> Value {
    json!({ "match": { field: value } })
}

/// Text fields sort on their keyword sub-field.
///
/// The sub-field only exists under the listing mappings. `unmapped_type`
/// keeps the query valid on an index that was created without them.
fn build_sort_clause(order: &SortOrder) -> Value {
    let direction = order.direction.as_str();

    if TEXT_FIELDS.contains(&order.field.as_str()) {
        let field = format!("{}.raw", order.field);
        json!({ field: { "order": direction, "unmapped_type": "keyword" } })
    } else {
        let field = order.field.as_str();
        json!({ field: { "order": direction } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_criteria_matches_all() {
        let query = build_search_query(&SearchCriteria::any(), &PageRequest::default());

        assert!(query["query"]["match_all"].is_object());
        assert_eq!(query["from"], 0);
        assert_eq!(query["size"], 20);
        assert!(query.get("sort").is_none());
    }

    #[test]
    fn test_single_field() {
        let criteria = SearchCriteria::any().with_make("Peugeot");
        let query = build_search_query(&criteria, &PageRequest::default());

        let must = query["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["match"]["make"], "Peugeot");
    }

    #[test]
    fn test_all_fields() {
        let criteria = SearchCriteria::any()
            .with_make("Peugeot")
            .with_model("308")
            .with_year(2015)
            .with_min_price(10000.0)
            .with_max_price(12000.0)
            .with_color("black");
        let query = build_search_query(&criteria, &PageRequest::default());

        let must = query["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 6);
        assert_eq!(must[1]["match"]["model"], "308");
        assert_eq!(must[2]["match"]["year"], 2015);
        assert_eq!(must[3]["match"]["minPrice"], 10000.0);
        assert_eq!(must[4]["match"]["maxPrice"], 12000.0);
        assert_eq!(must[5]["match"]["color"], "black");
    }

    #[test]
    fn test_pagination_and_sort() {
        let page = PageRequest::of(2, 15)
            .with_sort(SortOrder::desc("year"))
            .with_sort(SortOrder::asc("make"));
        let query = build_search_query(&SearchCriteria::any(), &page);

        assert_eq!(query["from"], 30);
        assert_eq!(query["size"], 15);

        let sort = query["sort"].as_array().unwrap();
        assert_eq!(sort[0]["year"]["order"], "desc");
        assert_eq!(sort[1]["make.raw"]["order"], "asc");
    }

    #[test]
    fn test_text_sort_tolerates_missing_keyword_field() {
        let page = PageRequest::default()
            .with_sort(SortOrder::asc("color"))
            .with_sort(SortOrder::desc("minPrice"));
        let query = build_search_query(&SearchCriteria::any(), &page);

        let sort = query["sort"].as_array().unwrap();
        assert_eq!(
            sort[0],
            json!({ "color.raw": { "order": "asc", "unmapped_type": "keyword" } })
        );
        assert_eq!(sort[1], json!({ "minPrice": { "order": "desc" } }));
    }
}
