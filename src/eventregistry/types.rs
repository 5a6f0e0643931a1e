use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One article as returned by the search service. Immutable once fetched;
/// `url` is the uniqueness key during aggregation. Fields the pipeline does
/// not care about are kept in `extra` and passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Filter set for one (keyword, source) combination. Constructed fresh per
/// combination and never mutated.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub keyword: String,
    pub source_domain: String,
    pub languages: Vec<String>,
    pub excluded_topics: Vec<String>,
    /// Byline allow-list. Empty means no author restriction — the wire
    /// request omits the field entirely in that case.
    pub allowed_authors: Vec<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub per_source_limit: usize,
    pub dedupe: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub action: &'static str,
    pub keyword: Vec<String>,
    pub keyword_oper: &'static str,
    pub source_uri: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lang: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_keyword: Vec<String>,
    pub ignore_keyword_oper: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author_uri: Vec<String>,
    pub is_duplicate_filter: &'static str,
    pub data_type: Vec<&'static str>,
    pub date_start: String,
    pub date_end: String,
    pub articles_sort_by: &'static str,
    pub articles_count: usize,
    pub api_key: String,
}

/// Largest page the index serves per request.
const MAX_ARTICLES_PER_PAGE: usize = 100;

impl SearchRequest {
    pub fn new(spec: &QuerySpec, source_uri: String, api_key: String) -> Self {
        Self {
            action: "getArticles",
            keyword: vec![spec.keyword.clone()],
            keyword_oper: "and",
            source_uri,
            lang: spec.languages.clone(),
            ignore_keyword: spec.excluded_topics.clone(),
            ignore_keyword_oper: "or",
            author_uri: spec.allowed_authors.clone(),
            is_duplicate_filter: if spec.dedupe {
                "skipDuplicates"
            } else {
                "keepAll"
            },
            data_type: vec!["news"],
            date_start: spec.date_start.format("%Y-%m-%d").to_string(),
            date_end: spec.date_end.format("%Y-%m-%d").to_string(),
            articles_sort_by: "rel",
            // Headroom over the per-source limit: the executor also filters
            // excluded topics client-side, and articles it drops must be
            // replaceable by later ones from the same page.
            articles_count: spec.per_source_limit.saturating_mul(4).min(MAX_ARTICLES_PER_PAGE),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub articles: Option<ArticlePage>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticlePage {
    #[serde(default)]
    pub results: Vec<Article>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestSourcesRequest {
    pub prefix: String,
    pub count: usize,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceSuggestion {
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> QuerySpec {
        QuerySpec {
            keyword: "Zelensky".into(),
            source_domain: "washingtonpost.com".into(),
            languages: vec!["eng".into(), "hin".into()],
            excluded_topics: vec!["cricket".into()],
            allowed_authors: vec![],
            date_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            per_source_limit: 5,
            dedupe: true,
        }
    }

    #[test]
    fn request_omits_author_filter_when_allow_list_is_empty() {
        let request = SearchRequest::new(&spec(), "washingtonpost.com".into(), "key".into());
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("authorUri").is_none());
    }

    #[test]
    fn request_includes_author_filter_when_allow_list_is_set() {
        let mut spec = spec();
        spec.allowed_authors = vec!["Lizzie Johnson".into()];
        let request = SearchRequest::new(&spec, "washingtonpost.com".into(), "key".into());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json["authorUri"],
            serde_json::json!(["Lizzie Johnson"])
        );
    }

    #[test]
    fn request_uses_camel_case_wire_names() {
        let request = SearchRequest::new(&spec(), "washingtonpost.com".into(), "key".into());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["action"], "getArticles");
        assert_eq!(json["keyword"], serde_json::json!(["Zelensky"]));
        assert_eq!(json["keywordOper"], "and");
        assert_eq!(json["sourceUri"], "washingtonpost.com");
        assert_eq!(json["ignoreKeyword"], serde_json::json!(["cricket"]));
        assert_eq!(json["ignoreKeywordOper"], "or");
        assert_eq!(json["isDuplicateFilter"], "skipDuplicates");
        assert_eq!(json["dataType"], serde_json::json!(["news"]));
        assert_eq!(json["dateStart"], "2024-01-01");
        assert_eq!(json["dateEnd"], "2024-01-02");
        assert_eq!(json["articlesSortBy"], "rel");
        assert_eq!(json["apiKey"], "key");
    }

    #[test]
    fn request_page_size_carries_headroom_for_content_filtering() {
        let request = SearchRequest::new(&spec(), "washingtonpost.com".into(), "key".into());
        assert_eq!(request.articles_count, 20);
    }

    #[test]
    fn request_page_size_is_capped_at_the_server_maximum() {
        let mut spec = spec();
        spec.per_source_limit = 60;
        let request = SearchRequest::new(&spec, "washingtonpost.com".into(), "key".into());
        assert_eq!(request.articles_count, 100);
    }

    #[test]
    fn dedupe_flag_controls_duplicate_filter() {
        let mut spec = spec();
        spec.dedupe = false;
        let request = SearchRequest::new(&spec, "washingtonpost.com".into(), "key".into());
        assert_eq!(request.is_duplicate_filter, "keepAll");
    }

    #[test]
    fn article_preserves_unknown_fields() {
        let raw = serde_json::json!({
            "title": "T",
            "url": "https://example.com/a",
            "body": "B",
            "lang": "eng",
            "sentiment": 0.4,
        });

        let article: Article = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(article.title, "T");
        assert_eq!(article.extra["lang"], "eng");

        let back = serde_json::to_value(&article).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn article_tolerates_missing_title_and_body() {
        let article: Article =
            serde_json::from_value(serde_json::json!({ "url": "https://example.com/a" })).unwrap();
        assert_eq!(article.title, "");
        assert_eq!(article.body, "");
    }
}
