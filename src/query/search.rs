/// 상품 검색
/// 검색어를 정리해 name(가중치 5)과 description에 대한 퍼지 쿼리를 만들고
/// 저장소의 전문 검색 인덱스에 그대로 넘긴다.
// region:    --- Imports
use crate::bidding::model::from_millis;
use crate::error::AuctionError;
use crate::keys;
use crate::store::{SearchHit, SearchIndex};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Builder
/// 영문/숫자/공백 외의 문자 제거 후 `%단어%` 목록으로 변환
pub fn clean_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .split_whitespace()
        .map(|word| format!("%{}%", word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 정리된 검색어가 비어 있으면 None
pub fn build_query(term: &str) -> Option<String> {
    let cleaned = clean_term(term);
    if cleaned.is_empty() {
        return None;
    }
    Some(format!(
        "(@name:({cleaned}) => {{ $weight: 5.0 }}) | (@description:({cleaned}))"
    ))
}
// endregion: --- Query Builder

// region:    --- Item Summary
/// 검색 결과 (인덱스에 들어 있는 필드만)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    /// 인덱스 값이 없거나 정수가 아니면 None
    pub price: Option<i64>,
    pub ending_at: Option<DateTime<Utc>>,
}

impl ItemSummary {
    fn from_hit(hit: SearchHit) -> Option<ItemSummary> {
        let id = keys::item_id_from_key(&hit.key)?.to_string();
        let mut fields = hit.fields;
        let price = fields
            .get("price")
            .and_then(|raw| raw.parse().ok());
        let ending_at = fields
            .get("endingAt")
            .and_then(|raw| raw.parse().ok())
            .and_then(from_millis);
        Some(ItemSummary {
            id,
            name: fields.remove("name").unwrap_or_default(),
            description: fields.remove("description").unwrap_or_default(),
            image_url: fields.remove("imageUrl").unwrap_or_default(),
            price,
            ending_at,
        })
    }
}
// endregion: --- Item Summary

// region:    --- Item Search
#[derive(Clone)]
pub struct ItemSearch {
    index: Arc<dyn SearchIndex>,
}

impl ItemSearch {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    pub async fn search_items(&self, term: &str, size: usize) -> Result<Vec<ItemSummary>, AuctionError> {
        let Some(query) = build_query(term) else {
            return Ok(Vec::new());
        };
        info!("{:<12} --> 상품 검색: {}", "Query", query);

        let hits = self.index.search(&keys::items_index(), &query, size).await?;
        Ok(hits.into_iter().filter_map(ItemSummary::from_hit).collect())
    }
}
// endregion: --- Item Search

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store, WriteBatch};

    #[test]
    fn builds_weighted_fuzzy_query() {
        assert_eq!(
            build_query("  red, chair!").unwrap(),
            "(@name:(%red% %chair%) => { $weight: 5.0 }) | (@description:(%red% %chair%))"
        );
        assert_eq!(build_query("!!! ?"), None);
    }

    #[tokio::test]
    async fn finds_items_by_name_or_description() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .hash_set(
                keys::item("a"),
                vec![
                    ("name".into(), "Red Chair".into()),
                    ("description".into(), "wooden".into()),
                    ("price".into(), "15".into()),
                    ("endingAt".into(), "1700000000000".into()),
                ],
            )
            .hash_set(
                keys::item("b"),
                vec![
                    ("name".into(), "Lamp".into()),
                    ("description".into(), "goes next to a chair".into()),
                    ("price".into(), "n/a".into()),
                ],
            )
            .hash_set(
                keys::item("c"),
                vec![("name".into(), "Table".into()), ("description".into(), "".into())],
            );
        store.apply(batch).await.unwrap();

        let search = ItemSearch::new(Arc::new(store));
        let found = search.search_items("chair", 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(found[0].price, Some(15));
        assert_eq!(found[1].price, None);
        assert_eq!(found[0].ending_at, from_millis(1_700_000_000_000));

        assert_eq!(search.search_items("chair", 1).await.unwrap().len(), 1);
        assert!(search.search_items("%%", 10).await.unwrap().is_empty());
    }
}
// endregion: --- Tests
