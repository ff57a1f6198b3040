// region:    --- Imports
use crate::store::StoreError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// endregion: --- Imports

// region:    --- Item
/// 랭킹 점수(f64)로 손실 없이 옮길 수 있는 최대 금액 (2^53)
pub const MAX_EXACT_AMOUNT: i64 = 1 << 53;

/// 상품 모델
/// price는 입찰로만 오르고, ending_at은 생성 후 바뀌지 않으며, views/bids는 증가만 한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub highest_bid_user_id: String,
    pub price: i64,
    pub views: i64,
    pub likes: i64,
    pub bids: i64,
    pub created_at: DateTime<Utc>,
    pub ending_at: DateTime<Utc>,
    pub image_url: String,
    pub status: String,
}

/// 상품 생성 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemAttrs {
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub image_url: String,
    pub price: i64,
    pub ending_at: DateTime<Utc>,
}

impl Item {
    /// 해시 레코드 필드 (아이디는 키에 들어가므로 제외)
    pub fn to_record(&self) -> Vec<(String, String)> {
        vec![
            ("name".to_string(), self.name.clone()),
            ("description".to_string(), self.description.clone()),
            ("ownerId".to_string(), self.owner_id.clone()),
            ("highestBidUserId".to_string(), self.highest_bid_user_id.clone()),
            ("price".to_string(), self.price.to_string()),
            ("views".to_string(), self.views.to_string()),
            ("likes".to_string(), self.likes.to_string()),
            ("bids".to_string(), self.bids.to_string()),
            ("createdAt".to_string(), self.created_at.timestamp_millis().to_string()),
            ("endingAt".to_string(), self.ending_at.timestamp_millis().to_string()),
            ("imageUrl".to_string(), self.image_url.clone()),
            ("status".to_string(), self.status.clone()),
        ]
    }

    /// 해시 레코드 해석, 빈 레코드는 없는 상품
    pub fn from_record(id: &str, fields: &HashMap<String, String>) -> Result<Option<Item>, StoreError> {
        if fields.is_empty() {
            return Ok(None);
        }
        let record = Record { id, fields };
        Ok(Some(Item {
            id: id.to_string(),
            name: record.text("name"),
            description: record.text("description"),
            owner_id: record.text("ownerId"),
            highest_bid_user_id: record.text("highestBidUserId"),
            price: record.number("price")?,
            views: record.number("views")?,
            likes: record.number("likes")?,
            bids: record.number("bids")?,
            created_at: record.timestamp("createdAt")?,
            ending_at: record.timestamp("endingAt")?,
            image_url: record.text("imageUrl"),
            status: record.text("status"),
        }))
    }
}

struct Record<'a> {
    id: &'a str,
    fields: &'a HashMap<String, String>,
}

impl Record<'_> {
    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn corrupt(&self, name: &str, raw: &str) -> StoreError {
        StoreError::Corrupt {
            key: self.id.to_string(),
            reason: format!("{} = {:?}", name, raw),
        }
    }

    /// 숫자 필드, 없으면 0
    fn number(&self, name: &str) -> Result<i64, StoreError> {
        match self.fields.get(name) {
            Some(raw) => raw.parse::<i64>().map_err(|_| self.corrupt(name, raw)),
            None => Ok(0),
        }
    }

    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, StoreError> {
        let raw = self.fields.get(name).map(String::as_str).unwrap_or_default();
        raw.parse::<i64>()
            .ok()
            .and_then(from_millis)
            .ok_or_else(|| self.corrupt(name, raw))
    }
}

pub(crate) fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
// endregion: --- Item

// region:    --- Bid
/// 입찰 모델
/// 상품별 입찰 이력 리스트에 `{amount}:{createdAtMillis}`로 저장되며 수정/삭제되지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

const BID_SEPARATOR: char = ':';

impl Bid {
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.amount,
            BID_SEPARATOR,
            self.created_at.timestamp_millis()
        )
    }

    pub fn decode(key: &str, raw: &str) -> Result<Bid, StoreError> {
        let corrupt = || StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("입찰 항목 {:?}", raw),
        };
        let (amount, created_at) = raw.split_once(BID_SEPARATOR).ok_or_else(corrupt)?;
        Ok(Bid {
            amount: amount.parse().map_err(|_| corrupt())?,
            created_at: created_at
                .parse::<i64>()
                .ok()
                .and_then(from_millis)
                .ok_or_else(corrupt)?,
        })
    }
}
// endregion: --- Bid

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_item() -> Item {
        let created_at = from_millis(1_700_000_000_000).unwrap();
        Item {
            id: "0000000000ab".into(),
            name: "의자".into(),
            description: "빨간 의자".into(),
            owner_id: "owner".into(),
            highest_bid_user_id: String::new(),
            price: 0,
            views: 0,
            likes: 0,
            bids: 0,
            created_at,
            ending_at: created_at + Duration::seconds(60),
            image_url: "https://example.com/chair.png".into(),
            status: "ACTIVE".into(),
        }
    }

    #[test]
    fn item_survives_record_encoding() {
        let item = sample_item();
        let fields: HashMap<String, String> = item.to_record().into_iter().collect();
        assert_eq!(fields["endingAt"], "1700000060000");
        assert_eq!(Item::from_record(&item.id, &fields).unwrap(), Some(item));
    }

    #[test]
    fn empty_record_is_missing_item() {
        assert_eq!(Item::from_record("x", &HashMap::new()).unwrap(), None);
    }

    #[test]
    fn malformed_price_is_reported() {
        let mut fields: HashMap<String, String> = sample_item().to_record().into_iter().collect();
        fields.insert("price".into(), "abc".into());
        assert!(matches!(
            Item::from_record("x", &fields),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn bid_entry_format() {
        let bid = Bid {
            amount: 10,
            created_at: from_millis(1_700_000_000_123).unwrap(),
        };
        assert_eq!(bid.encode(), "10:1700000000123");
        assert_eq!(Bid::decode("k", "10:1700000000123").unwrap(), bid);
        assert!(Bid::decode("k", "10").is_err());
        assert!(Bid::decode("k", "ten:1").is_err());
    }
}
// endregion: --- Tests
