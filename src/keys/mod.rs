/// 저장소 키 스키마
/// 모든 엔티티/인덱스 키는 `{main-prefix}:{data-type}:{model}[#id][:suffix...]` 형태
/// 키 생성은 순수 함수이며 호출 간에 공유되는 상태가 없다.

// region:    --- Constants
/// 세그먼트 구분자
pub const SEGMENT_SEPARATOR: &str = ":";

/// 아이디 구분자 (`model#id`)
pub const ID_SEPARATOR: &str = "#";
// endregion: --- Constants

// region:    --- Segments
/// 키의 첫 번째 세그먼트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainPrefix {
    Html,
    Data,
    Lock,
    Idx,
}

impl MainPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            MainPrefix::Html => "html",
            MainPrefix::Data => "data",
            MainPrefix::Lock => "lock",
            MainPrefix::Idx => "idx",
        }
    }
}

/// 저장소 자료형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Hash,
    String,
    Set,
    SortedSet,
    HyperLogLog,
    List,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Hash => "hash",
            DataType::String => "string",
            DataType::Set => "set",
            DataType::SortedSet => "sortedSet",
            DataType::HyperLogLog => "hyperLogLog",
            DataType::List => "list",
        }
    }
}

/// 모델 이름
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Pages,
    Users,
    Usernames,
    Sessions,
    Items,
    Views,
    Likes,
    Bids,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Pages => "pages",
            Model::Users => "users",
            Model::Usernames => "usernames",
            Model::Sessions => "sessions",
            Model::Items => "items",
            Model::Views => "views",
            Model::Likes => "likes",
            Model::Bids => "bids",
        }
    }
}

/// 모델 필드 이름 (랭킹 인덱스 접미사)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    EndingAt,
    Price,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::EndingAt => "endingAt",
            Field::Price => "price",
        }
    }
}

/// 키 세그먼트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Prefix(MainPrefix),
    Type(DataType),
    Model(Model),
    Field(Field),
    /// `model#id`
    Id(Model, &'a str),
}

impl Segment<'_> {
    fn write_to(&self, out: &mut String) {
        match self {
            Segment::Prefix(prefix) => out.push_str(prefix.as_str()),
            Segment::Type(data_type) => out.push_str(data_type.as_str()),
            Segment::Model(model) => out.push_str(model.as_str()),
            Segment::Field(field) => out.push_str(field.as_str()),
            Segment::Id(model, id) => {
                out.push_str(model.as_str());
                out.push_str(ID_SEPARATOR);
                out.push_str(id);
            }
        }
    }
}
// endregion: --- Segments

// region:    --- Builders
/// 세그먼트 목록으로 키 생성
pub fn build_key(segments: &[Segment<'_>]) -> String {
    let mut key = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            key.push_str(SEGMENT_SEPARATOR);
        }
        segment.write_to(&mut key);
    }
    key
}

/// 리소스 키에서 락 키 생성
/// 첫 번째 세그먼트만 `lock`으로 바꾸고 나머지는 그대로 둔다.
pub fn lock_key(key: &str) -> String {
    match key.split_once(SEGMENT_SEPARATOR) {
        Some((_, rest)) => format!("{}{}{}", MainPrefix::Lock.as_str(), SEGMENT_SEPARATOR, rest),
        None => MainPrefix::Lock.as_str().to_string(),
    }
}

fn data_key(data_type: DataType, rest: &[Segment<'_>]) -> String {
    let mut segments = vec![Segment::Prefix(MainPrefix::Data), Segment::Type(data_type)];
    segments.extend_from_slice(rest);
    build_key(&segments)
}
// endregion: --- Builders

// region:    --- Catalog
/// 페이지 HTML 캐시
pub fn page(route: &str) -> String {
    build_key(&[
        Segment::Prefix(MainPrefix::Html),
        Segment::Type(DataType::String),
        Segment::Id(Model::Pages, route),
    ])
}

/// 사용자 레코드
pub fn user(id: &str) -> String {
    data_key(DataType::Hash, &[Segment::Id(Model::Users, id)])
}

/// 사용자 이름 집합
pub fn usernames() -> String {
    data_key(DataType::Set, &[Segment::Model(Model::Usernames)])
}

/// 사용자 이름 -> 아이디 랭킹
pub fn usernames_by_id() -> String {
    data_key(
        DataType::SortedSet,
        &[Segment::Model(Model::Usernames), Segment::Field(Field::Id)],
    )
}

/// 세션 레코드
pub fn session(id: &str) -> String {
    data_key(DataType::Hash, &[Segment::Id(Model::Sessions, id)])
}

/// 상품 레코드
pub fn item(id: &str) -> String {
    data_key(DataType::Hash, &[Segment::Id(Model::Items, id)])
}

/// 상품 레코드 키 접두어 (`data:hash:items#`)
pub fn item_prefix() -> String {
    item("")
}

/// 상품 레코드 키에서 상품 아이디 추출
pub fn item_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(item_prefix().as_str())
}

/// 상품 전문 검색 인덱스 이름
pub fn items_index() -> String {
    build_key(&[
        Segment::Prefix(MainPrefix::Idx),
        Segment::Type(DataType::Hash),
        Segment::Model(Model::Items),
    ])
}

/// 조회수 랭킹
pub fn items_by_views() -> String {
    data_key(
        DataType::SortedSet,
        &[Segment::Model(Model::Items), Segment::Model(Model::Views)],
    )
}

/// 상품별 순 방문자 추정기
pub fn item_views(id: &str) -> String {
    data_key(
        DataType::HyperLogLog,
        &[Segment::Id(Model::Items, id), Segment::Model(Model::Views)],
    )
}

/// 마감 시간 랭킹
pub fn items_by_ending_at() -> String {
    data_key(
        DataType::SortedSet,
        &[Segment::Model(Model::Items), Segment::Field(Field::EndingAt)],
    )
}

/// 가격 랭킹
pub fn items_by_price() -> String {
    data_key(
        DataType::SortedSet,
        &[Segment::Model(Model::Items), Segment::Field(Field::Price)],
    )
}

/// 입찰 수 랭킹
pub fn items_by_bids() -> String {
    data_key(
        DataType::SortedSet,
        &[Segment::Model(Model::Items), Segment::Model(Model::Bids)],
    )
}

/// 사용자 좋아요 집합
pub fn user_likes(id: &str) -> String {
    data_key(
        DataType::Set,
        &[Segment::Id(Model::Users, id), Segment::Model(Model::Likes)],
    )
}

/// 사용자 등록 상품 집합
pub fn user_items(id: &str) -> String {
    data_key(
        DataType::Set,
        &[Segment::Id(Model::Users, id), Segment::Model(Model::Items)],
    )
}

/// 사용자 입찰 집합
pub fn user_bids(id: &str) -> String {
    data_key(
        DataType::Set,
        &[Segment::Id(Model::Users, id), Segment::Model(Model::Bids)],
    )
}

/// 상품 입찰 이력 리스트
pub fn item_bids(id: &str) -> String {
    data_key(
        DataType::List,
        &[Segment::Id(Model::Items, id), Segment::Model(Model::Bids)],
    )
}
// endregion: --- Catalog

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_matches_schema() {
        assert_eq!(page("/about"), "html:string:pages#/about");
        assert_eq!(user("u1"), "data:hash:users#u1");
        assert_eq!(usernames(), "data:set:usernames");
        assert_eq!(usernames_by_id(), "data:sortedSet:usernames:id");
        assert_eq!(session("s1"), "data:hash:sessions#s1");
        assert_eq!(item("i1"), "data:hash:items#i1");
        assert_eq!(items_index(), "idx:hash:items");
        assert_eq!(items_by_views(), "data:sortedSet:items:views");
        assert_eq!(item_views("i1"), "data:hyperLogLog:items#i1:views");
        assert_eq!(items_by_ending_at(), "data:sortedSet:items:endingAt");
        assert_eq!(items_by_price(), "data:sortedSet:items:price");
        assert_eq!(items_by_bids(), "data:sortedSet:items:bids");
        assert_eq!(user_likes("u1"), "data:set:users#u1:likes");
        assert_eq!(user_items("u1"), "data:set:users#u1:items");
        assert_eq!(user_bids("u1"), "data:set:users#u1:bids");
        assert_eq!(item_bids("i1"), "data:list:items#i1:bids");
    }

    #[test]
    fn same_reference_yields_same_key() {
        assert_eq!(item("abc"), item("abc"));
        assert_eq!(
            build_key(&[Segment::Prefix(MainPrefix::Data), Segment::Id(Model::Items, "abc")]),
            build_key(&[Segment::Prefix(MainPrefix::Data), Segment::Id(Model::Items, "abc")]),
        );
    }

    #[test]
    fn catalog_keys_never_collide() {
        let keys = vec![
            page("x"),
            user("x"),
            usernames(),
            usernames_by_id(),
            session("x"),
            item("x"),
            items_index(),
            items_by_views(),
            item_views("x"),
            items_by_ending_at(),
            items_by_price(),
            items_by_bids(),
            user_likes("x"),
            user_items("x"),
            user_bids("x"),
            item_bids("x"),
        ];
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert_ne!(item("a"), item("b"));
        assert_ne!(user("a"), session("a"));
    }

    #[test]
    fn lock_key_replaces_only_first_segment() {
        assert_eq!(lock_key(&item("i1")), "lock:hash:items#i1");
        assert_eq!(lock_key(&item_bids("i1")), "lock:list:items#i1:bids");
        assert_eq!(lock_key(&usernames()), "lock:set:usernames");
        assert_ne!(lock_key(&item("i1")), item("i1"));
        assert_ne!(lock_key(&item("i1")), lock_key(&user("i1")));
    }

    #[test]
    fn item_id_round_trips_through_key() {
        assert_eq!(item_prefix(), "data:hash:items#");
        assert_eq!(item_id_from_key(&item("0a1b2c")), Some("0a1b2c"));
        assert_eq!(item_id_from_key(&user("0a1b2c")), None);
    }
}
// endregion: --- Tests
