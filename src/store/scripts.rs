/// 서버 측 원자 스크립트 목록
/// 스크립트 실행 중에는 같은 키에 대한 다른 연산이 끼어들지 않는다.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicScript {
    /// KEYS: [상품 방문자 추정기, 상품 레코드, 조회수 랭킹]
    /// ARGV: [상품 아이디, 방문자 아이디]
    /// 반환: 1 새 방문자, 0 이미 집계됨, -1 상품 없음
    IncrementView,

    /// KEYS: [락 키]
    /// ARGV: [토큰]
    /// 반환: 1 삭제, 0 토큰 불일치
    ReleaseLock,

    /// KEYS: [사용자 좋아요 집합, 상품 레코드]
    /// ARGV: [상품 아이디]
    /// 반환: 1 추가, 0 이미 있음, -1 상품 없음
    LikeItem,

    /// KEYS: [사용자 좋아요 집합, 상품 레코드]
    /// ARGV: [상품 아이디]
    /// 반환: 1 제거, 0 없었음, -1 상품 없음
    UnlikeItem,
}

impl AtomicScript {
    pub const ALL: [AtomicScript; 4] = [
        AtomicScript::IncrementView,
        AtomicScript::ReleaseLock,
        AtomicScript::LikeItem,
        AtomicScript::UnlikeItem,
    ];

    pub fn key_count(&self) -> usize {
        match self {
            AtomicScript::IncrementView => 3,
            AtomicScript::ReleaseLock => 1,
            AtomicScript::LikeItem | AtomicScript::UnlikeItem => 2,
        }
    }

    pub fn arg_count(&self) -> usize {
        match self {
            AtomicScript::IncrementView => 2,
            AtomicScript::ReleaseLock | AtomicScript::LikeItem | AtomicScript::UnlikeItem => 1,
        }
    }

    /// Lua 소스
    pub fn source(&self) -> &'static str {
        match self {
            AtomicScript::IncrementView => INCREMENT_VIEW,
            AtomicScript::ReleaseLock => RELEASE_LOCK,
            AtomicScript::LikeItem => LIKE_ITEM,
            AtomicScript::UnlikeItem => UNLIKE_ITEM,
        }
    }
}

const INCREMENT_VIEW: &str = r#"
local viewersKey = KEYS[1]
local recordKey = KEYS[2]
local rankingKey = KEYS[3]

if redis.call('EXISTS', recordKey) == 0 then
    return -1
end

local added = redis.call('PFADD', viewersKey, ARGV[2])
if added == 1 then
    redis.call('HINCRBY', recordKey, 'views', 1)
    redis.call('ZINCRBY', rankingKey, 1, ARGV[1])
end
return added
"#;

const RELEASE_LOCK: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

const LIKE_ITEM: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 0 then
    return -1
end
if redis.call('SADD', KEYS[1], ARGV[1]) == 1 then
    redis.call('HINCRBY', KEYS[2], 'likes', 1)
    return 1
end
return 0
"#;

const UNLIKE_ITEM: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 0 then
    return -1
end
if redis.call('SREM', KEYS[1], ARGV[1]) == 1 then
    redis.call('HINCRBY', KEYS[2], 'likes', -1)
    return 1
end
return 0
"#;
