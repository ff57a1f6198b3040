// region:    --- Imports
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;
// endregion: --- Imports

// region:    --- Error Kind
/// 오류 분류
/// - Domain: 요청 자체가 거절됨 (자동 재시도 금지)
/// - Concurrency: 상태가 바뀌었거나 락을 얻지 못함 (재검증 후 재시도 여부 결정)
/// - Transport: 저장소 통신 실패
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Domain,
    Concurrency,
    Transport,
}
// endregion: --- Error Kind

// region:    --- Auction Error
#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("상품이 존재하지 않습니다: {0}")]
    ItemNotFound(String),

    #[error("입찰 금액이 현재 가격보다 낮습니다. (입찰: {amount}, 현재: {price})")]
    BidTooLow { amount: i64, price: i64 },

    #[error("금액이 허용 범위를 넘었습니다. (금액: {amount}, 최대: {max})")]
    AmountOutOfRange { amount: i64, max: i64 },

    #[error("경매가 이미 종료되었습니다: {0}")]
    AuctionClosed(String),

    #[error("이미 사용 중인 사용자 이름입니다: {0}")]
    UsernameTaken(String),

    #[error("사용자가 존재하지 않습니다: {0}")]
    UserNotFound(String),

    #[error("감시 중인 키가 변경되어 커밋이 거절되었습니다.")]
    WriteConflict,

    #[error("락 획득 실패: {resource} ({attempts}회 시도)")]
    LockAcquisitionTimeout { resource: String, attempts: u32 },

    #[error("락이 만료되어 더 이상 쓸 수 없습니다: {0}")]
    LockExpired(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::ItemNotFound(_)
            | AuctionError::BidTooLow { .. }
            | AuctionError::AmountOutOfRange { .. }
            | AuctionError::AuctionClosed(_)
            | AuctionError::UsernameTaken(_)
            | AuctionError::UserNotFound(_) => ErrorKind::Domain,
            AuctionError::WriteConflict
            | AuctionError::LockAcquisitionTimeout { .. }
            | AuctionError::LockExpired(_) => ErrorKind::Concurrency,
            AuctionError::Store(_) => ErrorKind::Transport,
        }
    }

    /// 같은 요청을 (재검증 후) 다시 시도해볼 수 있는지 여부
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Domain
    }

    /// 응답 코드
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::ItemNotFound(_) => "NOT_FOUND",
            AuctionError::BidTooLow { .. } => "LOW_BID",
            AuctionError::AmountOutOfRange { .. } => "INVALID_AMOUNT",
            AuctionError::AuctionClosed(_) => "ALREADY_ENDED",
            AuctionError::UsernameTaken(_) => "USERNAME_TAKEN",
            AuctionError::UserNotFound(_) => "USER_NOT_FOUND",
            _ => "TRY_AGAIN",
        }
    }
}
// endregion: --- Auction Error
