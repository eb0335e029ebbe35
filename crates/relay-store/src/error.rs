//! 저장소 에러 타입.

use thiserror::Error;

/// 저장소 계층 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis 연결/명령 에러
    #[error("Redis 에러: {0}")]
    Redis(#[from] redis::RedisError),
    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),
    /// 캐시 페이로드 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 원장 레코드의 저장 값이 내부 enum과 일치하지 않음
    #[error("잘못된 원장 레코드 [id={id}]: {reason}")]
    CorruptRecord { id: i64, reason: String },
    /// 확인 토큰 불일치 (전체 삭제 거부)
    #[error("확인 토큰 불일치: 전체 삭제가 거부됨")]
    PurgeRefused,
    /// 존재하지 않는 원장 행
    #[error("원장 행을 찾을 수 없음: id={0}")]
    AttemptNotFound(i64),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, StoreError>;
