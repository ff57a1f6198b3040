/// 아이디 / 토큰 생성
/// 아이디는 48비트 난수를 12자리 16진수로 표현한다.
/// f64 정수 범위 안에 들어가므로 정렬 집합 점수로 손실 없이 변환된다.
use rand::Rng;

const ID_HEX_LEN: usize = 12;
const ID_MASK: u64 = (1 << 48) - 1;

/// 새 아이디 생성
pub fn generate() -> String {
    format!("{:012x}", rand::random::<u64>() & ID_MASK)
}

/// 아이디와 점수를 함께 생성
pub fn generate_with_score() -> (String, f64) {
    let value = rand::random::<u64>() & ID_MASK;
    (format!("{:012x}", value), value as f64)
}

/// 아이디 -> 정렬 집합 점수
pub fn to_score(id: &str) -> Option<f64> {
    if id.len() != ID_HEX_LEN {
        return None;
    }
    u64::from_str_radix(id, 16).ok().map(|value| value as f64)
}

/// 정렬 집합 점수 -> 아이디
pub fn from_score(score: f64) -> Option<String> {
    if !score.is_finite() || score < 0.0 || score.fract() != 0.0 || score > ID_MASK as f64 {
        return None;
    }
    Some(format!("{:012x}", score as u64))
}

/// 일회용 락 토큰 (6바이트 16진수)
pub fn lock_token() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_twelve_hex_digits() {
        for _ in 0..100 {
            let id = generate();
            assert_eq!(id.len(), ID_HEX_LEN);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn score_conversion_is_lossless() {
        let (id, score) = generate_with_score();
        assert_eq!(to_score(&id), Some(score));
        assert_eq!(from_score(score).as_deref(), Some(id.as_str()));
        assert_eq!(from_score(171.0).as_deref(), Some("0000000000ab"));
        assert_eq!(to_score("ffffffffffff"), Some(ID_MASK as f64));
    }

    #[test]
    fn rejects_foreign_ids_and_scores() {
        assert_eq!(to_score("ab"), None);
        assert_eq!(to_score("zzzzzzzzzzzz"), None);
        assert_eq!(from_score(-1.0), None);
        assert_eq!(from_score(1.5), None);
        assert_eq!(from_score(f64::INFINITY), None);
    }

    #[test]
    fn lock_tokens_differ() {
        let first = lock_token();
        assert_eq!(first.len(), 12);
        assert_ne!(first, lock_token());
    }
}
