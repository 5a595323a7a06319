use chrono::Utc;
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 11;

/// Fresh identifier for a submission or a generated result.
#[cfg(feature = "uuid-ids")]
pub fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fresh identifier for a submission or a generated result.
#[cfg(not(feature = "uuid-ids"))]
pub fn request_id() -> String {
    fallback_request_id()
}

/// `<unix millis>-<base36 suffix>`, used when no uuid generator is compiled in.
pub fn fallback_request_id() -> String {
    fallback_request_id_with(Utc::now().timestamp_millis(), &mut rand::thread_rng())
}

pub fn fallback_request_id_with<R: Rng>(millis: i64, rng: &mut R) -> String {
    let suffix = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect::<String>();
    format!("{millis}-{suffix}")
}
