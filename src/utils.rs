use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::models::users::Credential;

static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Builds `<prefix><millis>`. Ids handed out by this process are strictly
/// increasing, so two records created in the same millisecond still differ.
pub fn timestamp_id(prefix: &str) -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID_MILLIS.load(Ordering::Relaxed);

    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_ID_MILLIS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return format!("{}{}", prefix, next),
            Err(actual) => last = actual,
        }
    }
}

pub fn new_credential(password: &str) -> Credential {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, password);

    Credential { salt, hash }
}

pub fn verify_password(credential: &Credential, password: &str) -> bool {
    hash_password(&credential.salt, password) == credential.hash
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Mock address, not derived from any key.
pub fn random_btc_address() -> String {
    let mut rng = rand::thread_rng();

    (0..34)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ids_are_unique() {
        let ids: Vec<String> = (0..1000).map(|_| timestamp_id("r_")).collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();

        assert_eq!(deduped.len(), ids.len());
        assert!(ids.iter().all(|id| id.starts_with("r_")));
    }

    #[test]
    fn test_password_verification() {
        let credential = new_credential("hunter2");

        assert!(verify_password(&credential, "hunter2"));
        assert!(!verify_password(&credential, "hunter3"));
        assert_ne!(credential.hash, "hunter2");
    }

    #[test]
    fn test_random_btc_address() {
        let address = random_btc_address();

        assert_eq!(address.len(), 34);
        assert!(address.bytes().all(|b| BASE58_ALPHABET.contains(&b)));
    }
}
