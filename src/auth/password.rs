use rand::Rng;

/// Lowercase `l` and digit `1` are left out: they are easily mistaken for
/// each other when a generated password is read from a mail.
const PASSWORD_CHARSET: &[u8] = b"abcdefghijkmnopqrstuvwxyz023456789";
const GENERATED_LENGTH: usize = 8;

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Generate a random password to mail to a new or resetting user.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, cost)
}

/// Constant-time via bcrypt. A malformed stored hash never matches.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}
