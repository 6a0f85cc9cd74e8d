//! Argon2id credential hashing and the shared entropy source.
//!
//! Hashes are stored in the self-describing text form
//! `$argon2id$v=19$m=<memory>,t=<time>,p=<parallelism>$<salt>$<key>` (salt and key
//! in unpadded standard base64). Cost parameters are read back from the string on
//! verification, so they can be raised without invalidating stored hashes.

use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::error::{CryptoError, HashError};

const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
const DEFAULT_TIME_COST: u32 = 1;
const DEFAULT_KEY_LENGTH: usize = 16;
const DEFAULT_SALT_LENGTH: usize = 16;

/// Minimum salt length accepted by the KDF.
const MIN_SALT_LENGTH: usize = 8;
/// Minimum derived key length accepted by the KDF.
const MIN_KEY_LENGTH: usize = 4;
/// Upper bounds for parameters, both configured and read back from storage
/// (1 GiB, 64 passes, 255 lanes).
pub const MAX_MEMORY_KIB: u32 = 1 << 20;
pub const MAX_TIME_COST: u32 = 64;
pub const MAX_PARALLELISM: u32 = u8::MAX as u32;

/// Fill a buffer of `len` bytes from the operating system's CSPRNG.
///
/// # Errors
/// Returns `CryptoError::Randomness` if the OS entropy source fails.
pub fn random(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Cost parameters used for newly created hashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HasherConfig {
    memory_kib: u32,
    time_cost: u32,
    parallelism: u32,
    key_length: usize,
    salt_length: usize,
}

impl HasherConfig {
    /// 64 MiB, one pass, one lane per available CPU, 16 byte salt and key.
    #[must_use]
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .clamp(1, usize::from(u8::MAX));
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            time_cost: DEFAULT_TIME_COST,
            parallelism: u32::try_from(parallelism).unwrap_or(1),
            key_length: DEFAULT_KEY_LENGTH,
            salt_length: DEFAULT_SALT_LENGTH,
        }
    }

    #[must_use]
    pub fn with_memory_kib(mut self, memory_kib: u32) -> Self {
        self.memory_kib = memory_kib;
        self
    }

    #[must_use]
    pub fn with_time_cost(mut self, time_cost: u32) -> Self {
        self.time_cost = time_cost;
        self
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: u32) -> Self {
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    /// Clamp every parameter into the range the KDF accepts.
    #[must_use]
    pub fn normalize(self) -> Self {
        let parallelism = self.parallelism.clamp(1, MAX_PARALLELISM);
        // Argon2 needs at least 8 KiB per lane.
        let memory_kib = self.memory_kib.clamp(8 * parallelism, MAX_MEMORY_KIB);
        Self {
            memory_kib,
            time_cost: self.time_cost.clamp(1, MAX_TIME_COST),
            parallelism,
            key_length: self.key_length.max(MIN_KEY_LENGTH),
            salt_length: self.salt_length.max(MIN_SALT_LENGTH),
        }
    }

    #[must_use]
    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    #[must_use]
    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    #[must_use]
    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes and verifies player secrets.
#[derive(Clone, Debug)]
pub struct CredentialHasher {
    config: HasherConfig,
    dummy: OnceLock<String>,
}

impl CredentialHasher {
    #[must_use]
    pub fn new(config: HasherConfig) -> Self {
        Self {
            config: config.normalize(),
            dummy: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HasherConfig {
        &self.config
    }

    /// `len` cryptographically random bytes.
    ///
    /// # Errors
    /// Returns `CryptoError::Randomness` if the OS entropy source fails.
    pub fn random(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        random(len)
    }

    /// Hash `secret` with a fresh random salt and the configured cost parameters.
    ///
    /// # Errors
    /// Returns an error if no salt can be generated or the KDF rejects the parameters.
    pub fn hash(&self, secret: &str) -> Result<String, CryptoError> {
        let salt = random(self.config.salt_length)?;
        let params = Params::new(
            self.config.memory_kib,
            self.config.time_cost,
            self.config.parallelism,
            Some(self.config.key_length),
        )
        .map_err(CryptoError::Kdf)?;

        let mut key = vec![0u8; self.config.key_length];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(secret.as_bytes(), &salt, &mut key)
            .map_err(CryptoError::Kdf)?;

        Ok(format!(
            "${}$v={}$m={},t={},p={}${}${}",
            algorithm_id(Algorithm::Argon2id),
            Version::V0x13 as u32,
            self.config.memory_kib,
            self.config.time_cost,
            self.config.parallelism,
            Base64Unpadded::encode_string(&salt),
            Base64Unpadded::encode_string(&key),
        ))
    }

    /// Check `secret` against a stored hash.
    ///
    /// The parameters and salt embedded in `encoded` are used, not the configured ones.
    ///
    /// # Errors
    /// `HashError::InvalidHash` for anything that is not exactly the expected six-field
    /// shape (or carries parameters the KDF refuses), `HashError::WrongSecret` when the
    /// derived key does not match.
    pub fn verify(&self, secret: &str, encoded: &str) -> Result<(), HashError> {
        let parsed = EncodedHash::parse(encoded)?;

        let params = Params::new(
            parsed.memory_kib,
            parsed.time_cost,
            parsed.parallelism,
            Some(parsed.key.len()),
        )
        .map_err(|err| {
            warn!("stored hash carries unusable parameters: {err}");
            HashError::InvalidHash
        })?;

        let mut derived = vec![0u8; parsed.key.len()];
        Argon2::new(parsed.algorithm, parsed.version, params)
            .hash_password_into(secret.as_bytes(), &parsed.salt, &mut derived)
            .map_err(|err| {
                warn!("failed to derive key from stored hash: {err}");
                HashError::InvalidHash
            })?;

        if bool::from(derived.ct_eq(&parsed.key)) {
            Ok(())
        } else {
            Err(HashError::WrongSecret)
        }
    }

    /// Spend roughly the same time as a real verification, then fail.
    ///
    /// Used when the nick is unknown so timing does not reveal which nicks exist.
    pub fn verify_dummy(&self, secret: &str) {
        let dummy = match self.dummy.get() {
            Some(dummy) => Some(dummy.as_str()),
            None => self.cache_dummy(
                random(24)
                    .map(|bytes| Base64Unpadded::encode_string(&bytes))
                    .and_then(|filler| self.hash(&filler)),
            ),
        };
        match dummy {
            Some(dummy) => {
                let _ = self.verify(secret, dummy);
            }
            // Still pay for one derivation; the next call retries the cache.
            None => {
                let _ = self.hash(secret);
            }
        }
    }

    /// Keep a generated dummy hash. Failures are logged and never cached.
    fn cache_dummy(&self, generated: Result<String, CryptoError>) -> Option<&str> {
        match generated {
            Ok(hash) => Some(self.dummy.get_or_init(|| hash).as_str()),
            Err(err) => {
                warn!("failed to prepare the dummy hash: {err}");
                None
            }
        }
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(HasherConfig::default())
    }
}

/// Fields of a stored hash string.
#[derive(Debug, PartialEq, Eq)]
struct EncodedHash {
    algorithm: Algorithm,
    version: Version,
    memory_kib: u32,
    time_cost: u32,
    parallelism: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl EncodedHash {
    fn parse(encoded: &str) -> Result<Self, HashError> {
        let fields: Vec<&str> = encoded.split('$').collect();
        let [leading, algorithm, version, params, salt, key] = fields.as_slice() else {
            return Err(HashError::InvalidHash);
        };
        if !leading.is_empty() {
            return Err(HashError::InvalidHash);
        }

        let algorithm = parse_algorithm(algorithm)?;
        let version = version
            .strip_prefix("v=")
            .and_then(|v| v.parse::<u32>().ok())
            .and_then(parse_version)
            .ok_or(HashError::InvalidHash)?;

        let params: Vec<&str> = params.split(',').collect();
        let [memory, time, lanes] = params.as_slice() else {
            return Err(HashError::InvalidHash);
        };
        let memory_kib = parse_param(memory, "m=")?;
        let time_cost = parse_param(time, "t=")?;
        let parallelism = parse_param(lanes, "p=")?;

        let salt = Base64Unpadded::decode_vec(salt).map_err(|_| HashError::InvalidHash)?;
        let key = Base64Unpadded::decode_vec(key).map_err(|_| HashError::InvalidHash)?;
        if salt.len() < MIN_SALT_LENGTH || key.len() < MIN_KEY_LENGTH {
            return Err(HashError::InvalidHash);
        }
        if memory_kib > MAX_MEMORY_KIB || time_cost > MAX_TIME_COST || parallelism > MAX_PARALLELISM
        {
            return Err(HashError::InvalidHash);
        }

        Ok(Self {
            algorithm,
            version,
            memory_kib,
            time_cost,
            parallelism,
            salt,
            key,
        })
    }
}

fn parse_param(field: &str, prefix: &str) -> Result<u32, HashError> {
    field
        .strip_prefix(prefix)
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or(HashError::InvalidHash)
}

fn parse_algorithm(id: &str) -> Result<Algorithm, HashError> {
    match id {
        "argon2id" => Ok(Algorithm::Argon2id),
        "argon2i" => Ok(Algorithm::Argon2i),
        "argon2d" => Ok(Algorithm::Argon2d),
        _ => Err(HashError::InvalidHash),
    }
}

fn parse_version(version: u32) -> Option<Version> {
    match version {
        0x10 => Some(Version::V0x10),
        0x13 => Some(Version::V0x13),
        _ => None,
    }
}

const fn algorithm_id(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::Argon2d => "argon2d",
        Algorithm::Argon2i => "argon2i",
        Algorithm::Argon2id => "argon2id",
    }
}
