use core::fmt;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A minimal secret container that zeroizes its contents on drop.
///
/// This is intentionally small and avoids exposing secrets via `Debug`.
#[derive(Clone, Default)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn to_key_sha1(&self) -> [u8; 20] {
        normalize_key_sha1(self.expose())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

pub(crate) type HmacSha1 = Hmac<Sha1>;

/// Keying material of an established RMCP+ session.
///
/// `sik` feeds RAKP message 4 verification and the K1/K2 derivation; `k1`
/// keys the packet integrity trailer; `k2` keys payload confidentiality.
#[derive(Clone, Default)]
pub(crate) struct SessionKeys {
    pub(crate) sik: [u8; 20],
    pub(crate) k1: [u8; 20],
    pub(crate) k2: [u8; 20],
}

impl SessionKeys {
    pub(crate) fn derive(sik: [u8; 20]) -> Result<Self> {
        let (k1, k2) = derive_k1_k2_sha1(&sik)?;
        Ok(Self { sik, k1, k2 })
    }

    /// AES-128 key: the first 16 bytes of K2.
    pub(crate) fn aes_key(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.k2[..16]);
        out
    }
}

impl Zeroize for SessionKeys {
    fn zeroize(&mut self) {
        self.sik.zeroize();
        self.k1.zeroize();
        self.k2.zeroize();
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(<secret>)")
    }
}

/// Normalize a password into the fixed 20-byte user key for SHA1-based RAKP.
///
/// The secret is truncated to 20 bytes and the remainder is zero-padded.
pub(crate) fn normalize_key_sha1(secret: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    let n = secret.len().min(out.len());
    out[..n].copy_from_slice(&secret[..n]);
    out
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; 20]> {
    let mut mac =
        <HmacSha1 as Mac>::new_from_slice(key).map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    let bytes = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[..]);
    Ok(out)
}

pub(crate) fn hmac_sha1_truncated_12(key: &[u8], data: &[u8]) -> Result<[u8; 12]> {
    let full = hmac_sha1(key, data)?;
    let mut out = [0u8; 12];
    out.copy_from_slice(&full[..12]);
    Ok(out)
}

pub(crate) fn derive_k1_k2_sha1(sik: &[u8; 20]) -> Result<([u8; 20], [u8; 20])> {
    // Additional keying material is derived from SIK with constant inputs
    // sized to the hash (20 bytes for SHA1).
    let const1 = [0x01u8; 20];
    let const2 = [0x02u8; 20];

    let k1 = hmac_sha1(sik, &const1)?;
    let k2 = hmac_sha1(sik, &const2)?;
    Ok((k1, k2))
}

/// AES-128-CBC encryption without padding.
///
/// The caller must ensure `plaintext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if !plaintext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC plaintext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(plaintext.len());
    let mut prev = *iv;

    for block in plaintext.chunks(16) {
        let mut xored = [0u8; 16];
        for i in 0..16 {
            xored[i] = block[i] ^ prev[i];
        }

        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);

        let mut ct = [0u8; 16];
        ct.copy_from_slice(&ga);
        out.extend_from_slice(&ct);
        prev = ct;
    }

    Ok(out)
}

/// AES-128-CBC decryption without padding.
///
/// The caller must ensure `ciphertext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if !ciphertext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC ciphertext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev = *iv;

    for block in ciphertext.chunks(16) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);

        let mut pt = [0u8; 16];
        pt.copy_from_slice(&ga);
        for i in 0..16 {
            pt[i] ^= prev[i];
        }

        out.extend_from_slice(&pt);

        let mut next_prev = [0u8; 16];
        next_prev.copy_from_slice(block);
        prev = next_prev;
    }

    Ok(out)
}

/// Seal an IPMI payload for the AES-CBC-128 confidentiality algorithm.
///
/// The confidentiality trailer is `[1, 2, ..., pad_len][pad_len]`, chosen so
/// the padded length is a block multiple. Returns `iv || ciphertext`.
pub(crate) fn seal_payload_aes_cbc(
    plaintext_payload: &[u8],
    aes_key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>> {
    let base = plaintext_payload.len() + 1;
    let pad_len = (16 - (base % 16)) % 16;

    let mut to_encrypt = Vec::with_capacity(base + pad_len);
    to_encrypt.extend_from_slice(plaintext_payload);
    for i in 0..pad_len {
        to_encrypt.push((i + 1) as u8);
    }
    to_encrypt.push(pad_len as u8);

    let ciphertext = aes128_cbc_encrypt(aes_key, iv, &to_encrypt)?;

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed payload: split off the IV, decrypt, validate and strip the
/// confidentiality trailer.
pub(crate) fn open_payload_aes_cbc(payload: &[u8], aes_key: &[u8; 16]) -> Result<Vec<u8>> {
    if payload.len() < 32 {
        return Err(Error::Message("encrypted payload too short"));
    }

    let iv: [u8; 16] = payload[..16]
        .try_into()
        .map_err(|_| Error::Message("invalid IV"))?;
    let ciphertext = &payload[16..];
    if !ciphertext.len().is_multiple_of(16) {
        return Err(Error::Message("invalid AES-CBC ciphertext length"));
    }

    let mut plaintext = aes128_cbc_decrypt(aes_key, &iv, ciphertext)?;

    let pad_len = *plaintext
        .last()
        .ok_or(Error::Message("missing confidentiality pad length"))? as usize;
    if pad_len > plaintext.len() - 1 {
        return Err(Error::Message("invalid confidentiality pad length"));
    }

    let trailer_start = plaintext.len() - 1 - pad_len;
    let pad_bytes = &plaintext[trailer_start..plaintext.len() - 1];
    for (i, &b) in pad_bytes.iter().enumerate() {
        if b != (i as u8 + 1) {
            return Err(Error::Message("invalid confidentiality pad bytes"));
        }
    }

    plaintext.truncate(trailer_start);
    Ok(plaintext)
}

/// Next-header value carried in the session trailer.
const TRAILER_NEXT_HEADER: u8 = 0x07;

/// Build the HMAC-SHA1-96 session trailer over `src` (session header plus
/// payload bytes).
///
/// Trailer layout: `[0xFF pad x n][pad_len][next_header][auth_code x 12]`,
/// with `n` chosen so the authenticated range is a 4-byte multiple.
pub(crate) fn make_integrity_trailer(src: &[u8], k1: &[u8; 20]) -> Result<Vec<u8>> {
    let pad_len = (4 - (src.len() + 2 + 12) % 4) % 4;

    let mut data = Vec::with_capacity(src.len() + pad_len + 2 + 12);
    data.extend_from_slice(src);
    data.extend(std::iter::repeat_n(0xFF, pad_len));
    data.push(pad_len as u8);
    data.push(TRAILER_NEXT_HEADER);

    let auth_code = hmac_sha1_truncated_12(k1, &data)?;

    let mut trailer = data.split_off(src.len());
    trailer.extend_from_slice(&auth_code);
    Ok(trailer)
}

/// Verify the trailing 12-byte auth code of `src` (session header, payload
/// and trailer, with the RMCP header already stripped).
pub(crate) fn validate_integrity_trailer(src: &[u8], k1: &[u8; 20]) -> Result<()> {
    if src.len() < 12 {
        return Err(Error::Message("message does not contain an auth code"));
    }

    let (covered, auth_code) = src.split_at(src.len() - 12);
    let expected = hmac_sha1_truncated_12(k1, covered)?;
    if !ct_eq(auth_code, &expected) {
        return Err(Error::AuthenticationFailed("invalid packet auth code"));
    }
    Ok(())
}
