use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::errors::PupError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128-CBC decrypt in-place. `data` must be a multiple of 16 bytes.
pub fn aes128_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<(), PupError> {
    let len = data.len();
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| PupError::Crypto(format!("cbc decrypt of {len} unaligned bytes")))?;

    Ok(())
}

/// AES-128-CBC encrypt in-place. `data` must be a multiple of 16 bytes.
pub fn aes128_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<(), PupError> {
    let len = data.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| PupError::Crypto(format!("cbc encrypt of {len} unaligned bytes")))?;

    Ok(())
}

/// AES-128-CBC decrypt the block-aligned prefix of `data` in-place.
///
/// Trailing bytes past the last full block are left as they are.
pub fn aes128_cbc_decrypt_prefix(
    key: &[u8; 16],
    iv: &[u8; 16],
    data: &mut [u8],
) -> Result<(), PupError> {
    let aligned = data.len() & !(AES_BLOCK_SIZE - 1);
    aes128_cbc_decrypt(key, iv, &mut data[..aligned])
}

/// AES-128-CBC decrypt in-place, with PUP's handling for a partial final block.
///
/// The aligned prefix is decrypted normally. The `len % 16` trailing bytes are
/// XORed with a keystream block obtained by CBC-encrypting (zero IV) the last
/// full *ciphertext* block. This is not standard ciphertext stealing.
///
/// With fewer than 16 aligned bytes there is no block to derive the keystream
/// from, and the trailing bytes are left untouched.
pub fn decrypt_with_tail(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<(), PupError> {
    let aligned = data.len() & !(AES_BLOCK_SIZE - 1);
    let tail = data.len() - aligned;

    let mut prev_block = None;
    if tail != 0 && aligned >= AES_BLOCK_SIZE {
        let mut block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(&data[aligned - AES_BLOCK_SIZE..aligned]);
        prev_block = Some(block);
    }

    aes128_cbc_decrypt(key, iv, &mut data[..aligned])?;

    if let Some(mut keystream) = prev_block {
        aes128_cbc_encrypt(key, &[0u8; AES_BLOCK_SIZE], &mut keystream)?;
        for (byte, k) in data[aligned..].iter_mut().zip(keystream.iter()) {
            *byte ^= k;
        }
    }

    Ok(())
}
