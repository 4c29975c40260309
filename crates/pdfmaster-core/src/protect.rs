//! Password protection
//!
//! Encrypts a document with the standard security handler, revision 6
//! (AES-256, `/V 5 /R 6`, crypt filter `AESV3`). The same password opens the
//! document and owns it.

use crate::document;
use crate::error::{PdfToolError, Result};
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use lopdf::{dictionary, Document, Object, StringFormat};
use sha2::{Digest, Sha256, Sha384, Sha512};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// All permissions granted; bits 1 and 2 must be clear
const PERMISSIONS: i32 = -4;

/// Passwords are truncated to this many UTF-8 bytes
const MAX_PASSWORD_LEN: usize = 127;

/// Encrypt `bytes` so that `password` is required to open it
pub fn protect_document(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(PdfToolError::InvalidInput("Password must not be empty".into()));
    }

    let mut doc = document::load(bytes)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfToolError::InvalidInput(
            "Document is already encrypted".into(),
        ));
    }

    encrypt_document(&mut doc, password, SecurityMaterial::random())?;
    document::save(&mut doc)
}

/// Random inputs of the key derivation, split out so tests can pin them
#[derive(Debug, Clone)]
pub(crate) struct SecurityMaterial {
    file_key: [u8; 32],
    user_salts: [u8; 16],
    owner_salts: [u8; 16],
    perms_tail: [u8; 4],
}

impl SecurityMaterial {
    fn random() -> Self {
        Self {
            file_key: rand::random(),
            user_salts: rand::random(),
            owner_salts: rand::random(),
            perms_tail: rand::random(),
        }
    }
}

/// Values of the `/Encrypt` dictionary
struct SecurityHandler {
    u: Vec<u8>,
    ue: Vec<u8>,
    o: Vec<u8>,
    oe: Vec<u8>,
    perms: Vec<u8>,
}

pub(crate) fn encrypt_document(
    doc: &mut Document,
    password: &str,
    material: SecurityMaterial,
) -> Result<()> {
    let password = truncate_password(password);
    let handler = derive_handler(password, &material)?;

    // Cross-reference and object streams are rebuilt by the writer; their
    // members are already loaded as plain objects.
    doc.objects.retain(|_, object| match object {
        Object::Stream(stream) => !matches!(
            stream.dict.get(b"Type").and_then(Object::as_name),
            Ok(b"XRef") | Ok(b"ObjStm")
        ),
        _ => true,
    });

    mark_extension_level(doc);

    for object in doc.objects.values_mut() {
        encrypt_object(object, &material.file_key)?;
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 5,
        "R" => 6,
        "Length" => 256,
        "CF" => dictionary! {
            "StdCF" => dictionary! {
                "AuthEvent" => "DocOpen",
                "CFM" => "AESV3",
                "Length" => 32,
            },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "P" => PERMISSIONS as i64,
        "U" => Object::String(handler.u, StringFormat::Hexadecimal),
        "UE" => Object::String(handler.ue, StringFormat::Hexadecimal),
        "O" => Object::String(handler.o, StringFormat::Hexadecimal),
        "OE" => Object::String(handler.oe, StringFormat::Hexadecimal),
        "Perms" => Object::String(handler.perms, StringFormat::Hexadecimal),
        "EncryptMetadata" => true,
    });
    doc.trailer.set("Encrypt", encrypt_id);

    if !doc.trailer.has(b"ID") {
        let id: [u8; 16] = rand::random();
        doc.trailer.set(
            "ID",
            vec![
                Object::String(id.to_vec(), StringFormat::Hexadecimal),
                Object::String(id.to_vec(), StringFormat::Hexadecimal),
            ],
        );
    }

    Ok(())
}

fn truncate_password(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    if bytes.len() <= MAX_PASSWORD_LEN {
        return bytes;
    }
    // Cut on a char boundary so the password stays valid UTF-8
    let mut end = MAX_PASSWORD_LEN;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &bytes[..end]
}

/// AES-256 encryption needs PDF 1.7 extension level 8
fn mark_extension_level(doc: &mut Document) {
    let Ok(catalog_id) = doc.trailer.get(b"Root").and_then(Object::as_reference) else {
        return;
    };
    if let Ok(catalog) = doc.get_object_mut(catalog_id).and_then(Object::as_dict_mut) {
        catalog.set(
            "Extensions",
            dictionary! {
                "ADBE" => dictionary! {
                    "BaseVersion" => Object::Name(b"1.7".to_vec()),
                    "ExtensionLevel" => 8,
                },
            },
        );
    }
    doc.version = "1.7".to_string();
}

fn derive_handler(password: &[u8], material: &SecurityMaterial) -> Result<SecurityHandler> {
    let (user_validation_salt, user_key_salt) = material.user_salts.split_at(8);
    let (owner_validation_salt, owner_key_salt) = material.owner_salts.split_at(8);

    // U and UE
    let mut u = hash_r6(password, user_validation_salt, &[])?.to_vec();
    u.extend_from_slice(&material.user_salts);
    let user_key = hash_r6(password, user_key_salt, &[])?;
    let ue = aes256_cbc_no_iv(&user_key, &material.file_key)?;

    // O and OE hash the user entry in as well
    let mut o = hash_r6(password, owner_validation_salt, &u)?.to_vec();
    o.extend_from_slice(&material.owner_salts);
    let owner_key = hash_r6(password, owner_key_salt, &u)?;
    let oe = aes256_cbc_no_iv(&owner_key, &material.file_key)?;

    // Perms: P, 0xFFFFFFFF, encrypt-metadata flag, "adb", random tail
    let mut perms = [0u8; 16];
    perms[..4].copy_from_slice(&(PERMISSIONS as u32).to_le_bytes());
    perms[4..8].copy_from_slice(&[0xFF; 4]);
    perms[8] = b'T';
    perms[9..12].copy_from_slice(b"adb");
    perms[12..].copy_from_slice(&material.perms_tail);
    let cipher = aes::Aes256::new(GenericArray::from_slice(&material.file_key));
    let mut block = GenericArray::clone_from_slice(&perms);
    cipher.encrypt_block(&mut block);

    Ok(SecurityHandler {
        u,
        ue,
        o,
        oe,
        perms: block.to_vec(),
    })
}

/// The revision 6 password hash: SHA-256 seeded, then at least 64 rounds of
/// AES-128 over the repeated input, each round picking SHA-256/384/512.
pub(crate) fn hash_r6(password: &[u8], salt: &[u8], user_entry: &[u8]) -> Result<[u8; 32]> {
    let mut k: Vec<u8> = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(user_entry)
        .finalize()
        .to_vec();

    let mut round = 0usize;
    loop {
        let unit = password.len() + k.len() + user_entry.len();
        let mut k1 = Vec::with_capacity(unit * 64);
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(user_entry);
        }

        let e = Aes128CbcEnc::new_from_slices(&k[..16], &k[16..32])
            .map_err(|e| PdfToolError::OperationError(e.to_string()))?
            .encrypt_padded_vec_mut::<NoPadding>(&k1);

        // The first 16 bytes as a big-endian number mod 3 equals their sum mod 3
        let selector = e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        let last = usize::from(e.last().copied().unwrap_or(0));
        if round >= 64 && last + 32 <= round {
            break;
        }
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    Ok(out)
}

fn aes256_cbc_no_iv(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
    Ok(Aes256CbcEnc::new_from_slices(key, &[0u8; 16])
        .map_err(|e| PdfToolError::OperationError(e.to_string()))?
        .encrypt_padded_vec_mut::<NoPadding>(data))
}

/// AESV3 payload: random IV followed by the PKCS#7 padded ciphertext
fn aes256_cbc_with_iv(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
    let iv: [u8; 16] = rand::random();
    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| PdfToolError::OperationError(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(data);
    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend(ciphertext);
    Ok(out)
}

fn encrypt_object(object: &mut Object, key: &[u8; 32]) -> Result<()> {
    match object {
        Object::String(bytes, format) => {
            *bytes = aes256_cbc_with_iv(key, bytes)?;
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                encrypt_object(item, key)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                encrypt_object(value, key)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                encrypt_object(value, key)?;
            }
            let encrypted = aes256_cbc_with_iv(key, &stream.content)?;
            stream.set_content(encrypted);
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::text_pdf;
    use aes::cipher::BlockDecryptMut;
    use pretty_assertions::assert_eq;

    type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

    fn material() -> SecurityMaterial {
        SecurityMaterial {
            file_key: [7u8; 32],
            user_salts: *b"uvsaltukeysalt01",
            owner_salts: *b"ovsaltokeysalt01",
            perms_tail: *b"tail",
        }
    }

    fn encrypt_dict(doc: &Document) -> lopdf::Dictionary {
        let id = doc.trailer.get(b"Encrypt").unwrap().as_reference().unwrap();
        doc.get_dictionary(id).unwrap().clone()
    }

    fn string_entry(dict: &lopdf::Dictionary, key: &[u8]) -> Vec<u8> {
        match dict.get(key).unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("expected string, got {:?}", other),
        }
    }

    /// Recover the file key the way a reader does from the user password
    fn unlock_with_user_password(dict: &lopdf::Dictionary, password: &str) -> Option<Vec<u8>> {
        let u = string_entry(dict, b"U");
        let ue = string_entry(dict, b"UE");
        let check = hash_r6(password.as_bytes(), &u[32..40], &[]).unwrap();
        if check[..] != u[..32] {
            return None;
        }
        let key = hash_r6(password.as_bytes(), &u[40..48], &[]).unwrap();
        Some(
            Aes256CbcDec::new_from_slices(&key, &[0u8; 16])
                .unwrap()
                .decrypt_padded_vec_mut::<NoPadding>(&ue)
                .unwrap(),
        )
    }

    #[test]
    fn test_empty_password_rejected() {
        let pdf = text_pdf(1, "Secret");
        assert!(matches!(
            protect_document(&pdf, ""),
            Err(PdfToolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_encrypt_dictionary_shape() {
        let mut doc = Document::load_mem(&text_pdf(1, "Secret")).unwrap();
        encrypt_document(&mut doc, "hunter2", material()).unwrap();

        let dict = encrypt_dict(&doc);
        assert_eq!(dict.get(b"V").unwrap().as_i64().unwrap(), 5);
        assert_eq!(dict.get(b"R").unwrap().as_i64().unwrap(), 6);
        assert_eq!(dict.get(b"P").unwrap().as_i64().unwrap(), -4);
        assert_eq!(string_entry(&dict, b"U").len(), 48);
        assert_eq!(string_entry(&dict, b"O").len(), 48);
        assert_eq!(string_entry(&dict, b"UE").len(), 32);
        assert_eq!(string_entry(&dict, b"OE").len(), 32);
        assert_eq!(string_entry(&dict, b"Perms").len(), 16);
        assert!(doc.trailer.has(b"ID"));
    }

    #[test]
    fn test_user_password_unlocks_file_key() {
        let mut doc = Document::load_mem(&text_pdf(1, "Secret")).unwrap();
        encrypt_document(&mut doc, "hunter2", material()).unwrap();
        let dict = encrypt_dict(&doc);

        assert_eq!(unlock_with_user_password(&dict, "hunter2"), Some(vec![7u8; 32]));
        assert_eq!(unlock_with_user_password(&dict, "hunter3"), None);
    }

    #[test]
    fn test_owner_entry_validates_same_password() {
        let mut doc = Document::load_mem(&text_pdf(1, "Secret")).unwrap();
        encrypt_document(&mut doc, "hunter2", material()).unwrap();
        let dict = encrypt_dict(&doc);

        let u = string_entry(&dict, b"U");
        let o = string_entry(&dict, b"O");
        let check = hash_r6(b"hunter2", &o[32..40], &u).unwrap();
        assert_eq!(check[..], o[..32]);
    }

    #[test]
    fn test_content_streams_decrypt_to_original() {
        let pdf = text_pdf(1, "Secret");
        let original = Document::load_mem(&pdf).unwrap();
        let page_id = *original.get_pages().get(&1).unwrap();
        let content_id = original
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_reference()
            .unwrap();
        let plain = original
            .get_object(content_id)
            .unwrap()
            .as_stream()
            .unwrap()
            .content
            .clone();

        let mut doc = original.clone();
        encrypt_document(&mut doc, "hunter2", material()).unwrap();
        let sealed = doc
            .get_object(content_id)
            .unwrap()
            .as_stream()
            .unwrap()
            .content
            .clone();
        assert_ne!(sealed, plain);

        let (iv, body) = sealed.split_at(16);
        let opened = Aes256CbcDec::new_from_slices(&[7u8; 32], iv)
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .unwrap();
        assert_eq!(opened, plain);
    }

    #[test]
    fn test_protect_hides_plaintext() {
        let pdf = text_pdf(1, "Secret");
        let protected = protect_document(&pdf, "hunter2").unwrap();

        assert!(protected.starts_with(b"%PDF-1.7"));
        let haystack = String::from_utf8_lossy(&protected);
        assert!(haystack.contains("/Encrypt"));
        assert!(!haystack.contains("Secret Page 1"));
    }

    #[test]
    fn test_long_password_truncated_on_char_boundary() {
        let password = "é".repeat(100);
        let truncated = truncate_password(&password);
        assert!(truncated.len() <= MAX_PASSWORD_LEN);
        assert!(std::str::from_utf8(truncated).is_ok());
    }
}
