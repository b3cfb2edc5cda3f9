//! Cross-checks the streaming cipher against the reference `aes-gcm` implementation.

mod fixtures;

use aead::inout::InOutBuf;
use aead::{AeadInOut, KeyInit, Nonce};
use aes_gcm::Aes256Gcm;
use fixtures::{PASSWORD, seal};
use fv_vault::cipher::{self, GcmStream};
use fv_vault::container::ContainerView;
use fv_vault::kdf::{DerivedKey, derive};
use proptest::prelude::*;

fn reference_seal(
    key: &DerivedKey,
    nonce: &[u8; 12],
    aad: &[u8],
    data: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).unwrap();
    let nonce: Nonce<Aes256Gcm> = nonce.as_slice().try_into().unwrap();

    let mut buf = data.to_vec();
    let tag = cipher.encrypt_inout_detached(&nonce, aad, InOutBuf::from(&mut buf[..])).unwrap();
    (buf, tag.as_slice().to_vec())
}

#[test]
fn containers_open_with_reference_implementation() {
    let container = seal(PASSWORD, b"hello vault");
    let view = ContainerView::parse(&container).unwrap();
    let key = derive(PASSWORD, &view.header.salt, view.header.iterations).unwrap();

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).unwrap();
    let nonce: Nonce<Aes256Gcm> = view.header.nonce.as_slice().try_into().unwrap();
    let tag: aead::Tag<Aes256Gcm> = view.tag.as_slice().try_into().unwrap();

    let mut buf = view.ciphertext.to_vec();
    cipher.decrypt_inout_detached(&nonce, &[], InOutBuf::from(&mut buf[..]), &tag).unwrap();
    assert_eq!(buf, b"hello vault");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stream_matches_reference(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 12]>(),
        aad in proptest::collection::vec(any::<u8>(), 0..48),
        data in proptest::collection::vec(any::<u8>(), 0..600),
        step in 1usize..97,
    ) {
        let key = DerivedKey::from_bytes(key);
        let (expected_ct, expected_tag) = reference_seal(&key, &nonce, &aad, &data);

        let mut buf = data.clone();
        let mut stream = GcmStream::new(&key, &nonce, &aad).unwrap();
        for chunk in buf.chunks_mut(step) {
            stream.encrypt_chunk(chunk).unwrap();
        }
        prop_assert_eq!(&buf, &expected_ct);
        let tag = stream.finalize();
        prop_assert_eq!(tag.as_slice(), expected_tag.as_slice());

        let mut stream = GcmStream::new(&key, &nonce, &aad).unwrap();
        for chunk in buf.chunks_mut(step) {
            stream.decrypt_chunk(chunk).unwrap();
        }
        prop_assert!(stream.verify(&expected_tag.as_slice().try_into().unwrap()).is_ok());
        prop_assert_eq!(buf, data);
    }

    #[test]
    fn one_shot_matches_reference(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 12]>(),
        data in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let key = DerivedKey::from_bytes(key);
        let (expected_ct, expected_tag) = reference_seal(&key, &nonce, &[], &data);

        let (ct, tag) = cipher::encrypt(&key, &nonce, &data).unwrap();
        prop_assert_eq!(ct, expected_ct);
        prop_assert_eq!(tag.as_slice(), expected_tag.as_slice());
    }
}
