mod common;

use common::{established, message, pair};
use rand::seq::index::sample;
use rand::{thread_rng, Rng};
use tess_crypto::{Session, SessionError};

#[test]
fn fuzz_unwrap_established_never_panics() {
    let (mut client, mut server) = established();
    let mut rng = thread_rng();

    for _ in 0..5_000 {
        let len: usize = rng.gen_range(0..256);
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);
        assert!(server.unwrap(&data).is_err());
    }

    // Random garbage never disturbs a live session
    let frame = client.wrap(b"still here").unwrap();
    assert!(server.unwrap(&frame).is_ok());
}

#[test]
fn fuzz_mutated_frames_never_accepted() {
    let (mut client, mut server) = established();
    let mut rng = thread_rng();

    // One acceptable frame, mutated afresh each round
    let frame = client.wrap(b"mutate me").unwrap();

    for _ in 0..2_000 {
        let mut mutated = frame.clone();
        let flips = rng.gen_range(1..4);
        for index in sample(&mut rng, frame.len(), flips) {
            mutated[index] ^= rng.gen_range(1..=255u8);
        }
        assert!(matches!(
            server.unwrap(&mutated),
            Err(SessionError::Decryption) | Err(SessionError::InvalidParameter(_))
        ));
    }

    assert_eq!(message(server.unwrap(&frame).unwrap()), b"mutate me");
}

#[test]
fn fuzz_handshake_input_never_panics() {
    let mut rng = thread_rng();

    for _ in 0..500 {
        let (mut client, mut server) = pair();
        let request = client.generate_connect_request().unwrap();

        let mut data = request.clone();
        let index = rng.gen_range(0..data.len());
        data[index] ^= rng.gen_range(1..=255u8);
        if rng.gen_bool(0.3) {
            data.truncate(rng.gen_range(0..data.len()));
        }

        assert!(server.unwrap(&data).is_err());
        assert!(!server.is_established());
    }
}

#[test]
fn fuzz_load_never_panics() {
    let mut rng = thread_rng();
    for _ in 0..5_000 {
        let len: usize = rng.gen_range(0..128);
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);
        assert!(Session::load(&data, tess_crypto::TrustStore::new()).is_err());
    }
}
