//! End-to-end workflows: generate shares, encrypt a file, write the envelope
//! to disk, reload it elsewhere, and decrypt.

use rektsafe_core::{RektsafeError, Severity};
use rektsafe_crypto::{
    generate_keys, Envelope, GateState, Session, ShareBundle, ShareScheme, ThresholdConfig,
};
use tempfile::TempDir;

#[test]
fn five_party_embedded_envelope_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let generation = generate_keys(5, 3).unwrap();
    assert_eq!(generation.shares.len(), 5);
    for (i, share) in generation.shares.iter().enumerate() {
        assert_eq!(share.id as usize, i + 1);
        assert_eq!(share.label, format!("party-{}", i + 1));
    }

    let body = b"hello rekt";
    assert_eq!(body.len(), 10);
    let envelope = Envelope::seal("hello.txt", body).unwrap();
    assert_eq!(envelope.iv.len(), 12);
    assert_eq!(envelope.encrypted_data.len(), (10 + 16) * 2);

    let path = tmp.path().join("hello.txt.encrypted");
    envelope.write_to(&path).unwrap();

    // Reload in a fresh session with no shares: the embedded key is enough.
    let mut fresh = Session::new();
    let json = std::fs::read_to_string(&path).unwrap();
    assert!(fresh.load_envelope(&json));
    assert_eq!(fresh.gate_state(), GateState::Idle);
    let (name, plaintext) = fresh.decrypt_envelope().unwrap();
    assert_eq!(name, "hello.txt");
    assert_eq!(plaintext, body);
    assert!(fresh
        .output()
        .iter()
        .any(|l| l.severity == Severity::Warning));
    assert!(!fresh.has_errors());
}

#[test]
fn invalid_party_configurations_are_rejected() {
    for (total, threshold) in [(5, 1), (11, 11), (3, 4), (0, 0)] {
        let err = generate_keys(total, threshold).unwrap_err();
        assert!(
            matches!(err, RektsafeError::Configuration(_)),
            "({total}, {threshold}) gave {err:?}"
        );
    }
    assert!(ThresholdConfig::new(10, 10).is_ok());
    assert!(ThresholdConfig::new(2, 2).is_ok());
}

#[test]
fn shamir_bundle_and_wrapped_envelope_over_disk() {
    let tmp = TempDir::new().unwrap();
    let bundle_path = tmp.path().join("shares.json");
    let envelope_path = tmp.path().join("plan.pdf.encrypted");

    let mut dealer = Session::new();
    dealer
        .generate_keys_with(5, 3, ShareScheme::Shamir)
        .unwrap()
        .write_to(&bundle_path)
        .unwrap();
    dealer
        .encrypt_file_wrapped("plan.pdf", b"%PDF-1.7 secret plan")
        .unwrap()
        .write_to(&envelope_path)
        .unwrap();
    drop(dealer);

    let bundle = ShareBundle::read_from(&bundle_path).unwrap();
    let envelope_json = std::fs::read_to_string(&envelope_path).unwrap();

    // Two shares are not enough.
    let mut short = Session::new();
    assert!(short.load_bundle(bundle.clone()));
    short.select_party(2);
    short.select_party(4);
    assert!(!short.combine_selected());
    assert!(short.load_envelope(&envelope_json));
    assert!(short.decrypt_envelope().is_none());

    // Three shares reconstruct the key and open the file.
    let mut quorum = Session::new();
    assert!(quorum.load_bundle(bundle));
    for id in [2, 4, 5] {
        quorum.select_party(id);
    }
    assert_eq!(quorum.gate_state(), GateState::Unlocked);
    assert!(quorum.combine_selected());
    assert!(quorum.load_envelope(&envelope_json));
    let (name, plaintext) = quorum.decrypt_envelope().unwrap();
    assert_eq!(name, "plan.pdf");
    assert_eq!(plaintext, b"%PDF-1.7 secret plan");
    assert!(!quorum.has_errors());
}

#[test]
fn signatures_survive_bundle_export() {
    let mut signer = Session::new();
    signer.generate_keys(3, 2).unwrap();
    let signature = signer.sign_message("transfer 5 to party-2").unwrap();
    let bundle_json = signer.export_shares().unwrap();

    let mut verifier = Session::new();
    assert!(verifier.load_bundle(ShareBundle::from_json(&bundle_json).unwrap()));
    assert_eq!(
        verifier.verify_message("transfer 5 to party-2", &signature),
        Some(true)
    );
    assert_eq!(
        verifier.verify_message("transfer 50 to party-2", &signature),
        Some(false)
    );
}

#[test]
fn tampered_envelope_reports_decryption_error() {
    let envelope = Envelope::seal("a.txt", b"integrity matters").unwrap();
    let mut value = serde_json::to_value(&envelope).unwrap();
    let data = value["encryptedData"].as_str().unwrap().to_string();
    let flipped = if data.starts_with('0') { "1" } else { "0" };
    value["encryptedData"] = serde_json::Value::String(format!("{flipped}{}", &data[1..]));

    let mut session = Session::new();
    assert!(session.load_envelope(&value.to_string()));
    assert!(session.decrypt_envelope().is_none());
    let last = session.output().last().unwrap();
    assert_eq!(last.severity, Severity::Error);
    assert!(last.message.starts_with("DecryptionError"));
}
