//! Session-scoped workflow state
//!
//! A `Session` owns everything one operator works with: the generated or
//! imported share bundle, the signing key (when known), the threshold gate,
//! and a loaded envelope. Every operation catches its own errors and records
//! them as severity-tagged [`TerminalLine`]s, so a failure never ends the
//! session; callers inspect [`Session::output`] and retry or [`Session::reset`].

use ed25519_dalek::{SigningKey, VerifyingKey};
use rektsafe_core::{RektsafeError, RektsafeResult, Severity, TerminalLine};

use crate::envelope::{Envelope, Unpacked};
use crate::gate::{GateState, ThresholdGate};
use crate::keys::generate_keys_with;
use crate::shares::ShareBundle;
use crate::sign;
use crate::threshold::{ShareScheme, ThresholdConfig};

#[derive(Debug, Default)]
pub struct Session {
    bundle: Option<ShareBundle>,
    signing_key: Option<SigningKey>,
    gate: Option<ThresholdGate>,
    envelope: Option<Unpacked>,
    output: Vec<TerminalLine>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ── output ────────────────────────────────────────────────────────────

    pub fn output(&self) -> &[TerminalLine] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<TerminalLine> {
        std::mem::take(&mut self.output)
    }

    pub fn has_errors(&self) -> bool {
        self.output.iter().any(|l| l.severity == Severity::Error)
    }

    /// Append a line, mirroring it to the tracing log.
    pub fn push(&mut self, line: TerminalLine) {
        match line.severity {
            Severity::Error => tracing::error!(message = %line.message, "session"),
            Severity::Warning => tracing::warn!(message = %line.message, "session"),
            Severity::Info | Severity::Success => {
                tracing::info!(message = %line.message, "session")
            }
        }
        self.output.push(line);
    }

    fn record<T>(&mut self, result: RektsafeResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(TerminalLine::error(format!("{}: {e}", e.kind())));
                None
            }
        }
    }

    /// Drop all keys, shares, and loaded envelopes.
    pub fn reset(&mut self) {
        self.bundle = None;
        self.signing_key = None;
        self.gate = None;
        self.envelope = None;
        self.output.clear();
        self.push(TerminalLine::info("Session reset"));
    }

    // ── keys and shares ───────────────────────────────────────────────────

    pub fn bundle(&self) -> Option<&ShareBundle> {
        self.bundle.as_ref()
    }

    pub fn public_key(&self) -> Option<VerifyingKey> {
        self.bundle.as_ref().and_then(|b| b.verifying_key().ok())
    }

    pub fn has_signing_key(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Generate a keypair with replicated shares, replacing any previous keys.
    pub fn generate_keys(&mut self, total_parties: u8, threshold: u8) -> Option<&ShareBundle> {
        self.generate_keys_with(total_parties, threshold, ShareScheme::Replicated)
    }

    pub fn generate_keys_with(
        &mut self,
        total_parties: u8,
        threshold: u8,
        scheme: ShareScheme,
    ) -> Option<&ShareBundle> {
        self.push(TerminalLine::info(format!(
            "Generating Ed25519 keypair: {total_parties} parties, threshold {threshold}, {scheme} shares"
        )));

        let config = self.record(ThresholdConfig::new(total_parties, threshold))?;
        let generation = self.record(generate_keys_with(config, scheme))?;

        let bundle = ShareBundle::from(&generation);
        self.gate = Some(ThresholdGate::new(config));
        self.signing_key = Some(generation.signing_key.clone());
        self.push(TerminalLine::success(format!(
            "Generated {} shares for public key {}",
            bundle.shares.len(),
            hex::encode(generation.public_key.as_bytes())
        )));
        if scheme == ShareScheme::Replicated {
            self.push(TerminalLine::warning(
                "Replicated shares each hold the full private key: the threshold is simulated, not enforced",
            ));
        }
        self.bundle = Some(bundle);
        self.bundle.as_ref()
    }

    /// Serialize the current bundle for export.
    pub fn export_shares(&mut self) -> Option<String> {
        let bundle = self.require_bundle()?;
        let json = self.record(bundle.to_json())?;
        self.push(TerminalLine::success("Exported key-shares bundle"));
        Some(json)
    }

    /// Import a bundle. The signing key is unknown until shares are combined.
    pub fn load_bundle(&mut self, bundle: ShareBundle) -> bool {
        if self.record(bundle.validate()).is_none() {
            return false;
        }
        let Some(config) = self.record(bundle.config()) else {
            return false;
        };
        self.push(TerminalLine::success(format!(
            "Loaded {} bundle: {} of {} shares present, threshold {}",
            bundle.scheme,
            bundle.shares.len(),
            bundle.total_parties,
            bundle.threshold
        )));
        self.gate = Some(ThresholdGate::new(config));
        self.signing_key = None;
        self.bundle = Some(bundle);
        true
    }

    fn require_bundle(&mut self) -> Option<ShareBundle> {
        match &self.bundle {
            Some(b) => Some(b.clone()),
            None => self.record(Err(RektsafeError::Configuration(
                "no keys in session: generate keys or load a bundle first".into(),
            ))),
        }
    }

    fn require_signing_key(&mut self) -> Option<SigningKey> {
        match &self.signing_key {
            Some(k) => Some(k.clone()),
            None => self.record(Err(RektsafeError::Configuration(
                "no signing key: generate keys or combine selected shares first".into(),
            ))),
        }
    }

    // ── threshold gate ────────────────────────────────────────────────────

    pub fn gate_state(&self) -> GateState {
        self.gate.as_ref().map_or(GateState::Idle, |g| g.state())
    }

    pub fn selected_parties(&self) -> Vec<u8> {
        self.gate.as_ref().map(|g| g.selected()).unwrap_or_default()
    }

    pub fn select_party(&mut self, id: u8) -> GateState {
        let result = match self.gate.as_mut() {
            Some(gate) => gate
                .select(id)
                .map(|state| (state, gate.selected().len(), gate.config().threshold())),
            None => Err(RektsafeError::Configuration(
                "no threshold configured: generate keys or load a bundle first".into(),
            )),
        };
        if let Some((state, count, threshold)) = self.record(result) {
            self.push(TerminalLine::info(format!(
                "Selected party-{id} ({count}/{threshold})"
            )));
            if state == GateState::Unlocked {
                self.push(TerminalLine::success("Threshold reached"));
            }
        }
        self.gate_state()
    }

    pub fn deselect_party(&mut self, id: u8) -> GateState {
        if let Some(gate) = self.gate.as_mut() {
            gate.deselect(id);
        }
        self.gate_state()
    }

    /// Recover the signing key from the selected shares once the gate is unlocked.
    pub fn combine_selected(&mut self) -> bool {
        let Some(bundle) = self.require_bundle() else {
            return false;
        };
        if self.gate_state() != GateState::Unlocked {
            let selected = self.selected_parties().len();
            self.record::<()>(Err(RektsafeError::Configuration(format!(
                "threshold not reached: {selected}/{} shares selected",
                bundle.threshold
            ))));
            return false;
        }

        let ids = self.selected_parties();
        let Some(signing_key) = self.record(bundle.recover_signing_key(&ids)) else {
            return false;
        };
        self.signing_key = Some(signing_key);

        match bundle.scheme {
            ShareScheme::Replicated => self.push(TerminalLine::warning(format!(
                "Combined {} replicated shares: any single share already held the key",
                ids.len()
            ))),
            ShareScheme::Shamir => self.push(TerminalLine::success(format!(
                "Reconstructed signing key from {} Shamir shares",
                ids.len()
            ))),
        }
        true
    }

    // ── signing ───────────────────────────────────────────────────────────

    pub fn sign_message(&mut self, message: &str) -> Option<String> {
        let key = self.require_signing_key()?;
        let signature = sign::sign(message, &key);
        self.push(TerminalLine::success(format!("Signature: {signature}")));
        Some(signature)
    }

    pub fn verify_message(&mut self, message: &str, signature_hex: &str) -> Option<bool> {
        let public_key = self.require_public_key()?;
        let valid = self.record(sign::verify(message, signature_hex, &public_key))?;
        self.push_verdict(valid);
        Some(valid)
    }

    pub fn sign_file(&mut self, data: &[u8]) -> Option<String> {
        let key = self.require_signing_key()?;
        let signature = sign::sign_digest(data, &key);
        self.push(TerminalLine::success(format!(
            "SHA-256 {} signed: {signature}",
            hex::encode(sign::sha256_digest(data))
        )));
        Some(signature)
    }

    pub fn verify_file(&mut self, data: &[u8], signature_hex: &str) -> Option<bool> {
        let public_key = self.require_public_key()?;
        let valid = self.record(sign::verify_digest(data, signature_hex, &public_key))?;
        self.push_verdict(valid);
        Some(valid)
    }

    fn require_public_key(&mut self) -> Option<VerifyingKey> {
        let bundle = self.require_bundle()?;
        self.record(bundle.verifying_key())
    }

    fn push_verdict(&mut self, valid: bool) {
        if valid {
            self.push(TerminalLine::success("Signature valid"));
        } else {
            self.push(TerminalLine::error("Signature invalid"));
        }
    }

    // ── files ─────────────────────────────────────────────────────────────

    /// Encrypt into a version 1 envelope (key embedded).
    pub fn encrypt_file(&mut self, file_name: &str, data: &[u8]) -> Option<Envelope> {
        self.push(TerminalLine::info(format!(
            "Encrypting {file_name} ({} bytes) with AES-256-GCM",
            data.len()
        )));
        let envelope = self.record(Envelope::seal(file_name, data))?;
        self.push(TerminalLine::success(format!(
            "Encrypted {file_name}: envelope v{} carries its own key",
            envelope.version
        )));
        Some(envelope)
    }

    /// Encrypt into a version 2 envelope (key wrapped under the signing key).
    pub fn encrypt_file_wrapped(&mut self, file_name: &str, data: &[u8]) -> Option<Envelope> {
        let key = self.require_signing_key()?;
        self.push(TerminalLine::info(format!(
            "Encrypting {file_name} ({} bytes), key wrapped under the signing key",
            data.len()
        )));
        let envelope = self.record(Envelope::seal_wrapped(file_name, data, &key))?;
        self.push(TerminalLine::success(format!(
            "Encrypted {file_name}: envelope v{} requires the signing key",
            envelope.version
        )));
        Some(envelope)
    }

    pub fn load_envelope(&mut self, json: &str) -> bool {
        let Some(unpacked) = self.record(Envelope::unpackage_json(json)) else {
            return false;
        };
        self.push(TerminalLine::success(format!(
            "Loaded envelope v{} for {} ({} bytes of ciphertext)",
            unpacked.version,
            unpacked.file_name,
            unpacked.ciphertext.len()
        )));
        self.envelope = Some(unpacked);
        true
    }

    /// Decrypt the loaded envelope, returning `(original file name, plaintext)`.
    ///
    /// Version 1 envelopes decrypt regardless of the gate; a warning line
    /// records when that happens without the threshold being met.
    pub fn decrypt_envelope(&mut self) -> Option<(String, Vec<u8>)> {
        let Some(unpacked) = self.envelope.clone() else {
            return self.record(Err(RektsafeError::InvalidPackage(
                "no envelope loaded".into(),
            )));
        };

        if !unpacked.requires_signing_key() && self.gate_state() != GateState::Unlocked {
            self.push(TerminalLine::warning(format!(
                "Threshold gate not satisfied ({} selected): envelope v{} embeds its key and decrypts without any shares",
                self.selected_parties().len(),
                unpacked.version
            )));
        }

        let plaintext = self.record(unpacked.decrypt(self.signing_key.as_ref()))?;
        self.push(TerminalLine::success(format!(
            "Decrypted {} ({} bytes)",
            unpacked.file_name,
            plaintext.len()
        )));
        Some((unpacked.file_name, plaintext))
    }
}
