// UASC for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2026 UASC contributors

//! The secure-channel cryptographic state: negotiated policy and mode, the
//! active and previous security tokens with their derived key sets, and the
//! per-chunk protection envelope (asymmetric for open secure channel,
//! symmetric for everything after).

use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use uasc_crypto::{KeySize, PrivateKey, SecurityPolicy, X509};
use uasc_types::{
    BinaryDecodable, ByteString, ChannelSecurityToken, DecodingOptions, EncodingResult, Error,
    MessageSecurityMode, StatusCode,
};

use super::message_chunk::{
    update_message_size, MessageChunk, MessageChunkHeader, MessageChunkType,
    MESSAGE_CHUNK_HEADER_SIZE,
};
use super::security_header::{
    AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader,
};

/// Sequence numbers wrap back to 1 instead of exceeding this value.
pub const MAX_SEQUENCE_NUMBER: u32 = 4_294_966_271;
/// First sequence number on a channel.
pub const FIRST_SEQUENCE_NUMBER: u32 = 1;

/// Which end of the channel this state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The connecting end.
    Client,
    /// The listening end.
    Server,
}

/// One security token: an id, a time window and the key sets derived for it.
#[derive(Debug)]
struct SecurityToken {
    token_id: u32,
    created_at: Instant,
    lifetime: Duration,
    sender_keys: Option<uasc_crypto::SecurityKeySet>,
    receiver_keys: Option<uasc_crypto::SecurityKeySet>,
}

impl SecurityToken {
    fn has_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.lifetime
    }
}

/// Per-channel security state shared by the client and server facades.
pub struct SecureChannel {
    role: Role,
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    secure_channel_id: u32,
    decoding_options: DecodingOptions,
    private_key: Option<PrivateKey>,
    cert: Option<X509>,
    remote_cert: Option<X509>,
    local_nonce: ByteString,
    remote_nonce: ByteString,
    current_token: Option<SecurityToken>,
    previous_token: Option<SecurityToken>,
    /// Chunks under the previous token are accepted until this instant,
    /// 25% of the revised lifetime past the rollover.
    previous_token_deadline: Option<Instant>,
}

impl SecureChannel {
    /// A channel with no security negotiated yet.
    pub fn new(role: Role, decoding_options: DecodingOptions) -> Self {
        Self {
            role,
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            secure_channel_id: 0,
            decoding_options,
            private_key: None,
            cert: None,
            remote_cert: None,
            local_nonce: ByteString::null(),
            remote_nonce: ByteString::null(),
            current_token: None,
            previous_token: None,
            previous_token_deadline: None,
        }
    }

    /// The channel's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The negotiated security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Set the security policy.
    pub fn set_security_policy(&mut self, policy: SecurityPolicy) {
        self.security_policy = policy;
    }

    /// The negotiated security mode.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Set the security mode.
    pub fn set_security_mode(&mut self, mode: MessageSecurityMode) {
        self.security_mode = mode;
    }

    /// The server-assigned channel id, zero before open.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// Set the channel id.
    pub fn set_secure_channel_id(&mut self, id: u32) {
        self.secure_channel_id = id;
    }

    /// The decoding limits for this channel.
    pub fn decoding_options(&self) -> &DecodingOptions {
        &self.decoding_options
    }

    /// Replace the decoding limits, typically after hello negotiation.
    pub fn set_decoding_options(&mut self, options: DecodingOptions) {
        self.decoding_options = options;
    }

    /// Apply an offset to decoded timestamps to compensate clock skew.
    pub fn set_client_offset(&mut self, offset: chrono::Duration) {
        self.decoding_options.client_offset = offset;
    }

    /// Set this endpoint's certificate.
    pub fn set_cert(&mut self, cert: Option<X509>) {
        self.cert = cert;
    }

    /// This endpoint's certificate.
    pub fn cert(&self) -> Option<&X509> {
        self.cert.as_ref()
    }

    /// Set this endpoint's private key.
    pub fn set_private_key(&mut self, key: Option<PrivateKey>) {
        self.private_key = key;
    }

    /// The peer's certificate.
    pub fn remote_cert(&self) -> Option<&X509> {
        self.remote_cert.as_ref()
    }

    /// Set the peer certificate.
    pub fn set_remote_cert(&mut self, cert: Option<X509>) {
        self.remote_cert = cert;
    }

    /// Set the peer certificate from its wire form. A null byte string
    /// clears it, which is valid for policy `None`.
    pub fn set_remote_cert_from_byte_string(
        &mut self,
        bytes: &ByteString,
    ) -> EncodingResult<()> {
        self.remote_cert = if bytes.is_null_or_empty() {
            None
        } else {
            Some(X509::from_byte_string(bytes)?)
        };
        Ok(())
    }

    /// `true` when messages carry a signature.
    pub fn is_signing_enabled(&self) -> bool {
        self.security_policy != SecurityPolicy::None
            && matches!(
                self.security_mode,
                MessageSecurityMode::Sign | MessageSecurityMode::SignAndEncrypt
            )
    }

    /// `true` when message bodies are encrypted.
    pub fn is_encryption_enabled(&self) -> bool {
        self.security_policy != SecurityPolicy::None
            && self.security_mode == MessageSecurityMode::SignAndEncrypt
    }

    /// Generate and install a fresh local nonce for open or renew.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce = self.security_policy.random_nonce();
    }

    /// Install an externally produced local nonce.
    pub fn set_local_nonce(&mut self, nonce: &[u8]) {
        self.local_nonce = ByteString::from(nonce);
    }

    /// The local nonce in wire form.
    pub fn local_nonce_as_byte_string(&self) -> ByteString {
        self.local_nonce.clone()
    }

    /// The peer's nonce bytes.
    pub fn remote_nonce(&self) -> &[u8] {
        self.remote_nonce.as_ref()
    }

    /// Install the peer's nonce, validating its length against the policy.
    pub fn set_remote_nonce_from_byte_string(
        &mut self,
        nonce: &ByteString,
    ) -> EncodingResult<()> {
        if self.security_policy != SecurityPolicy::None {
            let expected = self.security_policy.secure_channel_nonce_length();
            if nonce.len() != expected {
                error!(
                    "Peer nonce has length {} but policy {} requires {}",
                    nonce.len(),
                    self.security_policy,
                    expected
                );
                return Err(Error::new(
                    StatusCode::BadNonceInvalid,
                    "peer nonce length does not match the security policy",
                ));
            }
        }
        self.remote_nonce = nonce.clone();
        Ok(())
    }

    /// `true` once a token has been installed by open or renew.
    pub fn has_security_token(&self) -> bool {
        self.current_token.is_some()
    }

    /// The id of the current token, zero before open.
    pub fn token_id(&self) -> u32 {
        self.current_token.as_ref().map(|t| t.token_id).unwrap_or(0)
    }

    /// Install a token issued by the server (server side). The existing
    /// token, if any, is retained as the previous token for the drain
    /// window.
    pub fn issue_token(&mut self, token_id: u32, revised_lifetime_ms: u32) {
        self.install_token(token_id, revised_lifetime_ms);
    }

    /// Install a token received in an open secure channel response (client
    /// side).
    pub fn set_security_token(&mut self, token: ChannelSecurityToken) {
        self.secure_channel_id = token.channel_id;
        self.install_token(token.token_id, token.revised_lifetime);
    }

    fn install_token(&mut self, token_id: u32, revised_lifetime_ms: u32) {
        let now = Instant::now();
        if let Some(previous) = self.current_token.take() {
            // Keep the superseded token alive for a quarter lifetime so
            // in-flight chunks still decrypt.
            self.previous_token_deadline = Some(now + previous.lifetime / 4);
            self.previous_token = Some(previous);
        }
        debug!("Installing security token {token_id}");
        self.current_token = Some(SecurityToken {
            token_id,
            created_at: now,
            lifetime: Duration::from_millis(u64::from(revised_lifetime_ms)),
            sender_keys: None,
            receiver_keys: None,
        });
    }

    /// Forget all tokens and nonces, done before a reconnect.
    pub fn clear_security_token(&mut self) {
        self.current_token = None;
        self.previous_token = None;
        self.previous_token_deadline = None;
        self.local_nonce = ByteString::null();
        self.remote_nonce = ByteString::null();
    }

    /// Derive the sender and receiver key sets of the current token from
    /// the two nonces.
    pub fn derive_keys(&mut self) {
        let sender_keys = self
            .security_policy
            .make_security_keys(self.remote_nonce.as_ref(), self.local_nonce.as_ref());
        let receiver_keys = self
            .security_policy
            .make_security_keys(self.local_nonce.as_ref(), self.remote_nonce.as_ref());
        if let Some(token) = self.current_token.as_mut() {
            token.sender_keys = Some(sender_keys);
            token.receiver_keys = Some(receiver_keys);
        }
        trace!("Derived key sets for token {}", self.token_id());
    }

    /// `true` once the current token has passed 75% of its lifetime; the
    /// client initiates a renew then.
    pub fn should_renew_security_token(&self) -> bool {
        self.current_token.as_ref().is_some_and(|token| {
            Instant::now().duration_since(token.created_at) >= token.lifetime * 3 / 4
        })
    }

    /// `true` once the current token is past its lifetime; the sender must
    /// not protect further chunks with it.
    pub fn token_has_expired(&self) -> bool {
        self.current_token
            .as_ref()
            .is_some_and(|token| token.has_expired(Instant::now()))
    }

    /// The instant the current token dies; if the channel is not renewed by
    /// then it closes.
    pub fn token_renewal_deadline(&self) -> Instant {
        self.current_token
            .as_ref()
            .map(|token| token.created_at + token.lifetime)
            .unwrap_or_else(Instant::now)
    }

    /// The security header for an outgoing chunk of the given type.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                if self.security_policy == SecurityPolicy::None {
                    SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none(
                        self.security_policy.to_uri(),
                    ))
                } else {
                    let sender_certificate = self
                        .cert
                        .as_ref()
                        .map(|c| c.as_byte_string())
                        .unwrap_or_default();
                    let receiver_certificate_thumbprint = self
                        .remote_cert
                        .as_ref()
                        .map(|c| c.thumbprint().as_byte_string())
                        .unwrap_or_default();
                    SecurityHeader::Asymmetric(AsymmetricSecurityHeader::new(
                        self.security_policy.to_uri(),
                        sender_certificate,
                        receiver_certificate_thumbprint,
                    ))
                }
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id(),
            }),
        }
    }

    /// Signature length appended to chunks carrying the given header.
    pub fn signature_size(&self, security_header: &SecurityHeader) -> usize {
        match security_header {
            SecurityHeader::Asymmetric(_) => {
                if self.security_policy == SecurityPolicy::None {
                    0
                } else {
                    self.private_key
                        .as_ref()
                        .map(|k| self.security_policy.asymmetric_signature_size(k))
                        .unwrap_or(0)
                }
            }
            SecurityHeader::Symmetric(_) => {
                if self.is_signing_enabled() {
                    self.security_policy.symmetric_signature_size()
                } else {
                    0
                }
            }
        }
    }

    /// Plaintext block size and minimum padding for chunks carrying the
    /// given header. A block size of one means no alignment is needed.
    pub fn padding_block_sizes(
        &self,
        security_header: &SecurityHeader,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        match security_header {
            SecurityHeader::Asymmetric(_) => {
                if self.security_policy == SecurityPolicy::None
                    || !message_type.is_open_secure_channel()
                {
                    return (1, 0);
                }
                match self.remote_cert.as_ref().and_then(|c| c.public_key().ok()) {
                    Some(public) => {
                        let block = self.security_policy.asymmetric_plain_block_size(&public);
                        let minimum = if block > 256 { 2 } else { 1 };
                        (block, minimum)
                    }
                    None => (1, 0),
                }
            }
            SecurityHeader::Symmetric(_) => {
                if self.is_encryption_enabled() {
                    (self.security_policy.symmetric_block_size(), 1)
                } else {
                    (1, 0)
                }
            }
        }
    }

    /// Apply the protection the channel state calls for to a cleartext
    /// chunk, returning the wire bytes. `chunk_index` is the chunk's
    /// position within its message and diversifies the CBC IV.
    pub fn apply_security(
        &self,
        chunk: &MessageChunk,
        chunk_index: u32,
    ) -> EncodingResult<Vec<u8>> {
        let header = chunk.message_header(&self.decoding_options)?;
        if header.message_type.is_open_secure_channel() {
            self.apply_asymmetric_security(chunk)
        } else {
            self.apply_symmetric_security(chunk, chunk_index)
        }
    }

    fn apply_asymmetric_security(&self, chunk: &MessageChunk) -> EncodingResult<Vec<u8>> {
        if self.security_policy == SecurityPolicy::None {
            return Ok(chunk.data.clone());
        }

        let policy = self.security_policy;
        let private_key = self.private_key.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadSecurityChecksFailed, "no private key to sign with")
        })?;
        let remote_public = self
            .remote_cert
            .as_ref()
            .ok_or_else(|| {
                Error::new(
                    StatusCode::BadCertificateInvalid,
                    "no peer certificate to encrypt for",
                )
            })?
            .public_key()?;

        let encrypted_offset = chunk.encrypted_data_offset(&self.decoding_options)?;
        let signature_size = policy.asymmetric_signature_size(private_key);
        let plain_block = policy.asymmetric_plain_block_size(&remote_public);
        let cipher_block = remote_public.size();

        let region_len = chunk.data.len() - encrypted_offset;
        let padding = padding_size(region_len + signature_size, plain_block);
        let plain_region_len = region_len + padding + signature_size;
        debug_assert_eq!(plain_region_len % plain_block, 0);
        let final_size =
            encrypted_offset + (plain_region_len / plain_block) * cipher_block;

        // Assemble the plaintext: original chunk, padding, corrected size
        // field, then the signature over all of it.
        let mut plain = Vec::with_capacity(encrypted_offset + plain_region_len);
        plain.extend_from_slice(&chunk.data);
        write_padding(&mut plain, padding, plain_block);
        plain[4..8].copy_from_slice(&(final_size as u32).to_le_bytes());
        let signature = policy.asymmetric_sign(private_key, &plain)?;
        plain.extend_from_slice(&signature);

        let ciphertext = policy.asymmetric_encrypt(&remote_public, &plain[encrypted_offset..])?;
        let mut out = Vec::with_capacity(final_size);
        out.extend_from_slice(&plain[..encrypted_offset]);
        out.extend_from_slice(&ciphertext);
        debug_assert_eq!(out.len(), final_size);
        Ok(out)
    }

    fn apply_symmetric_security(
        &self,
        chunk: &MessageChunk,
        chunk_index: u32,
    ) -> EncodingResult<Vec<u8>> {
        if !self.is_signing_enabled() {
            return Ok(chunk.data.clone());
        }

        let token = self.current_token.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadSecureChannelClosed, "no security token installed")
        })?;
        if token.has_expired(Instant::now()) {
            error!("Refusing to protect a chunk under an expired token");
            return Err(Error::new(
                StatusCode::BadSecureChannelClosed,
                "security token has expired",
            ));
        }
        let keys = token.sender_keys.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadSecurityChecksFailed, "sender keys not derived")
        })?;

        let policy = self.security_policy;
        let signature_size = policy.symmetric_signature_size();
        let encrypted_offset = chunk.encrypted_data_offset(&self.decoding_options)?;

        if !self.is_encryption_enabled() {
            // Sign only: correct the size for the appended signature, then
            // MAC the whole chunk.
            let mut out = chunk.data.clone();
            let final_size = out.len() + signature_size;
            out[4..8].copy_from_slice(&(final_size as u32).to_le_bytes());
            let signature = policy.symmetric_sign(&keys.signing_key.expose(), &out)?;
            out.extend_from_slice(&signature);
            return Ok(out);
        }

        let block = policy.symmetric_block_size();
        let region_len = chunk.data.len() - encrypted_offset;
        let padding = padding_size(region_len, block);
        let final_size = encrypted_offset + region_len + padding + signature_size;

        let mut plain = chunk.data.clone();
        write_padding(&mut plain, padding, block);
        plain[4..8].copy_from_slice(&(final_size as u32).to_le_bytes());

        // Encrypt from the sequence header onward, then MAC the whole chunk
        // including the ciphertext.
        let iv = chunk_iv(&keys.initialisation_vector.expose(), chunk_index);
        let ciphertext = policy.symmetric_encrypt(
            &keys.encryption_key.expose(),
            &iv,
            &plain[encrypted_offset..],
        )?;
        let mut out = Vec::with_capacity(final_size);
        out.extend_from_slice(&plain[..encrypted_offset]);
        out.extend_from_slice(&ciphertext);
        let signature = policy.symmetric_sign(&keys.signing_key.expose(), &out)?;
        out.extend_from_slice(&signature);
        debug_assert_eq!(out.len(), final_size);
        Ok(out)
    }

    /// Verify and strip the protection of a received chunk, returning the
    /// cleartext chunk. `chunk_index` mirrors the sender's chunk position
    /// within the message.
    pub fn verify_and_remove_security(
        &mut self,
        data: &[u8],
        chunk_index: u32,
    ) -> EncodingResult<MessageChunk> {
        let header = MessageChunkHeader::decode(
            &mut std::io::Cursor::new(data),
            &self.decoding_options,
        )?;

        if header.message_type.is_open_secure_channel() {
            self.verify_and_remove_asymmetric_security(data)
        } else {
            if self.secure_channel_id != 0 && header.secure_channel_id != self.secure_channel_id {
                error!(
                    "Chunk names secure channel {} but this channel is {}",
                    header.secure_channel_id, self.secure_channel_id
                );
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    "chunk secure channel id mismatch",
                ));
            }
            self.verify_and_remove_symmetric_security(data, chunk_index)
        }
    }

    fn verify_and_remove_asymmetric_security(
        &mut self,
        data: &[u8],
    ) -> EncodingResult<MessageChunk> {
        if self.security_policy == SecurityPolicy::None {
            return Ok(MessageChunk { data: data.to_vec() });
        }

        let policy = self.security_policy;
        let private_key = self.private_key.as_ref().ok_or_else(|| {
            Error::new(
                StatusCode::BadSecurityChecksFailed,
                "no private key to decrypt with",
            )
        })?;

        let chunk = MessageChunk { data: data.to_vec() };
        let encrypted_offset = chunk.encrypted_data_offset(&self.decoding_options)?;

        // Decrypt from the sequence header onward with our own key.
        let plain_region =
            policy.asymmetric_decrypt(private_key, &data[encrypted_offset..])?;
        let mut plain = Vec::with_capacity(encrypted_offset + plain_region.len());
        plain.extend_from_slice(&data[..encrypted_offset]);
        plain.extend_from_slice(&plain_region);

        // The sender signed with the key of the certificate in the header.
        let sender_public = self
            .remote_cert
            .as_ref()
            .ok_or_else(|| {
                Error::new(
                    StatusCode::BadCertificateInvalid,
                    "no peer certificate to verify with",
                )
            })?
            .public_key()?;
        let signature_size = policy.asymmetric_signature_size(&sender_public);
        if plain.len() < encrypted_offset + signature_size {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "chunk too short for its signature",
            ));
        }
        let signed_len = plain.len() - signature_size;
        policy.asymmetric_verify_signature(
            &sender_public,
            &plain[..signed_len],
            &plain[signed_len..],
        )?;
        plain.truncate(signed_len);

        // Strip the padding; its length encoding depends on the plaintext
        // block size of our own key.
        let plain_block = policy.asymmetric_plain_block_size(private_key);
        strip_padding(&mut plain, plain_block, encrypted_offset)?;

        update_message_size(&mut plain)?;
        Ok(MessageChunk { data: plain })
    }

    fn verify_and_remove_symmetric_security(
        &mut self,
        data: &[u8],
        chunk_index: u32,
    ) -> EncodingResult<MessageChunk> {
        if !self.is_signing_enabled() {
            return Ok(MessageChunk { data: data.to_vec() });
        }

        if data.len() < MESSAGE_CHUNK_HEADER_SIZE + 4 {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "chunk too short for a symmetric security header",
            ));
        }
        let chunk = MessageChunk { data: data.to_vec() };
        let encrypted_offset = chunk.encrypted_data_offset(&self.decoding_options)?;
        let token_id = u32::from_le_bytes([
            data[MESSAGE_CHUNK_HEADER_SIZE],
            data[MESSAGE_CHUNK_HEADER_SIZE + 1],
            data[MESSAGE_CHUNK_HEADER_SIZE + 2],
            data[MESSAGE_CHUNK_HEADER_SIZE + 3],
        ]);

        let policy = self.security_policy;
        let signature_size = policy.symmetric_signature_size();
        if data.len() < encrypted_offset + signature_size {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "chunk too short for its signature",
            ));
        }

        let (keys, used_previous) = self.select_receiver_keys(token_id)?;

        // Encrypt-then-MAC: check the signature over the received bytes
        // before touching the ciphertext.
        let signed_len = data.len() - signature_size;
        policy.symmetric_verify_signature(
            &keys.signing_key.expose(),
            &data[..signed_len],
            &data[signed_len..],
        )?;

        let mut plain = Vec::with_capacity(signed_len);
        plain.extend_from_slice(&data[..encrypted_offset]);
        if self.is_encryption_enabled() {
            let iv = chunk_iv(&keys.initialisation_vector.expose(), chunk_index);
            let region = policy.symmetric_decrypt(
                &keys.encryption_key.expose(),
                &iv,
                &data[encrypted_offset..signed_len],
            )?;
            plain.extend_from_slice(&region);
            strip_padding(&mut plain, policy.symmetric_block_size(), encrypted_offset)?;
        } else {
            plain.extend_from_slice(&data[encrypted_offset..signed_len]);
        }
        update_message_size(&mut plain)?;

        // First verified chunk under the renewed token retires the old one.
        if !used_previous && self.previous_token.is_some() {
            let current = self.token_id();
            if current == token_id {
                debug!("Dropping previous token, first chunk under token {current} verified");
                self.previous_token = None;
                self.previous_token_deadline = None;
            }
        }

        Ok(MessageChunk { data: plain })
    }

    /// The plaintext and ciphertext block sizes of the asymmetric envelope,
    /// `None` when the policy does not encrypt or no peer certificate is
    /// known.
    pub fn asymmetric_block_sizes(&self) -> Option<(usize, usize)> {
        if self.security_policy == SecurityPolicy::None {
            return None;
        }
        let public = self.remote_cert.as_ref()?.public_key().ok()?;
        Some((
            self.security_policy.asymmetric_plain_block_size(&public),
            public.size(),
        ))
    }

    /// Adopt the policy and peer certificate named by the asymmetric header
    /// of an incoming open secure channel chunk. The header region of the
    /// chunk is never encrypted, so this runs before verification. The
    /// caller decides whether the policy is acceptable for the endpoint.
    pub fn update_from_asymmetric_header(
        &mut self,
        security_header: &AsymmetricSecurityHeader,
    ) -> EncodingResult<()> {
        let policy = security_header
            .security_policy_uri
            .as_ref()
            .parse::<SecurityPolicy>()
            .unwrap_or(SecurityPolicy::Unknown);
        if !policy.is_supported() {
            error!(
                "Peer requested unsupported security policy {}",
                security_header.security_policy_uri
            );
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "unsupported security policy",
            ));
        }
        self.security_policy = policy;
        if policy != SecurityPolicy::None {
            self.set_remote_cert_from_byte_string(&security_header.sender_certificate)?;
            // The thumbprint names the certificate the sender encrypted
            // for; a mismatch means the chunk is not for us.
            if let (Some(own), Some(thumbprint)) = (
                self.cert.as_ref(),
                security_header.receiver_certificate_thumbprint.value(),
            ) {
                if own.thumbprint().as_bytes() != thumbprint {
                    error!("Open secure channel chunk is encrypted for a different certificate");
                    return Err(Error::new(
                        StatusCode::BadCertificateInvalid,
                        "receiver certificate thumbprint mismatch",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Pick the receiver key set matching the token id of an incoming
    /// chunk. Returns whether the previous token was used.
    fn select_receiver_keys(
        &self,
        token_id: u32,
    ) -> EncodingResult<(&uasc_crypto::SecurityKeySet, bool)> {
        if let Some(token) = self.current_token.as_ref() {
            if token.token_id == token_id {
                let keys = token.receiver_keys.as_ref().ok_or_else(|| {
                    Error::new(
                        StatusCode::BadSecurityChecksFailed,
                        "receiver keys not derived",
                    )
                })?;
                return Ok((keys, false));
            }
        }
        if let Some(token) = self.previous_token.as_ref() {
            if token.token_id == token_id {
                let within_drain = self
                    .previous_token_deadline
                    .is_some_and(|deadline| Instant::now() < deadline);
                if within_drain {
                    trace!("Accepting chunk under previous token {token_id}");
                    let keys = token.receiver_keys.as_ref().ok_or_else(|| {
                        Error::new(
                            StatusCode::BadSecurityChecksFailed,
                            "receiver keys not derived",
                        )
                    })?;
                    return Ok((keys, true));
                }
            }
        }
        error!("Chunk carries unknown token id {token_id}");
        Err(Error::new(
            StatusCode::BadSecureChannelTokenUnknown,
            format!("token id {token_id} does not match a live token"),
        ))
    }
}

/// XOR the in-message chunk index into the IV so no two chunks of a message
/// share one.
fn chunk_iv(base: &[u8], chunk_index: u32) -> Vec<u8> {
    let mut iv = base.to_vec();
    for (dst, src) in iv.iter_mut().zip(chunk_index.to_le_bytes()) {
        *dst ^= src;
    }
    iv
}

/// Bytes of padding to append so `len` plus the padding is a whole number of
/// `block` sized blocks. Includes the trailing length byte(s).
fn padding_size(len: usize, block: usize) -> usize {
    if block <= 1 {
        return 0;
    }
    let length_bytes = if block > 256 { 2 } else { 1 };
    (block - ((len + length_bytes) % block)) % block + length_bytes
}

/// Append `padding` bytes, the last one (or two, for large blocks) of which
/// encode the padding length.
fn write_padding(buf: &mut Vec<u8>, padding: usize, block: usize) {
    if padding == 0 {
        return;
    }
    if block > 256 {
        let fill = padding - 2;
        buf.extend(std::iter::repeat(fill as u8).take(fill));
        buf.extend_from_slice(&(fill as u16).to_le_bytes());
    } else {
        let fill = padding - 1;
        buf.extend(std::iter::repeat(fill as u8).take(fill + 1));
    }
}

/// Strip the padding `write_padding` appended. `floor` is the lowest offset
/// the payload may shrink to.
fn strip_padding(buf: &mut Vec<u8>, block: usize, floor: usize) -> EncodingResult<()> {
    if block <= 1 {
        return Ok(());
    }
    let remove = if block > 256 {
        let hi = buf.last().copied().unwrap_or(0);
        let lo = buf.get(buf.len().wrapping_sub(2)).copied().unwrap_or(0);
        u16::from_le_bytes([lo, hi]) as usize + 2
    } else {
        buf.last().copied().unwrap_or(0) as usize + 1
    };
    if buf.len() < floor + remove {
        return Err(Error::new(
            StatusCode::BadSecurityChecksFailed,
            "padding length exceeds chunk body",
        ));
    }
    buf.truncate(buf.len() - remove);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_reaches_block_boundary() {
        for len in 0..128usize {
            let padding = padding_size(len, 16);
            assert!(padding >= 1);
            assert_eq!((len + padding) % 16, 0, "len {len}");
        }
        assert_eq!(padding_size(10, 1), 0);
    }

    #[test]
    fn padding_round_trip() {
        for len in [0usize, 1, 15, 16, 17, 100] {
            let mut buf = vec![0xabu8; len];
            let padding = padding_size(len, 16);
            write_padding(&mut buf, padding, 16);
            assert_eq!(buf.len() % 16, 0);
            strip_padding(&mut buf, 16, 0).unwrap();
            assert_eq!(buf.len(), len);
        }
    }

    #[test]
    fn extended_padding_round_trip() {
        // RSA-4096 PKCS#1 plaintext blocks exceed 256 bytes.
        let block = 501;
        for len in [0usize, 1, 499, 500, 501, 1200] {
            let mut buf = vec![0xcdu8; len];
            let padding = padding_size(len, block);
            write_padding(&mut buf, padding, block);
            assert_eq!(buf.len() % block, 0);
            strip_padding(&mut buf, block, 0).unwrap();
            assert_eq!(buf.len(), len);
        }
    }

    #[test]
    fn chunk_iv_diversifies() {
        let base = [7u8; 16];
        let a = chunk_iv(&base, 0);
        let b = chunk_iv(&base, 1);
        assert_eq!(a, base.to_vec());
        assert_ne!(a, b);
        assert_eq!(&a[4..], &b[4..]);
    }
}
