// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-Stamp Protocol (TSP) / RFC 3161 client.

use {
    crate::{
        asn1::{
            rfc3161::{
                MessageImprint, PkiStatus, TimeStampReq, TimeStampResp, TstInfo,
                OID_CONTENT_TYPE_TST_INFO,
            },
            rfc5652::SignedData as RawSignedData,
        },
        der,
        error::{Result, SignatureError},
        SignedData,
    },
    bcder::{
        decode::Constructed,
        encode::Values,
        Integer, Mode, OctetString, Oid,
    },
    chrono::{DateTime, Utc},
    log::{debug, info, warn},
    reqwest::{header::CONTENT_TYPE, IntoUrl, StatusCode, Url},
    std::{
        ops::Deref,
        sync::atomic::{AtomicU64, Ordering},
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
    x509_certificate::DigestAlgorithm,
};

pub const HTTP_CONTENT_TYPE_REQUEST: &str = "application/timestamp-query";

pub const HTTP_CONTENT_TYPE_RESPONSE: &str = "application/timestamp-reply";

/// Something that can obtain a time-stamp token for a SHA-256 digest.
///
/// Implementations return the DER encoded token (a `ContentInfo` wrapping
/// a `SignedData` over a `TSTInfo`).
pub trait TimeStampProvider: Send + Sync {
    fn stamp(&self, digest: &[u8]) -> Result<Vec<u8>>;
}

/// Settings for talking to a Time-Stamp Authority over HTTP.
#[derive(Clone, Debug)]
pub struct TimestampClientSettings {
    url: Url,
    credentials: Option<(String, String)>,
    timeout: Duration,
}

impl TimestampClientSettings {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Construct settings for the server at `url`.
    pub fn new(url: impl IntoUrl) -> Result<Self> {
        let url = url.into_url().map_err(|e| SignatureError::Network {
            status: None,
            message: format!("invalid time-stamp server URL: {}", e),
        })?;

        Ok(Self {
            url,
            credentials: None,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP basic authentication credentials, if any.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password.as_str()))
    }

    /// Authenticate to the server with HTTP basic authentication.
    pub fn set_credentials(&mut self, user: impl ToString, password: impl ToString) {
        self.credentials = Some((user.to_string(), password.to_string()));
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the timeout covering the entire HTTP exchange.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Obtain a nonce for a new request.
///
/// Nonces are nanoseconds since the UNIX epoch, bumped so every call in the
/// process returns a value greater than all previous ones.
fn next_nonce() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    match LAST_NONCE.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(last) | Err(last) => now.max(last + 1),
    }
}

/// Construct a [TimeStampReq] for a SHA-256 digest.
pub fn time_stamp_request(digest: &[u8]) -> Result<TimeStampReq> {
    if digest.len() != 32 {
        return Err(SignatureError::Protocol(format!(
            "expected a 32 byte SHA-256 digest; got {} bytes",
            digest.len()
        )));
    }

    Ok(TimeStampReq {
        version: Integer::from(1u8),
        message_imprint: MessageImprint {
            hash_algorithm: DigestAlgorithm::Sha256.into(),
            hashed_message: OctetString::new(bytes::Bytes::copy_from_slice(digest)),
        },
        req_policy: None,
        nonce: Some(Integer::from(next_nonce())),
        cert_req: Some(true),
        extensions: None,
    })
}

/// High-level interface to [TimeStampResp].
///
/// This type provides a high-level interface to the low-level ASN.1 response
/// type from a Time-Stamp Protocol request.
pub struct TimeStampResponse(TimeStampResp);

impl Deref for TimeStampResponse {
    type Target = TimeStampResp;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TimeStampResponse {
    /// Decode a BER encoded `TimeStampResp`.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        Ok(Self(
            Constructed::decode(data, Mode::Ber, |cons| TimeStampResp::take_from(cons)).map_err(
                |e| SignatureError::Protocol(format!("malformed time-stamp response: {}", e)),
            )?,
        ))
    }

    /// Whether the time stamp request was successful.
    pub fn is_success(&self) -> bool {
        matches!(
            self.0.status.status,
            PkiStatus::Granted | PkiStatus::GrantedWithMods
        )
    }

    /// Describe the status, status text and failure bits of the response.
    pub fn status_description(&self) -> String {
        let status = &self.0.status;
        let mut description = format!("status {:?}", status.status);

        if let Some(text) = &status.status_string {
            description.push_str(&format!(": {}", text.iter().collect::<Vec<_>>().join("; ")));
        }

        if let Some(fail_info) = &status.fail_info {
            let failures = fail_info
                .failures()
                .iter()
                .map(|failure| failure.to_string())
                .collect::<Vec<_>>();

            if !failures.is_empty() {
                description.push_str(&format!(" (failure info: {})", failures.join(", ")));
            }
        }

        description
    }
}

/// A decoded RFC 3161 time-stamp token.
#[derive(Clone, Debug)]
pub struct TimestampToken {
    policy: Oid,
    hash_algorithm: DigestAlgorithm,
    message_imprint: Vec<u8>,
    serial_number: Integer,
    gen_time: DateTime<Utc>,
    nonce: Option<Integer>,
    signed_data: SignedData,
    der: Vec<u8>,
}

impl TimestampToken {
    /// Decode a token from its BER or DER encoded `ContentInfo`.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let raw = RawSignedData::decode_ber(data).map_err(|e| {
            SignatureError::Protocol(format!("time-stamp token is not SignedData: {}", e))
        })?;

        if raw.content_info.content_type != OID_CONTENT_TYPE_TST_INFO {
            return Err(SignatureError::Protocol(format!(
                "time-stamp token content type is {}; expected TSTInfo",
                raw.content_info.content_type
            )));
        }

        let content = raw
            .content_info
            .content
            .as_ref()
            .ok_or_else(|| SignatureError::Protocol("time-stamp token lacks TSTInfo".into()))?
            .to_bytes();

        let tst_info = Constructed::decode(content, Mode::Ber, |cons| TstInfo::take_from(cons))
            .map_err(|e| SignatureError::Protocol(format!("malformed TSTInfo: {}", e)))?;

        let hash_algorithm = DigestAlgorithm::try_from(&tst_info.message_imprint.hash_algorithm)
            .map_err(|e| SignatureError::Protocol(format!("message imprint algorithm: {}", e)))?;

        let signed_data = SignedData::try_from(&raw)
            .map_err(|e| SignatureError::Protocol(format!("time-stamp token: {}", e)))?;

        Ok(Self {
            policy: tst_info.policy,
            hash_algorithm,
            message_imprint: tst_info.message_imprint.hashed_message.to_bytes().to_vec(),
            serial_number: tst_info.serial_number,
            gen_time: tst_info.gen_time.into(),
            nonce: tst_info.nonce,
            signed_data,
            der: der::to_der(data)?,
        })
    }

    /// The TSA policy under which the token was issued.
    pub fn policy(&self) -> &Oid {
        &self.policy
    }

    pub fn hash_algorithm(&self) -> DigestAlgorithm {
        self.hash_algorithm
    }

    /// The digest that was time-stamped.
    pub fn message_imprint(&self) -> &[u8] {
        &self.message_imprint
    }

    pub fn serial_number(&self) -> &Integer {
        &self.serial_number
    }

    /// The time the TSA asserts the digest existed.
    pub fn gen_time(&self) -> DateTime<Utc> {
        self.gen_time
    }

    pub fn nonce(&self) -> Option<&Integer> {
        self.nonce.as_ref()
    }

    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    /// The DER encoding of the token.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Verify the TSA's signature over the token.
    ///
    /// Every signer must be matched to a certificate embedded in the token,
    /// and both its signature and its digest of the `TSTInfo` must verify.
    pub fn verify_signature(&self) -> Result<()> {
        let mut signers = 0;

        for signer in self.signed_data.signers() {
            signer
                .verify_signature_with_signed_data(&self.signed_data)
                .and_then(|_| signer.verify_message_digest_with_signed_data(&self.signed_data))
                .map_err(|e| {
                    SignatureError::Protocol(format!(
                        "time-stamp token signature does not verify: {}",
                        e
                    ))
                })?;

            signers += 1;
        }

        if signers == 0 {
            Err(SignatureError::Protocol(
                "time-stamp token has no signers".into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Verify the token time-stamps `data`.
    pub fn verify_imprint(&self, data: &[u8]) -> Result<()> {
        if self.hash_algorithm.digest_data(data) == self.message_imprint {
            Ok(())
        } else {
            Err(SignatureError::Protocol(
                "time-stamp message imprint does not match stamped data".into(),
            ))
        }
    }
}

/// Validate a `TimeStampResp` against the request that produced it.
pub fn validate_response(request: &TimeStampReq, data: &[u8]) -> Result<TimestampToken> {
    let response = TimeStampResponse::from_ber(data)?;

    if !response.is_success() {
        return Err(SignatureError::Protocol(format!(
            "time-stamp request rejected: {}",
            response.status_description()
        )));
    }

    let token = response
        .time_stamp_token
        .as_ref()
        .ok_or_else(|| SignatureError::Protocol("response lacks a time-stamp token".into()))?;

    let mut token_ber = Vec::new();
    token.encode_ref().write_encoded(Mode::Ber, &mut token_ber)?;
    let token = TimestampToken::from_ber(&token_ber)?;

    if token.nonce() != request.nonce.as_ref() {
        return Err(SignatureError::Protocol(
            "time-stamp response nonce does not match request".into(),
        ));
    }

    let requested_algorithm =
        DigestAlgorithm::try_from(&request.message_imprint.hash_algorithm)
            .map_err(|e| SignatureError::Protocol(e.to_string()))?;

    if token.hash_algorithm() != requested_algorithm
        || token.message_imprint() != request.message_imprint.hashed_message.to_bytes().as_ref()
    {
        return Err(SignatureError::Protocol(
            "time-stamp message imprint does not match request".into(),
        ));
    }

    token.verify_signature()?;

    Ok(token)
}

/// A Time-Stamp Authority reached over HTTP.
#[derive(Clone, Debug)]
pub struct TimestampClient {
    settings: TimestampClientSettings,
}

impl TimestampClient {
    pub fn new(settings: TimestampClientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TimestampClientSettings {
        &self.settings
    }

    /// Send a request and validate the server's response.
    ///
    /// There are no retries.
    pub fn send_request(&self, request: &TimeStampReq) -> Result<TimestampToken> {
        let body = request.encode_der()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| SignatureError::Network {
                status: None,
                message: e.to_string(),
            })?;

        let mut builder = client
            .post(self.settings.url.clone())
            .header(CONTENT_TYPE, HTTP_CONTENT_TYPE_REQUEST)
            .body(body);

        if let Some((user, password)) = self.settings.credentials() {
            builder = builder.basic_auth(user, Some(password));
        }

        debug!(
            "sending time-stamp request to {} (nonce {:?})",
            self.settings.url,
            request.nonce.as_ref().map(|nonce| hex::encode(nonce.as_slice()))
        );

        let response = builder.send().map_err(|e| SignatureError::Network {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_default();

            return Err(SignatureError::Network {
                status: Some(status.as_u16()),
                message,
            });
        }

        match response.headers().get(CONTENT_TYPE) {
            Some(value) if value.as_bytes() == HTTP_CONTENT_TYPE_RESPONSE.as_bytes() => {}
            value => {
                warn!(
                    "time-stamp server replied with content type {:?}; expected {}",
                    value, HTTP_CONTENT_TYPE_RESPONSE
                );
            }
        }

        let data = response.bytes().map_err(|e| SignatureError::Network {
            status: None,
            message: e.to_string(),
        })?;

        debug!("received {} byte time-stamp response", data.len());

        validate_response(request, &data)
    }
}

impl TimeStampProvider for TimestampClient {
    fn stamp(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let request = time_stamp_request(digest)?;
        let token = self.send_request(&request)?;

        info!(
            "obtained time-stamp token from {} for {}",
            self.settings.url,
            token.gen_time()
        );

        Ok(token.as_der().to_vec())
    }
}
