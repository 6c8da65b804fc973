use std::time::{Duration, Instant};

use crate::commands::Command;
use crate::crypto::SecretBytes;
use crate::error::{Error, Result};
use crate::protocol::{self, CipherSuite, Datagram};
use crate::session::Session;
use crate::transport::{Transport, UdpTransport};
use crate::types::{PrivilegeLevel, Version};

/// Default RMCP port.
const DEFAULT_PORT: u16 = 623;

/// Initial chunk size for partial SDR reads.
const SDR_DEFAULT_READ_BYTES: u8 = 32;

/// Validated client configuration.
#[derive(Debug, Clone)]
pub(crate) struct ClientConfig {
    pub(crate) address: String,
    pub(crate) timeout: Duration,
    pub(crate) retries: u32,
    pub(crate) username: Vec<u8>,
    pub(crate) password: SecretBytes,
    pub(crate) privilege: PrivilegeLevel,
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    address: String,
    version: Version,
    timeout: Duration,
    retries: u32,
    username: Vec<u8>,
    password: SecretBytes,
    privilege: PrivilegeLevel,
    cipher_suite_id: u8,
}

impl ClientBuilder {
    /// Create a builder for the given BMC address (`host` or `host:port`;
    /// the RMCP port 623 is used when none is given).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            version: Version::V2_0,
            timeout: Duration::from_secs(5),
            retries: 0,
            username: Vec::new(),
            password: SecretBytes::default(),
            privilege: PrivilegeLevel::Administrator,
            cipher_suite_id: 0,
        }
    }

    /// Select the IPMI version. Only v2.0 sessions are implemented.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the per-attempt timeout (default 5 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of additional attempts after a timeout (default 0).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the username (UTF-8 string).
    pub fn username(mut self, username: impl AsRef<str>) -> Self {
        self.username = username.as_ref().as_bytes().to_vec();
        self
    }

    /// Set the username (raw bytes). The protocol treats usernames as raw
    /// bytes even though they are ASCII in most deployments.
    pub fn username_bytes(mut self, username: impl Into<Vec<u8>>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password (UTF-8 string).
    pub fn password(mut self, password: impl AsRef<str>) -> Self {
        self.password = SecretBytes::new(password.as_ref().as_bytes().to_vec());
        self
    }

    /// Set the password (raw bytes).
    pub fn password_bytes(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = SecretBytes::new(password.into());
        self
    }

    /// Set the requested session privilege level (default Administrator).
    pub fn privilege_level(mut self, level: PrivilegeLevel) -> Self {
        self.privilege = level;
        self
    }

    /// Select the cipher suite (ids 0 through 3, default 0).
    pub fn cipher_suite_id(mut self, id: u8) -> Self {
        self.cipher_suite_id = id;
        self
    }

    /// Validate the configuration and build an idle [`Client`]. No network
    /// traffic happens until `open`, `ping` or `execute`.
    pub fn build(self) -> Result<Client> {
        if self.version != Version::V2_0 {
            return Err(Error::Unsupported(
                "IPMI v1.5 session activation is not implemented",
            ));
        }
        if self.password.len() > 20 {
            return Err(Error::InvalidArgument("password longer than 20 bytes"));
        }
        if self.username.len() > 16 {
            return Err(Error::InvalidArgument("username longer than 16 bytes"));
        }
        let suite = CipherSuite::from_id(self.cipher_suite_id)
            .ok_or(Error::InvalidArgument("unsupported cipher suite id"))?;

        let mut address = self.address;
        if !address.contains(':') {
            address = format!("{address}:{DEFAULT_PORT}");
        }

        Ok(Client {
            config: ClientConfig {
                address,
                timeout: self.timeout,
                retries: self.retries,
                username: self.username,
                password: self.password,
                privilege: self.privilege,
            },
            transport: None,
            session: Session::new(suite),
            sdr_reading_bytes: SDR_DEFAULT_READ_BYTES,
        })
    }
}

/// A blocking IPMI v2.0 RMCP+ client.
///
/// The client owns one UDP socket with a single request in flight at a
/// time; it must not be shared between threads. `open` is idempotent,
/// `execute` opens on demand, and a closed client may be opened again.
pub struct Client {
    config: ClientConfig,
    transport: Option<Box<dyn Transport + Send>>,
    session: Session,
    /// Per-BMC partial-read chunk size, adapted downward by the SDR walk.
    pub(crate) sdr_reading_bytes: u8,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("sdr_reading_bytes", &self.sdr_reading_bytes)
            .finish()
    }
}

impl Client {
    /// Create a [`ClientBuilder`].
    pub fn builder(address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(address)
    }

    /// RMCP/ASF presence ping over a throwaway socket. Succeeds when the
    /// endpoint answers with a pong that advertises IPMI support.
    pub fn ping(&self) -> Result<()> {
        let transport = UdpTransport::connect(
            &self.config.address,
            self.config.timeout,
            self.config.retries,
        )?;

        let response = transport.send_recv(&protocol::build_ping(0x00))?;
        match protocol::decode_datagram(&response, None)? {
            Datagram::Pong(pong) if pong.supports_ipmi() => Ok(()),
            Datagram::Pong(_) => Err(Error::Message("endpoint does not support IPMI")),
            Datagram::Ipmi(_) => Err(Error::Message("received an unexpected message (Ping)")),
        }
    }

    /// Open the session. Dials the BMC on first use and runs the RMCP+
    /// handshake; calling it on an open client does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.transport.is_none() {
            let transport = UdpTransport::connect(
                &self.config.address,
                self.config.timeout,
                self.config.retries,
            )?;
            self.transport = Some(Box::new(transport));
        }

        if self.session.active() {
            return Ok(());
        }

        let transport = self.transport.as_deref().expect("transport just set");
        match self.session.open(transport, &self.config) {
            Ok(()) => Ok(()),
            Err(e) => {
                // A half-open session is useless: drop the socket so the
                // next attempt starts from scratch.
                let _ = self.session.close(transport);
                self.transport = None;
                Err(e)
            }
        }
    }

    /// Close the session and the socket. The BMC is sent a Close Session
    /// first when the session is active; local state is cleared either way
    /// and the client may be opened again.
    pub fn close(&mut self) -> Result<()> {
        let result = match self.transport.as_deref() {
            Some(transport) => self.session.close(transport),
            None => Ok(()),
        };
        self.transport = None;
        result
    }

    /// Execute a typed command, opening the session first if needed. On
    /// success the command's response fields are populated in place.
    pub fn execute<C: Command + ?Sized>(&mut self, cmd: &mut C) -> Result<()> {
        self.open()?;
        let transport = self.transport.as_deref().expect("open leaves a transport");

        let netfn = cmd.net_fn_rs_lun().net_fn_code();
        let code = cmd.code();

        let start = Instant::now();
        let result = self.session.exchange(transport, cmd);
        let elapsed = start.elapsed();
        match &result {
            Ok(()) => crate::observe::record_ok(netfn, code, elapsed),
            Err(err) => crate::observe::record_err(netfn, code, elapsed, err),
        }
        result
    }
}

#[cfg(test)]
impl Client {
    /// A client wired to a scripted transport; the handshake still runs.
    pub(crate) fn test_with_transport(
        transport: Box<dyn Transport + Send>,
        cipher_suite_id: u8,
        username: &str,
        password: &str,
        privilege: PrivilegeLevel,
    ) -> Client {
        Client {
            config: ClientConfig {
                address: String::new(),
                timeout: Duration::from_secs(1),
                retries: 0,
                username: username.as_bytes().to_vec(),
                password: SecretBytes::new(password.as_bytes().to_vec()),
                privilege,
            },
            transport: Some(transport),
            session: Session::new(CipherSuite::from_id(cipher_suite_id).expect("suite")),
            sdr_reading_bytes: SDR_DEFAULT_READ_BYTES,
        }
    }

    /// A client whose session is already active, skipping the handshake.
    pub(crate) fn test_preopened(
        transport: Box<dyn Transport + Send>,
        cipher_suite_id: u8,
        managed_id: u32,
    ) -> Client {
        let mut client = Self::test_with_transport(
            transport,
            cipher_suite_id,
            "",
            "",
            PrivilegeLevel::Administrator,
        );
        client
            .session
            .test_activate(managed_id, crate::crypto::SessionKeys::default());
        client
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;
    use crate::commands::{GetDeviceId, GetPohCounter};
    use crate::crypto::{SessionKeys, normalize_key_sha1};
    use crate::protocol::payload_type;
    use crate::session::CONSOLE_ID;
    use crate::testutil::{
        FnTransport, decode_client_request, ipmi_reply, lan_response, session_reply, v15_ipmi_reply,
    };

    #[test]
    fn builder_validates_arguments() {
        let err = Client::builder("10.0.0.1")
            .version(Version::V1_5)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let err = Client::builder("10.0.0.1")
            .password("123456789012345678901")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = Client::builder("10.0.0.1")
            .username("seventeen-letters")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = Client::builder("10.0.0.1").cipher_suite_id(4).build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let client = Client::builder("10.0.0.1")
            .username("admin")
            .password("secret")
            .cipher_suite_id(3)
            .build()
            .expect("build");
        assert_eq!(client.config.address, "10.0.0.1:623");

        let client = Client::builder("10.0.0.1:9623").build().expect("build");
        assert_eq!(client.config.address, "10.0.0.1:9623");
    }

    /// Full cipher-suite-3 lifecycle: channel probe, Open Session, RAKP 1-4
    /// with real HMACs on both sides, privilege elevation, an encrypted and
    /// authenticated command, and Close Session on the wire.
    #[test]
    fn suite3_open_poh_and_close() {
        const MANAGED_ID: u32 = 0xDEAD_BEEF;
        let managed_random = [0xCCu8; 16];
        let managed_guid = [0xDDu8; 16];

        let close_seen = Arc::new(AtomicBool::new(false));
        let close_seen_bmc = close_seen.clone();

        let mut bmc_keys: Option<SessionKeys> = None;
        let mut console_random = [0u8; 16];

        let transport = FnTransport::new(move |request: &[u8]| {
            // The channel probe is the only v1.5 frame.
            if request[4] == 0x00 {
                return Ok(v15_ipmi_reply(
                    request,
                    0x00,
                    &[0x0E, 0x80, 0x14, 0x03, 0, 0, 0, 0],
                ));
            }

            match request[5] & 0x3F {
                payload_type::OPEN_SESSION_REQUEST => {
                    let packet = decode_client_request(request, None);
                    let mut resp = [0u8; 36];
                    resp[0] = packet.payload[0]; // tag
                    resp[2] = 0x04;
                    resp[4..8].copy_from_slice(&CONSOLE_ID.to_le_bytes());
                    resp[8..12].copy_from_slice(&MANAGED_ID.to_le_bytes());
                    resp[16] = 0x01;
                    resp[24] = 0x01;
                    resp[32] = 0x01;
                    Ok(session_reply(payload_type::OPEN_SESSION_RESPONSE, &resp))
                }
                payload_type::RAKP_1 => {
                    let packet = decode_client_request(request, None);
                    let p = &packet.payload;
                    console_random.copy_from_slice(&p[8..24]);
                    let role = p[24];
                    let ulen = p[27] as usize;
                    let username = p[28..28 + ulen].to_vec();

                    let key = normalize_key_sha1(b"pw");
                    let auth_code = crate::protocol::rakp2_auth_code(
                        &key,
                        CONSOLE_ID,
                        MANAGED_ID,
                        &console_random,
                        &managed_random,
                        &managed_guid,
                        role,
                        &username,
                    )
                    .unwrap();
                    let sik = crate::protocol::compute_sik(
                        &key,
                        &console_random,
                        &managed_random,
                        role,
                        &username,
                    )
                    .unwrap();
                    bmc_keys = Some(SessionKeys::derive(sik).unwrap());

                    let mut resp = vec![0u8; 60];
                    resp[0] = p[0]; // tag
                    resp[4..8].copy_from_slice(&CONSOLE_ID.to_le_bytes());
                    resp[8..24].copy_from_slice(&managed_random);
                    resp[24..40].copy_from_slice(&managed_guid);
                    resp[40..60].copy_from_slice(&auth_code);
                    Ok(session_reply(payload_type::RAKP_2, &resp))
                }
                payload_type::RAKP_3 => {
                    let packet = decode_client_request(request, None);
                    let keys = bmc_keys.as_ref().expect("RAKP 3 before RAKP 1");
                    let icv = crate::protocol::rakp4_integrity_check(
                        &keys.sik,
                        &console_random,
                        MANAGED_ID,
                        &managed_guid,
                    )
                    .unwrap();

                    let mut resp = vec![0u8; 20];
                    resp[0] = packet.payload[0]; // tag
                    resp[4..8].copy_from_slice(&CONSOLE_ID.to_le_bytes());
                    resp[8..20].copy_from_slice(&icv);
                    Ok(session_reply(payload_type::RAKP_4, &resp))
                }
                payload_type::IPMI => {
                    let keys = bmc_keys.clone().expect("command before key exchange");
                    Ok(ipmi_reply(request, Some(&keys), true, true, |lan| {
                        match lan[5] {
                            0x3B => (0x00, vec![0x04]),
                            0x0F => (0x00, vec![60, 10, 0, 0, 0]),
                            0x3C => {
                                let data = &lan[6..lan.len() - 1];
                                assert_eq!(data, MANAGED_ID.to_le_bytes());
                                close_seen_bmc.store(true, Ordering::SeqCst);
                                (0x00, Vec::new())
                            }
                            other => panic!("unexpected command {other:#04x}"),
                        }
                    }))
                }
                other => panic!("unexpected payload type {other:#04x}"),
            }
        });

        let mut client = Client::test_with_transport(
            Box::new(transport),
            3,
            "u",
            "pw",
            PrivilegeLevel::Administrator,
        );

        client.open().expect("open");
        // Idempotent: a second open is a no-op.
        client.open().expect("reopen");

        let mut poh = GetPohCounter::default();
        client.execute(&mut poh).expect("poh");
        assert_eq!(poh.power_on_hours(), Duration::from_secs(10 * 3600));

        client.close().expect("close");
        assert!(close_seen.load(Ordering::SeqCst));
        assert!(!client.session.active());
    }

    /// A flipped bit in the BMC's RAKP 2 auth code must abort the handshake
    /// before RAKP 3 goes out.
    #[test]
    fn rakp2_auth_code_mismatch_rejects_session() {
        const MANAGED_ID: u32 = 0x0BAD_F00D;
        let managed_random = [0x21u8; 16];
        let managed_guid = [0x42u8; 16];

        let requests = Arc::new(AtomicU32::new(0));
        let requests_bmc = requests.clone();

        let transport = FnTransport::new(move |request: &[u8]| {
            requests_bmc.fetch_add(1, Ordering::SeqCst);

            if request[4] == 0x00 {
                return Ok(v15_ipmi_reply(
                    request,
                    0x00,
                    &[0x0E, 0x80, 0x14, 0x03, 0, 0, 0, 0],
                ));
            }

            match request[5] & 0x3F {
                payload_type::OPEN_SESSION_REQUEST => {
                    let packet = decode_client_request(request, None);
                    let mut resp = [0u8; 36];
                    resp[0] = packet.payload[0];
                    resp[4..8].copy_from_slice(&CONSOLE_ID.to_le_bytes());
                    resp[8..12].copy_from_slice(&MANAGED_ID.to_le_bytes());
                    // Echo cipher suite 2: RAKP-HMAC-SHA1, HMAC-SHA1-96,
                    // no confidentiality.
                    resp[16] = 0x01;
                    resp[24] = 0x01;
                    resp[32] = 0x00;
                    Ok(session_reply(payload_type::OPEN_SESSION_RESPONSE, &resp))
                }
                payload_type::RAKP_1 => {
                    let packet = decode_client_request(request, None);
                    let p = &packet.payload;
                    let mut console_random = [0u8; 16];
                    console_random.copy_from_slice(&p[8..24]);
                    let role = p[24];
                    let ulen = p[27] as usize;
                    let username = p[28..28 + ulen].to_vec();

                    let key = normalize_key_sha1(b"pw");
                    let mut auth_code = crate::protocol::rakp2_auth_code(
                        &key,
                        CONSOLE_ID,
                        MANAGED_ID,
                        &console_random,
                        &managed_random,
                        &managed_guid,
                        role,
                        &username,
                    )
                    .unwrap();
                    auth_code[0] ^= 0x01;

                    let mut resp = vec![0u8; 60];
                    resp[0] = p[0];
                    resp[4..8].copy_from_slice(&CONSOLE_ID.to_le_bytes());
                    resp[8..24].copy_from_slice(&managed_random);
                    resp[24..40].copy_from_slice(&managed_guid);
                    resp[40..60].copy_from_slice(&auth_code);
                    Ok(session_reply(payload_type::RAKP_2, &resp))
                }
                other => panic!("handshake continued after bad auth code: {other:#04x}"),
            }
        });

        let mut client = Client::test_with_transport(
            Box::new(transport),
            2,
            "u",
            "pw",
            PrivilegeLevel::Administrator,
        );

        let err = client.open().expect_err("open must fail");
        assert!(matches!(err, Error::AuthenticationFailed(_)), "{err}");
        // Probe, Open Session, RAKP 1. Never RAKP 3.
        assert_eq!(requests.load(Ordering::SeqCst), 3);
    }

    /// A corrupted body checksum surfaces as a message error on the first
    /// exchange, with no retry.
    #[test]
    fn corrupted_checksum_fails_without_retry() {
        let requests = Arc::new(AtomicU32::new(0));
        let requests_bmc = requests.clone();

        let transport = FnTransport::new(move |request: &[u8]| {
            requests_bmc.fetch_add(1, Ordering::SeqCst);
            let mut reply = ipmi_reply(request, None, false, false, |_| {
                (
                    0x00,
                    vec![0x20, 0x01, 0x02, 0x43, 0x02, 0x8F, 0xA2, 0x02, 0x00, 0x00, 0x01],
                )
            });
            // Flip the body checksum (the final byte of the LAN message).
            let last = reply.len() - 1;
            reply[last] ^= 0x01;
            Ok(reply)
        });

        let mut client = Client::test_preopened(Box::new(transport), 0, 0x0102_0304);
        let err = client.execute(&mut GetDeviceId::default()).unwrap_err();
        assert!(matches!(err, Error::MessageOwned(_)), "{err}");
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    /// Any non-OK completion code becomes a command error carrying that
    /// exact code.
    #[test]
    fn completion_code_propagates() {
        let transport = FnTransport::new(|request: &[u8]| {
            Ok(ipmi_reply(request, None, false, false, |_| (0xC1, Vec::new())))
        });

        let mut client = Client::test_preopened(Box::new(transport), 0, 0x0102_0304);
        let err = client.execute(&mut GetDeviceId::default()).unwrap_err();
        match err {
            Error::Command {
                name,
                code,
                completion,
            } => {
                assert_eq!(name, "Get Device ID");
                assert_eq!(code, 0x01);
                assert_eq!(completion, crate::types::CompletionCode::INVALID_COMMAND);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Responses must echo the console session id once the session is
    /// active.
    #[test]
    fn mismatched_session_id_is_rejected() {
        let transport = FnTransport::new(|request: &[u8]| {
            let packet = decode_client_request(request, None);
            let lan = lan_response(&packet.payload, 0x00, &[]);
            // Echo the managed id instead of the console id.
            Ok(crate::protocol::encode_v20_packet(
                payload_type::IPMI,
                0x0102_0304,
                packet.session_seq,
                &lan,
                false,
                false,
                None,
            )
            .unwrap())
        });

        let mut client = Client::test_preopened(Box::new(transport), 0, 0x0102_0304);
        let err = client.execute(&mut GetDeviceId::default()).unwrap_err();
        assert!(matches!(err, Error::MessageOwned(_)), "{err}");
    }
}
