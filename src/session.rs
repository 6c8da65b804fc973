use rand::RngCore;
use zeroize::Zeroize;

use crate::client::ClientConfig;
use crate::commands::{
    CloseSession, Command, GetChannelAuthCapabilities, SetSessionPrivilegeLevel,
};
use crate::crypto::{SessionKeys, ct_eq, seal_payload_aes_cbc};
use crate::error::{Error, Result};
use crate::protocol::{
    self, CipherSuite, Datagram, SessionPacket, compute_sik, payload_type,
};
use crate::transport::Transport;
use crate::types::{PrivilegeLevel, Version};

/// The remote console session id: ASCII `IPMI`.
pub(crate) const CONSOLE_ID: u32 = 0x4950_4D49;

/// IPMI v2.0 (RMCP+) session state.
///
/// A session is inactive until the RAKP handshake installs a managed system
/// session id; `close` returns it to the inactive state with all key
/// material zeroed, after which it can be opened again.
#[derive(Debug)]
pub(crate) struct Session {
    suite: CipherSuite,
    managed_id: u32,
    sequence: u32,
    rq_seq: u8,
    keys: SessionKeys,
}

impl Session {
    pub(crate) fn new(suite: CipherSuite) -> Self {
        Self {
            suite,
            managed_id: 0,
            sequence: 0,
            rq_seq: 0,
            keys: SessionKeys::default(),
        }
    }

    pub(crate) fn active(&self) -> bool {
        self.managed_id != 0
    }

    /// Allocate the session sequence number for an outbound packet. The
    /// counter only advances once the session is active, and skips zero on
    /// wrap-around.
    fn next_sequence(&mut self) -> u32 {
        if self.active() {
            self.sequence = match self.sequence {
                u32::MAX => 1,
                n => n + 1,
            };
        }
        self.sequence
    }

    /// Allocate the 6-bit command sequence number, returned in the top six
    /// bits of the request sequence byte.
    fn next_rq_seq(&mut self) -> u8 {
        let n = self.rq_seq;
        self.rq_seq = (self.rq_seq + 1) & 0x3F;
        n << 2
    }

    /// Drop back to the inactive state and scrub key material.
    fn reset(&mut self) {
        self.managed_id = 0;
        self.sequence = 0;
        self.rq_seq = 0;
        self.keys.zeroize();
    }

    /// Send one v2.0 session payload and decode the response packet,
    /// applying confidentiality and integrity in both directions once the
    /// session is active.
    fn send_payload(
        &mut self,
        transport: &dyn Transport,
        payload_type_num: u8,
        payload: &[u8],
    ) -> Result<SessionPacket> {
        let active = self.active();
        let encrypt = active && self.suite.requires_confidentiality();
        let authenticate = active && self.suite.requires_integrity();

        let payload = if encrypt {
            let mut iv = [0u8; 16];
            rand::rng().fill_bytes(&mut iv);
            seal_payload_aes_cbc(payload, &self.keys.aes_key(), &iv)?
        } else {
            payload.to_vec()
        };

        let session_seq = self.next_sequence();
        let packet = protocol::encode_v20_packet(
            payload_type_num,
            self.managed_id,
            session_seq,
            &payload,
            authenticate,
            encrypt,
            (authenticate || encrypt).then_some(&self.keys),
        )?;
        crate::debug::dump_hex("rmcp+ request", &packet);

        let response = transport.send_recv(&packet)?;
        crate::debug::dump_hex("rmcp+ response", &response);

        let keys = (authenticate || encrypt).then_some(&self.keys);
        let packet = match protocol::decode_datagram(&response, keys)? {
            Datagram::Ipmi(p) => p,
            Datagram::Pong(_) => {
                return Err(Error::Message("received an unexpected ASF message"));
            }
        };

        if active {
            if packet.session_id != CONSOLE_ID {
                return Err(Error::message_owned(format!(
                    "mismatched console session id: {:#010x} != {CONSOLE_ID:#010x}",
                    packet.session_id
                )));
            }
            if self.suite.requires_integrity() && !packet.authenticated {
                return Err(Error::Message("response message is not authenticated"));
            }
            if self.suite.requires_confidentiality() && !packet.encrypted {
                return Err(Error::Message("response message is not encrypted"));
            }
        }

        Ok(packet)
    }

    /// Execute one command inside the v2.0 session.
    pub(crate) fn exchange<C: Command + ?Sized>(
        &mut self,
        transport: &dyn Transport,
        cmd: &mut C,
    ) -> Result<()> {
        let data = cmd.marshal();
        let msg = protocol::encode_lan_request(
            cmd.net_fn_rs_lun().0,
            cmd.code(),
            self.next_rq_seq(),
            &data,
        );

        let packet = self.send_payload(transport, payload_type::IPMI, &msg)?;
        if packet.payload_type != payload_type::IPMI {
            return Err(Error::Message("unexpected session payload type"));
        }

        let response = protocol::decode_lan_response(&packet.payload)?;
        if !response.completion_code.is_ok() {
            return Err(Error::Command {
                name: cmd.name().to_string(),
                code: cmd.code(),
                completion: response.completion_code,
            });
        }
        cmd.unmarshal(&response.data)
    }

    /// Execute one command wrapped in a v1.5 session header with
    /// authentication type "none". Used for the pre-session channel probe.
    fn exchange_v15<C: Command + ?Sized>(
        &mut self,
        transport: &dyn Transport,
        cmd: &mut C,
    ) -> Result<()> {
        let data = cmd.marshal();
        let msg = protocol::encode_lan_request(
            cmd.net_fn_rs_lun().0,
            cmd.code(),
            self.next_rq_seq(),
            &data,
        );
        let packet = protocol::encode_v15_packet(&msg)?;
        crate::debug::dump_hex("v1.5 request", &packet);

        let response = transport.send_recv(&packet)?;
        crate::debug::dump_hex("v1.5 response", &response);

        let packet = match protocol::decode_datagram(&response, None)? {
            Datagram::Ipmi(p) => p,
            Datagram::Pong(_) => {
                return Err(Error::Message("received an unexpected ASF message"));
            }
        };

        let response = protocol::decode_lan_response(&packet.payload)?;
        if !response.completion_code.is_ok() {
            return Err(Error::Command {
                name: cmd.name().to_string(),
                code: cmd.code(),
                completion: response.completion_code,
            });
        }
        cmd.unmarshal(&response.data)
    }

    /// Run the RMCP+ open state machine: channel probe, Open Session,
    /// RAKP 1 through 4, then optional privilege elevation.
    pub(crate) fn open(
        &mut self,
        transport: &dyn Transport,
        config: &ClientConfig,
    ) -> Result<()> {
        if self.active() {
            return Ok(());
        }

        let mut rng = rand::rng();

        // 1. Get Channel Authentication Capabilities, sent in the v1.5
        //    format so any server answers. Retry once without the v2.0
        //    request bit for BMCs that reject it.
        let mut cac = GetChannelAuthCapabilities::new(Version::V2_0, config.privilege);
        if self.exchange_v15(transport, &mut cac).is_err() {
            cac = GetChannelAuthCapabilities::new(Version::V1_5, config.privilege);
            self.exchange_v15(transport, &mut cac)?;
        }
        if !cac.supports_rmcp_plus() {
            return Err(Error::Message("channel does not support RMCP+"));
        }

        // 2. Open Session Request. An Administrator request asks for the
        //    highest level matching the proposed algorithms (0).
        let requested_privilege = if config.privilege == PrivilegeLevel::Administrator {
            0x00
        } else {
            config.privilege.as_u8()
        };

        let open_tag = (rng.next_u32() & 0xFF) as u8;
        let open_payload = protocol::build_open_session_request(
            open_tag,
            CONSOLE_ID,
            requested_privilege,
            self.suite,
        );
        let packet =
            self.send_payload(transport, payload_type::OPEN_SESSION_REQUEST, &open_payload)?;
        if packet.payload_type != payload_type::OPEN_SESSION_RESPONSE {
            return Err(Error::Message("unexpected Open Session Response payload type"));
        }

        let osr = protocol::parse_open_session_response(&packet.payload)?;
        if osr.tag != open_tag {
            return Err(Error::Message("Open Session Response tag mismatch"));
        }
        if osr.status != 0x00 {
            return Err(Error::message_owned(format!(
                "Open Session Response error: {} ({:#04x})",
                protocol::rakp_status_message(osr.status),
                osr.status
            )));
        }
        if osr.console_id != CONSOLE_ID {
            return Err(Error::message_owned(format!(
                "mismatched console session id in Open Session Response: {:#010x}",
                osr.console_id
            )));
        }
        if !self.suite.matches(osr.auth, osr.integrity, osr.confidentiality) {
            return Err(Error::message_owned(format!(
                "mismatched cipher suite in Open Session Response: {}/{}/{}",
                osr.auth, osr.integrity, osr.confidentiality
            )));
        }
        let managed_id = osr.managed_id;

        // 3. RAKP Messages 1 and 2. The role byte requests a name-only
        //    lookup at the configured privilege.
        let role = config.privilege.as_u8() | 0x10;
        let rakp1_tag = (rng.next_u32() & 0xFF) as u8;
        let mut console_random = [0u8; 16];
        rng.fill_bytes(&mut console_random);

        let rakp1 = protocol::build_rakp1(
            rakp1_tag,
            managed_id,
            &console_random,
            role,
            &config.username,
        );
        let packet = self.send_payload(transport, payload_type::RAKP_1, &rakp1)?;
        if packet.payload_type != payload_type::RAKP_2 {
            return Err(Error::Message("unexpected RAKP Message 2 payload type"));
        }

        let rakp2 = protocol::parse_rakp2(&packet.payload)?;
        if rakp2.tag != rakp1_tag {
            return Err(Error::Message("RAKP Message 2 tag mismatch"));
        }
        if rakp2.status != 0x00 {
            return Err(Error::message_owned(format!(
                "RAKP Message 2 error: {} ({:#04x})",
                protocol::rakp_status_message(rakp2.status),
                rakp2.status
            )));
        }
        if rakp2.console_id != CONSOLE_ID {
            return Err(Error::message_owned(format!(
                "mismatched console session id in RAKP Message 2: {:#010x}",
                rakp2.console_id
            )));
        }

        let user_key = config.password.to_key_sha1();
        if self.suite.requires_authentication() {
            let expected = protocol::rakp2_auth_code(
                &user_key,
                CONSOLE_ID,
                managed_id,
                &console_random,
                &rakp2.managed_random,
                &rakp2.managed_guid,
                role,
                &config.username,
            )?;
            if !ct_eq(&expected, &rakp2.key_exchange_auth_code) {
                return Err(Error::AuthenticationFailed(
                    "RAKP Message 2 key exchange auth code mismatch",
                ));
            }
        }

        // 4. RAKP Messages 3 and 4. Derive SIK, K1 and K2 before sending so
        //    message 4 can be verified.
        let mut rakp3_code = [0u8; 20];
        let keys = if self.suite.requires_authentication() {
            rakp3_code = protocol::rakp3_auth_code(
                &user_key,
                &rakp2.managed_random,
                CONSOLE_ID,
                role,
                &config.username,
            )?;
            let sik = compute_sik(
                &user_key,
                &console_random,
                &rakp2.managed_random,
                role,
                &config.username,
            )?;
            SessionKeys::derive(sik)?
        } else {
            SessionKeys::default()
        };

        let rakp3_tag = (rng.next_u32() & 0xFF) as u8;
        let rakp3 = protocol::build_rakp3(rakp3_tag, managed_id, &rakp3_code);
        let packet = self.send_payload(transport, payload_type::RAKP_3, &rakp3)?;
        if packet.payload_type != payload_type::RAKP_4 {
            return Err(Error::Message("unexpected RAKP Message 4 payload type"));
        }

        let rakp4 = protocol::parse_rakp4(&packet.payload)?;
        if rakp4.tag != rakp3_tag {
            return Err(Error::Message("RAKP Message 4 tag mismatch"));
        }
        if rakp4.status != 0x00 {
            return Err(Error::message_owned(format!(
                "RAKP Message 4 error: {} ({:#04x})",
                protocol::rakp_status_message(rakp4.status),
                rakp4.status
            )));
        }
        if rakp4.console_id != CONSOLE_ID {
            return Err(Error::message_owned(format!(
                "mismatched console session id in RAKP Message 4: {:#010x}",
                rakp4.console_id
            )));
        }
        if self.suite.requires_authentication() {
            let expected = protocol::rakp4_integrity_check(
                &keys.sik,
                &console_random,
                managed_id,
                &rakp2.managed_guid,
            )?;
            if !ct_eq(&expected, &rakp4.integrity_check) {
                return Err(Error::AuthenticationFailed(
                    "RAKP Message 4 integrity check value mismatch",
                ));
            }
        }

        // The session goes live.
        self.managed_id = managed_id;
        self.keys = keys;

        // 5. Elevate the session privilege when the configured level needs
        //    it. Any failure here aborts the open.
        if config.privilege > PrivilegeLevel::User {
            let mut cmd = SetSessionPrivilegeLevel::new(config.privilege);
            if let Err(e) = self.exchange(transport, &mut cmd) {
                return Err(Error::message_owned(format!(
                    "unable to set session privilege level to {}: {e}",
                    config.privilege
                )));
            }
        }

        Ok(())
    }

    /// Close the session. The BMC is told first when the session is active;
    /// local state is cleared whether or not that exchange succeeds.
    pub(crate) fn close(&mut self, transport: &dyn Transport) -> Result<()> {
        let result = if self.active() {
            let mut cmd = CloseSession::new(self.managed_id);
            self.exchange(transport, &mut cmd)
        } else {
            Ok(())
        };
        self.reset();
        result
    }

    #[cfg(test)]
    pub(crate) fn test_activate(&mut self, managed_id: u32, keys: SessionKeys) {
        self.managed_id = managed_id;
        self.keys = keys;
    }

    #[cfg(test)]
    pub(crate) fn test_sequence(&self) -> u32 {
        self.sequence
    }

    #[cfg(test)]
    pub(crate) fn test_set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite0() -> CipherSuite {
        CipherSuite::from_id(0).expect("suite")
    }

    #[test]
    fn sequence_stays_zero_while_inactive() {
        let mut session = Session::new(suite0());
        for _ in 0..5 {
            assert_eq!(session.next_sequence(), 0);
        }
        assert_eq!(session.test_sequence(), 0);
    }

    #[test]
    fn sequence_wraps_to_one() {
        let mut session = Session::new(suite0());
        session.test_activate(0x0102_0304, SessionKeys::default());

        assert_eq!(session.next_sequence(), 1);
        assert_eq!(session.next_sequence(), 2);

        session.test_set_sequence(u32::MAX);
        assert_eq!(session.next_sequence(), 1);
    }

    #[test]
    fn rq_seq_rolls_over_after_64_commands() {
        let mut session = Session::new(suite0());

        let values: Vec<u8> = (0..65).map(|_| session.next_rq_seq()).collect();
        for (i, v) in values.iter().enumerate().take(64) {
            assert_eq!(*v, (i as u8) << 2, "command {i}");
        }
        assert_eq!(values[64], 0);
    }

    #[test]
    fn reset_scrubs_state() {
        let mut session = Session::new(suite0());
        session.test_activate(0x0102_0304, SessionKeys::derive([7u8; 20]).unwrap());
        session.next_sequence();
        session.next_rq_seq();

        session.reset();
        assert!(!session.active());
        assert_eq!(session.test_sequence(), 0);
        assert_eq!(session.keys.k1, [0u8; 20]);
        assert_eq!(session.keys.k2, [0u8; 20]);
        assert_eq!(session.keys.sik, [0u8; 20]);
    }
}
