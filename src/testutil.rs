//! Scripted-peer plumbing shared by the exchange-level tests. The BMC side
//! of each exchange is played with the same codecs the client uses.

use std::cell::RefCell;

use crate::crypto::{SessionKeys, seal_payload_aes_cbc};
use crate::error::Result;
use crate::protocol::{
    self, BMC_SLAVE_ADDR, Datagram, REMOTE_SWID, SessionPacket, payload_type,
};
use crate::session::CONSOLE_ID;
use crate::transport::Transport;

/// A transport that hands every request datagram to a closure.
pub(crate) struct FnTransport {
    responder: RefCell<Box<dyn FnMut(&[u8]) -> Result<Vec<u8>> + Send>>,
}

impl FnTransport {
    pub(crate) fn new(f: impl FnMut(&[u8]) -> Result<Vec<u8>> + Send + 'static) -> Self {
        Self {
            responder: RefCell::new(Box::new(f)),
        }
    }
}

impl Transport for FnTransport {
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut responder = self.responder.borrow_mut();
        (&mut **responder)(request)
    }
}

/// Decode a client datagram, panicking on anything that is not an IPMI
/// session packet.
pub(crate) fn decode_client_request(
    request: &[u8],
    keys: Option<&SessionKeys>,
) -> SessionPacket {
    match protocol::decode_datagram(request, keys).expect("client datagram") {
        Datagram::Ipmi(packet) => packet,
        other => panic!("unexpected client datagram: {other:?}"),
    }
}

/// Build the LAN response message for a decoded LAN request, echoing its
/// sequence and command and swapping the addresses.
pub(crate) fn lan_response(lan_request: &[u8], completion: u8, data: &[u8]) -> Vec<u8> {
    let req_net_fn = lan_request[1] >> 2;
    let lun = lan_request[1] & 0x03;
    let rq_seq = lan_request[4];
    let cmd = lan_request[5];

    let mut msg = Vec::with_capacity(8 + data.len());
    msg.push(REMOTE_SWID);
    msg.push(((req_net_fn + 1) << 2) | lun);
    msg.push(protocol::checksum(&msg[0..2]));
    msg.push(BMC_SLAVE_ADDR);
    msg.push(rq_seq);
    msg.push(cmd);
    msg.push(completion);
    msg.extend_from_slice(data);
    let csum2 = protocol::checksum(&msg[3..]);
    msg.push(csum2);
    msg
}

/// Frame a handshake payload (Open Session Response, RAKP 2/4) as the BMC
/// would: plain, session id and sequence zero.
pub(crate) fn session_reply(payload_type_num: u8, payload: &[u8]) -> Vec<u8> {
    protocol::encode_v20_packet(payload_type_num, 0, 0, payload, false, false, None)
        .expect("session reply")
}

/// Answer a client v1.5 exchange: decode, run the LAN response through the
/// same auth-none header.
pub(crate) fn v15_ipmi_reply(request: &[u8], completion: u8, data: &[u8]) -> Vec<u8> {
    let packet = decode_client_request(request, None);
    let lan = lan_response(&packet.payload, completion, data);
    protocol::encode_v15_packet(&lan).expect("v1.5 reply")
}

/// Answer a client v2.0 IPMI exchange. `f` receives the decoded LAN request
/// message and returns the completion code and response data; the reply is
/// framed with the console session id and the request's protections.
pub(crate) fn ipmi_reply(
    request: &[u8],
    keys: Option<&SessionKeys>,
    authenticated: bool,
    encrypted: bool,
    f: impl FnOnce(&[u8]) -> (u8, Vec<u8>),
) -> Vec<u8> {
    let packet = decode_client_request(request, keys);
    let (completion, data) = f(&packet.payload);
    let lan = lan_response(&packet.payload, completion, &data);

    let payload = if encrypted {
        let keys = keys.expect("encryption without keys");
        seal_payload_aes_cbc(&lan, &keys.aes_key(), &[0x7Eu8; 16]).expect("seal")
    } else {
        lan
    };

    protocol::encode_v20_packet(
        payload_type::IPMI,
        CONSOLE_ID,
        packet.session_seq,
        &payload,
        authenticated,
        encrypted,
        keys,
    )
    .expect("ipmi reply")
}
