//! Loopback SNMP agent for exercising the UDP transport.

use crate::fetcher::HR_STORAGE_ENTRY;
use crate::wire::{self, Answer};
use snmp::SnmpPdu;
use std::net::UdpSocket;
use std::thread::{self, JoinHandle};

/// Agent answering one request per entry of `answers`, in turn.
///
/// The first `drops` datagrams of every request go unanswered, so the client
/// has to re-send. The handle yields the number of datagrams received.
pub(crate) fn spawn_agent(answers: Vec<Vec<i64>>, drops: usize) -> (u16, JoinHandle<usize>) {
    let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = agent.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 1500];
        let mut received = 0;
        for values in answers {
            let mut ignored = 0;
            let (len, peer) = loop {
                let (len, peer) = agent.recv_from(&mut buf).unwrap();
                received += 1;
                if ignored == drops {
                    break (len, peer);
                }
                ignored += 1;
            };

            let request = SnmpPdu::from_bytes(&buf[..len]).unwrap();
            let varbinds: Vec<(Vec<u32>, Answer)> = values
                .iter()
                .map(|value| (HR_STORAGE_ENTRY.to_vec(), Answer::Integer(*value)))
                .collect();
            let response = wire::encode_response(b"public", request.req_id, 0, &varbinds);
            agent.send_to(&response, peer).unwrap();
        }
        received
    });

    (port, handle)
}
