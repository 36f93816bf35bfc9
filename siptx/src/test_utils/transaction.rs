use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use crate::headers;
use crate::message::{
    generate_branch, CSeq, From, Header, Request, Response, SipMethod, StatusCode, To, Via,
};
use crate::transaction::fsm::State;
use crate::transaction::{ClientInviteTx, TimerSettings, TxEvent};
use crate::transport::Connection;

use super::transport::MockConnection;

pub const FROM_HDR_STR: &str = "Alice <sip:alice@localhost>";
pub const FROM_TAG: &str = "1928301774";
pub const TO_HDR_STR: &str = "Bob <sip:bob@localhost>";
pub const CALLID_STR: &str = "a84b4c76e66710@pc33.atlanta.com";
pub const REQUEST_URI: &str = "sip:bob@localhost";

/// Asserts that the state seen by the [`watch::Receiver<State>`] reaches the
/// expected one.
#[macro_export]
macro_rules! assert_state_eq {
    ($watcher:expr, $state:expr $(,)?) => {{
        $crate::assert_state_eq!($watcher, $state, "transaction should reach {}", $state)
    }};

    ($watcher:expr, $state:expr, $($arg:tt)+) => {{
        let reached = $crate::test_utils::transaction::wait_for_state(&mut $watcher, $state).await;
        assert_eq!(reached, $state, $($arg)+);
    }};
}

/// Waits until `state` is seen, or returns the last state seen once the
/// watcher closes or a (virtual) minute elapses.
pub async fn wait_for_state(watcher: &mut watch::Receiver<State>, state: State) -> State {
    let reached = match timeout(Duration::from_secs(60), watcher.wait_for(|s| *s == state)).await {
        Ok(Ok(reached)) => Some(*reached),
        _ => None,
    };
    reached.unwrap_or_else(|| *watcher.borrow())
}

pub fn create_test_request(method: SipMethod, transport: &Connection) -> Request {
    let via = Via::new_with_transport(
        transport.transport_type(),
        transport.local_addr().to_string(),
        Some(generate_branch()),
    );
    let headers = headers! {
        Header::Via(via),
        Header::From(From::new(FROM_HDR_STR).with_tag(FROM_TAG)),
        Header::To(To::new(TO_HDR_STR)),
        Header::CallId(CALLID_STR.into()),
        Header::CSeq(CSeq::new(1, method)),
        Header::MaxForwards(70),
    };

    Request::with_headers(method, REQUEST_URI, headers)
}

pub fn destination() -> SocketAddr {
    "127.0.0.1:5070".parse().unwrap()
}

/// A transaction over `mock`, not started yet.
pub fn create_test_transaction(mock: &MockConnection) -> ClientInviteTx {
    let connection = Connection::new(mock.clone());
    let request = create_test_request(SipMethod::Invite, &connection);
    let branch = request.branch().unwrap().to_owned();

    ClientInviteTx::new(
        branch,
        request,
        (connection, destination()),
        tracing::Span::current(),
    )
}

/// Plays the UAS side of a transaction.
pub struct MockServer {
    pub client: ClientInviteTx,
}

impl MockServer {
    pub fn new(client: &ClientInviteTx) -> Self {
        Self {
            client: client.clone(),
        }
    }

    pub fn response(&self, code: StatusCode) -> Response {
        Response::from_request(self.client.request(), code, None)
    }

    pub async fn respond(&self, code: StatusCode) {
        self.client.receive(self.response(code)).await;
    }
}

/// Expects the next event to be a response and returns it.
pub async fn next_response(client: &ClientInviteTx) -> Response {
    match client.responses().recv().await {
        Some(TxEvent::Response(response)) => response,
        other => panic!("expected a response, got {other:?}"),
    }
}

/// Mirrors the Timer A schedule so tests can advance (paused) time in step
/// with it.
pub struct TestRetransmissionTimer {
    settings: TimerSettings,
    interval: Duration,
}

impl TestRetransmissionTimer {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            interval: settings.timer_a,
        }
    }

    pub async fn wait_for_retransmissions(&mut self, n: usize) {
        for _ in 0..n {
            tokio::time::sleep(self.interval).await;
            self.interval = self.settings.next_timer_a(self.interval);
            tokio::task::yield_now().await;
        }
    }
}
