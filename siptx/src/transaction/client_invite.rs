//! INVITE client transaction ([RFC 3261 §17.1.1], [RFC 6026 §7.2]).
//!
//! Every transaction runs as one task that owns its timers and is the only
//! place where the state changes. Responses, timer expirations and abort
//! requests are all events handled by that task in the order it admits
//! them, so forwarding a response to the TU and the state change it causes
//! always happen in the same step.
//!
//! [RFC 3261 §17.1.1]: https://datatracker.ietf.org/doc/html/rfc3261#section-17.1.1
//! [RFC 6026 §7.2]: https://datatracker.ietf.org/doc/html/rfc6026#section-7.2

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use futures_util::future::{self, Either, Pending};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Sleep};
use tracing::{Instrument, Span};

use crate::error::{Error, Result, TransactionError};
use crate::message::{CSeq, Header, Headers, Request, Response, SipMethod, StatusCode};
use crate::transaction::fsm::{State, StateMachine};
use crate::transaction::timers::{self, TimerSettings};
use crate::transaction::{TransactionKey, TransactionLayer};
use crate::transport::Connection;
use crate::{filter_map_header, find_map_header};

/// What the TU receives from a client transaction.
#[derive(Debug, Clone, EnumAsInner)]
pub enum TxEvent {
    /// A response the transaction decided to pass up.
    Response(Response),
    /// Timer B fired before any response arrived.
    Timeout,
    /// A retransmission or an ACK could not be written; the transaction
    /// terminated.
    TransportError(String),
}

/// The TU side of a transaction's output channel.
///
/// Events are buffered without bound, so the transaction never waits for
/// the TU. Once the transaction terminates, [`Responses::recv`] returns the
/// buffered events and then `None`.
#[derive(Clone)]
pub struct Responses {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<TxEvent>>>,
}

impl Responses {
    fn new(rx: mpsc::UnboundedReceiver<TxEvent>) -> Self {
        Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    /// Receives the next event, in delivery order.
    pub async fn recv(&self) -> Option<TxEvent> {
        self.rx.lock().await.recv().await
    }

    /// Receives the next event if one is already buffered.
    pub fn try_recv(&self) -> Option<TxEvent> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

enum Command {
    Response {
        response: Response,
        done: oneshot::Sender<()>,
    },
    Terminate,
}

// Handed from `new` to the transaction task by `init`.
struct Startup {
    mailbox: mpsc::UnboundedReceiver<Command>,
    output: mpsc::UnboundedSender<TxEvent>,
}

type Timer = Either<Sleep, Pending<()>>;

fn arm(duration: Duration) -> Pin<Box<Timer>> {
    Box::pin(Either::Left(time::sleep(duration)))
}

fn disarmed() -> Pin<Box<Timer>> {
    Box::pin(Either::Right(future::pending()))
}

struct ActiveTimers {
    settings: TimerSettings,
    interval_a: Duration,
    timer_a: Pin<Box<Timer>>,
    timer_b: Pin<Box<Timer>>,
    timer_d: Pin<Box<Timer>>,
    timer_m: Pin<Box<Timer>>,
}

impl ActiveTimers {
    fn start(settings: TimerSettings, reliable: bool) -> Self {
        Self {
            settings,
            interval_a: settings.timer_a,
            timer_a: if reliable {
                disarmed()
            } else {
                arm(settings.timer_a)
            },
            timer_b: arm(settings.timer_b),
            timer_d: disarmed(),
            timer_m: disarmed(),
        }
    }

    fn cancel_a_b(&mut self) {
        self.timer_a.set(Either::Right(future::pending()));
        self.timer_b.set(Either::Right(future::pending()));
    }
}

pub(crate) struct Inner {
    key: TransactionKey,
    request: Arc<Request>,
    connection: Connection,
    destination: SocketAddr,
    span: Span,
    state: StateMachine,
    retransmit_count: AtomicU32,
    status_code: Mutex<Option<StatusCode>>,
    startup: Mutex<Option<Startup>>,
    responses: Responses,
    layer: Option<TransactionLayer>,
}

/// An INVITE client transaction.
///
/// Cloning is cheap and every clone drives the same transaction. Dropping
/// every clone aborts a transaction that is still running.
#[derive(Clone)]
pub struct ClientInviteTx {
    inner: Arc<Inner>,
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for ClientInviteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInviteTx")
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl ClientInviteTx {
    /// Creates a transaction for `request`, identified by `branch`.
    ///
    /// Nothing is sent until [`init`](Self::init) is called. Every event of
    /// the transaction is recorded in a span that is a child of `span`.
    pub fn new(
        branch: impl Into<Arc<str>>,
        request: Request,
        target: (Connection, SocketAddr),
        span: Span,
    ) -> Self {
        Self::build(branch.into(), request, target, span, None)
    }

    pub(crate) fn build(
        branch: Arc<str>,
        request: Request,
        (connection, destination): (Connection, SocketAddr),
        span: Span,
        layer: Option<TransactionLayer>,
    ) -> Self {
        let span = tracing::debug_span!(
            parent: &span,
            "invite_client_tx",
            branch = %branch,
            transport = %connection.transport_type(),
        );
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (output, responses) = mpsc::unbounded_channel();

        let inner = Inner {
            key: TransactionKey::new_client(branch, SipMethod::Invite),
            request: Arc::new(request),
            connection,
            destination,
            span,
            state: StateMachine::default(),
            retransmit_count: AtomicU32::new(0),
            status_code: Mutex::new(None),
            startup: Mutex::new(Some(Startup { mailbox, output })),
            responses: Responses::new(responses),
            layer,
        };
        tracing::trace!(parent: &inner.span, "Transaction Created");

        Self {
            inner: Arc::new(inner),
            commands,
        }
    }

    /// Starts the transaction.
    ///
    /// Validates the request and the destination, moves to `Calling` and
    /// sends the request. Returns once that first write completed; Timer A
    /// (unreliable transports only) and Timer B run from then on.
    pub async fn init(&self) -> Result<()> {
        self.validate()?;
        let encoded = self.inner.request.encode()?;

        let startup = match self.take_startup() {
            Some(startup) => startup,
            None if self.state().is_terminated() => {
                return Err(TransactionError::Terminated.into())
            }
            None => return Err(TransactionError::AlreadyStarted.into()),
        };
        self.inner.state.set_state(State::Calling);

        let (started_tx, started_rx) = oneshot::channel();
        let tx = self.clone_inner();
        let settings = timers::timers();
        let span = self.inner.span.clone();

        tokio::spawn(
            async move {
                tx.run(startup, encoded, settings, started_tx).await;
            }
            .instrument(span),
        );

        match started_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ChannelClosed),
        }
    }

    /// Passes a response to the transaction.
    ///
    /// Safe to call from any number of tasks at once. Returns after the
    /// transaction applied the response, never waiting for the TU to consume
    /// it. Responses for a transaction that is not running are dropped.
    pub async fn receive(&self, response: Response) {
        let state = self.state();
        if matches!(state, State::Initial | State::Terminated) {
            tracing::debug!(
                parent: &self.inner.span,
                "Dropping {} response, transaction is {}",
                response.code(),
                state
            );
            return;
        }
        let (done, applied) = oneshot::channel();
        let code = response.code();

        if self.commands.send(Command::Response { response, done }).is_err() {
            tracing::debug!(parent: &self.inner.span, "Dropping {} response, transaction is gone", code);
            return;
        }
        if applied.await.is_err() {
            tracing::debug!(
                parent: &self.inner.span,
                "Dropping {} response, transaction terminated first",
                code
            );
        }
    }

    /// Aborts the transaction, e.g. after sending a CANCEL or on a transport
    /// failure detected by the TU.
    ///
    /// Cancels every pending timer and closes the output channel. Does
    /// nothing on a terminated transaction.
    pub fn terminate(&self) {
        if let Some(startup) = self.take_startup() {
            drop(startup);
            self.on_terminated();
            return;
        }
        if self.commands.send(Command::Terminate).is_err() {
            tracing::trace!(parent: &self.inner.span, "Terminate ignored, transaction is gone");
        }
    }

    /// Retrieves the current state of the transaction.
    #[inline]
    pub fn state(&self) -> State {
        self.inner.state.state()
    }

    /// Subscribes to the state changes of the transaction.
    pub fn subscribe_state(&self) -> watch::Receiver<State> {
        self.inner.state.subscribe()
    }

    /// The TU handle of the output channel.
    pub fn responses(&self) -> Responses {
        self.inner.responses.clone()
    }

    pub fn key(&self) -> &TransactionKey {
        &self.inner.key
    }

    pub fn branch(&self) -> &str {
        self.inner.key.branch()
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn destination(&self) -> SocketAddr {
        self.inner.destination
    }

    /// Checks if the connection is reliable.
    #[inline]
    pub fn is_reliable(&self) -> bool {
        self.inner.connection.is_reliable()
    }

    /// Gets the count of retransmissions.
    #[inline]
    pub fn retrans_count(&self) -> u32 {
        self.inner.retransmit_count.load(Ordering::SeqCst)
    }

    /// Retrieves the status code of the last response handled.
    pub fn last_status_code(&self) -> Option<StatusCode> {
        *self
            .inner
            .status_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn same_transaction(&self, other: &ClientInviteTx) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // True for a transaction that was never started and whose only handle
    // is this one: nothing can start or terminate it any more.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.state() == State::Initial && Arc::strong_count(&self.inner) == 1
    }

    fn take_startup(&self) -> Option<Startup> {
        self.inner
            .startup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // A clone for the transaction task. It holds no command sender, so the
    // task sees its mailbox close once every user handle is gone.
    fn clone_inner(&self) -> TxTask {
        TxTask {
            inner: self.inner.clone(),
        }
    }

    fn on_terminated(&self) {
        self.clone_inner().on_terminated();
    }

    fn validate(&self) -> Result<()> {
        let request = &self.inner.request;
        let branch = self.inner.key.branch();

        if !request.method().is_invite() {
            return Err(TransactionError::InvalidMethod.into());
        }
        if branch.is_empty() {
            return Err(Error::InvalidRequest("empty branch".into()));
        }
        match request.branch() {
            Some(via_branch) if via_branch == branch => (),
            Some(via_branch) => {
                return Err(Error::InvalidRequest(format!(
                    "Via branch '{}' does not match transaction branch '{}'",
                    via_branch, branch
                )))
            }
            None => return Err(Error::InvalidRequest("missing Via branch".into())),
        }
        if find_map_header!(request.headers, From).is_none() {
            return Err(Error::InvalidRequest("missing From header".into()));
        }
        if find_map_header!(request.headers, To).is_none() {
            return Err(Error::InvalidRequest("missing To header".into()));
        }
        if find_map_header!(request.headers, CallId).is_none() {
            return Err(Error::InvalidRequest("missing Call-ID header".into()));
        }
        match find_map_header!(request.headers, CSeq) {
            Some(cseq) if cseq.method.is_invite() => (),
            Some(cseq) => {
                return Err(Error::InvalidRequest(format!(
                    "CSeq method {} does not match INVITE",
                    cseq.method
                )))
            }
            None => return Err(Error::InvalidRequest("missing CSeq header".into())),
        }

        let destination = self.inner.destination;
        if destination.ip().is_unspecified() || destination.port() == 0 {
            return Err(Error::InvalidDestination(destination));
        }

        Ok(())
    }
}

/// The transaction task: the single place where state changes.
struct TxTask {
    inner: Arc<Inner>,
}

impl TxTask {
    async fn run(
        self,
        startup: Startup,
        encoded: Bytes,
        settings: TimerSettings,
        started: oneshot::Sender<Result<()>>,
    ) {
        let Startup {
            mut mailbox,
            output,
        } = startup;

        if let Err(err) = self.send(&encoded, SipMethod::Invite).await {
            tracing::warn!("Failed to send INVITE: {}", err);
            self.on_terminated();
            let _ = started.send(Err(err));
            return;
        }
        let _ = started.send(Ok(()));

        let reliable = self.inner.connection.is_reliable();
        let mut timers = ActiveTimers::start(settings, reliable);
        let mut ack: Option<Bytes> = None;

        loop {
            tokio::select! {
                biased;
                command = mailbox.recv() => match command {
                    Some(Command::Response { response, done }) => {
                        let flow = self
                            .on_response(response, &output, &mut timers, &mut ack)
                            .await;
                        let _ = done.send(());
                        if flow.is_break() {
                            break;
                        }
                    }
                    Some(Command::Terminate) => {
                        tracing::debug!("Terminated by the TU");
                        break;
                    }
                    None => {
                        tracing::debug!("Every handle dropped, terminating");
                        break;
                    }
                },
                _ = &mut timers.timer_a => {
                    tracing::trace!("Timer A fired");
                    match self.retransmit(&encoded).await {
                        Ok(retrans) => {
                            timers.interval_a = timers.settings.next_timer_a(timers.interval_a);
                            timers.timer_a.set(Either::Left(time::sleep(timers.interval_a)));
                            tracing::trace!("Retransmission {} sent, next in {:?}", retrans, timers.interval_a);
                        }
                        Err(err) => {
                            tracing::warn!("Failed to retransmit: {}", err);
                            deliver(&output, TxEvent::TransportError(err.to_string()));
                            break;
                        }
                    }
                }
                _ = &mut timers.timer_b => {
                    tracing::debug!("Timer B fired, no response received");
                    deliver(&output, TxEvent::Timeout);
                    break;
                }
                _ = &mut timers.timer_d => {
                    tracing::trace!("Timer D fired");
                    break;
                }
                _ = &mut timers.timer_m => {
                    tracing::trace!("Timer M fired");
                    break;
                }
            }
        }

        // Marking Terminated and closing the output happen in this one step;
        // pending senders see their acknowledgement dropped with the mailbox.
        self.on_terminated();
        drop(output);
        drop(mailbox);
    }

    async fn on_response(
        &self,
        response: Response,
        output: &mpsc::UnboundedSender<TxEvent>,
        timers: &mut ActiveTimers,
        ack: &mut Option<Bytes>,
    ) -> ControlFlow<()> {
        let code = response.code();
        let state = self.inner.state.state();

        tracing::debug!("<= Response {} {} ({})", code, response.reason(), state);

        match state {
            State::Calling | State::Proceeding if code.is_provisional() => {
                timers.cancel_a_b();
                self.set_status_code(code);
                self.inner.state.set_state(State::Proceeding);
                deliver(output, TxEvent::Response(response));
            }
            State::Calling | State::Proceeding if code.is_success() => {
                timers.cancel_a_b();
                self.set_status_code(code);
                self.inner.state.set_state(State::Accepted);
                deliver(output, TxEvent::Response(response));
                timers.timer_m.set(Either::Left(time::sleep(timers.settings.timer_m)));
            }
            State::Accepted if code.is_success() => {
                // Every 2xx goes up: each one may come from a different fork.
                // Timer M restarts so later copies are still absorbed.
                self.set_status_code(code);
                deliver(output, TxEvent::Response(response));
                timers.timer_m.set(Either::Left(time::sleep(timers.settings.timer_m)));
            }
            State::Calling | State::Proceeding if code.is_final() => {
                timers.cancel_a_b();
                self.set_status_code(code);
                self.inner.state.set_state(State::Completed);

                let encoded = match self.create_ack(&response).encode() {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        tracing::warn!("Failed to encode ACK: {}", err);
                        deliver(output, TxEvent::Response(response));
                        deliver(output, TxEvent::TransportError(err.to_string()));
                        return ControlFlow::Break(());
                    }
                };
                deliver(output, TxEvent::Response(response));

                if let Err(err) = self.send(&encoded, SipMethod::Ack).await {
                    tracing::warn!("Failed to send ACK: {}", err);
                    deliver(output, TxEvent::TransportError(err.to_string()));
                    return ControlFlow::Break(());
                }
                *ack = Some(encoded);

                let timer_d = timers.settings.timer_d_for(self.inner.connection.is_reliable());
                if timer_d.is_zero() {
                    return ControlFlow::Break(());
                }
                timers.timer_d.set(Either::Left(time::sleep(timer_d)));
            }
            State::Completed if code.is_final() && !code.is_success() => {
                // RFC 3261 17.1.1.2: retransmissions of the final response
                // are answered with the same ACK and not passed up to the TU.
                let Some(encoded) = ack.as_ref() else {
                    return ControlFlow::Continue(());
                };
                tracing::trace!("Absorbing {} retransmission", code);
                if let Err(err) = self.send(encoded, SipMethod::Ack).await {
                    tracing::warn!("Failed to resend ACK: {}", err);
                    deliver(output, TxEvent::TransportError(err.to_string()));
                    return ControlFlow::Break(());
                }
            }
            _ => {
                tracing::debug!("Ignoring {} response in {} state", code, state);
            }
        }

        ControlFlow::Continue(())
    }

    /// Builds the ACK for a non-2xx final response ([RFC 3261 §17.1.1.3]).
    ///
    /// [RFC 3261 §17.1.1.3]: https://datatracker.ietf.org/doc/html/rfc3261#section-17.1.1.3
    fn create_ack(&self, response: &Response) -> Request {
        let request = &self.inner.request;
        let mut headers = Headers::with_capacity(7);

        if let Some(via) = find_map_header!(request.headers, Via) {
            headers.push(Header::Via(via.clone()));
        }
        for route in filter_map_header!(request.headers, Route) {
            headers.push(Header::Route(route.clone()));
        }
        if let Some(from) = find_map_header!(request.headers, From) {
            headers.push(Header::From(from.clone()));
        }
        let to = find_map_header!(response.headers, To).or(find_map_header!(request.headers, To));
        if let Some(to) = to {
            headers.push(Header::To(to.clone()));
        }
        if let Some(call_id) = find_map_header!(request.headers, CallId) {
            headers.push(Header::CallId(call_id.clone()));
        }
        if let Some(cseq) = find_map_header!(request.headers, CSeq) {
            headers.push(Header::CSeq(CSeq::new(cseq.cseq, SipMethod::Ack)));
        }
        headers.push(Header::MaxForwards(70));

        Request::with_headers(SipMethod::Ack, request.req_line.uri.clone(), headers)
    }

    async fn send(&self, buf: &Bytes, method: SipMethod) -> Result<()> {
        tracing::debug!("=> Request {} to {}", method, self.inner.destination);
        self.inner
            .connection
            .send_msg(buf, &self.inner.destination)
            .await?;

        Ok(())
    }

    async fn retransmit(&self, buf: &Bytes) -> Result<u32> {
        self.send(buf, SipMethod::Invite).await?;

        Ok(self.inner.retransmit_count.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn set_status_code(&self, code: StatusCode) {
        let mut guard = self
            .inner
            .status_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(code);
    }

    fn on_terminated(&self) {
        if !self.inner.state.set_state(State::Terminated) {
            return;
        }
        if let Some(layer) = &self.inner.layer {
            layer.remove_terminated(&self.inner);
        }
    }
}

fn deliver(output: &mpsc::UnboundedSender<TxEvent>, event: TxEvent) {
    if output.send(event).is_err() {
        tracing::debug!("Output channel closed, event dropped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        tracing::trace!(parent: &self.span, "Transaction Destroyed ({:p})", self);
    }
}

pub(crate) fn same_inner(tx: &ClientInviteTx, inner: &Arc<Inner>) -> bool {
    Arc::ptr_eq(&tx.inner, inner)
}

pub(crate) fn inner_key(inner: &Inner) -> &TransactionKey {
    &inner.key
}
