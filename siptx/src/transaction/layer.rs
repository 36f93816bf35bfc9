use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Span;

use crate::error::{Result, TransactionError};
use crate::message::{generate_branch, Header, Request, Response, SipMethod, Via};
use crate::transaction::client_invite::{self, ClientInviteTx, Inner};
use crate::transaction::TransactionKey;
use crate::transport::Connection;
use crate::find_map_mut_header;

type ClientTransactions = HashMap<TransactionKey, ClientInviteTx>;

/// Routes responses to the client transactions they belong to.
///
/// Transactions created through the layer register under their
/// [`TransactionKey`] and remove themselves once terminated.
#[derive(Clone, Default)]
pub struct TransactionLayer {
    client_transactions: Arc<Mutex<ClientTransactions>>,
}

impl TransactionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers an INVITE client transaction.
    ///
    /// The branch is taken from the top `Via` of `request`. A request without
    /// a branch gets a freshly generated one, written back into its `Via`.
    ///
    /// The transaction stays registered until it terminates, so the caller
    /// must either [`init`](ClientInviteTx::init) or
    /// [`terminate`](ClientInviteTx::terminate) it. An entry whose
    /// transaction was dropped without being started is replaced by the next
    /// transaction using its branch.
    pub fn create_client_invite(
        &self,
        mut request: Request,
        target: (Connection, SocketAddr),
        span: Span,
    ) -> Result<ClientInviteTx> {
        let branch: Option<Arc<str>> = request.branch().map(Arc::from);
        let branch = match branch {
            Some(branch) => branch,
            None => {
                let branch = generate_branch();
                match find_map_mut_header!(request.headers, Via) {
                    Some(via) => via.branch = Some(branch.clone()),
                    None => {
                        let via = Via::new_with_transport(
                            target.0.transport_type(),
                            target.0.local_addr().to_string(),
                            Some(branch.clone()),
                        );
                        request.headers.prepend_header(Header::Via(via));
                    }
                }
                branch
            }
        };
        let key = TransactionKey::new_client(branch.clone(), SipMethod::Invite);

        let mut map = self.lock();
        if let Some(existing) = map.get(&key) {
            if !existing.state().is_terminated() && !existing.is_abandoned() {
                tracing::warn!("Transaction {} already exists", key);
                return Err(TransactionError::DuplicateBranch.into());
            }
        }
        let tx = ClientInviteTx::build(branch, request, target, span, Some(self.clone()));
        map.insert(key, tx.clone());

        Ok(tx)
    }

    /// Creates, registers and starts an INVITE client transaction.
    ///
    /// The transaction is removed again if it fails to start.
    pub async fn send_invite(
        &self,
        request: Request,
        target: (Connection, SocketAddr),
        span: Span,
    ) -> Result<ClientInviteTx> {
        let tx = self.create_client_invite(request, target, span)?;

        if let Err(err) = tx.init().await {
            self.remove_if_same(&tx);
            return Err(err);
        }

        Ok(tx)
    }

    /// Passes `response` to the matching transaction.
    ///
    /// Returns `false` when no transaction matched; such a response is left
    /// to the TU as a stray.
    pub async fn handle_response(&self, response: Response) -> bool {
        let Some(key) = TransactionKey::from_response(&response) else {
            tracing::debug!("Response {} has no transaction key", response.code());
            return false;
        };
        let Some(tx) = self.find_client_invite(&key) else {
            tracing::debug!("No transaction for response {} ({})", response.code(), key);
            return false;
        };
        tx.receive(response).await;

        true
    }

    pub fn find_client_invite(&self, key: &TransactionKey) -> Option<ClientInviteTx> {
        self.lock().get(key).cloned()
    }

    /// Removes the transaction registered under `key`, without terminating it.
    pub fn remove(&self, key: &TransactionKey) -> Option<ClientInviteTx> {
        self.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn remove_if_same(&self, tx: &ClientInviteTx) {
        let mut map = self.lock();
        if map.get(tx.key()).is_some_and(|found| found.same_transaction(tx)) {
            map.remove(tx.key());
        }
    }

    // Called by a transaction once it terminated. A newer transaction reusing
    // the same key stays registered.
    pub(crate) fn remove_terminated(&self, inner: &Arc<Inner>) {
        let key = client_invite::inner_key(inner);
        let removed = {
            let mut map = self.lock();
            match map.get(key) {
                Some(found) if client_invite::same_inner(found, inner) => map.remove(key),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::trace!("Transaction {} removed from layer", key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientTransactions> {
        self.client_transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
