//! SIP Transaction Layer.
//!
//! Only the INVITE client side is implemented: a [`ClientInviteTx`] sends an
//! INVITE, retransmits it over unreliable transports, acknowledges non-2xx
//! final responses and passes every response the TU should see through its
//! [`Responses`] channel. A [`TransactionLayer`] keeps the running
//! transactions and routes incoming responses to them by
//! [`TransactionKey`].

mod client_invite;
pub mod fsm;
mod key;
mod layer;
pub mod timers;

pub use client_invite::{ClientInviteTx, Responses, TxEvent};
pub use key::TransactionKey;
pub use layer::TransactionLayer;
pub use timers::{set_base_timers, set_timers, timers, TimerSettings, T1, T2, T4};
