//! Lossy, reordering link between the engine and the simulated server.
//!
//! Each exchange crosses the link twice: the request travels to the server
//! and, once handled, the response travels back. Both legs are delayed by
//! a random number of rounds. A lost request never reaches the server; a
//! timed-out response means the server applied the write but the client
//! only sees [`TransportError::Timeout`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tasksync_core::cache::FetchTicket;
use tasksync_core::mutation::MutationId;
use tasksync_core::transport::{ApiRequest, TransportError};

use crate::rng::DeterministicRng;

/// Fault injection rates, all in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    pub max_delay_rounds: u8,
    /// Request lost before the server saw it.
    pub drop_rate_percent: u8,
    /// Response lost after the server handled the request.
    pub timeout_rate_percent: u8,
    /// Server answers 500 without touching its state.
    pub server_error_rate_percent: u8,
    /// Deliveries due in the same round arrive in reverse order.
    pub reorder_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 3,
            drop_rate_percent: 5,
            timeout_rate_percent: 5,
            server_error_rate_percent: 5,
            reorder_rate_percent: 20,
        }
    }
}

impl FaultConfig {
    /// Immediate, lossless delivery.
    #[must_use]
    pub const fn reliable() -> Self {
        Self {
            max_delay_rounds: 0,
            drop_rate_percent: 0,
            timeout_rate_percent: 0,
            server_error_rate_percent: 0,
            reorder_rate_percent: 0,
        }
    }
}

/// Who is waiting on an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Fetch(FetchTicket),
    Mutation(MutationId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A request arrives at the server.
    Request {
        exchange: Exchange,
        request: ApiRequest,
    },
    /// A response arrives back at the engine.
    Response {
        exchange: Exchange,
        result: Result<Value, TransportError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct InTransit {
    deliver_at_round: u64,
    delivery: Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub lost: bool,
    pub delay_rounds: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliverOutcome {
    pub delivered: Vec<Delivery>,
    pub reordered: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    in_transit: Vec<InTransit>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            in_transit: Vec::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault(&self) -> FaultConfig {
        self.fault
    }

    /// Swap fault rates, e.g. to drain the link reliably at the end of a run.
    pub const fn set_fault(&mut self, fault: FaultConfig) {
        self.fault = fault;
    }

    #[must_use]
    pub fn in_transit(&self) -> usize {
        self.in_transit.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_transit.is_empty()
    }

    fn delay(&self, rng: &mut DeterministicRng) -> u8 {
        let bound = u64::from(self.fault.max_delay_rounds) + 1;
        u8::try_from(rng.next_bounded(bound)).unwrap_or(self.fault.max_delay_rounds)
    }

    /// Put a request on the wire. A lost request comes back as a network
    /// failure without reaching the server.
    pub fn send(
        &mut self,
        exchange: Exchange,
        request: ApiRequest,
        round: u64,
        rng: &mut DeterministicRng,
    ) -> SendOutcome {
        let lost = rng.hit(self.fault.drop_rate_percent);
        let delay_rounds = self.delay(rng);
        let delivery = if lost {
            Delivery::Response {
                exchange,
                result: Err(TransportError::Network("connection reset".into())),
            }
        } else {
            Delivery::Request { exchange, request }
        };
        self.in_transit.push(InTransit {
            deliver_at_round: round + u64::from(delay_rounds) + 1,
            delivery,
        });
        SendOutcome { lost, delay_rounds }
    }

    /// Carry the server's answer back. Returns the delay applied.
    pub fn respond(
        &mut self,
        exchange: Exchange,
        result: Result<Value, TransportError>,
        round: u64,
        rng: &mut DeterministicRng,
    ) -> u8 {
        let delay_rounds = self.delay(rng);
        self.in_transit.push(InTransit {
            deliver_at_round: round + u64::from(delay_rounds) + 1,
            delivery: Delivery::Response { exchange, result },
        });
        delay_rounds
    }

    /// Everything due by `round`, in send order unless reordered.
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> DeliverOutcome {
        let (ready, waiting): (Vec<InTransit>, Vec<InTransit>) = self
            .in_transit
            .drain(..)
            .partition(|item| item.deliver_at_round <= round);
        self.in_transit = waiting;

        let mut delivered: Vec<Delivery> = ready.into_iter().map(|item| item.delivery).collect();
        let reordered = delivered.len() > 1 && rng.hit(self.fault.reorder_rate_percent);
        if reordered {
            delivered.reverse();
        }
        DeliverOutcome {
            delivered,
            reordered,
        }
    }
}
