//! Mock broker connector for tests and dry-run operation.
//!
//! Scriptable per call: successive calls pop the next scripted outcome,
//! falling back to a generic success. Call counting lets tests assert that
//! gated accounts never reach the broker.

use crate::domain::errors::ConnectorError;
use crate::domain::ports::{BrokerConnector, BrokerOrder, BrokerTicket};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

type ScriptedOutcome = Result<BrokerTicket, ConnectorError>;

#[derive(Default)]
pub struct MockBrokerConnector {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    calls: AtomicUsize,
    orders: Mutex<Vec<(String, BrokerOrder)>>,
}

impl MockBrokerConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the outcome of the next call
    pub async fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    pub async fn push_success(&self, ticket: &str) {
        self.push_outcome(Ok(BrokerTicket {
            ticket: ticket.to_string(),
            status: Some("open".to_string()),
            opened_at: None,
        }))
        .await;
    }

    pub async fn push_broker_error(&self, status: u16, message: &str) {
        self.push_outcome(Err(ConnectorError::Broker {
            status,
            message: message.to_string(),
        }))
        .await;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Orders received so far, paired with their target base URL
    pub async fn orders(&self) -> Vec<(String, BrokerOrder)> {
        self.orders.lock().await.clone()
    }
}

#[async_trait]
impl BrokerConnector for MockBrokerConnector {
    async fn open_trade(
        &self,
        base_url: &str,
        order: &BrokerOrder,
    ) -> Result<BrokerTicket, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .await
            .push((base_url.to_string(), order.clone()));
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(BrokerTicket {
                ticket: format!("mock-{}", self.call_count()),
                status: Some("open".to_string()),
                opened_at: None,
            }),
        }
    }
}
