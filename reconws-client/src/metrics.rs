//! Client metrics definitions
//!
//! OpenTelemetry instruments describing connection health. They are recorded
//! when metrics are enabled on the [`ClientBuilder`](crate::ClientBuilder) and
//! exported by whatever meter provider the process installed (see
//! `reconws_core::init_observability`). Without a provider the global meter is
//! a no-op.
//!
//! # Metrics Collected
//!
//! - **reconws.client.connection.state**: current state (gauge)
//! - **reconws.client.dial.attempts**: dial attempts (counter)
//! - **reconws.client.dial.failures**: failed dial attempts (counter)
//! - **reconws.client.connections**: connections established (counter)
//! - **reconws.client.io.errors**: read/write failures by direction (counter)
//! - **reconws.client.messages**: messages moved, by direction (counter)

use crate::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=closed)
    pub connection_state: Gauge<i64>,
    /// Total number of dial attempts
    pub dial_attempts: Counter<u64>,
    /// Total number of failed dial attempts
    pub dial_failures: Counter<u64>,
    /// Total number of connections established
    pub connections: Counter<u64>,
    /// Total number of read and write failures
    pub io_errors: Counter<u64>,
    /// Total number of messages read and written
    pub messages: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl ClientMetrics {
    /// Create metrics on the global meter
    ///
    /// `client_name` is attached to every measurement.
    pub fn new(client_name: impl Into<String>) -> Self {
        let meter = global::meter("reconws.client");
        Self::new_with_meter(&meter, client_name)
    }

    /// Create metrics with a custom meter
    pub fn new_with_meter(meter: &Meter, client_name: impl Into<String>) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("reconws.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=closed)")
                .build(),
            dial_attempts: meter
                .u64_counter("reconws.client.dial.attempts")
                .with_description("Total number of dial attempts")
                .build(),
            dial_failures: meter
                .u64_counter("reconws.client.dial.failures")
                .with_description("Total number of failed dial attempts")
                .build(),
            connections: meter
                .u64_counter("reconws.client.connections")
                .with_description("Total number of connections established")
                .build(),
            io_errors: meter
                .u64_counter("reconws.client.io.errors")
                .with_description("Total number of read and write failures")
                .build(),
            messages: meter
                .u64_counter("reconws.client.messages")
                .with_description("Total number of messages read and written")
                .build(),
            attributes: vec![KeyValue::new("client", client_name.into())],
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_code(), &self.attributes);
    }

    /// Record a dial attempt and its outcome
    pub fn record_dial(&self, success: bool) {
        self.dial_attempts.add(1, &self.attributes);
        if success {
            self.connections.add(1, &self.attributes);
        } else {
            self.dial_failures.add(1, &self.attributes);
        }
    }

    /// Record an I/O failure; `direction` is "read" or "write"
    pub fn record_io_error(&self, direction: &'static str) {
        self.io_errors.add(1, &self.with_direction(direction));
    }

    /// Record a message moved; `direction` is "read" or "write"
    pub fn record_message(&self, direction: &'static str) {
        self.messages.add(1, &self.with_direction(direction));
    }

    fn with_direction(&self, direction: &'static str) -> Vec<KeyValue> {
        let mut attributes = self.attributes.clone();
        attributes.push(KeyValue::new("direction", direction));
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("test-client");

        // No meter provider is installed, so these go to the no-op meter.
        metrics.update_connection_state(ConnectionState::Connected);
        metrics.record_dial(true);
        metrics.record_dial(false);
        metrics.record_io_error("read");
        metrics.record_message("write");
    }

    #[test]
    fn test_connection_state_metrics() {
        let metrics = ClientMetrics::new("test-client-state");

        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Closed,
        ] {
            metrics.update_connection_state(state);
        }
    }

    #[test]
    fn test_direction_attributes() {
        let metrics = ClientMetrics::new("test-client-direction");
        let attributes = metrics.with_direction("read");
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1], KeyValue::new("direction", "read"));
    }
}
