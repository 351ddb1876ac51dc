//! GATT transport seam
//!
//! The device facade only needs single reads and writes on an identified
//! characteristic. [`GattTransport`] captures that so the facade can run on
//! btleplug, or on an in-memory double in tests.

use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol::CharacteristicId;
use async_trait::async_trait;
use std::fmt;

/// Operations a characteristic supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.read, "READ"),
            (self.write, "WRITE"),
            (self.write_without_response, "WRITE NO RESPONSE"),
            (self.notify, "NOTIFY"),
            (self.indicate, "INDICATE"),
        ];
        let names: Vec<&str> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" "))
    }
}

/// A characteristic found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub id: CharacteristicId,
    pub properties: Properties,
}

#[async_trait]
pub trait GattTransport: Send {
    async fn read(&mut self, id: &CharacteristicId) -> Result<Vec<u8>, TransportError>;

    /// Write with response; the call returns once the peripheral acknowledged it.
    async fn write(&mut self, id: &CharacteristicId, value: &[u8]) -> Result<(), TransportError>;

    async fn list_characteristics(&mut self) -> Result<Vec<CharacteristicInfo>, TransportError>;

    /// Drop the link. Calling this on an already closed link succeeds.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Read(CharacteristicId),
        Write(CharacteristicId, Vec<u8>),
        List,
        Disconnect,
    }

    #[derive(Default)]
    struct State {
        values: HashMap<CharacteristicId, Vec<u8>>,
        properties: Vec<CharacteristicInfo>,
        failures: VecDeque<TransportError>,
        disconnect_failure: Option<TransportError>,
        calls: Vec<Call>,
        connected: bool,
    }

    /// In-memory peripheral. Clones share state so a test can inspect calls
    /// after handing the transport to the facade.
    #[derive(Clone)]
    pub struct MockTransport {
        state: Arc<Mutex<State>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            let state = State {
                connected: true,
                ..State::default()
            };
            Self {
                state: Arc::new(Mutex::new(state)),
            }
        }

        pub fn with_value(self, id: CharacteristicId, value: &[u8]) -> Self {
            self.state.lock().unwrap().values.insert(id, value.to_vec());
            self
        }

        pub fn with_characteristic(self, id: CharacteristicId, properties: Properties) -> Self {
            self.state
                .lock()
                .unwrap()
                .properties
                .push(CharacteristicInfo { id, properties });
            self
        }

        /// Make the next transport operation fail.
        pub fn fail_next(&self, error: TransportError) {
            self.state.lock().unwrap().failures.push_back(error);
        }

        /// Make the next disconnect fail after marking the link down.
        pub fn fail_disconnect(&self, error: TransportError) {
            self.state.lock().unwrap().disconnect_failure = Some(error);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn value(&self, id: &CharacteristicId) -> Option<Vec<u8>> {
            self.state.lock().unwrap().values.get(id).cloned()
        }

        fn begin(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>, TransportError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            if let Some(error) = state.failures.pop_front() {
                return Err(error);
            }
            Ok(state)
        }
    }

    #[async_trait]
    impl GattTransport for MockTransport {
        async fn read(&mut self, id: &CharacteristicId) -> Result<Vec<u8>, TransportError> {
            let state = self.begin(Call::Read(*id))?;
            if !state.connected {
                return Err(TransportError::Disconnected);
            }
            state
                .values
                .get(id)
                .cloned()
                .ok_or_else(|| TransportError::CharacteristicNotFound(id.to_string()))
        }

        async fn write(
            &mut self,
            id: &CharacteristicId,
            value: &[u8],
        ) -> Result<(), TransportError> {
            let mut state = self.begin(Call::Write(*id, value.to_vec()))?;
            if !state.connected {
                return Err(TransportError::Disconnected);
            }
            state.values.insert(*id, value.to_vec());
            Ok(())
        }

        async fn list_characteristics(
            &mut self,
        ) -> Result<Vec<CharacteristicInfo>, TransportError> {
            let state = self.begin(Call::List)?;
            Ok(state.properties.clone())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Disconnect);
            state.connected = false;
            match state.disconnect_failure.take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_display() {
        let props = Properties {
            read: true,
            write: true,
            notify: true,
            ..Properties::default()
        };
        assert_eq!(props.to_string(), "READ WRITE NOTIFY");
        assert_eq!(Properties::default().to_string(), "");
    }
}
