// SPDX-License-Identifier: GPL-3.0-only

//! NetworkManager signals as an [`EventBus`]

use async_trait::async_trait;
use futures_util::stream::{BoxStream, SelectAll};
use futures_util::StreamExt;
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream, proxy};

use netmount_contracts::traits::bus::{NM_DEVICE_INTERFACE, STATE_CHANGED_MEMBER};
use netmount_contracts::{BusError, BusEvent, BusSignal, EventBus, SignalFilter};

#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
trait NetworkManager {
    #[zbus(signal)]
    fn state_changed(&self, state: u32) -> zbus::Result<()>;
}

type EventStream = BoxStream<'static, Result<BusEvent, BusError>>;

/// Merges the device signal match and the global state callback into one
/// event stream.
pub struct NetworkManagerBus {
    connection: Connection,
    manager: Option<NetworkManagerProxy<'static>>,
    streams: SelectAll<EventStream>,
}

impl NetworkManagerBus {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            manager: None,
            streams: SelectAll::new(),
        }
    }

    async fn manager(&mut self) -> zbus::Result<NetworkManagerProxy<'static>> {
        if let Some(manager) = &self.manager {
            return Ok(manager.clone());
        }
        let manager = NetworkManagerProxy::new(&self.connection).await?;
        self.manager = Some(manager.clone());
        Ok(manager)
    }

    async fn device_state_stream(connection: &Connection) -> zbus::Result<EventStream> {
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(NM_DEVICE_INTERFACE)?
            .member(STATE_CHANGED_MEMBER)?
            .build();
        let stream = MessageStream::for_match_rule(rule, connection, None).await?;

        Ok(stream
            .map(|message| match message {
                Ok(message) => signal_from_message(&message).map(BusEvent::Signal),
                Err(e) => Err(transport_error(e)),
            })
            .boxed())
    }

    async fn global_state_stream(&mut self) -> zbus::Result<EventStream> {
        let stream = self.manager().await?.receive_state_changed().await?;

        Ok(stream
            .map(|signal| match signal.args() {
                Ok(args) => Ok(BusEvent::GlobalStateChanged(args.state)),
                Err(e) => Err(BusError::Malformed(format!("NetworkManager StateChanged: {e}"))),
            })
            .boxed())
    }
}

#[async_trait]
impl EventBus for NetworkManagerBus {
    async fn subscribe(&mut self, filter: SignalFilter) -> Result<(), BusError> {
        let stream = match filter {
            SignalFilter::DeviceStateChanged => Self::device_state_stream(&self.connection).await,
            SignalFilter::GlobalStateChanged => self.global_state_stream().await,
        }
        .map_err(|e| BusError::Subscribe(format!("{filter:?}: {e}")))?;

        tracing::debug!("Subscribed to {filter:?}");
        self.streams.push(stream);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<BusEvent, BusError>> {
        self.streams.next().await
    }
}

fn transport_error(err: zbus::Error) -> BusError {
    match err {
        zbus::Error::InputOutput(_) => BusError::Disconnected(err.to_string()),
        other => BusError::Malformed(other.to_string()),
    }
}

/// Reduce a raw D-Bus signal to the fields monitors look at. A body that is
/// not `(uuu)` leaves `state` empty for the handler to reject.
pub(crate) fn signal_from_message(message: &Message) -> Result<BusSignal, BusError> {
    let header = message.header();
    let path = header
        .path()
        .map(|path| path.to_string())
        .ok_or_else(|| BusError::Malformed("signal without object path".to_string()))?;
    let interface = header
        .interface()
        .map(|interface| interface.to_string())
        .unwrap_or_default();
    let member = header
        .member()
        .map(|member| member.to_string())
        .unwrap_or_default();
    let state = message
        .body()
        .deserialize::<(u32, u32, u32)>()
        .ok()
        .map(|(new_state, _old_state, _reason)| new_state);

    Ok(BusSignal {
        path,
        interface,
        member,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = "/org/freedesktop/NetworkManager/Devices/7";

    #[test]
    fn device_state_signal_is_decoded() {
        let message = Message::signal(DEVICE, NM_DEVICE_INTERFACE, STATE_CHANGED_MEMBER)
            .unwrap()
            .build(&(100u32, 70u32, 0u32))
            .unwrap();

        let signal = signal_from_message(&message).unwrap();

        assert_eq!(signal, BusSignal::device_state_changed(DEVICE, 100));
        assert_eq!(signal.object_id(), "7");
    }

    #[test]
    fn subscription_futures_are_send() {
        fn assert_send<T: Send>(_: T) {}
        fn check(connection: &Connection, bus: &mut NetworkManagerBus) {
            assert_send(NetworkManagerBus::device_state_stream(connection));
            assert_send(bus.global_state_stream());
            assert_send(bus.subscribe(SignalFilter::DeviceStateChanged));
        }
        let _ = check;
    }

    #[test]
    fn unexpected_body_leaves_state_empty() {
        let message = Message::signal(DEVICE, NM_DEVICE_INTERFACE, STATE_CHANGED_MEMBER)
            .unwrap()
            .build(&("activated",))
            .unwrap();

        let signal = signal_from_message(&message).unwrap();

        assert!(signal.is_device_state_changed());
        assert_eq!(signal.state, None);
    }
}
