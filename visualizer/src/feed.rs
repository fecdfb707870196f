use futures_util::stream::{self, BoxStream, StreamExt};
use iced::Subscription;
use potholecore::channel::{PushChannel, SocketChannel};
use potholecore::config::ChannelConfig;
use potholecore::{ChannelEvent, SyncController};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FeedId {
    url: String,
    reconnect_delay_ms: u64,
    max_reconnect_attempts: Option<u32>,
}

impl FeedId {
    fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            url: self.url.clone(),
            reconnect_delay_ms: self.reconnect_delay_ms,
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Push-channel subscription. The socket lives as long as the subscription;
/// dropping it drops the socket.
pub fn channel_events(config: &ChannelConfig) -> Subscription<ChannelEvent> {
    Subscription::run_with(
        FeedId {
            url: config.url.clone(),
            reconnect_delay_ms: config.reconnect_delay_ms,
            max_reconnect_attempts: config.max_reconnect_attempts,
        },
        build_feed_stream,
    )
}

fn build_feed_stream(id: &FeedId) -> BoxStream<'static, ChannelEvent> {
    let mut channel = SocketChannel::new(id.channel_config());
    for signal in SyncController::SIGNALS {
        channel.subscribe(signal);
    }
    stream::unfold(channel, |mut channel| async move {
        let event = channel.next_event().await?;
        Some((event, channel))
    })
    .boxed()
}
