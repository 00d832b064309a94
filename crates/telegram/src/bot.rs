//! Long-polling loop for a connected bot.

use std::sync::Arc;

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tgsync_common::ConnectionStatus,
    tgsync_runtime::SessionDescriptor,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{config::BotConnectorConfig, handler::UpdateHandler};

pub(crate) const CONFLICT_REASON: &str = "another instance is already running with this bot token";

/// Poll `getUpdates` until `cancel` fires or the connection is lost.
///
/// A lost connection is reported through `session`; the restart timer takes
/// it from there.
pub(crate) async fn poll_updates(
    bot: Bot,
    session: Arc<SessionDescriptor>,
    handler: Arc<dyn UpdateHandler>,
    config: BotConnectorConfig,
    cancel: CancellationToken,
) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;
    let mut failures: u32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(config.poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost])
            .send();
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request => result,
        };

        match result {
            Ok(updates) => {
                failures = 0;
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => {
                            if let Err(e) = handler.handle_message(&bot, msg).await {
                                error!(error = %e, "error handling telegram message");
                            }
                        },
                        other => debug!("ignoring non-message update: {other:?}"),
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: {CONFLICT_REASON}");
                session.report(ConnectionStatus::Disconnected, Some(CONFLICT_REASON));
                break;
            },
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "telegram getUpdates failed");
                if failures >= config.max_poll_failures {
                    session.report(ConnectionStatus::Disconnected, Some(&e.to_string()));
                    break;
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(config.retry_delay()) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}
