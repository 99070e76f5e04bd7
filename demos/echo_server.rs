//! Minimal in-process echo server: accepts guest sessions, echoes every
//! message back to its sender, answers a `get /ping` command, and logs
//! notifications as they arrive.

use std::sync::Arc;

use lime::transport::InProcessListener;
use lime::{Channel, EnvelopeMultiplexer, GuestAuthenticator, Message, RequestCommand, ServerBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let listener = InProcessListener::bind("lime-echo")?;
    let server = ServerBuilder::new()
        .listener(Box::new(listener))
        .authenticator(Arc::new(GuestAuthenticator))
        .on_finished(Arc::new(|session_id: String| {
            tracing::info!(target: "lime::demo", session_id = %session_id, "session finished");
        }))
        .build()?;
    let server = Arc::new(server);

    server.clone().serve(Arc::new(|channel: Arc<Channel>| {
        tokio::spawn(async move {
            let multiplexer = Arc::new(
                EnvelopeMultiplexer::new()
                    .default_message_handler({
                        let channel = channel.clone();
                        move |message: Message| {
                            let channel = channel.clone();
                            tokio::spawn(async move {
                                if let Err(err) = channel.send_message(message).await {
                                    tracing::warn!(target: "lime::demo", error = %err, "echo failed");
                                }
                            });
                        }
                    })
                    .on_command(
                        |command| command.uri.as_deref() == Some("/ping"),
                        |request: RequestCommand| {
                            tokio::spawn(async move {
                                if let Err(err) = request
                                    .success_response_with_resource(
                                        lime::MediaType::application_json(),
                                        serde_json::json!({"pong": true}),
                                    )
                                    .await
                                {
                                    tracing::warn!(target: "lime::demo", error = %err, "ping reply failed");
                                }
                            });
                        },
                    )
                    .default_command_handler(|request: RequestCommand| {
                        tokio::spawn(async move {
                            let reason = lime::Reason::new(lime::reason::codes::NOT_FOUND, "no handler for this command");
                            let _ = request.failure_response(reason).await;
                        });
                    }),
            );
            multiplexer.listen(channel).await;
        });
    }));

    tracing::info!(target: "lime::demo", "echo server listening on lime-echo");
    tokio::signal::ctrl_c().await?;
    server.close().await?;
    Ok(())
}
