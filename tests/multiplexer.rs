//! Command dispatch through the [`EnvelopeMultiplexer`], using the
//! [`RequestCommand`] reply wrapper instead of hand-built responses.

use std::sync::Arc;
use std::time::Duration;

use lime::transport::InProcessTransport;
use lime::{Channel, Command, CommandMethod, EnvelopeMultiplexer, MediaType, Node, Reason, RequestCommand};

#[tokio::test]
async fn request_command_success_response_round_trips_through_the_multiplexer() {
    let (client, server) = InProcessTransport::pair();
    let client_channel = Arc::new(Channel::new(
        Box::new(client),
        Vec::new(),
        "session-mux",
        Node::new("alice", "local"),
        Node::new("postmaster", "local"),
    ));
    let server_channel = Arc::new(Channel::new(
        Box::new(server),
        Vec::new(),
        "session-mux",
        Node::new("postmaster", "local"),
        Node::new("alice", "local"),
    ));

    let multiplexer = Arc::new(EnvelopeMultiplexer::new().on_command(
        |command| command.uri.as_deref() == Some("/ping"),
        |request: RequestCommand| {
            tokio::spawn(async move {
                request
                    .success_response_with_resource(
                        MediaType::application_json(),
                        serde_json::json!({"pong": true}),
                    )
                    .await
                    .unwrap();
            });
        },
    ));
    let listener = tokio::spawn({
        let server_channel = server_channel.clone();
        async move { multiplexer.listen(server_channel).await }
    });

    let request = Command::request("ping-1", CommandMethod::Get).with_uri("/ping");
    let response = client_channel
        .process_command(request, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(response.is_response());
    assert_eq!(response.resource.unwrap()["pong"], true);

    client_channel.close().await;
    server_channel.close().await;
    listener.abort();
}

#[tokio::test]
async fn request_command_falls_back_to_default_failure_handler() {
    let (client, server) = InProcessTransport::pair();
    let client_channel = Arc::new(Channel::new(
        Box::new(client),
        Vec::new(),
        "session-mux-2",
        Node::new("alice", "local"),
        Node::new("postmaster", "local"),
    ));
    let server_channel = Arc::new(Channel::new(
        Box::new(server),
        Vec::new(),
        "session-mux-2",
        Node::new("postmaster", "local"),
        Node::new("alice", "local"),
    ));

    let multiplexer = Arc::new(
        EnvelopeMultiplexer::new().default_command_handler(|request: RequestCommand| {
            tokio::spawn(async move {
                let reason = Reason::new(lime::reason::codes::NOT_FOUND, "no route");
                request.failure_response(reason).await.unwrap();
            });
        }),
    );
    let listener = tokio::spawn({
        let server_channel = server_channel.clone();
        async move { multiplexer.listen(server_channel).await }
    });

    let request = Command::request("unhandled-1", CommandMethod::Get).with_uri("/nowhere");
    let response = client_channel
        .process_command(request, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(response.is_response());
    assert_eq!(response.reason.unwrap().code, lime::reason::codes::NOT_FOUND);

    client_channel.close().await;
    server_channel.close().await;
    listener.abort();
}
