//! End-to-end handshake and established-session traffic, driven entirely
//! over the in-process transport so the suite needs no real network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use lime::envelope::{AuthenticationScheme, CompressionOption, EncryptionOption};
use lime::session_machine::{
    default_register, ClientHandshake, ClientHandshakeConfig, ServerHandshake, ServerHandshakeConfig,
};
use lime::transport::InProcessTransport;
use lime::{Channel, Command, CommandMethod, GuestAuthenticator, Identity, Message, Node, PlainAuthenticator, Role};

#[tokio::test]
async fn guest_handshake_reaches_established_on_both_sides() {
    let (mut client_transport, mut server_transport) = {
        let (a, b) = InProcessTransport::pair();
        (Box::new(a) as Box<dyn lime::transport::Transport>, Box::new(b) as Box<dyn lime::transport::Transport>)
    };

    let server = tokio::spawn(async move {
        let mut authenticators: HashMap<AuthenticationScheme, Arc<dyn lime::Authenticator>> = HashMap::new();
        authenticators.insert(AuthenticationScheme::Guest, Arc::new(GuestAuthenticator));
        let handshake = ServerHandshake::new(ServerHandshakeConfig {
            encryption_options: vec![EncryptionOption::None],
            compression_options: vec![CompressionOption::None],
            authenticators,
            server_node: Node::new("postmaster", "local"),
            register: Arc::new(default_register),
        });
        let outcome = handshake.run(&mut server_transport, false).await.unwrap();
        (outcome, server_transport)
    });

    let client_handshake = ClientHandshake::new(ClientHandshakeConfig {
        preferred_encryption: EncryptionOption::None,
        preferred_compression: CompressionOption::None,
        scheme: AuthenticationScheme::Guest,
        candidate: Node::new("", "").with_instance("inst-1"),
        authentication_round: Box::new(|_| serde_json::json!({})),
    });
    let client_outcome = client_handshake.run(&mut client_transport).await.unwrap();

    let (server_outcome, server_transport) = server.await.unwrap();
    assert_eq!(client_outcome.session_id, server_outcome.session_id);
    assert_eq!(client_outcome.role, Role::Member);
    assert_eq!(server_outcome.role, Role::Member);

    // The server assigned the guest a node since the client offered none.
    assert_eq!(client_outcome.local_node.name, "anon");
    assert_eq!(client_outcome.local_node.domain, "local");
    assert_eq!(client_outcome.local_node.instance.as_deref(), Some("inst-1"));
    assert_eq!(client_outcome.remote_node, Node::new("postmaster", "local"));

    let client_channel = Channel::new(
        client_transport,
        Vec::new(),
        client_outcome.session_id.clone(),
        client_outcome.local_node.clone(),
        client_outcome.remote_node.clone(),
    );
    let server_channel = Channel::new(
        server_transport,
        Vec::new(),
        server_outcome.session_id.clone(),
        server_outcome.local_node,
        server_outcome.remote_node,
    );

    let message = Message::new(lime::MediaType::application_json(), serde_json::json!({"hello": "world"}));
    client_channel.send_message(message.clone()).await.unwrap();
    let received = server_channel.receive_message().await.unwrap();
    assert_eq!(received.content, message.content);
    assert_eq!(received.base.from, Some(client_outcome.local_node));

    client_channel.close().await;
    server_channel.close().await;
}

#[tokio::test]
async fn plain_authentication_rejects_wrong_password() {
    let (mut client_transport, mut server_transport) = {
        let (a, b) = InProcessTransport::pair();
        (Box::new(a) as Box<dyn lime::transport::Transport>, Box::new(b) as Box<dyn lime::transport::Transport>)
    };

    let server = tokio::spawn(async move {
        let mut authenticators: HashMap<AuthenticationScheme, Arc<dyn lime::Authenticator>> = HashMap::new();
        authenticators.insert(
            AuthenticationScheme::Plain,
            Arc::new(PlainAuthenticator::new(|name, password| {
                name == "alice" && password == "correct-horse"
            })),
        );
        let handshake = ServerHandshake::new(ServerHandshakeConfig {
            encryption_options: vec![EncryptionOption::None],
            compression_options: vec![CompressionOption::None],
            authenticators,
            server_node: Node::new("postmaster", "local"),
            register: Arc::new(default_register),
        });
        handshake.run(&mut server_transport, false).await
    });

    let client_handshake = ClientHandshake::new(ClientHandshakeConfig {
        preferred_encryption: EncryptionOption::None,
        preferred_compression: CompressionOption::None,
        scheme: AuthenticationScheme::Plain,
        candidate: Node::new("alice", "example.com"),
        authentication_round: Box::new(|_| serde_json::json!({ "password": STANDARD.encode("wrong-password") })),
    });
    let client_result = client_handshake.run(&mut client_transport).await;
    assert!(client_result.is_err());

    let server_result = server.await.unwrap();
    assert!(server_result.is_err());
}

#[tokio::test]
async fn plain_authentication_grants_member_with_correct_password() {
    let (mut client_transport, mut server_transport) = {
        let (a, b) = InProcessTransport::pair();
        (Box::new(a) as Box<dyn lime::transport::Transport>, Box::new(b) as Box<dyn lime::transport::Transport>)
    };

    let server = tokio::spawn(async move {
        let mut authenticators: HashMap<AuthenticationScheme, Arc<dyn lime::Authenticator>> = HashMap::new();
        authenticators.insert(
            AuthenticationScheme::Plain,
            Arc::new(PlainAuthenticator::new(|name, password| {
                name == "alice" && password == "correct-horse"
            })),
        );
        let handshake = ServerHandshake::new(ServerHandshakeConfig {
            encryption_options: vec![EncryptionOption::None],
            compression_options: vec![CompressionOption::None],
            authenticators,
            server_node: Node::new("postmaster", "local"),
            register: Arc::new(|identity: &Identity, _role, instance: Option<&str>| {
                Ok(Node {
                    name: identity.name.clone(),
                    domain: identity.domain.clone(),
                    instance: instance.map(str::to_string),
                })
            }),
        });
        handshake.run(&mut server_transport, false).await.unwrap()
    });

    let client_handshake = ClientHandshake::new(ClientHandshakeConfig {
        preferred_encryption: EncryptionOption::None,
        preferred_compression: CompressionOption::None,
        scheme: AuthenticationScheme::Plain,
        candidate: Node::new("alice", "example.com").with_instance("phone"),
        authentication_round: Box::new(|_| serde_json::json!({ "password": STANDARD.encode("correct-horse") })),
    });
    let client_outcome = client_handshake.run(&mut client_transport).await.unwrap();
    let server_outcome = server.await.unwrap();

    assert_eq!(client_outcome.role, Role::Member);
    assert_eq!(client_outcome.local_node, Node::new("alice", "example.com").with_instance("phone"));
    assert_eq!(server_outcome.remote_node, client_outcome.local_node);
}

#[tokio::test]
async fn established_channel_correlates_command_round_trip() {
    let (client, server) = InProcessTransport::pair();
    let client_channel = Channel::new(
        Box::new(client),
        Vec::new(),
        "session-x",
        Node::new("alice", "local"),
        Node::new("postmaster", "local"),
    );
    let server_channel = Arc::new(Channel::new(
        Box::new(server),
        Vec::new(),
        "session-x",
        Node::new("postmaster", "local"),
        Node::new("alice", "local"),
    ));

    let responder = {
        let server_channel = server_channel.clone();
        tokio::spawn(async move {
            let request = server_channel.receive_command().await.unwrap();
            assert_eq!(request.method, CommandMethod::Get);
            let response = request.success_response_with_resource(
                lime::MediaType::application_json(),
                serde_json::json!({"value": 42}),
            );
            server_channel.send_command(response).await.unwrap();
        })
    };

    let request = Command::request("ping", CommandMethod::Get).with_uri("/counter");
    let response = client_channel
        .process_command(request, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(response.is_response());
    assert_eq!(response.resource.unwrap()["value"], 42);

    responder.await.unwrap();
    client_channel.close().await;
    server_channel.close().await;
}

#[tokio::test]
async fn graceful_finish_closes_both_sides_and_rejects_further_sends() {
    let (client, server) = InProcessTransport::pair();
    let client_channel = Channel::new(
        Box::new(client),
        Vec::new(),
        "session-finish",
        Node::new("alice", "local"),
        Node::new("postmaster", "local"),
    );
    let server_channel = Arc::new(Channel::new(
        Box::new(server),
        Vec::new(),
        "session-finish",
        Node::new("postmaster", "local"),
        Node::new("alice", "local"),
    ));

    let server_wait = {
        let server_channel = server_channel.clone();
        tokio::spawn(async move {
            server_channel.closed().await;
        })
    };

    client_channel.finish().await.unwrap();
    server_wait.await.unwrap();

    assert!(client_channel.is_closed());
    assert!(server_channel.is_closed());
    assert!(client_channel
        .send_message(Message::new(lime::MediaType::application_json(), serde_json::json!({})))
        .await
        .is_err());
}
