//! End-to-end scenarios driving a real `parlor-server` acceptor over
//! loopback TCP against a `parlor-client` session, covering the named
//! scenarios from §8 of the protocol spec.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    net::{TcpListener, TcpStream},
    time::Duration,
};

use parlor_client::{ClientError, ClientSession, ClientSessionConfig, InputEvent, OutputEvent};
use parlor_core::ServerSessionConfig;
use parlor_proto::HeaderWidths;
use parlor_server::{acceptor, connection::ConnectionConfig};
use parlor_store::{AccountPolicy, MemoryStore, Store};

const WIDTHS: HeaderWidths = HeaderWidths { id_bytes: 4, type_bytes: 2, data_length_bytes: 4 };

fn spawn_server(store: MemoryStore) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let config = ConnectionConfig {
        widths: WIDTHS,
        session: ServerSessionConfig { authentication_timeout: Duration::from_secs(5) },
        backoff: Duration::from_millis(5),
    };
    std::thread::spawn(move || acceptor::run_listener(listener, store, config));
    addr
}

fn connect(addr: std::net::SocketAddr, token: &str) -> Result<ClientSession<TcpStream>, ClientError> {
    let stream = TcpStream::connect(addr).expect("connect");
    stream.set_nonblocking(true).expect("set_nonblocking");
    let config = ClientSessionConfig {
        widths: WIDTHS,
        authentication_timeout: Duration::from_secs(5),
        backoff: Duration::from_millis(5),
    };
    ClientSession::connect(stream, config, token)
}

#[test]
fn happy_auth_then_friend_round_trip_and_message_send() {
    let store = MemoryStore::new(AccountPolicy::default());
    let alice_token = match store.add_user("alice").unwrap() {
        parlor_store::AddUserOutcome::Created { token } => token,
        other => panic!("unexpected outcome: {other:?}"),
    };
    let bob_token = match store.add_user("bob").unwrap() {
        parlor_store::AddUserOutcome::Created { token } => token,
        other => panic!("unexpected outcome: {other:?}"),
    };

    let addr = spawn_server(store);

    let mut alice = connect(addr, &alice_token).expect("alice authenticates");
    assert_eq!(alice.username(), "alice");
    let mut bob = connect(addr, &bob_token).expect("bob authenticates");
    assert_eq!(bob.username(), "bob");

    // Scenario 3: friend round trip.
    let reply = alice.dispatch(InputEvent::AddFriend { username: "bob".into() }).unwrap();
    assert_eq!(reply, OutputEvent::AddFriend { success: true });

    let OutputEvent::GetRelations { relations } = alice.dispatch(InputEvent::GetRelations).unwrap()
    else {
        panic!("expected GetRelations");
    };
    let row = relations.iter().find(|r| r.secondary_username == "bob").expect("alice->bob row");
    assert!(row.first_is_friend);

    let OutputEvent::GetRelations { relations } = bob.dispatch(InputEvent::GetRelations).unwrap()
    else {
        panic!("expected GetRelations");
    };
    let row = relations.iter().find(|r| r.secondary_username == "alice").expect("bob->alice row");
    assert!(row.secondary_is_friend);

    // Scenario 4: send/read message, after=0 meaning unbounded (§9).
    let reply =
        alice.dispatch(InputEvent::SendMessage { receiver: "bob".into(), content: "hi".into() }).unwrap();
    assert_eq!(reply, OutputEvent::SendMessage);

    let OutputEvent::GetMessages { messages } =
        bob.dispatch(InputEvent::GetMessages { sender: "alice".into(), after: 0 }).unwrap()
    else {
        panic!("expected GetMessages");
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[0].sender, "alice");

    alice.quit().expect("quit");
}

#[test]
fn bad_token_is_rejected() {
    let store = MemoryStore::new(AccountPolicy::default());
    store.add_user("alice").unwrap();
    let addr = spawn_server(store);

    let result = connect(addr, "not-a-real-token");
    assert!(matches!(result, Err(ClientError::AuthenticationFailed)));
}

#[test]
fn remove_friend_clears_both_mirror_rows_over_the_wire() {
    let store = MemoryStore::new(AccountPolicy::default());
    let alice_token = match store.add_user("alice").unwrap() {
        parlor_store::AddUserOutcome::Created { token } => token,
        other => panic!("unexpected outcome: {other:?}"),
    };
    store.add_user("bob").unwrap();
    let addr = spawn_server(store);

    let mut alice = connect(addr, &alice_token).expect("alice authenticates");
    alice.dispatch(InputEvent::AddFriend { username: "bob".into() }).unwrap();
    let reply = alice.dispatch(InputEvent::RemoveFriend { username: "bob".into() }).unwrap();
    assert_eq!(reply, OutputEvent::RemoveFriend);

    let OutputEvent::GetRelations { relations } = alice.dispatch(InputEvent::GetRelations).unwrap()
    else {
        panic!("expected GetRelations");
    };
    let row = relations.iter().find(|r| r.secondary_username == "bob").expect("alice->bob row");
    assert!(!row.first_is_friend);
}

#[test]
fn add_friend_with_nonexistent_peer_fails_without_closing_the_session() {
    let store = MemoryStore::new(AccountPolicy::default());
    let alice_token = match store.add_user("alice").unwrap() {
        parlor_store::AddUserOutcome::Created { token } => token,
        other => panic!("unexpected outcome: {other:?}"),
    };
    let addr = spawn_server(store);

    let mut alice = connect(addr, &alice_token).expect("alice authenticates");
    let reply = alice.dispatch(InputEvent::AddFriend { username: "ghost".into() }).unwrap();
    assert_eq!(reply, OutputEvent::AddFriend { success: false });

    // session stays usable after an application-level failure (§7).
    let reply = alice.dispatch(InputEvent::GetRelations).unwrap();
    assert_eq!(reply, OutputEvent::GetRelations { relations: Vec::new() });
}
